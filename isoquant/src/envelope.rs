//! Charge state and monoisotopic mass inference from isotope envelope shapes.
//!
//! The expected envelope of a peptide is modeled as a chain of consecutive
//! isotope peak ratios, each a quartic polynomial in the neutral mass (in kDa)
//! and fitted separately for peptides with zero, one and two sulfur atoms.
use std::fmt::Display;

use chemical_elements::{neutral_mass, PROTON};
use mzpeaks::Tolerance;
use tracing::trace;

use crate::interference::ISOTOPE_SPACING;
use crate::peaks::{Peak, PeakList};

/// The number of sulfur atoms assumed by an envelope model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SulfurCount {
    Zero,
    One,
    Two,
}

impl SulfurCount {
    pub const ALL: [SulfurCount; 3] = [Self::Zero, Self::One, Self::Two];

    fn model(&self) -> &'static [RatioModel; 6] {
        match self {
            Self::Zero => &ZERO_SULFUR,
            Self::One => &ONE_SULFUR,
            Self::Two => &TWO_SULFUR,
        }
    }
}

impl Display for SulfurCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        };
        write!(f, "{n}S")
    }
}

/// The ratio of one isotope peak to the one before it
#[derive(Debug, Clone, Copy)]
struct RatioModel {
    coefficients: [f64; 5],
    /// The neutral mass range in Da the polynomial was fitted over
    mass_range: (f64, f64),
}

impl RatioModel {
    const fn new(coefficients: [f64; 5], low: f64, high: f64) -> Self {
        Self {
            coefficients,
            mass_range: (low, high),
        }
    }

    fn applies_to(&self, mass: f64) -> bool {
        self.mass_range.0 <= mass && mass <= self.mass_range.1
    }

    fn ratio(&self, mass: f64) -> f64 {
        let x = mass / 1000.0;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }
}

#[rustfmt::skip]
const ZERO_SULFUR: [RatioModel; 6] = [
    RatioModel::new([-0.00142320578040, 0.53158267080224, 0.00572776591574, -0.00040226083326, -0.00007968737684], 498.0, 3915.0),
    RatioModel::new([0.06258138406507, 0.24252967352808, 0.01729736525102, -0.00427641490976, 0.00038011211412], 498.0, 3915.0),
    RatioModel::new([0.03092092306220, 0.22353930450345, -0.02630395501009, 0.00728183023772, -0.00073155573939], 498.0, 3915.0),
    RatioModel::new([-0.02490747037406, 0.26363266501679, -0.07330346656184, 0.01876886839392, -0.00176688757979], 907.0, 3915.0),
    RatioModel::new([-0.19423148776489, 0.45952477474223, -0.18163820209523, 0.04173579115885, -0.00355426505742], 1219.0, 3915.0),
    RatioModel::new([0.04574408690798, -0.05092121193598, 0.13874539944789, -0.04344815868749, 0.00449747222180], 1559.0, 3915.0),
];

#[rustfmt::skip]
const ONE_SULFUR: [RatioModel; 6] = [
    RatioModel::new([-0.01040584267474, 0.53121149663696, 0.00576913817747, -0.00039325152252, -0.00007954180489], 530.0, 3947.0),
    RatioModel::new([0.37339166598255, -0.15814640001919, 0.24085046064819, -0.06068695741919, 0.00563606634601], 530.0, 3947.0),
    RatioModel::new([0.06969331604484, 0.28154425636993, -0.08121643989151, 0.02372741957255, -0.00238998426027], 530.0, 3947.0),
    RatioModel::new([0.04462649178239, 0.23204790123388, -0.06083969521863, 0.01564282892512, -0.00145145206815], 939.0, 3947.0),
    RatioModel::new([-0.20727547407753, 0.53536509500863, -0.22521649838170, 0.05180965157326, -0.00439750995163], 1251.0, 3947.0),
    RatioModel::new([0.27169670700251, -0.37192045082925, 0.31939855191976, -0.08668833166842, 0.00822975581940], 1591.0, 3947.0),
];

#[rustfmt::skip]
const TWO_SULFUR: [RatioModel; 6] = [
    RatioModel::new([-0.01937823810470, 0.53084210514216, 0.00580573751882, -0.00038281138203, -0.00007958217070], 562.0, 3978.0),
    RatioModel::new([0.68496829280011, -0.54558176102022, 0.44926662609767, -0.11154849560657, 0.01023294598884], 562.0, 3978.0),
    RatioModel::new([0.04215807391059, 0.40434195078925, -0.15884974959493, 0.04319968814535, -0.00413693825139], 562.0, 3978.0),
    RatioModel::new([0.14015578207913, 0.14407679007180, -0.01310480312503, 0.00362292256563, -0.00034189078786], 971.0, 3978.0),
    RatioModel::new([-0.02549241716294, 0.32153542852101, -0.11409513283836, 0.02617210469576, -0.00221816103608], 1283.0, 3978.0),
    RatioModel::new([-0.14490868030324, 0.33629928307361, -0.08223564735018, 0.01023410734015, -0.00027717589598], 1623.0, 3978.0),
];

/// The expected intensities of the isotope peaks after the monoisotopic peak,
/// relative to it. The envelope stops at the first ratio not fitted for `mass`.
pub fn expected_envelope(mass: f64, sulfur: SulfurCount) -> Vec<f64> {
    let mut relative = Vec::with_capacity(6);
    let mut current = 1.0;
    for model in sulfur.model().iter() {
        if !model.applies_to(mass) {
            break;
        }
        current *= model.ratio(mass);
        relative.push(current);
    }
    relative
}

/// The best envelope found for a precursor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvelopeMatch {
    /// Sum of squared relative deviations, -1 when nothing matched
    pub score: f64,
    pub charge: i32,
    pub monoisotopic_mz: f64,
    pub neutral_mass: f64,
    pub sulfur: Option<SulfurCount>,
    pub isotopes_matched: usize,
}

impl EnvelopeMatch {
    pub fn none() -> Self {
        Self {
            score: -1.0,
            charge: 0,
            monoisotopic_mz: f64::NAN,
            neutral_mass: f64::NAN,
            sulfur: None,
            isotopes_matched: 0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.score >= 0.0
    }
}

impl Default for EnvelopeMatch {
    fn default() -> Self {
        Self::none()
    }
}

/// Searches the neighborhood of a precursor for the isotope envelope that best
/// fits the sulfur models
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopeEnvelopeScorer {
    /// Half-width of the m/z neighborhood searched around the precursor
    pub search_width: f64,
    pub min_charge: i32,
    pub max_charge: i32,
    /// Mass accuracy required of every isotope peak in ppm
    pub tolerance: f64,
}

impl Default for IsotopeEnvelopeScorer {
    fn default() -> Self {
        Self {
            search_width: 5.0,
            min_charge: 1,
            max_charge: 4,
            tolerance: 4.0,
        }
    }
}

impl IsotopeEnvelopeScorer {
    pub fn new(search_width: f64, min_charge: i32, max_charge: i32, tolerance: f64) -> Self {
        Self {
            search_width,
            min_charge,
            max_charge,
            tolerance,
        }
    }

    /// Walk the isotope ladder up from `origin` while each next peak sits within
    /// tolerance of its predicted position
    fn walk_ladder(&self, peaks: &PeakList, origin: &Peak, charge: i32, max_len: usize) -> Vec<f64> {
        let spacing = ISOTOPE_SPACING / charge as f64;
        let tolerance = Tolerance::PPM(self.tolerance);
        let mut intensities = vec![origin.intensity];
        for k in 1..=max_len {
            let predicted = origin.mz + spacing * k as f64;
            match peaks.has_peak(predicted, tolerance) {
                Some(peak) => intensities.push(peak.intensity),
                None => break,
            }
        }
        intensities
    }

    fn score_ladder(observed: &[f64], expected: &[f64]) -> f64 {
        let base = observed[0];
        observed[1..]
            .iter()
            .zip(expected)
            .map(|(o, e)| ((o / base - e) / e).powi(2))
            .sum()
    }

    /// Score every peak near `precursor_mz` as a monoisotopic peak at every
    /// candidate charge, keeping the lowest scoring fit.
    pub fn score(&self, peaks: &PeakList, precursor_mz: f64) -> EnvelopeMatch {
        let window = peaks.find_window(precursor_mz, self.search_width);
        let mut best = EnvelopeMatch::none();
        for peak in window.iter() {
            if peak.intensity <= 0.0 {
                continue;
            }
            for charge in self.min_charge..=self.max_charge {
                let mass = neutral_mass(peak.mz, charge, PROTON);
                let observed = self.walk_ladder(peaks, peak, charge, 6);
                if observed.len() < 2 {
                    continue;
                }
                for sulfur in SulfurCount::ALL {
                    let expected = expected_envelope(mass, sulfur);
                    let n = expected.len().min(observed.len() - 1);
                    if n == 0 {
                        continue;
                    }
                    let score = Self::score_ladder(&observed[..=n], &expected[..n]);
                    if !score.is_finite() {
                        continue;
                    }
                    if !best.is_match() || score < best.score {
                        best = EnvelopeMatch {
                            score,
                            charge,
                            monoisotopic_mz: peak.mz,
                            neutral_mass: mass,
                            sulfur: Some(sulfur),
                            isotopes_matched: n + 1,
                        };
                    }
                }
            }
        }
        if best.is_match() {
            trace!(
                precursor_mz,
                charge = best.charge,
                score = best.score,
                "Best isotope envelope"
            );
        }
        best
    }
}
