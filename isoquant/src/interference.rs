//! Precursor interference estimation.
//!
//! The interference of a precursor selection is the share of the signal in its
//! isolation window that cannot be assigned to the selected ion or its
//! neighboring isotope peaks, reported as a percentage.
use std::fmt::Display;
use std::str::FromStr;

use mzpeaks::{IndexedCoordinate, Tolerance};
use tracing::{debug, trace};

use crate::error::QuantError;
use crate::peaks::{trapezoid, Peak, PeakList};

/// The m/z spacing of a singly charged isotope ladder
pub const ISOTOPE_SPACING: f64 = 1.003355;

/// The precursor mass times charge above which a preceding isotope peak is sought
pub const LOWER_ISOTOPE_MASS_THRESHOLD: f64 = 1000.0;

/// Interference values closer to zero than this are integration noise
pub const ZERO_SNAP_THRESHOLD: f64 = 1e-6;

pub const DEFAULT_ISOTOPE_PPM_TOLERANCE: f64 = 4.0;

/// How interference should be calculated
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum InterferenceMode {
    /// Use centroids when the MS1 data are centroided and profiles otherwise
    #[default]
    Auto,
    Profile,
    Centroid,
}

/// An [`InterferenceMode`] after inspecting the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResolvedMode {
    Centroid,
    Profile,
}

impl InterferenceMode {
    pub fn resolve(self, ms1_centroided: bool) -> Result<ResolvedMode, QuantError> {
        match (self, ms1_centroided) {
            (Self::Auto, true) | (Self::Centroid, _) => Ok(ResolvedMode::Centroid),
            (Self::Auto, false) | (Self::Profile, false) => Ok(ResolvedMode::Profile),
            (Self::Profile, true) => Err(QuantError::ProfileModeOnCentroidData),
        }
    }
}

impl FromStr for InterferenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "profile" => Ok(Self::Profile),
            "centroid" => Ok(Self::Centroid),
            _ => Err(format!("Unknown interference mode {s:?}")),
        }
    }
}

impl Display for InterferenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Profile => "profile",
            Self::Centroid => "centroid",
        };
        f.write_str(s)
    }
}

/// The precursor charge states whose isotope ladders are modeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsotopeCharge {
    Two,
    Three,
    Four,
}

impl TryFrom<i32> for IsotopeCharge {
    type Error = QuantError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            4 => Ok(Self::Four),
            _ => Err(QuantError::UnsupportedCharge(value)),
        }
    }
}

impl IsotopeCharge {
    pub fn value(&self) -> i32 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    pub fn spacing(&self) -> f64 {
        ISOTOPE_SPACING / self.value() as f64
    }

    fn seeks_lower_isotope(&self, precursor_mz: f64) -> bool {
        precursor_mz * self.value() as f64 > LOWER_ISOTOPE_MASS_THRESHOLD
    }

    /// Isotope positions searched among centroids, as (isotope index, m/z)
    pub fn centroid_isotopes(&self, precursor_mz: f64) -> Vec<(i32, f64)> {
        let step = self.spacing();
        let mut isotopes = vec![(1, precursor_mz + step)];
        if self.seeks_lower_isotope(precursor_mz) {
            isotopes.push((-1, precursor_mz - step));
        }
        isotopes
    }

    /// Isotope positions searched in a profile trace. Highly charged precursors
    /// also reach for the second isotope at the edge of the window.
    pub fn profile_isotopes(&self, precursor_mz: f64) -> Vec<(i32, f64)> {
        let step = self.spacing();
        let mut isotopes = vec![(1, precursor_mz + step)];
        if self.seeks_lower_isotope(precursor_mz) {
            isotopes.push((-1, precursor_mz - step));
            if matches!(self, Self::Four) {
                isotopes.push((2, precursor_mz + 2.0 * step));
            }
        }
        isotopes
    }
}

/// An ion assigned to the selected precursor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorIon {
    /// 0 for the selected ion, otherwise the isotope offset
    pub isotope: i32,
    pub mz: f64,
    /// Intensity for centroids, integrated area for profiles
    pub signal: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterferenceEstimate {
    /// Percent of the isolation window signal not assigned to the precursor
    pub interference: f64,
    pub total_signal: f64,
    pub precursor_signal: f64,
    pub precursor_ions: Vec<PrecursorIon>,
    /// The m/z of every remaining centroid in the window. Profile estimates leave
    /// this empty.
    pub interfering_mzs: Vec<f64>,
}

/// The interference outcome for one MS2 scan
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanInterference {
    Estimated(InterferenceEstimate),
    /// Nothing in the window to compare against
    Undefined,
    UnsupportedCharge(i32),
}

impl ScanInterference {
    /// The interference percentage, NaN when it could not be estimated
    pub fn value(&self) -> f64 {
        match self {
            Self::Estimated(est) => est.interference,
            _ => f64::NAN,
        }
    }

    pub fn estimate(&self) -> Option<&InterferenceEstimate> {
        match self {
            Self::Estimated(est) => Some(est),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Estimated(_))
    }
}

/// The MS1 peak data available for a precursor scan
#[derive(Debug, Clone, Copy)]
pub struct Ms1Spectrum<'a> {
    pub centroids: &'a PeakList,
    pub profile: Option<&'a PeakList>,
}

fn snap_to_zero(value: f64) -> f64 {
    if value.abs() < ZERO_SNAP_THRESHOLD {
        0.0
    } else {
        value
    }
}

fn interference_percent(total: f64, assigned: f64) -> f64 {
    snap_to_zero((total - assigned) / total * 100.0)
}

/// The local derivative of `y` over unevenly spaced `x`, second order accurate
/// in the interior and first order at the ends.
pub fn gradient(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return vec![0.0; n];
    }
    let mut grad = Vec::with_capacity(n);
    grad.push((y[1] - y[0]) / (x[1] - x[0]));
    for i in 1..n - 1 {
        let hs = x[i] - x[i - 1];
        let hd = x[i + 1] - x[i];
        let g = (hs.powi(2) * y[i + 1] + (hd.powi(2) - hs.powi(2)) * y[i] - hd.powi(2) * y[i - 1])
            / (hs * hd * (hd + hs));
        grad.push(g);
    }
    grad.push((y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]));
    grad
}

/// Walk outward from `apex` while the trace keeps rising toward it. The
/// first point where the trend breaks is kept as the boundary, and the walk
/// stops at the ends of the data.
fn peak_bounds(grad: &[f64], apex: usize) -> (usize, usize) {
    let last = grad.len().saturating_sub(1);
    let mut lo = apex.saturating_sub(1);
    while lo > 0 && grad[lo] > 0.0 {
        lo -= 1;
    }
    let mut hi = (apex + 1).min(last);
    while hi < last && grad[hi] < 0.0 {
        hi += 1;
    }
    (lo, hi)
}

/// Total area under the union of closed index intervals
fn union_area(x: &[f64], y: &[f64], intervals: &[(usize, usize)]) -> f64 {
    let mut sorted = intervals.to_vec();
    sorted.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(sorted.len());
    for (lo, hi) in sorted {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
        .into_iter()
        .map(|(lo, hi)| trapezoid(&x[lo..=hi], &y[lo..=hi]))
        .sum()
}

/// Estimates precursor interference from MS1 centroids or profiles
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterferenceEngine {
    /// The largest accepted isotope peak mass error in ppm
    pub isotope_tolerance: f64,
}

impl Default for InterferenceEngine {
    fn default() -> Self {
        Self {
            isotope_tolerance: DEFAULT_ISOTOPE_PPM_TOLERANCE,
        }
    }
}

impl InterferenceEngine {
    pub fn new(isotope_tolerance: f64) -> Self {
        Self { isotope_tolerance }
    }

    /// Estimate the interference of one precursor selection.
    ///
    /// Unsupported charges and missing data are reported through the returned
    /// [`ScanInterference`], never as errors.
    pub fn estimate(
        &self,
        mode: ResolvedMode,
        spectrum: Ms1Spectrum<'_>,
        precursor_mz: f64,
        precursor_charge: i32,
        isolation_width: f64,
    ) -> ScanInterference {
        let charge = match IsotopeCharge::try_from(precursor_charge) {
            Ok(charge) => charge,
            Err(_) => {
                debug!(
                    precursor_mz,
                    charge = precursor_charge,
                    "Precursor charge is not modeled"
                );
                return ScanInterference::UnsupportedCharge(precursor_charge);
            }
        };
        let estimate = match mode {
            ResolvedMode::Centroid => {
                self.centroid(spectrum.centroids, precursor_mz, charge, isolation_width)
            }
            ResolvedMode::Profile => match spectrum.profile {
                Some(profile) => self.profile(
                    profile,
                    spectrum.centroids,
                    precursor_mz,
                    charge,
                    isolation_width,
                ),
                None => {
                    debug!(precursor_mz, "No profile data for the precursor scan");
                    None
                }
            },
        };
        match estimate {
            Some(est) => ScanInterference::Estimated(est),
            None => ScanInterference::Undefined,
        }
    }

    /// Estimate interference from centroided MS1 peaks.
    ///
    /// Returns `None` when the isolation window holds no signal.
    pub fn centroid(
        &self,
        peaks: &PeakList,
        precursor_mz: f64,
        charge: IsotopeCharge,
        isolation_width: f64,
    ) -> Option<InterferenceEstimate> {
        let half_width = isolation_width / 2.0;
        let low = precursor_mz - half_width;
        let high = precursor_mz + half_width;
        let window = peaks.between_inclusive(low, high);
        let total: f64 = window.iter().map(|p| p.intensity).sum();
        if window.is_empty() || total <= 0.0 {
            trace!(precursor_mz, "Isolation window is empty");
            return None;
        }
        let in_window = |p: &Peak| low <= p.mz && p.mz <= high;

        let precursor = peaks
            .has_peak(precursor_mz, Tolerance::Da(half_width))
            .filter(|&p| in_window(p))?;
        let mut assigned: Vec<(i32, &Peak)> = vec![(0, precursor)];

        for (isotope, target) in charge.centroid_isotopes(precursor_mz) {
            let found = peaks
                .has_peak(target, Tolerance::PPM(self.isotope_tolerance))
                .filter(|&p| {
                    in_window(p)
                        && !assigned
                            .iter()
                            .any(|(_, q)| q.get_index() == p.get_index())
                });
            match found {
                Some(p) => assigned.push((isotope, p)),
                None => {
                    debug!(
                        precursor_mz,
                        charge = charge.value(),
                        isotope,
                        "Isotope peak not present"
                    );
                }
            }
        }

        let precursor_ions: Vec<PrecursorIon> = assigned
            .iter()
            .map(|(isotope, p)| PrecursorIon {
                isotope: *isotope,
                mz: p.mz,
                signal: p.intensity,
            })
            .collect();
        let precursor_signal: f64 = precursor_ions.iter().map(|p| p.signal).sum();
        let interfering_mzs = window
            .iter()
            .filter(|p| !assigned.iter().any(|(_, q)| q.get_index() == p.get_index()))
            .map(|p| p.mz)
            .collect();

        Some(InterferenceEstimate {
            interference: interference_percent(total, precursor_signal),
            total_signal: total,
            precursor_signal,
            precursor_ions,
            interfering_mzs,
        })
    }

    /// Estimate interference by integrating the MS1 profile trace.
    ///
    /// The apex search width around each ion is derived from the resolution of
    /// the centroid nearest the precursor. Returns `None` when the window is
    /// empty, no resolution is known, or no apex is found near the precursor.
    pub fn profile(
        &self,
        profile: &PeakList,
        centroids: &PeakList,
        precursor_mz: f64,
        charge: IsotopeCharge,
        isolation_width: f64,
    ) -> Option<InterferenceEstimate> {
        let half_width = isolation_width / 2.0;
        let window = profile.between_inclusive(precursor_mz - half_width, precursor_mz + half_width);
        if window.is_empty() {
            trace!(precursor_mz, "Isolation window is empty");
            return None;
        }

        let resolution = centroids
            .find_nearest(precursor_mz)
            .and_then(|p| p.resolution)
            .filter(|r| r.is_finite() && *r > 0.0);
        let Some(resolution) = resolution else {
            debug!(precursor_mz, "No resolution available near the precursor");
            return None;
        };

        let x: Vec<f64> = window.iter().map(|p| p.mz).collect();
        let y: Vec<f64> = window.iter().map(|p| p.intensity).collect();
        let total = trapezoid(&x, &y);
        if total <= 0.0 {
            trace!(precursor_mz, "Isolation window has no area");
            return None;
        }
        let grad = gradient(&x, &y);

        let Some(apex) = apex_near(profile, window, precursor_mz, resolution) else {
            debug!(precursor_mz, "No precursor apex found in the profile");
            return None;
        };
        let bounds = peak_bounds(&grad, apex);
        let mut intervals = vec![bounds];
        let mut precursor_ions = vec![PrecursorIon {
            isotope: 0,
            mz: x[apex],
            signal: trapezoid(&x[bounds.0..=bounds.1], &y[bounds.0..=bounds.1]),
        }];

        for (isotope, target) in charge.profile_isotopes(precursor_mz) {
            let Some(apex) = apex_near(profile, window, target, resolution) else {
                debug!(
                    precursor_mz,
                    charge = charge.value(),
                    isotope,
                    "Isotope peak not present"
                );
                continue;
            };
            if intervals.iter().any(|(lo, hi)| *lo <= apex && apex <= *hi) {
                trace!(precursor_mz, isotope, "Isotope apex already integrated");
                continue;
            }
            let bounds = peak_bounds(&grad, apex);
            intervals.push(bounds);
            precursor_ions.push(PrecursorIon {
                isotope,
                mz: x[apex],
                signal: trapezoid(&x[bounds.0..=bounds.1], &y[bounds.0..=bounds.1]),
            });
        }

        let precursor_signal = union_area(&x, &y, &intervals);
        Some(InterferenceEstimate {
            interference: interference_percent(total, precursor_signal),
            total_signal: total,
            precursor_signal,
            precursor_ions,
            interfering_mzs: Vec::new(),
        })
    }
}

/// The position in `window` of the most intense point of `profile` within
/// `target ± target / resolution`
fn apex_near(profile: &PeakList, window: &[Peak], target: f64, resolution: f64) -> Option<usize> {
    let offset = window.first()?.get_index() as usize;
    let in_window = |p: &&Peak| {
        let i = p.get_index() as usize;
        offset <= i && i < offset + window.len()
    };
    profile
        .find_within(target, Tolerance::Da(target / resolution))
        .iter()
        .filter(in_window)
        .fold(None, |best: Option<&Peak>, p| match best {
            Some(b) if b.intensity >= p.intensity => Some(b),
            _ => Some(p),
        })
        .filter(|p| p.intensity > 0.0)
        .map(|p| p.get_index() as usize - offset)
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    fn make_centroids() -> PeakList {
        PeakList::new(vec![
            Peak::new(499.2, 50.0),
            Peak::new(500.0, 800.0),
            Peak::new(500.3345, 120.0),
            Peak::new(501.0, 30.0),
        ])
    }

    /// A sum of gaussians sampled every 0.001 m/z
    fn make_profile(apexes: &[(f64, f64)], start: f64, end: f64) -> PeakList {
        let sigma: f64 = 0.004;
        let mut mz = start;
        let mut points = Vec::new();
        while mz <= end {
            let intensity: f64 = apexes
                .iter()
                .map(|(center, height)| height * (-(mz - center).powi(2) / (2.0 * sigma * sigma)).exp())
                .sum();
            points.push(Peak::new(mz, intensity));
            mz += 0.001;
        }
        PeakList::new(points)
    }

    #[test]
    fn test_mode_resolution() {
        assert_eq!(InterferenceMode::Auto.resolve(true).unwrap(), ResolvedMode::Centroid);
        assert_eq!(InterferenceMode::Auto.resolve(false).unwrap(), ResolvedMode::Profile);
        assert_eq!(InterferenceMode::Centroid.resolve(false).unwrap(), ResolvedMode::Centroid);
        assert_eq!(
            InterferenceMode::Profile.resolve(true),
            Err(QuantError::ProfileModeOnCentroidData)
        );
        assert_eq!("Profile".parse::<InterferenceMode>().unwrap(), InterferenceMode::Profile);
        assert!("guess".parse::<InterferenceMode>().is_err());
    }

    #[test]
    fn test_charges() {
        assert!(matches!(IsotopeCharge::try_from(1), Err(QuantError::UnsupportedCharge(1))));
        assert!(matches!(IsotopeCharge::try_from(5), Err(QuantError::UnsupportedCharge(5))));
        let z = IsotopeCharge::try_from(4).unwrap();
        assert_is_close!(z.spacing(), 0.25083875, 1e-9, "spacing");
        assert_eq!(z.centroid_isotopes(200.0).len(), 1);
        assert_eq!(z.centroid_isotopes(300.0).len(), 2);
        assert_eq!(z.profile_isotopes(300.0).len(), 3);
        assert_eq!(IsotopeCharge::Three.profile_isotopes(400.0).len(), 2);
    }

    #[test_log::test]
    fn test_centroid_interference() {
        let engine = InterferenceEngine::default();
        let peaks = make_centroids();
        let est = engine
            .centroid(&peaks, 500.0, IsotopeCharge::Three, 2.0)
            .unwrap();
        assert_is_close!(est.interference, 8.0, 1e-9, "interference");
        assert_eq!(est.total_signal, 1000.0);
        assert_eq!(est.precursor_signal, 920.0);
        assert_eq!(est.precursor_ions.len(), 2);
        assert_eq!(est.precursor_ions[0].mz, 500.0);
        assert_eq!(est.precursor_ions[1].isotope, 1);
        assert_eq!(est.interfering_mzs, vec![499.2, 501.0]);

        let again = engine
            .centroid(&peaks, 500.0, IsotopeCharge::Three, 2.0)
            .unwrap();
        assert_eq!(est, again);
    }

    #[test]
    fn test_empty_window_is_undefined() {
        let engine = InterferenceEngine::default();
        let peaks = make_centroids();
        assert!(engine
            .centroid(&peaks, 800.0, IsotopeCharge::Two, 2.0)
            .is_none());
        let result = engine.estimate(
            ResolvedMode::Centroid,
            Ms1Spectrum {
                centroids: &peaks,
                profile: None,
            },
            800.0,
            2,
            2.0,
        );
        assert_eq!(result, ScanInterference::Undefined);
        assert!(result.value().is_nan());
    }

    #[test]
    fn test_unsupported_charge() {
        let engine = InterferenceEngine::default();
        let peaks = make_centroids();
        let result = engine.estimate(
            ResolvedMode::Centroid,
            Ms1Spectrum {
                centroids: &peaks,
                profile: None,
            },
            500.0,
            1,
            2.0,
        );
        assert_eq!(result, ScanInterference::UnsupportedCharge(1));
    }

    #[test]
    fn test_pure_precursor_snaps_to_zero() {
        let engine = InterferenceEngine::default();
        let step = IsotopeCharge::Two.spacing();
        let peaks = PeakList::new(vec![
            Peak::new(600.0 - step, 300.0),
            Peak::new(600.0, 1000.0),
            Peak::new(600.0 + step, 700.0),
        ]);
        let est = engine.centroid(&peaks, 600.0, IsotopeCharge::Two, 3.0).unwrap();
        assert_eq!(est.interference, 0.0);
        assert_eq!(est.precursor_ions.len(), 3);
        assert!(est.interfering_mzs.is_empty());
    }

    #[test]
    fn test_isotope_tolerance_boundary() {
        let engine = InterferenceEngine::default();
        let target = 500.0 + IsotopeCharge::Two.spacing();
        let shifted = |ppm: f64| target + target * ppm / 1e6;

        let peaks = PeakList::new(vec![Peak::new(500.0, 100.0), Peak::new(shifted(3.9999), 100.0)]);
        let est = engine.centroid(&peaks, 500.0, IsotopeCharge::Two, 2.0).unwrap();
        assert_eq!(est.interference, 0.0);

        let peaks = PeakList::new(vec![Peak::new(500.0, 100.0), Peak::new(shifted(4.0001), 100.0)]);
        let est = engine.centroid(&peaks, 500.0, IsotopeCharge::Two, 2.0).unwrap();
        assert_is_close!(est.interference, 50.0, 1e-9, "interference");

        let peaks = PeakList::new(vec![Peak::new(500.0, 100.0), Peak::new(target, 100.0)]);
        let est = engine.centroid(&peaks, 500.0, IsotopeCharge::Two, 2.0).unwrap();
        assert_eq!(est.interference, 0.0);
    }

    #[test]
    fn test_gradient() {
        let x = [0.0, 1.0, 3.0, 4.0];
        let y = [0.0, 1.0, 9.0, 16.0];
        let g = gradient(&x, &y);
        assert_eq!(g.len(), 4);
        assert_is_close!(g[0], 1.0, 1e-12, "left edge");
        assert_is_close!(g[1], 2.0, 1e-12, "interior");
        assert_is_close!(g[2], 6.0, 1e-12, "interior");
        assert_is_close!(g[3], 7.0, 1e-12, "right edge");
        assert_eq!(gradient(&[1.0], &[1.0]), vec![0.0]);
    }

    #[test]
    fn test_peak_bounds_clamp() {
        let grad = [-1.0, -1.0, -1.0];
        assert_eq!(peak_bounds(&grad, 0), (0, 2));
        let grad = [1.0, 1.0, 1.0];
        assert_eq!(peak_bounds(&grad, 2), (0, 2));
        let grad = [0.5, 1.0, 0.0, -1.0, -1.0, 0.2, 0.3];
        assert_eq!(peak_bounds(&grad, 2), (0, 5));
    }

    #[test]
    fn test_union_area() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(union_area(&x, &y, &[(0, 2), (1, 3)]), 3.0);
        assert_eq!(union_area(&x, &y, &[(0, 1), (3, 4)]), 2.0);
    }

    #[test_log::test]
    fn test_profile_interference() {
        let engine = InterferenceEngine::default();
        let step = IsotopeCharge::Two.spacing();
        let centroids = PeakList::new(vec![Peak::new(400.0, 1000.0).with_resolution(60000.0)]);

        let pure = make_profile(&[(400.0, 1000.0), (400.0 + step, 400.0)], 399.0, 401.0);
        let est = engine
            .profile(&pure, &centroids, 400.0, IsotopeCharge::Two, 2.0)
            .unwrap();
        assert!(est.interference < 1.0, "{}", est.interference);
        assert_eq!(est.precursor_ions.len(), 2);

        let contaminated = make_profile(
            &[(400.0, 1000.0), (400.0 + step, 400.0), (399.6, 1400.0)],
            399.0,
            401.0,
        );
        let est = engine
            .profile(&contaminated, &centroids, 400.0, IsotopeCharge::Two, 2.0)
            .unwrap();
        assert_is_close!(est.interference, 50.0, 1.0, "interference");
        assert!(est.interference <= 100.0);
    }

    #[test]
    fn test_profile_requires_resolution() {
        let engine = InterferenceEngine::default();
        let profile = make_profile(&[(400.0, 1000.0)], 399.0, 401.0);
        let centroids = PeakList::new(vec![Peak::new(400.0, 1000.0)]);
        assert!(engine
            .profile(&profile, &centroids, 400.0, IsotopeCharge::Two, 2.0)
            .is_none());

        let centroids = PeakList::new(vec![Peak::new(400.0, 1000.0).with_resolution(60000.0)]);
        let far = make_profile(&[(399.5, 1000.0)], 399.0, 401.0);
        assert!(engine
            .profile(&far, &centroids, 400.0, IsotopeCharge::Two, 2.0)
            .is_none());
    }
}
