//! Peak lists and the tolerance-bounded searches every other component is built on.
//!
//! [`PeakList`] is an m/z ordered [`MZPeakSetType`] of [`Peak`]. Searches go
//! through [`PeakCollection`], with the open or closed window edges each caller
//! expects applied on top.
use std::cmp::Ordering;
use std::ops::Index;
use std::slice;

use mzpeaks::{
    prelude::*, CoordinateLike, IndexType, IndexedCoordinate, IntensityMeasurement,
    MZPeakSetType, Tolerance, MZ,
};

/// A single centroid or profile point read from a spectrum.
///
/// Only `mz` and `intensity` are always present. The remaining annotations
/// depend on the analyzer that produced the spectrum.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
    pub resolution: Option<f64>,
    pub baseline: Option<f64>,
    pub noise: Option<f64>,
    pub charge: Option<i32>,
    /// Position in the owning [`PeakList`]
    #[cfg_attr(feature = "serde", serde(skip))]
    index: IndexType,
}

impl Peak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self {
            mz,
            intensity,
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_noise(mut self, baseline: f64, noise: f64) -> Self {
        self.baseline = Some(baseline);
        self.noise = Some(noise);
        self
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = Some(charge);
        self
    }
}

impl From<(f64, f64)> for Peak {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl PartialEq for Peak {
    fn eq(&self, other: &Self) -> bool {
        self.mz == other.mz
            && self.intensity == other.intensity
            && self.resolution == other.resolution
            && self.baseline == other.baseline
            && self.noise == other.noise
            && self.charge == other.charge
    }
}

impl PartialOrd for Peak {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            self.mz
                .total_cmp(&other.mz)
                .then_with(|| self.intensity.total_cmp(&other.intensity)),
        )
    }
}

impl CoordinateLike<MZ> for Peak {
    #[inline]
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IndexedCoordinate<MZ> for Peak {
    #[inline]
    fn get_index(&self) -> IndexType {
        self.index
    }

    #[inline]
    fn set_index(&mut self, index: IndexType) {
        self.index = index
    }
}

impl IntensityMeasurement for Peak {
    #[inline]
    fn intensity(&self) -> f32 {
        self.intensity as f32
    }
}

/// Whether a peak list holds discrete centroids or a continuous profile trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PeakKind {
    Centroid,
    Profile,
}

/// Drop the leading peaks matching `below` and the trailing peaks matching
/// `above`. Only the edges of `peaks` are inspected.
fn trim_edges<'a>(
    peaks: &'a [Peak],
    below: impl Fn(f64) -> bool,
    above: impl Fn(f64) -> bool,
) -> &'a [Peak] {
    let start = peaks.iter().take_while(|p| below(p.mz)).count();
    let end = peaks.len() - peaks.iter().rev().take_while(|p| above(p.mz)).count();
    if end <= start {
        &[]
    } else {
        &peaks[start..end]
    }
}

/// A peak list kept in ascending m/z order.
///
/// The ordering and each peak's index are established once on construction.
/// Peaks without a defined m/z are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakList {
    peaks: MZPeakSetType<Peak>,
}

impl Default for PeakList {
    fn default() -> Self {
        Self::empty()
    }
}

impl PeakList {
    pub fn new(mut peaks: Vec<Peak>) -> Self {
        peaks.retain(|p| !p.mz.is_nan());
        Self {
            peaks: MZPeakSetType::new(peaks),
        }
    }

    pub fn empty() -> Self {
        Self {
            peaks: MZPeakSetType::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        self.peaks.as_slice()
    }

    pub fn get(&self, index: usize) -> Option<&Peak> {
        self.as_slice().get(index)
    }

    pub fn mzs(&self) -> Vec<f64> {
        self.iter().map(|p| p.mz).collect()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.iter().map(|p| p.intensity).collect()
    }

    /// All peaks with m/z strictly inside `(low, high)`
    pub fn between(&self, low: f64, high: f64) -> &[Peak] {
        if !(low <= high) {
            return &[];
        }
        trim_edges(
            self.peaks.between(low, high, Tolerance::Da(0.0)),
            |mz| mz <= low,
            |mz| mz >= high,
        )
    }

    /// All peaks with m/z inside the closed interval `[low, high]`
    pub fn between_inclusive(&self, low: f64, high: f64) -> &[Peak] {
        if !(low <= high) {
            return &[];
        }
        trim_edges(
            self.peaks.between(low, high, Tolerance::Da(0.0)),
            |mz| mz < low,
            |mz| mz > high,
        )
    }

    /// All peaks with m/z in `(center - half_width, center + half_width)`.
    ///
    /// An empty slice is a normal outcome.
    pub fn find_window(&self, center: f64, half_width: f64) -> &[Peak] {
        self.between(center - half_width, center + half_width)
    }

    /// All peaks matching `target` within `tolerance`, bounds excluded
    pub fn find_within(&self, target: f64, tolerance: Tolerance) -> &[Peak] {
        if target.is_nan() || self.is_empty() {
            return &[];
        }
        let (low, high) = tolerance.bounds(target);
        trim_edges(
            self.peaks.all_peaks_for(target, tolerance),
            |mz| mz <= low,
            |mz| mz >= high,
        )
    }

    /// The peak nearest `target` whose error is within `tolerance`
    pub fn has_peak(&self, target: f64, tolerance: Tolerance) -> Option<&Peak> {
        if target.is_nan() {
            return None;
        }
        self.peaks.has_peak(target, tolerance)
    }

    /// The index of the peak minimizing `|mz - target|` with no bound on the
    /// distance, the lower m/z peak winning ties
    pub fn find_nearest_index(&self, target: f64) -> Option<usize> {
        let n = self.len();
        if n == 0 || target.is_nan() {
            return None;
        }
        match self.peaks.search_by(target) {
            Ok(i) => Some(i),
            Err(0) => Some(0),
            Err(i) if i >= n => Some(n - 1),
            Err(i) => {
                let below = target - self.peaks[i - 1].mz;
                let above = self.peaks[i].mz - target;
                if above < below {
                    Some(i)
                } else {
                    Some(i - 1)
                }
            }
        }
    }

    pub fn find_nearest(&self, target: f64) -> Option<&Peak> {
        self.find_nearest_index(target).map(|i| &self.peaks[i])
    }

    pub fn total_intensity(&self) -> f64 {
        self.iter().map(|p| p.intensity).sum()
    }
}

impl Index<usize> for PeakList {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl FromIterator<Peak> for PeakList {
    fn from_iter<T: IntoIterator<Item = Peak>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PeakList {
    type Item = &'a Peak;
    type IntoIter = slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

/// Pick the single best peak of a tolerance window, reporting whether more
/// than one candidate competed for it.
pub fn best_match(window: &[Peak], target: f64) -> Option<(&Peak, bool)> {
    let ambiguous = window.len() > 1;
    window
        .iter()
        .min_by(|a, b| {
            (a.mz - target)
                .abs()
                .partial_cmp(&(b.mz - target).abs())
                .unwrap_or(Ordering::Equal)
        })
        .map(|p| (p, ambiguous))
}

/// Relative mass error of `observed` against `expected`, in parts-per-million
#[inline]
pub fn ppm_error(observed: f64, expected: f64) -> f64 {
    (observed - expected) / expected * 1e6
}

/// Trapezoidal integration of `y` over `x`.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}
