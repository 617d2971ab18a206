//! Reporter ion matching
use std::collections::BTreeMap;

use mzpeaks::Tolerance;
use tracing::trace;

use crate::peaks::{best_match, ppm_error, PeakList};
use crate::reagents::{ReporterChannel, ReporterSet};
use crate::scan::ScanId;

/// The fixed half-width of a reporter ion match window in Da
pub const DEFAULT_REPORTER_TOLERANCE: f64 = 0.003;

/// The match for one reporter channel in one scan. Every field is NaN when
/// nothing matched.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuantResult {
    pub mass: f64,
    pub intensity: f64,
    pub ppm: f64,
    pub resolution: f64,
    pub baseline: f64,
    pub noise: f64,
    /// More than one peak fell in the match window
    pub ambiguous: bool,
}

impl QuantResult {
    pub fn missing() -> Self {
        Self {
            mass: f64::NAN,
            intensity: f64::NAN,
            ppm: f64::NAN,
            resolution: f64::NAN,
            baseline: f64::NAN,
            noise: f64::NAN,
            ambiguous: false,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.mass.is_nan()
    }
}

impl Default for QuantResult {
    fn default() -> Self {
        Self::missing()
    }
}

/// The reporter matches of one scan, in channel order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanQuant {
    pub scan_id: ScanId,
    pub channels: Vec<QuantResult>,
}

impl ScanQuant {
    pub fn intensities(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.intensity).collect()
    }

    pub fn ambiguous_count(&self) -> usize {
        self.channels.iter().filter(|c| c.ambiguous).count()
    }

    pub fn missing_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_missing()).count()
    }
}

/// Reporter matches for every quantified scan of a file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantTable {
    pub labels: Vec<String>,
    pub scans: BTreeMap<ScanId, ScanQuant>,
}

impl QuantTable {
    pub fn get(&self, scan_id: ScanId) -> Option<&ScanQuant> {
        self.scans.get(&scan_id)
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScanQuant> {
        self.scans.values()
    }
}

/// Matches reporter channel masses against a spectrum
#[derive(Debug, Clone)]
pub struct ReporterQuantifier {
    reporters: ReporterSet,
    tolerance: Tolerance,
}

impl ReporterQuantifier {
    pub fn new(reporters: ReporterSet) -> Self {
        Self::with_tolerance(reporters, DEFAULT_REPORTER_TOLERANCE)
    }

    pub fn with_tolerance(reporters: ReporterSet, tolerance_da: f64) -> Self {
        Self {
            reporters,
            tolerance: Tolerance::Da(tolerance_da),
        }
    }

    pub fn reporters(&self) -> &ReporterSet {
        &self.reporters
    }

    pub fn labels(&self) -> Vec<String> {
        self.reporters.iter().map(|c| c.label.clone()).collect()
    }

    /// Find the peak for one channel. The window bounds are excluded and the
    /// peak nearest the channel mass wins when several match.
    pub fn match_channel(&self, peaks: &PeakList, channel: &ReporterChannel) -> QuantResult {
        let window = peaks.find_within(channel.mass, self.tolerance);
        let Some((peak, ambiguous)) = best_match(window, channel.mass) else {
            return QuantResult::missing();
        };
        if ambiguous {
            trace!(
                label = %channel.label,
                "{} peaks matched, using the nearest",
                window.len()
            );
        }
        let ppm = if peak.intensity != 0.0 && !peak.intensity.is_nan() {
            ppm_error(peak.mz, channel.mass)
        } else {
            f64::NAN
        };
        QuantResult {
            mass: peak.mz,
            intensity: peak.intensity,
            ppm,
            resolution: peak.resolution.unwrap_or(f64::NAN),
            baseline: peak.baseline.unwrap_or(f64::NAN),
            noise: peak.noise.unwrap_or(f64::NAN),
            ambiguous,
        }
    }

    pub fn quantify(&self, scan_id: ScanId, peaks: &PeakList) -> ScanQuant {
        let channels = self
            .reporters
            .iter()
            .map(|channel| self.match_channel(peaks, channel))
            .collect();
        ScanQuant { scan_id, channels }
    }
}
