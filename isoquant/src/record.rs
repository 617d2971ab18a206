//! Flat per-scan output records
use crate::elution::PrecursorElution;
use crate::envelope::EnvelopeMatch;
use crate::impurity::CorrectionStatus;
use crate::reporter::QuantResult;
use crate::scan::ScanId;

/// One reporter channel of a [`ScanRecord`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelRecord {
    pub label: String,
    pub target_mass: f64,
    pub mass: f64,
    pub ppm: f64,
    pub intensity: f64,
    pub resolution: f64,
    pub baseline: f64,
    pub noise: f64,
    /// The impurity corrected intensity, when a correction was applied
    pub corrected_intensity: Option<f64>,
}

impl ChannelRecord {
    pub fn new(label: &str, target_mass: f64, quant: &QuantResult, corrected: Option<f64>) -> Self {
        Self {
            label: label.to_string(),
            target_mass,
            mass: quant.mass,
            ppm: quant.ppm,
            intensity: quant.intensity,
            resolution: quant.resolution,
            baseline: quant.baseline,
            noise: quant.noise,
            corrected_intensity: corrected,
        }
    }
}

/// Everything known about one quantified scan
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanRecord {
    pub scan_id: ScanId,
    pub ms_order: u8,
    pub retention_time: f64,
    /// The MS2 scan an MS3 scan was derived from
    pub ms2_scan: Option<ScanId>,
    /// The MS1 scan the precursor was selected in
    pub ms1_scan: Option<ScanId>,
    /// The precursor selected from the MS1 scan, NaN when unknown
    pub precursor_mz: f64,
    pub precursor_charge: Option<i32>,
    /// Percent precursor interference, NaN when it could not be estimated
    pub interference: f64,
    pub channels: Vec<ChannelRecord>,
    pub correction: Option<CorrectionStatus>,
    pub elution: Option<PrecursorElution>,
    pub envelope: Option<EnvelopeMatch>,
}

impl ScanRecord {
    pub fn intensities(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.intensity).collect()
    }

    pub fn corrected_intensities(&self) -> Option<Vec<f64>> {
        self.channels.iter().map(|c| c.corrected_intensity).collect()
    }
}
