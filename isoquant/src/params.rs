use crate::catalog::ScanCatalog;
use crate::error::QuantError;
use crate::interference::{InterferenceMode, DEFAULT_ISOTOPE_PPM_TOLERANCE};
use crate::reporter::DEFAULT_REPORTER_TOLERANCE;

/// Parameters controlling the quantification of one file
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct QuantParams {
    pub interference_mode: InterferenceMode,
    /// The MS order to quantify reporters in, or the deepest order present if unset
    pub analysis_order: Option<u8>,
    /// Half-width of the reporter match window in Da
    pub reporter_tolerance: f64,
    /// Mass accuracy required of precursor isotope peaks in ppm
    pub isotope_tolerance: f64,
    /// Follow each precursor across neighboring MS1 scans
    pub trace_elution: bool,
    /// Score precursor isotope envelopes against the sulfur models
    pub score_envelopes: bool,
}

impl Default for QuantParams {
    fn default() -> Self {
        Self {
            interference_mode: InterferenceMode::Auto,
            analysis_order: None,
            reporter_tolerance: DEFAULT_REPORTER_TOLERANCE,
            isotope_tolerance: DEFAULT_ISOTOPE_PPM_TOLERANCE,
            trace_elution: false,
            score_envelopes: false,
        }
    }
}

impl QuantParams {
    pub fn resolve_order(&self, catalog: &ScanCatalog) -> Result<u8, QuantError> {
        match self.analysis_order {
            Some(order) => {
                if catalog.scans_of_order(order).is_empty() {
                    Err(QuantError::NoScansOfOrder(order))
                } else {
                    Ok(order)
                }
            }
            None => catalog.max_order().ok_or(QuantError::NoScansOfOrder(1)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::PeakList;
    use crate::scan::{InMemoryScanSource, ScanData};

    #[test]
    fn test_resolve_order() {
        let source = InMemoryScanSource::new(
            "test.raw",
            vec![
                ScanData::ms1(1, 1.0, PeakList::empty()),
                ScanData::msn(2, 2, 1.1, 500.0, 2, 1.6, PeakList::empty()),
                ScanData::msn(3, 3, 1.2, 300.0, 2, 1.6, PeakList::empty()),
            ],
        );
        let catalog = ScanCatalog::from_source(&source).unwrap();
        let mut params = QuantParams::default();
        assert_eq!(params.resolve_order(&catalog).unwrap(), 3);
        params.analysis_order = Some(2);
        assert_eq!(params.resolve_order(&catalog).unwrap(), 2);
        params.analysis_order = Some(4);
        assert_eq!(
            params.resolve_order(&catalog).unwrap_err(),
            QuantError::NoScansOfOrder(4)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_partial() {
        let params: QuantParams =
            serde_json::from_str(r#"{"interference_mode": "profile", "analysis_order": 3}"#)
                .unwrap();
        assert_eq!(params.interference_mode, InterferenceMode::Profile);
        assert_eq!(params.analysis_order, Some(3));
        assert_eq!(params.reporter_tolerance, DEFAULT_REPORTER_TOLERANCE);
        assert!(!params.trace_elution);
    }
}
