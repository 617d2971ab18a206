use thiserror::Error;

use crate::scan::{ScanId, SourceError};

/// An error that stops a quantification operation.
///
/// Missing observations are not errors: empty match windows, absent
/// isotope peaks and singular corrections are carried as `None`, NaN or a
/// status value instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuantError {
    #[error("Impurity table labels {impurity:?} must exactly match the reporter labels {reporter:?}")]
    ChannelLabelMismatch {
        reporter: Vec<String>,
        impurity: Vec<String>,
    },
    #[error("Precursor charge {0} is not supported, only charges 2, 3 and 4 are modeled")]
    UnsupportedCharge(i32),
    #[error("Profile mode interference was requested but the MS1 data are centroided")]
    ProfileModeOnCentroidData,
    #[error("Invalid impurity table: {0}")]
    InvalidImpurityTable(String),
    #[error("Invalid reporter channel set: {0}")]
    InvalidReporterSet(String),
    #[error("Unknown reagent {0:?}")]
    UnknownReagent(String),
    #[error("The reporter channel set is empty")]
    EmptyChannelSet,
    #[error("No scans of MS order {0} were found")]
    NoScansOfOrder(u8),
    #[error("Precursor-dependent processing requires an analysis order of at least 2, got {0}")]
    AnalysisOrderTooLow(u8),
    #[error("Scan {0} has no resolvable precursor scan")]
    MissingPrecursorScan(ScanId),
    #[error("Processing was cancelled")]
    Cancelled,
    #[error("Failed to read from the scan source: {0}")]
    Source(
        #[source]
        #[from]
        SourceError,
    ),
}
