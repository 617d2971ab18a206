//! `isoquant` quantifies isobaric-tag (TMT and iTRAQ) reporter ions in tandem
//! mass spectra, estimates how much of each precursor isolation window was
//! taken up by co-isolated ions, and corrects reporter intensities for the
//! isotopic impurities of the labeling reagents.
//!
//! The crate does not decode instrument files. Scans arrive through the
//! [`ScanSource`](crate::scan::ScanSource) trait, and a [`QuantPipeline`]
//! turns one source into a table of [`ScanRecord`]s.
pub mod catalog;
pub mod elution;
pub mod envelope;
pub mod error;
pub mod impurity;
pub mod interference;
pub mod params;
pub mod peaks;
pub mod pipeline;
pub mod reagents;
pub mod record;
pub mod reporter;
pub mod scan;

pub use crate::catalog::{PrecursorLink, PrecursorLinks, ScanCatalog};
pub use crate::envelope::{EnvelopeMatch, IsotopeEnvelopeScorer};
pub use crate::error::QuantError;
pub use crate::impurity::{CorrectedIntensities, CorrectionMatrix, CorrectionStatus, ImpurityTable};
pub use crate::interference::{InterferenceEngine, InterferenceMode, ScanInterference};
pub use crate::params::QuantParams;
pub use crate::peaks::{Peak, PeakKind, PeakList};
pub use crate::pipeline::{Checkpoint, NoCheckpoint, PipelineStage, PipelineSummary, QuantPipeline};
pub use crate::reagents::{ReagentKind, ReporterChannel, ReporterSet};
pub use crate::record::{ChannelRecord, ScanRecord};
pub use crate::reporter::{QuantResult, ReporterQuantifier};
pub use crate::scan::{InMemoryScanSource, ScanData, ScanId, ScanSource, SourceError, SourceOpener};
