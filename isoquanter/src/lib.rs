//! Batch quantification of isobaric-tag runs on top of [`isoquant`].
//!
//! Configuration is layered with `figment`, reporter and impurity tables are
//! read from CSV, and files are quantified in parallel on a `rayon` pool.
use std::io;

use thiserror::Error;

use isoquant::QuantError;

pub mod batch;
pub mod config;
pub mod logging;
pub mod progress;
pub mod tables;

pub use batch::{process_file, run_batch, BatchReport, FileReport};
pub use config::{load_config, QuanterConfig};
pub use logging::init_logging;
pub use progress::{ProgressEvent, ProgressRecord};
pub use tables::{read_impurity_table, read_reporter_table};

#[derive(Debug, Error)]
pub enum QuanterError {
    #[error("Quantification failed: {0}")]
    QuantError(
        #[source]
        #[from]
        QuantError,
    ),
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read a CSV table: {0}")]
    CsvError(
        #[source]
        #[from]
        csv::Error,
    ),
    #[error("Invalid configuration: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Malformed table {path}: {reason}")]
    TableFormatError { path: String, reason: String },
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
    #[error("Failed to install the logger: {0}")]
    LoggingError(String),
}
