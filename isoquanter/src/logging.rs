use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::QuanterError;

fn make_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
}

/// Install the global subscriber, logging to STDERR and optionally to
/// `log_file` as well.
///
/// The returned guard flushes the log file when dropped and must be held for
/// as long as logging is needed.
pub fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, QuanterError> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let handle = fs::File::create(path)?;
            let (writer, guard) = tracing_appender::non_blocking(handle);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(make_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_filter(make_filter()),
        )
        .with(file_layer);

    LogTracer::init().map_err(|e| QuanterError::LoggingError(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| QuanterError::LoggingError(e.to_string()))?;
    Ok(guard)
}
