//! Parallel quantification of many files
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use isoquant::{
    Checkpoint, CorrectionMatrix, ImpurityTable, PipelineStage, PipelineSummary, QuantError,
    QuantParams, QuantPipeline, ReporterSet, ScanId, ScanRecord, ScanSource, SourceOpener,
};

use crate::config::QuanterConfig;
use crate::progress::{collect_progress, ProgressEvent, ProgressRecord};
use crate::QuanterError;

/// How many quantified scans pass between progress messages
const REPORT_EVERY: usize = 5000;

/// The output of one successfully quantified file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub summary: PipelineSummary,
    pub records: Vec<ScanRecord>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Quantified files in input order
    pub files: Vec<FileReport>,
    /// Files that could not be quantified, in input order
    pub failures: Vec<(PathBuf, QuanterError)>,
    pub progress: ProgressRecord,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Forwards per-scan progress and polls a shared cancellation flag
struct ChannelCheckpoint<'a> {
    file: Arc<str>,
    sender: &'a Sender<ProgressEvent>,
    cancel: &'a AtomicBool,
}

impl Checkpoint for ChannelCheckpoint<'_> {
    fn scan_complete(&self, stage: PipelineStage, scan_id: ScanId) -> Result<(), QuantError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(QuantError::Cancelled);
        }
        if let Err(e) = self.sender.send(ProgressEvent::ScanComplete {
            file: self.file.clone(),
            stage,
            scan_id,
        }) {
            trace!("Failed to send progress: {e}");
        }
        Ok(())
    }
}

/// Quantify every scan of one source
pub fn process_file<S: ScanSource + ?Sized, C: Checkpoint>(
    path: &Path,
    source: &S,
    reporters: ReporterSet,
    impurities: Option<ImpurityTable>,
    params: QuantParams,
    checkpoint: C,
) -> Result<FileReport, QuantError> {
    let started = Instant::now();
    let mut pipeline = QuantPipeline::with_checkpoint(source, reporters, params, checkpoint);
    if let Some(table) = impurities {
        pipeline.load_impurities(table)?;
    }
    let records = pipeline.records()?;
    let summary = pipeline.summary()?;
    debug!(
        "Quantified {} in {:0.3?}",
        path.display(),
        Instant::now() - started
    );
    Ok(FileReport {
        path: path.to_path_buf(),
        summary,
        records,
    })
}

fn open_and_process<O: SourceOpener>(
    opener: &O,
    path: &Path,
    reporters: &ReporterSet,
    impurities: Option<&ImpurityTable>,
    params: &QuantParams,
    sender: &Sender<ProgressEvent>,
    cancel: &AtomicBool,
) -> Result<FileReport, QuanterError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(QuantError::Cancelled.into());
    }
    let source = opener.open(path).map_err(QuantError::from)?;
    let checkpoint = ChannelCheckpoint {
        file: Arc::from(source.file_name()),
        sender,
        cancel,
    };
    let report = process_file(
        path,
        &source,
        reporters.clone(),
        impurities.cloned(),
        params.clone(),
        checkpoint,
    )?;
    Ok(report)
}

/// Quantify every input file of `config` in parallel.
///
/// A file that fails is recorded in [`BatchReport::failures`] without
/// stopping the others. Only problems shared by every file, like unreadable
/// tables or a reporter set that does not match the impurity table, fail the
/// whole batch. Setting `cancel` stops the remaining work at the next scan.
pub fn run_batch<O: SourceOpener + Sync>(
    opener: &O,
    config: &QuanterConfig,
    cancel: Arc<AtomicBool>,
) -> Result<BatchReport, QuanterError> {
    info!(
        "isoquanter v{}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    if let Some(dump) = config.to_toml() {
        debug!("Configuration:\n{dump}");
    }

    let reporters = config.reporter_set()?;
    let impurities = config.impurity_table()?;
    if let Some(table) = impurities.as_ref() {
        CorrectionMatrix::build(&reporters, table)?;
    }
    info!(
        "Quantifying {} files with {} channels: {}",
        config.input_files.len(),
        reporters.len(),
        reporters.labels().iter().join(", ")
    );

    let pool = config.create_threadpool()?;
    let (sender, receiver) = crossbeam_channel::unbounded();
    let collector = thread::spawn(move || collect_progress(receiver, REPORT_EVERY));

    let started = Instant::now();
    let results: Vec<(PathBuf, Result<FileReport, QuanterError>)> = pool.install(|| {
        config
            .input_files
            .par_iter()
            .map(|path| {
                let span = tracing::info_span!("file", path = %path.display());
                let _entered = span.enter();
                let file: Arc<str> = Arc::from(path.display().to_string());
                if let Err(e) = sender.send(ProgressEvent::FileStarted { file: file.clone() }) {
                    trace!("Failed to send progress: {e}");
                }
                let result = open_and_process(
                    opener,
                    path,
                    &reporters,
                    impurities.as_ref(),
                    &config.params,
                    &sender,
                    &cancel,
                );
                let event = match &result {
                    Ok(report) => ProgressEvent::FileFinished {
                        file,
                        record: ProgressRecord::from(&report.summary),
                    },
                    Err(e) => ProgressEvent::FileFailed {
                        file,
                        reason: e.to_string(),
                    },
                };
                if let Err(e) = sender.send(event) {
                    trace!("Failed to send progress: {e}");
                }
                (path.clone(), result)
            })
            .collect()
    });
    drop(sender);

    let progress = match collector.join() {
        Ok(progress) => progress,
        Err(e) => {
            warn!("Failed to join progress collector: {e:?}");
            ProgressRecord::default()
        }
    };

    let mut report = BatchReport {
        progress,
        ..Default::default()
    };
    for (path, result) in results {
        match result {
            Ok(file) => report.files.push(file),
            Err(e) => report.failures.push((path, e)),
        }
    }

    info!(
        "Quantified {} scans from {} files ({} failed) in {:0.3?}",
        report.progress.scans_quantified,
        report.files.len(),
        report.failures.len(),
        Instant::now() - started
    );
    info!(
        "Ambiguous reporter matches: {} | Missing reporter matches: {}",
        report.progress.ambiguous_matches, report.progress.missing_matches
    );
    info!(
        "Undefined interference: {} | Unsupported charges: {} | Singular corrections: {}",
        report.progress.undefined_interference,
        report.progress.unsupported_charges,
        report.progress.singular_corrections
    );
    Ok(report)
}
