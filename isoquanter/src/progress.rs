use std::ops::{Add, AddAssign};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use isoquant::{PipelineStage, PipelineSummary, ScanId};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub files_processed: usize,
    pub files_failed: usize,
    pub scans_quantified: usize,
    pub ambiguous_matches: usize,
    pub missing_matches: usize,
    pub undefined_interference: usize,
    pub unsupported_charges: usize,
    pub singular_corrections: usize,
}

impl From<&PipelineSummary> for ProgressRecord {
    fn from(value: &PipelineSummary) -> Self {
        Self {
            files_processed: 1,
            files_failed: 0,
            scans_quantified: value.scans_quantified,
            ambiguous_matches: value.ambiguous_matches,
            missing_matches: value.missing_matches,
            undefined_interference: value.undefined_interference,
            unsupported_charges: value.unsupported_charges,
            singular_corrections: value.singular_corrections,
        }
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.files_processed += rhs.files_processed;
        self.files_failed += rhs.files_failed;
        self.scans_quantified += rhs.scans_quantified;
        self.ambiguous_matches += rhs.ambiguous_matches;
        self.missing_matches += rhs.missing_matches;
        self.undefined_interference += rhs.undefined_interference;
        self.unsupported_charges += rhs.unsupported_charges;
        self.singular_corrections += rhs.singular_corrections;
    }
}

/// Messages sent from file workers to the progress collector
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FileStarted {
        file: Arc<str>,
    },
    ScanComplete {
        file: Arc<str>,
        stage: PipelineStage,
        scan_id: ScanId,
    },
    FileFinished {
        file: Arc<str>,
        record: ProgressRecord,
    },
    FileFailed {
        file: Arc<str>,
        reason: String,
    },
}

/// Drain `receiver` until every sender hangs up, logging every
/// `report_every` quantified scans
pub fn collect_progress(receiver: Receiver<ProgressEvent>, report_every: usize) -> ProgressRecord {
    let mut total = ProgressRecord::default();
    let mut scans_seen = 0usize;
    for event in receiver.iter() {
        match event {
            ProgressEvent::FileStarted { file } => {
                debug!("Started {file}");
            }
            ProgressEvent::ScanComplete { stage, .. } => {
                if stage == PipelineStage::Quantification {
                    scans_seen += 1;
                    if report_every > 0 && scans_seen % report_every == 0 {
                        info!("Quantified {scans_seen} scans");
                    }
                }
            }
            ProgressEvent::FileFinished { file, record } => {
                info!(
                    "Finished {file}: {} scans quantified",
                    record.scans_quantified
                );
                total += record;
            }
            ProgressEvent::FileFailed { file, reason } => {
                warn!("Failed to process {file}: {reason}");
                total.files_failed += 1;
            }
        }
    }
    total
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_collect() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let file: Arc<str> = Arc::from("a.raw");
        sender
            .send(ProgressEvent::FileStarted { file: file.clone() })
            .unwrap();
        for scan_id in 0..5 {
            sender
                .send(ProgressEvent::ScanComplete {
                    file: file.clone(),
                    stage: PipelineStage::Quantification,
                    scan_id,
                })
                .unwrap();
        }
        let record = ProgressRecord {
            files_processed: 1,
            scans_quantified: 5,
            missing_matches: 2,
            ..Default::default()
        };
        sender
            .send(ProgressEvent::FileFinished {
                file: file.clone(),
                record,
            })
            .unwrap();
        sender
            .send(ProgressEvent::FileFailed {
                file: Arc::from("b.raw"),
                reason: "unreadable".into(),
            })
            .unwrap();
        drop(sender);

        let total = collect_progress(receiver, 2);
        assert_eq!(total.files_processed, 1);
        assert_eq!(total.files_failed, 1);
        assert_eq!(total.scans_quantified, 5);
        assert_eq!(total.missing_matches, 2);
        assert_eq!(total + record, ProgressRecord {
            files_processed: 2,
            files_failed: 1,
            scans_quantified: 10,
            missing_matches: 4,
            ..Default::default()
        });
    }
}
