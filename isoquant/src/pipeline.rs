//! Staged quantification of one instrument file.
//!
//! Every intermediate product is held in a [`Stage`] that is computed on
//! first use and reused afterwards. Later stages pull the earlier ones they
//! depend on, so asking for [`QuantPipeline::records`] runs everything needed
//! and nothing more.
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use tracing::{debug, info, trace};

use crate::catalog::{PrecursorLinks, ScanCatalog};
use crate::elution::{trace_precursor_elution, Ms1Point, PrecursorElution};
use crate::envelope::{EnvelopeMatch, IsotopeEnvelopeScorer};
use crate::error::QuantError;
use crate::impurity::{CorrectedIntensities, CorrectionMatrix, CorrectionStatus, ImpurityTable};
use crate::interference::{InterferenceEngine, Ms1Spectrum, ResolvedMode, ScanInterference};
use crate::params::QuantParams;
use crate::peaks::{PeakKind, PeakList};
use crate::reagents::ReporterSet;
use crate::record::{ChannelRecord, ScanRecord};
use crate::reporter::{QuantTable, ReporterQuantifier};
use crate::scan::{ScanId, ScanSource};

/// A lazily computed, cached value
#[derive(Debug)]
pub struct Stage<T> {
    cell: OnceCell<T>,
}

impl<T> Default for Stage<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T> Stage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, computing it with `f` if it is absent.
    ///
    /// A failed computation leaves the stage empty.
    pub fn ensure<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = f()?;
        Ok(self.cell.get_or_init(|| value))
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Discard the cached value, returning it
    pub fn reset(&mut self) -> Option<T> {
        self.cell.take()
    }

    fn fill(&mut self, value: T) {
        self.cell = OnceCell::from(value);
    }
}

/// The stages that visit scans one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Interference,
    Quantification,
    Correction,
    Elution,
    Envelope,
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Interference => "interference",
            Self::Quantification => "quantification",
            Self::Correction => "correction",
            Self::Elution => "elution",
            Self::Envelope => "envelope",
        };
        f.write_str(name)
    }
}

/// Called after every scan a per-scan stage finishes. Returning an error,
/// usually [`QuantError::Cancelled`], stops the stage.
pub trait Checkpoint {
    fn scan_complete(&self, stage: PipelineStage, scan_id: ScanId) -> Result<(), QuantError>;
}

/// A [`Checkpoint`] that never interrupts
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    #[inline(always)]
    fn scan_complete(&self, _stage: PipelineStage, _scan_id: ScanId) -> Result<(), QuantError> {
        Ok(())
    }
}

impl<T: Checkpoint> Checkpoint for &T {
    fn scan_complete(&self, stage: PipelineStage, scan_id: ScanId) -> Result<(), QuantError> {
        (*self).scan_complete(stage, scan_id)
    }
}

/// Counts of noteworthy outcomes across one file
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineSummary {
    pub file: String,
    pub analysis_order: u8,
    pub scans_quantified: usize,
    pub ambiguous_matches: usize,
    pub missing_matches: usize,
    pub inferred_links: usize,
    pub undefined_interference: usize,
    pub unsupported_charges: usize,
    pub singular_corrections: usize,
    pub scans_by_order: BTreeMap<u8, usize>,
    /// Minutes between the first and last scan
    pub run_minutes: f64,
    /// MS2 scans acquired per MS1 scan
    pub mean_top_n: Option<f64>,
    /// Median of the most intense point of each traced precursor elution
    pub median_precursor_intensity: Option<f64>,
    /// Median base to base width of the traced precursor elutions in seconds
    pub median_elution_width: Option<f64>,
}

impl PipelineSummary {
    pub fn scans_of_order(&self, ms_order: u8) -> usize {
        self.scans_by_order.get(&ms_order).copied().unwrap_or_default()
    }

    /// Scans of `ms_order` acquired per second of run time
    pub fn scan_rate(&self, ms_order: u8) -> Option<f64> {
        let seconds = self.run_minutes * 60.0;
        (seconds > 0.0).then(|| self.scans_of_order(ms_order) as f64 / seconds)
    }

    /// Seconds between consecutive MS1 scans, on average
    pub fn mean_duty_cycle(&self) -> Option<f64> {
        let n = self.scans_of_order(1);
        (n > 0).then(|| self.run_minutes * 60.0 / n as f64)
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| !v.is_nan());
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Quantifies the reporter ions and precursor interference of one file
pub struct QuantPipeline<'a, S: ScanSource + ?Sized, C: Checkpoint = NoCheckpoint> {
    source: &'a S,
    params: QuantParams,
    quantifier: ReporterQuantifier,
    impurities: Option<ImpurityTable>,
    checkpoint: C,

    catalog: Stage<ScanCatalog>,
    order: Stage<u8>,
    links: Stage<PrecursorLinks>,
    mode: Stage<ResolvedMode>,
    ms1_centroids: Stage<BTreeMap<ScanId, PeakList>>,
    ms1_profiles: Stage<BTreeMap<ScanId, PeakList>>,
    interference: Stage<BTreeMap<ScanId, ScanInterference>>,
    quant: Stage<QuantTable>,
    correction_matrix: Stage<Option<CorrectionMatrix>>,
    corrected: Stage<BTreeMap<ScanId, CorrectedIntensities>>,
    elution: Stage<BTreeMap<ScanId, PrecursorElution>>,
    envelopes: Stage<BTreeMap<ScanId, EnvelopeMatch>>,
}

impl<'a, S: ScanSource + ?Sized> QuantPipeline<'a, S, NoCheckpoint> {
    pub fn new(source: &'a S, reporters: ReporterSet, params: QuantParams) -> Self {
        Self::with_checkpoint(source, reporters, params, NoCheckpoint)
    }
}

impl<'a, S: ScanSource + ?Sized, C: Checkpoint> QuantPipeline<'a, S, C> {
    pub fn with_checkpoint(
        source: &'a S,
        reporters: ReporterSet,
        params: QuantParams,
        checkpoint: C,
    ) -> Self {
        let quantifier = ReporterQuantifier::with_tolerance(reporters, params.reporter_tolerance);
        Self {
            source,
            params,
            quantifier,
            impurities: None,
            checkpoint,
            catalog: Stage::new(),
            order: Stage::new(),
            links: Stage::new(),
            mode: Stage::new(),
            ms1_centroids: Stage::new(),
            ms1_profiles: Stage::new(),
            interference: Stage::new(),
            quant: Stage::new(),
            correction_matrix: Stage::new(),
            corrected: Stage::new(),
            elution: Stage::new(),
            envelopes: Stage::new(),
        }
    }

    pub fn params(&self) -> &QuantParams {
        &self.params
    }

    pub fn reporters(&self) -> &ReporterSet {
        self.quantifier.reporters()
    }

    pub fn impurities(&self) -> Option<&ImpurityTable> {
        self.impurities.as_ref()
    }

    /// Load a new impurity table, replacing any previous correction.
    ///
    /// The table is checked against the reporter channels before anything is
    /// replaced.
    pub fn load_impurities(&mut self, table: ImpurityTable) -> Result<(), QuantError> {
        let matrix = CorrectionMatrix::build(self.quantifier.reporters(), &table)?;
        debug!(
            "Loaded impurities for {}",
            table.labels().iter().join(", ")
        );
        self.corrected.reset();
        self.correction_matrix.fill(Some(matrix));
        self.impurities = Some(table);
        Ok(())
    }

    /// Drop the impurity table and every correction derived from it
    pub fn clear_impurities(&mut self) {
        self.impurities = None;
        self.correction_matrix.reset();
        self.corrected.reset();
    }

    pub fn catalog(&self) -> Result<&ScanCatalog, QuantError> {
        self.catalog
            .ensure(|| ScanCatalog::from_source(self.source))
    }

    /// The MS order reporter ions are quantified in
    pub fn analysis_order(&self) -> Result<u8, QuantError> {
        self.order
            .ensure(|| {
                let catalog = self.catalog()?;
                let order = self.params.resolve_order(catalog)?;
                debug!("Quantifying reporters in MS{order} scans");
                Ok(order)
            })
            .copied()
    }

    fn require_precursors(&self) -> Result<u8, QuantError> {
        let order = self.analysis_order()?;
        if order < 2 {
            Err(QuantError::AnalysisOrderTooLow(order))
        } else {
            Ok(order)
        }
    }

    pub fn links(&self) -> Result<&PrecursorLinks, QuantError> {
        self.links.ensure(|| {
            self.require_precursors()?;
            let links = PrecursorLinks::build(self.catalog()?, self.source)?;
            if links.inferred() > 0 {
                debug!(
                    "Inferred {} of {} precursor links from acquisition order",
                    links.inferred(),
                    links.len()
                );
            }
            Ok(links)
        })
    }

    /// The interference mode after resolving `auto` against the MS1 data
    pub fn interference_mode(&self) -> Result<ResolvedMode, QuantError> {
        self.mode
            .ensure(|| {
                let first = self
                    .catalog()?
                    .first_of_order(1)
                    .ok_or(QuantError::NoScansOfOrder(1))?;
                self.params.interference_mode.resolve(first.centroided)
            })
            .copied()
    }

    /// Centroided peaks of every MS1 scan
    pub fn ms1_centroids(&self) -> Result<&BTreeMap<ScanId, PeakList>, QuantError> {
        self.ms1_centroids.ensure(|| {
            let catalog = self.catalog()?;
            let mut acc = BTreeMap::new();
            for scan_id in catalog.scans_of_order(1) {
                acc.insert(
                    *scan_id,
                    self.source.peak_list(*scan_id, PeakKind::Centroid)?,
                );
            }
            Ok(acc)
        })
    }

    /// Profile peaks of the MS1 scans that precursors were selected from
    pub fn ms1_profiles(&self) -> Result<&BTreeMap<ScanId, PeakList>, QuantError> {
        self.ms1_profiles.ensure(|| {
            let catalog = self.catalog()?;
            let links = self.links()?;
            let mut acc = BTreeMap::new();
            for scan_id in catalog.scans_of_order(2) {
                let Some(link) = links.get(*scan_id) else {
                    continue;
                };
                if !acc.contains_key(&link.precursor_scan) {
                    let profile = self
                        .source
                        .peak_list(link.precursor_scan, PeakKind::Profile)?;
                    acc.insert(link.precursor_scan, profile);
                }
            }
            Ok(acc)
        })
    }

    /// Precursor interference for every linked MS2 scan
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interference(&self) -> Result<&BTreeMap<ScanId, ScanInterference>, QuantError> {
        self.interference.ensure(|| {
            let catalog = self.catalog()?;
            let links = self.links()?;
            let mode = self.interference_mode()?;
            let centroids = self.ms1_centroids()?;
            let profiles = match mode {
                ResolvedMode::Profile => Some(self.ms1_profiles()?),
                ResolvedMode::Centroid => None,
            };
            let engine = InterferenceEngine::new(self.params.isotope_tolerance);
            let mut acc = BTreeMap::new();
            for scan_id in catalog.scans_of_order(2).iter().copied() {
                let Some(link) = links.get(scan_id) else {
                    continue;
                };
                let Some(peaks) = centroids.get(&link.precursor_scan) else {
                    return Err(QuantError::MissingPrecursorScan(scan_id));
                };
                let spectrum = Ms1Spectrum {
                    centroids: peaks,
                    profile: profiles.and_then(|p| p.get(&link.precursor_scan)),
                };
                let value = engine.estimate(
                    mode,
                    spectrum,
                    link.precursor_mz,
                    link.precursor_charge,
                    link.isolation_width,
                );
                trace!(scan_id, interference = value.value(), "Estimated interference");
                acc.insert(scan_id, value);
                self.checkpoint
                    .scan_complete(PipelineStage::Interference, scan_id)?;
            }
            Ok(acc)
        })
    }

    /// Reporter matches for every scan of the analysis order
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn quant(&self) -> Result<&QuantTable, QuantError> {
        self.quant.ensure(|| {
            let catalog = self.catalog()?;
            let order = self.analysis_order()?;
            let mut table = QuantTable {
                labels: self.quantifier.labels(),
                scans: BTreeMap::new(),
            };
            for scan_id in catalog.scans_of_order(order).iter().copied() {
                let peaks = self.source.peak_list(scan_id, PeakKind::Centroid)?;
                let quant = self.quantifier.quantify(scan_id, &peaks);
                table.scans.insert(scan_id, quant);
                self.checkpoint
                    .scan_complete(PipelineStage::Quantification, scan_id)?;
            }
            Ok(table)
        })
    }

    /// The correction matrix of the loaded impurity table, if there is one
    pub fn correction_matrix(&self) -> Result<Option<&CorrectionMatrix>, QuantError> {
        self.correction_matrix
            .ensure(|| match &self.impurities {
                Some(table) => CorrectionMatrix::build(self.quantifier.reporters(), table).map(Some),
                None => Ok(None),
            })
            .map(|m| m.as_ref())
    }

    /// Impurity corrected intensities for every quantified scan. Empty when no
    /// impurity table is loaded.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn corrected(&self) -> Result<&BTreeMap<ScanId, CorrectedIntensities>, QuantError> {
        self.corrected.ensure(|| {
            let mut acc = BTreeMap::new();
            let Some(matrix) = self.correction_matrix()? else {
                return Ok(acc);
            };
            for quant in self.quant()?.iter() {
                let corrected = matrix.solve(&quant.intensities());
                if matches!(corrected.status, CorrectionStatus::Singular) {
                    debug!(scan_id = quant.scan_id, "Correction matrix is singular");
                }
                acc.insert(quant.scan_id, corrected);
                self.checkpoint
                    .scan_complete(PipelineStage::Correction, quant.scan_id)?;
            }
            Ok(acc)
        })
    }

    /// The elution of every MS2 precursor across its neighboring MS1 scans
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn elution(&self) -> Result<&BTreeMap<ScanId, PrecursorElution>, QuantError> {
        self.elution.ensure(|| {
            let catalog = self.catalog()?;
            let links = self.links()?;
            let centroids = self.ms1_centroids()?;
            let points: Vec<Ms1Point> = centroids
                .iter()
                .filter_map(|(scan_id, peaks)| {
                    catalog.get(*scan_id).map(|scan| Ms1Point {
                        scan_id: *scan_id,
                        retention_time: scan.retention_time,
                        peaks,
                    })
                })
                .collect();
            let mut acc = BTreeMap::new();
            for scan_id in catalog.scans_of_order(2).iter().copied() {
                let Some(link) = links.get(scan_id) else {
                    continue;
                };
                if let Some(elution) = trace_precursor_elution(
                    &points,
                    link.precursor_scan,
                    link.precursor_mz,
                    self.params.isotope_tolerance,
                ) {
                    acc.insert(scan_id, elution);
                }
                self.checkpoint
                    .scan_complete(PipelineStage::Elution, scan_id)?;
            }
            Ok(acc)
        })
    }

    /// The best isotope envelope fit around every MS2 precursor
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn envelopes(&self) -> Result<&BTreeMap<ScanId, EnvelopeMatch>, QuantError> {
        self.envelopes.ensure(|| {
            let catalog = self.catalog()?;
            let links = self.links()?;
            let centroids = self.ms1_centroids()?;
            let scorer = IsotopeEnvelopeScorer {
                tolerance: self.params.isotope_tolerance,
                ..Default::default()
            };
            let mut acc = BTreeMap::new();
            for scan_id in catalog.scans_of_order(2).iter().copied() {
                let Some(link) = links.get(scan_id) else {
                    continue;
                };
                if let Some(peaks) = centroids.get(&link.precursor_scan) {
                    acc.insert(scan_id, scorer.score(peaks, link.precursor_mz));
                }
                self.checkpoint
                    .scan_complete(PipelineStage::Envelope, scan_id)?;
            }
            Ok(acc)
        })
    }

    /// One flat record per quantified scan, in scan order
    pub fn records(&self) -> Result<Vec<ScanRecord>, QuantError> {
        let catalog = self.catalog()?;
        let order = self.analysis_order()?;
        let quant = self.quant()?;
        let corrected = self.corrected()?;
        let with_precursors = order >= 2;

        let links = if with_precursors {
            Some(self.links()?)
        } else {
            None
        };
        let interference = if with_precursors {
            Some(self.interference()?)
        } else {
            None
        };
        let elution = if with_precursors && self.params.trace_elution {
            Some(self.elution()?)
        } else {
            None
        };
        let envelopes = if with_precursors && self.params.score_envelopes {
            Some(self.envelopes()?)
        } else {
            None
        };

        let channels = self.quantifier.reporters().channels();
        let mut records = Vec::with_capacity(quant.len());
        for scan_quant in quant.iter() {
            let scan_id = scan_quant.scan_id;
            let retention_time = catalog
                .get(scan_id)
                .map(|s| s.retention_time)
                .unwrap_or(f64::NAN);
            let link = links.and_then(|l| l.ms1_link(catalog, scan_id));
            let ms2_scan = link.map(|l| l.scan_id).filter(|id| *id != scan_id);
            let precursor_of = link.map(|l| l.scan_id);

            let correction = corrected.get(&scan_id);
            let channel_records = channels
                .iter()
                .zip(scan_quant.channels.iter())
                .enumerate()
                .map(|(i, (channel, result))| {
                    ChannelRecord::new(
                        &channel.label,
                        channel.mass,
                        result,
                        correction.map(|c| c.values[i]),
                    )
                })
                .collect();

            records.push(ScanRecord {
                scan_id,
                ms_order: order,
                retention_time,
                ms2_scan,
                ms1_scan: link.map(|l| l.precursor_scan),
                precursor_mz: link.map(|l| l.precursor_mz).unwrap_or(f64::NAN),
                precursor_charge: link.map(|l| l.precursor_charge),
                interference: precursor_of
                    .and_then(|id| interference.and_then(|i| i.get(&id)))
                    .map(|i| i.value())
                    .unwrap_or(f64::NAN),
                channels: channel_records,
                correction: correction.map(|c| c.status),
                elution: precursor_of
                    .and_then(|id| elution.and_then(|e| e.get(&id)))
                    .cloned(),
                envelope: precursor_of
                    .and_then(|id| envelopes.and_then(|e| e.get(&id)))
                    .cloned(),
            });
        }
        Ok(records)
    }

    /// Run every stage the parameters call for and count what happened
    pub fn summary(&self) -> Result<PipelineSummary, QuantError> {
        let catalog = self.catalog()?;
        let order = self.analysis_order()?;
        let quant = self.quant()?;
        let corrected = self.corrected()?;

        let mut summary = PipelineSummary {
            file: catalog.file().to_string(),
            analysis_order: order,
            scans_quantified: quant.len(),
            ambiguous_matches: quant.iter().map(|q| q.ambiguous_count()).sum(),
            missing_matches: quant.iter().map(|q| q.missing_count()).sum(),
            singular_corrections: corrected
                .values()
                .filter(|c| matches!(c.status, CorrectionStatus::Singular))
                .count(),
            ..Default::default()
        };

        for scan in catalog.iter() {
            *summary.scans_by_order.entry(scan.ms_order).or_default() += 1;
        }
        if let Some((start, end)) = catalog
            .iter()
            .map(|s| s.retention_time)
            .minmax()
            .into_option()
        {
            summary.run_minutes = end - start;
        }

        if order >= 2 {
            let ms1 = summary.scans_of_order(1);
            if ms1 > 0 {
                summary.mean_top_n = Some(summary.scans_of_order(2) as f64 / ms1 as f64);
            }
            // Only report what an earlier call already traced
            if let Some(elution) = self.elution.get() {
                summary.median_precursor_intensity =
                    median(elution.values().map(|e| e.max_intensity).collect());
                summary.median_elution_width = median(
                    elution
                        .values()
                        .map(|e| (e.tailing_rt - e.leading_rt) * 60.0)
                        .collect(),
                );
            }
            summary.inferred_links = self.links()?.inferred();
            for value in self.interference()?.values() {
                match value {
                    ScanInterference::Estimated(_) => {}
                    ScanInterference::Undefined => summary.undefined_interference += 1,
                    ScanInterference::UnsupportedCharge(_) => summary.unsupported_charges += 1,
                }
            }
        }

        info!(
            "{}: quantified {} MS{} scans, {} ambiguous and {} missing reporter matches, {} undefined interference values, {} unsupported charges, {} singular corrections",
            summary.file,
            summary.scans_quantified,
            summary.analysis_order,
            summary.ambiguous_matches,
            summary.missing_matches,
            summary.undefined_interference,
            summary.unsupported_charges,
            summary.singular_corrections,
        );
        debug!(
            "{}: {:.2} minutes, scans by order {:?}, mean top N {:?}, median precursor intensity {:?}, median elution width {:?}s",
            summary.file,
            summary.run_minutes,
            summary.scans_by_order,
            summary.mean_top_n,
            summary.median_precursor_intensity,
            summary.median_elution_width,
        );
        Ok(summary)
    }
}
