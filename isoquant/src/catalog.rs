//! Scan metadata and precursor linkage for one file
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::QuantError;
use crate::scan::{Scan, ScanId, ScanSource, SourceError};

/// Per-scan metadata for a whole file, in acquisition order
#[derive(Debug, Clone, Default)]
pub struct ScanCatalog {
    file: Arc<str>,
    scans: BTreeMap<ScanId, Scan>,
    by_order: BTreeMap<u8, Vec<ScanId>>,
}

impl ScanCatalog {
    pub fn new(file: impl Into<Arc<str>>, scans: impl IntoIterator<Item = Scan>) -> Self {
        let mut this = Self {
            file: file.into(),
            ..Default::default()
        };
        for scan in scans {
            this.insert(scan);
        }
        this
    }

    fn insert(&mut self, scan: Scan) {
        let ids = self.by_order.entry(scan.ms_order).or_default();
        match ids.binary_search(&scan.id) {
            Ok(_) => {}
            Err(i) => ids.insert(i, scan.id),
        }
        self.scans.insert(scan.id, scan);
    }

    /// Read the metadata of every scan a source holds. Gaps in the scan
    /// numbering are skipped.
    pub fn from_source<S: ScanSource + ?Sized>(source: &S) -> Result<Self, QuantError> {
        let file: Arc<str> = Arc::from(source.file_name());
        let (first, last) = source.scan_range()?;
        let mut this = Self {
            file: file.clone(),
            ..Default::default()
        };
        for scan_id in first..=last {
            let ms_order = match source.ms_order(scan_id) {
                Ok(order) => order,
                Err(SourceError::ScanNotFound(_)) => {
                    trace!(scan_id, "Skipping missing scan");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let scan = Scan {
                id: scan_id,
                ms_order,
                retention_time: source.retention_time(scan_id)?,
                centroided: source.is_centroided(scan_id)?,
                file: file.clone(),
            };
            this.insert(scan);
        }
        debug!(
            "Read {} scans from {} across {} MS orders",
            this.len(),
            this.file,
            this.by_order.len()
        );
        Ok(this)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn get(&self, scan_id: ScanId) -> Option<&Scan> {
        self.scans.get(&scan_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scan> {
        self.scans.values()
    }

    /// The scan ids of one MS order, ascending
    pub fn scans_of_order(&self, ms_order: u8) -> &[ScanId] {
        self.by_order
            .get(&ms_order)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn max_order(&self) -> Option<u8> {
        self.by_order.keys().next_back().copied()
    }

    pub fn first_of_order(&self, ms_order: u8) -> Option<&Scan> {
        self.scans_of_order(ms_order)
            .first()
            .and_then(|id| self.get(*id))
    }

    /// The latest scan of `ms_order` acquired before `scan_id`
    pub fn preceding_of_order(&self, scan_id: ScanId, ms_order: u8) -> Option<ScanId> {
        let ids = self.scans_of_order(ms_order);
        let i = ids.partition_point(|id| *id < scan_id);
        if i == 0 {
            None
        } else {
            Some(ids[i - 1])
        }
    }

    /// Whether `candidate` may act as the precursor of `scan_id`
    pub fn is_valid_precursor(&self, scan_id: ScanId, candidate: ScanId) -> bool {
        match (self.get(scan_id), self.get(candidate)) {
            (Some(child), Some(parent)) => {
                child.ms_order.checked_sub(1) == Some(parent.ms_order) && parent.id < child.id
            }
            _ => false,
        }
    }
}

/// The precursor of one MSn scan
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorLink {
    pub scan_id: ScanId,
    pub precursor_scan: ScanId,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub isolation_width: f64,
}

/// Precursor links for every MSn scan of a file. MS3 scans link to their MS2
/// scan, which in turn links to its MS1 scan.
#[derive(Debug, Clone, Default)]
pub struct PrecursorLinks {
    links: BTreeMap<ScanId, PrecursorLink>,
    inferred: usize,
}

impl PrecursorLinks {
    /// Build the links for every scan with an MS order of two or more.
    ///
    /// A recorded master scan number is used when it names a scan of the next
    /// lower order acquired earlier. Otherwise the precursor is inferred as the
    /// latest such scan. Scans with no possible precursor are left unlinked.
    ///
    /// # Errors
    /// Any failure reading the source aborts the file. This includes a linked
    /// scan with no recorded precursor mass, charge or isolation width, which
    /// surfaces as [`SourceError::MissingValue`].
    pub fn build<S: ScanSource + ?Sized>(
        catalog: &ScanCatalog,
        source: &S,
    ) -> Result<Self, QuantError> {
        let mut this = Self::default();
        for scan in catalog.iter().filter(|s| s.ms_order > 1) {
            let recorded = source.master_scan_number(scan.id)?;
            let precursor_scan = match recorded {
                Some(master) if catalog.is_valid_precursor(scan.id, master) => Some(master),
                Some(master) => {
                    warn!(
                        scan_id = scan.id,
                        "Master scan {master} is not a valid precursor, inferring from acquisition order"
                    );
                    this.inferred += 1;
                    catalog.preceding_of_order(scan.id, scan.ms_order - 1)
                }
                None => {
                    this.inferred += 1;
                    catalog.preceding_of_order(scan.id, scan.ms_order - 1)
                }
            };
            let Some(precursor_scan) = precursor_scan else {
                debug!(scan_id = scan.id, "No precursor scan precedes this scan");
                continue;
            };
            let link = PrecursorLink {
                scan_id: scan.id,
                precursor_scan,
                precursor_mz: source.precursor_mass(scan.id)?,
                precursor_charge: source.precursor_charge(scan.id)?,
                isolation_width: source.isolation_width(scan.id)?,
            };
            this.links.insert(scan.id, link);
        }
        Ok(this)
    }

    pub fn get(&self, scan_id: ScanId) -> Option<&PrecursorLink> {
        self.links.get(&scan_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// How many links had to be inferred from acquisition order
    pub fn inferred(&self) -> usize {
        self.inferred
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrecursorLink> {
        self.links.values()
    }

    /// Follow the chain from `scan_id` down to the link whose precursor is an
    /// MS1 scan. For an MS2 scan this is its own link.
    pub fn ms1_link(&self, catalog: &ScanCatalog, scan_id: ScanId) -> Option<&PrecursorLink> {
        let mut current = self.get(scan_id)?;
        loop {
            let parent = catalog.get(current.precursor_scan)?;
            if parent.ms_order == 1 {
                return Some(current);
            }
            current = self.get(parent.id)?;
        }
    }
}
