//! The contract for reading decoded scans from an instrument file.
//!
//! Decoding the vendor format happens elsewhere. This module defines what the
//! rest of the crate needs from it, [`ScanSource`], and an in-memory
//! implementation, [`InMemoryScanSource`], for already-decoded data.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::peaks::{PeakKind, PeakList};

pub type ScanId = u32;

/// A failure reported by a [`ScanSource`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("Could not open {path} as an instrument file: {reason}")]
    FileAccess { path: String, reason: String },
    #[error("Scan {0} does not exist in this file")]
    ScanNotFound(ScanId),
    #[error("Scan {scan_id} has no {field}")]
    MissingValue {
        scan_id: ScanId,
        field: &'static str,
    },
    #[error("Failed to read scan {scan_id}: {reason}")]
    Read { scan_id: ScanId, reason: String },
}

/// Metadata for a single scan, fixed once read
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub id: ScanId,
    pub ms_order: u8,
    /// Retention time in minutes
    pub retention_time: f64,
    pub centroided: bool,
    pub file: Arc<str>,
}

/// Random access to the scans of one decoded instrument file.
pub trait ScanSource {
    /// The identity of the file this source reads from
    fn file_name(&self) -> &str;

    /// The first and last scan numbers, inclusive
    fn scan_range(&self) -> Result<(ScanId, ScanId), SourceError>;

    fn ms_order(&self, scan_id: ScanId) -> Result<u8, SourceError>;

    fn is_centroided(&self, scan_id: ScanId) -> Result<bool, SourceError>;

    /// The peaks of a scan in ascending m/z order
    fn peak_list(&self, scan_id: ScanId, kind: PeakKind) -> Result<PeakList, SourceError>;

    /// Retention time in minutes
    fn retention_time(&self, scan_id: ScanId) -> Result<f64, SourceError>;

    fn precursor_mass(&self, scan_id: ScanId) -> Result<f64, SourceError>;

    fn precursor_charge(&self, scan_id: ScanId) -> Result<i32, SourceError>;

    fn isolation_width(&self, scan_id: ScanId) -> Result<f64, SourceError>;

    /// The precursor scan recorded by the instrument, if any
    fn master_scan_number(&self, scan_id: ScanId) -> Result<Option<ScanId>, SourceError>;
}

/// Opens instrument files by path
pub trait SourceOpener {
    type Source: ScanSource;

    fn open(&self, path: &Path) -> Result<Self::Source, SourceError>;
}

/// A fully decoded scan held in memory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanData {
    pub id: ScanId,
    pub ms_order: u8,
    pub retention_time: f64,
    pub centroided: bool,
    pub centroids: PeakList,
    pub profile: Option<PeakList>,
    pub precursor_mz: Option<f64>,
    pub precursor_charge: Option<i32>,
    pub isolation_width: Option<f64>,
    pub master_scan: Option<ScanId>,
}

impl ScanData {
    pub fn ms1(id: ScanId, retention_time: f64, centroids: PeakList) -> Self {
        Self {
            id,
            ms_order: 1,
            retention_time,
            centroided: true,
            centroids,
            ..Default::default()
        }
    }

    pub fn msn(
        id: ScanId,
        ms_order: u8,
        retention_time: f64,
        precursor_mz: f64,
        precursor_charge: i32,
        isolation_width: f64,
        centroids: PeakList,
    ) -> Self {
        Self {
            id,
            ms_order,
            retention_time,
            centroided: true,
            centroids,
            precursor_mz: Some(precursor_mz),
            precursor_charge: Some(precursor_charge),
            isolation_width: Some(isolation_width),
            ..Default::default()
        }
    }

    /// Attach a profile trace, marking the scan as profile data
    pub fn with_profile(mut self, profile: PeakList) -> Self {
        self.profile = Some(profile);
        self.centroided = false;
        self
    }

    pub fn with_master_scan(mut self, master_scan: ScanId) -> Self {
        self.master_scan = Some(master_scan);
        self
    }
}

/// A [`ScanSource`] over scans that were decoded ahead of time
#[derive(Debug, Clone, Default)]
pub struct InMemoryScanSource {
    name: String,
    scans: BTreeMap<ScanId, ScanData>,
}

impl InMemoryScanSource {
    pub fn new(name: impl Into<String>, scans: impl IntoIterator<Item = ScanData>) -> Self {
        let scans = scans.into_iter().map(|s| (s.id, s)).collect();
        Self {
            name: name.into(),
            scans,
        }
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    fn get(&self, scan_id: ScanId) -> Result<&ScanData, SourceError> {
        self.scans
            .get(&scan_id)
            .ok_or(SourceError::ScanNotFound(scan_id))
    }
}

impl ScanSource for InMemoryScanSource {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn scan_range(&self) -> Result<(ScanId, ScanId), SourceError> {
        match (self.scans.keys().next(), self.scans.keys().next_back()) {
            (Some(first), Some(last)) => Ok((*first, *last)),
            _ => Err(SourceError::FileAccess {
                path: self.name.clone(),
                reason: "the file contains no scans".into(),
            }),
        }
    }

    fn ms_order(&self, scan_id: ScanId) -> Result<u8, SourceError> {
        self.get(scan_id).map(|s| s.ms_order)
    }

    fn is_centroided(&self, scan_id: ScanId) -> Result<bool, SourceError> {
        self.get(scan_id).map(|s| s.centroided)
    }

    fn peak_list(&self, scan_id: ScanId, kind: PeakKind) -> Result<PeakList, SourceError> {
        let scan = self.get(scan_id)?;
        match kind {
            PeakKind::Centroid => Ok(scan.centroids.clone()),
            PeakKind::Profile => scan.profile.clone().ok_or(SourceError::MissingValue {
                scan_id,
                field: "profile data",
            }),
        }
    }

    fn retention_time(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        self.get(scan_id).map(|s| s.retention_time)
    }

    fn precursor_mass(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        self.get(scan_id)?
            .precursor_mz
            .ok_or(SourceError::MissingValue {
                scan_id,
                field: "precursor mass",
            })
    }

    fn precursor_charge(&self, scan_id: ScanId) -> Result<i32, SourceError> {
        self.get(scan_id)?
            .precursor_charge
            .ok_or(SourceError::MissingValue {
                scan_id,
                field: "precursor charge",
            })
    }

    fn isolation_width(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        self.get(scan_id)?
            .isolation_width
            .ok_or(SourceError::MissingValue {
                scan_id,
                field: "isolation width",
            })
    }

    fn master_scan_number(&self, scan_id: ScanId) -> Result<Option<ScanId>, SourceError> {
        self.get(scan_id).map(|s| s.master_scan)
    }
}

impl<S: ScanSource + ?Sized> ScanSource for &S {
    fn file_name(&self) -> &str {
        (**self).file_name()
    }

    fn scan_range(&self) -> Result<(ScanId, ScanId), SourceError> {
        (**self).scan_range()
    }

    fn ms_order(&self, scan_id: ScanId) -> Result<u8, SourceError> {
        (**self).ms_order(scan_id)
    }

    fn is_centroided(&self, scan_id: ScanId) -> Result<bool, SourceError> {
        (**self).is_centroided(scan_id)
    }

    fn peak_list(&self, scan_id: ScanId, kind: PeakKind) -> Result<PeakList, SourceError> {
        (**self).peak_list(scan_id, kind)
    }

    fn retention_time(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        (**self).retention_time(scan_id)
    }

    fn precursor_mass(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        (**self).precursor_mass(scan_id)
    }

    fn precursor_charge(&self, scan_id: ScanId) -> Result<i32, SourceError> {
        (**self).precursor_charge(scan_id)
    }

    fn isolation_width(&self, scan_id: ScanId) -> Result<f64, SourceError> {
        (**self).isolation_width(scan_id)
    }

    fn master_scan_number(&self, scan_id: ScanId) -> Result<Option<ScanId>, SourceError> {
        (**self).master_scan_number(scan_id)
    }
}
