use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use figment::Jail;
use isoquant::{
    CorrectionStatus, InMemoryScanSource, Peak, PeakList, QuantError, ReagentKind, ScanData,
    SourceError, SourceOpener,
};
use isoquanter::{run_batch, QuanterConfig, QuanterError};

struct MemoryOpener {
    sources: BTreeMap<PathBuf, InMemoryScanSource>,
}

impl SourceOpener for MemoryOpener {
    type Source = InMemoryScanSource;

    fn open(&self, path: &Path) -> Result<Self::Source, SourceError> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::FileAccess {
                path: path.display().to_string(),
                reason: "no such file".into(),
            })
    }
}

fn ms1_peaks() -> PeakList {
    PeakList::new(vec![
        Peak::new(499.2, 50.0),
        Peak::new(500.0, 800.0),
        Peak::new(500.3345, 120.0),
        Peak::new(501.0, 30.0),
    ])
}

fn reporter_peaks(scale: f64) -> PeakList {
    PeakList::new(vec![
        Peak::new(126.127726, 1000.0 * scale),
        Peak::new(127.124761, 2000.0 * scale),
        Peak::new(128.134436, 1500.0 * scale),
        Peak::new(129.131471, 500.0 * scale),
        Peak::new(130.141145, 800.0 * scale),
        Peak::new(131.138180, 1200.0 * scale),
    ])
}

fn make_source(name: &str, charge: i32) -> InMemoryScanSource {
    InMemoryScanSource::new(
        name,
        vec![
            ScanData::ms1(1, 5.0, ms1_peaks()),
            ScanData::msn(2, 2, 5.01, 500.0, charge, 2.0, reporter_peaks(1.0)),
            ScanData::msn(3, 2, 5.02, 500.0, charge, 2.0, reporter_peaks(2.0)),
            ScanData::ms1(4, 5.05, ms1_peaks()),
            ScanData::msn(5, 2, 5.06, 500.0, charge, 2.0, reporter_peaks(0.5))
                .with_master_scan(4),
        ],
    )
}

fn make_opener() -> MemoryOpener {
    let mut sources = BTreeMap::new();
    sources.insert(PathBuf::from("a.raw"), make_source("a.raw", 3));
    sources.insert(PathBuf::from("c.raw"), make_source("c.raw", 1));
    MemoryOpener { sources }
}

fn write_impurities(jail: &Jail) -> figment::Result<PathBuf> {
    let name = "impurities_tmt6.csv";
    jail.create_file(
        name,
        "\
Label,-2,-1,+1,+2
tmt126,0.0,0.0,8.2,0.0
tmt127N,0.0,0.4,7.3,0.0
tmt128C,0.0,1.2,6.5,0.0
tmt129N,0.0,1.5,5.8,0.0
tmt130C,0.0,2.6,4.9,0.0
tmt131,0.0,3.4,3.9,0.0
",
    )?;
    Ok(jail.directory().join(name))
}

fn make_config(impurities: Option<PathBuf>) -> QuanterConfig {
    QuanterConfig {
        input_files: vec!["a.raw".into(), "b.raw".into(), "c.raw".into()],
        reagent: ReagentKind::Tmt6,
        impurity_table: impurities,
        threads: 2,
        ..Default::default()
    }
}

#[test_log::test]
fn test_batch() {
    Jail::expect_with(|jail| {
        let impurities = write_impurities(jail)?;
        let config = make_config(Some(impurities));
        let report = run_batch(&make_opener(), &config, Arc::new(AtomicBool::new(false))).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].path, PathBuf::from("a.raw"));
        assert_eq!(report.files[1].path, PathBuf::from("c.raw"));

        assert_eq!(report.failures.len(), 1);
        let (failed, err) = &report.failures[0];
        assert_eq!(failed, &PathBuf::from("b.raw"));
        assert!(matches!(
            err,
            QuanterError::QuantError(QuantError::Source(SourceError::FileAccess { .. }))
        ));

        let a = &report.files[0];
        assert_eq!(a.records.len(), 3);
        assert_eq!(a.summary.scans_quantified, 3);
        assert_eq!(a.summary.inferred_links, 2);
        assert_eq!(a.records[2].ms1_scan, Some(4));
        for record in a.records.iter() {
            assert!((record.interference - 8.0).abs() < 1e-9);
            assert_eq!(record.correction, Some(CorrectionStatus::Solved));
            let corrected = record.corrected_intensities().unwrap();
            assert_eq!(corrected.len(), 6);
            assert!(corrected.iter().all(|v| v.is_finite()));
        }

        let c = &report.files[1];
        assert_eq!(c.summary.unsupported_charges, 3);
        assert!(c.records.iter().all(|r| r.interference.is_nan()));

        assert_eq!(report.progress.files_processed, 2);
        assert_eq!(report.progress.files_failed, 1);
        assert_eq!(report.progress.scans_quantified, 6);
        assert_eq!(report.progress.unsupported_charges, 3);
        assert_eq!(report.progress.missing_matches, 0);
        Ok(())
    });
}

#[test]
fn test_cancelled() {
    let config = make_config(None);
    let report = run_batch(&make_opener(), &config, Arc::new(AtomicBool::new(true))).unwrap();
    assert!(report.files.is_empty());
    assert_eq!(report.failures.len(), 3);
    assert!(report
        .failures
        .iter()
        .all(|(_, e)| matches!(e, QuanterError::QuantError(QuantError::Cancelled))));
    assert_eq!(report.progress.files_failed, 3);
}

#[test]
fn test_mismatched_impurities() {
    Jail::expect_with(|jail| {
        let impurities = write_impurities(jail)?;
        let config = QuanterConfig {
            reagent: ReagentKind::Tmt10,
            ..make_config(Some(impurities))
        };
        let err = run_batch(&make_opener(), &config, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(matches!(
            err,
            QuanterError::QuantError(QuantError::ChannelLabelMismatch { .. })
        ));
        Ok(())
    });
}
