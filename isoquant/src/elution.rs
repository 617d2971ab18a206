//! Chromatographic elution of a selected precursor across neighboring MS1 scans
use mzpeaks::Tolerance;

use crate::peaks::{trapezoid, PeakList};
use crate::scan::ScanId;

/// One MS1 scan's view into the elution trace
#[derive(Debug, Clone, Copy)]
pub struct Ms1Point<'a> {
    pub scan_id: ScanId,
    pub retention_time: f64,
    pub peaks: &'a PeakList,
}

/// The elution profile of one precursor ion
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrecursorElution {
    /// Intensity of the peak nearest the precursor in the scan it was picked from
    pub picked_intensity: f64,
    pub max_intensity: f64,
    pub max_scan: ScanId,
    /// Area under the intensity trace over retention time
    pub area: f64,
    pub leading_rt: f64,
    pub tailing_rt: f64,
    pub leading_scan: ScanId,
    pub tailing_scan: ScanId,
    /// Intensity of the nearest peak in every scan from the leading to the tailing edge
    pub profile: Vec<f64>,
}

fn nearest_intensity(peaks: &PeakList, mz: f64) -> f64 {
    peaks.find_nearest(mz).map(|p| p.intensity).unwrap_or(0.0)
}

fn contains_precursor(peaks: &PeakList, mz: f64, tolerance: f64) -> bool {
    peaks.has_peak(mz, Tolerance::PPM(tolerance)).is_some()
}

/// Follow a precursor from the MS1 scan it was selected in, backward and
/// forward, for as long as consecutive scans hold a peak within `tolerance`
/// ppm of `precursor_mz`.
///
/// `ms1_scans` must be in acquisition order. Returns `None` when
/// `precursor_scan` is not among them.
pub fn trace_precursor_elution(
    ms1_scans: &[Ms1Point<'_>],
    precursor_scan: ScanId,
    precursor_mz: f64,
    tolerance: f64,
) -> Option<PrecursorElution> {
    let origin = ms1_scans
        .binary_search_by_key(&precursor_scan, |p| p.scan_id)
        .ok()?;
    let present = |i: usize| contains_precursor(ms1_scans[i].peaks, precursor_mz, tolerance);

    let mut leading = origin;
    let mut tailing = origin;
    if present(origin) {
        while leading > 0 && present(leading - 1) {
            leading -= 1;
        }
        while tailing + 1 < ms1_scans.len() && present(tailing + 1) {
            tailing += 1;
        }
    }

    let span = &ms1_scans[leading..=tailing];
    let profile: Vec<f64> = span
        .iter()
        .map(|p| nearest_intensity(p.peaks, precursor_mz))
        .collect();
    let times: Vec<f64> = span.iter().map(|p| p.retention_time).collect();

    let (max_offset, max_intensity) = profile.iter().copied().enumerate().fold(
        (0, f64::NEG_INFINITY),
        |(bi, bv), (i, v)| if v > bv { (i, v) } else { (bi, bv) },
    );

    Some(PrecursorElution {
        picked_intensity: nearest_intensity(ms1_scans[origin].peaks, precursor_mz),
        max_intensity,
        max_scan: span[max_offset].scan_id,
        area: trapezoid(&times, &profile),
        leading_rt: span[0].retention_time,
        tailing_rt: span[span.len() - 1].retention_time,
        leading_scan: span[0].scan_id,
        tailing_scan: span[span.len() - 1].scan_id,
        profile,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::peaks::Peak;

    fn make_scans() -> Vec<PeakList> {
        let target = 650.3;
        let heights = [0.0, 100.0, 400.0, 900.0, 300.0, 0.0, 200.0];
        heights
            .iter()
            .map(|h| {
                let mut peaks = vec![Peak::new(640.0, 50.0)];
                if *h > 0.0 {
                    peaks.push(Peak::new(target + target * 1e-6, *h));
                }
                PeakList::new(peaks)
            })
            .collect()
    }

    #[test]
    fn test_trace() {
        let scans = make_scans();
        let points: Vec<Ms1Point> = scans
            .iter()
            .enumerate()
            .map(|(i, peaks)| Ms1Point {
                scan_id: (i as ScanId) * 10 + 1,
                retention_time: i as f64 * 0.5,
                peaks,
            })
            .collect();

        let elution = trace_precursor_elution(&points, 31, 650.3, 4.0).unwrap();
        assert_eq!(elution.leading_scan, 11);
        assert_eq!(elution.tailing_scan, 41);
        assert_eq!(elution.profile, vec![100.0, 400.0, 900.0, 300.0]);
        assert_eq!(elution.picked_intensity, 900.0);
        assert_eq!(elution.max_intensity, 900.0);
        assert_eq!(elution.max_scan, 31);
        assert_eq!(elution.leading_rt, 0.5);
        assert_eq!(elution.tailing_rt, 2.0);
        let expected_area = 0.5 * (100.0 + 400.0) / 2.0
            + 0.5 * (400.0 + 900.0) / 2.0
            + 0.5 * (900.0 + 300.0) / 2.0;
        assert!((elution.area - expected_area).abs() < 1e-9);

        let elution = trace_precursor_elution(&points, 21, 650.3, 4.0).unwrap();
        assert_eq!(elution.max_scan, 31);
        assert_eq!(elution.picked_intensity, 400.0);

        let isolated = trace_precursor_elution(&points, 61, 650.3, 4.0).unwrap();
        assert_eq!(isolated.leading_scan, 61);
        assert_eq!(isolated.tailing_scan, 61);
        assert_eq!(isolated.area, 0.0);

        let absent = trace_precursor_elution(&points, 51, 650.3, 4.0).unwrap();
        assert_eq!(absent.profile.len(), 1);
        assert_eq!(absent.picked_intensity, 50.0);

        assert!(trace_precursor_elution(&points, 12, 650.3, 4.0).is_none());
    }
}
