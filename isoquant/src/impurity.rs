//! Isotopic impurity correction of reporter ion intensities.
//!
//! Each reagent channel leaks a fraction of its signal into neighboring
//! channels. An [`ImpurityTable`] lists those fractions as percentages per
//! nominal mass offset, a [`CorrectionMatrix`] places them on the active
//! channels, and [`CorrectionMatrix::solve`] recovers the true abundances of
//! one scan.
use std::collections::HashSet;

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::error::QuantError;
use crate::reagents::{tmt_ladder_position, ReporterSet, TMT_LADDER};

/// A reduced system is singular when its determinant is smaller than this
/// fraction of the product of its row norms
pub const SINGULAR_THRESHOLD: f64 = 1e-12;

/// Percent cross-talk from each channel (rows) into the channels at each
/// nominal mass offset (columns)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImpurityTable {
    labels: Vec<String>,
    offsets: Vec<i32>,
    values: Vec<Vec<f64>>,
}

impl ImpurityTable {
    pub fn new(
        labels: Vec<String>,
        offsets: Vec<i32>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, QuantError> {
        if labels.len() != values.len() {
            return Err(QuantError::InvalidImpurityTable(format!(
                "{} labels but {} rows",
                labels.len(),
                values.len()
            )));
        }
        let mut seen = HashSet::new();
        for offset in offsets.iter() {
            if *offset == 0 {
                return Err(QuantError::InvalidImpurityTable(
                    "a channel cannot leak into its own offset".into(),
                ));
            }
            if !seen.insert(*offset) {
                return Err(QuantError::InvalidImpurityTable(format!(
                    "offset {offset} appears more than once"
                )));
            }
        }
        for (label, row) in labels.iter().zip(values.iter()) {
            if row.len() != offsets.len() {
                return Err(QuantError::InvalidImpurityTable(format!(
                    "{label} has {} values for {} offsets",
                    row.len(),
                    offsets.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(QuantError::InvalidImpurityTable(format!(
                    "{label} has a negative or non-finite impurity"
                )));
            }
            let total: f64 = row.iter().sum();
            if total >= 100.0 {
                return Err(QuantError::InvalidImpurityTable(format!(
                    "{label} impurities sum to {total}%, which leaves no signal in its own channel"
                )));
            }
        }
        Ok(Self {
            labels,
            offsets,
            values,
        })
    }

    /// A table with no cross-talk at all
    pub fn zeros(labels: &[&str], offsets: &[i32]) -> Result<Self, QuantError> {
        Self::new(
            labels.iter().map(|s| s.to_string()).collect(),
            offsets.to_vec(),
            vec![vec![0.0; offsets.len()]; labels.len()],
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index]
    }

    pub fn row_sum(&self, index: usize) -> f64 {
        self.values[index].iter().sum()
    }

    pub fn get(&self, label: &str, offset: i32) -> Option<f64> {
        let row = self.labels.iter().position(|l| l == label)?;
        let col = self.offsets.iter().position(|o| *o == offset)?;
        Some(self.values[row][col])
    }
}

/// The outcome of correcting one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CorrectionStatus {
    Solved,
    /// Every channel was missing
    NoData,
    /// The reduced correction matrix could not be inverted
    Singular,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorrectedIntensities {
    /// Corrected abundances in channel order, NaN where no value was observed
    /// or the solve failed
    pub values: Vec<f64>,
    pub status: CorrectionStatus,
}

impl CorrectedIntensities {
    pub fn is_solved(&self) -> bool {
        matches!(self.status, CorrectionStatus::Solved)
    }
}

/// The fraction of each channel's true abundance observed in every channel.
///
/// Rows are source channels, columns are observed channels.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionMatrix {
    labels: Vec<String>,
    matrix: DMatrix<f64>,
}

impl CorrectionMatrix {
    /// Place an impurity table on the channels of `reporters`.
    ///
    /// The table's labels must equal the reporter labels in both order and
    /// spelling. TMT sets, including custom sets of TMT channels, place offsets
    /// on the isomer ladder, all others shift the channel index.
    pub fn build(reporters: &ReporterSet, impurities: &ImpurityTable) -> Result<Self, QuantError> {
        let labels: Vec<String> = reporters.iter().map(|c| c.label.clone()).collect();
        if labels.as_slice() != impurities.labels() {
            return Err(QuantError::ChannelLabelMismatch {
                reporter: labels,
                impurity: impurities.labels().to_vec(),
            });
        }
        let percent = if reporters.uses_tmt_ladder() {
            Self::tmt_ladder_placement(impurities)?
        } else {
            Self::index_shift_placement(impurities)
        };
        debug!(
            "Built a {}x{} correction matrix for {}",
            percent.nrows(),
            percent.ncols(),
            reporters.kind()
        );
        Ok(Self {
            labels,
            matrix: percent / 100.0,
        })
    }

    /// Offsets move directly between neighboring channel indices
    fn index_shift_placement(impurities: &ImpurityTable) -> DMatrix<f64> {
        let n = impurities.len();
        let mut percent = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                100.0 - impurities.row_sum(i)
            } else {
                0.0
            }
        });
        for i in 0..n {
            for (offset, value) in impurities.offsets().iter().zip(impurities.row(i)) {
                if *value == 0.0 {
                    continue;
                }
                let j = i as i64 + *offset as i64;
                if j < 0 || j >= n as i64 {
                    continue;
                }
                percent[(i, j as usize)] = *value;
            }
        }
        percent
    }

    /// Offsets move along the full TMT isomer ladder, where one nominal mass
    /// unit spans two positions, before the ladder is cut back down to the
    /// active channels.
    fn tmt_ladder_placement(impurities: &ImpurityTable) -> Result<DMatrix<f64>, QuantError> {
        let positions = impurities
            .labels()
            .iter()
            .map(|label| {
                tmt_ladder_position(label).ok_or_else(|| {
                    QuantError::InvalidImpurityTable(format!("{label} is not a TMT channel"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let size = TMT_LADDER.len();
        let mut ladder = DMatrix::from_diagonal_element(size, size, 100.0);
        for (row, position) in positions.iter().enumerate() {
            ladder[(*position, *position)] = 100.0 - impurities.row_sum(row);
            for (offset, value) in impurities.offsets().iter().zip(impurities.row(row)) {
                let col = *position as i64 + 2 * *offset as i64;
                if col < 0 || col >= size as i64 {
                    continue;
                }
                ladder[(*position, col as usize)] = *value;
            }
        }

        let n = positions.len();
        Ok(DMatrix::from_fn(n, n, |i, j| {
            ladder[(positions[i], positions[j])]
        }))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// The fraction of `source`'s abundance observed in `observed`
    pub fn get(&self, source: usize, observed: usize) -> f64 {
        self.matrix[(source, observed)]
    }

    /// Predict the observed intensities of true abundances. Missing (NaN)
    /// channels neither contribute nor receive signal.
    pub fn forward(&self, abundances: &[f64]) -> Vec<f64> {
        (0..self.len())
            .map(|j| {
                if abundances.get(j).map_or(true, |v| v.is_nan()) {
                    return f64::NAN;
                }
                abundances
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_nan())
                    .map(|(i, v)| self.matrix[(i, j)] * v)
                    .sum()
            })
            .collect()
    }

    /// Recover the true abundances behind one scan's observed intensities.
    ///
    /// Only channels with an observed value take part. One channel is divided
    /// by its own fraction, otherwise the reduced system is solved by Cramer's
    /// rule. Missing channels stay NaN.
    pub fn solve(&self, observed: &[f64]) -> CorrectedIntensities {
        let mut values = observed.to_vec();
        if observed.len() != self.len() {
            warn!(
                "Expected {} channel intensities but received {}",
                self.len(),
                observed.len()
            );
            values.iter_mut().for_each(|v| *v = f64::NAN);
            return CorrectedIntensities {
                values,
                status: CorrectionStatus::Singular,
            };
        }

        let present: Vec<usize> = observed
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .map(|(i, _)| i)
            .collect();
        if present.is_empty() {
            return CorrectedIntensities {
                values,
                status: CorrectionStatus::NoData,
            };
        }

        let n = present.len();
        let system = DMatrix::from_fn(n, n, |row, col| {
            self.matrix[(present[col], present[row])]
        });
        let rhs = DVector::from_iterator(n, present.iter().map(|i| observed[*i]));

        let solution = if is_diagonal(&system) {
            solve_diagonal(&system, &rhs)
        } else {
            solve_cramer(&system, &rhs)
        };

        let status = match solution {
            Some(solution) => {
                for (i, v) in present.iter().zip(solution) {
                    values[*i] = v;
                }
                CorrectionStatus::Solved
            }
            None => {
                for i in present.iter() {
                    values[*i] = f64::NAN;
                }
                CorrectionStatus::Singular
            }
        };
        CorrectedIntensities { values, status }
    }
}

fn is_diagonal(m: &DMatrix<f64>) -> bool {
    (0..m.nrows()).all(|i| (0..m.ncols()).all(|j| i == j || m[(i, j)] == 0.0))
}

fn solve_diagonal(m: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<Vec<f64>> {
    let scale = m.amax();
    (0..m.nrows())
        .map(|i| {
            let d = m[(i, i)];
            if !d.is_finite() || d.abs() <= SINGULAR_THRESHOLD * scale {
                None
            } else {
                Some(rhs[i] / d)
            }
        })
        .collect()
}

fn solve_cramer(m: &DMatrix<f64>, rhs: &DVector<f64>) -> Option<Vec<f64>> {
    let det = m.determinant();
    let bound: f64 = m.row_iter().map(|row| row.norm()).product();
    if !det.is_finite() || bound == 0.0 || det.abs() < SINGULAR_THRESHOLD * bound {
        return None;
    }
    let solution = (0..m.ncols())
        .map(|i| {
            let mut replaced = m.clone();
            replaced.set_column(i, rhs);
            replaced.determinant() / det
        })
        .collect();
    Some(solution)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reagents::{ReagentKind, ReporterChannel};

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    const OFFSETS: [i32; 4] = [-2, -1, 1, 2];

    fn make_tmt10_impurities() -> ImpurityTable {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt10).unwrap();
        let rows = vec![
            vec![0.0, 0.0, 5.0, 0.1],
            vec![0.0, 0.4, 6.5, 0.0],
            vec![0.0, 0.2, 4.6, 0.0],
            vec![0.0, 0.9, 4.7, 0.0],
            vec![0.1, 0.5, 3.2, 0.0],
            vec![0.0, 2.6, 3.0, 0.0],
            vec![0.0, 2.3, 2.7, 0.0],
            vec![0.0, 2.7, 2.5, 0.0],
            vec![0.0, 2.5, 1.9, 0.0],
            vec![0.0, 3.6, 0.0, 0.0],
        ];
        ImpurityTable::new(
            reporters.labels().iter().map(|s| s.to_string()).collect(),
            OFFSETS.to_vec(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_impurities_identity() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt6).unwrap();
        let table = ImpurityTable::zeros(&reporters.labels(), &OFFSETS).unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_eq!(matrix.matrix(), &DMatrix::<f64>::identity(6, 6));

        let raw = vec![1520.5, 800.25, f64::NAN, 0.0, 33.3, 1e7];
        let corrected = matrix.solve(&raw);
        assert!(corrected.is_solved());
        for (a, b) in raw.iter().zip(corrected.values.iter()) {
            assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_label_mismatch() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt6).unwrap();
        let mut labels = reporters.labels();
        labels.swap(0, 1);
        let table = ImpurityTable::zeros(&labels, &OFFSETS).unwrap();
        let err = CorrectionMatrix::build(&reporters, &table).unwrap_err();
        assert!(matches!(err, QuantError::ChannelLabelMismatch { .. }));

        let table = ImpurityTable::zeros(&["TMT126"], &OFFSETS).unwrap();
        let reporters = ReporterSet::builtin(ReagentKind::Tmt0).unwrap();
        assert!(CorrectionMatrix::build(&reporters, &table).is_err());
    }

    #[test]
    fn test_invalid_tables() {
        let labels = vec!["a".to_string()];
        assert!(ImpurityTable::new(labels.clone(), vec![1], vec![vec![100.0]]).is_err());
        assert!(ImpurityTable::new(labels.clone(), vec![1], vec![vec![-1.0]]).is_err());
        assert!(ImpurityTable::new(labels.clone(), vec![0], vec![vec![1.0]]).is_err());
        assert!(ImpurityTable::new(labels.clone(), vec![1, 1], vec![vec![1.0, 1.0]]).is_err());
        assert!(ImpurityTable::new(labels.clone(), vec![1, 2], vec![vec![1.0]]).is_err());
        assert!(ImpurityTable::new(labels, vec![1], vec![]).is_err());
    }

    #[test]
    fn test_itraq_placement() {
        let reporters = ReporterSet::builtin(ReagentKind::Itraq4).unwrap();
        let rows = vec![
            vec![0.0, 1.0, 5.9, 0.2],
            vec![0.0, 2.0, 5.6, 0.1],
            vec![0.0, 3.0, 4.5, 0.1],
            vec![0.1, 4.0, 3.5, 0.1],
        ];
        let table = ImpurityTable::new(
            reporters.labels().iter().map(|s| s.to_string()).collect(),
            OFFSETS.to_vec(),
            rows,
        )
        .unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_is_close!(matrix.get(0, 0), 0.929, 1e-12, "diagonal");
        assert_is_close!(matrix.get(0, 1), 0.059, 1e-12, "+1");
        assert_is_close!(matrix.get(0, 2), 0.002, 1e-12, "+2");
        assert_is_close!(matrix.get(1, 0), 0.02, 1e-12, "-1");
        assert_is_close!(matrix.get(3, 1), 0.001, 1e-12, "-2");
        assert_is_close!(matrix.get(3, 2), 0.04, 1e-12, "-1");
        assert_eq!(matrix.get(0, 3), 0.0);
    }

    #[test]
    fn test_tmt_ladder_placement() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt10).unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &make_tmt10_impurities()).unwrap();
        // tmt126 +1 lands on tmt127C, two ladder steps away
        assert_is_close!(matrix.get(0, 2), 0.05, 1e-12, "126 -> 127C");
        assert_eq!(matrix.get(0, 1), 0.0);
        // tmt126 +2 lands on tmt128C
        assert_is_close!(matrix.get(0, 4), 0.001, 1e-12, "126 -> 128C");
        // tmt131 sits on the 131N rung
        assert_is_close!(matrix.get(9, 7), 0.036, 1e-12, "131 -> 130N");
        assert_is_close!(matrix.get(9, 9), 0.964, 1e-12, "131");

        for i in 0..matrix.len() {
            let d = matrix.get(i, i);
            assert!(d > 0.0 && d <= 1.0);
        }
    }

    #[test]
    fn test_tmt_subset_pruning() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt6).unwrap();
        let rows = vec![vec![0.0, 0.0, 5.0, 1.0]; 6];
        let table = ImpurityTable::new(
            reporters.labels().iter().map(|s| s.to_string()).collect(),
            OFFSETS.to_vec(),
            rows,
        )
        .unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_eq!(matrix.len(), 6);
        // +1 of tmt126 falls on the inactive tmt127C rung and is dropped
        assert_eq!(matrix.get(0, 1), 0.0);
        // +2 of tmt126 reaches tmt128C
        assert_is_close!(matrix.get(0, 2), 0.01, 1e-12, "126 -> 128C");
        assert_is_close!(matrix.get(0, 0), 0.94, 1e-12, "diagonal");
    }

    #[test]
    fn test_round_trip() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt10).unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &make_tmt10_impurities()).unwrap();
        let truth: Vec<f64> = (0..10).map(|i| 1000.0 + 731.5 * i as f64).collect();

        let masks: [&[usize]; 4] = [&[], &[3], &[0, 9], &[1, 2, 5, 6, 7, 8, 9]];
        for missing in masks {
            let mut subset = truth.clone();
            for i in missing {
                subset[*i] = f64::NAN;
            }
            let observed = matrix.forward(&subset);
            let corrected = matrix.solve(&observed);
            assert!(corrected.is_solved());
            for (expected, found) in subset.iter().zip(corrected.values.iter()) {
                if expected.is_nan() {
                    assert!(found.is_nan());
                } else {
                    assert!(
                        ((found - expected) / expected).abs() < 1e-9,
                        "{found} != {expected}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_single_channel_and_empty() {
        let reporters = ReporterSet::builtin(ReagentKind::Tmt10).unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &make_tmt10_impurities()).unwrap();
        let mut observed = vec![f64::NAN; 10];
        observed[9] = 964.0;
        let corrected = matrix.solve(&observed);
        assert!(corrected.is_solved());
        assert_is_close!(corrected.values[9], 1000.0, 1e-9, "single channel");

        let corrected = matrix.solve(&[f64::NAN; 10]);
        assert_eq!(corrected.status, CorrectionStatus::NoData);
        assert!(corrected.values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_singular_is_reported() {
        let reporters = ReporterSet::custom(vec![
            ReporterChannel::new("light", 100.0),
            ReporterChannel::new("heavy", 101.0),
        ])
        .unwrap();
        let table = ImpurityTable::new(
            vec!["light".into(), "heavy".into()],
            vec![-1, 1],
            vec![vec![0.0, 50.0], vec![50.0, 0.0]],
        )
        .unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_is_close!(matrix.get(0, 1), 0.5, 1e-12, "leak");

        let corrected = matrix.solve(&[100.0, 100.0]);
        assert_eq!(corrected.status, CorrectionStatus::Singular);
        assert!(corrected.values.iter().all(|v| v.is_nan()));

        let corrected = matrix.solve(&[100.0, f64::NAN]);
        assert!(corrected.is_solved());
        assert_is_close!(corrected.values[0], 200.0, 1e-9, "single channel");
    }

    #[test]
    fn test_custom_tmt_set_uses_ladder() {
        let reporters = ReporterSet::custom(vec![
            ReporterChannel::new("tmt126", 126.127726),
            ReporterChannel::new("tmt127N", 127.124761),
            ReporterChannel::new("tmt127C", 127.131081),
        ])
        .unwrap();
        let table = ImpurityTable::new(
            reporters.labels().iter().map(|s| s.to_string()).collect(),
            vec![-1, 1],
            vec![vec![0.0, 5.0], vec![0.0, 0.0], vec![0.0, 0.0]],
        )
        .unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        // +1 of tmt126 is tmt127C, two rungs up, not the neighboring tmt127N
        assert_eq!(matrix.get(0, 1), 0.0);
        assert_is_close!(matrix.get(0, 2), 0.05, 1e-12, "126 -> 127C");
        assert_is_close!(matrix.get(0, 0), 0.95, 1e-12, "diagonal");

        let reporters = ReporterSet::custom(vec![
            ReporterChannel::new("light", 100.0),
            ReporterChannel::new("middle", 101.0),
            ReporterChannel::new("heavy", 102.0),
        ])
        .unwrap();
        let table = ImpurityTable::new(
            vec!["light".into(), "middle".into(), "heavy".into()],
            vec![-1, 1],
            vec![vec![0.0, 5.0], vec![0.0, 0.0], vec![0.0, 0.0]],
        )
        .unwrap();
        let matrix = CorrectionMatrix::build(&reporters, &table).unwrap();
        assert_is_close!(matrix.get(0, 1), 0.05, 1e-12, "light -> middle");
        assert_eq!(matrix.get(0, 2), 0.0);
    }

    #[test]
    fn test_singularity_is_scale_free() {
        let base = DMatrix::from_row_slice(3, 3, &[1.0, 0.1, 0.0, 0.1, 1.0, 0.1, 0.0, 0.1, 1.0]);
        let rhs = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let expected = solve_cramer(&base, &rhs).unwrap();
        for scale in [1e-6, 1e6] {
            let scaled = solve_cramer(&(&base * scale), &(&rhs * scale)).unwrap();
            for (a, b) in expected.iter().zip(scaled.iter()) {
                assert_is_close!(*a, *b, 1e-9, "scaled solution");
            }
        }

        let degenerate = DMatrix::from_row_slice(2, 2, &[1e6, 1e6, 1e6, 1e6 * (1.0 + 1e-15)]);
        assert!(solve_cramer(&degenerate, &DVector::from_row_slice(&[1.0, 1.0])).is_none());

        let tiny = DMatrix::from_diagonal_element(2, 2, 1e-14);
        assert!(solve_diagonal(&tiny, &DVector::from_row_slice(&[1.0, 1.0])).is_some());
        let zero_row = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        assert!(solve_diagonal(&zero_row, &DVector::from_row_slice(&[1.0, 1.0])).is_none());
    }
}
