//! ## Statistics Kernels
//!
//! Pure numeric routines behind the selectors. They work on materialized columns
//! (`Vec<Option<f64>>`, `None` meaning a missing value) so they can be tested without an engine.
//!
//! - [`variances`] and [`correlation_matrix`] honor a [`MissingValuePolicy`] and the `na_rm` flag.
//! - [`filter_collinearity`] runs the greedy mean-absolute-correlation elimination.
//! - [`frequency_ratio`] computes the most-common to second-most-common frequency ratio.
//!
//! ### Missing values
//!
//! With `na_rm = true` every statistic uses the rows where its own inputs are present
//! (pairwise deletion) whatever the policy. Otherwise:
//!
//! - `complete.obs`: rows with a missing value in *any* column are removed first.
//! - `all.obs`: any missing value is an [`PruneError::InsufficientData`] error.
//! - `everything`: a statistic touching a missing value is `NaN`.

use crate::exceptions::{PruneError, PruneResult};
use crate::settings::MissingValuePolicy;
use approx::relative_eq;
use ndarray::Array2;
use rayon::prelude::*;

/// One materialized column.
pub type Column = Vec<Option<f64>>;

/// One step of the greedy multicollinearity elimination.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationRecord {
    /// The earlier column of the correlated pair, in original column order.
    pub feature_x: String,
    /// The later column of the correlated pair.
    pub feature_y: String,
    /// Absolute correlation between the two.
    pub abs_correlation: f64,
    /// Which of the two was dropped.
    pub dropped: String,
    /// Mean absolute correlation of the dropped column when it was dropped.
    pub mac: f64,
}

/// Row selection derived from a missing-value policy.
struct RowFilter {
    mask: Option<Vec<bool>>,
    propagate_missing: bool,
}

impl RowFilter {
    fn new(columns: &[Column], policy: MissingValuePolicy, na_rm: bool) -> PruneResult<Self> {
        if na_rm {
            return Ok(Self {
                mask: None,
                propagate_missing: false,
            });
        }
        match policy {
            MissingValuePolicy::CompleteObs => {
                let rows = columns.first().map_or(0, Vec::len);
                let mask = (0..rows)
                    .map(|row| columns.iter().all(|c| c[row].is_some()))
                    .collect();
                Ok(Self {
                    mask: Some(mask),
                    propagate_missing: false,
                })
            }
            MissingValuePolicy::AllObs => {
                let missing: usize = columns
                    .iter()
                    .map(|c| c.iter().filter(|v| v.is_none()).count())
                    .sum();
                if missing > 0 {
                    return Err(PruneError::InsufficientData(format!(
                        "{} missing value(s) present with use=all.obs",
                        missing
                    )));
                }
                Ok(Self {
                    mask: None,
                    propagate_missing: false,
                })
            }
            MissingValuePolicy::Everything => Ok(Self {
                mask: None,
                propagate_missing: true,
            }),
        }
    }

    fn keeps(&self, row: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m[row])
    }

    /// Present values of a column, or `None` if a missing value must propagate.
    fn values(&self, column: &Column) -> Option<Vec<f64>> {
        let mut out = Vec::with_capacity(column.len());
        for (row, value) in column.iter().enumerate() {
            if !self.keeps(row) {
                continue;
            }
            match value {
                Some(v) => out.push(*v),
                None if self.propagate_missing => return None,
                None => {}
            }
        }
        Some(out)
    }

    /// Row-aligned present values of two columns.
    fn paired(&self, x: &Column, y: &Column) -> Option<(Vec<f64>, Vec<f64>)> {
        let mut xs = Vec::with_capacity(x.len());
        let mut ys = Vec::with_capacity(y.len());
        for (row, (a, b)) in x.iter().zip(y.iter()).enumerate() {
            if !self.keeps(row) {
                continue;
            }
            match (a, b) {
                (Some(a), Some(b)) => {
                    xs.push(*a);
                    ys.push(*b);
                }
                _ if self.propagate_missing => return None,
                _ => {}
            }
        }
        Some((xs, ys))
    }
}

/// Sample variance (denominator `n - 1`); `NaN` with fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
}

/// Pearson correlation; `NaN` when either side is constant or has fewer than two values.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return f64::NAN;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let cov: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(a, b)| (a - mean_x) * (b - mean_y))
        .sum();
    let sxx: f64 = xs.iter().map(|a| (a - mean_x).powi(2)).sum();
    let syy: f64 = ys.iter().map(|b| (b - mean_y).powi(2)).sum();
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    cov / (sxx.sqrt() * syy.sqrt())
}

/// Per-column sample variances under the given missing-value handling.
pub fn variances(
    columns: &[Column],
    policy: MissingValuePolicy,
    na_rm: bool,
) -> PruneResult<Vec<f64>> {
    let filter = RowFilter::new(columns, policy, na_rm)?;
    Ok(columns
        .par_iter()
        .map(|c| {
            filter
                .values(c)
                .map_or(f64::NAN, |values| sample_variance(&values))
        })
        .collect())
}

/// Symmetric Pearson correlation matrix with a unit diagonal.
pub fn correlation_matrix(
    columns: &[Column],
    policy: MissingValuePolicy,
    na_rm: bool,
) -> PruneResult<Array2<f64>> {
    let filter = RowFilter::new(columns, policy, na_rm)?;
    let n = columns.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
        .collect();
    let values: Vec<f64> = pairs
        .par_iter()
        .map(|&(i, j)| {
            filter
                .paired(&columns[i], &columns[j])
                .map_or(f64::NAN, |(xs, ys)| pearson(&xs, &ys))
        })
        .collect();

    let mut matrix = Array2::<f64>::eye(n);
    for (&(i, j), r) in pairs.iter().zip(values) {
        matrix[[i, j]] = r;
        matrix[[j, i]] = r;
    }
    Ok(matrix)
}

/// Ratio of the largest to the second-largest frequency. A single distinct value (or none)
/// is maximally dominant and yields `+inf`.
pub fn frequency_ratio(frequencies: &[u64]) -> f64 {
    let mut sorted = frequencies.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    match sorted.as_slice() {
        [first, second, ..] if *second > 0 => *first as f64 / *second as f64,
        _ => f64::INFINITY,
    }
}

/// Mean of `|matrix[row, j]|` over live `j != row`, skipping `NaN`s.
fn mean_abs_correlation(matrix: &Array2<f64>, live: &[bool], row: usize) -> f64 {
    let (sum, count) = live
        .iter()
        .enumerate()
        .filter(|&(j, alive)| *alive && j != row)
        .map(|(j, _)| matrix[[row, j]].abs())
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Greedy multicollinearity elimination.
///
/// Repeatedly takes the live pair with the highest absolute correlation above `threshold`
/// (first pair in row-major order on equal values) and drops the member with the higher mean
/// absolute correlation to the other live columns. Equal MACs drop the later column. Dropped
/// columns leave the live set, so they never count towards later MACs.
///
/// Returns one record per dropped column, in drop order.
pub fn filter_collinearity(
    matrix: &Array2<f64>,
    names: &[String],
    threshold: f64,
) -> PruneResult<Vec<CorrelationRecord>> {
    let n = names.len();
    if matrix.nrows() != n || matrix.ncols() != n {
        return Err(PruneError::InvalidParameter(format!(
            "correlation matrix is {}x{} but {} column names were given",
            matrix.nrows(),
            matrix.ncols(),
            n
        )));
    }

    let mut live = vec![true; n];
    let mut records = Vec::new();
    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| live[i]) {
            for j in (i + 1..n).filter(|&j| live[j]) {
                let value = matrix[[i, j]].abs();
                if value.is_nan() || value <= threshold {
                    continue;
                }
                if best.map_or(true, |(_, _, top)| value > top) {
                    best = Some((i, j, value));
                }
            }
        }
        let Some((a, b, value)) = best else {
            break;
        };

        let mac_a = mean_abs_correlation(matrix, &live, a);
        let mac_b = mean_abs_correlation(matrix, &live, b);
        let (dropped, mac) =
            if mac_a > mac_b && !relative_eq!(mac_a, mac_b, max_relative = 1e-12) {
                (a, mac_a)
            } else {
                (b, mac_b)
            };

        live[dropped] = false;
        records.push(CorrelationRecord {
            feature_x: names[a].clone(),
            feature_y: names[b].clone(),
            abs_correlation: value,
            dropped: names[dropped].clone(),
            mac,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    fn full(values: &[f64]) -> Column {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_sample_variance() {
        assert_abs_diff_eq!(sample_variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0, epsilon = 1e-12);
        assert_eq!(sample_variance(&[2.0, 2.0, 2.0]), 0.0);
        assert!(sample_variance(&[1.0]).is_nan());
    }

    #[test]
    fn test_pearson() {
        assert_abs_diff_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, epsilon = 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_complete_obs_drops_incomplete_rows_everywhere() {
        let columns = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), Some(100.0)],
            vec![Some(1.0), Some(2.0), Some(3.0), None],
        ];
        let vars = variances(&columns, MissingValuePolicy::CompleteObs, false).unwrap();
        // Row 3 is incomplete, so the outlier in column 0 is ignored.
        assert_abs_diff_eq!(vars[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vars[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_na_rm_uses_pairwise_rows() {
        let columns = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), Some(100.0)],
            vec![Some(1.0), Some(2.0), Some(3.0), None],
        ];
        let vars = variances(&columns, MissingValuePolicy::Everything, true).unwrap();
        assert!(vars[0] > 1000.0);
        assert_abs_diff_eq!(vars[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_everything_propagates_missing() {
        let columns = vec![
            vec![Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(1.0), None, Some(3.0)],
            vec![Some(3.0), Some(2.0), Some(1.0)],
        ];
        let vars = variances(&columns, MissingValuePolicy::Everything, false).unwrap();
        assert!(!vars[0].is_nan());
        assert!(vars[1].is_nan());

        let c = correlation_matrix(&columns, MissingValuePolicy::Everything, false).unwrap();
        assert!(c[[0, 1]].is_nan());
        assert!(c[[1, 2]].is_nan());
        assert_abs_diff_eq!(c[[0, 2]], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_obs_rejects_missing() {
        let columns = vec![vec![Some(1.0), None]];
        let err = variances(&columns, MissingValuePolicy::AllObs, false).unwrap_err();
        assert!(matches!(err, PruneError::InsufficientData(_)));
        // na_rm takes precedence over the policy.
        assert!(variances(&columns, MissingValuePolicy::AllObs, true).is_ok());
    }

    #[test]
    fn test_correlation_matrix_is_symmetric_with_unit_diagonal() {
        let columns = vec![
            full(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            full(&[2.0, 1.0, 4.0, 3.0, 6.0]),
            full(&[5.0, 3.0, 4.0, 1.0, 2.0]),
        ];
        let c = correlation_matrix(&columns, MissingValuePolicy::CompleteObs, false).unwrap();
        for i in 0..3 {
            assert_eq!(c[[i, i]], 1.0);
            for j in 0..3 {
                assert_eq!(c[[i, j]], c[[j, i]]);
            }
        }
    }

    #[test]
    fn test_frequency_ratio() {
        assert_eq!(frequency_ratio(&[9, 1]), 9.0);
        assert_eq!(frequency_ratio(&[2, 8, 4]), 2.0);
        assert_eq!(frequency_ratio(&[5, 5]), 1.0);
        assert_eq!(frequency_ratio(&[7]), f64::INFINITY);
        assert_eq!(frequency_ratio(&[]), f64::INFINITY);
    }

    #[test]
    fn test_filter_drops_the_higher_mac_member() {
        let c = array![[1.0, 0.9, 0.5], [0.9, 1.0, 0.88], [0.5, 0.88, 1.0]];
        let records = filter_collinearity(&c, &names(&["x", "y", "z"]), 0.85).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!((r.feature_x.as_str(), r.feature_y.as_str()), ("x", "y"));
        assert_eq!(r.dropped, "y");
        assert_abs_diff_eq!(r.abs_correlation, 0.9);
        assert_abs_diff_eq!(r.mac, 0.89, epsilon = 1e-12);
    }

    #[test]
    fn test_filter_shrinks_live_set_and_breaks_ties_by_order() {
        let c = array![
            [1.0, 0.95, 0.1, 0.1],
            [0.95, 1.0, 0.1, 0.1],
            [0.1, 0.1, 1.0, -0.9],
            [0.1, 0.1, -0.9, 1.0]
        ];
        let records = filter_collinearity(&c, &names(&["a", "b", "c", "d"]), 0.85).unwrap();
        let dropped: Vec<&str> = records.iter().map(|r| r.dropped.as_str()).collect();
        assert_eq!(dropped, vec!["b", "d"]);
        assert_abs_diff_eq!(records[0].mac, 1.15 / 3.0, epsilon = 1e-12);
        // b is no longer live, so only a and c count towards the MAC of d.
        assert_abs_diff_eq!(records[1].mac, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(records[1].abs_correlation, 0.9);
    }

    #[test]
    fn test_filter_ignores_nan_and_boundary_values() {
        let c = array![
            [1.0, f64::NAN, 0.85],
            [f64::NAN, 1.0, 0.2],
            [0.85, 0.2, 1.0]
        ];
        let records = filter_collinearity(&c, &names(&["a", "b", "c"]), 0.85).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent_on_survivors() {
        let columns = vec![
            full(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            full(&[1.1, 2.0, 3.2, 3.9, 5.1, 6.0]),
            full(&[2.0, 4.1, 6.0, 8.2, 9.9, 12.0]),
            full(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0]),
        ];
        let all = names(&["p", "q", "r", "s"]);
        let c = correlation_matrix(&columns, MissingValuePolicy::CompleteObs, false).unwrap();
        let records = filter_collinearity(&c, &all, 0.85).unwrap();
        assert_eq!(records.len(), 2);

        let kept: Vec<usize> = (0..all.len())
            .filter(|&i| records.iter().all(|r| r.dropped != all[i]))
            .collect();
        let kept_cols: Vec<Column> = kept.iter().map(|&i| columns[i].clone()).collect();
        let kept_names: Vec<String> = kept.iter().map(|&i| all[i].clone()).collect();
        let c2 = correlation_matrix(&kept_cols, MissingValuePolicy::CompleteObs, false).unwrap();
        assert!(filter_collinearity(&c2, &kept_names, 0.85).unwrap().is_empty());
    }

    #[test]
    fn test_filter_rejects_mismatched_names() {
        let c = Array2::<f64>::eye(2);
        assert!(matches!(
            filter_collinearity(&c, &names(&["a"]), 0.5),
            Err(PruneError::InvalidParameter(_))
        ));
    }
}
