//! ## Selector Base
//!
//! Configuration and helpers shared by every feature selector:
//!
//! - [`SelectorConfig`] holds the columns a selector considers, the target column and the
//!   columns it must always ignore.
//! - [`candidate_columns`] / [`frame_from_x_y`] resolve which columns a selector looks at. This
//!   is the only place that resolution happens, so every selector (and the pipeline's input
//!   restriction) agrees on it.
//! - [`retain_features`] and [`apply_drop`] implement the shared `transform` behavior.
//! - [`resolve_missing_policy`] applies the `na_warn` override used by the statistical selectors.

use crate::exceptions::{PruneError, PruneResult};
use crate::frame::FrameExt;
use crate::settings::{MissingValuePolicy, NaPolicyOverride};
use datafusion::dataframe::DataFrame;
use tracing::warn;

/// Which columns a selector considers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorConfig {
    /// Columns to consider; `None` means every non-target column.
    pub feature_names: Option<Vec<String>>,
    /// Column excluded from consideration but kept through `transform`.
    pub target_feature: Option<String>,
    /// Columns never considered.
    pub exclude_features: Vec<String>,
}

impl SelectorConfig {
    /// Candidate columns of `df`, in frame order.
    pub fn candidates(&self, df: &DataFrame) -> PruneResult<Vec<String>> {
        candidate_columns(
            &df.column_names(),
            self.feature_names.as_deref(),
            self.target_feature.as_deref(),
            &self.exclude_features,
        )
    }

    /// `df` projected to the candidate columns, or `None` when there are no candidates.
    pub fn candidate_frame(&self, df: &DataFrame) -> PruneResult<Option<DataFrame>> {
        if self.candidates(df)?.is_empty() {
            return Ok(None);
        }
        frame_from_x_y(
            df,
            self.feature_names.as_deref(),
            self.target_feature.as_deref(),
            &self.exclude_features,
            false,
        )
        .map(Some)
    }
}

/// Resolves candidate columns: `(feature_names or all columns) - exclude_features - {target}`.
///
/// The result follows the order of `columns`. Every name in `feature_names` must be one of
/// `columns`.
pub fn candidate_columns(
    columns: &[String],
    feature_names: Option<&[String]>,
    target_feature: Option<&str>,
    exclude_features: &[String],
) -> PruneResult<Vec<String>> {
    if let Some(names) = feature_names {
        if let Some(missing) = names.iter().find(|n| !columns.contains(n)) {
            return Err(PruneError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                missing
            )));
        }
    }
    Ok(columns
        .iter()
        .filter(|c| feature_names.map_or(true, |names| names.contains(c)))
        .filter(|c| target_feature != Some(c.as_str()))
        .filter(|c| !exclude_features.contains(c))
        .cloned()
        .collect())
}

/// Projects `df` to its candidate columns, followed by the target when `retain_target` is set
/// and the frame has it.
pub fn frame_from_x_y(
    df: &DataFrame,
    feature_names: Option<&[String]>,
    target_feature: Option<&str>,
    exclude_features: &[String],
    retain_target: bool,
) -> PruneResult<DataFrame> {
    let columns = df.column_names();
    let mut selected = candidate_columns(&columns, feature_names, target_feature, exclude_features)?;
    if retain_target {
        if let Some(target) = target_feature {
            if columns.iter().any(|c| c == target) {
                selected.push(target.to_string());
            }
        }
    }
    df.restrict(&selected)
}

/// `columns` without the ones in `drop`, order preserved.
pub fn retain_features(columns: &[String], drop: &[String]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| !drop.contains(c))
        .cloned()
        .collect()
}

/// Shared `transform`: removes the fitted drop list from `df`.
pub fn apply_drop(
    df: DataFrame,
    drop: Option<&[String]>,
    selector: &str,
) -> PruneResult<DataFrame> {
    let drop = drop.ok_or(PruneError::FitNotCalled)?;
    let columns = df.column_names();
    let keep = retain_features(&columns, drop);
    if keep.len() == columns.len() {
        return Ok(df);
    }
    if keep.is_empty() {
        return Err(PruneError::InvalidParameter(format!(
            "All features were dropped by {}.",
            selector
        )));
    }
    df.restrict(&keep)
}

/// Falls back to `complete.obs` when `na_warn` is set, another policy was requested and the
/// frame holds missing values. The override is logged and returned.
pub async fn resolve_missing_policy(
    df: &DataFrame,
    requested: MissingValuePolicy,
    na_warn: bool,
) -> PruneResult<(MissingValuePolicy, Option<NaPolicyOverride>)> {
    if requested == MissingValuePolicy::CompleteObs || !na_warn {
        return Ok((requested, None));
    }
    let missing_values = df.total_missing().await?;
    if missing_values == 0 {
        return Ok((requested, None));
    }
    warn!(
        missing_values,
        requested = %requested,
        "{} NA value(s) in frame; using \"complete.obs\"",
        missing_values
    );
    Ok((
        MissingValuePolicy::CompleteObs,
        Some(NaPolicyOverride {
            requested,
            missing_values,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ns: &[&str]) -> Vec<String> {
        ns.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_candidates_default_to_all_non_target_columns() {
        let cols = names(&["a", "b", "y", "c"]);
        let out = candidate_columns(&cols, None, Some("y"), &[]).unwrap();
        assert_eq!(out, names(&["a", "b", "c"]));
    }

    #[test]
    fn test_candidates_follow_frame_order_and_apply_exclusions() {
        let cols = names(&["a", "b", "y", "c"]);
        let features = names(&["c", "a", "y", "b"]);
        let out =
            candidate_columns(&cols, Some(features.as_slice()), Some("y"), &names(&["b"])).unwrap();
        assert_eq!(out, names(&["a", "c"]));
    }

    #[test]
    fn test_candidates_reject_unknown_feature() {
        let cols = names(&["a", "b"]);
        let features = names(&["a", "zz"]);
        let err = candidate_columns(&cols, Some(features.as_slice()), None, &[]).unwrap_err();
        assert!(matches!(err, PruneError::MissingColumn(_)));
    }

    #[test]
    fn test_retain_features() {
        let cols = names(&["a", "b", "c"]);
        assert_eq!(retain_features(&cols, &names(&["b", "x"])), names(&["a", "c"]));
        assert_eq!(retain_features(&cols, &[]), cols);
    }
}
