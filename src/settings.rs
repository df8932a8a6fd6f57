//! ## Selector Settings
//!
//! Typed configuration shared by the selectors, together with the default values each selector
//! starts from. String-valued options follow the names used by R-style statistics engines
//! (`"complete.obs"`, `"all.obs"`, `"everything"`) and parse through [`FromStr`], so a bad value
//! is rejected as [`PruneError::InvalidParameter`] before any frame is touched.

use crate::exceptions::PruneError;
use std::fmt;
use std::str::FromStr;

/// Default missing-fraction threshold of `SparseFeatureDropper`.
pub const DEFAULT_SPARSITY_THRESHOLD: f64 = 0.5;

/// Default absolute-correlation threshold of `MulticollinearityFilterer`.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.85;

/// Default variance threshold of `NearZeroVarianceFilterer`.
pub const DEFAULT_VARIANCE_THRESHOLD: f64 = 1e-6;

/// How missing values are handled when computing variances and correlations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// Only rows with no missing value in any candidate column are used.
    #[default]
    CompleteObs,
    /// Missing values are an error.
    AllObs,
    /// Missing values propagate, so any statistic touching one is `NaN`.
    Everything,
}

impl MissingValuePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingValuePolicy::CompleteObs => "complete.obs",
            MissingValuePolicy::AllObs => "all.obs",
            MissingValuePolicy::Everything => "everything",
        }
    }
}

impl fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissingValuePolicy {
    type Err = PruneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complete.obs" => Ok(MissingValuePolicy::CompleteObs),
            "all.obs" => Ok(MissingValuePolicy::AllObs),
            "everything" => Ok(MissingValuePolicy::Everything),
            other => Err(PruneError::InvalidParameter(format!(
                "expected one of (complete.obs, all.obs, everything) but got {}",
                other
            ))),
        }
    }
}

/// Strategy used by `NearZeroVarianceFilterer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NzvStrategy {
    /// Drop columns whose variance is below the threshold.
    #[default]
    Variance,
    /// Drop columns whose most-common to second-most-common frequency ratio exceeds the threshold.
    Ratio,
}

impl fmt::Display for NzvStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NzvStrategy::Variance => f.write_str("variance"),
            NzvStrategy::Ratio => f.write_str("ratio"),
        }
    }
}

impl FromStr for NzvStrategy {
    type Err = PruneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "variance" => Ok(NzvStrategy::Variance),
            "ratio" => Ok(NzvStrategy::Ratio),
            other => Err(PruneError::InvalidParameter(format!(
                "strategy must be one of (variance, ratio), but got {}",
                other
            ))),
        }
    }
}

/// Records that a requested missing-value policy was replaced by `complete.obs`
/// because the frame held missing values and `na_warn` was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaPolicyOverride {
    pub requested: MissingValuePolicy,
    pub missing_values: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_round_trips_through_str() {
        for policy in [
            MissingValuePolicy::CompleteObs,
            MissingValuePolicy::AllObs,
            MissingValuePolicy::Everything,
        ] {
            assert_eq!(policy.as_str().parse::<MissingValuePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_policy_rejects_unknown_value() {
        let err = "pairwise".parse::<MissingValuePolicy>().unwrap_err();
        assert!(matches!(err, PruneError::InvalidParameter(_)));
        assert!(format!("{}", err).contains("pairwise"));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("variance".parse::<NzvStrategy>().unwrap(), NzvStrategy::Variance);
        assert_eq!("ratio".parse::<NzvStrategy>().unwrap(), NzvStrategy::Ratio);
        assert!(matches!(
            "entropy".parse::<NzvStrategy>(),
            Err(PruneError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(MissingValuePolicy::default(), MissingValuePolicy::CompleteObs);
        assert_eq!(NzvStrategy::default(), NzvStrategy::Variance);
    }
}
