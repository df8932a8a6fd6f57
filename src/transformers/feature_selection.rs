//! ## Feature Selection Transformers
//!
//! This module provides selectors that decide, once at fit time, which columns to remove, and
//! replay that decision on every later `transform`.
//!
//! ### Available Selectors
//!
//! - [`FeatureDropper`]: Removes a fixed list of columns.
//! - [`SparseFeatureDropper`]: Removes columns whose fraction of missing values exceeds a threshold.
//! - [`MulticollinearityFilterer`]: Removes one member of each highly correlated pair, keeping the
//!   member with the lower mean absolute correlation to the remaining columns.
//! - [`NearZeroVarianceFilterer`]: Removes (nearly) constant columns, by variance or by the
//!   dominance ratio of the most frequent value.
//!
//! ### Candidate columns
//!
//! Every selector considers `feature_names` (all columns when unset) minus `exclude_features`
//! minus the target column. The target column is never dropped by `transform` unless it is
//! named explicitly in a [`FeatureDropper`].
//!
//! Calling `transform` before `fit` returns [`PruneError::FitNotCalled`].

use crate::exceptions::{PruneError, PruneResult};
use crate::frame::FrameExt;
use crate::impl_feature_selector;
use crate::settings::{
    MissingValuePolicy, NaPolicyOverride, NzvStrategy, DEFAULT_CORRELATION_THRESHOLD,
    DEFAULT_SPARSITY_THRESHOLD, DEFAULT_VARIANCE_THRESHOLD,
};
use crate::stats::{filter_collinearity, frequency_ratio};
use crate::transformers::base::{apply_drop, resolve_missing_policy, SelectorConfig};
use datafusion::dataframe::DataFrame;
use std::collections::HashMap;
use tracing::{debug, info};

pub use crate::stats::CorrelationRecord;

/// Builder methods for the shared [`SelectorConfig`] of a selector type.
macro_rules! impl_selector_config {
    ($ty:ty) => {
        impl $ty {
            /// Restricts the columns this selector considers.
            pub fn with_feature_names<I, S>(mut self, names: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.config.feature_names = Some(names.into_iter().map(Into::into).collect());
                self
            }

            /// Sets the target column. A pipeline overrides this before fitting.
            pub fn with_target_feature(mut self, target: impl Into<String>) -> Self {
                self.config.target_feature = Some(target.into());
                self
            }

            /// Columns this selector never considers.
            pub fn with_exclude_features<I, S>(mut self, names: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.config.exclude_features = names.into_iter().map(Into::into).collect();
                self
            }

            pub fn config(&self) -> &SelectorConfig {
                &self.config
            }

            pub fn config_mut(&mut self) -> &mut SelectorConfig {
                &mut self.config
            }
        }
    };
}

/// Builder methods for the missing-value handling of the statistical selectors.
macro_rules! impl_missing_value_options {
    ($ty:ty) => {
        impl $ty {
            pub fn with_missing_policy(mut self, policy: MissingValuePolicy) -> Self {
                self.missing_policy = policy;
                self
            }

            /// Parses `"complete.obs"`, `"all.obs"` or `"everything"`.
            pub fn with_use(self, policy: &str) -> PruneResult<Self> {
                Ok(self.with_missing_policy(policy.parse()?))
            }

            pub fn with_na_warn(mut self, na_warn: bool) -> Self {
                self.na_warn = na_warn;
                self
            }

            pub fn with_na_rm(mut self, na_rm: bool) -> Self {
                self.na_rm = na_rm;
                self
            }
        }
    };
}

/// Removes the columns named in `feature_names`, without looking at the data.
///
/// Useful when only a few columns have to go: later selectors can then leave
/// `feature_names` unset.
#[derive(Debug, Clone, Default)]
pub struct FeatureDropper {
    pub config: SelectorConfig,
    drop: Option<Vec<String>>,
}

impl FeatureDropper {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_feature_names(features)
    }

    pub async fn fit(&mut self, _df: &DataFrame) -> PruneResult<()> {
        self.drop = None;
        let features = self.config.feature_names.clone().unwrap_or_default();
        if features.iter().any(String::is_empty) {
            return Err(PruneError::InvalidParameter(
                "feature_names must not contain empty column names".to_string(),
            ));
        }
        debug!(drop = ?features, "FeatureDropper fitted");
        self.drop = Some(features);
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
        apply_drop(df, self.drop_columns(), "FeatureDropper")
    }

    /// Columns removed by `transform`; `None` before `fit`.
    pub fn drop_columns(&self) -> Option<&[String]> {
        self.drop.as_deref()
    }
}

#[derive(Debug, Clone)]
struct SparsityFit {
    drop: Vec<String>,
    sparsity: Vec<f64>,
}

/// Removes columns whose fraction of missing values is strictly greater than `threshold`.
#[derive(Debug, Clone)]
pub struct SparseFeatureDropper {
    pub config: SelectorConfig,
    /// Must lie in `[0.0, 1.0)`.
    pub threshold: f64,
    fitted: Option<SparsityFit>,
}

impl Default for SparseFeatureDropper {
    fn default() -> Self {
        Self::new(DEFAULT_SPARSITY_THRESHOLD)
    }
}

impl SparseFeatureDropper {
    pub fn new(threshold: f64) -> Self {
        Self {
            config: SelectorConfig::default(),
            threshold,
            fitted: None,
        }
    }

    pub async fn fit(&mut self, df: &DataFrame) -> PruneResult<()> {
        self.fitted = None;
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(PruneError::InvalidParameter(format!(
                "threshold must be a float between 0 (inclusive) and 1. Got {}",
                self.threshold
            )));
        }

        let Some(frame) = self.config.candidate_frame(df)? else {
            self.fitted = Some(SparsityFit {
                drop: Vec::new(),
                sparsity: Vec::new(),
            });
            return Ok(());
        };

        let rows = frame.row_count().await?;
        if rows == 0 {
            return Err(PruneError::InsufficientData("DataFrame is empty.".to_string()));
        }
        let sparsity: Vec<f64> = frame
            .missing_counts()
            .await?
            .into_iter()
            .map(|missing| missing as f64 / rows as f64)
            .collect();
        let drop: Vec<String> = frame
            .column_names()
            .into_iter()
            .zip(sparsity.iter())
            .filter(|(_, s)| **s > self.threshold)
            .map(|(name, _)| name)
            .collect();

        debug!(threshold = self.threshold, drop = ?drop, "SparseFeatureDropper fitted");
        self.fitted = Some(SparsityFit { drop, sparsity });
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
        apply_drop(df, self.drop_columns(), "SparseFeatureDropper")
    }

    pub fn drop_columns(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.drop.as_slice())
    }

    /// Missing fraction of every candidate column (not only the dropped ones), in frame order.
    pub fn sparsity(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.sparsity.as_slice())
    }
}

#[derive(Debug, Clone, Default)]
struct CollinearityFit {
    drop: Vec<String>,
    mean_abs_correlations: Vec<f64>,
    correlations: Vec<CorrelationRecord>,
    na_override: Option<NaPolicyOverride>,
}

/// Removes features with an absolute correlation greater than `threshold`.
///
/// For each correlated pair the member with the higher mean absolute correlation (MAC) to the
/// other remaining candidates is dropped, so the less redundant one survives. On equal MACs the
/// later column (in frame order) is dropped. See [`crate::stats::filter_collinearity`].
#[derive(Debug, Clone)]
pub struct MulticollinearityFilterer {
    pub config: SelectorConfig,
    pub threshold: f64,
    /// Fall back to `complete.obs` (with a warning) when missing values are present.
    pub na_warn: bool,
    /// Compute each correlation on the rows where both columns are present.
    pub na_rm: bool,
    pub missing_policy: MissingValuePolicy,
    fitted: Option<CollinearityFit>,
}

impl Default for MulticollinearityFilterer {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_THRESHOLD)
    }
}

impl MulticollinearityFilterer {
    pub fn new(threshold: f64) -> Self {
        Self {
            config: SelectorConfig::default(),
            threshold,
            na_warn: true,
            na_rm: false,
            missing_policy: MissingValuePolicy::default(),
            fitted: None,
        }
    }

    pub async fn fit(&mut self, df: &DataFrame) -> PruneResult<()> {
        self.fitted = None;
        if !self.threshold.is_finite() {
            return Err(PruneError::InvalidParameter(format!(
                "threshold must be a finite number. Got {}",
                self.threshold
            )));
        }

        let Some(frame) = self.config.candidate_frame(df)? else {
            self.fitted = Some(CollinearityFit::default());
            return Ok(());
        };

        let (policy, na_override) =
            resolve_missing_policy(&frame, self.missing_policy, self.na_warn).await?;
        let dense = frame.materialize().await?;
        let matrix = dense.correlation_matrix(policy, self.na_rm)?.mapv(f64::abs);
        let correlations = filter_collinearity(&matrix, dense.names(), self.threshold)?;

        let drop: Vec<String> = correlations.iter().map(|r| r.dropped.clone()).collect();
        let mean_abs_correlations = correlations.iter().map(|r| r.mac).collect();
        info!(
            threshold = self.threshold,
            candidates = dense.names().len(),
            dropped = drop.len(),
            "MulticollinearityFilterer fitted"
        );
        for record in &correlations {
            debug!(
                x = %record.feature_x,
                y = %record.feature_y,
                correlation = record.abs_correlation,
                dropped = %record.dropped,
                mac = record.mac,
                "dropped collinear feature"
            );
        }

        self.fitted = Some(CollinearityFit {
            drop,
            mean_abs_correlations,
            correlations,
            na_override,
        });
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
        apply_drop(df, self.drop_columns(), "MulticollinearityFilterer")
    }

    pub fn drop_columns(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.drop.as_slice())
    }

    /// MAC of each dropped column at the time it was dropped, aligned with `drop_columns`.
    pub fn mean_abs_correlations(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.mean_abs_correlations.as_slice())
    }

    /// The elimination steps, in drop order.
    pub fn correlations(&self) -> Option<&[CorrelationRecord]> {
        self.fitted.as_ref().map(|f| f.correlations.as_slice())
    }

    /// Set when the last fit replaced the requested missing-value policy.
    pub fn na_override(&self) -> Option<NaPolicyOverride> {
        self.fitted.as_ref().and_then(|f| f.na_override)
    }
}

#[derive(Debug, Clone, Default)]
struct NzvFit {
    drop: Vec<String>,
    var: HashMap<String, f64>,
    na_override: Option<NaPolicyOverride>,
}

/// Removes features that are (nearly) constant.
///
/// - [`NzvStrategy::Variance`]: drops columns whose sample variance is below `threshold`.
/// - [`NzvStrategy::Ratio`]: drops columns where the most frequent value appears more than
///   `threshold` times as often as the second most frequent one (Kuhn & Johnson, *Applied
///   Predictive Modeling*). A column with a single distinct value is always dropped. `threshold`
///   must be greater than 1.
#[derive(Debug, Clone)]
pub struct NearZeroVarianceFilterer {
    pub config: SelectorConfig,
    pub threshold: f64,
    pub na_warn: bool,
    pub na_rm: bool,
    pub missing_policy: MissingValuePolicy,
    pub strategy: NzvStrategy,
    fitted: Option<NzvFit>,
}

impl Default for NearZeroVarianceFilterer {
    fn default() -> Self {
        Self::new(DEFAULT_VARIANCE_THRESHOLD)
    }
}

impl NearZeroVarianceFilterer {
    /// A variance-strategy filterer.
    pub fn new(threshold: f64) -> Self {
        Self {
            config: SelectorConfig::default(),
            threshold,
            na_warn: true,
            na_rm: false,
            missing_policy: MissingValuePolicy::default(),
            strategy: NzvStrategy::Variance,
            fitted: None,
        }
    }

    /// A ratio-strategy filterer.
    pub fn ratio(threshold: f64) -> Self {
        Self::new(threshold).with_strategy(NzvStrategy::Ratio)
    }

    pub fn with_strategy(mut self, strategy: NzvStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn validate_threshold(&self) -> PruneResult<()> {
        if self.threshold.is_nan() {
            return Err(PruneError::InvalidParameter(
                "threshold must be a number, got NaN".to_string(),
            ));
        }
        if self.strategy == NzvStrategy::Ratio && self.threshold <= 1.0 {
            return Err(PruneError::InvalidParameter(format!(
                "when strategy==\"ratio\", threshold must be greater than 1.0. Got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    pub async fn fit(&mut self, df: &DataFrame) -> PruneResult<()> {
        self.fitted = None;
        self.validate_threshold()?;

        let Some(frame) = self.config.candidate_frame(df)? else {
            self.fitted = Some(NzvFit::default());
            return Ok(());
        };

        let (policy, na_override) =
            resolve_missing_policy(&frame, self.missing_policy, self.na_warn).await?;
        let names = frame.column_names();
        let scores: Vec<f64> = match self.strategy {
            NzvStrategy::Variance => frame.variances(policy, self.na_rm).await?,
            NzvStrategy::Ratio => {
                let mut ratios = Vec::with_capacity(names.len());
                for name in &names {
                    ratios.push(frequency_ratio(&frame.value_frequencies(name).await?));
                }
                ratios
            }
        };

        let mut drop = Vec::new();
        let mut var = HashMap::new();
        for (name, score) in names.into_iter().zip(scores) {
            let near_zero = match self.strategy {
                NzvStrategy::Variance => score < self.threshold,
                NzvStrategy::Ratio => score > self.threshold,
            };
            if near_zero {
                var.insert(name.clone(), score);
                drop.push(name);
            }
        }

        info!(
            strategy = %self.strategy,
            threshold = self.threshold,
            drop = ?drop,
            "NearZeroVarianceFilterer fitted"
        );
        self.fitted = Some(NzvFit {
            drop,
            var,
            na_override,
        });
        Ok(())
    }

    pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
        apply_drop(df, self.drop_columns(), "NearZeroVarianceFilterer")
    }

    pub fn drop_columns(&self) -> Option<&[String]> {
        self.fitted.as_ref().map(|f| f.drop.as_slice())
    }

    /// Dropped columns mapped to their variance or frequency ratio, depending on the strategy.
    pub fn variances(&self) -> Option<&HashMap<String, f64>> {
        self.fitted.as_ref().map(|f| &f.var)
    }

    pub fn na_override(&self) -> Option<NaPolicyOverride> {
        self.fitted.as_ref().and_then(|f| f.na_override)
    }
}

impl_selector_config!(FeatureDropper);
impl_selector_config!(SparseFeatureDropper);
impl_selector_config!(MulticollinearityFilterer);
impl_selector_config!(NearZeroVarianceFilterer);

impl_missing_value_options!(MulticollinearityFilterer);
impl_missing_value_options!(NearZeroVarianceFilterer);

// Implement the FeatureSelector trait for all the above selectors.
impl_feature_selector!(FeatureDropper);
impl_feature_selector!(SparseFeatureDropper);
impl_feature_selector!(MulticollinearityFilterer);
impl_feature_selector!(NearZeroVarianceFilterer);
