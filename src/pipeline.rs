//! ## Feature Prune Pipeline
//!
//! This module chains feature selectors and a final estimator into a single fit/predict unit.
//!
//! ### Overview
//!
//! - The [`FeatureSelector`] trait is the contract every intermediate step implements: `fit`
//!   decides which columns to drop, `transform` replays that decision on any frame.
//! - The [`Estimator`] trait is the training operation of the final step. Estimators that also
//!   implement [`Predictor`] make [`Pipeline::predict`] available; for others the method does
//!   not exist.
//! - [`Pipeline`] validates the chain when it is built, restricts the input to the configured
//!   features and target, routes [`FitParams`] to their steps, injects the target column into
//!   every selector and records the columns that reach the estimator.
//! - Macros [`crate::impl_feature_selector`] and [`crate::make_pipeline`] simplify implementing
//!   selectors and assembling pipelines.

use crate::exceptions::{PruneError, PruneResult};
use crate::frame::FrameExt;
use crate::params::{FitParams, ParamBag};
use crate::transformers::base::{frame_from_x_y, SelectorConfig};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, info};

/// Trait for the intermediate steps of a pipeline.
///
/// `fit` computes the list of columns to drop; `transform` removes them from a frame (updating
/// its logical plan without triggering execution).
#[async_trait]
pub trait FeatureSelector: Send + Sync {
    /// Fit the selector on a DataFrame, replacing any previous fitted state.
    async fn fit(&mut self, df: &DataFrame) -> PruneResult<()>;

    /// Remove the fitted drop list from `df`.
    ///
    /// # Errors
    ///
    /// * [`PruneError::FitNotCalled`] - if `fit` has not succeeded yet.
    fn transform(&self, df: DataFrame) -> PruneResult<DataFrame>;

    /// `fit` followed by `transform` on the same frame.
    async fn fit_transform(&mut self, df: DataFrame) -> PruneResult<DataFrame> {
        self.fit(&df).await?;
        self.transform(df)
    }

    /// The columns `transform` removes, or `None` when unfitted.
    fn drop_columns(&self) -> Option<&[String]>;

    fn config(&self) -> &SelectorConfig;

    /// Sets the column excluded from consideration. Called by [`Pipeline`] before fitting.
    fn set_target_feature(&mut self, target: Option<String>);

    /// Allows downcasting to the concrete selector to read its statistics.
    fn as_any(&self) -> &dyn Any;
}

/// Macro to implement the [`FeatureSelector`] trait for a selector type.
///
/// The type must already have inherent methods:
/// - `async fn fit(&mut self, &DataFrame) -> PruneResult<()>`
/// - `fn transform(&self, DataFrame) -> PruneResult<DataFrame>`
/// - `fn drop_columns(&self) -> Option<&[String]>`
/// - `fn config(&self) -> &SelectorConfig` and `fn config_mut(&mut self) -> &mut SelectorConfig`
///
/// # Example
///
/// ```rust,no_run
/// use datafusion::prelude::DataFrame;
/// use feature_prune::exceptions::PruneResult;
/// use feature_prune::impl_feature_selector;
/// use feature_prune::transformers::base::{apply_drop, SelectorConfig};
///
/// pub struct DropNothing {
///     config: SelectorConfig,
///     drop: Option<Vec<String>>,
/// }
///
/// impl DropNothing {
///     pub async fn fit(&mut self, _df: &DataFrame) -> PruneResult<()> {
///         self.drop = Some(Vec::new());
///         Ok(())
///     }
///
///     pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
///         apply_drop(df, self.drop_columns(), "DropNothing")
///     }
///
///     pub fn drop_columns(&self) -> Option<&[String]> {
///         self.drop.as_deref()
///     }
///
///     pub fn config(&self) -> &SelectorConfig {
///         &self.config
///     }
///
///     pub fn config_mut(&mut self) -> &mut SelectorConfig {
///         &mut self.config
///     }
/// }
///
/// impl_feature_selector!(DropNothing);
/// ```
#[macro_export]
macro_rules! impl_feature_selector {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::FeatureSelector for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::PruneResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::PruneResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn drop_columns(&self) -> Option<&[String]> {
                <$ty>::drop_columns(self)
            }
            fn config(&self) -> &$crate::transformers::base::SelectorConfig {
                <$ty>::config(self)
            }
            fn set_target_feature(&mut self, target: Option<String>) {
                <$ty>::config_mut(self).target_feature = target;
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    };
}

/// The training operation of the final pipeline step.
#[async_trait]
pub trait Estimator: Send + Sync {
    /// Train on `training_frame` using columns `x` as features and `y` as the label.
    async fn train(
        &mut self,
        training_frame: DataFrame,
        x: &[String],
        y: &str,
        params: &ParamBag,
    ) -> PruneResult<()>;
}

/// Estimators that can also predict.
#[async_trait]
pub trait Predictor: Estimator {
    type Output: Send;

    async fn predict(&self, frame: DataFrame) -> PruneResult<Self::Output>;
}

/// A pipeline step as handed to [`Pipeline::new`].
pub enum Step<E> {
    Selector(Box<dyn FeatureSelector>),
    Estimator(E),
}

impl<E> Step<E> {
    /// Boxes a selector into a step.
    pub fn selector<S: FeatureSelector + 'static>(selector: S) -> Self {
        Step::Selector(Box::new(selector))
    }
}

/// A borrowed view of a pipeline step.
pub enum StepRef<'a, E> {
    Selector(&'a dyn FeatureSelector),
    Estimator(&'a E),
}

fn validate_feature_names(feature_names: &[String]) -> PruneResult<()> {
    if feature_names.is_empty() {
        return Err(PruneError::InvalidParameter(
            "invalid value for feature_names: at least one feature is required".to_string(),
        ));
    }
    if feature_names.iter().any(String::is_empty) {
        return Err(PruneError::InvalidParameter(
            "feature_names must be a list of non-empty column names".to_string(),
        ));
    }
    Ok(())
}

/// A pipeline of feature selectors finished by an estimator.
pub struct Pipeline<E> {
    selectors: Vec<(String, Box<dyn FeatureSelector>)>,
    estimator: (String, E),
    feature_names: Vec<String>,
    target_feature: Option<String>,
    training_cols: Option<Vec<String>>,
}

impl<E: Estimator> Pipeline<E> {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - `(name, step)` pairs; every step but the last must be a selector and the last
    ///   must be an estimator. Names must be unique.
    /// * `feature_names` - The columns the pipeline is fitted on.
    ///
    /// # Errors
    ///
    /// * [`PruneError::InvalidPipeline`] - if the steps do not form a valid chain.
    /// * [`PruneError::InvalidParameter`] - if `feature_names` is empty.
    pub fn new(steps: Vec<(String, Step<E>)>, feature_names: Vec<String>) -> PruneResult<Self> {
        validate_feature_names(&feature_names)?;

        let mut seen = HashSet::new();
        if let Some((name, _)) = steps.iter().find(|(name, _)| !seen.insert(name.as_str())) {
            let names: Vec<&str> = steps.iter().map(|(n, _)| n.as_str()).collect();
            return Err(PruneError::InvalidPipeline(format!(
                "Provided step names are not unique: '{}' in {:?}",
                name, names
            )));
        }

        let mut steps = steps;
        let (last_name, last) = steps.pop().ok_or_else(|| {
            PruneError::InvalidPipeline("Pipeline must have at least one step.".to_string())
        })?;
        let estimator = match last {
            Step::Estimator(estimator) => estimator,
            Step::Selector(_) => {
                return Err(PruneError::InvalidPipeline(format!(
                    "Last step of chain should be an estimator; '{}' is a feature selector",
                    last_name
                )))
            }
        };

        let mut selectors = Vec::with_capacity(steps.len());
        for (name, step) in steps {
            match step {
                Step::Selector(selector) => selectors.push((name, selector)),
                Step::Estimator(_) => {
                    return Err(PruneError::InvalidPipeline(format!(
                        "All intermediate steps of the chain should be feature selectors; '{}' is an estimator",
                        name
                    )))
                }
            }
        }

        Ok(Self {
            selectors,
            estimator: (last_name, estimator),
            feature_names,
            target_feature: None,
            training_cols: None,
        })
    }

    /// Sets the label column handed to the estimator and excluded by every selector.
    pub fn with_target_feature(mut self, target: impl Into<String>) -> Self {
        self.target_feature = Some(target.into());
        self
    }

    pub fn set_target_feature(&mut self, target: impl Into<String>) {
        self.target_feature = Some(target.into());
    }

    pub fn target_feature(&self) -> Option<&str> {
        self.target_feature.as_deref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Columns (target excluded) that reached the estimator in the last successful `fit`.
    pub fn training_cols(&self) -> Option<&[String]> {
        self.training_cols.as_deref()
    }

    /// Step names in pipeline order.
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.selectors
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(std::iter::once(self.estimator.0.as_str()))
    }

    /// Every step by name.
    pub fn named_steps(&self) -> HashMap<&str, StepRef<'_, E>> {
        let mut steps: HashMap<&str, StepRef<'_, E>> = self
            .selectors
            .iter()
            .map(|(name, s)| (name.as_str(), StepRef::Selector(s.as_ref())))
            .collect();
        steps.insert(
            self.estimator.0.as_str(),
            StepRef::Estimator(&self.estimator.1),
        );
        steps
    }

    pub fn named_selector(&self, name: &str) -> Option<&dyn FeatureSelector> {
        self.selectors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_ref())
    }

    pub fn final_estimator(&self) -> &E {
        &self.estimator.1
    }

    /// Fits the pipeline without fit parameters.
    pub async fn fit(&mut self, df: &DataFrame) -> PruneResult<()> {
        self.fit_with_params(df, &FitParams::new()).await
    }

    /// Fits every selector in order on the output of the previous one, then trains the estimator
    /// on the surviving columns.
    ///
    /// # Errors
    ///
    /// * [`PruneError::InvalidParameter`] - no target set, bad `params`, or parameters routed to a
    ///   selector.
    /// * [`PruneError::MissingColumn`] - a feature or the target is absent from `df`.
    /// * [`PruneError::NoTrainingColumns`] - the selectors removed every feature.
    /// * [`PruneError::StepFailed`] - a step failed; the source holds the step's own error.
    pub async fn fit_with_params(&mut self, df: &DataFrame, params: &FitParams) -> PruneResult<()> {
        self.training_cols = None;

        let target = self
            .target_feature
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PruneError::InvalidParameter(
                    "target_feature should be a single, non-empty column name".to_string(),
                )
            })?;
        validate_feature_names(&self.feature_names)?;
        params.validate_steps(self.step_names())?;

        if !df.column_names().contains(&target) {
            return Err(PruneError::MissingColumn(format!(
                "Target column '{}' not found in DataFrame",
                target
            )));
        }
        // Anything not named as a feature or the target stops here.
        let mut current = frame_from_x_y(
            df,
            Some(self.feature_names.as_slice()),
            Some(target.as_str()),
            &[],
            true,
        )?;

        for (name, selector) in self.selectors.iter_mut() {
            let bag = params.for_step(name);
            if !bag.is_empty() {
                let mut keys: Vec<&str> = bag.keys().map(String::as_str).collect();
                keys.sort_unstable();
                return Err(PruneError::in_step(
                    name,
                    PruneError::InvalidParameter(format!(
                        "feature selectors take no fit parameters, got: {}",
                        keys.join(", ")
                    )),
                ));
            }

            selector.set_target_feature(Some(target.clone()));
            let start = Instant::now();
            current = selector
                .fit_transform(current)
                .await
                .map_err(|e| PruneError::in_step(name, e))?;
            debug!(
                step = %name,
                dropped = ?selector.drop_columns().unwrap_or_default(),
                elapsed = ?start.elapsed(),
                "fitted selector"
            );
        }

        let remaining = current.column_names();
        if !remaining.contains(&target) {
            return Err(PruneError::MissingColumn(format!(
                "Target column '{}' was removed by a selector",
                target
            )));
        }
        let training_cols: Vec<String> = remaining.into_iter().filter(|c| c != &target).collect();
        if training_cols.is_empty() {
            return Err(PruneError::NoTrainingColumns);
        }
        info!(
            features = training_cols.len(),
            target = %target,
            "training final estimator"
        );
        self.training_cols = Some(training_cols.clone());

        let (name, estimator) = &mut self.estimator;
        let start = Instant::now();
        estimator
            .train(current, &training_cols, &target, &params.for_step(name))
            .await
            .map_err(|e| PruneError::in_step(name, e))?;
        debug!(step = %name, elapsed = ?start.elapsed(), "trained estimator");
        Ok(())
    }

    /// Applies every selector's `transform` (without fitting).
    pub fn transform(&self, df: DataFrame) -> PruneResult<DataFrame> {
        let mut current = df;
        for (name, selector) in self.selectors.iter() {
            current = selector
                .transform(current)
                .map_err(|e| PruneError::in_step(name, e))?;
        }
        Ok(current)
    }
}

impl<E: Predictor> Pipeline<E> {
    /// Applies the fitted selectors to `df` and predicts with the final estimator.
    pub async fn predict(&self, df: &DataFrame) -> PruneResult<E::Output> {
        let transformed = self.transform(df.clone())?;
        let (name, estimator) = &self.estimator;
        estimator
            .predict(transformed)
            .await
            .map_err(|e| PruneError::in_step(name, e))
    }
}

/// Macro to simplify pipeline creation by automatically boxing selectors.
///
/// Expands to a [`PruneResult`] of a [`Pipeline`] with the given features and target.
///
/// # Example
///
/// ```rust,no_run
/// use datafusion::prelude::DataFrame;
/// use feature_prune::exceptions::PruneResult;
/// use feature_prune::make_pipeline;
/// use feature_prune::params::ParamBag;
/// use feature_prune::pipeline::Estimator;
/// use feature_prune::transformers::feature_selection::{FeatureDropper, SparseFeatureDropper};
///
/// struct NoopModel;
///
/// #[async_trait::async_trait]
/// impl Estimator for NoopModel {
///     async fn train(&mut self, _: DataFrame, _: &[String], _: &str, _: &ParamBag) -> PruneResult<()> {
///         Ok(())
///     }
/// }
///
/// let pipeline = make_pipeline!(
///     vec!["a".to_string(), "b".to_string()],
///     "y",
///     [
///         ("drop", FeatureDropper::new(["a"])),
///         ("sparse", SparseFeatureDropper::new(0.5)),
///     ],
///     ("model", NoopModel)
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($features:expr, $target:expr, [$(($name:expr, $selector:expr)),* $(,)?], ($est_name:expr, $estimator:expr) $(,)?) => {
        {
            let steps = vec![
                $(
                    ($name.to_string(), $crate::pipeline::Step::selector($selector)),
                )*
                ($est_name.to_string(), $crate::pipeline::Step::Estimator($estimator)),
            ];
            $crate::pipeline::Pipeline::new(steps, $features).map(|p| p.with_target_feature($target))
        }
    };
}
