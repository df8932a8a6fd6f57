//! # Feature Prune
//!
//! Feature-selection pipelines over [Apache DataFusion](https://datafusion.apache.org) frames.
//!
//! A [`pipeline::Pipeline`] chains feature selectors, each of which learns a list of columns to
//! drop at fit time and replays it on later frames, and finishes with an estimator that is trained
//! on the surviving columns.
//!
//! - [`transformers::feature_selection`]: the selectors (`FeatureDropper`, `SparseFeatureDropper`,
//!   `MulticollinearityFilterer`, `NearZeroVarianceFilterer`).
//! - [`pipeline`]: the `FeatureSelector`, `Estimator` and `Predictor` traits and the `Pipeline`.
//! - [`frame`]: the frame operations the selectors rely on, as an extension trait on `DataFrame`.
//! - [`stats`]: the numeric kernels (variance, correlation, greedy collinearity elimination).
//! - [`params`]: per-step fit parameters.
//! - [`settings`]: option enums and defaults.
//! - [`exceptions`]: the error type.

pub mod exceptions;
pub mod frame;
pub mod logging;
pub mod params;
pub mod pipeline;
pub mod settings;
pub mod stats;
pub mod transformers;
