//! ## Custom Errors for Feature Prune
//!
//! This module defines the error type shared by every selector and by the pipeline.
//! It uses the `thiserror` crate to derive the `Error` trait. The [`PruneError`] enum covers
//! configuration errors (raised before any data is touched), not-fitted errors, data errors,
//! and failures reported by the underlying DataFusion/Arrow engine or by the final estimator.
//!
//! The [`PruneResult`] type alias is the result type returned throughout the library.
//!
//! ### Example
//!
//! ```rust
//! use feature_prune::exceptions::{PruneError, PruneResult};
//!
//! fn check_threshold(threshold: f64) -> PruneResult<()> {
//!     if !(0.0..1.0).contains(&threshold) {
//!         return Err(PruneError::InvalidParameter(format!("bad threshold {}", threshold)));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Errors specific to the Feature Prune library.
#[derive(Debug, Error)]
pub enum PruneError {
    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// A selector or pipeline argument is out of its domain (threshold, policy, strategy, names).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The pipeline steps do not form a valid chain.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Indicates that the specified column does not exist in the DataFrame.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates transform (or predict) was called before fit.
    #[error("Transform called before fit")]
    FitNotCalled,

    /// The frame cannot support the requested statistic (no rows, NAs under `all.obs`, ...).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Every feature column was removed before reaching the estimator.
    #[error("No columns retained after fit")]
    NoTrainingColumns,

    /// Failure reported by the final estimator.
    #[error("Estimator error: {0}")]
    Estimator(String),

    /// An error raised while running a named pipeline step.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<PruneError>,
    },
}

impl PruneError {
    /// Wraps an error with the name of the pipeline step that produced it.
    pub fn in_step(step: &str, source: PruneError) -> Self {
        PruneError::StepFailed {
            step: step.to_string(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through any [`PruneError::StepFailed`] wrappers.
    pub fn root_cause(&self) -> &PruneError {
        match self {
            PruneError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient result type for Feature Prune operations.
pub type PruneResult<T> = std::result::Result<T, PruneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datafusion_error() {
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: PruneError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
    }

    #[test]
    fn test_arrow_error() {
        let arrow_err = arrow::error::ArrowError::ComputeError("test compute error".into());
        let err: PruneError = arrow_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Arrow error:"));
        assert!(err_msg.contains("test compute error"));
    }

    #[test]
    fn test_invalid_parameter_error() {
        let err = PruneError::InvalidParameter("bad param".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Invalid parameter:"));
        assert!(err_msg.contains("bad param"));
    }

    #[test]
    fn test_invalid_pipeline_error() {
        let err = PruneError::InvalidPipeline("duplicate step names".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Invalid pipeline:"));
        assert!(err_msg.contains("duplicate step names"));
    }

    #[test]
    fn test_missing_column_error() {
        let err = PruneError::MissingColumn("missing column".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Missing column:"));
        assert!(err_msg.contains("missing column"));
    }

    #[test]
    fn test_fit_not_called_error() {
        let err = PruneError::FitNotCalled;
        assert_eq!(format!("{}", err), "Transform called before fit");
    }

    #[test]
    fn test_insufficient_data_error() {
        let err = PruneError::InsufficientData("DataFrame is empty".into());
        assert!(format!("{}", err).contains("Insufficient data: DataFrame is empty"));
    }

    #[test]
    fn test_no_training_columns_error() {
        let err = PruneError::NoTrainingColumns;
        assert!(format!("{}", err).contains("No columns retained"));
    }

    #[test]
    fn test_step_failed_wraps_and_unwraps() {
        let err = PruneError::in_step("sparse", PruneError::FitNotCalled);
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Step 'sparse' failed"));
        assert!(err_msg.contains("Transform called before fit"));
        assert!(matches!(err.root_cause(), PruneError::FitNotCalled));

        let nested = PruneError::in_step("outer", err);
        assert!(matches!(nested.root_cause(), PruneError::FitNotCalled));
    }
}
