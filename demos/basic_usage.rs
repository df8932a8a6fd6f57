// Run `cargo run --example basic_usage` to execute this example.
// Set DEBUG_FEATURE_PRUNE=1 to see the selectors' log output.

use async_trait::async_trait;
use datafusion::prelude::DataFrame;
use feature_prune::exceptions::{PruneError, PruneResult};
use feature_prune::frame::FrameExt;
use feature_prune::make_pipeline;
use feature_prune::params::{FitParams, ParamBag};
use feature_prune::pipeline::{Estimator, Predictor};
use feature_prune::transformers::feature_selection::{
    MulticollinearityFilterer, NearZeroVarianceFilterer, SparseFeatureDropper,
};
use std::error::Error;
mod shared;

/// Predicts the label mean, scaled by an optional `shrink` fit parameter.
#[derive(Default)]
struct MeanModel {
    mean: Option<f64>,
}

#[async_trait]
impl Estimator for MeanModel {
    async fn train(
        &mut self,
        training_frame: DataFrame,
        x: &[String],
        y: &str,
        params: &ParamBag,
    ) -> PruneResult<()> {
        let shrink = match params.get("shrink") {
            Some(feature_prune::params::ParamValue::Float(v)) => *v,
            _ => 1.0,
        };
        let label = training_frame.restrict(&[y.to_string()])?.materialize().await?;
        let values: Vec<f64> = label.columns()[0].iter().flatten().copied().collect();
        if values.is_empty() {
            return Err(PruneError::Estimator("no labelled rows".to_string()));
        }
        println!("Training on {:?} to predict '{}'", x, y);
        self.mean = Some(shrink * values.iter().sum::<f64>() / values.len() as f64);
        Ok(())
    }
}

#[async_trait]
impl Predictor for MeanModel {
    type Output = Vec<f64>;

    async fn predict(&self, frame: DataFrame) -> PruneResult<Vec<f64>> {
        let mean = self.mean.ok_or(PruneError::FitNotCalled)?;
        Ok(vec![mean; frame.row_count().await?])
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let path = format!("{}/{}", shared::DATA_DIR, "sample.csv");
    let input_df = shared::load_data(&path).await?;
    input_df.clone().limit(0, Some(5))?.show().await?;

    let features: Vec<String> = ["a", "b", "c", "sparse", "constant"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut pipeline = make_pipeline!(
        features,
        "y",
        [
            ("sparse", SparseFeatureDropper::new(0.5)),
            ("nzv", NearZeroVarianceFilterer::default()),
            ("collinear", MulticollinearityFilterer::new(0.85)),
        ],
        ("model", MeanModel::default())
    )?;

    let params = FitParams::from_flat([("model__shrink", 0.9)])?;
    pipeline.fit_with_params(&input_df, &params).await?;

    for name in ["sparse", "nzv", "collinear"] {
        if let Some(selector) = pipeline.named_selector(name) {
            println!("{}: dropped {:?}", name, selector.drop_columns().unwrap_or_default());
        }
    }
    if let Some(filterer) = pipeline
        .named_selector("collinear")
        .and_then(|s| s.as_any().downcast_ref::<MulticollinearityFilterer>())
    {
        for record in filterer.correlations().unwrap_or_default() {
            println!(
                "{} ~ {}: |r| = {:.3}, dropped {} (MAC {:.3})",
                record.feature_x, record.feature_y, record.abs_correlation, record.dropped, record.mac
            );
        }
    }
    println!("Training columns: {:?}", pipeline.training_cols());

    let predictions = pipeline.predict(&input_df).await?;
    println!("First predictions: {:?}", &predictions[..predictions.len().min(3)]);

    Ok(())
}
