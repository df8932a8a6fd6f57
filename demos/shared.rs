use datafusion::dataframe::DataFrame;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use std::path::Path;

// Path to the directory containing the demo datasets
pub const DATA_DIR: &str = "demos/data";

/// Loads a CSV or Parquet file into a DataFrame, picking the reader from the extension.
pub async fn load_data(path: &str) -> Result<DataFrame, datafusion::error::DataFusionError> {
    let ctx = SessionContext::new();
    let extension = Path::new(path).extension().and_then(|ext| ext.to_str());

    match extension {
        Some("csv") => ctx.read_csv(path, CsvReadOptions::new()).await,
        Some("parquet") => ctx.read_parquet(path, Default::default()).await,
        _ => Err(datafusion::error::DataFusionError::Execution(
            "Unsupported file format. Please provide a CSV or Parquet file.".to_string(),
        )),
    }
}
