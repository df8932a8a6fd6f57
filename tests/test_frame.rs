use std::sync::Arc;

use approx::assert_abs_diff_eq;
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::*;
use feature_prune::exceptions::{PruneError, PruneResult};
use feature_prune::frame::FrameExt;
use feature_prune::settings::MissingValuePolicy;

/// Columns:
/// - "x": 1..=5 with a null in row 1 and a NaN in row 3,
/// - "n": integers, twice "x" where "x" is present,
/// - "s": strings.
async fn create_mixed_df() -> DataFrame {
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Float64, true),
        Field::new("n", DataType::Int64, true),
        Field::new("s", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(vec![
                Some(1.0),
                None,
                Some(3.0),
                Some(f64::NAN),
                Some(5.0),
            ])) as ArrayRef,
            Arc::new(Int64Array::from(vec![2, 4, 6, 8, 10])) as ArrayRef,
            Arc::new(StringArray::from(vec!["p", "q", "p", "q", "p"])) as ArrayRef,
        ],
    )
    .unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

#[tokio::test]
async fn test_missing_counts_include_nan() -> PruneResult<()> {
    let df = create_mixed_df().await;
    assert_eq!(df.row_count().await?, 5);
    assert_eq!(df.missing_counts().await?, vec![2, 0, 0]);
    assert_eq!(df.total_missing().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_restrict() -> PruneResult<()> {
    let df = create_mixed_df().await;
    let restricted = df.restrict(&["n".to_string(), "x".to_string()])?;
    assert_eq!(restricted.column_names(), vec!["n", "x"]);

    assert!(matches!(
        df.restrict(&["missing".to_string()]),
        Err(PruneError::MissingColumn(_))
    ));
    assert!(matches!(
        df.restrict(&[]),
        Err(PruneError::InvalidParameter(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_materialize_reads_nan_as_missing() -> PruneResult<()> {
    let df = create_mixed_df().await;
    let dense = df
        .restrict(&["x".to_string(), "n".to_string()])?
        .materialize()
        .await?;
    assert_eq!(dense.names(), ["x", "n"]);
    assert_eq!(dense.nrows(), 5);
    assert_eq!(
        dense.columns()[0],
        vec![Some(1.0), None, Some(3.0), None, Some(5.0)]
    );
    assert_eq!(
        dense.columns()[1],
        vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0), Some(10.0)]
    );

    let array = dense.to_array();
    assert_eq!(array.dim(), (5, 2));
    assert_eq!(array[[2, 0]], 3.0);
    assert!(array[[1, 0]].is_nan());
    assert!(array[[3, 0]].is_nan());
    assert_eq!(array[[4, 1]], 10.0);
    Ok(())
}

#[tokio::test]
async fn test_materialize_rejects_non_numeric() {
    let df = create_mixed_df().await;
    assert!(matches!(
        df.materialize().await,
        Err(PruneError::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn test_correlation_matrix_and_variances() -> PruneResult<()> {
    let df = create_mixed_df()
        .await
        .restrict(&["x".to_string(), "n".to_string()])?;

    // complete.obs keeps rows 0, 2 and 4, where n == 2 * x.
    let matrix = df
        .correlation_matrix(MissingValuePolicy::CompleteObs, false)
        .await?;
    assert_eq!(matrix.dim(), (2, 2));
    assert_abs_diff_eq!(matrix[[0, 0]], 1.0);
    assert_abs_diff_eq!(matrix[[0, 1]], 1.0, epsilon = 1e-12);
    assert_eq!(matrix[[0, 1]], matrix[[1, 0]]);

    let everything = df
        .correlation_matrix(MissingValuePolicy::Everything, false)
        .await?;
    assert!(everything[[0, 1]].is_nan());

    let variances = df.variances(MissingValuePolicy::CompleteObs, false).await?;
    assert_abs_diff_eq!(variances[0], 4.0, epsilon = 1e-12);
    assert_abs_diff_eq!(variances[1], 16.0, epsilon = 1e-12);
    Ok(())
}

#[tokio::test]
async fn test_value_frequencies() -> PruneResult<()> {
    let df = create_mixed_df().await;

    let mut strings = df.value_frequencies("s").await?;
    strings.sort_unstable();
    assert_eq!(strings, vec![2, 3]);

    // Null and NaN are both left out.
    let mut floats = df.value_frequencies("x").await?;
    floats.sort_unstable();
    assert_eq!(floats, vec![1, 1, 1]);
    Ok(())
}
