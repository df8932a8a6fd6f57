//! ## Frame Adapter
//!
//! Selectors never talk to DataFusion directly; they go through [`FrameExt`], an extension trait
//! on [`DataFrame`] that exposes the handful of frame operations feature selection needs:
//!
//! - column names and projection by name ([`FrameExt::restrict`]),
//! - row count and per-column missing-value counts (pushed down as aggregate queries),
//! - per-column value frequencies (pushed down as a grouped count),
//! - materialization into a [`DenseFrame`] for variances and correlations, which need row-aligned
//!   missing-value handling and are computed in-process by [`crate::stats`].
//!
//! Projections are lazy: they only extend the logical plan. Everything else runs a query.
//!
//! A value is missing when it is null or, in a floating-point column, `NaN`.

use crate::exceptions::{PruneError, PruneResult};
use crate::settings::MissingValuePolicy;
use crate::stats::{self, Column};
use async_trait::async_trait;
use datafusion::arrow::array::{as_primitive_array, Array};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Float64Type, Int64Type};
use datafusion::dataframe::DataFrame;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::scalar::ScalarValue;
use datafusion_expr::{ident, lit, when, Expr};
use datafusion_functions::math;
use ndarray::Array2;
use tracing::debug;

/// Columns of a frame materialized in memory as `f64`, `None` marking a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseFrame {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DenseFrame {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Row-major `nrows x ncols` array with `NaN` in place of missing values.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.nrows(), self.columns.len()), |(row, col)| {
            self.columns[col][row].unwrap_or(f64::NAN)
        })
    }

    pub fn variances(&self, policy: MissingValuePolicy, na_rm: bool) -> PruneResult<Vec<f64>> {
        stats::variances(&self.columns, policy, na_rm)
    }

    pub fn correlation_matrix(
        &self,
        policy: MissingValuePolicy,
        na_rm: bool,
    ) -> PruneResult<Array2<f64>> {
        stats::correlation_matrix(&self.columns, policy, na_rm)
    }
}

fn is_float(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Float32 | DataType::Float64)
}

/// The column with `NaN`s replaced by nulls.
fn nan_as_null(name: &str, data_type: &DataType) -> PruneResult<Expr> {
    let column = ident(name);
    if !is_float(data_type) {
        return Ok(column);
    }
    Ok(when(math::isnan().call(vec![column.clone()]), lit(ScalarValue::Null)).otherwise(column)?)
}

/// Reads the single value of a one-row aggregate column as a count.
fn scalar_count(array: &dyn Array, what: &str) -> PruneResult<usize> {
    match ScalarValue::try_from_array(array, 0)? {
        ScalarValue::Int64(Some(v)) => Ok(v.max(0) as usize),
        other => Err(PruneError::DataFusionError(
            datafusion::error::DataFusionError::Plan(format!(
                "Failed to compute {}: unexpected value {:?}",
                what, other
            )),
        )),
    }
}

/// Frame operations used by the selectors.
#[async_trait]
pub trait FrameExt {
    /// Column names in frame order.
    fn column_names(&self) -> Vec<String>;

    /// Projects the frame to `columns`, in the given order.
    fn restrict(&self, columns: &[String]) -> PruneResult<DataFrame>;

    async fn row_count(&self) -> PruneResult<usize>;

    /// Missing-value (null or `NaN`) count per column, in frame order.
    async fn missing_counts(&self) -> PruneResult<Vec<usize>>;

    /// Missing values over the whole frame.
    async fn total_missing(&self) -> PruneResult<usize>;

    /// Collects every column as `f64`, `NaN` read as missing. Fails on non-numeric columns.
    async fn materialize(&self) -> PruneResult<DenseFrame>;

    /// Per-column sample variance.
    async fn variances(
        &self,
        policy: MissingValuePolicy,
        na_rm: bool,
    ) -> PruneResult<Vec<f64>>;

    /// Pearson correlation matrix over all columns.
    async fn correlation_matrix(
        &self,
        policy: MissingValuePolicy,
        na_rm: bool,
    ) -> PruneResult<Array2<f64>>;

    /// Frequencies of the distinct non-missing values of `column`, in no particular order.
    async fn value_frequencies(&self, column: &str) -> PruneResult<Vec<u64>>;
}

#[async_trait]
impl FrameExt for DataFrame {
    fn column_names(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    fn restrict(&self, columns: &[String]) -> PruneResult<DataFrame> {
        if columns.is_empty() {
            return Err(PruneError::InvalidParameter(
                "Cannot restrict a DataFrame to zero columns.".to_string(),
            ));
        }
        let schema = self.schema();
        for name in columns {
            if schema.field_with_name(None, name).is_err() {
                return Err(PruneError::MissingColumn(format!(
                    "Column '{}' not found in DataFrame",
                    name
                )));
            }
        }
        let exprs: Vec<Expr> = columns.iter().map(|name| ident(name.as_str())).collect();
        self.clone().select(exprs).map_err(PruneError::from)
    }

    async fn row_count(&self) -> PruneResult<usize> {
        self.clone().count().await.map_err(PruneError::from)
    }

    async fn missing_counts(&self) -> PruneResult<Vec<usize>> {
        let names = self.column_names();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.row_count().await?;
        let mut aggregates: Vec<Expr> = Vec::with_capacity(names.len());
        for field in self.schema().fields() {
            let present = nan_as_null(field.name(), field.data_type())?;
            aggregates.push(count(present).alias(field.name()));
        }
        let batches = self.clone().aggregate(vec![], aggregates)?.collect().await?;
        let batch = batches.first().ok_or_else(|| {
            PruneError::DataFusionError(datafusion::error::DataFusionError::Plan(
                "No data found".to_string(),
            ))
        })?;

        let mut missing = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let present = scalar_count(batch.column(i).as_ref(), &format!("count of {}", name))?;
            missing.push(rows.saturating_sub(present));
        }
        Ok(missing)
    }

    async fn total_missing(&self) -> PruneResult<usize> {
        Ok(self.missing_counts().await?.iter().sum())
    }

    async fn materialize(&self) -> PruneResult<DenseFrame> {
        let names = self.column_names();
        for field in self.schema().fields() {
            if !field.data_type().is_numeric() {
                return Err(PruneError::InvalidParameter(format!(
                    "Column '{}' is not numeric ({})",
                    field.name(),
                    field.data_type()
                )));
            }
        }

        let batches = self.clone().collect().await?;
        let mut columns: Vec<Column> = vec![Vec::new(); names.len()];
        for batch in &batches {
            for (i, column) in columns.iter_mut().enumerate() {
                let values = cast(batch.column(i).as_ref(), &DataType::Float64)?;
                column.extend(
                    as_primitive_array::<Float64Type>(&values)
                        .iter()
                        .map(|v| v.filter(|x| !x.is_nan())),
                );
            }
        }
        debug!(
            columns = names.len(),
            rows = columns.first().map_or(0, Vec::len),
            "materialized frame"
        );
        Ok(DenseFrame { names, columns })
    }

    async fn variances(
        &self,
        policy: MissingValuePolicy,
        na_rm: bool,
    ) -> PruneResult<Vec<f64>> {
        self.materialize().await?.variances(policy, na_rm)
    }

    async fn correlation_matrix(
        &self,
        policy: MissingValuePolicy,
        na_rm: bool,
    ) -> PruneResult<Array2<f64>> {
        self.materialize().await?.correlation_matrix(policy, na_rm)
    }

    async fn value_frequencies(&self, column: &str) -> PruneResult<Vec<u64>> {
        let restricted = self.restrict(&[column.to_string()])?;
        let data_type = restricted.schema().field(0).data_type().clone();
        let grouped = restricted
            .select(vec![nan_as_null(column, &data_type)?.alias(column)])?
            .filter(ident(column).is_not_null())?
            .aggregate(
                vec![ident(column)],
                vec![count(ident(column)).alias("__frequency")],
            )?;
        let batches = grouped.collect().await?;

        let mut frequencies = Vec::new();
        for batch in &batches {
            let counts = as_primitive_array::<Int64Type>(batch.column(1));
            frequencies.extend(counts.iter().flatten().map(|v| v.max(0) as u64));
        }
        Ok(frequencies)
    }
}
