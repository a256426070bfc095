//! Canonical column layout of the transaction dataset
//!
//! Single source of truth for the column order used by every conversion,
//! plus the schema/cast helpers shared by the Parquet and CSV paths.

use crate::error::{ParquetError, ParquetResult};
use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Transaction columns in output order
pub const TRANSACTION_COLUMNS: [&str; 13] = [
    "id_transaction",
    "date_transaction",
    "prix",
    "departement",
    "id_ville",
    "ville",
    "code_postal",
    "adresse",
    "type_batiment",
    "n_pieces",
    "surface_habitable",
    "latitude",
    "longitude",
];

/// Column holding the transaction timestamp
pub const DATE_COLUMN: &str = "date_transaction";

/// The canonical column list as owned strings
pub fn default_columns() -> Vec<String> {
    TRANSACTION_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Resolve column names to indices in `schema`, keeping the given order.
pub fn projection_indices<S: AsRef<str>>(schema: &Schema, columns: &[S]) -> ParquetResult<Vec<usize>> {
    columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            schema
                .index_of(name)
                .map_err(|_| ParquetError::MissingColumn {
                    column: name.to_string(),
                })
        })
        .collect()
}

/// Same schema with every nanosecond timestamp field at microsecond resolution.
pub fn micros_schema(schema: &Schema) -> Schema {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| match f.data_type() {
            DataType::Timestamp(TimeUnit::Nanosecond, tz) => f
                .as_ref()
                .clone()
                .with_data_type(DataType::Timestamp(TimeUnit::Microsecond, tz.clone())),
            _ => f.as_ref().clone(),
        })
        .collect();
    Schema::new_with_metadata(fields, schema.metadata().clone())
}

/// Microsecond timestamp type for a date column, or an error for types that
/// cannot carry a point in time.
///
/// `Int64` is read as a raw count of nanoseconds since the epoch.
pub fn micros_type_for(column: &str, data_type: &DataType) -> ParquetResult<DataType> {
    match data_type {
        DataType::Int64 => Ok(DataType::Timestamp(TimeUnit::Microsecond, None)),
        DataType::Timestamp(_, tz) => Ok(DataType::Timestamp(TimeUnit::Microsecond, tz.clone())),
        other => Err(ParquetError::UnexpectedType {
            column: column.to_string(),
            data_type: other.to_string(),
        }),
    }
}

/// Convert a date column to microsecond timestamps.
///
/// Raw `Int64` values are nanoseconds; they go through
/// `Timestamp(Nanosecond)` so the scale is divided rather than reinterpreted.
pub fn to_micros(array: &ArrayRef) -> Result<ArrayRef, ArrowError> {
    match array.data_type() {
        DataType::Int64 => {
            let nanos = cast(array, &DataType::Timestamp(TimeUnit::Nanosecond, None))?;
            cast(&nanos, &DataType::Timestamp(TimeUnit::Microsecond, None))
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => Ok(array.clone()),
        DataType::Timestamp(_, tz) => {
            cast(array, &DataType::Timestamp(TimeUnit::Microsecond, tz.clone()))
        }
        other => Err(ArrowError::CastError(format!(
            "cannot convert {} to a microsecond timestamp",
            other
        ))),
    }
}

/// Cast every column of `batch` whose type differs from `target`.
pub fn cast_to_schema(batch: &RecordBatch, target: &SchemaRef) -> Result<RecordBatch, ArrowError> {
    let columns = batch
        .columns()
        .iter()
        .zip(target.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                cast(column, field.data_type())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new(Arc::clone(target), columns)
}
