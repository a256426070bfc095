//! Column materialization
//!
//! Turns the named arrays of an NPZ archive into a row-aligned [`Table`]
//! of Arrow columns, ready to be handed to the Parquet writer.
//!
//! `uint8` arrays carry text: the whole buffer is a run of UTF-8 strings,
//! each closed by a `0x00` byte. Every other supported dtype is copied
//! into the matching Arrow array without coercion.

use crate::error::{MaterializeError, MaterializeResult};
use crate::npz::{ByteOrder, DtypeKind, NpyArray, NpzArchive};
use arrow::array::{
    Array, ArrayRef, BinaryBuilder, BooleanArray, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, StringArray, StringBuilder,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt16Array, UInt32Array, UInt64Array,
};
use arrow::datatypes::{Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// numpy's NaT sentinel for datetime64
const NAT: i64 = i64::MIN;

/// A named column
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ArrayRef,
}

/// Row-aligned set of columns in caller-defined order
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, values: ArrayRef) {
        self.columns.push(Column {
            name: name.to_string(),
            values,
        });
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Row count (0 for a table without columns)
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Arrow schema; a field is nullable only if its column holds nulls.
    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| {
                    Field::new(
                        c.name.clone(),
                        c.values.data_type().clone(),
                        c.values.null_count() > 0,
                    )
                })
                .collect::<Vec<_>>(),
        )
    }

    /// Build a record batch holding every column
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let columns = self.columns.iter().map(|c| c.values.clone()).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        RecordBatch::try_new_with_options(Arc::new(self.schema()), columns, &options)
    }
}

/// Materialize the requested columns of an archive.
///
/// Output columns are the requested names present in the archive, in
/// request order. Names absent from the archive are skipped with a
/// warning; arrays that were not requested are never read. All columns
/// must end up with the same row count.
pub fn materialize<R, S>(
    archive: &mut NpzArchive<R>,
    required_columns: &[S],
) -> MaterializeResult<Table>
where
    R: Read + Seek,
    S: AsRef<str>,
{
    let mut table = Table::new();

    for name in required_columns.iter().map(AsRef::as_ref) {
        if table.column(name).is_some() {
            continue;
        }
        if !archive.contains(name) {
            warn!(column = name, archive = archive.source(), "Requested column not in archive");
            continue;
        }

        debug!(column = name, "Materializing column");
        let array = archive.read_array(name)?;
        let values = materialize_column(name, &array)?;
        debug!(column = name, rows = values.len(), "Column ready");
        table.push(name, values);
    }

    check_row_counts(&table)?;

    info!(
        columns = ?table.column_names(),
        rows = table.num_rows(),
        "Materialized table"
    );

    Ok(table)
}

/// Convert one parsed array into an Arrow column
pub fn materialize_column(name: &str, array: &NpyArray) -> MaterializeResult<ArrayRef> {
    if array.dtype.is_byte() {
        if array.fortran_order && array.shape.len() > 1 {
            return Err(MaterializeError::Shape {
                column: name.into(),
                shape: array.shape.clone(),
            });
        }
        return Ok(Arc::new(decode_null_terminated(name, array.data())?));
    }

    if array.shape.len() > 1 {
        return Err(MaterializeError::Shape {
            column: name.into(),
            shape: array.shape.clone(),
        });
    }

    raw_column(name, array)
}

/// Split a byte buffer on `0x00` and decode each segment as UTF-8.
///
/// A terminator at the very end closes the last string rather than
/// opening an empty one, so `b"a\0b\0"` gives `["a", "b"]` and a buffer
/// with no null byte gives a single string.
pub fn decode_null_terminated(column: &str, buffer: &[u8]) -> MaterializeResult<StringArray> {
    let body = buffer.strip_suffix(&[0]).unwrap_or(buffer);

    let mut builder = StringBuilder::with_capacity(
        body.iter().filter(|b| **b == 0).count() + 1,
        body.len(),
    );

    let mut offset = 0;
    for (row, segment) in body.split(|b| *b == 0).enumerate() {
        let text = std::str::from_utf8(segment).map_err(|e| MaterializeError::Decoding {
            column: column.into(),
            row,
            offset: offset + e.valid_up_to(),
        })?;
        builder.append_value(text);
        offset += segment.len() + 1;
    }

    Ok(builder.finish())
}

fn check_row_counts(table: &Table) -> MaterializeResult<()> {
    let expected = table.num_rows();
    if table.columns().iter().all(|c| c.values.len() == expected) {
        return Ok(());
    }

    Err(MaterializeError::RowCountMismatch {
        lengths: table
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.values.len()))
            .collect(),
    })
}

macro_rules! primitive_column {
    ($data:expr, $order:expr, $native:ty, $array:ty) => {{
        const WIDTH: usize = std::mem::size_of::<$native>();
        let values: Vec<$native> = $data
            .chunks_exact(WIDTH)
            .map(|chunk| {
                let mut buf = [0u8; WIDTH];
                buf.copy_from_slice(chunk);
                match $order {
                    ByteOrder::Big => <$native>::from_be_bytes(buf),
                    _ => <$native>::from_le_bytes(buf),
                }
            })
            .collect();
        Arc::new(<$array>::from(values)) as ArrayRef
    }};
}

fn raw_column(name: &str, array: &NpyArray) -> MaterializeResult<ArrayRef> {
    let data = array.data();
    let order = array.dtype.byte_order;

    let values = match (array.dtype.kind, array.dtype.item_size) {
        (DtypeKind::Bool, _) => Arc::new(BooleanArray::from(
            data.iter().map(|b| *b != 0).collect::<Vec<_>>(),
        )) as ArrayRef,
        (DtypeKind::Int, 1) => primitive_column!(data, order, i8, Int8Array),
        (DtypeKind::Int, 2) => primitive_column!(data, order, i16, Int16Array),
        (DtypeKind::Int, 4) => primitive_column!(data, order, i32, Int32Array),
        (DtypeKind::Int, _) => primitive_column!(data, order, i64, Int64Array),
        (DtypeKind::UInt, 2) => primitive_column!(data, order, u16, UInt16Array),
        (DtypeKind::UInt, 4) => primitive_column!(data, order, u32, UInt32Array),
        (DtypeKind::UInt, _) => primitive_column!(data, order, u64, UInt64Array),
        (DtypeKind::Float, 4) => primitive_column!(data, order, f32, Float32Array),
        (DtypeKind::Float, _) => primitive_column!(data, order, f64, Float64Array),
        (DtypeKind::DateTime, _) => datetime_column(data, order, array.dtype.time_unit),
        (DtypeKind::Bytes, width) => fixed_bytes_column(data, width),
        (DtypeKind::Unicode, width) => unicode_column(name, data, order, width)?,
    };

    Ok(values)
}

fn datetime_column(data: &[u8], order: ByteOrder, unit: Option<TimeUnit>) -> ArrayRef {
    let ticks = data.chunks_exact(8).map(|chunk| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        let v = match order {
            ByteOrder::Big => i64::from_be_bytes(buf),
            _ => i64::from_le_bytes(buf),
        };
        (v != NAT).then_some(v)
    });

    match unit.unwrap_or(TimeUnit::Nanosecond) {
        TimeUnit::Second => Arc::new(ticks.collect::<TimestampSecondArray>()),
        TimeUnit::Millisecond => Arc::new(ticks.collect::<TimestampMillisecondArray>()),
        TimeUnit::Microsecond => Arc::new(ticks.collect::<TimestampMicrosecondArray>()),
        TimeUnit::Nanosecond => Arc::new(ticks.collect::<TimestampNanosecondArray>()),
    }
}

/// `S<n>` elements: null padding is trimmed, the bytes are kept as-is
fn fixed_bytes_column(data: &[u8], width: usize) -> ArrayRef {
    let mut builder = BinaryBuilder::with_capacity(data.len() / width.max(1), data.len());
    for item in data.chunks_exact(width) {
        let end = item.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        builder.append_value(&item[..end]);
    }
    Arc::new(builder.finish())
}

/// `U<n>` elements: UTF-32 code units, trailing zero code points trimmed
fn unicode_column(
    name: &str,
    data: &[u8],
    order: ByteOrder,
    width: usize,
) -> MaterializeResult<ArrayRef> {
    let mut builder = StringBuilder::with_capacity(data.len() / width.max(1), data.len() / 4);
    let mut text = String::with_capacity(width / 4);

    for (row, item) in data.chunks_exact(width).enumerate() {
        text.clear();
        let units: Vec<u32> = item
            .chunks_exact(4)
            .map(|c| {
                let buf = [c[0], c[1], c[2], c[3]];
                match order {
                    ByteOrder::Big => u32::from_be_bytes(buf),
                    _ => u32::from_le_bytes(buf),
                }
            })
            .collect();
        let len = units.iter().rposition(|u| *u != 0).map_or(0, |p| p + 1);

        for (i, unit) in units[..len].iter().enumerate() {
            let ch = char::from_u32(*unit).ok_or_else(|| MaterializeError::Decoding {
                column: name.into(),
                row,
                offset: row * width + i * 4,
            })?;
            text.push(ch);
        }
        builder.append_value(&text);
    }

    Ok(Arc::new(builder.finish()))
}
