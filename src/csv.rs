//! Parquet → CSV export
//!
//! Streams a Parquet file into a delimited text file. Nested columns have
//! no CSV rendering and are rejected before anything is written.

use crate::error::{ConvertError, ParquetError, ParquetResult, Result};
use crate::parquet::convert::ProgressCallback;
use crate::parquet::reader::ParquetSource;
use crate::parquet::schema::projection_indices;
use crate::parquet::writer::ConvertStats;
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Schema};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Default rendering of timestamp columns
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// CSV output options
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Write a header line with the column names
    pub header: bool,
    /// chrono format string for timestamp columns
    pub timestamp_format: String,
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            header: true,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            delimiter: b',',
        }
    }
}

/// Export `input_path` to CSV, keeping `columns` (all when `None`) in the
/// given order.
pub fn convert_parquet_to_csv<P1, P2, S>(
    input_path: P1,
    output_path: P2,
    columns: Option<&[S]>,
    options: &CsvOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    S: AsRef<str>,
{
    let output_path = output_path.as_ref();
    let source = ParquetSource::open(input_path.as_ref())?;
    let total_rows = source.total_rows();

    let indices = match columns {
        Some(columns) => projection_indices(source.schema(), columns)?,
        None => (0..source.schema().fields().len()).collect(),
    };
    let projected = source
        .schema()
        .project(&indices)
        .map_err(ParquetError::Arrow)?;
    ensure_csv_supported(&projected)?;

    info!(
        "Exporting {} columns to CSV: {}",
        projected.fields().len(),
        output_path.display()
    );

    let file = File::create(output_path)?;
    let mut writer = WriterBuilder::new()
        .with_header(options.header)
        .with_delimiter(options.delimiter)
        .with_timestamp_format(options.timestamp_format.clone())
        .build(BufWriter::new(file));

    let mut rows_done: u64 = 0;
    let mut batches: usize = 0;
    for batch in source {
        let batch = batch?.project(&indices).map_err(ParquetError::Arrow)?;
        writer.write(&batch).map_err(ParquetError::Arrow)?;
        rows_done += batch.num_rows() as u64;
        batches += 1;

        if let Some(cb) = &progress_callback {
            cb(rows_done, total_rows);
        }
    }

    // The header is only emitted with the first batch.
    let mut out = writer.into_inner();
    if batches == 0 && options.header {
        write_header(&mut out, &projected, options.delimiter)?;
    }
    out.flush()?;
    drop(out);

    let bytes_written = fs::metadata(output_path)?.len();
    debug!(rows = rows_done, bytes = bytes_written, "CSV export flushed");

    Ok(ConvertStats {
        rows_written: rows_done,
        columns: projected.fields().len(),
        row_groups: 0,
        bytes_written,
        output_path: output_path.to_path_buf(),
    })
}

/// Reject column types the CSV writer cannot render.
pub fn ensure_csv_supported(schema: &Schema) -> ParquetResult<()> {
    for field in schema.fields() {
        let dt = field.data_type();
        let unsupported = matches!(
            dt,
            DataType::List(_)
                | DataType::LargeList(_)
                | DataType::FixedSizeList(_, _)
                | DataType::Struct(_)
                | DataType::Map(_, _)
                | DataType::Union(_, _)
        );
        if unsupported {
            return Err(ParquetError::UnexpectedType {
                column: field.name().to_string(),
                data_type: dt.to_string(),
            });
        }
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, schema: &Schema, delimiter: u8) -> Result<()> {
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    let separator = char::from(delimiter).to_string();
    writeln!(out, "{}", names.join(&separator)).map_err(ConvertError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parquet::writer::{ParquetSink, WriteOptions};
    use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{Field, TimeUnit};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_transactions(path: &Path, rows: usize) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id_transaction", DataType::Int64, false),
            Field::new(
                "date_transaction",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new("prix", DataType::Float64, false),
            Field::new("ville", DataType::Utf8, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![7; rows])),
                Arc::new(TimestampMicrosecondArray::from(vec![1_388_485_551_804_819; rows])),
                Arc::new(Float64Array::from(vec![250000.5; rows])),
                Arc::new(StringArray::from(vec!["Paris"; rows])),
            ],
        )
        .unwrap();
        let mut sink = ParquetSink::create(path, &schema, &WriteOptions::default()).unwrap();
        sink.write(&batch).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_export_with_header_and_timestamp_format() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("valid.parquet");
        let output = dir.path().join("valid.csv");
        write_transactions(&input, 2);

        let stats =
            convert_parquet_to_csv::<_, _, &str>(&input, &output, None, &CsvOptions::default(), None)
                .unwrap();
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.columns, 4);
        assert_eq!(stats.row_groups, 0);

        let text = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id_transaction,date_transaction,prix,ville");
        assert_eq!(lines[1], "7,2013-12-31 10:25:51.804819,250000.5,Paris");
    }

    #[test]
    fn test_export_projection_and_delimiter() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("valid.parquet");
        let output = dir.path().join("valid.csv");
        write_transactions(&input, 1);

        let options = CsvOptions {
            header: false,
            delimiter: b';',
            ..CsvOptions::default()
        };
        convert_parquet_to_csv(&input, &output, Some(&["ville", "id_transaction"][..]), &options, None)
            .unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.trim_end(), "Paris;7");
    }

    #[test]
    fn test_export_empty_file_keeps_header() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.parquet");
        let output = dir.path().join("empty.csv");
        write_transactions(&input, 0);

        let stats = convert_parquet_to_csv(
            &input,
            &output,
            Some(&["prix"][..]),
            &CsvOptions::default(),
            None,
        )
        .unwrap();
        assert_eq!(stats.rows_written, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "prix\n");
    }

    #[test]
    fn test_export_missing_column() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("valid.parquet");
        write_transactions(&input, 1);

        let err = convert_parquet_to_csv(
            &input,
            dir.path().join("out.csv"),
            Some(&["surface_habitable"][..]),
            &CsvOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Parquet(ParquetError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_rejects_nested_types() {
        let schema = Schema::new(vec![
            Field::new("id_transaction", DataType::Int64, false),
            Field::new(
                "pieces",
                DataType::List(Arc::new(Field::new("item", DataType::Int32, true))),
                true,
            ),
        ]);
        let err = ensure_csv_supported(&schema).unwrap_err();
        assert!(matches!(err, ParquetError::UnexpectedType { column, .. } if column == "pieces"));
    }

    #[test]
    fn test_accepts_flat_types() {
        let schema = Schema::new(vec![
            Field::new("ville", DataType::Utf8, false),
            Field::new("latitude", DataType::Float64, true),
        ]);
        assert!(ensure_csv_supported(&schema).is_ok());
    }
}
