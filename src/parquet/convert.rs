//! Dataset conversions that produce Parquet
//!
//! - NPZ archive → Parquet (through the column materializer)
//! - nanosecond → microsecond timestamp coercion
//! - raw transaction file → normalized file (microsecond dates, canonical
//!   column order)

use crate::error::{ConvertError, ParquetError, ParquetResult, Result};
use crate::materialize::materialize;
use crate::npz::NpzArchive;
use crate::parquet::reader::ParquetSource;
use crate::parquet::schema::{
    cast_to_schema, micros_schema, micros_type_for, projection_indices, to_micros,
};
use crate::parquet::writer::{ConvertStats, ParquetSink, WriteOptions};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Progress callback: `(rows_done, rows_total)`
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send>;

/// Convert the requested columns of an NPZ archive into one Parquet file.
///
/// The archive is closed before the output file is created.
pub fn convert_npz_to_parquet<P1, P2, S>(
    npz_path: P1,
    columns: &[S],
    output_path: P2,
    options: &WriteOptions,
) -> Result<ConvertStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    S: AsRef<str>,
{
    let npz_path = npz_path.as_ref();
    let output_path = output_path.as_ref();

    info!("Opening archive: {}", npz_path.display());
    let table = {
        let mut archive = NpzArchive::open(npz_path)?;
        materialize(&mut archive, columns)?
    };

    if table.is_empty() {
        return Err(ParquetError::EmptyTable.into());
    }

    let batch = table.to_record_batch().map_err(ParquetError::Arrow)?;

    info!(
        "Writing {} rows x {} columns to {}",
        batch.num_rows(),
        batch.num_columns(),
        output_path.display()
    );

    let mut sink = ParquetSink::create(output_path, batch.schema().as_ref(), options)?;
    sink.write(&batch)?;
    let stats = sink.finish()?;

    info!(
        "Conversion complete: {} rows in {} row groups ({} bytes)",
        stats.rows_written, stats.row_groups, stats.bytes_written
    );

    Ok(stats)
}

/// Rewrite a Parquet file with every nanosecond timestamp column stored at
/// microsecond resolution. Sub-microsecond digits are truncated.
pub fn coerce_timestamps_to_micros<P1, P2>(
    input_path: P1,
    output_path: P2,
    options: &WriteOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let source = ParquetSource::open(input_path.as_ref())?;
    let target: SchemaRef = Arc::new(micros_schema(source.schema()));

    let coerced: Vec<&str> = source
        .schema()
        .fields()
        .iter()
        .zip(target.fields())
        .filter(|(before, after)| before.data_type() != after.data_type())
        .map(|(before, _)| before.name().as_str())
        .collect();
    info!(columns = ?coerced, "Coercing nanosecond timestamps to microseconds");

    let mut sink = ParquetSink::create(output_path.as_ref(), &target, options)?;
    let schema = Arc::clone(&target);
    copy_batches(source, &mut sink, progress_callback.as_ref(), |batch| {
        Ok(cast_to_schema(&batch, &schema)?)
    })?;

    finish(sink)
}

/// Normalize a raw transaction file.
///
/// `date_column` may hold raw nanoseconds (`Int64`) or any timestamp; it is
/// written as `Timestamp(Microsecond)`. Only `columns` are kept, in that
/// order.
pub fn normalize_transactions<P1, P2, S>(
    input_path: P1,
    output_path: P2,
    date_column: &str,
    columns: &[S],
    options: &WriteOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertStats>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    S: AsRef<str>,
{
    let source = ParquetSource::open(input_path.as_ref())?;
    let indices = projection_indices(source.schema(), columns)?;
    let projected = source.schema().project(&indices).map_err(ParquetError::Arrow)?;

    let date_index = projected.index_of(date_column).ok();
    let fields = projected
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if Some(i) == date_index {
                let micros = micros_type_for(f.name(), f.data_type())?;
                Ok(f.as_ref().clone().with_data_type(micros))
            } else {
                Ok(f.as_ref().clone())
            }
        })
        .collect::<ParquetResult<Vec<_>>>()?;
    let target: SchemaRef = Arc::new(Schema::new_with_metadata(
        fields,
        projected.metadata().clone(),
    ));

    info!(
        date_column,
        columns = target.fields().len(),
        "Normalizing transactions"
    );

    let mut sink = ParquetSink::create(output_path.as_ref(), &target, options)?;
    let schema = Arc::clone(&target);
    copy_batches(source, &mut sink, progress_callback.as_ref(), |batch| {
        let batch = batch.project(&indices)?;
        let columns = batch
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if Some(i) == date_index {
                    to_micros(column)
                } else {
                    Ok(column.clone())
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(RecordBatch::try_new(Arc::clone(&schema), columns)?)
    })?;

    finish(sink)
}

/// Pump every batch of `source` through `transform` into `sink`.
pub(crate) fn copy_batches<F>(
    source: ParquetSource,
    sink: &mut ParquetSink,
    progress_callback: Option<&ProgressCallback>,
    mut transform: F,
) -> ParquetResult<u64>
where
    F: FnMut(RecordBatch) -> ParquetResult<RecordBatch>,
{
    let total_rows = source.total_rows();
    let mut rows_done: u64 = 0;

    for batch in source {
        let batch = transform(batch?)?;
        sink.write(&batch)?;
        rows_done += batch.num_rows() as u64;

        if let Some(cb) = progress_callback {
            cb(rows_done, total_rows);
        }
    }

    Ok(rows_done)
}

fn finish(sink: ParquetSink) -> Result<ConvertStats> {
    let stats = sink.finish().map_err(ConvertError::Parquet)?;
    info!(
        "Wrote {}: {} rows in {} row groups ({} bytes)",
        stats.output_path.display(),
        stats.rows_written,
        stats.row_groups,
        stats.bytes_written
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npz::archive::npz_fixture;
    use arrow::array::{
        Array, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
        TimestampNanosecondArray,
    };
    use arrow::datatypes::{DataType, Field, TimeUnit};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::tempdir;

    fn read_back(path: &Path) -> RecordBatch {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        arrow::compute::concat_batches(&batches[0].schema(), &batches).unwrap()
    }

    fn write_input(path: &Path, batch: &RecordBatch) {
        let mut sink =
            ParquetSink::create(path, batch.schema().as_ref(), &WriteOptions::default()).unwrap();
        sink.write(batch).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_npz_to_parquet() {
        let dir = tempdir().unwrap();
        let npz_path = dir.path().join("immo.npz");
        let ids: Vec<u8> = [1i64, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
        let villes = b"Paris\0Lyon\0Nice\0".to_vec();
        let unused = b"x\0".to_vec();
        std::fs::write(
            &npz_path,
            npz_fixture(&[
                ("id_transaction", "<i8", &[3], ids),
                ("ville", "|u1", &[villes.len()], villes),
                ("unused", "|u1", &[unused.len()], unused),
            ]),
        )
        .unwrap();

        let out = dir.path().join("immo.parquet");
        let stats = convert_npz_to_parquet(
            &npz_path,
            &["ville", "id_transaction"],
            &out,
            &WriteOptions::default(),
        )
        .unwrap();

        assert_eq!(stats.rows_written, 3);
        assert_eq!(stats.columns, 2);

        let batch = read_back(&out);
        assert_eq!(batch.schema().field(0).name(), "ville");
        assert_eq!(batch.schema().field(1).name(), "id_transaction");
        let villes = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(villes.value(2), "Nice");
    }

    #[test]
    fn test_npz_to_parquet_empty_selection() {
        let dir = tempdir().unwrap();
        let npz_path = dir.path().join("immo.npz");
        std::fs::write(&npz_path, npz_fixture(&[("prix", "<f8", &[0], vec![])])).unwrap();

        let err = convert_npz_to_parquet(
            &npz_path,
            &["ville"],
            dir.path().join("out.parquet"),
            &WriteOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Parquet(ParquetError::EmptyTable)));
    }

    #[test]
    fn test_coerce_timestamps() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("nanos.parquet");
        let output = dir.path().join("micros.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("id_transaction", DataType::Int64, false),
            Field::new(
                "date_transaction",
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            ),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(TimestampNanosecondArray::from(vec![
                    Some(1_388_485_551_804_819_999),
                    None,
                ])),
            ],
        )
        .unwrap();
        write_input(&input, &batch);

        let seen = Arc::new(AtomicU64::new(0));
        let cb_seen = seen.clone();
        let callback: ProgressCallback = Box::new(move |done, _total| {
            cb_seen.store(done, Ordering::SeqCst);
        });

        let stats =
            coerce_timestamps_to_micros(&input, &output, &WriteOptions::default(), Some(callback))
                .unwrap();
        assert_eq!(stats.rows_written, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        let out = read_back(&output);
        assert_eq!(out.schema().field(0).data_type(), &DataType::Int64);
        let dates = out
            .column(1)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(dates.value(0), 1_388_485_551_804_819);
        assert!(dates.is_null(1));
    }

    #[test]
    fn test_normalize_raw_transactions() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.parquet");
        let output = dir.path().join("valid.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("prix", DataType::Float64, false),
            Field::new("date_transaction", DataType::Int64, false),
            Field::new("extra", DataType::Int64, false),
            Field::new("id_transaction", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![250_000.0])),
                Arc::new(Int64Array::from(vec![1_388_485_551_804_819_000])),
                Arc::new(Int64Array::from(vec![0])),
                Arc::new(Int64Array::from(vec![42])),
            ],
        )
        .unwrap();
        write_input(&input, &batch);

        normalize_transactions(
            &input,
            &output,
            "date_transaction",
            &["id_transaction", "date_transaction", "prix"],
            &WriteOptions::default(),
            None,
        )
        .unwrap();

        let out = read_back(&output);
        let schema = out.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id_transaction", "date_transaction", "prix"]);
        let dates = out
            .column(1)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(dates.value(0), 1_388_485_551_804_819);
    }

    #[test]
    fn test_normalize_missing_column() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(
            "date_transaction",
            DataType::Int64,
            false,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();
        write_input(&input, &batch);

        let err = normalize_transactions(
            &input,
            dir.path().join("out.parquet"),
            "date_transaction",
            &["date_transaction", "prix"],
            &WriteOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Parquet(ParquetError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_normalize_rejects_text_dates() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.parquet");
        let schema = Arc::new(Schema::new(vec![Field::new(
            "date_transaction",
            DataType::Utf8,
            false,
        )]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["2013-12-31"]))],
        )
        .unwrap();
        write_input(&input, &batch);

        let err = normalize_transactions(
            &input,
            dir.path().join("out.parquet"),
            "date_transaction",
            &["date_transaction"],
            &WriteOptions::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Parquet(ParquetError::UnexpectedType { .. })
        ));
    }
}
