//! Streaming Parquet input

use crate::error::{ParquetError, ParquetResult};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Rows per batch pulled from the input file
pub const READ_BATCH_SIZE: usize = 65_536;

/// Batch iterator over one Parquet file
pub struct ParquetSource {
    schema: SchemaRef,
    total_rows: u64,
    reader: ParquetRecordBatchReader,
}

impl ParquetSource {
    pub fn open(path: &Path) -> ParquetResult<Self> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let schema = builder.schema().clone();
        let total_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;

        info!(
            "Opened Parquet input: {} ({} rows, {} row groups)",
            path.display(),
            total_rows,
            builder.metadata().num_row_groups()
        );

        let reader = builder.with_batch_size(READ_BATCH_SIZE).build()?;

        Ok(Self {
            schema,
            total_rows,
            reader,
        })
    }

    /// Arrow schema of the file, including its key/value metadata
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Row count from the footer
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }
}

impl Iterator for ParquetSource {
    type Item = ParquetResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader
            .next()
            .map(|batch| batch.map_err(ParquetError::Arrow))
    }
}
