//! Parquet output
//!
//! Wraps `ArrowWriter` with the physical layout knobs exposed on the CLI:
//! row-group size, data page size, codec, and footer key/value metadata.

use crate::error::{ConfigError, ParquetResult};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default maximum rows per row group
pub const DEFAULT_ROW_GROUP_SIZE: usize = 500_000;

/// Default data page size limit in bytes
pub const DEFAULT_PAGE_SIZE: usize = 65_536;

/// Compression codecs selectable from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Codec {
    Uncompressed,
    Snappy,
    Gzip,
    Brotli,
    Lz4,
    #[value(name = "lz4_raw")]
    Lz4Raw,
    Zstd,
}

impl Codec {
    /// Build the Parquet compression setting, validating the optional level.
    pub fn compression(self, level: Option<i32>) -> Result<Compression, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCompression {
            codec: format!("{:?}", self).to_lowercase(),
            reason,
        };

        let unsigned_level = |level: i32| {
            u32::try_from(level).map_err(|_| invalid(format!("level {} must not be negative", level)))
        };

        match (self, level) {
            (Codec::Gzip, Some(level)) => GzipLevel::try_new(unsigned_level(level)?)
                .map(Compression::GZIP)
                .map_err(|e| invalid(e.to_string())),
            (Codec::Brotli, Some(level)) => BrotliLevel::try_new(unsigned_level(level)?)
                .map(Compression::BROTLI)
                .map_err(|e| invalid(e.to_string())),
            (Codec::Zstd, Some(level)) => ZstdLevel::try_new(level)
                .map(Compression::ZSTD)
                .map_err(|e| invalid(e.to_string())),
            (_, Some(_)) => Err(invalid("codec does not take a level".to_string())),
            (Codec::Uncompressed, None) => Ok(Compression::UNCOMPRESSED),
            (Codec::Snappy, None) => Ok(Compression::SNAPPY),
            (Codec::Gzip, None) => Ok(Compression::GZIP(GzipLevel::default())),
            (Codec::Brotli, None) => Ok(Compression::BROTLI(BrotliLevel::default())),
            (Codec::Lz4, None) => Ok(Compression::LZ4),
            (Codec::Lz4Raw, None) => Ok(Compression::LZ4_RAW),
            (Codec::Zstd, None) => Ok(Compression::ZSTD(ZstdLevel::default())),
        }
    }
}

/// Physical layout of a Parquet file being written
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Maximum rows per row group
    pub row_group_size: usize,
    /// Data page size limit in bytes
    pub data_page_size: usize,
    pub compression: Compression,
    /// Key/value metadata; when non-empty it replaces the schema metadata
    pub metadata: Vec<(String, String)>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            data_page_size: DEFAULT_PAGE_SIZE,
            compression: Compression::SNAPPY,
            metadata: Vec::new(),
        }
    }
}

impl WriteOptions {
    /// Build Parquet writer properties from these options.
    pub fn writer_properties(&self) -> WriterProperties {
        let key_value_metadata = if self.metadata.is_empty() {
            None
        } else {
            Some(
                self.metadata
                    .iter()
                    .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
                    .collect(),
            )
        };

        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_data_page_size_limit(self.data_page_size)
            .set_key_value_metadata(key_value_metadata)
            .set_created_by(format!("immo-parquet version {}", env!("CARGO_PKG_VERSION")))
            .build()
    }

    /// Schema to write: the input schema, with its metadata replaced when
    /// metadata was supplied.
    pub fn output_schema(&self, schema: &Schema) -> SchemaRef {
        if self.metadata.is_empty() {
            return Arc::new(schema.clone());
        }
        let metadata: HashMap<String, String> = self.metadata.iter().cloned().collect();
        Arc::new(schema.clone().with_metadata(metadata))
    }
}

/// Statistics from a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertStats {
    pub rows_written: u64,
    pub columns: usize,
    /// Row groups in the output (0 for CSV)
    pub row_groups: usize,
    pub bytes_written: u64,
    pub output_path: PathBuf,
}

/// A single Parquet output file
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    schema: SchemaRef,
    path: PathBuf,
}

impl ParquetSink {
    /// Create `path` and prepare to write batches of `schema`.
    pub fn create(path: &Path, schema: &Schema, options: &WriteOptions) -> ParquetResult<Self> {
        let schema = options.output_schema(schema);
        let file = File::create(path)?;
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(options.writer_properties()))?;

        debug!(
            path = %path.display(),
            row_group_size = options.row_group_size,
            page_size = options.data_page_size,
            compression = ?options.compression,
            "Opened Parquet writer"
        );

        Ok(Self {
            writer,
            schema,
            path: path.to_path_buf(),
        })
    }

    /// Write one batch. Its columns must match the sink schema's fields.
    pub fn write(&mut self, batch: &RecordBatch) -> ParquetResult<()> {
        let batch = RecordBatch::try_new(self.schema.clone(), batch.columns().to_vec())?;
        self.writer.write(&batch)?;
        Ok(())
    }

    /// Flush, write the footer and close the file.
    pub fn finish(self) -> ParquetResult<ConvertStats> {
        let metadata = self.writer.close()?;
        let bytes_written = fs::metadata(&self.path)?.len();

        Ok(ConvertStats {
            rows_written: metadata.num_rows as u64,
            columns: self.schema.fields().len(),
            row_groups: metadata.row_groups.len(),
            bytes_written,
            output_path: self.path,
        })
    }
}
