//! Physical layout rewrite
//!
//! Copies a Parquet file batch by batch into a new file written with the
//! caller's row-group size, page size, codec and metadata. Column data is
//! not touched.

use crate::error::{ConfigError, Result};
use crate::parquet::convert::{copy_batches, ProgressCallback};
use crate::parquet::reader::ParquetSource;
use crate::parquet::writer::{ConvertStats, ParquetSink, WriteOptions};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

/// Rewrite `input_path` into `output_path` with the given layout.
pub fn rewrite_with_layout<P1, P2>(
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

    info!(
        row_group_size = options.row_group_size,
        page_size = options.data_page_size,
        compression = ?options.compression,
        metadata_keys = options.metadata.len(),
        "Rewriting Parquet layout"
    );

    let schema = source.schema().clone();
    let mut sink = ParquetSink::create(output_path.as_ref(), &schema, options)?;
    copy_batches(source, &mut sink, progress_callback.as_ref(), Ok)?;
    let stats = sink.finish()?;

    info!(
        "Layout rewrite complete: {} rows in {} row groups ({} bytes)",
        stats.rows_written, stats.row_groups, stats.bytes_written
    );

    Ok(stats)
}

/// Load a column-description JSON file as metadata entries.
///
/// Each top-level key of the JSON object becomes one entry whose value is
/// the compact JSON text of its description.
pub fn load_column_metadata(path: &Path) -> std::result::Result<Vec<(String, String)>, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidColumnMetadata {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let document: Value = serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
    column_metadata_entries(&document).ok_or_else(|| invalid("expected a JSON object".to_string()))
}

/// Flatten a parsed column-description document; `None` unless it is an object.
pub fn column_metadata_entries(document: &Value) -> Option<Vec<(String, String)>> {
    let object = document.as_object()?;
    Some(
        object
            .iter()
            .map(|(key, description)| (key.clone(), description.to_string()))
            .collect(),
    )
}

/// Merge table and column metadata; later entries win on duplicate keys,
/// first-seen order is kept.
pub fn merge_metadata(
    table: Vec<(String, String)>,
    columns: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::with_capacity(table.len() + columns.len());
    for (key, value) in table.into_iter().chain(columns) {
        match merged.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => merged.push((key, value)),
        }
    }
    merged
}
