//! Error types for immo-parquet
//!
//! This module defines the error hierarchy for the conversions:
//! - NPZ archive errors (container and NPY member parsing)
//! - Materialization errors (string decoding, ragged columns)
//! - Parquet/Arrow errors (reading, writing, schema checks)
//! - Configuration and CLI errors
//!
//! Every error carries enough context (member name, column, offset,
//! lengths) to diagnose a bad input without re-running with more logging.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for immo-parquet
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Archive could not be opened or parsed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Column materialization failed
    #[error("Materialize error: {0}")]
    Materialize(#[from] MaterializeError),

    /// Parquet read/write errors
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// NPZ container and NPY member errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Archive file could not be opened
    #[error("Failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Zip container is corrupt or unreadable
    #[error("Invalid zip container '{archive}': {source}")]
    Zip {
        archive: String,
        source: zip::result::ZipError,
    },

    /// Member could not be read out of the container
    #[error("Failed to read member '{member}': {source}")]
    ReadMember {
        member: String,
        source: std::io::Error,
    },

    /// Member is not in the archive
    #[error("Array '{name}' not found in archive")]
    MissingArray { name: String },

    /// Member does not start with the NPY magic string
    #[error("Member '{name}' is not an NPY array (bad magic)")]
    BadMagic { name: String },

    /// NPY format version we cannot read
    #[error("Member '{name}' uses unsupported NPY version {major}.{minor}")]
    UnsupportedVersion { name: String, major: u8, minor: u8 },

    /// Header dictionary is malformed
    #[error("Malformed NPY header in '{name}': {reason}")]
    Header { name: String, reason: String },

    /// Element type we cannot represent as a column
    #[error("Unsupported dtype '{descr}' in '{name}'")]
    UnsupportedDtype { name: String, descr: String },

    /// Data section shorter or longer than the header declares
    #[error("Data size mismatch in '{name}': header declares {expected} bytes, found {found}")]
    DataSize {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Column materialization errors
#[derive(Error, Debug)]
pub enum MaterializeError {
    /// Archive failure while reading a requested column
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A byte-encoded segment is not valid UTF-8
    #[error("Invalid UTF-8 in column '{column}' at row {row}, byte offset {offset}")]
    Decoding {
        column: String,
        row: usize,
        offset: usize,
    },

    /// Columns disagree on row count
    #[error("Row count mismatch across columns: {}", format_lengths(.lengths))]
    RowCountMismatch { lengths: Vec<(String, usize)> },

    /// Numeric column that is not one-dimensional
    #[error("Column '{column}' has shape {shape:?}; only 1-D numeric arrays can be columns")]
    Shape { column: String, shape: Vec<usize> },
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{}={}", name, len))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parquet read/write errors
#[derive(Error, Debug)]
pub enum ParquetError {
    /// Arrow error (casts, batches, CSV writer)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet reader/writer error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required column is absent from the input
    #[error("Column '{column}' not found in input")]
    MissingColumn { column: String },

    /// A column has a type the conversion cannot handle
    #[error("Column '{column}' has unexpected type {data_type}")]
    UnexpectedType { column: String, data_type: String },

    /// Nothing to write
    #[error("No requested column was found; refusing to write an empty table")]
    EmptyTable,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid row group size
    #[error("Invalid row group size {size}: must be at least 1")]
    InvalidRowGroupSize { size: usize },

    /// Invalid data page size
    #[error("Invalid page size {size}: must be at least {min} bytes")]
    InvalidPageSize { size: usize, min: usize },

    /// Codec level out of range or not applicable
    #[error("Invalid compression '{codec}': {reason}")]
    InvalidCompression { codec: String, reason: String },

    /// Metadata entry not in key=value form
    #[error("Invalid metadata entry '{entry}': {reason}")]
    InvalidMetadata { entry: String, reason: String },

    /// Column metadata file unreadable or not a JSON object
    #[error("Invalid column metadata file '{path}': {reason}")]
    InvalidColumnMetadata { path: PathBuf, reason: String },

    /// Output path error
    #[error("Invalid output path '{path}': {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    /// Input path error
    #[error("Invalid input path '{path}': {reason}")]
    InvalidInputPath { path: PathBuf, reason: String },

    /// CSV delimiter must be a single byte
    #[error("Invalid delimiter '{delimiter}': must be an ASCII character")]
    InvalidDelimiter { delimiter: char },

    /// Column list given but empty
    #[error("Column list is empty")]
    EmptyColumnList,
}

/// Result type alias for ConvertError
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Result type alias for ArchiveError
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for MaterializeError
pub type MaterializeResult<T> = std::result::Result<T, MaterializeError>;

/// Result type alias for ParquetError
pub type ParquetResult<T> = std::result::Result<T, ParquetError>;
