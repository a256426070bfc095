//! Parquet conversion module
//!
//! Writes materialized NPZ tables to Parquet and rewrites existing Parquet
//! files (timestamp resolution, column selection, physical layout).
//!
//! # Module Structure
//!
//! - `schema`: Canonical transaction column order and cast helpers
//! - `reader`: Streaming batch input
//! - `writer`: Layout options and the `ArrowWriter` sink
//! - `convert`: NPZ → Parquet, timestamp coercion, normalization
//! - `layout`: Row-group/page/codec/metadata rewrite

pub mod convert;
pub mod layout;
pub mod reader;
pub mod schema;
pub mod writer;

pub use convert::{
    coerce_timestamps_to_micros, convert_npz_to_parquet, normalize_transactions, ProgressCallback,
};
pub use layout::{load_column_metadata, merge_metadata, rewrite_with_layout};
pub use reader::ParquetSource;
pub use schema::{default_columns, DATE_COLUMN, TRANSACTION_COLUMNS};
pub use writer::{Codec, ConvertStats, ParquetSink, WriteOptions};
