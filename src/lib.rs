//! immo-parquet - Real-estate transaction dataset conversions
//!
//! Turns the NPZ archive of the French real-estate transaction dataset into
//! columnar Parquet, and reshapes Parquet files for downstream tools.
//!
//! # Features
//!
//! - **Column Materializer**: Reads named arrays out of an NPZ archive and
//!   builds a row-aligned table. Byte columns holding null-terminated UTF-8
//!   are decoded into string columns.
//!
//! - **Streaming Rewrites**: Timestamp coercion, raw transaction
//!   normalization and layout rewrites stream batch by batch.
//!
//! - **Layout Control**: Row-group size, page size, codec and footer
//!   metadata are set per output file.
//!
//! - **CSV Export**: Column projection with a fixed timestamp format.
//!
//! # Pipeline
//!
//! ```text
//!   immo.npz ──materialize──▶ immo.parquet
//!   raw.parquet ──normalize──▶ valid.parquet ──rewrite──▶ optimized.parquet
//!                                   │
//!                                   └──to-csv──▶ valid.csv
//! ```
//!
//! # Example
//!
//! ```bash
//! immo-parquet npz-to-parquet immo.npz immo.parquet
//! immo-parquet rewrite immo.parquet immo_zstd.parquet --compression zstd --meta owner=Pengfei
//! ```

pub mod config;
pub mod csv;
pub mod error;
pub mod materialize;
pub mod npz;
pub mod parquet;
pub mod progress;

pub use config::{CliArgs, ConvertConfig, Job};
pub use error::{ConvertError, Result};
pub use materialize::{decode_null_terminated, materialize, Column, Table};
pub use npz::NpzArchive;
