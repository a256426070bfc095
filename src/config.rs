//! Configuration types for immo-parquet
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - `key=value` metadata parsing

use crate::csv::{CsvOptions, DEFAULT_TIMESTAMP_FORMAT};
use crate::error::ConfigError;
use crate::parquet::layout::{load_column_metadata, merge_metadata};
use crate::parquet::schema::{default_columns, DATE_COLUMN};
use crate::parquet::writer::{Codec, WriteOptions, DEFAULT_PAGE_SIZE, DEFAULT_ROW_GROUP_SIZE};
use clap::{Args, Parser};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Smallest accepted data page size
pub const MIN_PAGE_SIZE: usize = 1024;

/// Metadata keys: no whitespace, no `=`
static METADATA_ENTRY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^=\s]+)=(.*)$").expect("Invalid metadata regex"));

/// Convert the real-estate transaction dataset between NPZ, Parquet and CSV
#[derive(Parser, Debug, Clone)]
#[command(
    name = "immo-parquet",
    version,
    about = "Convert the real-estate transaction dataset between NPZ, Parquet and CSV",
    after_help = "EXAMPLES:\n    \
        immo-parquet npz-to-parquet immo.npz immo.parquet\n    \
        immo-parquet normalize raw.parquet valid.parquet\n    \
        immo-parquet micro-timestamps valid.parquet valid_us.parquet\n    \
        immo-parquet rewrite valid.parquet optimized.parquet --row-group-size 1000000 --compression zstd\n    \
        immo-parquet to-csv valid.parquet valid.csv --columns id_transaction,prix"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Physical layout flags shared by every Parquet-producing command
#[derive(Args, Debug, Clone)]
pub struct LayoutArgs {
    /// Maximum rows per row group
    #[arg(long, default_value_t = DEFAULT_ROW_GROUP_SIZE, value_name = "ROWS")]
    pub row_group_size: usize,

    /// Data page size limit in bytes
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_name = "BYTES")]
    pub page_size: usize,

    /// Compression codec
    #[arg(long, value_enum, default_value = "snappy")]
    pub compression: Codec,

    /// Codec level (gzip, brotli, zstd)
    #[arg(long, value_name = "LEVEL")]
    pub compression_level: Option<i32>,

    /// Table metadata entry (can be repeated)
    #[arg(long = "meta", value_name = "KEY=VALUE", action = clap::ArgAction::Append)]
    pub metadata: Vec<String>,

    /// JSON file of column descriptions stored as metadata
    #[arg(long, value_name = "FILE")]
    pub column_metadata: Option<PathBuf>,
}

/// Subcommands
#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Materialize NPZ columns and write them to Parquet
    NpzToParquet {
        /// Input NPZ archive
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output Parquet file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Columns to keep, in output order (defaults to the transaction columns)
        #[arg(long, value_delimiter = ',', value_name = "NAMES")]
        columns: Option<Vec<String>>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Store nanosecond timestamp columns at microsecond resolution
    MicroTimestamps {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Convert raw transactions: microsecond dates, canonical columns
    Normalize {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Column holding the transaction date
        #[arg(long, default_value = DATE_COLUMN)]
        date_column: String,

        /// Columns to keep, in output order (defaults to the transaction columns)
        #[arg(long, value_delimiter = ',', value_name = "NAMES")]
        columns: Option<Vec<String>>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Export a Parquet file to CSV
    ToCsv {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Columns to export, in output order (defaults to the transaction columns)
        #[arg(long, value_delimiter = ',', value_name = "NAMES")]
        columns: Option<Vec<String>>,

        /// chrono format for timestamp columns
        #[arg(long, default_value = DEFAULT_TIMESTAMP_FORMAT)]
        timestamp_format: String,

        /// Omit the header line
        #[arg(long)]
        no_header: bool,

        /// Field delimiter (single ASCII character)
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },

    /// Rewrite a Parquet file with a new physical layout
    Rewrite {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// What a validated command will do
#[derive(Debug, Clone)]
pub enum Job {
    NpzToParquet {
        columns: Vec<String>,
        write: WriteOptions,
    },
    MicroTimestamps {
        write: WriteOptions,
    },
    Normalize {
        date_column: String,
        columns: Vec<String>,
        write: WriteOptions,
    },
    ToCsv {
        columns: Vec<String>,
        csv: CsvOptions,
    },
    Rewrite {
        write: WriteOptions,
    },
}

impl Job {
    /// Subcommand name for display
    pub fn name(&self) -> &'static str {
        match self {
            Job::NpzToParquet { .. } => "npz-to-parquet",
            Job::MicroTimestamps { .. } => "micro-timestamps",
            Job::Normalize { .. } => "normalize",
            Job::ToCsv { .. } => "to-csv",
            Job::Rewrite { .. } => "rewrite",
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub job: Job,

    /// Show progress indicator
    pub show_progress: bool,
}

impl ConvertConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let (input, output, job) = match args.command {
            Command::NpzToParquet {
                input,
                output,
                columns,
                layout,
            } => {
                let columns = column_list(columns)?.unwrap_or_else(default_columns);
                let write = layout.write_options()?;
                (input, output, Job::NpzToParquet { columns, write })
            }
            Command::MicroTimestamps {
                input,
                output,
                layout,
            } => {
                let write = layout.write_options()?;
                (input, output, Job::MicroTimestamps { write })
            }
            Command::Normalize {
                input,
                output,
                date_column,
                columns,
                layout,
            } => {
                let columns = column_list(columns)?.unwrap_or_else(default_columns);
                let write = layout.write_options()?;
                (
                    input,
                    output,
                    Job::Normalize {
                        date_column,
                        columns,
                        write,
                    },
                )
            }
            Command::ToCsv {
                input,
                output,
                columns,
                timestamp_format,
                no_header,
                delimiter,
            } => {
                if !delimiter.is_ascii() {
                    return Err(ConfigError::InvalidDelimiter { delimiter });
                }
                let csv = CsvOptions {
                    header: !no_header,
                    timestamp_format,
                    delimiter: delimiter as u8,
                };
                let columns = column_list(columns)?.unwrap_or_else(default_columns);
                (input, output, Job::ToCsv { columns, csv })
            }
            Command::Rewrite {
                input,
                output,
                layout,
            } => {
                let write = layout.write_options()?;
                (input, output, Job::Rewrite { write })
            }
        };

        validate_paths(&input, &output)?;

        Ok(Self {
            input,
            output,
            job,
            show_progress: !args.quiet,
        })
    }
}

impl LayoutArgs {
    /// Validate the layout flags into writer options
    pub fn write_options(&self) -> Result<WriteOptions, ConfigError> {
        if self.row_group_size == 0 {
            return Err(ConfigError::InvalidRowGroupSize {
                size: self.row_group_size,
            });
        }

        if self.page_size < MIN_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                size: self.page_size,
                min: MIN_PAGE_SIZE,
            });
        }

        let compression = self.compression.compression(self.compression_level)?;

        let table = self
            .metadata
            .iter()
            .map(|entry| parse_metadata_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;
        let columns = match &self.column_metadata {
            Some(path) => load_column_metadata(path)?,
            None => Vec::new(),
        };

        Ok(WriteOptions {
            row_group_size: self.row_group_size,
            data_page_size: self.page_size,
            compression,
            metadata: merge_metadata(table, columns),
        })
    }
}

/// Parse a `key=value` metadata entry. The value may be empty or contain `=`.
pub fn parse_metadata_entry(entry: &str) -> Result<(String, String), ConfigError> {
    let caps = METADATA_ENTRY_REGEX
        .captures(entry)
        .ok_or_else(|| ConfigError::InvalidMetadata {
            entry: entry.to_string(),
            reason: "expected KEY=VALUE with a non-empty key".to_string(),
        })?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

fn column_list(columns: Option<Vec<String>>) -> Result<Option<Vec<String>>, ConfigError> {
    match columns {
        Some(columns) => {
            let columns: Vec<String> = columns
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if columns.is_empty() {
                return Err(ConfigError::EmptyColumnList);
            }
            Ok(Some(columns))
        }
        None => Ok(None),
    }
}

fn validate_paths(input: &Path, output: &Path) -> Result<(), ConfigError> {
    if !input.is_file() {
        return Err(ConfigError::InvalidInputPath {
            path: input.to_path_buf(),
            reason: "File does not exist".to_string(),
        });
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidOutputPath {
                path: output.to_path_buf(),
                reason: format!("Parent directory '{}' does not exist", parent.display()),
            });
        }
    }

    if input == output {
        return Err(ConfigError::InvalidOutputPath {
            path: output.to_path_buf(),
            reason: "Output would overwrite the input".to_string(),
        });
    }

    Ok(())
}
