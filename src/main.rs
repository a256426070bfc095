//! immo-parquet - Real-estate transaction dataset conversions
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use immo_parquet::config::{CliArgs, ConvertConfig, Job};
use immo_parquet::csv::convert_parquet_to_csv;
use immo_parquet::parquet::{
    coerce_timestamps_to_micros, convert_npz_to_parquet, normalize_transactions,
    rewrite_with_layout, ConvertStats, ProgressCallback,
};
use immo_parquet::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = ConvertConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(config.job.name(), &config.input, &config.output);
    }

    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Converting...");
    }

    let start = Instant::now();
    let stats = execute(&config, progress.as_ref().map(ProgressReporter::callback))
        .with_context(|| format!("{} failed", config.job.name()))?;
    let duration = start.elapsed();

    if let Some(ref p) = progress {
        p.finish("Done");
        print_summary(&stats, duration);
    }

    info!(
        rows = stats.rows_written,
        bytes = stats.bytes_written,
        "Wrote {}",
        stats.output_path.display()
    );

    Ok(())
}

fn execute(
    config: &ConvertConfig,
    callback: Option<ProgressCallback>,
) -> immo_parquet::Result<ConvertStats> {
    let (input, output) = (&config.input, &config.output);

    match &config.job {
        Job::NpzToParquet { columns, write } => {
            convert_npz_to_parquet(input, columns, output, write)
        }
        Job::MicroTimestamps { write } => {
            coerce_timestamps_to_micros(input, output, write, callback)
        }
        Job::Normalize {
            date_column,
            columns,
            write,
        } => normalize_transactions(input, output, date_column, columns, write, callback),
        Job::ToCsv { columns, csv } => {
            convert_parquet_to_csv(input, output, Some(columns.as_slice()), csv, callback)
        }
        Job::Rewrite { write } => rewrite_with_layout(input, output, write, callback),
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("immo_parquet=debug,warn")
    } else {
        EnvFilter::new("immo_parquet=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
