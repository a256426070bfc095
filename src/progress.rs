//! Progress reporting for conversions
//!
//! Provides a spinner driven by the `(rows_done, rows_total)` callbacks of
//! the streaming conversions, plus the styled header and summary.

use crate::parquet::convert::ProgressCallback;
use crate::parquet::writer::ConvertStats;
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter that displays conversion status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Callback for the streaming conversions, feeding this spinner
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |done, total| bar.set_message(progress_message(done, total)))
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_message(rows_done: u64, rows_total: u64) -> String {
    if rows_total == 0 {
        return format!("Rows: {}", format_number(rows_done));
    }
    let pct = rows_done as f64 * 100.0 / rows_total as f64;
    format!(
        "Rows: {} / {} ({:.1}%)",
        format_number(rows_done),
        format_number(rows_total),
        pct
    )
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|&b| b as char)
                .collect::<String>()
        })
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the conversion
pub fn print_summary(stats: &ConvertStats, duration: Duration) {
    let duration_secs = duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        stats.rows_written as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Conversion Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Rows:").bold(),
        format_number(stats.rows_written)
    );
    println!("  {} {}", style("Columns:").bold(), stats.columns);
    if stats.row_groups > 0 {
        println!("  {} {}", style("Row Groups:").bold(), stats.row_groups);
    }
    println!(
        "  {} {:.1}s ({:.0} rows/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {} ({})",
        style("Output:").bold(),
        stats.output_path.display(),
        format_size(stats.bytes_written, BINARY)
    );
    println!();
}

/// Print a header at the start of a conversion
pub fn print_header(command: &str, input: &Path, output: &Path) {
    println!();
    println!(
        "{} {}",
        style("immo-parquet").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Command:").bold(), command);
    println!("  {} {}", style("Input:").bold(), input.display());
    println!("  {} {}", style("Output:").bold(), output.display());
    println!();
}
