//! Human readable cycle summaries

use console::style;
use mirrorsync_types::{EntryError, Error as SyncError, SyncOutcome};
use std::time::Duration;

/// Most entry errors listed after a summary; the rest are counted
const MAX_LISTED_ERRORS: usize = 20;

/// Print the counters of a finished cycle
pub fn print_summary(cycle: u64, outcome: &SyncOutcome) {
    let headline = if outcome.cancelled {
        style(format!("Cycle {} cancelled", cycle)).yellow().bold()
    } else if outcome.errors.is_empty() {
        style(format!("Cycle {} complete", cycle)).green().bold()
    } else {
        style(format!("Cycle {} finished with errors", cycle)).red().bold()
    };

    println!();
    println!("{}", headline);
    println!(
        "  Copied: {} ({})",
        style(outcome.files_copied).green(),
        style(format_bytes(outcome.bytes_copied)).green()
    );
    println!("  Unchanged: {}", style(outcome.files_unchanged).dim());
    println!(
        "  Directories created: {}",
        style(outcome.directories_created).green()
    );
    println!(
        "  Removed: {} files, {} directories",
        style(outcome.files_removed).yellow(),
        style(outcome.directories_removed).yellow()
    );
    println!(
        "  Errors: {}",
        if outcome.errors.is_empty() {
            style(outcome.errors.len()).green()
        } else {
            style(outcome.errors.len()).red()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(outcome.duration)).blue()
    );
}

/// List per-entry failures below a summary
pub fn print_errors(errors: &[EntryError]) {
    for error in errors.iter().take(MAX_LISTED_ERRORS) {
        println!(
            "  {} {} {}",
            style("✗").red().bold(),
            style(&error.path).cyan(),
            style(format!("[{}] {}", error.kind, error.message)).red()
        );
    }

    if errors.len() > MAX_LISTED_ERRORS {
        println!(
            "  {}",
            style(format!("... and {} more", errors.len() - MAX_LISTED_ERRORS)).dim()
        );
    }
}

/// Report a cycle that aborted before producing an outcome
pub fn print_failure(cycle: u64, error: &SyncError) {
    println!();
    println!(
        "{} {}",
        style("✗").red().bold(),
        style(format!("Cycle {} failed: {}", cycle, error)).red()
    );
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
