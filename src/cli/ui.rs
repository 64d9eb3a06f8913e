//! Terminal output helpers for the demo CLI, grounded on subx-cli's
//! `cli::ui` module (`colored` for status lines, `indicatif` for progress).

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success line.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error line to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning line.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print a plain log line, dimmed, as streamed from a task's event log.
pub fn print_log(message: &str) {
    println!("{}", message.dimmed());
}

/// Build a `0..=100` progress bar for a single task's completion percentage.
pub fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/100%")
            .unwrap(),
    );
    pb
}
