//! Colored status lines for command output.
//!
//! Status lines go to stderr: stdout belongs to the build log renderer
//! while a build is being followed.

use std::io::{self, Write};

use owo_colors::OwoColorize;

/// Format a success line.
#[must_use]
pub fn format_success(message: &str) -> String {
    format!("{} {}", "[OK]".green().bold(), message)
}

/// Format an informational line.
#[must_use]
pub fn format_info(message: &str) -> String {
    format!("{} {}", "[INFO]".blue().bold(), message)
}

/// Format an error line.
#[must_use]
pub fn format_error(message: &str) -> String {
    format!("{} {}", "[ERROR]".red().bold(), message)
}

/// Format a tip shown below a status line.
#[must_use]
pub fn format_tip(tip: &str) -> String {
    format!("  {} {}", "tip:".yellow().bold(), tip.dimmed())
}

fn emit(line: &str) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{line}");
    let _ = stderr.flush();
}

/// Print a success message.
pub fn print_success(message: &str) {
    emit(&format_success(message));
}

/// Print an informational message.
pub fn print_info(message: &str) {
    emit(&format_info(message));
}

/// Print an error message.
pub fn print_error(message: &str) {
    emit(&format_error(message));
}

/// Print a tip.
pub fn print_tip(tip: &str) {
    emit(&format_tip(tip));
}
