//! Status reporter that prints progress to the terminal.

use colored::Colorize;

use crate::domain::StatusReporter;

/// Prints each status message and mirrors it to the log.
#[derive(Debug, Default)]
pub struct ConsoleStatus;

impl StatusReporter for ConsoleStatus {
    fn report(&self, message: &str) {
        tracing::info!("[Sync] {message}");

        if message.starts_with("Error") {
            println!("{} {}", "✗".red().bold(), message);
        } else if message.contains("complete") || message.contains("up to date") {
            println!("{} {}", "✓".green().bold(), message);
        } else {
            println!("{} {}", "→".cyan(), message.dimmed());
        }
    }
}
