//! Output formatting and styling module.
//!
//! All terminal output for the CLI goes through [`OutputFormatter`]: colored
//! status lines, the progress bar and the end-of-run report.

use crate::file_organizer::RunResult;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// ```no_run
    /// use filesort::output::OutputFormatter;
    /// OutputFormatter::error("Invalid root directory");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar; the length is set once enumeration is done.
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints moved files per category with a total row.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("Category".len());

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints the moved and skipped lists and the summary table for one run.
    pub fn report(result: &RunResult) {
        if result.dry_run {
            Self::dry_run_notice("No files were moved. Planned changes:");
        }

        if result.is_empty() {
            Self::info("No files were found to organize.");
            return;
        }

        if !result.moved.is_empty() {
            Self::header(if result.dry_run {
                "Would move:"
            } else {
                "Moved files:"
            });
            for entry in &result.moved {
                Self::success(&entry.to_string());
            }
        }

        if !result.skipped.is_empty() {
            Self::header("Skipped files:");
            for entry in &result.skipped {
                Self::warning(&entry.to_string());
            }
        }

        Self::summary_table(&result.category_counts(), result.moved.len());
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
