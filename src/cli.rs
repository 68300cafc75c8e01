//! Command-line interface for filesort.
//!
//! Parses arguments, merges them over the loaded configuration, runs the
//! organizer with a progress bar and renders the result.

use crate::config::Config;
use crate::file_organizer::{Organizer, RunResult};
use crate::output::OutputFormatter;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sort a directory into category folders, skipping duplicate files.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "filesort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to organize
    pub directory: PathBuf,

    /// Configuration file (default: .filesortrc.toml, then ~/.config/filesort/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of files to process; the rest are skipped
    #[arg(short = 'n', long)]
    pub max_files: Option<usize>,

    /// Classify text files by content into Documents/<label>
    #[arg(long)]
    pub content: bool,

    /// Show what would be moved without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Runs one organize pass as described by `cli` and prints the outcome.
///
/// # Examples
///
/// ```no_run
/// use filesort::cli::{Cli, run_cli};
/// use std::path::PathBuf;
///
/// let cli = Cli {
///     directory: PathBuf::from("/path/to/directory"),
///     dry_run: true,
///     ..Cli::default()
/// };
/// match run_cli(&cli) {
///     Ok(result) => println!("{} files moved", result.moved.len()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunResult, String> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let mut organizer = build_organizer(cli, config)?;

    if !cli.json {
        OutputFormatter::info(&format!("Organizing contents of: {}", cli.directory.display()));
    }

    let result = if cli.json {
        organizer.organize(&cli.directory)
    } else {
        let pb = OutputFormatter::create_progress_bar();
        let result = organizer.organize_with_progress(&cli.directory, |event| {
            pb.set_length(event.total as u64);
            pb.set_position(event.position as u64);
            pb.set_message(event.record.display_name.clone());
        });
        pb.finish_and_clear();
        result
    }
    .map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Error serializing result: {}", e))?;
        println!("{}", json);
    } else {
        OutputFormatter::report(&result);
        finish_message(&result, &cli.directory);
    }

    Ok(result)
}

/// Applies command-line overrides to `config` and builds the organizer.
pub fn build_organizer(cli: &Cli, mut config: Config) -> Result<Organizer, String> {
    if let Some(max_files) = cli.max_files {
        config.organizer.max_files = max_files;
    }
    if cli.content {
        config.classification.enabled = true;
    }

    let mut options = config
        .organizer_options()
        .map_err(|e| format!("Invalid configuration: {}", e))?;
    options.dry_run = cli.dry_run;

    let organizer = Organizer::new(options);
    if !config.classification.enabled {
        return Ok(organizer);
    }

    match config.keyword_classifier() {
        Some(classifier) => {
            debug!("content classification enabled with keyword classifier");
            Ok(organizer.with_classifier(classifier))
        }
        None => {
            if !cli.json {
                OutputFormatter::warning(
                    "Content classification requested but no [classification.keywords] are configured; sorting by extension.",
                );
            }
            Ok(organizer)
        }
    }
}

fn finish_message(result: &RunResult, directory: &Path) {
    if result.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "Run 'filesort {}' without --dry-run to apply.",
            directory.display()
        ));
    } else if !result.is_empty() {
        OutputFormatter::success("Folder organized!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "filesort",
            "/tmp/inbox",
            "--max-files",
            "5",
            "--dry-run",
            "--content",
        ])
        .unwrap();

        assert_eq!(cli.directory, PathBuf::from("/tmp/inbox"));
        assert_eq!(cli.max_files, Some(5));
        assert!(cli.dry_run);
        assert!(cli.content);
        assert!(!cli.json);
    }

    #[test]
    fn test_directory_is_required() {
        assert!(Cli::try_parse_from(["filesort"]).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let cli = Cli {
            directory: PathBuf::from("."),
            max_files: Some(3),
            dry_run: true,
            ..Cli::default()
        };
        let organizer = build_organizer(&cli, Config::default()).unwrap();

        assert_eq!(organizer.options().max_files, 3);
        assert!(organizer.options().dry_run);
        assert!(!organizer.options().use_content_classification);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let config = Config::parse("[classification]\nconfidence_threshold = -1.0").unwrap();
        let result = build_organizer(&Cli::default(), config);
        assert!(matches!(result, Err(message) if message.starts_with("Invalid configuration")));
    }
}
