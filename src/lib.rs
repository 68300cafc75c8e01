//! filesort - sort a directory into category folders
//!
//! This library walks a directory tree, skips files whose content duplicates
//! one already sorted in the same run, picks a category for each file by
//! extension (or by classifying its text) and moves it into `root/<category>`
//! without overwriting anything.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod extract;
pub mod file_category;
pub mod file_organizer;
pub mod hashing;
pub mod output;

pub use classifier::{Classification, Classifier, ClassifierError, KeywordClassifier};
pub use config::{CompiledFilters, Config, ConfigError};
pub use extract::{ExtractError, ExtractLimits, ExtractorRegistry, TextExtractor};
pub use file_category::{CategoryRule, CategoryTable};
pub use file_organizer::{
    Organizer, OrganizerOptions, OrganizeError, Outcome, RunResult, SkipReason,
};

pub use cli::{Cli, run_cli};
