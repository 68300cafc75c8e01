//! Configuration loading for organizer settings, category rules, content
//! classification and file filters.
//!
//! # Configuration File Format
//!
//! ```toml
//! [organizer]
//! max_files = 200
//!
//! [[categories]]
//! name = "Documents"
//! extensions = ["txt", "pdf"]
//!
//! [classification]
//! enabled = false
//! extensions = ["txt", "md", "pdf"]
//! confidence_threshold = 0.7
//! char_limit = 512
//! page_limit = 2
//! fallback_category = "Others"
//!
//! [classification.keywords]
//! Invoices = ["invoice", "amount due"]
//!
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = ["bak"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```
//!
//! A `[[categories]]` list replaces the built-in rules entirely.

use crate::classifier::KeywordClassifier;
use crate::extract::ExtractLimits;
use crate::file_category::{
    CategoryRule, CategoryTable, DEFAULT_CATCH_ALL, normalize_extension, validate_category_name,
};
use crate::file_organizer::{
    ContentOptions, DEFAULT_CHAR_LIMIT, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_FILES,
    DEFAULT_PAGE_LIMIT, OrganizerOptions,
};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".filesortrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("Extension '{extension}' is claimed by both '{first}' and '{second}'")]
    OverlappingExtension {
        extension: String,
        first: String,
        second: String,
    },

    #[error("Invalid category name '{0}': must be a single folder name")]
    InvalidCategoryName(String),

    #[error("Confidence threshold must be between 0 and 1, got {0}")]
    InvalidThreshold(f32),

    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organizer: OrganizerSettings,

    /// Custom category rules in lookup order. Empty means the built-in table.
    #[serde(default)]
    pub categories: Vec<CategorySpec>,

    #[serde(default)]
    pub classification: ClassificationSettings,

    #[serde(default)]
    pub filters: FilterRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizerSettings {
    /// Files past this count are skipped as exceeding the limit.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Folder for files no rule claims.
    #[serde(default = "default_catch_all")]
    pub catch_all: String,
}

impl Default for OrganizerSettings {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            catch_all: default_catch_all(),
        }
    }
}

/// One `[[categories]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Settings for routing text-like files through a classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Extensions eligible for content classification.
    #[serde(default = "default_content_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Maximum number of characters handed to the classifier.
    #[serde(default = "default_char_limit")]
    pub char_limit: usize,

    /// Maximum number of pages read from paginated documents.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Category for text the classifier is not confident about.
    #[serde(default = "default_catch_all")]
    pub fallback_category: String,

    /// Keyword lists per label for the built-in keyword classifier.
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            extensions: default_content_extensions(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            char_limit: DEFAULT_CHAR_LIMIT,
            page_limit: DEFAULT_PAGE_LIMIT,
            fallback_category: default_catch_all(),
            keywords: BTreeMap::new(),
        }
    }
}

/// Root-level filter rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether hidden files (starting with ".") are organized. Defaults to true.
    #[serde(default = "default_enable_hidden_files")]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for leaving files where they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact file names (e.g. "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the root.
    #[serde(default)]
    pub patterns: Vec<String>,

    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_catch_all() -> String {
    DEFAULT_CATCH_ALL.to_string()
}

fn default_content_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string(), "pdf".to_string()]
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_char_limit() -> usize {
    DEFAULT_CHAR_LIMIT
}

fn default_page_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn default_enable_hidden_files() -> bool {
    true
}

impl Config {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if provided
    /// 2. `.filesortrc.toml` in the current directory
    /// 3. `~/.config/filesort/config.toml`
    /// 4. built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly provided file cannot be read or parsed,
    /// or if a discovered file is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("filesort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Build the category table: custom rules if any are configured, the built-in table otherwise.
    pub fn category_table(&self) -> Result<CategoryTable, ConfigError> {
        if self.categories.is_empty() {
            let standard = CategoryTable::standard();
            if self.organizer.catch_all == standard.catch_all() {
                return Ok(standard);
            }
            return CategoryTable::new(standard.rules().to_vec(), self.organizer.catch_all.clone());
        }

        let rules = self
            .categories
            .iter()
            .map(|spec| CategoryRule::new(spec.name.clone(), &spec.extensions))
            .collect();
        CategoryTable::new(rules, self.organizer.catch_all.clone())
    }

    /// Validate the classification section into content options.
    pub fn content_options(&self) -> Result<ContentOptions, ConfigError> {
        let settings = &self.classification;
        let threshold = settings.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        for component in settings.fallback_category.split('/') {
            validate_category_name(component)?;
        }

        Ok(ContentOptions {
            extensions: settings
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .filter(|ext| !ext.is_empty())
                .collect::<HashSet<_>>(),
            confidence_threshold: threshold,
            limits: ExtractLimits {
                char_limit: settings.char_limit,
                page_limit: settings.page_limit,
            },
            fallback_category: settings.fallback_category.clone(),
        })
    }

    /// Keyword classifier from `[classification.keywords]`, if any labels are defined.
    pub fn keyword_classifier(&self) -> Option<KeywordClassifier> {
        if self.classification.keywords.is_empty() {
            return None;
        }
        let classifier = self
            .classification
            .keywords
            .iter()
            .fold(KeywordClassifier::new(), |classifier, (label, keywords)| {
                classifier.with_label(label.clone(), keywords.iter().cloned())
            });
        Some(classifier)
    }

    /// Assemble validated organizer options from every section.
    pub fn organizer_options(&self) -> Result<OrganizerOptions, ConfigError> {
        Ok(OrganizerOptions {
            max_files: self.organizer.max_files,
            categories: self.category_table()?,
            filters: self.filters.compile()?,
            use_content_classification: self.classification.enabled,
            content: self.content_options()?,
            dry_run: false,
        })
    }
}

impl FilterRules {
    /// Compile into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

/// Pre-compiled filter rules, checked once per enumerated file.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check whether a file (path relative to the root) should be organized.
    ///
    /// Include patterns win outright; otherwise the hidden-file switch, exact
    /// names, extensions, globs and regexes are checked in that order.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        let excluded_by_pattern = self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path));
        let excluded_by_regex = self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name));

        !(excluded_by_pattern || excluded_by_regex)
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters_from(toml_text: &str) -> CompiledFilters {
        Config::parse(toml_text).unwrap().filters.compile().unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.organizer.max_files, 200);
        assert!(!config.classification.enabled);
        assert_eq!(config.classification.confidence_threshold, 0.7);
        assert_eq!(config.classification.char_limit, 512);
        assert!(config.filters.enable_hidden_files);
        assert!(config.categories.is_empty());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.organizer.max_files, DEFAULT_MAX_FILES);
        assert_eq!(config.classification.fallback_category, "Others");
        assert_eq!(config.category_table().unwrap().catch_all(), "Others");
    }

    #[test]
    fn test_parse_full_document() {
        let config = Config::parse(
            r#"
            [organizer]
            max_files = 10
            catch_all = "Misc"

            [[categories]]
            name = "Notes"
            extensions = [".MD", "txt"]

            [[categories]]
            name = "Pictures"
            extensions = ["png"]

            [classification]
            enabled = true
            confidence_threshold = 0.5
            fallback_category = "Unsorted"

            [classification.keywords]
            Invoices = ["invoice", "amount due"]
            "#,
        )
        .unwrap();

        let options = config.organizer_options().unwrap();
        assert_eq!(options.max_files, 10);
        assert!(options.use_content_classification);
        assert_eq!(options.categories.categorize(Some("md")), "Notes");
        assert_eq!(options.categories.categorize(Some("png")), "Pictures");
        assert_eq!(options.categories.categorize(Some("jpg")), "Misc");
        assert_eq!(options.content.confidence_threshold, 0.5);
        assert_eq!(options.content.fallback_category, "Unsorted");
        assert!(options.content.extensions.contains("pdf"));
        assert!(config.keyword_classifier().is_some());
    }

    #[test]
    fn test_custom_catch_all_with_standard_rules() {
        let config = Config::parse("[organizer]\ncatch_all = \"Misc\"").unwrap();
        let table = config.category_table().unwrap();
        assert_eq!(table.categorize(Some("jpg")), "Images");
        assert_eq!(table.categorize(Some("zzz")), "Misc");
    }

    #[test]
    fn test_overlapping_categories_rejected() {
        let config = Config::parse(
            r#"
            [[categories]]
            name = "A"
            extensions = ["txt"]

            [[categories]]
            name = "B"
            extensions = ["txt"]
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.category_table(),
            Err(ConfigError::OverlappingExtension { .. })
        ));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = Config::parse("[classification]\nconfidence_threshold = 1.5").unwrap();
        assert!(matches!(
            config.organizer_options(),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_invalid_fallback_rejected() {
        let config = Config::parse("[classification]\nfallback_category = \"../up\"").unwrap();
        assert!(matches!(
            config.content_options(),
            Err(ConfigError::InvalidCategoryName(_))
        ));
    }

    #[test]
    fn test_invalid_toml_is_config_invalid() {
        let result = Config::parse("[organizer\nmax_files = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = Config::load(Some(Path::new("/non/existent/filesort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_no_keywords_means_no_classifier() {
        assert!(Config::default().keyword_classifier().is_none());
    }

    #[test]
    fn test_hidden_files_included_by_default() {
        let compiled = CompiledFilters::default();
        assert!(compiled.should_include(Path::new(".env")));
        assert!(compiled.should_include(Path::new("sub/.hidden.txt")));
    }

    #[test]
    fn test_hidden_files_excluded_when_disabled() {
        let compiled = filters_from("[filters]\nenable_hidden_files = false");
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.should_include(Path::new("photo.jpg")));
    }

    #[test]
    fn test_exclude_filenames_and_extensions() {
        let compiled = filters_from(
            r#"
            [filters.exclude]
            filenames = ["Thumbs.db"]
            extensions = [".bak", "TMP"]
            "#,
        );

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("sub/Thumbs.db")));
        assert!(!compiled.should_include(Path::new("notes.BAK")));
        assert!(!compiled.should_include(Path::new("scratch.tmp")));
        assert!(compiled.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_glob_on_relative_path() {
        let compiled = filters_from(
            r#"
            [filters.exclude]
            patterns = ["node_modules/**", "**/cache/**"]
            "#,
        );

        assert!(!compiled.should_include(Path::new("node_modules/pkg/index.js")));
        assert!(!compiled.should_include(Path::new("app/cache/data.bin")));
        assert!(compiled.should_include(Path::new("app/my_cache/data.bin")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let compiled = filters_from(
            r#"
            [filters.exclude]
            regex = ['^draft_.*\.txt$']
            "#,
        );

        assert!(!compiled.should_include(Path::new("draft_one.txt")));
        assert!(!compiled.should_include(Path::new("sub/draft_two.txt")));
        assert!(compiled.should_include(Path::new("final.txt")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters_from(
            r#"
            [filters]
            enable_hidden_files = false

            [filters.exclude]
            extensions = ["log"]

            [filters.include]
            patterns = [".keep", "important.log"]
            "#,
        );

        assert!(compiled.should_include(Path::new(".keep")));
        assert!(compiled.should_include(Path::new("important.log")));
        assert!(!compiled.should_include(Path::new(".other")));
        assert!(!compiled.should_include(Path::new("debug.log")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = Config::parse("[filters.exclude]\nregex = [\"[invalid(\"]").unwrap();
        assert!(matches!(
            bad_regex.filters.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = Config::parse("[filters.exclude]\npatterns = [\"[invalid\"]").unwrap();
        assert!(matches!(
            bad_glob.filters.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
