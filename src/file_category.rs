/// Extension-based categorization for organizing files.
///
/// A [`CategoryTable`] is an ordered list of [`CategoryRule`]s plus a catch-all
/// category for everything no rule claims. Lookup walks the rules in insertion
/// order and returns the first match.
///
/// # Examples
///
/// ```
/// use filesort::file_category::CategoryTable;
///
/// let table = CategoryTable::standard();
/// assert_eq!(table.categorize(Some("png")), "Images");
/// assert_eq!(table.categorize(Some("PDF")), "Documents");
/// assert_eq!(table.categorize(Some("xyz")), "Others");
/// assert_eq!(table.categorize(None), "Others");
/// ```
use crate::config::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Name of the catch-all category when none is configured.
pub const DEFAULT_CATCH_ALL: &str = "Others";

/// A named category and the lowercase extensions it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    name: String,
    extensions: HashSet<String>,
}

impl CategoryRule {
    /// Creates a rule, normalizing every extension (leading dot stripped, lowercased).
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extensions(&self) -> &HashSet<String> {
        &self.extensions
    }

    /// Returns true if this rule claims the given extension.
    pub fn matches(&self, ext: &str) -> bool {
        self.extensions.contains(&normalize_extension(ext))
    }
}

/// Ordered category rules with a catch-all fallback.
///
/// Extensions are disjoint across rules; [`CategoryTable::new`] rejects a
/// table in which two rules claim the same extension.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    rules: Vec<CategoryRule>,
    catch_all: String,
}

impl CategoryTable {
    /// Builds a validated table.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidCategoryName` if a rule name (or the
    /// catch-all) is not a single folder name, and
    /// `ConfigError::OverlappingExtension` if two rules share an extension.
    pub fn new(rules: Vec<CategoryRule>, catch_all: impl Into<String>) -> Result<Self, ConfigError> {
        let catch_all = catch_all.into();
        validate_category_name(&catch_all)?;

        let mut owners: HashMap<&str, &str> = HashMap::new();
        for rule in &rules {
            validate_category_name(&rule.name)?;
            for ext in &rule.extensions {
                if let Some(first) = owners.insert(ext.as_str(), rule.name.as_str()) {
                    return Err(ConfigError::OverlappingExtension {
                        extension: ext.clone(),
                        first: first.to_string(),
                        second: rule.name.clone(),
                    });
                }
            }
        }

        Ok(Self { rules, catch_all })
    }

    /// The built-in table: Documents, Images, Videos, Audio, and `Others` as catch-all.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                CategoryRule::new(
                    "Documents",
                    ["txt", "doc", "docx", "pdf", "xls", "xlsx", "ppt", "pptx"],
                ),
                CategoryRule::new("Images", ["jpg", "jpeg", "png", "gif", "bmp", "tiff"]),
                CategoryRule::new("Videos", ["mp4", "avi", "mkv", "mov", "wmv"]),
                CategoryRule::new("Audio", ["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma"]),
            ],
            catch_all: DEFAULT_CATCH_ALL.to_string(),
        }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn catch_all(&self) -> &str {
        &self.catch_all
    }

    /// Returns the category for an extension, or the catch-all if no rule claims it.
    pub fn categorize(&self, ext: Option<&str>) -> &str {
        ext.and_then(|ext| self.rules.iter().find(|rule| rule.matches(ext)))
            .map(CategoryRule::name)
            .unwrap_or(self.catch_all.as_str())
    }

    /// Every folder name this table can produce, rules first, catch-all last.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .map(CategoryRule::name)
            .chain(std::iter::once(self.catch_all.as_str()))
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Strips a leading dot and lowercases an extension.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Returns the normalized extension of a path, if it has one.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .filter(|ext| !ext.is_empty())
}

/// Category names become folder names, so each one must be a plain path component.
pub(crate) fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed != name
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);

    if invalid {
        return Err(ConfigError::InvalidCategoryName(name.to_string()));
    }
    Ok(())
}
