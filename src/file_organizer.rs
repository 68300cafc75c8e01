/// The organizer: sorts a directory tree into category subfolders.
///
/// One run enumerates every regular file under the root, hashes each one,
/// skips content already seen in this run, picks a category (by extension or,
/// optionally, by classifying extracted text) and moves the file into
/// `root/<category>` without ever overwriting an existing name.
use crate::classifier::{Classifier, sanitize_label};
use crate::config::CompiledFilters;
use crate::extract::{ExtractLimits, ExtractorRegistry};
use crate::file_category::{CategoryTable, DEFAULT_CATCH_ALL, file_extension};
use crate::hashing;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_MAX_FILES: usize = 200;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;
pub const DEFAULT_CHAR_LIMIT: usize = 512;
pub const DEFAULT_PAGE_LIMIT: usize = 2;

/// Parent folder for content-classified files (`Documents/<label>`).
pub const CONTENT_PARENT_CATEGORY: &str = "Documents";

/// Errors that abort a whole run. Per-file problems never do; they end up in
/// [`RunResult::skipped`].
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Invalid root directory {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },
}

/// A file could not be moved into its category folder.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move to {}: {source}", destination.display())]
    Transfer {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings for content-based classification.
#[derive(Debug, Clone)]
pub struct ContentOptions {
    /// Extensions eligible for classification; everything else uses its extension category.
    pub extensions: HashSet<String>,
    pub confidence_threshold: f32,
    pub limits: ExtractLimits,
    /// Category for low-confidence results. May be nested (`Others/Unsorted`).
    pub fallback_category: String,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            extensions: ["txt", "md", "pdf"].into_iter().map(String::from).collect(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            limits: ExtractLimits {
                char_limit: DEFAULT_CHAR_LIMIT,
                page_limit: DEFAULT_PAGE_LIMIT,
            },
            fallback_category: DEFAULT_CATCH_ALL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrganizerOptions {
    pub max_files: usize,
    pub categories: CategoryTable,
    pub filters: CompiledFilters,
    /// Content mode also needs a classifier; without one the organizer sorts by extension.
    pub use_content_classification: bool,
    pub content: ContentOptions,
    /// Plan every move without touching the filesystem.
    pub dry_run: bool,
}

impl Default for OrganizerOptions {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            categories: CategoryTable::standard(),
            filters: CompiledFilters::default(),
            use_content_classification: false,
            content: ContentOptions::default(),
            dry_run: false,
        }
    }
}

/// One enumerated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub relative_path: PathBuf,
    /// Exact on-disk name; destinations are built from this.
    pub file_name: OsString,
    /// `file_name` for messages, with invalid UTF-8 replaced.
    pub display_name: String,
    pub extension: Option<String>,
    /// Absent until hashed, and when hashing fails.
    pub hash: Option<String>,
}

impl FileRecord {
    pub fn new(path: PathBuf, relative_path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_default();
        let display_name = file_name.to_string_lossy().into_owned();
        let extension = file_extension(&path);
        Self {
            path,
            relative_path,
            file_name,
            display_name,
            extension,
            hash: None,
        }
    }
}

/// Content hash to the name of the file that first claimed it, for one run.
#[derive(Debug, Default)]
pub struct SeenHashIndex {
    seen: HashMap<String, String>,
}

impl SeenHashIndex {
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn original_for(&self, hash: &str) -> Option<&str> {
        self.seen.get(hash).map(String::as_str)
    }

    /// Records the first claimant of a hash; later registrations do not replace it.
    pub fn register(&mut self, hash: String, file_name: String) {
        self.seen.entry(hash).or_insert(file_name);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Terminal state of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Moved,
    Duplicate,
    MoveFailed,
    HashFailed,
    LimitExceeded,
}

/// Passed to the progress callback once a file's outcome is decided.
#[derive(Debug)]
pub struct ProgressEvent<'a> {
    /// 1-based position in enumeration order.
    pub position: usize,
    pub total: usize,
    pub record: &'a FileRecord,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate { original: String },
    LimitExceeded,
    HashError { cause: String },
    MoveError { cause: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { original } => write!(f, "duplicate of {}", original),
            Self::LimitExceeded => write!(f, "exceeded max files limit"),
            Self::HashError { cause } => write!(f, "hashing error: {}", cause),
            Self::MoveError { cause } => write!(f, "error: {}", cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedEntry {
    /// Relative to the root, as enumerated.
    #[serde(serialize_with = "serialize_path_lossy")]
    pub source: PathBuf,
    pub category: String,
    /// Relative to the root, e.g. `Documents/report_1.txt`.
    #[serde(serialize_with = "serialize_path_lossy")]
    pub destination: PathBuf,
}

impl fmt::Display for MovedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            self.source.display(),
            self.destination.display()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub source: PathBuf,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source.display(), self.reason)
    }
}

/// Paths in JSON output are strings even when a name is not valid UTF-8.
fn serialize_path_lossy<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Everything one run did, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    #[serde(serialize_with = "serialize_path_lossy")]
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub moved: Vec<MovedEntry>,
    pub skipped: Vec<SkippedEntry>,
}

impl RunResult {
    fn new(root: PathBuf, dry_run: bool) -> Self {
        Self {
            root,
            started_at: Utc::now(),
            dry_run,
            moved: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, record: &FileRecord, reason: SkipReason) {
        self.skipped.push(SkippedEntry {
            source: record.relative_path.clone(),
            reason,
        });
    }

    /// True when the run neither moved nor skipped anything.
    pub fn is_empty(&self) -> bool {
        self.moved.is_empty() && self.skipped.is_empty()
    }

    /// Moved files per category, sorted by category name.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.moved {
            *counts.entry(entry.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Sorts directory trees into category folders.
///
/// The seen-hash index lives here and is cleared at the start of every run,
/// so duplicates are only ever detected within one run.
///
/// # Examples
///
/// ```no_run
/// use filesort::file_organizer::{Organizer, OrganizerOptions};
/// use std::path::Path;
///
/// let mut organizer = Organizer::new(OrganizerOptions::default());
/// let result = organizer.organize(Path::new("/path/to/downloads")).unwrap();
/// for entry in &result.moved {
///     println!("{}", entry);
/// }
/// ```
pub struct Organizer {
    options: OrganizerOptions,
    classifier: Option<Box<dyn Classifier>>,
    extractors: ExtractorRegistry,
    seen: SeenHashIndex,
}

impl Organizer {
    pub fn new(options: OrganizerOptions) -> Self {
        Self {
            options,
            classifier: None,
            extractors: ExtractorRegistry::default(),
            seen: SeenHashIndex::default(),
        }
    }

    /// Injects the classifier used in content mode.
    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Replaces the default text extractors.
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn options(&self) -> &OrganizerOptions {
        &self.options
    }

    /// Organizes `root` in place.
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::InvalidRoot` if `root` is not a readable
    /// directory. Nothing is touched in that case.
    pub fn organize(&mut self, root: &Path) -> Result<RunResult, OrganizeError> {
        self.organize_with_progress(root, |_| {})
    }

    /// Organizes `root`, calling `on_progress` after each file's outcome is decided.
    pub fn organize_with_progress<F>(
        &mut self,
        root: &Path,
        mut on_progress: F,
    ) -> Result<RunResult, OrganizeError>
    where
        F: FnMut(&ProgressEvent<'_>),
    {
        if !root.is_dir() {
            return Err(OrganizeError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        self.seen.clear();
        let records = self.enumerate(root)?;
        let total = records.len();
        let mut result = RunResult::new(root.to_path_buf(), self.options.dry_run);
        let mut claimed: HashSet<PathBuf> = HashSet::new();

        info!(
            root = %root.display(),
            files = total,
            max_files = self.options.max_files,
            dry_run = self.options.dry_run,
            "organizing"
        );

        for (index, mut record) in records.into_iter().enumerate() {
            let outcome = if index >= self.options.max_files {
                result.skip(&record, SkipReason::LimitExceeded);
                Outcome::LimitExceeded
            } else {
                self.process(root, &mut record, &mut claimed, &mut result)
            };

            on_progress(&ProgressEvent {
                position: index + 1,
                total,
                record: &record,
                outcome,
            });
        }

        info!(
            moved = result.moved.len(),
            skipped = result.skipped.len(),
            "organize complete"
        );
        Ok(result)
    }

    /// Lists every regular file under `root` in a stable order, leaving out
    /// top-level category folders and filtered files.
    fn enumerate(&self, root: &Path) -> Result<Vec<FileRecord>, OrganizeError> {
        let reserved = self.reserved_folders();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() == 1
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| reserved.contains(name)))
            });

        let mut records = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(OrganizeError::InvalidRoot {
                        path: root.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = entry
                .path()
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());
            if !self.options.filters.should_include(&relative_path) {
                debug!(path = %relative_path.display(), "excluded by filters");
                continue;
            }

            records.push(FileRecord::new(entry.into_path(), relative_path));
        }

        Ok(records)
    }

    /// Top-level folder names this organizer writes into.
    fn reserved_folders(&self) -> HashSet<String> {
        let mut reserved: HashSet<String> = self
            .options
            .categories
            .category_names()
            .map(String::from)
            .collect();

        if self.options.use_content_classification {
            reserved.insert(CONTENT_PARENT_CATEGORY.to_string());
            if let Some(first) = self.options.content.fallback_category.split('/').next() {
                reserved.insert(first.to_string());
            }
        }
        reserved
    }

    /// Hash, dedupe, classify, resolve and move one file.
    fn process(
        &mut self,
        root: &Path,
        record: &mut FileRecord,
        claimed: &mut HashSet<PathBuf>,
        result: &mut RunResult,
    ) -> Outcome {
        let hash = match hashing::hash_file(&record.path) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %record.relative_path.display(), error = %e, "hashing failed");
                result.skip(
                    record,
                    SkipReason::HashError {
                        cause: e.source.to_string(),
                    },
                );
                return Outcome::HashFailed;
            }
        };
        record.hash = Some(hash.clone());

        if let Some(original) = self.seen.original_for(&hash) {
            debug!(
                path = %record.relative_path.display(),
                original,
                "skipping duplicate"
            );
            let original = original.to_string();
            result.skip(record, SkipReason::Duplicate { original });
            return Outcome::Duplicate;
        }

        let category = self.categorize(record);
        let category_dir = category_path(root, &category);
        let destination = resolve_destination(&category_dir, &record.file_name, claimed);

        let moved = if self.options.dry_run {
            Ok(())
        } else {
            move_file(&record.path, &category_dir, &destination)
        };

        match moved {
            Ok(()) => {
                let relative_destination = destination
                    .strip_prefix(root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| destination.clone());
                if self.options.dry_run {
                    info!(
                        source = %record.relative_path.display(),
                        destination = %relative_destination.display(),
                        "planned"
                    );
                } else {
                    info!(
                        source = %record.relative_path.display(),
                        destination = %relative_destination.display(),
                        "moved"
                    );
                }

                claimed.insert(destination);
                self.seen.register(hash, record.display_name.clone());
                result.moved.push(MovedEntry {
                    source: record.relative_path.clone(),
                    category,
                    destination: relative_destination,
                });
                Outcome::Moved
            }
            Err(e) => {
                warn!(path = %record.relative_path.display(), error = %e, "move failed");
                result.skip(
                    record,
                    SkipReason::MoveError {
                        cause: e.to_string(),
                    },
                );
                Outcome::MoveFailed
            }
        }
    }

    /// Picks the category for a file.
    ///
    /// Content mode applies only to configured extensions and only when a
    /// classifier is present. Extraction or classifier failures, and empty
    /// text, fall back to the extension category.
    fn categorize(&self, record: &FileRecord) -> String {
        let by_extension = self
            .options
            .categories
            .categorize(record.extension.as_deref())
            .to_string();

        if !self.options.use_content_classification {
            return by_extension;
        }
        let Some(classifier) = self.classifier.as_deref() else {
            return by_extension;
        };
        let Some(ext) = record.extension.as_deref() else {
            return by_extension;
        };
        let content = &self.options.content;
        if !content.extensions.contains(ext) {
            return by_extension;
        }

        let text = match self.extractors.extract(&record.path, ext, content.limits) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!(path = %record.relative_path.display(), "no text to classify");
                return by_extension;
            }
            Err(e) => {
                warn!(path = %record.relative_path.display(), error = %e, "text extraction failed");
                return by_extension;
            }
        };

        match classifier.classify(&text) {
            Ok(classification) if classification.confidence >= content.confidence_threshold => {
                match sanitize_label(&classification.label) {
                    Some(label) => {
                        debug!(
                            path = %record.relative_path.display(),
                            label = %label,
                            confidence = classification.confidence,
                            "classified"
                        );
                        format!("{}/{}", CONTENT_PARENT_CATEGORY, label)
                    }
                    None => content.fallback_category.clone(),
                }
            }
            Ok(classification) => {
                debug!(
                    path = %record.relative_path.display(),
                    confidence = classification.confidence,
                    "low confidence, using fallback"
                );
                content.fallback_category.clone()
            }
            Err(e) => {
                warn!(path = %record.relative_path.display(), error = %e, "classifier failed");
                by_extension
            }
        }
    }
}

/// `root/<category>`, where a category may span several folders (`Documents/Invoices`).
fn category_path(root: &Path, category: &str) -> PathBuf {
    category
        .split('/')
        .fold(root.to_path_buf(), |path, component| path.join(component))
}

/// Picks a free destination for `file_name` inside `dir`.
///
/// The original name is used if it is free; otherwise `_1`, `_2`, … are
/// appended before the extension until a name is free both on disk and among
/// destinations already `claimed` in this run. Names are handled as raw OS
/// strings, so bytes that are not valid UTF-8 survive unchanged.
pub fn resolve_destination(
    dir: &Path,
    file_name: &OsStr,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    let is_free = |candidate: &Path| {
        !claimed.contains(candidate) && fs::symlink_metadata(candidate).is_err()
    };

    let candidate = dir.join(file_name);
    if is_free(&candidate) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name.file_stem().unwrap_or(file_name);
    let ext = name.extension();

    let mut counter = 1usize;
    loop {
        let mut suffixed = stem.to_os_string();
        suffixed.push(format!("_{}", counter));
        if let Some(ext) = ext {
            suffixed.push(".");
            suffixed.push(ext);
        }

        let candidate = dir.join(suffixed);
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Moves `source` to `destination`, creating `dir` first.
///
/// Tries an atomic rename; if that fails (e.g. across filesystems) the file
/// is copied, size-checked, and the source removed. A failed fallback leaves
/// no partial copy behind.
fn move_file(source: &Path, dir: &Path, destination: &Path) -> Result<(), MoveError> {
    fs::create_dir_all(dir).map_err(|source| MoveError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    fs::rename(source, destination)
        .or_else(|rename_err| {
            debug!(error = %rename_err, "rename failed, falling back to copy");
            copy_then_remove(source, destination)
        })
        .map_err(|source| MoveError::Transfer {
            destination: destination.to_path_buf(),
            source,
        })
}

fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let expected = fs::metadata(source)?.len();
    let discard = |err: io::Error| {
        let _ = fs::remove_file(destination);
        err
    };

    fs::copy(source, destination).map_err(discard)?;

    let actual = fs::metadata(destination).map_err(discard)?.len();
    if actual != expected {
        return Err(discard(io::Error::other(format!(
            "copy verification failed: source {} bytes, destination {} bytes",
            expected, actual
        ))));
    }

    fs::remove_file(source).map_err(discard)
}
