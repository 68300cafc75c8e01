//! The content classifier capability.
//!
//! The organizer only sees the [`Classifier`] trait: text in, label and
//! confidence out. Any model can sit behind it. [`KeywordClassifier`] is a
//! small built-in implementation driven by configured keyword lists, and any
//! `Fn(&str) -> Result<Classification, ClassifierError>` closure works too.

use serde::Serialize;
use thiserror::Error;

/// The top label for a piece of text and how sure the classifier is about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: String,
    /// In `0.0..=1.0`.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier has no labels configured")]
    NoLabels,

    #[error("Classification failed: {0}")]
    Failed(String),
}

pub trait Classifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}

impl<F> Classifier for F
where
    F: Fn(&str) -> Result<Classification, ClassifierError>,
{
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        self(text)
    }
}

/// Scores each label by the share of its keywords present in the text.
///
/// Matching is case-insensitive substring matching. On a tie the label
/// added first wins.
///
/// # Examples
///
/// ```
/// use filesort::classifier::{Classifier, KeywordClassifier};
///
/// let classifier = KeywordClassifier::new()
///     .with_label("Invoices", ["invoice", "amount due"])
///     .with_label("Recipes", ["ingredients", "bake"]);
///
/// let result = classifier.classify("INVOICE #42, amount due: $10").unwrap();
/// assert_eq!(result.label, "Invoices");
/// assert_eq!(result.confidence, 1.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    labels: Vec<(String, Vec<String>)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label<I, S>(mut self, label: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        self.labels.push((label.into(), keywords));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        let haystack = text.to_lowercase();
        let mut best: Option<Classification> = None;

        for (label, keywords) in &self.labels {
            let confidence = if keywords.is_empty() {
                0.0
            } else {
                let hits = keywords
                    .iter()
                    .filter(|keyword| haystack.contains(keyword.as_str()))
                    .count();
                hits as f32 / keywords.len() as f32
            };

            if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                best = Some(Classification::new(label.clone(), confidence));
            }
        }

        best.ok_or(ClassifierError::NoLabels)
    }
}

/// Turns a classifier label into a single safe folder name.
///
/// Path separators and control characters become `_`; surrounding
/// whitespace and dots are trimmed. Returns `None` if nothing is left.
pub fn sanitize_label(label: &str) -> Option<String> {
    let replaced: String = label
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
