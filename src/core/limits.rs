//! Input limits and ignore rules for filing.
//!
//! Bounds what is sent to the classifier and what is scanned:
//! - Document size
//! - Classifier input length (longer text is truncated, not rejected)
//! - Ignore patterns for folders that are not part of the docs

use std::borrow::Cow;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Note appended to truncated classifier input
pub const TRUNCATION_NOTE: &str = "\n\n[Content truncated...]";

/// Limits applied while filing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingLimits {
    /// Characters of a document sent to the classifier (default: 50 000)
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Largest document accepted for filing (default: 10MB)
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,

    /// Glob patterns (relative to the docs root, or a single path
    /// component) excluded from scans
    #[serde(default = "default_ignore")]
    pub ignore_patterns: Vec<String>,
}

fn default_max_input_chars() -> usize {
    50_000
}
fn default_max_document_bytes() -> u64 {
    10 * 1024 * 1024
} // 10MB

fn default_ignore() -> Vec<String> {
    vec!["repo".to_string(), "__pycache__".to_string(), ".*".to_string()]
}

impl Default for FilingLimits {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_document_bytes: default_max_document_bytes(),
            ignore_patterns: default_ignore(),
        }
    }
}

impl FilingLimits {
    /// Check a path relative to the docs root against the ignore patterns.
    /// A pattern matches the whole path or any single component of it.
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let rel_path = rel_path.trim_matches('/');
        self.ignore_patterns.iter().any(|p| match Pattern::new(p) {
            Ok(pattern) => {
                pattern.matches(rel_path) || rel_path.split('/').any(|c| pattern.matches(c))
            }
            Err(_) => false,
        })
    }

    /// Validate a document body before filing
    pub fn validate_document(&self, body: &str) -> Result<(), LimitViolation> {
        if body.trim().is_empty() {
            return Err(LimitViolation::EmptyBody);
        }

        let size = body.len() as u64;
        if size > self.max_document_bytes {
            return Err(LimitViolation::MaxDocumentBytes {
                actual: size,
                limit: self.max_document_bytes,
            });
        }

        Ok(())
    }

    /// Cut classifier input to `max_input_chars`, on a char boundary
    pub fn truncate_for_classifier<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match text.char_indices().nth(self.max_input_chars) {
            Some((idx, _)) => Cow::Owned(format!("{}{}", &text[..idx], TRUNCATION_NOTE)),
            None => Cow::Borrowed(text),
        }
    }
}

/// Limit violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitViolation {
    #[error("Document body is empty")]
    EmptyBody,

    #[error("Document too large: {actual} > {limit} bytes")]
    MaxDocumentBytes { actual: u64, limit: u64 },
}
