//! Topic categories.
//!
//! A category is a directory under the docs root. Its name is a slug
//! (`error-handling`); its navigation label is derived from the slug unless
//! overridden (`stdlib` -> `Standard Library`).

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::document::capitalize;

/// Category used when classification produces nothing usable
pub const DEFAULT_CATEGORY: &str = "misc";

/// Longest accepted category slug
pub const MAX_CATEGORY_LEN: usize = 64;

/// Invalid category name
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid category name: {0:?}")]
pub struct InvalidCategory(pub String);

/// A validated topic category name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Accept an already-slugged name
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidCategory> {
        let name = name.into();
        if is_valid_slug(&name) {
            Ok(Self(name))
        } else {
            Err(InvalidCategory(name))
        }
    }

    /// Normalize a free-form proposal (e.g. `Error Handling`, `error_handling`)
    /// into a category, if anything valid remains.
    pub fn from_proposal(raw: &str) -> Option<Self> {
        let slug = slugify(&raw.replace('_', "-"));
        Self::new(slug).ok()
    }

    /// The fallback category
    pub fn fallback() -> Self {
        Self(DEFAULT_CATEGORY.to_string())
    }

    /// Raw slug
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Navigation label, honoring overrides
    pub fn label(&self, overrides: &HashMap<String, String>) -> String {
        if let Some(label) = overrides.get(&self.0) {
            return label.clone();
        }
        self.0
            .split('-')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Category {
    type Error = InvalidCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.0
    }
}

/// Default label overrides for categories whose slug reads badly
pub fn default_labels() -> HashMap<String, String> {
    [
        ("stdlib", "Standard Library"),
        ("rust-compiler-internals", "Compiler Internals"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_CATEGORY_LEN
        && s.split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
}

/// Lowercase, drop everything but word characters, whitespace and hyphens,
/// then collapse whitespace/hyphen runs into single hyphens.
pub fn slugify(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;

    for c in lowered.chars() {
        if c.is_whitespace() || c == '-' {
            pending_sep = true;
        } else if c.is_alphanumeric() || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c);
        }
    }

    out
}

/// Result of classifying a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    /// Category the document belongs to
    pub category: Category,

    /// Title to file the document under
    pub title: String,

    /// Suggested file name, if the classifier offered a usable one
    pub filename: Option<String>,

    /// Whether the category does not exist yet
    pub is_new: bool,

    /// Whether the default category was used because nothing usable came back
    pub fell_back: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Borrow Checker Basics"), "borrow-checker-basics");
        assert_eq!(slugify("Ownership 101"), "ownership-101");
        assert_eq!(slugify("  What's new in Rust 1.80?  "), "whats-new-in-rust-180");
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("--leading and trailing--"), "leading-and-trailing");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_category_validation() {
        assert!(Category::new("error-handling").is_ok());
        assert!(Category::new("Error Handling").is_err());
        assert!(Category::new("a--b").is_err());
        assert!(Category::new("").is_err());
        assert!(Category::new("x".repeat(MAX_CATEGORY_LEN + 1)).is_err());
    }

    #[test]
    fn test_category_from_proposal() {
        assert_eq!(
            Category::from_proposal("Error Handling").unwrap().as_str(),
            "error-handling"
        );
        assert_eq!(
            Category::from_proposal("syntax_and_patterns").unwrap().as_str(),
            "syntax-and-patterns"
        );
        assert!(Category::from_proposal("???").is_none());
        assert!(Category::from_proposal("日本語").is_none());
    }

    #[test]
    fn test_category_label() {
        let labels = default_labels();
        assert_eq!(Category::new("stdlib").unwrap().label(&labels), "Standard Library");
        assert_eq!(
            Category::new("error-handling").unwrap().label(&labels),
            "Error Handling"
        );
    }

    #[test]
    fn test_category_serde() {
        let c: Category = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(c.as_str(), "memory");
        assert!(serde_json::from_str::<Category>("\"Not Valid\"").is_err());
    }
}
