//! Offline keyword classifier.
//!
//! Scores each category by how often its keywords appear in the document
//! and picks the best one. Used with `--offline` and in tests in place of a
//! live service.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{Classifier, ClassifyError, RawClassification};
use crate::domain::document::first_heading;

/// Keyword rule classifier
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    /// (category, keywords) in priority order; earlier rules win ties
    rules: Vec<(String, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        let rules: &[(&str, &[&str])] = &[
            ("memory", &["ownership", "borrow", "lifetime", "reference", "move semantics", "drop", "allocat"]),
            ("error-handling", &["result", "option", "unwrap", "error", "panic"]),
            ("concurrency", &["thread", "async", "await", "channel", "mutex", "arc<", "tokio"]),
            ("unsafe", &["unsafe", "ffi", "raw pointer", "transmute", "extern"]),
            ("testing", &["#[test]", "unit test", "integration test", "benchmark", "assert"]),
            ("toolchain", &["cargo", "rustup", "rustc", "crate", "toolchain"]),
            ("stdlib", &["vec", "hashmap", "iterator", "collection", "string", "standard library"]),
            ("syntax-and-patterns", &["match", "pattern", "enum", "struct", "trait", "syntax"]),
            ("rust-compiler-internals", &["mir", "hir", "llvm", "compiler", "codegen"]),
        ];

        Self::new(
            rules
                .iter()
                .map(|(cat, kws)| (cat.to_string(), kws.iter().map(|k| k.to_string()).collect())),
        )
    }
}

impl KeywordClassifier {
    /// Build from explicit rules
    pub fn new(rules: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(cat, kws)| (cat, kws.into_iter().map(|k| k.to_lowercase()).collect()))
                .collect(),
        }
    }

    /// Build from a config map; categories are taken in name order
    pub fn from_map(rules: &BTreeMap<String, Vec<String>>) -> Self {
        Self::new(rules.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Best-scoring category for `text`, if any keyword matched
    pub fn best_category(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;

        for (category, keywords) in &self.rules {
            let score: usize = keywords.iter().map(|k| lowered.matches(k.as_str()).count()).sum();
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((category.as_str(), score));
            }
        }

        best.map(|(c, _)| c)
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keywords"
    }

    async fn classify(&self, text: &str) -> Result<RawClassification, ClassifyError> {
        Ok(RawClassification {
            category: self.best_category(text).map(str::to_string),
            // Without a heading the document's own title stands
            title: first_heading(text),
            filename: None,
        })
    }

    async fn health_check(&self) -> Result<(), ClassifyError> {
        Ok(())
    }
}
