//! Adapter interfaces for external systems.
//!
//! Adapters put the collaborators behind narrow traits: a text
//! understanding service that names a document's category and title, and a
//! version control system that syncs and publishes the docs tree.

pub mod anthropic;
pub mod fabric;
pub mod git;
pub mod rules;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

pub use anthropic::AnthropicClassifier;
pub use fabric::FabricClassifier;
pub use git::GitCli;
pub use rules::KeywordClassifier;

/// Topics suggested to text-understanding classifiers
pub const SUGGESTED_TOPICS: &[(&str, &str)] = &[
    ("toolchain", "rustup, rustc, cargo, build system"),
    ("syntax-and-patterns", "keywords, syntax, pattern matching"),
    ("memory", "ownership, borrowing, lifetimes, references"),
    ("stdlib", "standard library, collections, iterators"),
    ("error-handling", "Result, Option, error types"),
    ("concurrency", "threads, async, channels"),
    ("unsafe", "unsafe Rust, FFI, raw pointers"),
    ("testing", "unit tests, integration tests, benchmarks"),
    ("rust-compiler-internals", "compiler architecture, MIR, LLVM"),
];

/// What a classifier said about a document, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawClassification {
    /// Proposed category name, free-form
    pub category: Option<String>,

    /// Proposed title
    pub title: Option<String>,

    /// Proposed file name
    pub filename: Option<String>,
}

/// Classifier failures
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    /// The service or binary could not be reached or refused the request
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured wait
    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    /// An answer came back but could not be read
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
}

impl ClassifyError {
    /// Whether the whole batch has to stop
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ClassifyError::Malformed(_))
    }
}

/// Trait for text-understanding classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Human-readable classifier name
    fn name(&self) -> &str;

    /// Propose a category and title for markdown text
    async fn classify(&self, text: &str) -> Result<RawClassification, ClassifyError>;

    /// Check the collaborator is usable before a batch starts
    async fn health_check(&self) -> Result<(), ClassifyError>;
}

/// Result of syncing the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    Updated,
}

/// Result of publishing filed documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    NothingToCommit,
    Pushed,
}

/// Trait for the version control collaborator
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Bring the working tree up to date
    async fn pull(&self) -> Result<PullOutcome>;

    /// Stage `paths`, commit with `message` and push
    async fn publish(&self, paths: &[PathBuf], message: &str) -> Result<PublishOutcome>;
}

/// Instruction sent along with the document text
pub fn build_prompt(text: &str) -> String {
    let topics: String = SUGGESTED_TOPICS
        .iter()
        .map(|(name, about)| format!("   - {} ({})\n", name, about))
        .collect();

    format!(
        "Analyze this Rust-related markdown document and categorize it.\n\n\
         <document>\n{text}\n</document>\n\n\
         Determine:\n\
         1. The main topic category. Choose from existing topics or suggest a new one:\n\
         {topics}   - Or suggest a new topic name (lowercase, hyphenated)\n\n\
         2. A clear, concise title for the document (if the existing H1 is good, keep it)\n\n\
         3. A suggested filename (lowercase, hyphenated, .md extension)\n\n\
         Respond in this exact format:\n\
         TOPIC: <topic-name>\n\
         TITLE: <document-title>\n\
         FILENAME: <suggested-filename.md>\n"
    )
}

/// Parse a `TOPIC:` / `TITLE:` / `FILENAME:` reply.
///
/// A reply with none of the three fields is malformed. Missing individual
/// fields are left as `None` for the caller to fill in.
pub fn parse_classification(reply: &str) -> Result<RawClassification, ClassifyError> {
    let mut raw = RawClassification::default();

    for line in reply.lines() {
        let line = line.trim().trim_start_matches(['*', '-', ' ']);
        let field = |prefix: &str| {
            line.strip_prefix(prefix)
                .map(|v| {
                    v.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '"'))
                        .to_string()
                })
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = field("TOPIC:") {
            raw.category.get_or_insert(v.to_lowercase());
        } else if let Some(v) = field("TITLE:") {
            raw.title.get_or_insert(v);
        } else if let Some(v) = field("FILENAME:") {
            raw.filename.get_or_insert(v);
        }
    }

    if raw.category.is_none() && raw.title.is_none() && raw.filename.is_none() {
        let preview: String = reply.chars().take(80).collect();
        return Err(ClassifyError::Malformed(format!(
            "no TOPIC/TITLE/FILENAME fields in reply: {:?}",
            preview
        )));
    }

    Ok(raw)
}
