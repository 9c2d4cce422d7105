//! Writing a classified document into its category directory.
//!
//! File names come from the title slug. New files are always created with
//! create-new semantics, so an existing file is never overwritten unless the
//! caller names it explicitly as the document being replaced.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::limits::{FilingLimits, LimitViolation};
use crate::domain::{slugify, Category, Document};

/// Stem used when a title slugs to nothing
pub const UNTITLED_STEM: &str = "untitled";

/// Longest file stem before the numeric suffix
const MAX_STEM_LEN: usize = 80;

/// Suffixes tried before giving up on a name
const MAX_SUFFIX: usize = 10_000;

/// What to do when the preferred file name is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Try `<slug>-1.md`, `<slug>-2.md`, ...
    #[default]
    Suffix,
    /// Report the conflict and write nothing
    Fail,
}

/// Options for a single filing
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    /// Allow rewriting the `replace` target in place
    pub overwrite: bool,

    /// Existing file holding the same document
    pub replace: Option<PathBuf>,

    /// Name collision policy
    pub on_conflict: ConflictPolicy,

    /// Preferred file stem, used instead of the title slug
    pub filename: Option<String>,
}

/// Where a document ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filed {
    /// Path of the written file
    pub path: PathBuf,

    /// Whether an existing file was rewritten
    pub replaced: bool,
}

/// Filing failures
#[derive(Debug, Error)]
pub enum FilingError {
    #[error("File already exists: {}", path.display())]
    Conflict { path: PathBuf },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Limit(#[from] LimitViolation),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FilingError + '_ {
    move |source| FilingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File stem for a title: slug, capped in length, never empty
pub fn file_stem(title: &str) -> String {
    let slug = slugify(title);
    let capped: String = slug.chars().take(MAX_STEM_LEN).collect();
    let capped = capped.trim_end_matches('-');

    if capped.is_empty() {
        UNTITLED_STEM.to_string()
    } else {
        capped.to_string()
    }
}

fn candidate_name(stem: &str, n: usize) -> String {
    if n == 0 {
        format!("{}.md", stem)
    } else {
        format!("{}-{}.md", stem, n)
    }
}

/// Write `content` to `path` only if nothing exists there yet.
/// Returns `Ok(false)` when the path is taken.
async fn create_new(path: &Path, content: &str) -> Result<bool, FilingError> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(io_error(path)(e)),
    };

    file.write_all(content.as_bytes()).await.map_err(io_error(path))?;
    file.flush().await.map_err(io_error(path))?;
    Ok(true)
}

/// File `doc` under `category` inside `docs_dir`.
///
/// The written content has its H1 set to the document title and carries
/// the source and processing markers exactly once.
pub async fn file_document(
    docs_dir: &Path,
    doc: &Document,
    category: &Category,
    options: &FileOptions,
    limits: &FilingLimits,
) -> Result<Filed, FilingError> {
    limits.validate_document(&doc.body)?;
    let content = doc.render();

    if let Some(ref target) = options.replace {
        if options.overwrite {
            fs::write(target, &content).await.map_err(io_error(target))?;
            info!("Replaced {}", target.display());
            return Ok(Filed {
                path: target.clone(),
                replaced: true,
            });
        }
        debug!("Not replacing {} without overwrite", target.display());
    }

    let dir = docs_dir.join(category.as_str());
    fs::create_dir_all(&dir).await.map_err(io_error(&dir))?;

    let stem = file_stem(options.filename.as_deref().unwrap_or(&doc.title));

    for n in 0..MAX_SUFFIX {
        let path = dir.join(candidate_name(&stem, n));

        if create_new(&path, &content).await? {
            info!("Filed {:?} at {}", doc.title, path.display());
            return Ok(Filed { path, replaced: false });
        }

        if options.on_conflict == ConflictPolicy::Fail {
            warn!("Name conflict at {}", path.display());
            return Err(FilingError::Conflict { path });
        }
        debug!("{} is taken, trying next suffix", path.display());
    }

    Err(FilingError::Conflict {
        path: dir.join(candidate_name(&stem, 0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Source, PROCESSED_MARKER};
    use tempfile::TempDir;

    fn memory() -> Category {
        Category::new("memory").unwrap()
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Borrow Checker Basics"), "borrow-checker-basics");
        assert_eq!(file_stem("  What's new in Rust 1.80?  "), "whats-new-in-rust-180");
        assert_eq!(file_stem("!!!"), UNTITLED_STEM);
        assert!(file_stem(&"word ".repeat(50)).len() <= MAX_STEM_LEN);
        assert!(!file_stem(&"ab ".repeat(50)).ends_with('-'));
    }

    #[tokio::test]
    async fn test_file_writes_heading_and_markers() {
        let temp = TempDir::new().unwrap();
        let doc = Document::new(
            "Borrow Checker Basics",
            "Some text about borrowing.",
            Source::External("abc123".into()),
        );

        let filed = file_document(temp.path(), &doc, &memory(), &FileOptions::default(), &FilingLimits::default())
            .await
            .unwrap();

        assert_eq!(filed.path, temp.path().join("memory/borrow-checker-basics.md"));
        assert!(!filed.replaced);

        let content = fs::read_to_string(&filed.path).await.unwrap();
        assert!(content.starts_with("# Borrow Checker Basics\n"));
        assert_eq!(content.matches("<!-- SourceId: abc123 -->").count(), 1);
        assert_eq!(content.matches(PROCESSED_MARKER).count(), 1);
    }

    #[tokio::test]
    async fn test_collisions_get_suffixes() {
        let temp = TempDir::new().unwrap();
        let opts = FileOptions::default();
        let limits = FilingLimits::default();

        let a = Document::new("Ownership 101", "First", Source::External("id1".into()));
        let b = Document::new("Ownership 101", "Second", Source::External("id2".into()));
        let c = Document::new("Ownership 101", "Third", Source::External("id3".into()));

        let pa = file_document(temp.path(), &a, &memory(), &opts, &limits).await.unwrap();
        let pb = file_document(temp.path(), &b, &memory(), &opts, &limits).await.unwrap();
        let pc = file_document(temp.path(), &c, &memory(), &opts, &limits).await.unwrap();

        assert!(pa.path.ends_with("memory/ownership-101.md"));
        assert!(pb.path.ends_with("memory/ownership-101-1.md"));
        assert!(pc.path.ends_with("memory/ownership-101-2.md"));

        // First file untouched
        let first = fs::read_to_string(&pa.path).await.unwrap();
        assert!(first.contains("First"));
        assert!(!first.contains("Second"));
    }

    #[tokio::test]
    async fn test_fail_policy_reports_conflict() {
        let temp = TempDir::new().unwrap();
        let limits = FilingLimits::default();
        let doc = Document::new("Ownership", "Body", Source::Manual);

        file_document(temp.path(), &doc, &memory(), &FileOptions::default(), &limits)
            .await
            .unwrap();

        let opts = FileOptions {
            on_conflict: ConflictPolicy::Fail,
            ..Default::default()
        };
        let result = file_document(temp.path(), &doc, &memory(), &opts, &limits).await;
        assert!(matches!(result, Err(FilingError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_in_place() {
        let temp = TempDir::new().unwrap();
        let limits = FilingLimits::default();
        let source = Source::External("abc123".into());

        let old = Document::new("Borrowing", "Old text", source.clone());
        let filed = file_document(temp.path(), &old, &memory(), &FileOptions::default(), &limits)
            .await
            .unwrap();

        let new = Document::new("Borrowing Revisited", "New text", source);
        let opts = FileOptions {
            overwrite: true,
            replace: Some(filed.path.clone()),
            ..Default::default()
        };
        let replaced = file_document(temp.path(), &new, &memory(), &opts, &limits)
            .await
            .unwrap();

        assert_eq!(replaced.path, filed.path);
        assert!(replaced.replaced);
        let content = fs::read_to_string(&filed.path).await.unwrap();
        assert!(content.contains("New text"));
        assert!(content.starts_with("# Borrowing Revisited\n"));
    }

    #[tokio::test]
    async fn test_replace_without_overwrite_files_new() {
        let temp = TempDir::new().unwrap();
        let limits = FilingLimits::default();
        let doc = Document::new("Borrowing", "Text", Source::Manual);

        let first = file_document(temp.path(), &doc, &memory(), &FileOptions::default(), &limits)
            .await
            .unwrap();
        let opts = FileOptions {
            replace: Some(first.path.clone()),
            ..Default::default()
        };
        let second = file_document(temp.path(), &doc, &memory(), &opts, &limits).await.unwrap();

        assert_ne!(first.path, second.path);
        assert!(!second.replaced);
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let temp = TempDir::new().unwrap();
        let doc = Document::new("Nothing", "", Source::Manual);

        let result =
            file_document(temp.path(), &doc, &memory(), &FileOptions::default(), &FilingLimits::default()).await;
        assert!(matches!(result, Err(FilingError::Limit(LimitViolation::EmptyBody))));
        assert!(!temp.path().join("memory").exists());
    }
}
