//! Filing Integration Tests
//!
//! End-to-end batches against a temporary project with a scripted
//! classifier standing in for the live service.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docfiler::adapters::{Classifier, ClassifyError, RawClassification};
use docfiler::config::ResolvedConfig;
use docfiler::core::{BatchOptions, Candidate, ConflictPolicy, Outcome, Pipeline};
use docfiler::domain::{Category, Document, Source, PROCESSED_MARKER};
use fs2::FileExt;
use tempfile::TempDir;
use tokio::fs;

/// Classifier that replays canned answers in order
struct ScriptedClassifier {
    replies: Mutex<VecDeque<Result<RawClassification, ClassifyError>>>,
    calls: Arc<AtomicUsize>,
    healthy: bool,
}

impl ScriptedClassifier {
    fn new(replies: Vec<Result<RawClassification, ClassifyError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            healthy: true,
        }
    }

    fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _text: &str) -> Result<RawClassification, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifyError::Malformed("no scripted reply left".to_string())))
    }

    async fn health_check(&self) -> Result<(), ClassifyError> {
        if self.healthy {
            Ok(())
        } else {
            Err(ClassifyError::Unavailable("service down".to_string()))
        }
    }
}

fn reply(category: &str, title: &str) -> Result<RawClassification, ClassifyError> {
    Ok(RawClassification {
        category: Some(category.to_string()),
        title: Some(title.to_string()),
        filename: None,
    })
}

async fn project(temp: &TempDir) -> ResolvedConfig {
    fs::write(temp.path().join("mkdocs.yml"), "site_name: Rust Notes\n")
        .await
        .unwrap();
    ResolvedConfig::with_root(temp.path())
}

fn external(title: &str, body: &str, id: &str) -> Candidate {
    Candidate::new(Document::new(title, body, Source::External(id.to_string())))
}

async fn markdown_files(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".md") {
            names.push(name);
        }
    }
    names.sort();
    names
}

#[tokio::test]
async fn test_files_document_with_title_and_marker() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![reply("memory", "Borrow Checker Basics")]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .ingest(
            external("Borrow Checker Basics", "How the borrow checker works.", "abc123"),
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.filed(), 1);
    assert_eq!(report.index_entries, Some(1));
    assert!(!report.has_failures());

    let path = config.docs_dir.join("memory/borrow-checker-basics.md");
    let content = fs::read_to_string(&path).await.unwrap();
    assert!(content.starts_with("# Borrow Checker Basics\n"));
    assert!(content.contains("<!-- SourceId: abc123 -->"));
    assert!(content.contains(PROCESSED_MARKER));

    let index = fs::read_to_string(config.index_path()).await.unwrap();
    assert!(index.contains("[Borrow Checker Basics](memory/borrow-checker-basics.md)"));

    let mkdocs = fs::read_to_string(&config.mkdocs_path).await.unwrap();
    assert!(mkdocs.contains("site_name: Rust Notes"));
    assert!(mkdocs.contains("Borrow Checker Basics: memory/borrow-checker-basics.md"));
}

#[tokio::test]
async fn test_same_source_twice_files_once() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![
        reply("memory", "Borrow Checker Basics"),
        reply("memory", "Borrow Checker Basics"),
    ]);
    let calls = classifier.calls();
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));
    let opts = BatchOptions::default();

    let candidate = external("Borrow Checker Basics", "How the borrow checker works.", "abc123");
    let first = pipeline.ingest(candidate.clone(), &opts).await.unwrap();
    let second = pipeline.ingest(candidate, &opts).await.unwrap();

    assert_eq!(first.filed(), 1);
    assert_eq!(second.filed(), 0);
    assert!(matches!(
        second.documents[0].outcome,
        Outcome::SkippedDuplicate { .. }
    ));
    assert_eq!(second.index_entries, Some(1));

    // Duplicates are caught before classification
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        markdown_files(&config.docs_dir.join("memory")).await,
        vec!["borrow-checker-basics.md"]
    );
}

#[tokio::test]
async fn test_source_id_with_spaces_files_once() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));
    let opts = BatchOptions::default();
    let memory = Category::new("memory").unwrap();

    let candidate = Candidate::new(Document::new(
        "Borrow Checker Basics",
        "How the borrow checker works.",
        Source::parse("lecture 3"),
    ))
    .with_category(memory);

    let first = pipeline.ingest(candidate.clone(), &opts).await.unwrap();
    let second = pipeline.ingest(candidate, &opts).await.unwrap();

    assert_eq!(first.filed(), 1);
    assert_eq!(second.filed(), 0);
    assert_eq!(second.skipped(), 1);
    assert_eq!(
        markdown_files(&config.docs_dir.join("memory")).await,
        vec!["borrow-checker-basics.md"]
    );

    let content = fs::read_to_string(config.docs_dir.join("memory/borrow-checker-basics.md"))
        .await
        .unwrap();
    assert_eq!(content.matches("<!-- SourceId: lecture-3 -->").count(), 1);
}

#[tokio::test]
async fn test_same_title_different_sources_get_suffixes() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![
        reply("memory", "Ownership 101"),
        reply("memory", "Ownership 101"),
    ]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .run(
            vec![
                external("Ownership 101", "First lecture.", "id1"),
                external("Ownership 101", "Second lecture.", "id2"),
            ],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.filed(), 2);
    assert_eq!(report.index_entries, Some(2));
    assert_eq!(
        markdown_files(&config.docs_dir.join("memory")).await,
        vec!["ownership-101-1.md", "ownership-101.md"]
    );

    // The second batch member saw the first one's category as existing
    let new_flags: Vec<bool> = report
        .documents
        .iter()
        .map(|d| match d.outcome {
            Outcome::Filed { is_new, .. } => is_new,
            _ => panic!("unexpected outcome {:?}", d.outcome),
        })
        .collect();
    assert_eq!(new_flags, vec![true, false]);
}

#[tokio::test]
async fn test_no_suffix_policy_skips_conflict() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![
        reply("memory", "Ownership 101"),
        reply("memory", "Ownership 101"),
    ]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));
    let opts = BatchOptions {
        on_conflict: ConflictPolicy::Fail,
        ..Default::default()
    };

    let report = pipeline
        .run(
            vec![
                external("Ownership 101", "First lecture.", "id1"),
                external("Ownership 101", "Second lecture.", "id2"),
            ],
            &opts,
        )
        .await
        .unwrap();

    assert_eq!(report.filed(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(matches!(
        report.documents[1].outcome,
        Outcome::SkippedConflict { .. }
    ));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_overwrite_rewrites_existing_file() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![reply("memory", "Borrowing")]);
    let calls = classifier.calls();
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    pipeline
        .ingest(external("Borrowing", "Old notes.", "abc123"), &BatchOptions::default())
        .await
        .unwrap();

    let opts = BatchOptions {
        overwrite: true,
        ..Default::default()
    };
    let report = pipeline
        .ingest(
            external("Borrowing", "Corrected notes.", "abc123").with_category(Category::new("memory").unwrap()),
            &opts,
        )
        .await
        .unwrap();

    let path = config.docs_dir.join("memory/borrowing.md");
    assert_eq!(report.replaced(), 1);
    assert_eq!(report.documents[0].outcome, Outcome::Replaced { path: path.clone() });
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let content = fs::read_to_string(&path).await.unwrap();
    assert!(content.contains("Corrected notes."));
    assert!(!content.contains("Old notes."));
    assert_eq!(content.matches("<!-- SourceId: abc123 -->").count(), 1);
    assert_eq!(markdown_files(&config.docs_dir.join("memory")).await.len(), 1);
}

#[tokio::test]
async fn test_overwrite_keeps_existing_category_without_classifying() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![reply("memory", "Borrowing"), reply("concurrency", "Borrowing")]);
    let calls = classifier.calls();
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    pipeline
        .ingest(external("Borrowing", "Old notes.", "abc123"), &BatchOptions::default())
        .await
        .unwrap();

    let opts = BatchOptions {
        overwrite: true,
        ..Default::default()
    };
    let report = pipeline
        .ingest(external("Borrowing", "Corrected notes.", "abc123"), &opts)
        .await
        .unwrap();

    let path = config.docs_dir.join("memory/borrowing.md");
    assert_eq!(report.documents[0].outcome, Outcome::Replaced { path: path.clone() });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!config.docs_dir.join("concurrency").exists());
    assert!(fs::read_to_string(&path).await.unwrap().contains("Corrected notes."));
}

#[tokio::test]
async fn test_invalid_utf8_file_does_not_block_index() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    fs::create_dir_all(config.docs_dir.join("memory")).await.unwrap();
    fs::write(config.docs_dir.join("memory/legacy.md"), b"\xff\xfe")
        .await
        .unwrap();

    let classifier = ScriptedClassifier::new(vec![reply("memory", "Borrowing")]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .ingest(external("Borrowing", "Text.", "abc123"), &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(report.filed(), 1);
    assert!(report.aborted.is_none());
    assert_eq!(report.index_entries, Some(2));

    let index = fs::read_to_string(config.index_path()).await.unwrap();
    assert!(index.contains("[Borrowing](memory/borrowing.md)"));
    assert!(index.contains("[Legacy](memory/legacy.md)"));
}

#[tokio::test]
async fn test_classification_is_total() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![
        Err(ClassifyError::Malformed("gibberish".to_string())),
        reply("???", ""),
        reply("Error Handling", "Result and Option"),
    ]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .run(
            vec![
                external("Gibberish Reply", "Some text.", "a"),
                external("Bad Category", "Other text.", "b"),
                external("Errors", "Third text.", "c"),
            ],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.filed(), 3);
    assert!(config.docs_dir.join("misc/gibberish-reply.md").exists());
    assert!(config.docs_dir.join("misc/bad-category.md").exists());
    assert!(config.docs_dir.join("error-handling/result-and-option.md").exists());

    let index = fs::read_to_string(config.index_path()).await.unwrap();
    assert!(index.contains("### Error Handling"));
    assert!(index.contains("### Misc"));
}

#[tokio::test]
async fn test_empty_document_fails_but_batch_continues() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![reply("memory", "Real")]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .run(
            vec![external("Empty", "  \n", "a"), external("Real", "Real text.", "b")],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert!(matches!(report.documents[0].outcome, Outcome::Failed { .. }));
    assert_eq!(report.filed(), 1);
    assert_eq!(report.index_entries, Some(1));
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_unavailable_classifier_aborts_batch() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![
        reply("memory", "First"),
        Err(ClassifyError::Timeout(Duration::from_secs(120))),
        reply("memory", "Third"),
    ]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let report = pipeline
        .run(
            vec![
                external("First", "One.", "a"),
                external("Second", "Two.", "b"),
                external("Third", "Three.", "c"),
            ],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    assert!(report.aborted.is_some());
    assert!(report.has_failures());
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.index_entries, None);
    assert!(!config.index_path().exists());
    assert!(!config.docs_dir.join("memory/third.md").exists());
}

#[tokio::test]
async fn test_failed_health_check_aborts_before_filing() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let pipeline = Pipeline::new(config.clone(), Box::new(ScriptedClassifier::unhealthy()));

    let report = pipeline
        .ingest(external("Anything", "Text.", "a"), &BatchOptions::default())
        .await
        .unwrap();

    assert!(report.aborted.is_some());
    assert!(report.documents.is_empty());
    assert!(!config.docs_dir.join("misc").exists());
}

#[tokio::test]
async fn test_category_override_skips_classifier() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::unhealthy();
    let calls = classifier.calls();
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    let candidate = external("Unsafe Intro", "# Unsafe Intro\n\nRaw pointers.", "x1")
        .with_category(Category::new("unsafe").unwrap())
        .with_title("Unsafe Rust Introduction");
    let report = pipeline.ingest(candidate, &BatchOptions::default()).await.unwrap();

    assert_eq!(report.filed(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let content = fs::read_to_string(config.docs_dir.join("unsafe/unsafe-rust-introduction.md"))
        .await
        .unwrap();
    assert!(content.starts_with("# Unsafe Rust Introduction\n"));
    assert!(!content.contains("# Unsafe Intro\n"));
}

#[tokio::test]
async fn test_concurrent_run_is_refused() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let pipeline = Pipeline::new(config.clone(), Box::new(ScriptedClassifier::new(vec![])));

    std::fs::create_dir_all(config.lock_path().parent().unwrap()).unwrap();
    let held = std::fs::File::create(config.lock_path()).unwrap();
    held.try_lock_exclusive().unwrap();

    let result = pipeline.run(vec![], &BatchOptions::default()).await;
    assert!(result.is_err());

    held.unlock().unwrap();
    let report = pipeline.run(vec![], &BatchOptions::default()).await.unwrap();
    assert_eq!(report.index_entries, Some(0));
}

#[tokio::test]
async fn test_regeneration_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let config = project(&temp).await;
    let classifier = ScriptedClassifier::new(vec![reply("memory", "Borrowing"), reply("stdlib", "Vec")]);
    let pipeline = Pipeline::new(config.clone(), Box::new(classifier));

    pipeline
        .run(
            vec![external("Borrowing", "Text.", "a"), external("Vec", "Growth.", "b")],
            &BatchOptions::default(),
        )
        .await
        .unwrap();

    let index_before = fs::read(config.index_path()).await.unwrap();
    let mkdocs_before = fs::read(&config.mkdocs_path).await.unwrap();

    let first = pipeline.regenerate_site().await.unwrap();
    let second = pipeline.regenerate_site().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(config.index_path()).await.unwrap(), index_before);
    assert_eq!(fs::read(&config.mkdocs_path).await.unwrap(), mkdocs_before);
}
