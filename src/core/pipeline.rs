//! Batch filing pipeline.
//!
//! Runs the filing operations in order for a batch of documents:
//! duplicate check, classification, filing, then one navigation rebuild
//! and an optional publish once every document has been handled.
//! Documents are processed strictly one after another.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use super::classify::{classify, ClassificationError, ClassifyContext};
use super::dedup::detect_duplicate;
use super::filer::{file_document, ConflictPolicy, FileOptions, FilingError};
use super::index::{regenerate_index, NavigationIndex};
use crate::adapters::{Classifier, ClassifyError, PublishOutcome, VersionControl};
use crate::config::ResolvedConfig;
use crate::domain::{Category, CategoryAssignment, Document, Source};
use crate::library::site::{site_title, update_mkdocs_nav, write_index_page, write_source_wrappers};
use crate::library::DocStore;

/// A document waiting to be filed, with optional operator overrides
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The document
    pub document: Document,

    /// Category chosen by the operator; skips the classifier
    pub category: Option<Category>,

    /// Title chosen by the operator
    pub title: Option<String>,
}

impl Candidate {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            category: None,
            title: None,
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    fn needs_classifier(&self) -> bool {
        self.category.is_none()
    }
}

/// What happened to one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Written to a new file
    Filed {
        path: PathBuf,
        category: Category,
        is_new: bool,
    },
    /// An existing file for the same source was rewritten
    Replaced { path: PathBuf },
    /// Already filed at `existing`
    SkippedDuplicate { existing: PathBuf },
    /// The target name was taken and suffixing is disabled
    SkippedConflict { path: PathBuf },
    /// Could not be filed; the batch continued
    Failed { error: String },
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Filed { path, category, is_new } => {
                write!(f, "filed in {}{}: {}", category, if *is_new { " (new)" } else { "" }, path.display())
            }
            Outcome::Replaced { path } => write!(f, "replaced: {}", path.display()),
            Outcome::SkippedDuplicate { existing } => write!(f, "duplicate of {}", existing.display()),
            Outcome::SkippedConflict { path } => write!(f, "skipped, name taken: {}", path.display()),
            Outcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Outcome of one document in a batch
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Title the document was filed under
    pub title: String,

    /// Where the document came from
    pub source: Source,

    /// File the document was read from, if any
    pub origin: Option<PathBuf>,

    pub outcome: Outcome,
}

/// Result of a whole batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Per-document outcomes, in input order
    pub documents: Vec<DocumentReport>,

    /// Entries in the regenerated index; `None` when it was not rebuilt
    pub index_entries: Option<usize>,

    /// Whether a commit was pushed
    pub published: Option<bool>,

    /// Publish failure, if publishing was attempted and failed
    pub publish_error: Option<String>,

    /// Why the batch stopped early
    pub aborted: Option<String>,
}

impl Default for BatchReport {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            documents: Vec::new(),
            index_entries: None,
            published: None,
            publish_error: None,
            aborted: None,
        }
    }
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.documents.iter().filter(|d| pred(&d.outcome)).count()
    }

    pub fn filed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Filed { .. }))
    }

    pub fn replaced(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Replaced { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::SkippedDuplicate { .. } | Outcome::SkippedConflict { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Whether the operator should see a nonzero exit status
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.aborted.is_some() || self.publish_error.is_some()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} filed, {} replaced, {} skipped, {} failed",
            self.filed(),
            self.replaced(),
            self.skipped(),
            self.failed()
        )
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Options for one batch
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Rewrite the existing file of an already-filed source
    pub overwrite: bool,

    /// Name collision policy
    pub on_conflict: ConflictPolicy,

    /// Commit and push after filing
    pub publish: bool,
}

/// Exclusive advisory lock on the project, released on drop
#[derive(Debug)]
struct RunLock {
    file: File,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Filing pipeline for one project
pub struct Pipeline {
    config: ResolvedConfig,
    store: DocStore,
    classifier: Box<dyn Classifier>,
    vcs: Option<Box<dyn VersionControl>>,
}

impl Pipeline {
    /// Create a pipeline without version control
    pub fn new(config: ResolvedConfig, classifier: Box<dyn Classifier>) -> Self {
        let store = DocStore::new(&config.docs_dir, config.limits.clone());
        Self {
            config,
            store,
            classifier,
            vcs: None,
        }
    }

    /// Attach a version control collaborator for pull and publish
    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    fn acquire_lock(&self) -> Result<RunLock> {
        let path = self.config.lock_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        file.try_lock_exclusive()
            .with_context(|| format!("Another docfiler run holds {}", path.display()))?;

        Ok(RunLock { file })
    }

    async fn classify_context(&self) -> Result<ClassifyContext> {
        Ok(ClassifyContext {
            existing: self.store.categories().await?,
            aliases: self.config.aliases.clone(),
            default_category: self.config.classifier.default_category.clone(),
            limits: self.config.limits.clone(),
        })
    }

    /// Classify a document without filing anything
    pub async fn classify_document(&self, doc: &Document) -> Result<CategoryAssignment> {
        let ctx = self.classify_context().await?;
        classify(self.classifier.as_ref(), doc, &ctx)
            .await
            .with_context(|| format!("Failed to classify {:?}", doc.title))
    }

    /// File one document, then rebuild navigation
    pub async fn ingest(&self, candidate: Candidate, opts: &BatchOptions) -> Result<BatchReport> {
        self.run(vec![candidate], opts).await
    }

    /// File a batch of documents, then rebuild navigation
    pub async fn run(&self, candidates: Vec<Candidate>, opts: &BatchOptions) -> Result<BatchReport> {
        let _lock = self.acquire_lock()?;
        self.run_locked(candidates, opts).await
    }

    /// Pull, file every unfiled document at the docs root, rebuild
    /// navigation and optionally publish
    pub async fn sync(&self, opts: &BatchOptions) -> Result<BatchReport> {
        let _lock = self.acquire_lock()?;

        if self.config.pull_before_sync {
            match self.vcs {
                Some(ref vcs) => {
                    vcs.pull().await.context("Failed to pull before sync")?;
                }
                None => debug!("No version control configured; skipping pull"),
            }
        }

        let unfiled = self.store.unfiled_documents().await?;
        if unfiled.is_empty() {
            info!("No unfiled documents in {}", self.store.docs_dir().display());
        } else {
            info!("Found {} unfiled documents", unfiled.len());
        }

        let candidates = unfiled.into_iter().map(Candidate::new).collect();
        self.run_locked(candidates, opts).await
    }

    #[instrument(skip_all, fields(documents = candidates.len()))]
    async fn run_locked(&self, candidates: Vec<Candidate>, opts: &BatchOptions) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        self.store.ensure_dir().await?;

        if candidates.iter().any(Candidate::needs_classifier) {
            if let Err(e) = self.classifier.health_check().await {
                error!("Classifier {} is not usable: {}", self.classifier.name(), e);
                report.aborted = Some(e.to_string());
                return Ok(report.finish());
            }
        }

        let mut existing = self.store.all_documents().await?;
        let mut ctx = self.classify_context().await?;

        for candidate in candidates {
            match self.process(candidate, &mut existing, &mut ctx, opts).await {
                Ok(doc_report) => report.documents.push(doc_report),
                Err(e) => {
                    error!("Aborting batch: {}", e);
                    report.aborted = Some(e.to_string());
                    return Ok(report.finish());
                }
            }
        }

        match self.regenerate_site().await {
            Ok(index) => report.index_entries = Some(index.len()),
            Err(e) => {
                error!("Index regeneration failed: {:#}", e);
                report.aborted = Some(format!("Index regeneration failed: {:#}", e));
                return Ok(report.finish());
            }
        }

        if opts.publish {
            self.publish(&mut report).await;
        }

        info!("Batch complete: {}", report.summary());
        Ok(report.finish())
    }

    /// Handle one document. Only a collaborator failure is an error; every
    /// other problem becomes the document's outcome.
    async fn process(
        &self,
        candidate: Candidate,
        existing: &mut Vec<Document>,
        ctx: &mut ClassifyContext,
        opts: &BatchOptions,
    ) -> Result<DocumentReport, ClassifyError> {
        let Candidate {
            document: mut doc,
            category,
            title,
        } = candidate;

        let report = |doc: &Document, outcome: Outcome| DocumentReport {
            title: doc.title.clone(),
            source: doc.source.clone(),
            origin: doc.origin.clone(),
            outcome,
        };

        // Duplicate check
        let mut replace = None;
        let mut filed_under = None;
        if let Some(dup) = detect_duplicate(&doc, existing) {
            let dup_path = dup.filed_at.clone().unwrap_or_default();
            if opts.overwrite && doc.source.id().is_some() {
                debug!("Will overwrite {}", dup_path.display());
                filed_under = dup.category.clone();
                replace = Some(dup_path);
            } else {
                info!("Skipping duplicate {:?} (already at {})", doc.title, dup_path.display());
                return Ok(report(&doc, Outcome::SkippedDuplicate { existing: dup_path }));
            }
        }

        // Classification. A replaced document is rewritten in place and keeps
        // the category it is filed under.
        let assignment = match (category, &replace) {
            (_, Some(_)) => CategoryAssignment {
                is_new: false,
                title: doc.title.clone(),
                category: filed_under.clone().unwrap_or_else(|| ctx.default_category.clone()),
                filename: None,
                fell_back: false,
            },
            (Some(category), None) => CategoryAssignment {
                is_new: !ctx.existing.contains(&category),
                title: doc.title.clone(),
                category,
                filename: None,
                fell_back: false,
            },
            (None, None) => match classify(self.classifier.as_ref(), &doc, ctx).await {
                Ok(assignment) => assignment,
                Err(ClassificationError::Collaborator(e)) => return Err(e),
                Err(ClassificationError::Invalid(e)) => {
                    warn!("Cannot file {:?}: {}", doc.title, e);
                    return Ok(report(&doc, Outcome::Failed { error: e.to_string() }));
                }
            },
        };
        if assignment.fell_back {
            warn!("No usable category for {:?}; filing under {}", doc.title, assignment.category);
        }

        doc.title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or(assignment.title);
        doc.category = match replace {
            Some(_) => filed_under,
            None => Some(assignment.category.clone()),
        };

        // Filing
        let options = FileOptions {
            overwrite: opts.overwrite,
            replace,
            on_conflict: opts.on_conflict,
            filename: assignment.filename,
        };
        let filed = match file_document(
            self.store.docs_dir(),
            &doc,
            &assignment.category,
            &options,
            &self.config.limits,
        )
        .await
        {
            Ok(filed) => filed,
            Err(FilingError::Conflict { path }) => {
                warn!("Not filing {:?}: {} exists", doc.title, path.display());
                return Ok(report(&doc, Outcome::SkippedConflict { path }));
            }
            Err(e) => {
                error!("Failed to file {:?}: {}", doc.title, e);
                return Ok(report(&doc, Outcome::Failed { error: e.to_string() }));
            }
        };

        // The moved document's old copy goes only after the new one exists
        if let Some(ref origin) = doc.origin {
            if *origin != filed.path {
                if let Err(e) = fs::remove_file(origin).await {
                    warn!("Filed {:?} but could not remove {}: {}", doc.title, origin.display(), e);
                }
            }
        }

        let record = Document::from_filed(&filed.path, doc.render(), doc.category.clone());
        existing.retain(|d| d.filed_at.as_ref() != Some(&filed.path) && d.filed_at != doc.origin);
        existing.push(record);

        let outcome = if filed.replaced {
            Outcome::Replaced { path: filed.path }
        } else {
            if assignment.is_new && !ctx.existing.contains(&assignment.category) {
                info!("Created category {}", assignment.category);
                ctx.existing.push(assignment.category.clone());
            }
            Outcome::Filed {
                path: filed.path,
                category: assignment.category,
                is_new: assignment.is_new,
            }
        };

        Ok(report(&doc, outcome))
    }

    /// Regenerate source wrappers, `index.md` and the mkdocs nav from the
    /// docs tree
    pub async fn regenerate_site(&self) -> Result<NavigationIndex> {
        let scan = self.store.scan().await?;
        let wrappers = write_source_wrappers(&scan).await?;
        if wrappers > 0 {
            info!("Wrote {} source wrappers", wrappers);
        }

        let index = regenerate_index(&self.store, &self.config.labels).await?;
        let title = site_title(&self.config.mkdocs_path).await;
        write_index_page(&self.config.index_path(), &index, &title).await?;
        update_mkdocs_nav(&self.config.mkdocs_path, &index).await?;

        debug!("Index has {} entries in {} sections", index.len(), index.sections.len());
        Ok(index)
    }

    async fn publish(&self, report: &mut BatchReport) {
        let Some(ref vcs) = self.vcs else {
            warn!("Publishing requested but no version control is configured");
            return;
        };

        let mut paths = vec![self.config.docs_dir.clone()];
        if self.config.mkdocs_path.exists() {
            paths.push(self.config.mkdocs_path.clone());
        }

        match vcs.publish(&paths, &commit_message(report)).await {
            Ok(PublishOutcome::Pushed) => report.published = Some(true),
            Ok(PublishOutcome::NothingToCommit) => report.published = Some(false),
            Err(e) => {
                error!("Publish failed: {:#}", e);
                report.publish_error = Some(format!("{:#}", e));
            }
        }
    }
}

/// Commit message describing what a batch filed
pub fn commit_message(report: &BatchReport) -> String {
    let written: Vec<&DocumentReport> = report
        .documents
        .iter()
        .filter(|d| matches!(d.outcome, Outcome::Filed { .. } | Outcome::Replaced { .. }))
        .collect();

    let sources: Vec<String> = written
        .iter()
        .filter_map(|d| d.source.id())
        .map(|id| format!("Source: {}", id))
        .collect();

    let subject = match written.as_slice() {
        [] => "Regenerate documentation index".to_string(),
        [one] => format!("Add doc: {}", one.title),
        many => format!("Organize {} docs into topic folders", many.len()),
    };

    if sources.is_empty() {
        subject
    } else {
        format!("{}\n\n{}", subject, sources.join("\n"))
    }
}
