//! Filesystem-backed document store.
//!
//! Reads the docs tree: which categories exist, which documents are filed
//! where, and which markdown files at the root still need filing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, warn};

use crate::core::limits::FilingLimits;
use crate::domain::{Category, Document, Source};

/// Files at the docs root that are never filed
const ROOT_SKIP: &[&str] = &["index.md", "README.md"];

/// Directory holding lecture series rather than a category
pub const LECTURES_DIR: &str = "lectures";

/// Source file extensions that get markdown wrappers
pub const SOURCE_EXTENSIONS: &[&str] = &["rs", "py", "c", "cpp", "go", "js", "ts"];

/// Suffix of generated source wrappers (`foo.rs` -> `foo-src.md`)
pub const WRAPPER_SUFFIX: &str = "-src.md";

/// One category directory as found on disk
#[derive(Debug, Clone)]
pub struct CategoryScan {
    /// Directory name
    pub name: String,

    /// `README.md` or `index.md`, if present
    pub overview: Option<PathBuf>,

    /// Filed documents, sorted by file name
    pub documents: Vec<Document>,

    /// Source files, sorted by file name
    pub sources: Vec<PathBuf>,
}

/// One lecture series, `lectures/<name>/`
#[derive(Debug, Clone, Default)]
pub struct SeriesScan {
    /// Series directory name
    pub name: String,

    /// `index.md` of the series, if present
    pub index: Option<PathBuf>,

    /// Documents in `lectures/`
    pub lectures: Vec<Document>,

    /// Documents in `companions/`
    pub companions: Vec<Document>,

    /// Documents in `samples/`, except its index
    pub samples: Vec<Document>,
}

/// The whole docs tree as found on disk
#[derive(Debug, Clone, Default)]
pub struct TreeScan {
    /// Markdown files at the docs root (other than index.md)
    pub top_level: Vec<Document>,

    /// Category directories, sorted by name
    pub categories: Vec<CategoryScan>,

    /// Lecture series under the lectures directory, sorted by name
    pub series: Vec<SeriesScan>,
}

/// Store rooted at a docs directory
#[derive(Debug, Clone)]
pub struct DocStore {
    docs_dir: PathBuf,
    limits: FilingLimits,
}

impl DocStore {
    /// Create a store for `docs_dir`
    pub fn new(docs_dir: impl Into<PathBuf>, limits: FilingLimits) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            limits,
        }
    }

    /// Docs root
    pub fn docs_dir(&self) -> &Path {
        &self.docs_dir
    }

    /// Ensure the docs root exists
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.docs_dir)
            .await
            .with_context(|| format!("Failed to create docs directory: {}", self.docs_dir.display()))
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.docs_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Sorted entries of a directory, skipping ignored paths
    async fn entries(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.limits.is_ignored(&self.rel(&path)) {
                debug!("Ignoring {}", path.display());
                continue;
            }
            out.push(path);
        }

        out.sort();
        Ok(out)
    }

    /// Read a filed document. Invalid UTF-8 is replaced so one bad file
    /// cannot hide the rest of the tree; a file that cannot be read at all
    /// is skipped.
    async fn read_filed(&self, path: &Path, category: Option<Category>) -> Option<Document> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping unreadable document {}: {}", path.display(), e);
                return None;
            }
        };

        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(e) => {
                warn!("{} is not valid UTF-8; reading it lossily", path.display());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Some(Document::from_filed(path, body, category))
    }

    /// Existing category directories whose names are valid category slugs
    pub async fn categories(&self) -> Result<Vec<Category>> {
        if !self.docs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for path in self.entries(&self.docs_dir).await? {
            if !path.is_dir() || file_name(&path) == LECTURES_DIR {
                continue;
            }
            if let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) {
                if let Ok(category) = Category::new(name) {
                    out.push(category);
                }
            }
        }
        Ok(out)
    }

    /// Scan the docs root, each category directory one level deep, and the
    /// lecture series
    pub async fn scan(&self) -> Result<TreeScan> {
        let mut scan = TreeScan::default();
        if !self.docs_dir.exists() {
            return Ok(scan);
        }

        for path in self.entries(&self.docs_dir).await? {
            if path.is_dir() && file_name(&path) == LECTURES_DIR {
                scan.series = self.scan_lectures(&path).await?;
            } else if path.is_dir() {
                scan.categories.push(self.scan_category(&path).await?);
            } else if is_markdown(&path) && file_name(&path) != "index.md" {
                scan.top_level.extend(self.read_filed(&path, None).await);
            }
        }

        Ok(scan)
    }

    /// A series counts when it has an `index.md` or a `lectures/` directory
    async fn scan_lectures(&self, dir: &Path) -> Result<Vec<SeriesScan>> {
        let mut out = Vec::new();
        for path in self.entries(dir).await? {
            if !path.is_dir() {
                continue;
            }

            let index = Some(path.join("index.md")).filter(|p| p.is_file());
            if index.is_none() && !path.join("lectures").is_dir() {
                debug!("Not a lecture series: {}", path.display());
                continue;
            }

            out.push(SeriesScan {
                name: file_name(&path),
                index,
                lectures: self.markdown_in(&path.join("lectures"), &[]).await?,
                companions: self.markdown_in(&path.join("companions"), &[]).await?,
                samples: self.markdown_in(&path.join("samples"), &["index.md"]).await?,
            });
        }
        Ok(out)
    }

    /// Markdown documents directly inside `dir`, sorted by file name
    async fn markdown_in(&self, dir: &Path, skip: &[&str]) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        if !dir.is_dir() {
            return Ok(out);
        }

        for path in self.entries(dir).await? {
            if path.is_file() && is_markdown(&path) && !skip.contains(&file_name(&path).as_str()) {
                out.extend(self.read_filed(&path, None).await);
            }
        }
        Ok(out)
    }

    async fn scan_category(&self, dir: &Path) -> Result<CategoryScan> {
        let name = file_name(dir);
        let category = Category::new(name.clone()).ok();
        let mut overview = None;
        let mut documents = Vec::new();
        let mut sources = Vec::new();

        for path in self.entries(dir).await? {
            if !path.is_file() {
                continue;
            }
            let fname = file_name(&path);

            if fname == "README.md" || fname == "index.md" {
                // README wins over index when both exist
                if overview.is_none() || fname == "README.md" {
                    overview = Some(path);
                }
            } else if fname.ends_with(WRAPPER_SUFFIX) {
                continue;
            } else if is_markdown(&path) {
                documents.extend(self.read_filed(&path, category.clone()).await);
            } else if is_source_file(&path) {
                sources.push(path);
            }
        }

        Ok(CategoryScan {
            name,
            overview,
            documents,
            sources,
        })
    }

    /// Every markdown document anywhere under the docs root, for duplicate
    /// detection.
    pub async fn all_documents(&self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        if !self.docs_dir.exists() {
            return Ok(out);
        }

        let mut stack = vec![self.docs_dir.clone()];
        while let Some(dir) = stack.pop() {
            for path in self.entries(&dir).await? {
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !is_markdown(&path) || file_name(&path).ends_with(WRAPPER_SUFFIX) {
                    continue;
                }

                // Only direct children of the docs root are categories
                let category = path
                    .parent()
                    .filter(|p| p.parent() == Some(self.docs_dir.as_path()))
                    .and_then(|p| p.file_name())
                    .and_then(|n| Category::new(n.to_string_lossy().to_string()).ok());

                out.extend(self.read_filed(&path, category).await);
            }
        }

        out.sort_by(|a, b| a.filed_at.cmp(&b.filed_at));
        Ok(out)
    }

    /// Markdown files at the docs root that carry no processing marker
    pub async fn unfiled_documents(&self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        if !self.docs_dir.exists() {
            return Ok(out);
        }

        for path in self.entries(&self.docs_dir).await? {
            if !path.is_file() || !is_markdown(&path) || ROOT_SKIP.contains(&file_name(&path).as_str()) {
                continue;
            }

            // Filing rewrites the file, so anything not cleanly readable stays put
            let body = match fs::read_to_string(&path).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Leaving {} unfiled: {}", path.display(), e);
                    continue;
                }
            };
            let doc = Document::from_markdown(body, Source::Manual, Some(&path));
            if !doc.is_processed() {
                out.push(doc);
            }
        }

        Ok(out)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "md")
}

/// Whether a path has a source extension that gets a wrapper
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| SOURCE_EXTENSIONS.contains(&e))
}

/// Wrapper file name for a source file
pub fn wrapper_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}{}", stem, WRAPPER_SUFFIX)
}
