//! Site outputs derived from the navigation index.
//!
//! Writes `index.md`, the `nav` section of `mkdocs.yml` and markdown
//! wrappers for source files. Every writer leaves a file untouched when its
//! content would not change, so regeneration is idempotent on disk too.

use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use tokio::fs;
use tracing::{debug, info, warn};

use super::store::{wrapper_name, TreeScan};
use crate::core::index::NavigationIndex;

/// Title used when mkdocs.yml has no `site_name`
pub const DEFAULT_SITE_TITLE: &str = "Documentation";

/// Default `exclude_docs` added to mkdocs.yml when missing
const DEFAULT_EXCLUDE_DOCS: &str = "**/repo/**\n**/__pycache__/**\n";

/// Write `content` to `path` unless the file already holds exactly that.
/// Returns whether the file was written.
pub async fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path).await {
        if existing == content {
            debug!("Unchanged: {}", path.display());
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Load mkdocs.yml as a generic YAML value, if it exists
async fn load_mkdocs(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// `site_name` from mkdocs.yml, falling back to a generic title
pub async fn site_title(mkdocs_path: &Path) -> String {
    match load_mkdocs(mkdocs_path).await {
        Ok(Some(value)) => value
            .get("site_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        _ => DEFAULT_SITE_TITLE.to_string(),
    }
}

/// Write the landing page
pub async fn write_index_page(index_path: &Path, index: &NavigationIndex, site_title: &str) -> Result<bool> {
    let changed = write_if_changed(index_path, &index.render_markdown(site_title)).await?;
    if changed {
        info!("Updated {}", index_path.display());
    }
    Ok(changed)
}

/// Replace the `nav` section of mkdocs.yml, keeping every other key.
///
/// Returns `None` when there is no mkdocs.yml to update.
pub async fn update_mkdocs_nav(mkdocs_path: &Path, index: &NavigationIndex) -> Result<Option<bool>> {
    let Some(mut config) = load_mkdocs(mkdocs_path).await? else {
        warn!("mkdocs.yml not found at {}; skipping nav update", mkdocs_path.display());
        return Ok(None);
    };

    if config.is_null() {
        config = Value::Mapping(Mapping::new());
    }
    let Some(map) = config.as_mapping_mut() else {
        anyhow::bail!("{} is not a YAML mapping", mkdocs_path.display());
    };

    map.insert(Value::String("nav".to_string()), index.to_mkdocs_nav());

    let exclude_key = Value::String("exclude_docs".to_string());
    if !map.contains_key(&exclude_key) {
        map.insert(exclude_key, Value::String(DEFAULT_EXCLUDE_DOCS.to_string()));
    }

    let rendered = serde_yaml::to_string(&config).context("Failed to serialize mkdocs.yml")?;
    let changed = write_if_changed(mkdocs_path, &rendered).await?;
    if changed {
        info!(
            "Updated {} with {} nav entries",
            mkdocs_path.display(),
            index.sections.len() + index.top_level.len() + 1
        );
    }
    Ok(Some(changed))
}

/// Fenced-code wrapper for a source file
pub fn render_wrapper(file_name: &str, language: &str, source: &str) -> String {
    format!("# {}\n\n```{}\n{}\n```\n", file_name, language, source.trim_end())
}

fn fence_language(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("c") => "c",
        Some("cpp") => "cpp",
        Some("go") => "go",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        _ => "",
    }
}

/// Generate `<stem>-src.md` next to every source file in the scan.
/// Returns the number of wrappers written.
pub async fn write_source_wrappers(scan: &TreeScan) -> Result<usize> {
    let mut written = 0;

    for category in &scan.categories {
        for src in &category.sources {
            let source = match fs::read_to_string(src).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping unreadable source file {}: {}", src.display(), e);
                    continue;
                }
            };

            let file_name = src
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let wrapper = src.with_file_name(wrapper_name(src));
            let content = render_wrapper(&file_name, fence_language(src), &source);

            if write_if_changed(&wrapper, &content).await? {
                written += 1;
            }
        }
    }

    Ok(written)
}
