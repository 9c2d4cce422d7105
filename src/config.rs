//! Configuration for docfiler.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (applied by the CLI on top of the resolved config)
//! 2. Environment variables (DOCFILER_DOCS, DOCFILER_MODEL, ANTHROPIC_API_KEY, AUTO_PUSH)
//! 3. Config file (.docfiler/config.yaml)
//! 4. Defaults (docs/, mkdocs.yml, anthropic backend)
//!
//! Config file discovery:
//! - Searches the project root and its parents for .docfiler/config.yaml
//! - Paths in the config file are relative to the directory holding .docfiler/
//!
//! Nothing here reads the process working directory: the root is always
//! passed in.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::anthropic::DEFAULT_MODEL;
use crate::adapters::fabric::DEFAULT_PATTERN;
use crate::core::limits::FilingLimits;
use crate::domain::category::{default_labels, Category};

/// Config directory name under the project root
pub const CONFIG_DIR: &str = ".docfiler";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub limits: Option<FilingLimits>,
    #[serde(default)]
    pub publish: Option<PublishConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Docs root (relative to the project root)
    pub docs: Option<String>,
    /// mkdocs config file (relative to the project root)
    pub mkdocs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub pattern: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub default_category: Option<String>,
    /// Keyword rules for the offline backend
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoriesConfig {
    /// Navigation label overrides (slug -> label)
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Alternate names folded onto a canonical category (alias -> slug)
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    pub auto_push: Option<bool>,
    pub pull_before_sync: Option<bool>,
}

/// Which classifier backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Anthropic Messages API
    Anthropic,
    /// Fabric CLI subprocess
    Fabric,
    /// Offline keyword rules
    Keywords,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Anthropic => write!(f, "anthropic"),
            Backend::Fabric => write!(f, "fabric"),
            Backend::Keywords => write!(f, "keywords"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Backend::Anthropic),
            "fabric" => Ok(Backend::Fabric),
            "keywords" | "rules" | "offline" => Ok(Backend::Keywords),
            _ => anyhow::bail!("Unknown classifier backend: {}", s),
        }
    }
}

/// Resolved classifier settings
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub backend: Backend,
    pub model: String,
    pub pattern: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub default_category: Category,
    pub rules: BTreeMap<String, Vec<String>>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Anthropic,
            model: DEFAULT_MODEL.to_string(),
            pattern: DEFAULT_PATTERN.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
            default_category: Category::fallback(),
            rules: BTreeMap::new(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Project root (holds mkdocs.yml and the docs directory)
    pub root: PathBuf,
    /// Docs root, one subdirectory per category
    pub docs_dir: PathBuf,
    /// mkdocs config file
    pub mkdocs_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Classifier settings
    pub classifier: ClassifierSettings,
    /// Navigation labels (slug -> label)
    pub labels: HashMap<String, String>,
    /// Category aliases (alias -> slug)
    pub aliases: HashMap<String, String>,
    /// Filing limits
    pub limits: FilingLimits,
    /// Commit and push after filing
    pub auto_push: bool,
    /// Run `git pull` before `sync`
    pub pull_before_sync: bool,
}

impl ResolvedConfig {
    /// Defaults for a project root, no file or environment involved
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            docs_dir: root.join("docs"),
            mkdocs_path: root.join("mkdocs.yml"),
            root,
            config_file: None,
            classifier: ClassifierSettings::default(),
            labels: default_labels(),
            aliases: HashMap::new(),
            limits: FilingLimits::default(),
            auto_push: false,
            pull_before_sync: true,
        }
    }

    /// Generated index page
    pub fn index_path(&self) -> PathBuf {
        self.docs_dir.join("index.md")
    }

    /// Advisory lock held while a batch runs
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join("run.lock")
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Load configuration for the project at `root` from file and process environment
pub fn load_config(root: &Path) -> Result<ResolvedConfig> {
    load_config_with(root, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
pub fn load_config_with(root: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ResolvedConfig> {
    let config_file = find_config_file(root);

    let mut config = match &config_file {
        Some(config_path) => {
            let file = load_config_file(config_path)?;

            // Base directory is the parent of .docfiler/
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(root)
                .to_path_buf();

            let mut config = ResolvedConfig::with_root(&base_dir);
            config.config_file = Some(config_path.clone());

            if let Some(ref docs) = file.paths.docs {
                config.docs_dir = resolve_path(&base_dir, docs);
            }
            if let Some(ref mkdocs) = file.paths.mkdocs {
                config.mkdocs_path = resolve_path(&base_dir, mkdocs);
            }

            if let Some(classifier) = file.classifier {
                if let Some(ref backend) = classifier.backend {
                    config.classifier.backend = backend.parse()?;
                }
                if let Some(model) = classifier.model {
                    config.classifier.model = model;
                }
                if let Some(pattern) = classifier.pattern {
                    config.classifier.pattern = pattern;
                }
                if let Some(secs) = classifier.timeout_seconds {
                    config.classifier.timeout = Duration::from_secs(secs);
                }
                if let Some(ref name) = classifier.default_category {
                    config.classifier.default_category = Category::new(name.as_str())
                        .with_context(|| format!("Invalid default_category in {}", config_path.display()))?;
                }
                config.classifier.rules = classifier.rules;
            }

            config.labels.extend(file.categories.labels);
            config.aliases = file.categories.aliases;

            if let Some(limits) = file.limits {
                config.limits = limits;
            }

            if let Some(publish) = file.publish {
                config.auto_push = publish.auto_push.unwrap_or(false);
                config.pull_before_sync = publish.pull_before_sync.unwrap_or(true);
            }

            config
        }
        None => ResolvedConfig::with_root(root),
    };

    // Environment overrides
    if let Some(docs) = env("DOCFILER_DOCS") {
        config.docs_dir = resolve_path(&config.root, &docs);
    }
    if let Some(model) = env("DOCFILER_MODEL") {
        config.classifier.model = model;
    }
    if let Some(backend) = env("DOCFILER_BACKEND") {
        config.classifier.backend = backend.parse()?;
    }
    config.classifier.api_key = env("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty());
    if let Some(push) = env("AUTO_PUSH") {
        config.auto_push = truthy(&push);
    }

    Ok(config)
}
