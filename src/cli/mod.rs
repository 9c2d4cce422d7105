//! Command-line interface for docfiler.
//!
//! Provides commands for filing one generated document, syncing
//! everything dropped at the docs root, rebuilding navigation, dry-run
//! classification and showing the resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{AnthropicClassifier, Classifier, FabricClassifier, GitCli, KeywordClassifier};
use crate::config::{load_config, Backend, ClassifierSettings, ResolvedConfig};
use crate::core::{BatchOptions, BatchReport, Candidate, ConflictPolicy, Outcome, Pipeline};
use crate::domain::{Category, Document, Source};

/// docfiler - File markdown documents into topic folders
#[derive(Parser, Debug)]
#[command(name = "docfiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root holding mkdocs.yml and docs/ (default: current directory)
    #[arg(long, global = true, env = "DOCFILER_ROOT")]
    pub root: Option<PathBuf>,

    /// Use the offline keyword classifier instead of the configured backend
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// File one markdown document
    Ingest {
        /// Markdown file to file
        file: PathBuf,

        /// Where the document came from (YouTube URL, video id or any id)
        #[arg(short, long)]
        source: Option<String>,

        /// Title to file under (classifier's choice if not specified)
        #[arg(short, long)]
        title: Option<String>,

        /// Category to file into (skips the classifier)
        #[arg(short, long)]
        category: Option<String>,

        /// Rewrite the existing file if this source was already filed
        #[arg(long)]
        overwrite: bool,

        /// Skip instead of adding a numeric suffix when the name is taken
        #[arg(long)]
        no_suffix: bool,

        /// Commit and push afterwards
        #[arg(long)]
        push: bool,
    },

    /// Pull, file every unfiled document at the docs root, rebuild navigation
    Sync {
        /// Commit and push afterwards
        #[arg(long)]
        push: bool,

        /// Do not run git pull first
        #[arg(long)]
        no_pull: bool,
    },

    /// Rebuild index.md, source wrappers and the mkdocs nav
    Index,

    /// Show how a document would be classified, without filing it
    Classify {
        /// Markdown file to classify
        file: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let mut config = load_config(&root)?;
        if self.offline {
            config.classifier.backend = Backend::Keywords;
        }

        match self.command {
            Commands::Ingest {
                file,
                source,
                title,
                category,
                overwrite,
                no_suffix,
                push,
            } => {
                let opts = BatchOptions {
                    overwrite,
                    on_conflict: if no_suffix {
                        ConflictPolicy::Fail
                    } else {
                        ConflictPolicy::Suffix
                    },
                    publish: push || config.auto_push,
                };
                ingest_file(config, &file, source, title, category, opts).await
            }
            Commands::Sync { push, no_pull } => {
                if no_pull {
                    config.pull_before_sync = false;
                }
                let opts = BatchOptions {
                    publish: push || config.auto_push,
                    ..Default::default()
                };
                sync_docs(config, opts).await
            }
            Commands::Index => {
                rebuild_index(config).await
            }
            Commands::Classify { file } => {
                classify_file(config, &file).await
            }
            Commands::Config => {
                show_config(&config)
            }
        }
    }
}

/// Build the configured classifier. A missing API key is reported by the
/// classifier's health check, so commands that never classify still work.
pub fn build_classifier(settings: &ClassifierSettings) -> Box<dyn Classifier> {
    match settings.backend {
        Backend::Anthropic => Box::new(AnthropicClassifier::new(
            settings.api_key.clone().unwrap_or_default(),
            &settings.model,
            settings.timeout,
        )),
        Backend::Fabric => Box::new(FabricClassifier::new(&settings.pattern, settings.timeout)),
        Backend::Keywords if settings.rules.is_empty() => Box::new(KeywordClassifier::default()),
        Backend::Keywords => Box::new(KeywordClassifier::from_map(&settings.rules)),
    }
}

fn build_pipeline(config: ResolvedConfig) -> Pipeline {
    let classifier = build_classifier(&config.classifier);
    let git = GitCli::new(&config.root);
    Pipeline::new(config, classifier).with_vcs(Box::new(git))
}

fn read_markdown(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read input file: {}", path.display()))
}

/// File one document
async fn ingest_file(
    config: ResolvedConfig,
    file: &Path,
    source: Option<String>,
    title: Option<String>,
    category: Option<String>,
    opts: BatchOptions,
) -> Result<()> {
    let body = read_markdown(file)?;
    let source = Source::parse(source.as_deref().unwrap_or(""));
    let document = Document::from_markdown(body, source, None);

    let mut candidate = Candidate::new(document);
    if let Some(name) = category {
        let category = Category::from_proposal(&name)
            .with_context(|| format!("Invalid category name: {}", name))?;
        candidate = candidate.with_category(category);
    }
    if let Some(title) = title {
        candidate = candidate.with_title(title);
    }

    let root = config.root.clone();
    let pipeline = build_pipeline(config);
    let report = pipeline.ingest(candidate, &opts).await?;
    finish(&report, &root)
}

/// File everything unfiled at the docs root
async fn sync_docs(config: ResolvedConfig, opts: BatchOptions) -> Result<()> {
    let root = config.root.clone();
    let pipeline = build_pipeline(config);
    let report = pipeline.sync(&opts).await?;
    finish(&report, &root)
}

/// Rebuild navigation only
async fn rebuild_index(config: ResolvedConfig) -> Result<()> {
    let index_path = config.index_path();
    let pipeline = build_pipeline(config);
    let index = pipeline.regenerate_site().await?;

    println!(
        "Indexed {} documents in {} sections -> {}",
        index.len(),
        index.sections.len(),
        index_path.display()
    );
    Ok(())
}

/// Dry-run classification
async fn classify_file(config: ResolvedConfig, file: &Path) -> Result<()> {
    let body = read_markdown(file)?;
    let document = Document::from_markdown(body, Source::Manual, Some(file));

    let pipeline = build_pipeline(config);
    let a = pipeline.classify_document(&document).await?;

    println!("Category: {}{}", a.category, if a.is_new { " (new)" } else { "" });
    println!("Title:    {}", a.title);
    if let Some(ref filename) = a.filename {
        println!("Filename: {}.md", filename);
    }
    if a.fell_back {
        println!("(no usable category proposed; default used)");
    }

    Ok(())
}

fn relative<'a>(root: &Path, path: &'a Path) -> std::borrow::Cow<'a, str> {
    path.strip_prefix(root).unwrap_or(path).to_string_lossy()
}

fn print_report(report: &BatchReport, root: &Path) {
    for doc in &report.documents {
        let line = match &doc.outcome {
            Outcome::Filed { path, category, is_new } => format!(
                "  + {} -> {}{}",
                doc.title,
                relative(root, path),
                if *is_new { format!(" (new category {})", category) } else { String::new() }
            ),
            Outcome::Replaced { path } => format!("  ~ {} -> {}", doc.title, relative(root, path)),
            Outcome::SkippedDuplicate { existing } => {
                format!("  = {} (already filed at {})", doc.title, relative(root, existing))
            }
            Outcome::SkippedConflict { path } => {
                format!("  ! {} (name taken: {})", doc.title, relative(root, path))
            }
            Outcome::Failed { error } => format!("  x {} ({})", doc.title, error),
        };
        println!("{}", line);
    }

    println!();
    println!("{}", report.summary());
    if let Some(entries) = report.index_entries {
        println!("Index: {} entries", entries);
    }
    match report.published {
        Some(true) => println!("Published: pushed"),
        Some(false) => println!("Published: nothing to commit"),
        None => {}
    }
    if let Some(ref error) = report.publish_error {
        eprintln!("Publish failed: {}", error);
    }
    if let Some(ref reason) = report.aborted {
        eprintln!("Batch aborted: {}", reason);
    }
}

fn finish(report: &BatchReport, root: &Path) -> Result<()> {
    print_report(report, root);
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("docfiler configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Root:     {}", cfg.root.display());
    println!("  Docs:     {}", cfg.docs_dir.display());
    println!("  Index:    {}", cfg.index_path().display());
    println!("  mkdocs:   {}", cfg.mkdocs_path.display());
    println!();
    println!("Classifier:");
    println!("  Backend:          {}", cfg.classifier.backend);
    println!("  Model:            {}", cfg.classifier.model);
    println!("  Fabric pattern:   {}", cfg.classifier.pattern);
    println!("  API key:          {}", if cfg.classifier.api_key.is_some() { "(set)" } else { "(not set)" });
    println!("  Timeout:          {}s", cfg.classifier.timeout.as_secs());
    println!("  Default category: {}", cfg.classifier.default_category);
    println!();
    println!("Category aliases:");
    if cfg.aliases.is_empty() {
        println!("  (none)");
    } else {
        let mut aliases: Vec<_> = cfg.aliases.iter().collect();
        aliases.sort();
        for (alias, target) in aliases {
            println!("  {}: {}", alias, target);
        }
    }
    println!();
    println!("Limits:");
    println!("  Max classifier input: {} chars", cfg.limits.max_input_chars);
    println!("  Max document size:    {} bytes", cfg.limits.max_document_bytes);
    println!("  Ignore patterns:      {}", cfg.limits.ignore_patterns.join(", "));
    println!();
    println!("Publishing:");
    println!("  Auto push:        {}", cfg.auto_push);
    println!("  Pull before sync: {}", cfg.pull_before_sync);

    Ok(())
}
