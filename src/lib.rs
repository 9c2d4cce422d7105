//! docfiler - Topic filing for a markdown documentation corpus
//!
//! Classifies incoming markdown documents into topic folders under a
//! mkdocs `docs/` directory, skips documents that are already filed, and
//! regenerates the derived navigation (`docs/index.md` and the mkdocs
//! `nav`).
//!
//! # Modules
//!
//! - `adapters`: Collaborators (Anthropic, Fabric, keyword rules, git)
//! - `core`: Filing operations and the batch pipeline
//! - `domain`: Data structures (Document, Source, Category)
//! - `library`: The docs tree on disk and generated site files
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # File a freshly generated document
//! docfiler ingest notes/borrowing.md --source https://youtu.be/abc123def45
//!
//! # File everything dropped at the docs root, then push
//! docfiler sync --push
//!
//! # Rebuild index.md and the mkdocs nav only
//! docfiler index
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use crate::core::{BatchOptions, BatchReport, Candidate, NavigationIndex, Outcome, Pipeline};
pub use config::{load_config, ResolvedConfig};
pub use domain::{Category, CategoryAssignment, Document, Source};
