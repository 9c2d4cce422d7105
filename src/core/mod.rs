//! Core filing logic.
//!
//! This module contains:
//! - Classify: turning a classifier's proposal into a category assignment
//! - Dedup: recognizing documents that are already filed
//! - Filer: writing documents under non-clobbering names
//! - Index: the derived navigation structure
//! - Pipeline: the batch runner tying them together
//! - Limits: input bounds and ignore rules

pub mod classify;
pub mod dedup;
pub mod filer;
pub mod index;
pub mod limits;
pub mod pipeline;

// Re-export commonly used types
pub use classify::{classify, ClassificationError, ClassifyContext};
pub use dedup::{detect_duplicate, is_duplicate};
pub use filer::{file_document, ConflictPolicy, FileOptions, Filed, FilingError};
pub use index::{regenerate_index, NavigationIndex};
pub use limits::{FilingLimits, LimitViolation};
pub use pipeline::{BatchOptions, BatchReport, Candidate, DocumentReport, Outcome, Pipeline};
