//! Domain types for the filing pipeline.
//!
//! This module contains:
//! - Document: markdown content plus its source and filed location
//! - Category: validated topic category names and classification results

pub mod category;
pub mod document;

// Re-export commonly used types
pub use category::{slugify, Category, CategoryAssignment, InvalidCategory, DEFAULT_CATEGORY};
pub use document::{Document, Source, PROCESSED_MARKER};
