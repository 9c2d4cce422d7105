//! Duplicate detection against already-filed documents.
//!
//! Documents with an external source match only on that source id. Manual
//! documents match only when both the normalized title and the body
//! fingerprint agree, so two different notes that share a title are never
//! treated as the same document.

use crate::domain::{Document, Source};

/// Find the filed document `doc` duplicates, if any.
///
/// The document's own origin is never considered a match for itself.
pub fn detect_duplicate<'a>(doc: &Document, existing: &'a [Document]) -> Option<&'a Document> {
    let mut candidates = existing
        .iter()
        .filter(|e| e.filed_at.is_none() || e.filed_at != doc.origin);

    match &doc.source {
        Source::External(_) => {
            let key = doc.source.key()?;
            candidates.find(|e| e.source.key().as_deref() == Some(key.as_str()))
        }
        Source::Manual => {
            let title = doc.normalized_title();
            if title.is_empty() {
                return None;
            }
            let fingerprint = doc.fingerprint();
            candidates.find(|e| {
                matches!(e.source, Source::Manual)
                    && e.normalized_title() == title
                    && e.fingerprint() == fingerprint
            })
        }
    }
}

/// Whether `doc` duplicates any filed document
pub fn is_duplicate(doc: &Document, existing: &[Document]) -> bool {
    detect_duplicate(doc, existing).is_some()
}
