//! Classification of a document into a topic category.
//!
//! The classifier's answer is only a proposal. It is validated against the
//! category naming rules, mapped through configured aliases and folded onto
//! existing categories before it becomes a [`CategoryAssignment`].
//! Classification is total: anything unusable ends in the default category.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use super::limits::{FilingLimits, LimitViolation};
use crate::adapters::{Classifier, ClassifyError, RawClassification};
use crate::domain::{slugify, Category, CategoryAssignment, Document};
use crate::library::store::LECTURES_DIR;

/// Title used when neither the classifier nor the document offers one
pub const UNTITLED: &str = "Untitled";

/// Reasons a document could not be classified at all
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// The document itself is unusable
    #[error(transparent)]
    Invalid(#[from] LimitViolation),

    /// The classifier could not be used; the batch has to stop
    #[error(transparent)]
    Collaborator(#[from] ClassifyError),
}

/// What classification needs to know about the corpus
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    /// Categories that already exist on disk
    pub existing: Vec<Category>,

    /// Alias -> canonical category slug
    pub aliases: HashMap<String, String>,

    /// Category used when the proposal is unusable
    pub default_category: Category,

    /// Input limits
    pub limits: FilingLimits,
}

impl Default for ClassifyContext {
    fn default() -> Self {
        Self {
            existing: Vec::new(),
            aliases: HashMap::new(),
            default_category: Category::fallback(),
            limits: FilingLimits::default(),
        }
    }
}

impl ClassifyContext {
    fn exists(&self, category: &Category) -> bool {
        self.existing.contains(category)
    }

    /// Map a free-form proposal onto a category.
    ///
    /// Returns the category and whether it fell back to the default.
    pub fn resolve_category(&self, proposal: Option<&str>) -> (Category, bool) {
        let Some(raw) = proposal.map(str::trim).filter(|p| !p.is_empty()) else {
            return (self.default_category.clone(), true);
        };

        let lowered = raw.to_lowercase();
        let slug = slugify(&lowered.replace('_', "-"));
        let aliased = self
            .aliases
            .get(&lowered)
            .or_else(|| self.aliases.get(&slug))
            .map(String::as_str);

        let candidate = match aliased {
            Some(target) => Category::new(target).ok(),
            None => Category::from_proposal(&lowered),
        };

        // The lectures directory holds series, not filed documents
        let Some(category) = candidate.filter(|c| c.as_str() != LECTURES_DIR) else {
            warn!("Unusable category proposal {:?}; using {}", raw, self.default_category);
            return (self.default_category.clone(), true);
        };

        (self.fold_plural(category), false)
    }

    /// `lifetime` -> `lifetimes` (and back) when only the other form exists
    fn fold_plural(&self, category: Category) -> Category {
        if self.exists(&category) {
            return category;
        }

        let name = category.as_str();
        let other = match name.strip_suffix('s') {
            Some(singular) => singular.to_string(),
            None => format!("{}s", name),
        };

        match Category::new(other) {
            Ok(alt) if self.exists(&alt) => {
                debug!("Folding category {} onto existing {}", name, alt);
                alt
            }
            _ => category,
        }
    }
}

fn pick_title(raw: Option<&str>, doc: &Document) -> String {
    [raw, Some(doc.title.as_str())]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

/// Turn a raw classifier answer into an assignment
pub fn assignment_from(raw: &RawClassification, doc: &Document, ctx: &ClassifyContext) -> CategoryAssignment {
    let (category, fell_back) = ctx.resolve_category(raw.category.as_deref());
    let filename = raw
        .filename
        .as_deref()
        .map(|f| slugify(f.trim_end_matches(".md")))
        .filter(|f| !f.is_empty());

    CategoryAssignment {
        is_new: !ctx.exists(&category),
        title: pick_title(raw.title.as_deref(), doc),
        category,
        filename,
        fell_back,
    }
}

/// Classify a document.
///
/// An empty body is rejected. A malformed classifier reply falls back to
/// the default category; an unreachable classifier is returned as
/// [`ClassificationError::Collaborator`].
pub async fn classify(
    classifier: &dyn Classifier,
    doc: &Document,
    ctx: &ClassifyContext,
) -> Result<CategoryAssignment, ClassificationError> {
    ctx.limits.validate_document(&doc.body)?;

    let text = ctx.limits.truncate_for_classifier(&doc.body);
    let raw = match classifier.classify(&text).await {
        Ok(raw) => raw,
        Err(e) if !e.is_fatal() => {
            warn!("{} gave an unusable answer for {:?}: {}", classifier.name(), doc.title, e);
            RawClassification::default()
        }
        Err(e) => return Err(e.into()),
    };

    let assignment = assignment_from(&raw, doc, ctx);
    debug!(
        "Classified {:?} as {} (new: {}, fallback: {})",
        assignment.title, assignment.category, assignment.is_new, assignment.fell_back
    );
    Ok(assignment)
}
