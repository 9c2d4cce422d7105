//! Documents moving through the filing pipeline.
//!
//! A document is created when new markdown arrives, classified, then either
//! rejected as a duplicate or written into a category directory. Filed
//! documents carry HTML comment markers recording where they came from.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::category::Category;

/// Marker appended to every document filed by this tool
pub const PROCESSED_MARKER: &str = "<!-- ProcessedBy: docfiler -->";

/// Prefix shared by our marker and the older `sync_docs` one
const PROCESSED_PREFIX: &str = "<!-- ProcessedBy:";

/// Where a document came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Source {
    /// Generated from an external source (e.g. a YouTube video id)
    External(String),

    /// Added by hand, no external identity
    Manual,
}

impl Source {
    /// Parse a source argument.
    ///
    /// YouTube URLs are reduced to their video id; anything else is kept as
    /// an opaque identifier, normalized so it can live inside a marker
    /// comment. Empty input or `manual` means a manual document.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("manual") {
            return Source::Manual;
        }

        match extract_video_id(trimmed) {
            Some(id) => Source::External(id),
            None => Source::External(normalize_source_id(trimmed)),
        }
    }

    /// External identifier, if any
    pub fn id(&self) -> Option<&str> {
        match self {
            Source::External(id) => Some(id),
            Source::Manual => None,
        }
    }

    /// Identity used for duplicate matching; equal to what a marker reads
    /// back as
    pub fn key(&self) -> Option<String> {
        self.id().map(normalize_source_id).filter(|k| !k.is_empty())
    }

    /// Marker comment recording this source in a filed document
    pub fn marker(&self) -> Option<String> {
        self.key().map(|id| format!("<!-- SourceId: {} -->", id))
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::External(id) => write!(f, "{}", id),
            Source::Manual => write!(f, "manual"),
        }
    }
}

/// A unit of markdown content to be filed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Human-readable title
    pub title: String,

    /// Markdown body
    pub body: String,

    /// Originating source
    pub source: Source,

    /// Topic category, once classified or filed
    pub category: Option<Category>,

    /// Where the document was read from, for unfiled documents
    pub origin: Option<PathBuf>,

    /// Filed location, once written into a category
    pub filed_at: Option<PathBuf>,
}

impl Document {
    /// Create a new, unfiled document
    pub fn new(title: impl Into<String>, body: impl Into<String>, source: Source) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            source,
            category: None,
            origin: None,
            filed_at: None,
        }
    }

    /// Build a document from raw markdown, taking the title from its first
    /// H1 or, failing that, from the file stem.
    pub fn from_markdown(body: impl Into<String>, source: Source, origin: Option<&Path>) -> Self {
        let body = body.into();
        let title = first_heading(&body)
            .or_else(|| {
                origin
                    .and_then(|p| p.file_stem())
                    .map(|s| title_from_stem(&s.to_string_lossy()))
            })
            .unwrap_or_else(|| "Untitled".to_string());

        Self {
            title,
            body,
            source,
            category: None,
            origin: origin.map(Path::to_path_buf),
            filed_at: None,
        }
    }

    /// Reconstruct a document already filed at `path`
    pub fn from_filed(path: &Path, body: String, category: Option<Category>) -> Self {
        let source = source_marker(&body)
            .map(Source::External)
            .unwrap_or(Source::Manual);
        let mut doc = Self::from_markdown(body, source, Some(path));
        doc.origin = None;
        doc.category = category;
        doc.filed_at = Some(path.to_path_buf());
        doc
    }

    /// Attach the path the document was read from
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Whether the body already carries a docfiler (or legacy) marker
    pub fn is_processed(&self) -> bool {
        is_processed(&self.body)
    }

    /// Title reduced to lowercase alphanumeric words
    pub fn normalized_title(&self) -> String {
        normalize_words(&self.title)
    }

    /// SHA256 of the body with markers and the leading heading removed and
    /// whitespace normalized.
    pub fn fingerprint(&self) -> String {
        let stripped = strip_markers(&self.body);
        let normalized: Vec<&str> = stripped
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .skip_while(|l| l.starts_with("# "))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(normalized.join("\n").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Final file content: heading set to the title, markers appended once
    pub fn render(&self) -> String {
        let body = set_heading(&strip_markers(&self.body), &self.title);
        let mut out = body.trim_end().to_string();
        out.push_str("\n\n");
        if let Some(marker) = self.source.marker() {
            out.push_str(&marker);
            out.push('\n');
        }
        out.push_str(PROCESSED_MARKER);
        out.push('\n');
        out
    }
}

fn video_id_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"youtu\.be/([a-zA-Z0-9_-]{11})",
            r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})",
            r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
            r"youtube\.com/v/([a-zA-Z0-9_-]{11})",
            r"^([a-zA-Z0-9_-]{11})$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Extract a YouTube video id from the common URL shapes or a bare id
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!--\s*(?:SourceId|VideoId):\s*(.+?)\s*-->").expect("valid marker regex")
    })
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").expect("valid heading regex"))
}

/// Source id recorded in a `SourceId`/`VideoId` marker
pub fn source_marker(body: &str) -> Option<String> {
    marker_regex()
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| normalize_source_id(m.as_str()))
        .filter(|id| !id.is_empty())
}

/// `lecture  3` -> `lecture-3`. Whitespace and `--` cannot appear inside an
/// HTML comment marker.
pub fn normalize_source_id(id: &str) -> String {
    let joined = id.split_whitespace().collect::<Vec<_>>().join("-");
    let mut out = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Whether markdown carries any processing marker
pub fn is_processed(body: &str) -> bool {
    body.contains(PROCESSED_PREFIX) || source_marker(body).is_some()
}

/// Byte range and text of the first H1 outside fenced code blocks
fn find_heading(body: &str) -> Option<(Range<usize>, &str)> {
    let mut offset = 0;
    let mut fence: Option<&str> = None;

    for line in body.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let content = line.trim_end_matches(|c| c == '\n' || c == '\r');
        let trimmed = content.trim_start();

        if let Some(marker) = fence {
            if trimmed.starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = ["```", "~~~"].into_iter().find(|m| trimmed.starts_with(m)) {
            fence = Some(marker);
            continue;
        }

        let Some(caps) = heading_regex().captures(content) else {
            continue;
        };
        let (Some(whole), Some(text)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let text = text.as_str().trim();
        if !text.is_empty() {
            return Some((start + whole.start()..start + whole.end(), text));
        }
    }
    None
}

/// Text of the first H1 heading
pub fn first_heading(body: &str) -> Option<String> {
    find_heading(body).map(|(_, text)| text.to_string())
}

/// `borrow-checker_basics` -> `Borrow Checker Basics`
pub fn title_from_stem(stem: &str) -> String {
    stem.split(|c| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn normalize_words(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove marker lines
pub fn strip_markers(body: &str) -> String {
    body.lines()
        .filter(|line| {
            let t = line.trim();
            !(t.starts_with(PROCESSED_PREFIX) || marker_regex().is_match(t))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replace the first H1 with `title`, or prepend one when missing
fn set_heading(body: &str, title: &str) -> String {
    match find_heading(body) {
        Some((range, _)) => {
            let mut out = String::with_capacity(body.len() + title.len());
            out.push_str(&body[..range.start]);
            out.push_str("# ");
            out.push_str(title);
            out.push_str(&body[range.end..]);
            out
        }
        None => format!("# {}\n\n{}", title, body.trim_start()),
    }
}
