//! Navigation index.
//!
//! The index is derived entirely from the docs tree: top-level documents,
//! one section per category directory, then the lecture series. It holds no
//! state of its own, and rebuilding it from the same tree gives
//! byte-identical output.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::domain::document::title_from_stem;
use crate::domain::{Category, Document};
use crate::library::store::{wrapper_name, DocStore, SeriesScan, TreeScan, LECTURES_DIR};

/// A link to one document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct NavEntry {
    /// Link text
    pub title: String,

    /// Path relative to the docs root, `/`-separated
    pub path: String,
}

/// A source file and its markdown wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceEntry {
    /// File name (e.g. `arena.rs`)
    pub name: String,

    /// Raw source path relative to the docs root
    pub source_path: String,

    /// Wrapper path relative to the docs root
    pub wrapper_path: String,
}

/// One category's block in the navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavSection {
    /// Directory name
    pub category: String,

    /// Display label
    pub label: String,

    /// README/index page of the category
    pub overview: Option<String>,

    /// Documents, ordered by path
    pub documents: Vec<NavEntry>,

    /// Source files, ordered by name
    pub sources: Vec<SourceEntry>,
}

impl NavSection {
    fn is_empty(&self) -> bool {
        self.overview.is_none() && self.documents.is_empty() && self.sources.is_empty()
    }
}

/// One lecture series under the lectures directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSection {
    /// Series directory name
    pub name: String,

    /// Display label
    pub label: String,

    /// Series `index.md`
    pub overview: Option<String>,

    pub lectures: Vec<NavEntry>,
    pub companions: Vec<NavEntry>,
    pub samples: Vec<NavEntry>,
}

impl SeriesSection {
    fn is_empty(&self) -> bool {
        self.overview.is_none() && self.lectures.is_empty() && self.companions.is_empty() && self.samples.is_empty()
    }

    fn len(&self) -> usize {
        self.lectures.len() + self.companions.len() + self.samples.len()
    }

    fn to_nav(&self) -> Value {
        let mut items = Vec::new();
        if let Some(ref overview) = self.overview {
            items.push(link("Overview", overview));
        }
        for (heading, entries) in [
            ("Lectures", &self.lectures),
            ("Companions", &self.companions),
            ("Samples", &self.samples),
        ] {
            if !entries.is_empty() {
                let links = entries.iter().map(|e| link(&e.title, &e.path)).collect();
                items.push(single(heading, Value::Sequence(links)));
            }
        }
        single(&self.label, Value::Sequence(items))
    }
}

/// Derived navigation structure for the whole docs tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationIndex {
    /// Documents at the docs root
    pub top_level: Vec<NavEntry>,

    /// Category sections, ordered by directory name
    pub sections: Vec<NavSection>,

    /// Lecture series, ordered by directory name
    pub series: Vec<SeriesSection>,
}

fn rel_path(docs_dir: &Path, path: &Path) -> String {
    path.strip_prefix(docs_dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn entry_for(docs_dir: &Path, doc: &Document) -> Option<NavEntry> {
    doc.filed_at.as_ref().map(|path| NavEntry {
        title: doc.title.clone(),
        path: rel_path(docs_dir, path),
    })
}

fn sorted_entries(docs_dir: &Path, docs: &[Document]) -> Vec<NavEntry> {
    let mut entries: Vec<NavEntry> = docs.iter().filter_map(|d| entry_for(docs_dir, d)).collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

fn series_section(docs_dir: &Path, series: &SeriesScan, labels: &HashMap<String, String>) -> SeriesSection {
    SeriesSection {
        name: series.name.clone(),
        label: section_label(&series.name, labels),
        overview: series.index.as_ref().map(|p| rel_path(docs_dir, p)),
        lectures: sorted_entries(docs_dir, &series.lectures),
        companions: sorted_entries(docs_dir, &series.companions),
        samples: sorted_entries(docs_dir, &series.samples),
    }
}

/// Label for a category directory; non-slug names are title-cased
pub fn section_label(name: &str, labels: &HashMap<String, String>) -> String {
    match Category::new(name) {
        Ok(category) => category.label(labels),
        Err(_) => labels
            .get(name)
            .cloned()
            .unwrap_or_else(|| title_from_stem(name)),
    }
}

impl NavigationIndex {
    /// Build the index from a tree scan. Input order does not matter.
    pub fn build(docs_dir: &Path, scan: &TreeScan, labels: &HashMap<String, String>) -> Self {
        let top_level = sorted_entries(docs_dir, &scan.top_level);

        let mut sections: Vec<NavSection> = scan
            .categories
            .iter()
            .map(|c| {
                let documents = sorted_entries(docs_dir, &c.documents);

                let mut sources: Vec<SourceEntry> = c
                    .sources
                    .iter()
                    .map(|src| SourceEntry {
                        name: src
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        source_path: rel_path(docs_dir, src),
                        wrapper_path: format!("{}/{}", c.name, wrapper_name(src)),
                    })
                    .collect();
                sources.sort_by(|a, b| a.name.cmp(&b.name));

                NavSection {
                    category: c.name.clone(),
                    label: section_label(&c.name, labels),
                    overview: c.overview.as_ref().map(|p| rel_path(docs_dir, p)),
                    documents,
                    sources,
                }
            })
            .filter(|s| !s.is_empty())
            .collect();
        sections.sort_by(|a, b| a.category.cmp(&b.category));

        let mut series: Vec<SeriesSection> = scan
            .series
            .iter()
            .map(|s| series_section(docs_dir, s, labels))
            .filter(|s| !s.is_empty())
            .collect();
        series.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            top_level,
            sections,
            series,
        }
    }

    /// Number of document entries (top-level, categorized and lectures)
    pub fn len(&self) -> usize {
        self.top_level.len()
            + self.sections.iter().map(|s| s.documents.len()).sum::<usize>()
            + self.series.iter().map(SeriesSection::len).sum::<usize>()
    }

    /// Whether the index lists no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the `index.md` landing page
    pub fn render_markdown(&self, site_title: &str) -> String {
        let mut lines = vec![
            format!("# {}", site_title),
            String::new(),
            format!("Welcome to **{}**.", site_title),
            String::new(),
            "## Topics".to_string(),
            String::new(),
        ];

        for entry in &self.top_level {
            lines.push(format!("- **[{}]({})**", entry.title, entry.path));
        }

        if !self.sections.is_empty() {
            lines.push(String::new());
            lines.push("## Deep Dives".to_string());
            lines.push(String::new());

            for section in &self.sections {
                lines.push(format!("### {}", section.label));
                lines.push(String::new());
                if let Some(ref overview) = section.overview {
                    lines.push(format!("- [Overview]({})", overview));
                }
                for entry in &section.documents {
                    lines.push(format!("- [{}]({})", entry.title, entry.path));
                }
                if !section.sources.is_empty() {
                    lines.push(String::new());
                    lines.push("**Source Files:**".to_string());
                    for src in &section.sources {
                        lines.push(format!(
                            "- `{}` [[src]]({}) [[doc]]({})",
                            src.name, src.source_path, src.wrapper_path
                        ));
                    }
                }
                lines.push(String::new());
            }
        }

        if !self.series.is_empty() {
            if lines.last().map_or(false, |l| !l.is_empty()) {
                lines.push(String::new());
            }
            lines.push("## Lecture Series".to_string());
            lines.push(String::new());

            for series in &self.series {
                let count = series.lectures.len();
                let count = format!("{} lecture{}", count, if count == 1 { "" } else { "s" });
                match series.overview {
                    Some(ref overview) => lines.push(format!("- **[{}]({})**: {}", series.label, overview, count)),
                    None => lines.push(format!("- **{}**: {}", series.label, count)),
                }
            }
        }

        let mut out = lines.join("\n");
        out.truncate(out.trim_end().len());
        out.push('\n');
        out
    }

    /// The mkdocs `nav` list: Home, top-level documents, then one nested
    /// list per docs directory in name order. The lectures directory becomes
    /// a `Lectures` list with one entry per series.
    pub fn to_mkdocs_nav(&self) -> Value {
        let mut nav = vec![link("Home", "index.md")];

        nav.extend(self.top_level.iter().map(|e| link(&e.title, &e.path)));

        let mut lectures = (!self.series.is_empty()).then(|| {
            let series = self.series.iter().map(SeriesSection::to_nav).collect();
            single("Lectures", Value::Sequence(series))
        });

        for section in &self.sections {
            if section.category.as_str() > LECTURES_DIR {
                nav.extend(lectures.take());
            }
            let mut items = Vec::new();
            if let Some(ref overview) = section.overview {
                items.push(link("Overview", overview));
            }
            items.extend(section.documents.iter().map(|e| link(&e.title, &e.path)));
            if !section.sources.is_empty() {
                let sources = section
                    .sources
                    .iter()
                    .map(|s| link(&s.name, &s.wrapper_path))
                    .collect();
                items.push(single("Source Files", Value::Sequence(sources)));
            }
            nav.push(single(&section.label, Value::Sequence(items)));
        }
        nav.extend(lectures);

        Value::Sequence(nav)
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::String(key.to_string()), value);
    Value::Mapping(map)
}

fn link(title: &str, path: &str) -> Value {
    single(title, Value::String(path.to_string()))
}

/// Rebuild the navigation index by scanning the docs tree
pub async fn regenerate_index(store: &DocStore, labels: &HashMap<String, String>) -> Result<NavigationIndex> {
    let scan = store.scan().await?;
    Ok(NavigationIndex::build(store.docs_dir(), &scan, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category::default_labels;
    use crate::domain::Source;
    use crate::library::store::CategoryScan;
    use std::path::PathBuf;

    fn filed(path: &str, title: &str) -> Document {
        let mut doc = Document::new(title, format!("# {}", title), Source::Manual);
        doc.filed_at = Some(PathBuf::from(path));
        doc
    }

    fn sample_scan(reverse: bool) -> TreeScan {
        let mut docs = vec![
            filed("/d/memory/borrowing.md", "Borrowing"),
            filed("/d/memory/ownership.md", "Ownership"),
        ];
        let mut categories = vec![
            CategoryScan {
                name: "stdlib".to_string(),
                overview: None,
                documents: vec![filed("/d/stdlib/vec.md", "Vec Growth")],
                sources: vec![PathBuf::from("/d/stdlib/vec.rs")],
            },
            CategoryScan {
                name: "empty".to_string(),
                overview: None,
                documents: vec![],
                sources: vec![],
            },
        ];
        if reverse {
            docs.reverse();
        }
        categories.push(CategoryScan {
            name: "memory".to_string(),
            overview: Some(PathBuf::from("/d/memory/README.md")),
            documents: docs,
            sources: vec![],
        });
        if reverse {
            categories.reverse();
        }

        TreeScan {
            top_level: vec![filed("/d/intro.md", "Intro")],
            categories,
            series: Vec::new(),
        }
    }

    #[test]
    fn test_build_is_order_independent() {
        let labels = default_labels();
        let a = NavigationIndex::build(Path::new("/d"), &sample_scan(false), &labels);
        let b = NavigationIndex::build(Path::new("/d"), &sample_scan(true), &labels);

        assert_eq!(a, b);
        assert_eq!(a.render_markdown("Docs"), b.render_markdown("Docs"));
        assert_eq!(
            serde_yaml::to_string(&a.to_mkdocs_nav()).unwrap(),
            serde_yaml::to_string(&b.to_mkdocs_nav()).unwrap()
        );
    }

    #[test]
    fn test_build_structure() {
        let index = NavigationIndex::build(Path::new("/d"), &sample_scan(false), &default_labels());

        assert_eq!(index.len(), 4);
        assert_eq!(index.sections.len(), 2); // empty category dropped
        assert_eq!(index.sections[0].category, "memory");
        assert_eq!(index.sections[0].overview.as_deref(), Some("memory/README.md"));
        assert_eq!(index.sections[0].documents[0].path, "memory/borrowing.md");
        assert_eq!(index.sections[1].label, "Standard Library");
        assert_eq!(index.sections[1].sources[0].wrapper_path, "stdlib/vec-src.md");
    }

    #[test]
    fn test_render_markdown() {
        let index = NavigationIndex::build(Path::new("/d"), &sample_scan(false), &default_labels());
        let md = index.render_markdown("Rust Notes");

        assert!(md.starts_with("# Rust Notes\n"));
        assert!(md.contains("- **[Intro](intro.md)**"));
        assert!(md.contains("### Memory\n\n- [Overview](memory/README.md)\n- [Borrowing](memory/borrowing.md)"));
        assert!(md.contains("- `vec.rs` [[src]](stdlib/vec.rs) [[doc]](stdlib/vec-src.md)"));
        assert!(md.ends_with(")\n"));
    }

    #[test]
    fn test_mkdocs_nav_shape() {
        let index = NavigationIndex::build(Path::new("/d"), &sample_scan(false), &default_labels());
        let yaml = serde_yaml::to_string(&index.to_mkdocs_nav()).unwrap();

        assert!(yaml.starts_with("- Home: index.md\n- Intro: intro.md\n- Memory:\n"));
        assert!(yaml.contains("  - Overview: memory/README.md\n"));
        assert!(yaml.contains("- Standard Library:\n"));
        assert!(yaml.contains("  - Source Files:\n    - vec.rs: stdlib/vec-src.md\n"));
    }

    fn lecture_scan() -> TreeScan {
        let mut scan = sample_scan(false);
        scan.series = vec![
            SeriesScan {
                name: "tokio-internals".to_string(),
                index: None,
                lectures: vec![filed("/d/lectures/tokio-internals/lectures/01.md", "Reactor")],
                ..Default::default()
            },
            SeriesScan {
                name: "ripgrep".to_string(),
                index: Some(PathBuf::from("/d/lectures/ripgrep/index.md")),
                lectures: vec![
                    filed("/d/lectures/ripgrep/lectures/02-search.md", "Searching"),
                    filed("/d/lectures/ripgrep/lectures/01-intro.md", "Intro"),
                ],
                companions: vec![filed("/d/lectures/ripgrep/companions/glossary.md", "Glossary")],
                samples: vec![],
            },
            SeriesScan {
                name: "empty".to_string(),
                ..Default::default()
            },
        ];
        scan
    }

    #[test]
    fn test_lecture_series_nav() {
        let index = NavigationIndex::build(Path::new("/d"), &lecture_scan(), &default_labels());

        assert_eq!(index.series.len(), 2);
        assert_eq!(index.series[0].name, "ripgrep");
        assert_eq!(index.series[0].lectures[0].path, "lectures/ripgrep/lectures/01-intro.md");
        assert_eq!(index.len(), 8);

        let nav = index.to_mkdocs_nav();
        let nav = nav.as_sequence().unwrap();
        // Home, Intro, Lectures, Memory, Standard Library
        assert_eq!(nav.len(), 5);
        let ripgrep = &nav[2]["Lectures"][0]["Ripgrep"];
        assert_eq!(ripgrep[0]["Overview"].as_str(), Some("lectures/ripgrep/index.md"));
        assert_eq!(
            ripgrep[1]["Lectures"][0]["Intro"].as_str(),
            Some("lectures/ripgrep/lectures/01-intro.md")
        );
        assert_eq!(
            ripgrep[2]["Companions"][0]["Glossary"].as_str(),
            Some("lectures/ripgrep/companions/glossary.md")
        );
        assert_eq!(ripgrep.as_sequence().unwrap().len(), 3);
        assert!(nav[2]["Lectures"][1]["Tokio Internals"].is_sequence());
        assert!(nav[3]["Memory"].is_sequence());
    }

    #[test]
    fn test_lecture_series_markdown() {
        let index = NavigationIndex::build(Path::new("/d"), &lecture_scan(), &default_labels());
        let md = index.render_markdown("Rust Notes");

        assert!(md.contains("\n\n## Lecture Series\n\n- **[Ripgrep](lectures/ripgrep/index.md)**: 2 lectures\n"));
        assert!(md.ends_with("- **Tokio Internals**: 1 lecture\n"));
        assert!(!md.contains("\n\n\n"));
    }

    #[test]
    fn test_section_label_for_non_slug_dir() {
        let labels = HashMap::new();
        assert_eq!(section_label("error-handling", &labels), "Error Handling");
        assert_eq!(section_label("Lectures_2024", &labels), "Lectures 2024");
    }
}
