//! The docs tree on disk.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── mkdocs.yml                # nav: section is generated
//! └── docs/
//!     ├── index.md              # generated landing page
//!     ├── intro.md              # top-level documents
//!     ├── notes.md              # unfiled until `docfiler sync`
//!     ├── <category>/           # one directory per topic
//!     │   ├── README.md         # optional overview
//!     │   ├── <slug>.md         # filed documents
//!     │   ├── arena.rs          # source file
//!     │   └── arena-src.md      # generated wrapper
//!     └── lectures/
//!         └── <series>/         # listed under "Lectures", never filed into
//!             ├── index.md
//!             ├── lectures/
//!             ├── companions/
//!             └── samples/
//! ```

pub mod site;
pub mod store;

pub use site::{update_mkdocs_nav, write_index_page, write_source_wrappers};
pub use store::{CategoryScan, DocStore, SeriesScan, TreeScan};
