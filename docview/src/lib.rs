//! docview - document viewer core
//!
//! Loads articles (pre-rendered HTML, Markdown or .docx), builds a navigable
//! outline from their headings, tracks the active heading while scrolling and
//! highlights literal search matches scoped to a heading's section. Also
//! extracts .docx files into browsable `index.html` + `images/` archives.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::pedantic))]
// Allow some pedantic lints that are too strict for this project
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

// Content tree and the core engines
pub mod dom;
pub mod highlight;
pub mod outline;
pub mod section;

// Controller and its collaborators
pub mod archive;
pub mod config;
pub mod docx;
pub mod observer;
pub mod page;
pub mod source;
pub mod viewer;

pub use config::ViewerConfig;
pub use outline::{HeadingNode, IdPolicy, Outline};
pub use source::{ContentSource, DirectorySource, MemorySource};
pub use viewer::{Viewer, ViewerError};
