//! Content sources and the article manifest
//!
//! The viewer never touches the filesystem directly: it asks a
//! [`ContentSource`] for text or bytes at a relative path. The manifest is a
//! JSON array of `{ "title", "file", "id" }` entries; anything that is not a
//! non-empty array means "no article list" and the viewer falls back to a
//! single document.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while fetching content
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not valid UTF-8 text")]
    InvalidText(String),
}

/// Something the viewer can fetch article content from
pub trait ContentSource {
    /// Fetch raw bytes at `path`
    fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetch UTF-8 text at `path`
    fn fetch_text(&self, path: &str) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| FetchError::InvalidText(path.to_string()))
    }
}

/// Content served from a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches("./"))
    }
}

impl ContentSource for DirectorySource {
    fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full_path = self.resolve(path);
        log::debug!("Fetching {}", full_path.display());
        std::fs::read(&full_path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(path.to_string()),
            _ => FetchError::Io {
                path: path.to_string(),
                source: e,
            },
        })
    }
}

/// Content held in memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file
    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: &str, content: impl Into<Vec<u8>>) {
        self.files
            .insert(path.trim_start_matches("./").to_string(), content.into());
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path.trim_start_matches("./"));
    }
}

impl ContentSource for MemorySource {
    fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(path.trim_start_matches("./"))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }
}

/// Manifest entry as written in `articles.json`
#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    title: Option<String>,
    file: String,
    #[serde(default)]
    id: Option<String>,
}

/// An article listed in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Display title
    pub title: String,
    /// Path of the article document, relative to the content source
    pub file: String,
    /// Optional stable identifier
    pub id: Option<String>,
}

/// Parse manifest JSON into an article list
///
/// Returns `None` for malformed JSON, a non-array document or an empty list.
/// Articles without a title are named `Article N` (1-based).
pub fn parse_manifest(json: &str) -> Option<Vec<Article>> {
    let entries: Vec<ManifestEntry> = match serde_json::from_str(json) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Manifest is not an article list: {}", e);
            return None;
        }
    };
    if entries.is_empty() {
        return None;
    }

    let articles = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Article {
            title: entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Article {}", index + 1)),
            file: entry.file,
            id: entry.id,
        })
        .collect();
    Some(articles)
}

/// Fetch and parse the manifest, treating every failure as "no article list"
pub fn load_manifest<S: ContentSource + ?Sized>(source: &S, path: &str) -> Option<Vec<Article>> {
    match source.fetch_text(path) {
        Ok(json) => parse_manifest(&json),
        Err(e) => {
            log::debug!("No article manifest at {}: {}", path, e);
            None
        }
    }
}

/// How a document's content is turned into markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Pre-rendered HTML
    Markup,
    /// Markdown, rendered with pulldown-cmark
    Markdown,
    /// Word document, converted to HTML
    Docx,
}

impl ContentKind {
    /// Determine the kind from a path's extension (case-insensitive)
    pub fn from_path(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "docx" => ContentKind::Docx,
            "md" | "markdown" => ContentKind::Markdown,
            _ => ContentKind::Markup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let json = r#"[
            {"title": "First", "file": "articles/first.html"},
            {"file": "articles/second.docx", "id": "second"},
            {"title": "  ", "file": "articles/third.md"}
        ]"#;
        let articles = parse_manifest(json).unwrap();
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].title, "First");
        assert_eq!(articles[1].title, "Article 2");
        assert_eq!(articles[1].id.as_deref(), Some("second"));
        assert_eq!(articles[2].title, "Article 3");
    }

    #[test]
    fn test_malformed_manifest_falls_back() {
        assert!(parse_manifest("[]").is_none());
        assert!(parse_manifest("{\"title\": \"x\"}").is_none());
        assert!(parse_manifest("not json").is_none());
        assert!(parse_manifest("[{\"title\": \"no file\"}]").is_none());
    }

    #[test]
    fn test_content_kind_from_path() {
        assert_eq!(ContentKind::from_path("a/b.DOCX"), ContentKind::Docx);
        assert_eq!(ContentKind::from_path("notes.md"), ContentKind::Markdown);
        assert_eq!(ContentKind::from_path("page.html"), ContentKind::Markup);
        assert_eq!(ContentKind::from_path("content"), ContentKind::Markup);
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("content.html"), "<p>hi</p>").unwrap();
        let source = DirectorySource::new(dir.path());

        assert_eq!(source.fetch_text("./content.html").unwrap(), "<p>hi</p>");
        assert!(matches!(
            source.fetch_text("missing.html"),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_source_rejects_invalid_text() {
        let source = MemorySource::new().with_file("bin", vec![0xff, 0xfe]);
        assert!(matches!(
            source.fetch_text("bin"),
            Err(FetchError::InvalidText(_))
        ));
        assert!(load_manifest(&source, "articles/articles.json").is_none());
    }
}
