//! Navigation and search controller
//!
//! [`Viewer`] ties the pieces together for one browsing session: it loads an
//! article from a [`ContentSource`], rebuilds the outline, owns the heading
//! observer and applies scoped searches to the loaded tree.
//!
//! Loading is atomic from the caller's point of view. The new tree is fetched,
//! parsed and outlined off to the side; only when every step succeeded is it
//! swapped in, together with a fresh observer and a reset search state. A
//! failed load leaves the current view exactly as it was and queues a
//! notification instead.

use crate::config::ViewerConfig;
use crate::docx::{ConvertError, DocxConverter, NO_CONTENT};
use crate::dom;
use crate::highlight;
use crate::observer::{HeadingObserver, Visibility};
use crate::outline::Outline;
use crate::section;
use crate::source::{load_manifest, Article, ContentKind, ContentSource, FetchError};
use markup5ever_rcdom::Handle;
use pulldown_cmark::{html, Options, Parser};
use thiserror::Error;

/// Scope value meaning "search the whole article"
pub const ALL_SCOPE: &str = "__ALL__";

/// Label of the whole-article scope
pub const ALL_SCOPE_LABEL: &str = "Entire document";

/// Errors raised while loading content
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("failed to load {path}: {source}")]
    Fetch {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to convert {path}: {source}")]
    Convert {
        path: String,
        #[source]
        source: ConvertError,
    },

    #[error("article {0} does not exist")]
    NoSuchArticle(usize),
}

/// One entry of the search scope selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChoice {
    /// Heading id, or [`ALL_SCOPE`]
    pub value: String,
    /// Display label, indented by heading level
    pub label: String,
}

/// The tree currently shown, with its outline
struct LoadedContent {
    /// Document node; holds the whole tree alive
    _document: Handle,
    root: Handle,
    outline: Outline,
    path: String,
}

/// Viewer state for one session
pub struct Viewer<S> {
    source: S,
    config: ViewerConfig,
    converter: DocxConverter,
    articles: Vec<Article>,
    selected: Option<usize>,
    content: Option<LoadedContent>,
    observer: Option<HeadingObserver>,
    query: String,
    scope: String,
    match_count: usize,
    anchor: Option<String>,
    generation: u64,
    notifications: Vec<String>,
}

impl<S: ContentSource> Viewer<S> {
    /// Create a viewer with nothing loaded
    pub fn new(source: S, config: ViewerConfig) -> Self {
        Self {
            source,
            config,
            converter: DocxConverter::new(),
            articles: Vec::new(),
            selected: None,
            content: None,
            observer: None,
            query: String::new(),
            scope: ALL_SCOPE.to_string(),
            match_count: 0,
            anchor: None,
            generation: 0,
            notifications: Vec::new(),
        }
    }

    /// Create a viewer and load the initial content
    ///
    /// With a usable manifest the first article is loaded; otherwise the
    /// fallback document is shown. Load failures are queued as notifications.
    pub fn open(source: S, config: ViewerConfig) -> Self {
        let mut viewer = Self::new(source, config);

        match load_manifest(&viewer.source, &viewer.config.manifest) {
            Some(articles) => {
                log::info!("Manifest lists {} articles", articles.len());
                viewer.articles = articles;
                viewer.select_article(0);
            }
            None => {
                let path = viewer.config.fallback_document.clone();
                log::info!("No article list, showing {}", path);
                if let Err(e) = viewer.load_document(&path) {
                    viewer.notify(&e);
                }
            }
        }

        viewer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Articles from the manifest (empty in single-document mode)
    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Index of the article currently shown
    pub fn selected_article(&self) -> Option<usize> {
        self.selected
    }

    /// Path of the document currently shown
    pub fn document_path(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.path.as_str())
    }

    pub fn outline(&self) -> Option<&Outline> {
        self.content.as_ref().map(|c| &c.outline)
    }

    /// Root of the loaded article tree
    pub fn content_root(&self) -> Option<&Handle> {
        self.content.as_ref().map(|c| &c.root)
    }

    /// Serialised article markup, including any highlights
    pub fn content_html(&self) -> String {
        self.content
            .as_ref()
            .map(|c| dom::inner_html(&c.root))
            .unwrap_or_default()
    }

    /// Query of the last search (trimmed)
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Scope of the last search
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Number of highlighted matches
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Location anchor (`#id`) set by the last navigation
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Number of content swaps so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pending user-facing notifications
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, error: &ViewerError) {
        log::warn!("{}", error);
        self.notifications.push(error.to_string());
    }

    /// Load the manifest article at `index`
    pub fn load_article(&mut self, index: usize) -> Result<(), ViewerError> {
        let path = self
            .articles
            .get(index)
            .map(|article| article.file.clone())
            .ok_or(ViewerError::NoSuchArticle(index))?;

        self.load_document(&path)?;
        self.selected = Some(index);
        Ok(())
    }

    /// Select an article, reporting failures as notifications
    ///
    /// Returns whether the article is now shown.
    pub fn select_article(&mut self, index: usize) -> bool {
        match self.load_article(index) {
            Ok(()) => true,
            Err(e) => {
                self.notify(&e);
                false
            }
        }
    }

    /// Load a document by path, replacing the current view on success
    pub fn load_document(&mut self, path: &str) -> Result<(), ViewerError> {
        let markup = self.fetch_markup(path)?;

        let parsed = dom::parse_document(&markup);
        let root = dom::content_root(&parsed);
        let outline = Outline::build(&root, self.config.id_policy);
        let heading_ids: Vec<String> = outline.iter().filter_map(|h| h.id.clone()).collect();

        // Everything below only swaps state in
        if let Some(mut previous) = self.observer.take() {
            previous.disconnect();
        }
        highlight::clear_highlights(&root);
        self.observer = Some(HeadingObserver::observe(
            heading_ids,
            self.config.observer_threshold,
        ));
        self.content = Some(LoadedContent {
            _document: parsed.document.clone(),
            root,
            outline,
            path: path.to_string(),
        });
        self.selected = None;
        self.scope = ALL_SCOPE.to_string();
        self.match_count = 0;
        self.anchor = None;
        self.generation += 1;

        log::info!(
            "Loaded {} ({} headings, generation {})",
            path,
            self.outline().map_or(0, Outline::len),
            self.generation
        );
        Ok(())
    }

    fn fetch_markup(&self, path: &str) -> Result<String, ViewerError> {
        let fetch_error = |source| ViewerError::Fetch {
            path: path.to_string(),
            source,
        };

        match ContentKind::from_path(path) {
            ContentKind::Markup => self.source.fetch_text(path).map_err(fetch_error),
            ContentKind::Markdown => {
                let text = self.source.fetch_text(path).map_err(fetch_error)?;
                Ok(render_markdown(&text))
            }
            ContentKind::Docx => {
                let bytes = self.source.fetch_bytes(path).map_err(fetch_error)?;
                let converted = self.converter.convert_inline(&bytes).map_err(|source| {
                    ViewerError::Convert {
                        path: path.to_string(),
                        source,
                    }
                })?;
                if converted.html.trim().is_empty() {
                    Ok(NO_CONTENT.to_string())
                } else {
                    Ok(converted.html)
                }
            }
        }
    }

    /// Search scope choices: the whole article, then every heading in order
    pub fn scope_choices(&self) -> Vec<ScopeChoice> {
        let mut choices = vec![ScopeChoice {
            value: ALL_SCOPE.to_string(),
            label: ALL_SCOPE_LABEL.to_string(),
        }];

        if let Some(content) = &self.content {
            choices.extend(content.outline.iter().filter_map(|heading| {
                Some(ScopeChoice {
                    value: heading.id.clone()?,
                    label: format!("{}{}", scope_indent(heading.level), heading.text),
                })
            }));
        }
        choices
    }

    /// Highlight `query` within `scope`, returning the number of matches
    ///
    /// Previous highlights are always cleared first. The query is trimmed; an
    /// empty query only clears. `scope` is [`ALL_SCOPE`] (or empty) for the whole
    /// article, or a heading id to search that heading's section. An unknown
    /// heading id matches nothing.
    pub fn search(&mut self, scope: &str, query: &str) -> usize {
        self.query = query.trim().to_string();
        self.scope = if scope.is_empty() {
            ALL_SCOPE.to_string()
        } else {
            scope.to_string()
        };
        self.match_count = 0;

        let Some(content) = self.content.as_ref() else {
            return 0;
        };
        highlight::clear_highlights(&content.root);
        if self.query.is_empty() {
            return 0;
        }

        let count = if self.scope == ALL_SCOPE {
            highlight::highlight(&content.root, &self.query)
        } else {
            let section = content
                .outline
                .find(&self.scope)
                .and_then(|heading| section::resolve_section(&heading.element));
            match section {
                Some(section) => section
                    .nodes()
                    .iter()
                    .map(|node| highlight::highlight(node, &self.query))
                    .sum(),
                None => {
                    log::debug!("No section for scope '{}'", self.scope);
                    0
                }
            }
        };

        log::info!(
            "Search for {:?} in {} found {} matches",
            self.query,
            self.scope,
            count
        );
        self.match_count = count;
        count
    }

    /// Remove all highlights and reset the match count
    pub fn clear(&mut self) {
        if let Some(content) = &self.content {
            highlight::clear_highlights(&content.root);
        }
        self.match_count = 0;
    }

    /// Feed heading visibility reports to the observer
    ///
    /// Returns the active navigation entry afterwards.
    pub fn report_visibility(&mut self, entries: &[Visibility]) -> Option<&str> {
        self.observer.as_mut()?.report(entries)
    }

    /// Id of the active navigation entry
    pub fn active_entry(&self) -> Option<&str> {
        self.observer.as_ref()?.active()
    }

    /// Navigate to the element with `id`, returning the new location anchor
    ///
    /// Only the anchor changes; the content is not reloaded. Unknown ids
    /// return `None` and leave the anchor alone.
    pub fn navigate(&mut self, id: &str) -> Option<String> {
        let content = self.content.as_ref()?;
        let exists = content.outline.find(id).is_some()
            || dom::descendants(&content.root)
                .iter()
                .any(|node| dom::attr(node, "id").as_deref() == Some(id));
        if !exists {
            log::debug!("Cannot navigate to unknown id '{}'", id);
            return None;
        }

        let anchor = format!("#{}", id);
        self.anchor = Some(anchor.clone());
        Some(anchor)
    }
}

/// Scope label prefix for a heading level
fn scope_indent(level: u8) -> &'static str {
    match level {
        1 => "",
        2 => "— ",
        _ => "—— ",
    }
}

/// Render a Markdown article to HTML
fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(text, options);
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}
