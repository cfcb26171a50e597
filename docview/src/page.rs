//! HTML rendering of the viewer page
//!
//! This module renders a [`Viewer`] as a single standalone HTML page with:
//! - The article list, with the selected article marked active
//! - The table of contents, one `li.lvl-N` entry per heading
//! - The search form (scope selector, query, match count)
//! - The article itself, including current search highlights

use crate::source::ContentSource;
use crate::viewer::Viewer;

/// Render the full viewer page
pub fn render_page<S: ContentSource>(viewer: &Viewer<S>) -> String {
    let mut output = String::new();

    let title = viewer
        .selected_article()
        .and_then(|index| viewer.articles().get(index))
        .map(|article| article.title.as_str())
        .or_else(|| viewer.document_path())
        .unwrap_or("Document");
    write_html_header(&mut output, title);

    output.push_str("<body>\n");
    output.push_str("<div class=\"layout\">\n");

    output.push_str("<aside class=\"sidebar\">\n");
    write_article_list(&mut output, viewer);
    write_toc(&mut output, viewer);
    output.push_str("</aside>\n");

    output.push_str("<main class=\"content\">\n");
    write_notifications(&mut output, viewer);
    write_search_form(&mut output, viewer);
    output.push_str("<article id=\"article\">\n");
    output.push_str(&viewer.content_html());
    output.push_str("\n</article>\n");
    output.push_str("</main>\n");

    output.push_str("</div>\n");
    output.push_str("</body>\n");
    output.push_str("</html>\n");

    output
}

/// Write HTML header with CSS styling
fn write_html_header(output: &mut String, title: &str) {
    output.push_str("<!DOCTYPE html>\n");
    output.push_str("<html lang=\"en\">\n");
    output.push_str("<head>\n");
    output.push_str("<meta charset=\"UTF-8\">\n");
    output.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    output.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    output.push_str("<style>\n");
    output.push_str(CSS_STYLES);
    output.push_str("</style>\n");
    output.push_str("</head>\n");
}

/// Write the manifest article list (nothing in single-document mode)
fn write_article_list<S: ContentSource>(output: &mut String, viewer: &Viewer<S>) {
    if viewer.articles().is_empty() {
        return;
    }

    output.push_str("<nav id=\"article-list\">\n<ul>\n");
    for (index, article) in viewer.articles().iter().enumerate() {
        let class = if viewer.selected_article() == Some(index) {
            "lvl-1 active"
        } else {
            "lvl-1"
        };
        output.push_str(&format!(
            "<li class=\"{}\"><a href=\"#\" data-file=\"{}\">{}</a></li>\n",
            class,
            escape_html(&article.file),
            escape_html(&article.title)
        ));
    }
    output.push_str("</ul>\n</nav>\n");
}

/// Write the table of contents in document order
fn write_toc<S: ContentSource>(output: &mut String, viewer: &Viewer<S>) {
    output.push_str("<nav id=\"toc\">\n<ul>\n");
    if let Some(outline) = viewer.outline() {
        let active = viewer.active_entry();
        for heading in outline.iter() {
            let Some(id) = heading.id.as_deref() else {
                continue;
            };
            let class = if active == Some(id) {
                format!("lvl-{} active", heading.level)
            } else {
                format!("lvl-{}", heading.level)
            };
            let id = escape_html(id);
            output.push_str(&format!(
                "<li class=\"{class}\"><a href=\"#{id}\" data-target-id=\"{id}\">{}</a></li>\n",
                escape_html(&heading.text)
            ));
        }
    }
    output.push_str("</ul>\n</nav>\n");
}

fn write_search_form<S: ContentSource>(output: &mut String, viewer: &Viewer<S>) {
    output.push_str("<form class=\"search\" role=\"search\">\n");

    output.push_str("<select id=\"scope-select\" name=\"scope\">\n");
    for choice in viewer.scope_choices() {
        let selected = if choice.value == viewer.scope() {
            " selected"
        } else {
            ""
        };
        output.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>\n",
            escape_html(&choice.value),
            selected,
            escape_html(&choice.label)
        ));
    }
    output.push_str("</select>\n");

    output.push_str(&format!(
        "<input id=\"search-input\" name=\"q\" type=\"search\" value=\"{}\">\n",
        escape_html(viewer.query())
    ));
    output.push_str("<button id=\"search-btn\" type=\"submit\">Search</button>\n");
    output.push_str("<button id=\"clear-btn\" type=\"reset\">Clear</button>\n");
    output.push_str(&format!(
        "<span class=\"count\">Matches: <span id=\"search-count\">{}</span></span>\n",
        viewer.match_count()
    ));

    output.push_str("</form>\n");
}

fn write_notifications<S: ContentSource>(output: &mut String, viewer: &Viewer<S>) {
    for message in viewer.notifications() {
        output.push_str(&format!(
            "<div class=\"notice\" role=\"alert\">{}</div>\n",
            escape_html(message)
        ));
    }
}

/// Escape HTML special characters
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS_STYLES: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', 'Oxygen',
                 'Ubuntu', 'Cantarell', 'Fira Sans', 'Droid Sans', 'Helvetica Neue',
                 sans-serif;
    line-height: 1.6;
    color: #333;
    background-color: #f5f5f5;
}

.layout {
    display: flex;
    height: 100vh;
}

.sidebar {
    width: 280px;
    overflow-y: auto;
    background: white;
    border-right: 1px solid #e0e0e0;
    padding: 20px;
}

.sidebar ul {
    list-style: none;
}

.sidebar a {
    display: block;
    padding: 4px 8px;
    color: #333;
    text-decoration: none;
    border-radius: 4px;
}

.sidebar li.active > a {
    background-color: #e8f0fe;
    color: #0066cc;
    font-weight: 600;
}

#article-list {
    margin-bottom: 20px;
    padding-bottom: 20px;
    border-bottom: 2px solid #e0e0e0;
}

.lvl-2 {
    padding-left: 16px;
}

.lvl-3 {
    padding-left: 32px;
    font-size: 0.95em;
}

.content {
    flex: 1;
    overflow-y: auto;
    padding: 40px 60px;
}

.search {
    display: flex;
    gap: 8px;
    align-items: center;
    margin-bottom: 30px;
}

.search input {
    flex: 1;
    padding: 6px 10px;
    border: 1px solid #ccc;
    border-radius: 4px;
}

.notice {
    margin-bottom: 20px;
    padding: 12px 16px;
    background-color: #fdecea;
    border-left: 4px solid #d93025;
    border-radius: 4px;
}

#article {
    max-width: 900px;
    background: white;
    padding: 60px;
    box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
    border-radius: 4px;
}

#article h1, #article h2, #article h3 {
    margin-top: 32px;
    margin-bottom: 16px;
    color: #1a1a1a;
    scroll-margin-top: 20px;
}

#article p {
    margin-bottom: 16px;
}

#article img {
    max-width: 100%;
    height: auto;
}

#article table {
    border-collapse: collapse;
    margin-bottom: 16px;
}

#article td {
    border: 1px solid #ddd;
    padding: 6px 10px;
}

mark.search-hit {
    background-color: #ffeb3b;
    padding: 0 1px;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;
    use crate::observer::Visibility;
    use crate::source::MemorySource;

    fn viewer() -> Viewer<MemorySource> {
        let source = MemorySource::new()
            .with_file(
                "articles/articles.json",
                r#"[{"title": "Cats & Dogs", "file": "articles/pets.html"},
                    {"title": "Other", "file": "articles/other.html"}]"#,
            )
            .with_file(
                "articles/pets.html",
                "<h1>Pets</h1><p>cat</p><h2>Care &amp; Feeding</h2><p>cat food</p>",
            );
        Viewer::open(source, ViewerConfig::default())
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<div>"), "&lt;div&gt;");
        assert_eq!(escape_html("a & b"), "a &amp; b");
        assert_eq!(escape_html("\"quoted\""), "&quot;quoted&quot;");
        assert_eq!(escape_html("it's"), "it&#39;s");
    }

    #[test]
    fn test_page_structure() {
        let page = render_page(&viewer());
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>Cats &amp; Dogs</title>"));
        assert!(page.contains(
            "<li class=\"lvl-1 active\"><a href=\"#\" data-file=\"articles/pets.html\">Cats &amp; Dogs</a></li>"
        ));
        assert!(page.contains(
            "<li class=\"lvl-1\"><a href=\"#pets\" data-target-id=\"pets\">Pets</a></li>"
        ));
        assert!(page.contains(
            "<li class=\"lvl-2\"><a href=\"#care-&amp;-feeding\" data-target-id=\"care-&amp;-feeding\">Care &amp; Feeding</a></li>"
        ));
        assert!(page.contains("<option value=\"__ALL__\" selected>Entire document</option>"));
        assert!(page.contains("<option value=\"pets\">Pets</option>"));
        assert!(page.contains("<span id=\"search-count\">0</span>"));
    }

    #[test]
    fn test_page_reflects_search_and_scroll_state() {
        let mut viewer = viewer();
        viewer.search("pets", "cat");
        viewer.report_visibility(&[Visibility::new("pets", 1.0)]);

        let page = render_page(&viewer);
        assert!(page.contains("<option value=\"pets\" selected>Pets</option>"));
        assert!(page.contains("value=\"cat\""));
        assert!(page.contains("<span id=\"search-count\">2</span>"));
        assert!(page.contains("<li class=\"lvl-1 active\"><a href=\"#pets\""));
        assert!(page.contains("<mark class=\"search-hit\">cat</mark> food"));
    }

    #[test]
    fn test_page_shows_notifications() {
        let mut viewer = viewer();
        viewer.select_article(1);
        let page = render_page(&viewer);
        assert!(page.contains("<div class=\"notice\" role=\"alert\">failed to load articles/other.html"));
        assert!(page.contains("Pets</a>"));
    }

    #[test]
    fn test_single_document_page() {
        let source = MemorySource::new().with_file("content.html", "<p>only text</p>");
        let viewer = Viewer::open(source, ViewerConfig::default());
        let page = render_page(&viewer);
        assert!(!page.contains("<nav id=\"article-list\">"));
        assert!(page.contains("<title>content.html</title>"));
        assert!(page.contains("<p>only text</p>"));
    }
}
