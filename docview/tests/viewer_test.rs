use docview::dom;
use docview::highlight::{clear_highlights, count_highlights, highlight};
use docview::observer::Visibility;
use docview::outline::{IdPolicy, Outline};
use docview::page::render_page;
use docview::section::resolve_section;
use docview::viewer::ALL_SCOPE;
use docview::{DirectorySource, Viewer, ViewerConfig};
use std::fs;
use std::path::Path;

const SCENARIO: &str = "<h1>Intro</h1><p>Opening words.</p>\
    <h2 id=\"background\">Background</h2><p>Some history.</p>\
    <h3 id=\"details\">Details</h3><p>Fine print with history.</p>\
    <h1 id=\"summary\">Summary</h1><p>Closing history.</p>";

fn write(dir: &Path, path: &str, content: &str) {
    let full = dir.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn content_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "articles/articles.json",
        r#"[
            {"title": "Scenario", "file": "articles/scenario.html"},
            {"title": "Cats", "file": "articles/cats.html", "id": "cats"}
        ]"#,
    );
    write(dir.path(), "articles/scenario.html", SCENARIO);
    write(dir.path(), "articles/cats.html", "<p>The cat sat. The CAT ran.</p>");
    dir
}

#[test]
fn test_scenario_outline() {
    let dir = content_dir();
    let viewer = Viewer::open(DirectorySource::new(dir.path()), ViewerConfig::default());
    let outline = viewer.outline().unwrap();

    assert_eq!(outline.roots().len(), 2);
    let intro = outline.get(outline.roots()[0]).unwrap();
    let summary = outline.get(outline.roots()[1]).unwrap();
    assert_eq!(intro.id.as_deref(), Some("intro"));
    assert_eq!(intro.children.len(), 1);
    assert!(summary.children.is_empty());

    let background = outline.get(intro.children[0]).unwrap();
    assert_eq!(background.text, "Background");
    assert_eq!(background.parent, Some(outline.roots()[0]));
    let details = outline.get(background.children[0]).unwrap();
    assert_eq!(details.text, "Details");
}

#[test]
fn test_scenario_whole_document_search() {
    let dir = content_dir();
    let mut viewer = Viewer::open(DirectorySource::new(dir.path()), ViewerConfig::default());
    assert!(viewer.select_article(1));

    assert_eq!(viewer.search(ALL_SCOPE, "cat"), 2);
    let html = viewer.content_html();
    assert!(html.contains("<mark class=\"search-hit\">cat</mark>"));
    assert!(html.contains("<mark class=\"search-hit\">CAT</mark>"));
}

#[test]
fn test_scenario_section_search() {
    let dir = content_dir();
    let mut viewer = Viewer::open(DirectorySource::new(dir.path()), ViewerConfig::default());

    // "Background" owns "Details" but stops before the next h1
    assert_eq!(viewer.search("background", "history"), 2);
    assert_eq!(viewer.search(ALL_SCOPE, "history"), 3);
    assert_eq!(viewer.search("details", "history"), 1);
}

#[test]
fn test_single_document_directory() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "content.html", SCENARIO);
    write(
        dir.path(),
        "docview.toml",
        "observer_threshold = 0.5\nid_policy = \"keep\"\n",
    );

    let config = ViewerConfig::load_or_default(dir.path()).unwrap();
    assert_eq!(config.id_policy, IdPolicy::Keep);
    let mut viewer = Viewer::open(DirectorySource::new(dir.path()), config);

    assert!(viewer.articles().is_empty());
    assert_eq!(viewer.document_path(), Some("content.html"));
    assert_eq!(viewer.report_visibility(&[Visibility::new("details", 0.4)]), None);
    assert_eq!(
        viewer.report_visibility(&[Visibility::new("details", 0.6)]),
        Some("details")
    );
}

#[test]
fn test_rendered_page_round_trip() {
    let dir = content_dir();
    let mut viewer = Viewer::open(DirectorySource::new(dir.path()), ViewerConfig::default());
    let clean = render_page(&viewer);

    viewer.search("background", "history");
    viewer.navigate("details");
    viewer.report_visibility(&[Visibility::new("details", 1.0)]);
    let searched = render_page(&viewer);
    assert!(searched.contains("<span id=\"search-count\">2</span>"));
    assert!(searched.contains("<li class=\"lvl-3 active\"><a href=\"#details\""));
    assert_eq!(viewer.anchor(), Some("#details"));

    viewer.clear();
    viewer.report_visibility(&[Visibility::new("intro", 1.0)]);
    viewer.search(ALL_SCOPE, "");
    let cleared = render_page(&viewer);
    assert_eq!(
        cleared.replace("lvl-1 active\"><a href=\"#intro\"", "lvl-1\"><a href=\"#intro\""),
        clean
    );
}

#[test]
fn test_missing_article_is_reported_and_view_kept() {
    let dir = content_dir();
    let mut viewer = Viewer::open(DirectorySource::new(dir.path()), ViewerConfig::default());
    fs::remove_file(dir.path().join("articles/cats.html")).unwrap();

    assert!(!viewer.select_article(1));
    assert_eq!(viewer.selected_article(), Some(0));
    assert_eq!(viewer.outline().unwrap().len(), 4);
    assert_eq!(viewer.notifications().len(), 1);
}

fn levels_markup(levels: &[u8]) -> String {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| format!("<h{level}>Heading {i}</h{level}><p>body {i}</p>"))
        .collect()
}

fn all_level_sequences(len: usize) -> Vec<Vec<u8>> {
    let mut sequences = vec![Vec::new()];
    for _ in 0..len {
        sequences = sequences
            .into_iter()
            .flat_map(|seq| {
                (1..=3).map(move |level| {
                    let mut next = seq.clone();
                    next.push(level);
                    next
                })
            })
            .collect();
    }
    sequences
}

#[test]
fn test_depth_first_order_matches_document_order() {
    for len in 1..=5 {
        for levels in all_level_sequences(len) {
            let parsed = dom::parse_document(&levels_markup(&levels));
            let root = dom::content_root(&parsed);
            let outline = Outline::build(&root, IdPolicy::Suffix);

            let order = outline.depth_first();
            assert_eq!(order, (0..levels.len()).collect::<Vec<_>>(), "{:?}", levels);
            for (index, heading) in outline.iter().enumerate() {
                if let Some(parent) = heading.parent {
                    assert!(outline.get(parent).unwrap().level < heading.level);
                    assert!(parent < index);
                }
            }
        }
    }
}

#[test]
fn test_sections_respect_boundaries() {
    for levels in all_level_sequences(4) {
        let parsed = dom::parse_document(&levels_markup(&levels));
        let root = dom::content_root(&parsed);
        let children: Vec<_> = root.children.borrow().clone();

        for (position, node) in children.iter().enumerate() {
            let Some(level) = dom::heading_level(node) else {
                continue;
            };
            let section = resolve_section(node).unwrap();
            assert_eq!(section.start, position + 1);
            assert!(!section.contains(node));
            for member in section.nodes() {
                assert!(dom::heading_level(&member).map_or(true, |l| l > level));
            }
            if let Some(boundary) = children.get(section.end) {
                assert!(dom::heading_level(boundary).unwrap() <= level);
            }
        }
    }
}

#[test]
fn test_highlight_round_trip_and_idempotence() {
    let samples = [
        SCENARIO,
        "<p>abcabc <em>ab</em>c <b>ABC</b></p><ul><li>xabcx</li></ul>",
        "<div><p>nested <span>abc <i>abc</i></span> tail abc</p></div>",
        "<table><tr><td>abc</td><td>zzz</td></tr></table>",
    ];

    for markup in samples {
        for query in ["abc", "a", "history", "c ", "missing"] {
            let parsed = dom::parse_document(markup);
            let root = dom::content_root(&parsed);
            let text = dom::text_content(&root);
            let html = dom::inner_html(&root);

            let first = highlight(&root, query);
            assert_eq!(highlight(&root, query), 0);
            assert_eq!(count_highlights(&root), first);

            clear_highlights(&root);
            assert_eq!(dom::text_content(&root), text);
            assert_eq!(dom::inner_html(&root), html);

            assert_eq!(highlight(&root, query), first);
            clear_highlights(&root);
            assert_eq!(highlight(&root, ""), 0);
            assert_eq!(dom::inner_html(&root), html);
        }
    }
}
