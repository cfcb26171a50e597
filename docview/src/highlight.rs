//! In-place search highlighting
//!
//! [`highlight`] wraps every case-insensitive literal occurrence of a query in
//! a `<mark class="search-hit">` element. Only text nodes that contain a
//! match are replaced; everything else keeps its identity. [`clear_highlights`]
//! unwraps the markers and re-merges the split text, so the tree returns to
//! its pre-search shape.

use crate::dom;
use markup5ever_rcdom::{Handle, Node, NodeData};
use regex::{Regex, RegexBuilder};
use std::rc::Rc;

/// Tag of the highlight marker element
pub const MARKER_TAG: &str = "mark";

/// Class carried by every highlight marker
pub const MARKER_CLASS: &str = "search-hit";

/// Whether `node` is a highlight marker
pub fn is_marker(node: &Node) -> bool {
    dom::tag_name(node) == Some(MARKER_TAG) && dom::has_class(node, MARKER_CLASS)
}

/// Highlight every occurrence of `query` under `root`, returning the number of matches
///
/// An empty query is a no-op. Text already inside a marker is skipped, so
/// repeated calls never nest markers. `root` may itself be a text node as long
/// as it is attached to a parent.
pub fn highlight(root: &Handle, query: &str) -> usize {
    if query.is_empty() {
        return 0;
    }
    let pattern = match literal_pattern(query) {
        Ok(pattern) => pattern,
        Err(e) => {
            log::warn!("Cannot search for {:?}: {}", query, e);
            return 0;
        }
    };
    if inside_marker(root) {
        return 0;
    }

    let mut candidates = Vec::new();
    collect_text_nodes(root, &mut candidates);

    candidates
        .iter()
        .map(|node| wrap_matches(node, &pattern))
        .sum()
}

/// Remove every highlight marker under `root`, restoring plain text
pub fn clear_highlights(root: &Handle) {
    let markers: Vec<Handle> = dom::descendants(root)
        .into_iter()
        .filter(|node| is_marker(node))
        .collect();
    if markers.is_empty() {
        return;
    }

    let mut parents: Vec<Handle> = Vec::new();
    for marker in &markers {
        let Some(parent) = dom::parent(marker) else {
            continue;
        };
        let text = dom::text_content(marker);
        dom::replace_with(marker, vec![dom::create_text(&text)]);
        if !parents.iter().any(|p| Rc::ptr_eq(p, &parent)) {
            parents.push(parent);
        }
    }
    for parent in &parents {
        dom::normalize(parent);
    }
    log::debug!("Cleared {} highlight markers", markers.len());
}

/// Number of highlight markers under `root`
pub fn count_highlights(root: &Handle) -> usize {
    dom::descendants(root)
        .iter()
        .filter(|node| is_marker(node))
        .count()
}

fn literal_pattern(query: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
}

fn inside_marker(node: &Handle) -> bool {
    let mut current = dom::parent(node);
    while let Some(ancestor) = current {
        if is_marker(&ancestor) {
            return true;
        }
        current = dom::parent(&ancestor);
    }
    false
}

/// Text nodes under `node` (including `node` itself) that are not whitespace-only
fn collect_text_nodes(node: &Handle, out: &mut Vec<Handle>) {
    match &node.data {
        NodeData::Text { contents } => {
            if !contents.borrow().trim().is_empty() {
                out.push(node.clone());
            }
        }
        NodeData::Element { .. } if is_marker(node) => {}
        _ => {
            for child in node.children.borrow().iter() {
                collect_text_nodes(child, out);
            }
        }
    }
}

/// Split one text node around its matches, returning the match count
fn wrap_matches(node: &Handle, pattern: &Regex) -> usize {
    let NodeData::Text { contents } = &node.data else {
        return 0;
    };
    let text = contents.borrow().to_string();

    let mut pieces = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(&text) {
        if found.start() > last {
            pieces.push(dom::create_text(&text[last..found.start()]));
        }
        let marker = dom::create_element(MARKER_TAG, &[("class", MARKER_CLASS)]);
        dom::append_child(&marker, dom::create_text(found.as_str()));
        pieces.push(marker);
        last = found.end();
    }

    let count = pieces.iter().filter(|piece| is_marker(piece)).count();
    if count == 0 {
        return 0;
    }
    if last < text.len() {
        pieces.push(dom::create_text(&text[last..]));
    }

    if dom::replace_with(node, pieces) {
        count
    } else {
        0
    }
}
