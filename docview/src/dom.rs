//! Helpers over the html5ever / rcdom content tree
//!
//! The viewer keeps every loaded article as a `markup5ever_rcdom` tree. These
//! helpers cover the handful of queries and edits the outline, section and
//! highlight code need: tag and heading inspection, attribute access, text
//! extraction, node replacement, text normalisation and serialisation.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document as parse_html, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Namespace of every element created by the viewer
const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parse a complete HTML document (fragments are wrapped in `<html><body>`)
pub fn parse_document(markup: &str) -> RcDom {
    parse_html(RcDom::default(), Default::default()).one(markup)
}

/// The `<body>` element of a parsed document, which is the article root
///
/// html5ever always synthesises a body, so the document node is only
/// returned for trees that were assembled by hand.
///
/// The returned handle does not keep the tree alive: dropping the last
/// reference to the document node empties every descendant's child list.
/// Keep the `RcDom` (or its `document` handle) for as long as the root is used.
pub fn content_root(dom: &RcDom) -> Handle {
    find_element(&dom.document, "body").unwrap_or_else(|| dom.document.clone())
}

/// Find the first element with the given tag name in document order
pub fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
    if tag_name(node) == Some(tag) {
        return Some(node.clone());
    }
    node.children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

/// Lower-case tag name of an element node
pub fn tag_name(node: &Node) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// Heading level (1-6) of an `h1`..`h6` element
pub fn heading_level(node: &Node) -> Option<u8> {
    match tag_name(node)? {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

pub fn is_text(node: &Node) -> bool {
    matches!(node.data, NodeData::Text { .. })
}

/// Read an attribute value
pub fn attr(node: &Node, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Set (or add) an attribute on an element; non-elements are ignored
pub fn set_attr(node: &Node, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    if let Some(existing) = attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
        existing.value = StrTendril::from_slice(value);
    } else {
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        });
    }
}

/// Whether the element's `class` attribute contains `class`
pub fn has_class(node: &Node, class: &str) -> bool {
    attr(node, "class").is_some_and(|value| value.split_whitespace().any(|c| c == class))
}

/// Create a detached text node
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// Create a detached HTML element with the given attributes
pub fn create_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(*name)),
            value: StrTendril::from_slice(value),
        })
        .collect();

    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Append `child` as the last child of `parent`
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Parent of a node, if it is attached
pub fn parent(node: &Node) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

/// Parent of a node together with the node's index in the parent's child list
pub fn position_in_parent(node: &Handle) -> Option<(Handle, usize)> {
    let parent = parent(node)?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))?;
    Some((parent, index))
}

/// Replace `node` in its parent with `replacements`, in order
///
/// Returns `false` (and changes nothing) when `node` is detached.
pub fn replace_with(node: &Handle, replacements: Vec<Handle>) -> bool {
    let Some((parent, index)) = position_in_parent(node) else {
        return false;
    };
    for replacement in &replacements {
        replacement.parent.set(Some(Rc::downgrade(&parent)));
    }
    parent
        .children
        .borrow_mut()
        .splice(index..=index, replacements);
    node.parent.set(None);
    true
}

/// All descendants of `node` in document order, excluding `node` itself
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_descendants(node, &mut out);
    out
}

fn collect_descendants(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        out.push(child.clone());
        collect_descendants(child, out);
    }
}

/// Concatenated text of a node and all of its descendants
pub fn text_content(node: &Node) -> String {
    let mut text = String::new();
    push_text(node, &mut text);
    text
}

fn push_text(node: &Node, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
        return;
    }
    for child in node.children.borrow().iter() {
        push_text(child, out);
    }
}

/// Merge adjacent text nodes and drop empty ones, recursively
pub fn normalize(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow().clone();
    let mut merged: Vec<Handle> = Vec::with_capacity(children.len());

    for child in children {
        if let NodeData::Text { contents } = &child.data {
            if contents.borrow().is_empty() {
                child.parent.set(None);
                continue;
            }
            if let Some(NodeData::Text {
                contents: previous,
            }) = merged.last().map(|prev| &prev.data)
            {
                previous.borrow_mut().push_tendril(&contents.borrow());
                child.parent.set(None);
                continue;
            }
        } else {
            normalize(&child);
        }
        merged.push(child);
    }

    *node.children.borrow_mut() = merged;
}

/// Serialise the children of `node` back to HTML
pub fn inner_html(node: &Handle) -> String {
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    if let Err(e) = serialize(&mut bytes, &handle, opts) {
        log::warn!("Failed to serialise content tree: {}", e);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(markup: &str) -> (RcDom, Handle) {
        let dom = parse_document(markup);
        let root = content_root(&dom);
        (dom, root)
    }

    #[test]
    fn test_content_root_is_body() {
        let (_dom, root) = body("<p>hello</p>");
        assert_eq!(tag_name(&root), Some("body"));
        assert_eq!(text_content(&root), "hello");
    }

    #[test]
    fn test_heading_level() {
        let (_dom, root) = body("<h1>a</h1><h3>b</h3><h6>c</h6><p>d</p>");
        let levels: Vec<Option<u8>> = root
            .children
            .borrow()
            .iter()
            .map(|n| heading_level(n))
            .collect();
        assert_eq!(levels, vec![Some(1), Some(3), Some(6), None]);
    }

    #[test]
    fn test_set_attr_adds_and_updates() {
        let (_dom, root) = body("<h2>Title</h2>");
        let heading = root.children.borrow()[0].clone();
        assert_eq!(attr(&heading, "id"), None);
        set_attr(&heading, "id", "title");
        assert_eq!(attr(&heading, "id").as_deref(), Some("title"));
        set_attr(&heading, "id", "other");
        assert_eq!(attr(&heading, "id").as_deref(), Some("other"));
        assert_eq!(inner_html(&root), "<h2 id=\"other\">Title</h2>");
    }

    #[test]
    fn test_replace_with_and_normalize() {
        let (_dom, root) = body("<p>abc</p>");
        let paragraph = root.children.borrow()[0].clone();
        let text = paragraph.children.borrow()[0].clone();

        let mark = create_element("mark", &[]);
        append_child(&mark, create_text("b"));
        assert!(replace_with(
            &text,
            vec![create_text("a"), mark.clone(), create_text("c")]
        ));
        assert_eq!(inner_html(&paragraph), "a<mark>b</mark>c");
        assert!(parent(&text).is_none());

        assert!(replace_with(&mark, vec![create_text("b")]));
        assert_eq!(paragraph.children.borrow().len(), 3);
        normalize(&paragraph);
        assert_eq!(paragraph.children.borrow().len(), 1);
        assert_eq!(inner_html(&paragraph), "abc");
    }

    #[test]
    fn test_replace_detached_node_is_noop() {
        let orphan = create_text("x");
        assert!(!replace_with(&orphan, vec![create_text("y")]));
    }

    #[test]
    fn test_descendants_document_order() {
        let (_dom, root) = body("<div><h1>a</h1><p>b</p></div><h2>c</h2>");
        let tags: Vec<String> = descendants(&root)
            .iter()
            .filter_map(|n| tag_name(n).map(str::to_string))
            .collect();
        assert_eq!(tags, vec!["div", "h1", "p", "h2"]);
    }
}
