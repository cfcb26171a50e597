//! Table-of-contents outline built from a flat scan of headings
//!
//! The article markup has no explicit section tree: headings are siblings in
//! document order. [`Outline::build`] reconstructs the hierarchy for levels
//! 1-3 with two rolling ancestors (the current `h1` and the current `h2`),
//! storing every heading in a flat arena. Parent and child links are arena
//! indices, so the arena order doubles as the flat navigation list.

use crate::dom;
use itertools::Itertools;
use markup5ever_rcdom::Handle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Deepest heading level that takes part in the outline
pub const MAX_OUTLINE_LEVEL: u8 = 3;

/// Index of a heading in the outline arena
pub type HeadingIndex = usize;

/// What to do when a derived heading id is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdPolicy {
    /// Assign the derived id even if another element already uses it
    Keep,
    /// Append `-2`, `-3`, ... until the id is unique within the article
    #[default]
    Suffix,
}

/// A heading in the outline
#[derive(Debug, Clone)]
pub struct HeadingNode {
    /// Element id (pre-existing or derived); `None` when the text derives to nothing
    pub id: Option<String>,
    /// Heading level, 1-3
    pub level: u8,
    /// Text content of the heading element
    pub text: String,
    /// Enclosing heading (back-reference, not owning)
    pub parent: Option<HeadingIndex>,
    /// Nested headings in document order
    pub children: Vec<HeadingIndex>,
    /// The heading element in the content tree
    pub element: Handle,
}

/// Hierarchical outline of an article's headings
#[derive(Debug, Clone, Default)]
pub struct Outline {
    nodes: Vec<HeadingNode>,
    roots: Vec<HeadingIndex>,
}

/// Derive an element id from heading text
///
/// Surrounding whitespace is trimmed, inner whitespace runs collapse to a
/// single `-`, and the result is lower-cased.
pub fn derive_heading_id(text: &str) -> String {
    text.split_whitespace().join("-").to_lowercase()
}

impl Outline {
    /// Scan the `h1`..`h3` elements under `root` and build the outline
    ///
    /// Headings without an `id` attribute get a derived one written back to
    /// the element. Headings that already carry an id are never touched, so
    /// building twice over the same tree yields the same ids.
    pub fn build(root: &Handle, policy: IdPolicy) -> Self {
        let elements = dom::descendants(root);
        let mut taken: HashSet<String> = elements
            .iter()
            .filter_map(|node| dom::attr(node, "id"))
            .collect();

        let mut outline = Outline::default();
        let mut current_h1: Option<HeadingIndex> = None;
        let mut current_h2: Option<HeadingIndex> = None;

        for element in elements {
            let Some(level) = dom::heading_level(&element).filter(|l| *l <= MAX_OUTLINE_LEVEL)
            else {
                continue;
            };

            let text = dom::text_content(&element);
            let id = match dom::attr(&element, "id").filter(|id| !id.is_empty()) {
                Some(existing) => Some(existing),
                None => assign_derived_id(&element, &text, policy, &mut taken),
            };

            let parent = match level {
                1 => None,
                2 => current_h1,
                _ => current_h2.or(current_h1),
            };

            let index = outline.attach(HeadingNode {
                id,
                level,
                text,
                parent,
                children: Vec::new(),
                element,
            });

            match level {
                1 => {
                    current_h1 = Some(index);
                    current_h2 = None;
                }
                2 => current_h2 = Some(index),
                _ => {}
            }
        }

        log::debug!(
            "Built outline with {} headings ({} roots)",
            outline.nodes.len(),
            outline.roots.len()
        );
        outline
    }

    fn attach(&mut self, node: HeadingNode) -> HeadingIndex {
        let index = self.nodes.len();
        match node.parent {
            Some(parent) => self.nodes[parent].children.push(index),
            None => self.roots.push(index),
        }
        self.nodes.push(node);
        index
    }

    /// Top-level headings in document order
    pub fn roots(&self) -> &[HeadingIndex] {
        &self.roots
    }

    pub fn get(&self, index: HeadingIndex) -> Option<&HeadingNode> {
        self.nodes.get(index)
    }

    /// All headings in document order (the flat navigation list)
    pub fn iter(&self) -> impl Iterator<Item = &HeadingNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Arena index of the heading with the given id
    pub fn position(&self, id: &str) -> Option<HeadingIndex> {
        self.nodes
            .iter()
            .position(|node| node.id.as_deref() == Some(id))
    }

    /// Heading with the given id
    pub fn find(&self, id: &str) -> Option<&HeadingNode> {
        self.position(id).map(|index| &self.nodes[index])
    }

    /// Nesting depth of a heading (0 for roots)
    pub fn depth(&self, index: HeadingIndex) -> usize {
        let mut depth = 0;
        let mut current = self.nodes.get(index).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent].parent;
        }
        depth
    }

    /// Depth-first (pre-order) traversal of the tree
    pub fn depth_first(&self) -> Vec<HeadingIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<HeadingIndex> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev());
        }
        order
    }
}

/// Derive an id for `element`, record it and write it back to the element
fn assign_derived_id(
    element: &Handle,
    text: &str,
    policy: IdPolicy,
    taken: &mut HashSet<String>,
) -> Option<String> {
    let base = derive_heading_id(text);
    if base.is_empty() {
        return None;
    }

    let id = match policy {
        IdPolicy::Keep => base,
        IdPolicy::Suffix => {
            let mut candidate = base.clone();
            let mut n = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}-{}", base, n);
                n += 1;
            }
            candidate
        }
    };

    if taken.contains(&id) {
        log::warn!("Heading id '{}' is used more than once", id);
    }
    taken.insert(id.clone());
    dom::set_attr(element, "id", &id);
    Some(id)
}
