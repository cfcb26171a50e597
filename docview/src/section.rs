//! Section ranges owned by a heading
//!
//! A heading owns the siblings that follow it, up to (not including) the next
//! heading of the same or a shallower level. The range is computed as a
//! half-open index range over the parent's child list; the tree is only read.

use crate::dom;
use markup5ever_rcdom::Handle;
use std::rc::Rc;

/// The sibling nodes owned by a heading: `parent.children[start..end]`
#[derive(Debug, Clone)]
pub struct SectionRange {
    /// Parent whose child list the range indexes
    pub parent: Handle,
    /// First node after the heading
    pub start: usize,
    /// Boundary heading index, or the child count when the section runs to the end
    pub end: usize,
}

/// Compute the section owned by `heading`
///
/// Returns `None` when `heading` is not an `h1`..`h6` element or is detached.
/// Any heading level counts as a boundary, including levels deeper than the
/// outline tracks.
pub fn resolve_section(heading: &Handle) -> Option<SectionRange> {
    let level = dom::heading_level(heading)?;
    let (parent, index) = dom::position_in_parent(heading)?;
    let start = index + 1;

    let end = {
        let children = parent.children.borrow();
        children[start..]
            .iter()
            .position(|node| dom::heading_level(node).is_some_and(|l| l <= level))
            .map_or(children.len(), |offset| start + offset)
    };

    Some(SectionRange { parent, start, end })
}

impl SectionRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Snapshot of the nodes in the range
    ///
    /// Editing these nodes may shift indices in the parent's child list, so
    /// callers that mutate should work from this snapshot rather than the range.
    pub fn nodes(&self) -> Vec<Handle> {
        self.parent.children.borrow()[self.start..self.end].to_vec()
    }

    /// Whether `node` is one of the range's top-level nodes
    pub fn contains(&self, node: &Handle) -> bool {
        self.parent.children.borrow()[self.start..self.end]
            .iter()
            .any(|n| Rc::ptr_eq(n, node))
    }

    /// Concatenated text of the section
    pub fn text(&self) -> String {
        self.parent.children.borrow()[self.start..self.end]
            .iter()
            .map(|node| dom::text_content(node))
            .collect()
    }
}
