//! StaticRange
//!
//! A boundary pair that the tree never updates. Construction only rejects
//! DocumentType and Attr containers; ordering and offsets are checked on
//! demand by `is_valid`.

use std::cmp::Ordering;

use crate::range::{compare_points, BoundaryPoint};
use crate::{DomException, DomResult, DomTree, NodeId};

/// `StaticRangeInit` dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRangeInit {
    pub start_container: NodeId,
    pub start_offset: u32,
    pub end_container: NodeId,
    pub end_offset: u32,
}

/// Non-live range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRange {
    start: BoundaryPoint,
    end: BoundaryPoint,
}

impl StaticRange {
    pub fn new(tree: &DomTree, init: StaticRangeInit) -> DomResult<Self> {
        for container in [init.start_container, init.end_container] {
            let node = tree.node(container)?;
            if node.is_doctype() || node.is_attr() {
                return Err(DomException::InvalidNodeType);
            }
        }
        Ok(Self {
            start: BoundaryPoint::new(init.start_container, init.start_offset),
            end: BoundaryPoint::new(init.end_container, init.end_offset),
        })
    }

    pub fn start_container(&self) -> NodeId {
        self.start.node
    }

    pub fn start_offset(&self) -> u32 {
        self.start.offset
    }

    pub fn end_container(&self) -> NodeId {
        self.end.node
    }

    pub fn end_offset(&self) -> u32 {
        self.end.offset
    }

    pub fn collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Both containers alive in one tree, offsets in bounds, start not after end
    pub fn is_valid(&self, tree: &DomTree) -> bool {
        if !tree.is_alive(self.start.node) || !tree.is_alive(self.end.node) {
            return false;
        }
        if self.start.offset > tree.length(self.start.node)
            || self.end.offset > tree.length(self.end.node)
        {
            return false;
        }
        matches!(
            compare_points(tree, self.start, self.end),
            Some(Ordering::Less | Ordering::Equal)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_range_is_not_live() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let root = tree.create_element(doc, "root").unwrap();
        let text = tree.create_text_node(doc, "abc").unwrap();
        tree.append_child(doc, root).unwrap();
        tree.append_child(root, text).unwrap();

        let range = StaticRange::new(
            &tree,
            StaticRangeInit {
                start_container: text,
                start_offset: 1,
                end_container: text,
                end_offset: 3,
            },
        )
        .unwrap();
        assert!(range.is_valid(&tree));

        tree.set_data(text, "a").unwrap();
        assert_eq!(range.end_offset(), 3);
        assert!(!range.is_valid(&tree));
    }

    #[test]
    fn test_no_ordering_check_on_construction() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let root = tree.create_element(doc, "root").unwrap();
        tree.append_child(doc, root).unwrap();

        let backwards = StaticRange::new(
            &tree,
            StaticRangeInit {
                start_container: root,
                start_offset: 7,
                end_container: doc,
                end_offset: 0,
            },
        )
        .unwrap();
        assert!(!backwards.collapsed());
        assert!(!backwards.is_valid(&tree));

        let doctype = tree.create_document_type(doc, "html", "", "").unwrap();
        let init = StaticRangeInit {
            start_container: doctype,
            start_offset: 0,
            end_container: root,
            end_offset: 0,
        };
        assert_eq!(StaticRange::new(&tree, init), Err(DomException::InvalidNodeType));
    }
}
