//! TreeWalker and NodeIterator
//!
//! DOM traversal APIs for navigating the document tree with filtering.
//!
//! TreeWalker provides tree-based navigation (parent, firstChild, siblings).
//! NodeIterator provides sequential iteration through nodes; the tree keeps a
//! weak registry of live iterators so their reference node can be moved out
//! of the way before a removal.
//!
//! Filters receive `&DomTree`, so a filter can inspect the tree but never
//! mutate it. Tree mutations between traversal steps are still tracked. The
//! only re-entry a filter can make is calling back into the same
//! NodeIterator, which the iterator's active flag rejects with
//! `InvalidState`. A TreeWalker takes `&mut self`, so its filter cannot reach
//! it at all.

use std::cell::Cell;
use std::rc::Rc;

use crate::node::NodeType;
use crate::{DomException, DomResult, DomTree, NodeId};

/// What types of nodes to show, bit `nodeType - 1` per node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WhatToShow(pub u32);

impl WhatToShow {
    pub const ALL: WhatToShow = WhatToShow(0xFFFF_FFFF);
    pub const ELEMENT: WhatToShow = WhatToShow(0x1);
    pub const ATTRIBUTE: WhatToShow = WhatToShow(0x2);
    pub const TEXT: WhatToShow = WhatToShow(0x4);
    pub const CDATA_SECTION: WhatToShow = WhatToShow(0x8);
    pub const PROCESSING_INSTRUCTION: WhatToShow = WhatToShow(0x40);
    pub const COMMENT: WhatToShow = WhatToShow(0x80);
    pub const DOCUMENT: WhatToShow = WhatToShow(0x100);
    pub const DOCUMENT_TYPE: WhatToShow = WhatToShow(0x200);
    pub const DOCUMENT_FRAGMENT: WhatToShow = WhatToShow(0x400);

    /// Check if a node type is shown
    pub fn includes(self, node_type: NodeType) -> bool {
        let flag = 1u32 << (node_type.to_u16() - 1);
        (self.0 & flag) != 0
    }

    /// Intersection of two WhatToShow masks
    pub fn and(self, other: WhatToShow) -> WhatToShow {
        WhatToShow(self.0 & other.0)
    }

    /// Union of two WhatToShow masks
    pub fn or(self, other: WhatToShow) -> WhatToShow {
        WhatToShow(self.0 | other.0)
    }
}

impl Default for WhatToShow {
    fn default() -> Self {
        Self::ALL
    }
}

/// Node filter result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Accept the node
    Accept,
    /// Reject the node. A TreeWalker also skips its descendants; a
    /// NodeIterator treats this like `Skip`.
    Reject,
    /// Skip this node but process its children
    Skip,
}

/// Caller-supplied accept/reject/skip predicate
pub trait NodeFilter {
    fn accept_node(&self, tree: &DomTree, node: NodeId) -> FilterResult;
}

impl<F> NodeFilter for F
where
    F: Fn(&DomTree, NodeId) -> FilterResult,
{
    fn accept_node(&self, tree: &DomTree, node: NodeId) -> FilterResult {
        self(tree, node)
    }
}

/// whatToShow first, then the optional predicate
fn filter_node(
    tree: &DomTree,
    node: NodeId,
    what_to_show: WhatToShow,
    filter: Option<&dyn NodeFilter>,
) -> FilterResult {
    let Some(node_type) = tree.node_type(node) else {
        return FilterResult::Skip;
    };
    if !what_to_show.includes(node_type) {
        return FilterResult::Skip;
    }
    match filter {
        Some(filter) => filter.accept_node(tree, node),
        None => FilterResult::Accept,
    }
}

// --- NodeIterator ---

/// Shared state of a NodeIterator, also reachable from the tree's registry
pub(crate) struct IteratorInner {
    root: NodeId,
    what_to_show: WhatToShow,
    filter: Option<Rc<dyn NodeFilter>>,
    /// Reference node and pointer-before-reference flag
    position: Cell<(NodeId, bool)>,
    /// Set while the filter runs
    active: Cell<bool>,
}

impl IteratorInner {
    fn filter(&self, tree: &DomTree, node: NodeId) -> DomResult<FilterResult> {
        if self.active.get() {
            return Err(DomException::InvalidState);
        }
        self.active.set(true);
        let result = filter_node(tree, node, self.what_to_show, self.filter.as_deref());
        self.active.set(false);
        Ok(result)
    }

    fn traverse(&self, tree: &DomTree, forward: bool) -> DomResult<Option<NodeId>> {
        let (mut node, mut before) = self.position.get();
        loop {
            if forward {
                if before {
                    before = false;
                } else {
                    match tree.following(node, self.root) {
                        Some(next) => node = next,
                        None => return Ok(None),
                    }
                }
            } else if before {
                match tree.preceding(node, self.root) {
                    Some(previous) => node = previous,
                    None => return Ok(None),
                }
            } else {
                before = true;
            }

            if self.filter(tree, node)? == FilterResult::Accept {
                break;
            }
        }
        self.position.set((node, before));
        Ok(Some(node))
    }

    /// Move the reference node off a subtree that is about to be removed
    fn before_remove(&self, tree: &DomTree, removed: NodeId) {
        let (reference, before) = self.position.get();
        if removed == self.root
            || !tree.is_ancestor(self.root, removed)
            || !tree.is_inclusive_ancestor(removed, reference)
        {
            return;
        }

        if before {
            if let Some(next) = tree.following_skipping_children(removed, self.root) {
                self.position.set((next, true));
                return;
            }
        }

        let reference = match tree.previous_sibling(removed) {
            Some(sibling) => tree.last_inclusive_descendant(sibling),
            None => match tree.parent_node(removed) {
                Some(parent) => parent,
                None => return,
            },
        };
        self.position.set((reference, false));
    }
}

/// NodeIterator for sequential traversal. Clones share one position.
#[derive(Clone)]
pub struct NodeIterator {
    inner: Rc<IteratorInner>,
}

impl NodeIterator {
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn what_to_show(&self) -> WhatToShow {
        self.inner.what_to_show
    }

    pub fn filter(&self) -> Option<Rc<dyn NodeFilter>> {
        self.inner.filter.clone()
    }

    /// Get reference node
    pub fn reference_node(&self) -> NodeId {
        self.inner.position.get().0
    }

    /// Whether the pointer sits before the reference node
    pub fn pointer_before_reference_node(&self) -> bool {
        self.inner.position.get().1
    }

    /// Next accepted node, or `None` without moving.
    /// Calling back into the iterator from its own filter is an `InvalidState` error.
    pub fn next_node(&self, tree: &DomTree) -> DomResult<Option<NodeId>> {
        self.inner.traverse(tree, true)
    }

    /// Previous accepted node, or `None` without moving
    pub fn previous_node(&self, tree: &DomTree) -> DomResult<Option<NodeId>> {
        self.inner.traverse(tree, false)
    }

    /// Detach the iterator (no-op in modern DOM, kept for compatibility)
    pub fn detach(&self) {}
}

impl std::fmt::Debug for NodeIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIterator")
            .field("root", &self.inner.root)
            .field("what_to_show", &self.inner.what_to_show)
            .field("position", &self.inner.position.get())
            .finish()
    }
}

// --- TreeWalker ---

/// TreeWalker for navigating the DOM tree
#[derive(Clone)]
pub struct TreeWalker {
    root: NodeId,
    what_to_show: WhatToShow,
    filter: Option<Rc<dyn NodeFilter>>,
    current_node: NodeId,
}

impl TreeWalker {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn what_to_show(&self) -> WhatToShow {
        self.what_to_show
    }

    pub fn filter(&self) -> Option<Rc<dyn NodeFilter>> {
        self.filter.clone()
    }

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    /// Set the current node (any node, even outside the root)
    pub fn set_current_node(&mut self, node: NodeId) {
        self.current_node = node;
    }

    fn accept(&self, tree: &DomTree, node: NodeId) -> FilterResult {
        filter_node(tree, node, self.what_to_show, self.filter.as_deref())
    }

    fn commit(&mut self, node: NodeId) -> Option<NodeId> {
        self.current_node = node;
        Some(node)
    }

    /// Closest accepted ancestor within the root
    pub fn parent_node(&mut self, tree: &DomTree) -> Option<NodeId> {
        let mut node = self.current_node;
        while node != self.root {
            node = tree.parent_node(node)?;
            if self.accept(tree, node) == FilterResult::Accept {
                return self.commit(node);
            }
        }
        None
    }

    pub fn first_child(&mut self, tree: &DomTree) -> Option<NodeId> {
        self.traverse_children(tree, true)
    }

    pub fn last_child(&mut self, tree: &DomTree) -> Option<NodeId> {
        self.traverse_children(tree, false)
    }

    pub fn previous_sibling(&mut self, tree: &DomTree) -> Option<NodeId> {
        self.traverse_siblings(tree, false)
    }

    pub fn next_sibling(&mut self, tree: &DomTree) -> Option<NodeId> {
        self.traverse_siblings(tree, true)
    }

    fn traverse_children(&mut self, tree: &DomTree, first: bool) -> Option<NodeId> {
        let child = |node| {
            if first {
                tree.first_child(node)
            } else {
                tree.last_child(node)
            }
        };
        let sibling = |node| {
            if first {
                tree.next_sibling(node)
            } else {
                tree.previous_sibling(node)
            }
        };

        let mut node = child(self.current_node)?;
        loop {
            match self.accept(tree, node) {
                FilterResult::Accept => return self.commit(node),
                FilterResult::Skip => {
                    if let Some(inner) = child(node) {
                        node = inner;
                        continue;
                    }
                }
                FilterResult::Reject => {}
            }

            loop {
                if let Some(next) = sibling(node) {
                    node = next;
                    break;
                }
                let parent = tree.parent_node(node)?;
                if parent == self.root || parent == self.current_node {
                    return None;
                }
                node = parent;
            }
        }
    }

    fn traverse_siblings(&mut self, tree: &DomTree, next: bool) -> Option<NodeId> {
        let sibling_of = |node| {
            if next {
                tree.next_sibling(node)
            } else {
                tree.previous_sibling(node)
            }
        };
        let child_of = |node| {
            if next {
                tree.first_child(node)
            } else {
                tree.last_child(node)
            }
        };

        let mut node = self.current_node;
        if node == self.root {
            return None;
        }
        loop {
            let mut sibling = sibling_of(node);
            while let Some(candidate) = sibling {
                node = candidate;
                let result = self.accept(tree, node);
                if result == FilterResult::Accept {
                    return self.commit(node);
                }
                sibling = child_of(node);
                if result == FilterResult::Reject || sibling.is_none() {
                    sibling = sibling_of(node);
                }
            }

            node = tree.parent_node(node)?;
            if node == self.root || self.accept(tree, node) == FilterResult::Accept {
                return None;
            }
        }
    }

    /// Previous accepted node in tree order
    pub fn previous_node(&mut self, tree: &DomTree) -> Option<NodeId> {
        let mut node = self.current_node;
        while node != self.root {
            let mut sibling = tree.previous_sibling(node);
            while let Some(candidate) = sibling {
                node = candidate;
                let mut result = self.accept(tree, node);
                while result != FilterResult::Reject {
                    let Some(child) = tree.last_child(node) else {
                        break;
                    };
                    node = child;
                    result = self.accept(tree, node);
                }
                if result == FilterResult::Accept {
                    return self.commit(node);
                }
                sibling = tree.previous_sibling(node);
            }

            if node == self.root {
                return None;
            }
            node = tree.parent_node(node)?;
            if self.accept(tree, node) == FilterResult::Accept {
                return self.commit(node);
            }
        }
        None
    }

    /// Next accepted node in tree order
    pub fn next_node(&mut self, tree: &DomTree) -> Option<NodeId> {
        let mut node = self.current_node;
        let mut result = FilterResult::Accept;
        loop {
            while result != FilterResult::Reject {
                let Some(child) = tree.first_child(node) else {
                    break;
                };
                node = child;
                result = self.accept(tree, node);
                if result == FilterResult::Accept {
                    return self.commit(node);
                }
            }

            let mut following = None;
            let mut temporary = Some(node);
            while let Some(current) = temporary {
                if current == self.root {
                    return None;
                }
                if let Some(sibling) = tree.next_sibling(current) {
                    following = Some(sibling);
                    break;
                }
                temporary = tree.parent_node(current);
            }

            node = following?;
            result = self.accept(tree, node);
            if result == FilterResult::Accept {
                return self.commit(node);
            }
        }
    }
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("root", &self.root)
            .field("what_to_show", &self.what_to_show)
            .field("current_node", &self.current_node)
            .finish()
    }
}

impl DomTree {
    /// `Document.createNodeIterator(root, whatToShow, filter)`
    pub fn create_node_iterator(
        &mut self,
        root: NodeId,
        what_to_show: WhatToShow,
        filter: Option<Rc<dyn NodeFilter>>,
    ) -> DomResult<NodeIterator> {
        self.node(root)?;
        let inner = Rc::new(IteratorInner {
            root,
            what_to_show,
            filter,
            position: Cell::new((root, true)),
            active: Cell::new(false),
        });
        self.live_iterators.retain(|weak| weak.strong_count() > 0);
        self.live_iterators.push(Rc::downgrade(&inner));
        Ok(NodeIterator { inner })
    }

    /// `Document.createTreeWalker(root, whatToShow, filter)`
    pub fn create_tree_walker(
        &self,
        root: NodeId,
        what_to_show: WhatToShow,
        filter: Option<Rc<dyn NodeFilter>>,
    ) -> DomResult<TreeWalker> {
        self.node(root)?;
        Ok(TreeWalker {
            root,
            what_to_show,
            filter,
            current_node: root,
        })
    }

    /// NodeIterator pre-removing steps for `node`
    pub(crate) fn iterators_before_remove(&mut self, node: NodeId) {
        self.live_iterators.retain(|weak| weak.strong_count() > 0);
        for weak in &self.live_iterators {
            if let Some(iterator) = weak.upgrade() {
                iterator.before_remove(self, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// root > [a > [a1, a2], b, c > [c1]]
    fn sample() -> (DomTree, NodeId, Vec<NodeId>) {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let root = tree.create_element(doc, "root").unwrap();
        let mut nodes = Vec::new();
        for name in ["a", "a1", "a2", "b", "c", "c1"] {
            nodes.push(tree.create_element(doc, name).unwrap());
        }
        tree.append(root, &[nodes[0].into(), nodes[3].into(), nodes[4].into()])
            .unwrap();
        tree.append(nodes[0], &[nodes[1].into(), nodes[2].into()]).unwrap();
        tree.append_child(nodes[4], nodes[5]).unwrap();
        (tree, root, nodes)
    }

    #[test]
    fn test_what_to_show() {
        assert!(WhatToShow::ALL.includes(NodeType::Element));
        assert!(WhatToShow::ALL.includes(NodeType::DocumentFragment));

        assert!(WhatToShow::ELEMENT.includes(NodeType::Element));
        assert!(!WhatToShow::ELEMENT.includes(NodeType::Text));
        assert!(WhatToShow::COMMENT.includes(NodeType::Comment));

        let combined = WhatToShow::ELEMENT.or(WhatToShow::TEXT);
        assert!(combined.includes(NodeType::Text));
        assert!(!combined.includes(NodeType::Comment));
        assert_eq!(combined.and(WhatToShow::TEXT), WhatToShow::TEXT);
    }

    #[test]
    fn test_iterator_round_trip() {
        let (mut tree, root, nodes) = sample();
        let iter = tree.create_node_iterator(root, WhatToShow::ALL, None).unwrap();

        let mut forward = Vec::new();
        while let Some(node) = iter.next_node(&tree).unwrap() {
            forward.push(node);
        }
        let mut expected = vec![root];
        expected.extend(&nodes);
        assert_eq!(forward, expected);
        assert_eq!(iter.next_node(&tree).unwrap(), None);
        assert!(!iter.pointer_before_reference_node());

        let mut backward = Vec::new();
        while let Some(node) = iter.previous_node(&tree).unwrap() {
            backward.push(node);
        }
        backward.reverse();
        assert_eq!(backward, expected);
        assert_eq!(iter.reference_node(), root);
        assert!(iter.pointer_before_reference_node());
    }

    #[test]
    fn test_iterator_filter_skips_single_nodes() {
        let (mut tree, root, nodes) = sample();
        let a = nodes[0];
        let filter: Rc<dyn NodeFilter> = Rc::new(move |_: &DomTree, node: NodeId| {
            if node == a {
                FilterResult::Reject
            } else {
                FilterResult::Accept
            }
        });
        let iter = tree
            .create_node_iterator(root, WhatToShow::ELEMENT, Some(filter))
            .unwrap();

        let mut seen = Vec::new();
        while let Some(node) = iter.next_node(&tree).unwrap() {
            seen.push(node);
        }
        // Reject only drops `a` itself
        assert_eq!(seen, vec![root, nodes[1], nodes[2], nodes[3], nodes[4], nodes[5]]);
    }

    #[test]
    fn test_iterator_repairs_on_removal() {
        let (mut tree, root, nodes) = sample();
        let iter = tree.create_node_iterator(root, WhatToShow::ALL, None).unwrap();
        for _ in 0..3 {
            iter.next_node(&tree).unwrap();
        }
        assert_eq!(iter.reference_node(), nodes[1]);

        // Reference inside the removed subtree, pointer after it
        tree.remove(nodes[0]).unwrap();
        assert_eq!(iter.reference_node(), root);
        assert!(!iter.pointer_before_reference_node());
        assert_eq!(iter.next_node(&tree).unwrap(), Some(nodes[3]));

        // Pointer before the reference: move to the first following node
        iter.previous_node(&tree).unwrap();
        assert!(iter.pointer_before_reference_node());
        assert_eq!(iter.reference_node(), nodes[3]);
        tree.remove(nodes[3]).unwrap();
        assert_eq!(iter.reference_node(), nodes[4]);
        assert!(iter.pointer_before_reference_node());
        assert_eq!(iter.next_node(&tree).unwrap(), Some(nodes[4]));
    }

    #[test]
    fn test_iterator_reentry_is_invalid_state() {
        let (mut tree, root, _) = sample();
        let slot: Rc<RefCell<Option<NodeIterator>>> = Rc::new(RefCell::new(None));
        let outcome: Rc<Cell<Option<DomException>>> = Rc::new(Cell::new(None));

        let filter = {
            let slot = Rc::clone(&slot);
            let outcome = Rc::clone(&outcome);
            move |tree: &DomTree, _: NodeId| {
                if let Some(iter) = slot.borrow().as_ref() {
                    if let Err(err) = iter.next_node(tree) {
                        outcome.set(Some(err));
                    }
                }
                FilterResult::Accept
            }
        };
        let iter = tree
            .create_node_iterator(root, WhatToShow::ALL, Some(Rc::new(filter)))
            .unwrap();
        *slot.borrow_mut() = Some(iter.clone());

        assert_eq!(iter.next_node(&tree).unwrap(), Some(root));
        assert_eq!(outcome.get(), Some(DomException::InvalidState));
        slot.borrow_mut().take();
    }

    #[test]
    fn test_walker_navigation() {
        let (tree, root, nodes) = sample();
        let mut walker = tree.create_tree_walker(root, WhatToShow::ELEMENT, None).unwrap();

        assert_eq!(walker.first_child(&tree), Some(nodes[0]));
        assert_eq!(walker.last_child(&tree), Some(nodes[2]));
        assert_eq!(walker.previous_sibling(&tree), Some(nodes[1]));
        assert_eq!(walker.previous_sibling(&tree), None);
        assert_eq!(walker.current_node(), nodes[1]);
        assert_eq!(walker.parent_node(&tree), Some(nodes[0]));
        assert_eq!(walker.next_sibling(&tree), Some(nodes[3]));
        assert_eq!(walker.parent_node(&tree), Some(root));
        assert_eq!(walker.parent_node(&tree), None);
        assert_eq!(walker.current_node(), root);
    }

    #[test]
    fn test_walker_reject_skips_subtree() {
        let (tree, root, nodes) = sample();
        let a = nodes[0];
        let c = nodes[4];
        let filter: Rc<dyn NodeFilter> = Rc::new(move |_: &DomTree, node: NodeId| {
            if node == a {
                FilterResult::Reject
            } else if node == c {
                FilterResult::Skip
            } else {
                FilterResult::Accept
            }
        });
        let mut walker = tree
            .create_tree_walker(root, WhatToShow::ALL, Some(filter))
            .unwrap();

        let mut forward = Vec::new();
        while let Some(node) = walker.next_node(&tree) {
            forward.push(node);
        }
        assert_eq!(forward, vec![nodes[3], nodes[5]]);

        let mut backward = Vec::new();
        while let Some(node) = walker.previous_node(&tree) {
            backward.push(node);
        }
        assert_eq!(backward, vec![nodes[3], root]);

        // A skipped node's children are searched, a rejected node's are not
        walker.set_current_node(root);
        assert_eq!(walker.first_child(&tree), Some(nodes[3]));
        assert_eq!(walker.next_sibling(&tree), Some(nodes[5]));
    }

    #[test]
    fn test_walker_shows_text_only() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let root = tree.create_element(doc, "p").unwrap();
        let em = tree.create_element(doc, "em").unwrap();
        tree.append(root, &["one".into(), em.into(), "three".into()]).unwrap();
        tree.append(em, &["two".into()]).unwrap();

        let mut walker = tree.create_tree_walker(root, WhatToShow::TEXT, None).unwrap();
        let mut text = Vec::new();
        while let Some(node) = walker.next_node(&tree) {
            text.push(tree.data(node).unwrap_or_default().to_string());
        }
        assert_eq!(text, vec!["one", "two", "three"]);
    }
}
