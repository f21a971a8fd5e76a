//! DOM Tree (arena-based allocation)
//!
//! `DomTree` is the context every operation runs against. It owns the node
//! arena, the name interner, event listener registrations, abort signals
//! and controllers, and weak registrations of the live objects (ranges,
//! node iterators, mutation observers) that mutations have to keep current.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::abort::{ControllerState, SignalState};
use crate::arena::Arena;
use crate::event_target::Listener;
use crate::interner::{Atom, StringInterner};
use crate::node::{data_len, Node, NodeData, NodeType, QualName};
use crate::observer::ObserverInner;
use crate::range::RangeBounds;
use crate::selector::{SelectorMatcher, SimpleSelectorMatcher};
use crate::tree_walker::IteratorInner;
use crate::{DomException, DomResult, EventTarget, NodeId};

/// `compareDocumentPosition` result bits
pub const DOCUMENT_POSITION_DISCONNECTED: u16 = 0x01;
pub const DOCUMENT_POSITION_PRECEDING: u16 = 0x02;
pub const DOCUMENT_POSITION_FOLLOWING: u16 = 0x04;
pub const DOCUMENT_POSITION_CONTAINS: u16 = 0x08;
pub const DOCUMENT_POSITION_CONTAINED_BY: u16 = 0x10;
pub const DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC: u16 = 0x20;

/// Arena-based DOM tree
pub struct DomTree {
    pub(crate) nodes: Arena<Node>,
    pub(crate) interner: StringInterner,
    pub(crate) listeners: HashMap<EventTarget, Vec<Rc<Listener>>>,
    pub(crate) signals: Arena<SignalState>,
    pub(crate) controllers: Arena<ControllerState>,
    pub(crate) live_ranges: Vec<Weak<RefCell<RangeBounds>>>,
    pub(crate) live_iterators: Vec<Weak<IteratorInner>>,
    pub(crate) observers: Vec<Weak<ObserverInner>>,
    pub(crate) selector_matcher: Rc<dyn SelectorMatcher>,
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self {
            nodes: Arena::new(),
            interner: StringInterner::new(),
            listeners: HashMap::new(),
            signals: Arena::new(),
            controllers: Arena::new(),
            live_ranges: Vec::new(),
            live_iterators: Vec::new(),
            observers: Vec::new(),
            selector_matcher: Rc::new(SimpleSelectorMatcher),
        }
    }

    /// Replace the predicate used by `matches`, `closest` and `querySelector`
    pub fn set_selector_matcher(&mut self, matcher: Rc<dyn SelectorMatcher>) {
        self.selector_matcher = matcher;
    }

    /// Get a node by ID (`None` once the node has been destroyed)
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomException::NotFound)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DomResult<&mut Node> {
        self.get_mut(id).ok_or(DomException::NotFound)
    }

    /// Store a new node with a reference count of one
    pub(crate) fn alloc(&mut self, data: NodeData, document: Option<NodeId>) -> DomResult<NodeId> {
        self.nodes.insert(Node::new(data, document)).map(NodeId)
    }

    /// Whether the handle still refers to a live node
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// Number of live nodes across all documents
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub(crate) fn intern(&mut self, s: &str) -> Atom {
        self.interner.intern(s)
    }

    #[inline]
    pub(crate) fn atom(&self, atom: Atom) -> &str {
        self.interner.get(atom)
    }

    /// `prefix:local` or `local`
    pub(crate) fn qualified_name(&self, name: QualName) -> String {
        match name.prefix {
            Some(prefix) => format!("{}:{}", self.atom(prefix), self.atom(name.local)),
            None => self.atom(name.local).to_string(),
        }
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.get(id).map(Node::node_type)
    }

    /// `Node.nodeName`
    pub fn node_name(&self, id: NodeId) -> Option<String> {
        let node = self.get(id)?;
        let name = match &node.data {
            NodeData::Element(_) => return self.tag_name(id),
            NodeData::Attr(a) => self.qualified_name(a.name),
            NodeData::Text(_) => "#text".to_string(),
            NodeData::CDataSection(_) => "#cdata-section".to_string(),
            NodeData::ProcessingInstruction { target, .. } => target.clone(),
            NodeData::Comment(_) => "#comment".to_string(),
            NodeData::Document(_) => "#document".to_string(),
            NodeData::DocumentType(d) => d.name.clone(),
            NodeData::DocumentFragment => "#document-fragment".to_string(),
        };
        Some(name)
    }

    /// `Node.ownerDocument` (`None` for documents themselves)
    pub fn owner_document(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        if node.is_document() {
            return None;
        }
        node.node_document.filter(|doc| self.is_alive(*doc))
    }

    /// Node document, a document being its own
    pub(crate) fn node_document(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)
            .and_then(|node| node.node_document)
            .filter(|doc| self.is_alive(*doc))
    }

    // --- Navigation ---

    pub fn parent_node(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent_node(id)
            .filter(|parent| self.get(*parent).is_some_and(Node::is_element))
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    pub fn has_child_nodes(&self, id: NodeId) -> bool {
        self.first_child(id).is_some()
    }

    /// Iterate over the direct children of a node
    pub fn child_iter(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    pub fn child_count(&self, id: NodeId) -> u32 {
        self.child_iter(id).count() as u32
    }

    /// Index of a node among its siblings
    pub fn index(&self, id: NodeId) -> u32 {
        let mut index = 0;
        let mut current = self.previous_sibling(id);
        while let Some(sibling) = current {
            index += 1;
            current = self.previous_sibling(sibling);
        }
        index
    }

    pub fn child_at(&self, parent: NodeId, index: u32) -> Option<NodeId> {
        self.child_iter(parent).nth(index as usize)
    }

    /// DOM node length: 0 for doctypes and attributes, data length for
    /// character data, child count otherwise
    pub fn length(&self, id: NodeId) -> u32 {
        match self.get(id) {
            Some(node) => match &node.data {
                NodeData::DocumentType(_) | NodeData::Attr(_) => 0,
                _ => match node.character_data() {
                    Some(data) => data_len(data),
                    None => self.child_count(id),
                },
            },
            None => 0,
        }
    }

    /// Root of the tree containing `id` (the node itself when parentless)
    pub fn root(&self, id: NodeId) -> NodeId {
        self.inclusive_ancestors(id).last().unwrap_or(id)
    }

    /// `Node.getRootNode()`
    pub fn get_root_node(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|_| self.root(id))
    }

    /// Whether the node's root is a document
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.get(id).is_some() && self.get(self.root(id)).is_some_and(Node::is_document)
    }

    /// Ancestors of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent_node(id),
        }
    }

    /// The node followed by its ancestors
    pub fn inclusive_ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).map(|_| id),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.is_ancestor(ancestor, node)
    }

    /// `Node.contains(other)`: whether `other` is an inclusive descendant
    pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
        self.is_alive(node) && self.is_inclusive_ancestor(node, other)
    }

    /// Descendants of `root` in tree order (excluding `root`)
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            root,
            next: self.first_child(root),
        }
    }

    /// Next node in tree order, staying within `root`
    pub(crate) fn following(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
        if let Some(child) = self.first_child(node) {
            return Some(child);
        }
        self.following_skipping_children(node, root)
    }

    /// Next node in tree order that is not a descendant of `node`
    pub(crate) fn following_skipping_children(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            if current == root {
                return None;
            }
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent_node(current)?;
        }
    }

    /// Previous node in tree order, staying within `root`
    pub(crate) fn preceding(&self, node: NodeId, root: NodeId) -> Option<NodeId> {
        if node == root {
            return None;
        }
        match self.previous_sibling(node) {
            Some(sibling) => Some(self.last_inclusive_descendant(sibling)),
            None => self.parent_node(node),
        }
    }

    pub(crate) fn last_inclusive_descendant(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(child) = self.last_child(current) {
            current = child;
        }
        current
    }

    /// Compare two nodes in tree order (`None` when they have different roots)
    pub fn compare_tree_order(&self, a: NodeId, b: NodeId) -> Option<Ordering> {
        if a == b {
            return Some(Ordering::Equal);
        }

        let mut a_chain: Vec<NodeId> = self.inclusive_ancestors(a).collect();
        let mut b_chain: Vec<NodeId> = self.inclusive_ancestors(b).collect();
        a_chain.reverse();
        b_chain.reverse();

        if a_chain.first() != b_chain.first() || a_chain.is_empty() {
            return None;
        }

        let shared = a_chain
            .iter()
            .zip(b_chain.iter())
            .take_while(|(x, y)| x == y)
            .count();

        // One chain is a prefix of the other: the ancestor comes first
        if shared == a_chain.len() {
            return Some(Ordering::Less);
        }
        if shared == b_chain.len() {
            return Some(Ordering::Greater);
        }

        let a_branch = a_chain[shared];
        let b_branch = b_chain[shared];
        let mut current = self.next_sibling(a_branch);
        while let Some(sibling) = current {
            if sibling == b_branch {
                return Some(Ordering::Less);
            }
            current = self.next_sibling(sibling);
        }
        Some(Ordering::Greater)
    }

    /// `Node.compareDocumentPosition(other)`
    pub fn compare_document_position(&self, reference: NodeId, other: NodeId) -> u16 {
        if reference == other {
            return 0;
        }

        let mut node1 = Some(other);
        let mut node2 = Some(reference);
        let mut attr1 = None;
        let mut attr2 = None;

        if let Some(attr) = self.get(other).and_then(Node::as_attr) {
            attr1 = Some(other);
            node1 = attr.owner_element;
        }

        if let Some(attr) = self.get(reference).and_then(Node::as_attr) {
            attr2 = Some(reference);
            node2 = attr.owner_element;

            if let (Some(a1), Some(n1), Some(n2)) = (attr1, node1, node2) {
                if n1 == n2 {
                    let attrs = self.get(n2).and_then(Node::as_element).map(|e| e.attributes.as_slice());
                    for &attr in attrs.unwrap_or(&[]) {
                        if attr == a1 {
                            return DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC
                                | DOCUMENT_POSITION_PRECEDING;
                        }
                        if Some(attr) == attr2 {
                            return DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC
                                | DOCUMENT_POSITION_FOLLOWING;
                        }
                    }
                }
            }
        }

        let (n1, n2) = match (node1, node2) {
            (Some(n1), Some(n2)) if self.root(n1) == self.root(n2) => (n1, n2),
            _ => {
                // Consistent arbitrary order for disconnected nodes
                let direction = if other.0 < reference.0 {
                    DOCUMENT_POSITION_PRECEDING
                } else {
                    DOCUMENT_POSITION_FOLLOWING
                };
                return DOCUMENT_POSITION_DISCONNECTED
                    | DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC
                    | direction;
            }
        };

        if (attr1.is_none() && self.is_ancestor(n1, n2)) || (n1 == n2 && attr2.is_some()) {
            return DOCUMENT_POSITION_CONTAINS | DOCUMENT_POSITION_PRECEDING;
        }

        if (attr2.is_none() && self.is_ancestor(n2, n1)) || (n1 == n2 && attr1.is_some()) {
            return DOCUMENT_POSITION_CONTAINED_BY | DOCUMENT_POSITION_FOLLOWING;
        }

        match self.compare_tree_order(n1, n2) {
            Some(Ordering::Less) => DOCUMENT_POSITION_PRECEDING,
            _ => DOCUMENT_POSITION_FOLLOWING,
        }
    }

    pub fn is_same_node(&self, a: NodeId, b: NodeId) -> bool {
        a == b
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("signals", &self.signals.len())
            .field("controllers", &self.controllers.len())
            .field("listener_targets", &self.listeners.len())
            .finish()
    }
}

/// Iterator over the children of a node
pub struct Children<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

/// Iterator walking up the parent chain
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent_node(current);
        Some(current)
    }
}

/// Pre-order iterator over a subtree
pub struct Descendants<'a> {
    tree: &'a DomTree,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.following(current, self.root);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let html = tree.create_element(doc, "html").unwrap();
        let body = tree.create_element(doc, "body").unwrap();
        let p = tree.create_element(doc, "p").unwrap();
        tree.append_child(doc, html).unwrap();
        tree.append_child(html, body).unwrap();
        tree.append_child(body, p).unwrap();
        (tree, doc, html, body, p)
    }

    #[test]
    fn test_navigation() {
        let (tree, doc, html, body, p) = sample();
        assert_eq!(tree.parent_node(html), Some(doc));
        assert_eq!(tree.parent_element(html), None);
        assert_eq!(tree.parent_element(body), Some(html));
        assert_eq!(tree.first_child(body), Some(p));
        assert_eq!(tree.root(p), doc);
        assert!(tree.is_connected(p));
        assert_eq!(tree.owner_document(p), Some(doc));
        assert_eq!(tree.owner_document(doc), None);
    }

    #[test]
    fn test_tree_order_follows_ascension() {
        let (mut tree, doc, html, body, p) = sample();
        let span = tree.create_element(doc, "span").unwrap();
        tree.append_child(html, span).unwrap();

        assert_eq!(tree.compare_tree_order(doc, p), Some(Ordering::Less));
        assert_eq!(tree.compare_tree_order(p, body), Some(Ordering::Greater));
        assert_eq!(tree.compare_tree_order(p, span), Some(Ordering::Less));
        assert_eq!(tree.compare_tree_order(span, body), Some(Ordering::Greater));
        assert_eq!(tree.compare_tree_order(html, html), Some(Ordering::Equal));

        let order: Vec<_> = tree.descendants(doc).collect();
        assert_eq!(order, vec![html, body, p, span]);
    }

    #[test]
    fn test_disconnected_nodes_have_no_order() {
        let (mut tree, doc, _, _, p) = sample();
        let loose = tree.create_element(doc, "div").unwrap();
        assert_eq!(tree.compare_tree_order(p, loose), None);

        let position = tree.compare_document_position(p, loose);
        assert_ne!(position & DOCUMENT_POSITION_DISCONNECTED, 0);
        assert_ne!(position & DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC, 0);
        let reverse = tree.compare_document_position(loose, p);
        assert_ne!(
            position & DOCUMENT_POSITION_FOLLOWING,
            reverse & DOCUMENT_POSITION_FOLLOWING
        );
    }

    #[test]
    fn test_compare_document_position() {
        let (tree, _, html, body, p) = sample();
        assert_eq!(
            tree.compare_document_position(p, html),
            DOCUMENT_POSITION_CONTAINS | DOCUMENT_POSITION_PRECEDING
        );
        assert_eq!(
            tree.compare_document_position(html, p),
            DOCUMENT_POSITION_CONTAINED_BY | DOCUMENT_POSITION_FOLLOWING
        );
        assert_eq!(tree.compare_document_position(body, body), 0);
    }

    #[test]
    fn test_index_and_length() {
        let (mut tree, doc, html, body, p) = sample();
        let text = tree.create_text_node(doc, "héllo").unwrap();
        tree.append_child(html, text).unwrap();
        assert_eq!(tree.index(body), 0);
        assert_eq!(tree.index(text), 1);
        assert_eq!(tree.child_at(html, 1), Some(text));
        assert_eq!(tree.length(text), 5);
        assert_eq!(tree.length(html), 2);
        assert_eq!(tree.length(p), 0);
    }
}
