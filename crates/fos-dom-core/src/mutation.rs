//! Tree mutation
//!
//! Insertion, removal and replacement of children, following the DOM
//! standard's pre-insert/insert/remove/replace algorithms. Every public
//! operation validates first and mutates second, so a failed call leaves
//! the tree untouched.
//!
//! Live ranges, node iterators and mutation observers are kept current from
//! the two primitive steps (`insert_nodes`, `remove_node`).

use tracing::trace;

use crate::lifecycle::RefCounted;
use crate::node::{Node, NodeData, NodeType};
use crate::{DomException, DomResult, DomTree, NodeId};

/// Argument of the variadic ChildNode/ParentNode methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrText<'a> {
    Node(NodeId),
    Text(&'a str),
}

impl From<NodeId> for NodeOrText<'_> {
    fn from(node: NodeId) -> Self {
        NodeOrText::Node(node)
    }
}

impl<'a> From<&'a str> for NodeOrText<'a> {
    fn from(text: &'a str) -> Self {
        NodeOrText::Text(text)
    }
}

impl DomTree {
    // --- Validation ---

    pub(crate) fn ensure_pre_insertion_validity(
        &self,
        node: NodeId,
        parent: NodeId,
        child: Option<NodeId>,
    ) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        let inserted = self.node(node)?;

        if !parent_node.can_have_children() {
            return Err(DomException::HierarchyRequest);
        }
        if self.is_inclusive_ancestor(node, parent) {
            return Err(DomException::HierarchyRequest);
        }
        if let Some(child) = child {
            if self.node(child)?.parent != Some(parent) {
                return Err(DomException::NotFound);
            }
        }
        Self::ensure_insertable_kind(parent_node, inserted)?;

        if parent_node.is_document() {
            self.ensure_document_child_limits(parent, node, child, false)?;
        }
        Ok(())
    }

    fn ensure_insertable_kind(parent: &Node, node: &Node) -> DomResult<()> {
        if matches!(node.data, NodeData::Attr(_) | NodeData::Document(_)) {
            return Err(DomException::HierarchyRequest);
        }
        if (node.is_text() && parent.is_document()) || (node.is_doctype() && !parent.is_document()) {
            return Err(DomException::HierarchyRequest);
        }
        Ok(())
    }

    /// A document holds at most one element and one doctype, doctype first
    fn ensure_document_child_limits(
        &self,
        document: NodeId,
        node: NodeId,
        child: Option<NodeId>,
        replacing: bool,
    ) -> DomResult<()> {
        let excluded = if replacing { child } else { None };
        let is_element = |id: NodeId| self.get(id).is_some_and(Node::is_element);
        let is_doctype = |id: NodeId| self.get(id).is_some_and(Node::is_doctype);

        let has_element_child = self
            .child_iter(document)
            .any(|c| Some(c) != excluded && is_element(c));
        let has_doctype_child = self
            .child_iter(document)
            .any(|c| Some(c) != excluded && is_doctype(c));
        let doctype_follows = child.is_some_and(|c| {
            std::iter::successors(self.next_sibling(c), |s| self.next_sibling(*s)).any(is_doctype)
        });
        let element_precedes = child.is_some_and(|c| {
            std::iter::successors(self.previous_sibling(c), |s| self.previous_sibling(*s))
                .any(is_element)
        });
        let child_is_doctype = !replacing && child.is_some_and(is_doctype);

        let inserted = self.node(node)?;
        let violates = match inserted.data {
            NodeData::DocumentFragment => {
                let elements = self.child_iter(node).filter(|c| is_element(*c)).count();
                let has_text = self
                    .child_iter(node)
                    .any(|c| self.get(c).is_some_and(Node::is_text));
                elements > 1
                    || has_text
                    || (elements == 1 && (has_element_child || child_is_doctype || doctype_follows))
            }
            NodeData::Element(_) => has_element_child || child_is_doctype || doctype_follows,
            NodeData::DocumentType(_) => {
                has_doctype_child
                    || element_precedes
                    || (!replacing && child.is_none() && has_element_child)
            }
            _ => false,
        };

        if violates {
            Err(DomException::HierarchyRequest)
        } else {
            Ok(())
        }
    }

    // --- Public mutation API ---

    /// `Node.appendChild(node)`
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.pre_insert(node, parent, None)
    }

    /// `Node.insertBefore(node, child)`
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        self.pre_insert(node, parent, child)
    }

    /// `Node.removeChild(child)`. The caller receives a reference to the
    /// removed node and must release it.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(DomException::NotFound);
        }
        self.remove_node(child, false);
        child.acquire(self)?;
        Ok(child)
    }

    /// `Node.replaceChild(node, child)`. The caller receives a reference to
    /// the replaced child and must release it.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        node: NodeId,
        child: NodeId,
    ) -> DomResult<NodeId> {
        self.replace(child, node, parent)?;
        child.acquire(self)?;
        Ok(child)
    }

    // --- Core algorithms ---

    pub(crate) fn pre_insert(
        &mut self,
        node: NodeId,
        parent: NodeId,
        child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        self.ensure_pre_insertion_validity(node, parent, child)?;

        let reference = if child == Some(node) {
            self.next_sibling(node)
        } else {
            child
        };
        self.insert_nodes(node, parent, reference, false);
        Ok(node)
    }

    /// Insert `node` (or a fragment's children) into `parent` before `child`
    pub(crate) fn insert_nodes(
        &mut self,
        node: NodeId,
        parent: NodeId,
        child: Option<NodeId>,
        suppress_observers: bool,
    ) {
        let is_fragment = matches!(
            self.get(node).map(|n| &n.data),
            Some(NodeData::DocumentFragment)
        );
        let nodes: Vec<NodeId> = if is_fragment {
            self.child_iter(node).collect()
        } else {
            vec![node]
        };
        if nodes.is_empty() {
            return;
        }

        if is_fragment {
            for &moved in &nodes {
                self.remove_node(moved, true);
            }
            self.queue_child_list_record(node, Vec::new(), nodes.clone(), None, None);
        }

        if let Some(child) = child {
            let index = self.index(child);
            self.ranges_on_insert(parent, index, nodes.len() as u32);
        }

        let previous_sibling = match child {
            Some(child) => self.previous_sibling(child),
            None => self.last_child(parent),
        };

        let document = self.node_document(parent);
        for &inserted in &nodes {
            if let Some(document) = document {
                self.adopt(inserted, document);
            }
            self.link_before(parent, inserted, child);
        }
        trace!(?parent, count = nodes.len(), "inserted nodes");

        if !suppress_observers {
            self.queue_child_list_record(parent, nodes, Vec::new(), previous_sibling, child);
        }
    }

    /// Detach `node` from its parent
    pub(crate) fn remove_node(&mut self, node: NodeId, suppress_observers: bool) {
        let Some(parent) = self.parent_node(node) else {
            return;
        };
        let index = self.index(node);

        self.ranges_before_remove(node, parent, index);
        self.iterators_before_remove(node);

        let old_previous = self.previous_sibling(node);
        let old_next = self.next_sibling(node);
        self.unlink(node);

        if !suppress_observers {
            self.queue_child_list_record(parent, Vec::new(), vec![node], old_previous, old_next);
        }
    }

    /// Replace `child` of `parent` with `node`
    fn replace(&mut self, child: NodeId, node: NodeId, parent: NodeId) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        let inserted = self.node(node)?;

        if !parent_node.can_have_children() {
            return Err(DomException::HierarchyRequest);
        }
        if self.is_inclusive_ancestor(node, parent) {
            return Err(DomException::HierarchyRequest);
        }
        if self.node(child)?.parent != Some(parent) {
            return Err(DomException::NotFound);
        }
        Self::ensure_insertable_kind(parent_node, inserted)?;
        if parent_node.is_document() {
            self.ensure_document_child_limits(parent, node, Some(child), true)?;
        }

        let mut reference = self.next_sibling(child);
        if reference == Some(node) {
            reference = self.next_sibling(node);
        }
        let mut previous_sibling = self.previous_sibling(child);
        if previous_sibling == Some(node) {
            previous_sibling = self.previous_sibling(node);
        }

        let mut removed = Vec::new();
        if self.parent_node(child).is_some() {
            removed.push(child);
            self.remove_node(child, true);
        }

        let added: Vec<NodeId> = if matches!(self.node(node)?.data, NodeData::DocumentFragment) {
            self.child_iter(node).collect()
        } else {
            vec![node]
        };
        self.insert_nodes(node, parent, reference, true);
        self.queue_child_list_record(parent, added, removed, previous_sibling, reference);
        Ok(())
    }

    /// Replace all children of `parent` with `node` (or nothing)
    pub(crate) fn replace_all(&mut self, node: Option<NodeId>, parent: NodeId) {
        let removed: Vec<NodeId> = self.child_iter(parent).collect();
        let added: Vec<NodeId> = match node {
            Some(node) if matches!(self.get(node).map(|n| &n.data), Some(NodeData::DocumentFragment)) => {
                self.child_iter(node).collect()
            }
            Some(node) => vec![node],
            None => Vec::new(),
        };

        for &child in &removed {
            self.remove_node(child, true);
        }
        if let Some(node) = node {
            self.insert_nodes(node, parent, None, true);
        }
        if !added.is_empty() || !removed.is_empty() {
            self.queue_child_list_record(parent, added, removed.clone(), None, None);
        }
        for child in removed {
            self.collect_if_unowned(child);
        }
    }

    /// Move `node` (and its subtree and attributes) into `document`
    pub(crate) fn adopt(&mut self, node: NodeId, document: NodeId) {
        let old_document = self.node_document(node);
        if self.parent_node(node).is_some() {
            self.remove_node(node, false);
        }
        if old_document == Some(document) {
            return;
        }

        let mut subtree = vec![node];
        subtree.extend(self.descendants(node));
        for id in subtree {
            let attrs = self
                .get(id)
                .and_then(Node::as_element)
                .map(|e| e.attributes.clone())
                .unwrap_or_default();
            for attr in attrs.into_iter().chain(std::iter::once(id)) {
                if let Some(n) = self.get_mut(attr) {
                    n.node_document = Some(document);
                }
            }
        }
    }

    fn link_before(&mut self, parent: NodeId, node: NodeId, before: Option<NodeId>) {
        let previous = match before {
            Some(before) => self.previous_sibling(before),
            None => self.last_child(parent),
        };

        if let Some(n) = self.get_mut(node) {
            n.parent = Some(parent);
            n.prev_sibling = previous;
            n.next_sibling = before;
        }
        match previous {
            Some(previous) => {
                if let Some(n) = self.get_mut(previous) {
                    n.next_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.first_child = Some(node);
                }
            }
        }
        match before {
            Some(before) => {
                if let Some(n) = self.get_mut(before) {
                    n.prev_sibling = Some(node);
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.last_child = Some(node);
                }
            }
        }
    }

    fn unlink(&mut self, node: NodeId) {
        let Some(n) = self.get_mut(node) else {
            return;
        };
        let parent = n.parent.take();
        let previous = n.prev_sibling.take();
        let next = n.next_sibling.take();
        let Some(parent) = parent else {
            return;
        };

        match previous {
            Some(previous) => {
                if let Some(p) = self.get_mut(previous) {
                    p.next_sibling = next;
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.first_child = next;
                }
            }
        }
        match next {
            Some(next) => {
                if let Some(n) = self.get_mut(next) {
                    n.prev_sibling = previous;
                }
            }
            None => {
                if let Some(p) = self.get_mut(parent) {
                    p.last_child = previous;
                }
            }
        }
    }

    // --- ChildNode / ParentNode ---

    /// Turn the variadic argument into one node. The flag reports whether the
    /// node was created here (and so carries a reference the caller drops).
    fn convert_nodes_into_node(
        &mut self,
        document: NodeId,
        nodes: &[NodeOrText<'_>],
    ) -> DomResult<(NodeId, bool)> {
        if let [NodeOrText::Node(node)] = nodes {
            self.node(*node)?;
            return Ok((*node, false));
        }
        if let [NodeOrText::Text(text)] = nodes {
            return Ok((self.create_text_node(document, text)?, true));
        }

        let fragment = self.create_document_fragment(document)?;
        // Nothing moves until every node is known to fit in the fragment
        for item in nodes {
            if let NodeOrText::Node(node) = *item {
                if let Err(err) = self.ensure_pre_insertion_validity(node, fragment, None) {
                    self.drop_creator_ref(fragment);
                    return Err(err);
                }
            }
        }

        for item in nodes {
            let result = match *item {
                NodeOrText::Node(node) => self.pre_insert(node, fragment, None).map(|_| ()),
                NodeOrText::Text(text) => self.create_text_node(document, text).map(|text| {
                    self.insert_nodes(text, fragment, None, false);
                    self.drop_creator_ref(text);
                }),
            };
            if let Err(err) = result {
                // Caller nodes stay alive, detached; text made here goes
                let moved: Vec<NodeId> = self.child_iter(fragment).collect();
                for node in moved {
                    self.remove_node(node, true);
                    if !Self::is_in(nodes, node) {
                        self.collect_if_unowned(node);
                    }
                }
                self.drop_creator_ref(fragment);
                return Err(err);
            }
        }
        Ok((fragment, true))
    }

    fn with_converted_nodes(
        &mut self,
        context: NodeId,
        nodes: &[NodeOrText<'_>],
        apply: impl FnOnce(&mut Self, NodeId) -> DomResult<()>,
    ) -> DomResult<()> {
        let document = self.node_document(context).ok_or(DomException::NotFound)?;
        let (node, created) = self.convert_nodes_into_node(document, nodes)?;
        let result = apply(self, node);
        if created {
            self.drop_creator_ref(node);
        }
        result
    }

    fn is_in(nodes: &[NodeOrText<'_>], id: NodeId) -> bool {
        nodes.iter().any(|n| *n == NodeOrText::Node(id))
    }

    /// `ChildNode.before(...nodes)`
    pub fn before(&mut self, node: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        let viable_previous = std::iter::successors(self.previous_sibling(node), |s| {
            self.previous_sibling(*s)
        })
        .find(|s| !Self::is_in(nodes, *s));

        self.with_converted_nodes(node, nodes, |tree, converted| {
            let reference = match viable_previous {
                Some(previous) => tree.next_sibling(previous),
                None => tree.first_child(parent),
            };
            tree.pre_insert(converted, parent, reference).map(|_| ())
        })
    }

    /// `ChildNode.after(...nodes)`
    pub fn after(&mut self, node: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        let viable_next = self.viable_next_sibling(node, nodes);

        self.with_converted_nodes(node, nodes, |tree, converted| {
            tree.pre_insert(converted, parent, viable_next).map(|_| ())
        })
    }

    /// `ChildNode.replaceWith(...nodes)`
    pub fn replace_with(&mut self, node: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        let viable_next = self.viable_next_sibling(node, nodes);

        self.with_converted_nodes(node, nodes, |tree, converted| {
            if tree.parent_node(node) == Some(parent) {
                tree.replace(node, converted, parent)?;
                tree.collect_if_unowned(node);
                Ok(())
            } else {
                tree.pre_insert(converted, parent, viable_next).map(|_| ())
            }
        })
    }

    fn viable_next_sibling(&self, node: NodeId, nodes: &[NodeOrText<'_>]) -> Option<NodeId> {
        std::iter::successors(self.next_sibling(node), |s| self.next_sibling(*s))
            .find(|s| !Self::is_in(nodes, *s))
    }

    /// `ChildNode.remove()`
    pub fn remove(&mut self, node: NodeId) -> DomResult<()> {
        self.node(node)?;
        self.remove_node(node, false);
        self.collect_if_unowned(node);
        Ok(())
    }

    /// `ParentNode.prepend(...nodes)`
    pub fn prepend(&mut self, parent: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        self.with_converted_nodes(parent, nodes, |tree, converted| {
            let first = tree.first_child(parent);
            tree.pre_insert(converted, parent, first).map(|_| ())
        })
    }

    /// `ParentNode.append(...nodes)`
    pub fn append(&mut self, parent: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        self.with_converted_nodes(parent, nodes, |tree, converted| {
            tree.pre_insert(converted, parent, None).map(|_| ())
        })
    }

    /// `ParentNode.replaceChildren(...nodes)`
    pub fn replace_children(&mut self, parent: NodeId, nodes: &[NodeOrText<'_>]) -> DomResult<()> {
        if nodes.is_empty() {
            self.node(parent)?;
            self.replace_all(None, parent);
            return Ok(());
        }
        self.with_converted_nodes(parent, nodes, |tree, converted| {
            tree.ensure_pre_insertion_validity(converted, parent, None)?;
            tree.replace_all(Some(converted), parent);
            Ok(())
        })
    }

    // --- Cloning and equality ---

    /// `Node.cloneNode(deep)`. The clone starts with one reference.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> DomResult<NodeId> {
        let document = self.node_document(node);
        self.clone_into(node, document, deep)
    }

    pub(crate) fn clone_into(
        &mut self,
        node: NodeId,
        document: Option<NodeId>,
        deep: bool,
    ) -> DomResult<NodeId> {
        let source = self.node(node)?;
        let data = source.data.shallow_clone();
        let attrs = source
            .as_element()
            .map(|e| e.attributes.clone())
            .unwrap_or_default();
        let is_document = source.is_document();

        let copy = self.alloc(data, document)?;
        let document = if is_document {
            if let Some(n) = self.get_mut(copy) {
                n.node_document = Some(copy);
            }
            Some(copy)
        } else {
            document
        };

        for attr in attrs {
            let Some(data) = self.get(attr).map(|a| a.data.shallow_clone()) else {
                continue;
            };
            let cloned = match self.alloc(data, document) {
                Ok(cloned) => cloned,
                Err(err) => {
                    self.drop_creator_ref(copy);
                    return Err(err);
                }
            };
            self.attach_attribute(copy, cloned);
            self.drop_creator_ref(cloned);
        }

        if deep {
            let children: Vec<NodeId> = self.child_iter(node).collect();
            for child in children {
                match self.clone_into(child, document, true) {
                    Ok(cloned) => {
                        self.link_before(copy, cloned, None);
                        self.drop_creator_ref(cloned);
                    }
                    Err(err) => {
                        self.drop_creator_ref(copy);
                        return Err(err);
                    }
                }
            }
        }

        Ok(copy)
    }

    /// `Node.isEqualNode(other)`
    pub fn is_equal_node(&self, a: NodeId, b: NodeId) -> bool {
        let (Some(x), Some(y)) = (self.get(a), self.get(b)) else {
            return false;
        };

        let same_payload = match (&x.data, &y.data) {
            (NodeData::Document(_), NodeData::Document(_))
            | (NodeData::DocumentFragment, NodeData::DocumentFragment) => true,
            (NodeData::DocumentType(p), NodeData::DocumentType(q)) => p == q,
            (NodeData::Element(p), NodeData::Element(q)) => {
                p.name == q.name
                    && p.attributes.len() == q.attributes.len()
                    && p.attributes.iter().all(|&attr| {
                        let Some(pa) = self.get(attr).and_then(Node::as_attr) else {
                            return false;
                        };
                        q.attributes.iter().any(|&other| {
                            self.get(other).and_then(Node::as_attr).is_some_and(|qa| {
                                qa.name.namespace == pa.name.namespace
                                    && qa.name.local == pa.name.local
                                    && qa.value == pa.value
                            })
                        })
                    })
            }
            (NodeData::Attr(p), NodeData::Attr(q)) => {
                p.name.namespace == q.name.namespace
                    && p.name.local == q.name.local
                    && p.value == q.value
            }
            (
                NodeData::ProcessingInstruction { target: t1, data: d1 },
                NodeData::ProcessingInstruction { target: t2, data: d2 },
            ) => t1 == t2 && d1 == d2,
            (NodeData::Text(p), NodeData::Text(q))
            | (NodeData::CDataSection(p), NodeData::CDataSection(q))
            | (NodeData::Comment(p), NodeData::Comment(q)) => p == q,
            _ => false,
        };
        if !same_payload {
            return false;
        }

        let mut left = self.child_iter(a);
        let mut right = self.child_iter(b);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(l), Some(r)) if self.is_equal_node(l, r) => {}
                _ => return false,
            }
        }
    }

    // --- Text content ---

    /// `Node.textContent`
    pub fn text_content(&self, node: NodeId) -> Option<String> {
        let n = self.get(node)?;
        match &n.data {
            NodeData::Element(_) | NodeData::DocumentFragment => Some(self.descendant_text(node)),
            NodeData::Attr(a) => Some(a.value.clone()),
            _ => n.character_data().map(str::to_string),
        }
    }

    /// Concatenated data of the Text descendants of `node`
    pub(crate) fn descendant_text(&self, node: NodeId) -> String {
        let mut text = String::new();
        for id in self.descendants(node) {
            if let Some(n) = self.get(id) {
                if n.is_text() {
                    text.push_str(n.character_data().unwrap_or_default());
                }
            }
        }
        text
    }

    /// Set `Node.textContent` (`None` behaves as the empty string)
    pub fn set_text_content(&mut self, node: NodeId, value: Option<&str>) -> DomResult<()> {
        let value = value.unwrap_or_default();
        let node_type = self.node(node)?.node_type();
        match node_type {
            NodeType::Element | NodeType::DocumentFragment => {
                let text = if value.is_empty() {
                    None
                } else {
                    let document = self.node_document(node).ok_or(DomException::NotFound)?;
                    Some(self.create_text_node(document, value)?)
                };
                self.replace_all(text, node);
                if let Some(text) = text {
                    self.drop_creator_ref(text);
                }
                Ok(())
            }
            NodeType::Attribute => self.set_attr_value(node, value),
            NodeType::Text
            | NodeType::CDataSection
            | NodeType::Comment
            | NodeType::ProcessingInstruction => {
                let length = self.length(node);
                self.replace_data(node, 0, length, value)
            }
            NodeType::Document | NodeType::DocumentType => Ok(()),
        }
    }

    /// `Node.nodeValue`
    pub fn node_value(&self, node: NodeId) -> Option<String> {
        let n = self.get(node)?;
        match &n.data {
            NodeData::Attr(a) => Some(a.value.clone()),
            _ => n.character_data().map(str::to_string),
        }
    }

    /// Set `Node.nodeValue`; a no-op for nodes without a value
    pub fn set_node_value(&mut self, node: NodeId, value: Option<&str>) -> DomResult<()> {
        let value = value.unwrap_or_default();
        let n = self.node(node)?;
        if n.is_attr() {
            self.set_attr_value(node, value)
        } else if n.is_character_data() {
            let length = self.length(node);
            self.replace_data(node, 0, length, value)
        } else {
            Ok(())
        }
    }

    /// `Node.normalize()`: drop empty Text nodes and merge adjacent ones
    pub fn normalize(&mut self, node: NodeId) -> DomResult<()> {
        self.node(node)?;
        let is_exclusive_text =
            |tree: &DomTree, id: NodeId| matches!(tree.get(id).map(|n| &n.data), Some(NodeData::Text(_)));

        let candidates: Vec<NodeId> = self
            .descendants(node)
            .filter(|id| is_exclusive_text(self, *id))
            .collect();

        for text in candidates {
            if !self.is_alive(text) || !self.is_ancestor(node, text) {
                continue;
            }

            let mut length = self.length(text);
            if length == 0 {
                self.remove_node(text, false);
                self.collect_if_unowned(text);
                continue;
            }

            let siblings: Vec<NodeId> =
                std::iter::successors(self.next_sibling(text), |s| self.next_sibling(*s))
                    .take_while(|s| is_exclusive_text(self, *s))
                    .collect();
            if siblings.is_empty() {
                continue;
            }

            let merged: String = siblings
                .iter()
                .filter_map(|s| self.get(*s).and_then(Node::character_data))
                .collect();
            self.replace_data(text, length, 0, &merged)?;

            for &sibling in &siblings {
                let index = self.index(sibling);
                self.ranges_on_merge(text, sibling, length, index);
                length += self.length(sibling);
            }
            for sibling in siblings {
                self.remove_node(sibling, false);
                self.collect_if_unowned(sibling);
            }
        }
        Ok(())
    }
}
