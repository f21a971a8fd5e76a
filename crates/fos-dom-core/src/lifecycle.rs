//! Reference-counted lifecycle
//!
//! Nodes, abort signals and abort controllers are reference counted. A new
//! object starts with one reference, held by whoever created it. Counts
//! saturate in both directions.
//!
//! A node is destroyed once its count is zero and nothing owns it: no parent
//! and, for attributes, no owner element. Destroying a node releases its
//! children and attributes; those still referenced become parentless roots.
//! Releasing a document to zero tears down every node it owns.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::node::NodeData;
use crate::{DomResult, DomTree, EventTarget, NodeId};

/// Explicit acquire/release ownership for handle types
pub trait RefCounted: Copy {
    /// Take an additional reference
    fn acquire(self, tree: &mut DomTree) -> DomResult<()>;

    /// Drop a reference, destroying the object when it becomes unowned
    fn release(self, tree: &mut DomTree) -> DomResult<()>;

    /// Current count (0 for a destroyed object)
    fn ref_count(self, tree: &DomTree) -> u32;
}

impl RefCounted for NodeId {
    fn acquire(self, tree: &mut DomTree) -> DomResult<()> {
        let node = tree.node_mut(self)?;
        node.ref_count = node.ref_count.saturating_add(1);
        Ok(())
    }

    fn release(self, tree: &mut DomTree) -> DomResult<()> {
        let node = tree.node_mut(self)?;
        node.ref_count = node.ref_count.saturating_sub(1);
        tree.collect_if_unowned(self);
        Ok(())
    }

    fn ref_count(self, tree: &DomTree) -> u32 {
        tree.get(self).map_or(0, |node| node.ref_count)
    }
}

impl DomTree {
    /// Destroy `id` if it is unreferenced and unowned
    pub(crate) fn collect_if_unowned(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else {
            return;
        };
        if node.ref_count > 0 || node.parent.is_some() {
            return;
        }
        if node.as_attr().is_some_and(|attr| attr.owner_element.is_some()) {
            return;
        }

        if node.is_document() {
            self.teardown_document(id);
        } else {
            self.destroy_subtree(id);
        }
    }

    /// Free `root` and every owned descendant nobody else references
    fn destroy_subtree(&mut self, root: NodeId) {
        let mut pending = vec![root];

        while let Some(id) = pending.pop() {
            let Some(node) = self.nodes.remove(id.0) else {
                continue;
            };
            trace!(?id, node_type = ?node.node_type(), "destroying node");
            self.listeners.remove(&EventTarget::Node(id));

            let mut child = node.first_child;
            while let Some(current) = child {
                let Some(child_node) = self.get_mut(current) else {
                    break;
                };
                child = child_node.next_sibling;
                child_node.parent = None;
                child_node.prev_sibling = None;
                child_node.next_sibling = None;
                if child_node.ref_count == 0 {
                    pending.push(current);
                }
            }

            if let NodeData::Element(element) = &node.data {
                for &attr in &element.attributes {
                    let Some(attr_node) = self.get_mut(attr) else {
                        continue;
                    };
                    if let Some(data) = attr_node.as_attr_mut() {
                        data.owner_element = None;
                    }
                    if attr_node.ref_count == 0 {
                        pending.push(attr);
                    }
                }
            }
        }
    }

    /// Free a document together with every node whose node document it is
    fn teardown_document(&mut self, document: NodeId) {
        // Tree order reversed puts children before their parents
        let mut owned: Vec<NodeId> = self.descendants(document).collect();
        owned.reverse();
        let connected = owned.len();
        let seen: HashSet<NodeId> = owned.iter().copied().collect();

        for key in self.nodes.keys().collect::<Vec<_>>() {
            let id = NodeId(key);
            if id != document
                && !seen.contains(&id)
                && self.get(id).is_some_and(|node| node.node_document == Some(document))
            {
                owned.push(id);
            }
        }

        debug!(
            ?document,
            connected,
            total = owned.len(),
            "tearing down document"
        );

        owned.push(document);
        for id in owned {
            if self.nodes.remove(id.0).is_some() {
                self.listeners.remove(&EventTarget::Node(id));
            }
        }
    }

    /// Drop the creator reference of a node that has just been given an owner
    pub(crate) fn drop_creator_ref(&mut self, id: NodeId) {
        if let Some(node) = self.get_mut(id) {
            node.ref_count = node.ref_count.saturating_sub(1);
        }
        self.collect_if_unowned(id);
    }
}
