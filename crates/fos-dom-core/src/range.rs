//! Range
//!
//! A live range is a pair of boundary points that the tree keeps valid as it
//! mutates. Boundaries live behind `Rc<RefCell<_>>` so the tree can adjust
//! every registered range from inside a mutation; cloning a `Range` handle
//! shares the same boundaries, `clone_range` makes an independent copy.
//!
//! When a boundary is set past the other one, the boundary being set wins and
//! the other collapses onto it.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use tracing::trace;

use crate::node::{Node, NodeData};
use crate::{DomException, DomResult, DomTree, NodeId};

/// Range boundary point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundaryPoint {
    /// The container node
    pub node: NodeId,
    /// Offset within the container (character offset for character data,
    /// child index otherwise)
    pub offset: u32,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: u32) -> Self {
        Self { node, offset }
    }
}

/// `how` argument of `compareBoundaryPoints`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCompare {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

impl RangeCompare {
    pub fn from_u16(how: u16) -> DomResult<Self> {
        match how {
            0 => Ok(RangeCompare::StartToStart),
            1 => Ok(RangeCompare::StartToEnd),
            2 => Ok(RangeCompare::EndToEnd),
            3 => Ok(RangeCompare::EndToStart),
            _ => Err(DomException::NotSupported),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            RangeCompare::StartToStart => 0,
            RangeCompare::StartToEnd => 1,
            RangeCompare::EndToEnd => 2,
            RangeCompare::EndToStart => 3,
        }
    }
}

/// Position of boundary point `a` relative to `b` (`None` across trees)
pub(crate) fn compare_points(tree: &DomTree, a: BoundaryPoint, b: BoundaryPoint) -> Option<Ordering> {
    if a.node == b.node {
        return Some(a.offset.cmp(&b.offset));
    }
    if tree.compare_tree_order(a.node, b.node)? == Ordering::Greater {
        return compare_points(tree, b, a).map(Ordering::reverse);
    }
    if tree.is_ancestor(a.node, b.node) {
        let child = tree
            .inclusive_ancestors(b.node)
            .find(|n| tree.parent_node(*n) == Some(a.node))?;
        if tree.index(child) < a.offset {
            return Some(Ordering::Greater);
        }
    }
    Some(Ordering::Less)
}

fn ordering_to_i16(ordering: Ordering) -> i16 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// Boundaries of a live range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RangeBounds {
    pub(crate) start: BoundaryPoint,
    pub(crate) end: BoundaryPoint,
}

/// Live range
#[derive(Clone)]
pub struct Range {
    bounds: Rc<RefCell<RangeBounds>>,
}

impl Range {
    fn bounds(&self) -> RangeBounds {
        *self.bounds.borrow()
    }

    fn set_bounds(&self, start: BoundaryPoint, end: BoundaryPoint) {
        *self.bounds.borrow_mut() = RangeBounds { start, end };
    }

    // --- Getters ---

    pub fn start(&self) -> BoundaryPoint {
        self.bounds().start
    }

    pub fn end(&self) -> BoundaryPoint {
        self.bounds().end
    }

    pub fn start_container(&self) -> NodeId {
        self.bounds().start.node
    }

    pub fn start_offset(&self) -> u32 {
        self.bounds().start.offset
    }

    pub fn end_container(&self) -> NodeId {
        self.bounds().end.node
    }

    pub fn end_offset(&self) -> u32 {
        self.bounds().end.offset
    }

    /// Check if the range is collapsed
    pub fn collapsed(&self) -> bool {
        let bounds = self.bounds();
        bounds.start == bounds.end
    }

    /// Deepest node that is an inclusive ancestor of both boundary containers
    pub fn common_ancestor_container(&self, tree: &DomTree) -> NodeId {
        let bounds = self.bounds();
        tree.common_ancestor(bounds.start.node, bounds.end.node)
    }

    // --- Boundary setters ---

    fn checked_point(tree: &DomTree, node: NodeId, offset: u32) -> DomResult<BoundaryPoint> {
        let container = tree.node(node)?;
        if container.is_doctype() || container.is_attr() {
            return Err(DomException::InvalidNodeType);
        }
        if offset > tree.length(node) {
            return Err(DomException::IndexSize);
        }
        Ok(BoundaryPoint::new(node, offset))
    }

    fn set_boundary(&self, tree: &DomTree, point: BoundaryPoint, is_start: bool) {
        let bounds = self.bounds();
        if is_start {
            let end = match compare_points(tree, point, bounds.end) {
                Some(Ordering::Greater) | None => point,
                _ => bounds.end,
            };
            self.set_bounds(point, end);
        } else {
            let start = match compare_points(tree, point, bounds.start) {
                Some(Ordering::Less) | None => point,
                _ => bounds.start,
            };
            self.set_bounds(start, point);
        }
    }

    /// `Range.setStart(node, offset)`
    pub fn set_start(&self, tree: &DomTree, node: NodeId, offset: u32) -> DomResult<()> {
        let point = Self::checked_point(tree, node, offset)?;
        self.set_boundary(tree, point, true);
        Ok(())
    }

    /// `Range.setEnd(node, offset)`
    pub fn set_end(&self, tree: &DomTree, node: NodeId, offset: u32) -> DomResult<()> {
        let point = Self::checked_point(tree, node, offset)?;
        self.set_boundary(tree, point, false);
        Ok(())
    }

    fn position_in_parent(tree: &DomTree, node: NodeId) -> DomResult<(NodeId, u32)> {
        tree.node(node)?;
        let parent = tree.parent_node(node).ok_or(DomException::InvalidNodeType)?;
        Ok((parent, tree.index(node)))
    }

    pub fn set_start_before(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let (parent, index) = Self::position_in_parent(tree, node)?;
        self.set_start(tree, parent, index)
    }

    pub fn set_start_after(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let (parent, index) = Self::position_in_parent(tree, node)?;
        self.set_start(tree, parent, index + 1)
    }

    pub fn set_end_before(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let (parent, index) = Self::position_in_parent(tree, node)?;
        self.set_end(tree, parent, index)
    }

    pub fn set_end_after(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let (parent, index) = Self::position_in_parent(tree, node)?;
        self.set_end(tree, parent, index + 1)
    }

    /// Collapse onto one boundary
    pub fn collapse(&self, to_start: bool) {
        let bounds = self.bounds();
        if to_start {
            self.set_bounds(bounds.start, bounds.start);
        } else {
            self.set_bounds(bounds.end, bounds.end);
        }
    }

    /// `Range.selectNode(node)`
    pub fn select_node(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let (parent, index) = Self::position_in_parent(tree, node)?;
        self.set_bounds(
            BoundaryPoint::new(parent, index),
            BoundaryPoint::new(parent, index + 1),
        );
        Ok(())
    }

    /// `Range.selectNodeContents(node)`
    pub fn select_node_contents(&self, tree: &DomTree, node: NodeId) -> DomResult<()> {
        let container = tree.node(node)?;
        if container.is_doctype() || container.is_attr() {
            return Err(DomException::InvalidNodeType);
        }
        self.set_bounds(
            BoundaryPoint::new(node, 0),
            BoundaryPoint::new(node, tree.length(node)),
        );
        Ok(())
    }

    // --- Comparison ---

    /// `Range.compareBoundaryPoints(how, sourceRange)`: -1, 0 or 1
    pub fn compare_boundary_points(&self, tree: &DomTree, how: u16, source: &Range) -> DomResult<i16> {
        let how = RangeCompare::from_u16(how)?;
        let this = self.bounds();
        let other = source.bounds();
        if tree.root(this.start.node) != tree.root(other.start.node) {
            return Err(DomException::WrongDocument);
        }

        let (a, b) = match how {
            RangeCompare::StartToStart => (this.start, other.start),
            RangeCompare::StartToEnd => (this.end, other.start),
            RangeCompare::EndToEnd => (this.end, other.end),
            RangeCompare::EndToStart => (this.start, other.end),
        };
        compare_points(tree, a, b)
            .map(ordering_to_i16)
            .ok_or(DomException::WrongDocument)
    }

    /// `Range.comparePoint(node, offset)`: -1 before, 0 inside, 1 after
    pub fn compare_point(&self, tree: &DomTree, node: NodeId, offset: u32) -> DomResult<i16> {
        let bounds = self.bounds();
        tree.node(node)?;
        if tree.root(node) != tree.root(bounds.start.node) {
            return Err(DomException::WrongDocument);
        }
        let point = Self::checked_point(tree, node, offset)?;

        if compare_points(tree, point, bounds.start) == Some(Ordering::Less) {
            return Ok(-1);
        }
        if compare_points(tree, point, bounds.end) == Some(Ordering::Greater) {
            return Ok(1);
        }
        Ok(0)
    }

    /// `Range.isPointInRange(node, offset)`
    pub fn is_point_in_range(&self, tree: &DomTree, node: NodeId, offset: u32) -> DomResult<bool> {
        let bounds = self.bounds();
        tree.node(node)?;
        if tree.root(node) != tree.root(bounds.start.node) {
            return Ok(false);
        }
        let point = Self::checked_point(tree, node, offset)?;

        Ok(compare_points(tree, point, bounds.start) != Some(Ordering::Less)
            && compare_points(tree, point, bounds.end) != Some(Ordering::Greater))
    }

    /// `Range.intersectsNode(node)`
    pub fn intersects_node(&self, tree: &DomTree, node: NodeId) -> bool {
        let bounds = self.bounds();
        if !tree.is_alive(node) || tree.root(node) != tree.root(bounds.start.node) {
            return false;
        }
        let Some(parent) = tree.parent_node(node) else {
            return true;
        };
        let offset = tree.index(node);
        compare_points(tree, BoundaryPoint::new(parent, offset), bounds.end) == Some(Ordering::Less)
            && compare_points(tree, BoundaryPoint::new(parent, offset + 1), bounds.start)
                == Some(Ordering::Greater)
    }

    // --- Contents ---

    /// `Range.deleteContents()`
    pub fn delete_contents(&self, tree: &mut DomTree) -> DomResult<()> {
        let RangeBounds { start, end } = self.bounds();
        if start == end {
            return Ok(());
        }
        if start.node == end.node && tree.is_character_data(start.node) {
            return tree.replace_data(start.node, start.offset, end.offset - start.offset, "");
        }

        let common = tree.common_ancestor(start.node, end.node);
        let to_remove: Vec<NodeId> = tree
            .descendants(common)
            .filter(|&n| tree.is_contained(n, start, end))
            .filter(|&n| {
                tree.parent_node(n)
                    .is_none_or(|p| !tree.is_contained(p, start, end))
            })
            .collect();
        let collapse_point = tree.collapse_point(start, end);

        if tree.is_character_data(start.node) {
            let count = tree.length(start.node) - start.offset;
            tree.replace_data(start.node, start.offset, count, "")?;
        }
        for node in to_remove {
            tree.remove_node(node, false);
            tree.collect_if_unowned(node);
        }
        if tree.is_character_data(end.node) {
            tree.replace_data(end.node, 0, end.offset, "")?;
        }

        self.set_bounds(collapse_point, collapse_point);
        Ok(())
    }

    /// `Range.extractContents()`. The fragment carries one reference for the caller.
    pub fn extract_contents(&self, tree: &mut DomTree) -> DomResult<NodeId> {
        let RangeBounds { start, end } = self.bounds();
        let (fragment, collapse_point) = tree.extract_between(start, end)?;
        if let Some(point) = collapse_point {
            self.set_bounds(point, point);
        }
        Ok(fragment)
    }

    /// `Range.cloneContents()`. The fragment carries one reference for the caller.
    pub fn clone_contents(&self, tree: &mut DomTree) -> DomResult<NodeId> {
        let RangeBounds { start, end } = self.bounds();
        tree.clone_between(start, end)
    }

    /// `Range.insertNode(node)`: insert at the start boundary
    pub fn insert_node(&self, tree: &mut DomTree, node: NodeId) -> DomResult<()> {
        let start = self.start();
        let container = tree.node(start.node)?;
        let start_is_text = container.is_text();
        if matches!(
            container.data,
            NodeData::ProcessingInstruction { .. } | NodeData::Comment(_)
        ) || (start_is_text && container.parent.is_none())
            || start.node == node
        {
            return Err(DomException::HierarchyRequest);
        }

        let (parent, mut reference) = if start_is_text {
            let parent = tree.parent_node(start.node).ok_or(DomException::HierarchyRequest)?;
            (parent, Some(start.node))
        } else {
            (start.node, tree.child_at(start.node, start.offset))
        };
        tree.ensure_pre_insertion_validity(node, parent, reference)?;

        if start_is_text {
            let tail = tree.split_text(start.node, start.offset)?;
            tree.drop_creator_ref(tail);
            reference = Some(tail);
        }
        if reference == Some(node) {
            reference = tree.next_sibling(node);
        }
        if tree.parent_node(node).is_some() {
            tree.remove_node(node, false);
        }

        let mut new_offset = match reference {
            Some(reference) => tree.index(reference),
            None => tree.length(parent),
        };
        new_offset += if matches!(tree.node(node)?.data, NodeData::DocumentFragment) {
            tree.length(node)
        } else {
            1
        };

        tree.pre_insert(node, parent, reference)?;

        if self.collapsed() {
            let start = self.start();
            self.set_bounds(start, BoundaryPoint::new(parent, new_offset));
        }
        Ok(())
    }

    /// `Range.surroundContents(newParent)`
    pub fn surround_contents(&self, tree: &mut DomTree, new_parent: NodeId) -> DomResult<()> {
        let RangeBounds { start, end } = self.bounds();
        let partial_non_text = tree
            .inclusive_ancestors(start.node)
            .filter(|&n| !tree.is_inclusive_ancestor(n, end.node))
            .chain(
                tree.inclusive_ancestors(end.node)
                    .filter(|&n| !tree.is_inclusive_ancestor(n, start.node)),
            )
            .any(|n| !tree.get(n).is_some_and(Node::is_text));
        if partial_non_text {
            return Err(DomException::InvalidState);
        }
        if matches!(
            tree.node(new_parent)?.data,
            NodeData::Document(_) | NodeData::DocumentType(_) | NodeData::DocumentFragment
        ) {
            return Err(DomException::InvalidNodeType);
        }

        let fragment = self.extract_contents(tree)?;
        let result = (|| {
            if tree.has_child_nodes(new_parent) {
                tree.replace_all(None, new_parent);
            }
            self.insert_node(tree, new_parent)?;
            tree.append_child(new_parent, fragment)?;
            self.select_node(tree, new_parent)
        })();
        tree.drop_creator_ref(fragment);
        result
    }

    /// Independent live range with the same boundaries
    pub fn clone_range(&self, tree: &mut DomTree) -> Range {
        tree.register_range(self.bounds())
    }

    /// Does nothing (kept for compatibility)
    pub fn detach(&self) {}

    /// `Range.toString()`: the text data the range covers
    pub fn to_string(&self, tree: &DomTree) -> String {
        let RangeBounds { start, end } = self.bounds();
        let is_text = |id: NodeId| tree.get(id).is_some_and(Node::is_text);
        let substring = |id: NodeId, offset: u32, count: u32| {
            tree.substring_data(id, offset, count).unwrap_or_default()
        };

        if start.node == end.node && is_text(start.node) {
            return substring(start.node, start.offset, end.offset.saturating_sub(start.offset));
        }

        let mut text = String::new();
        if is_text(start.node) {
            text.push_str(&substring(start.node, start.offset, u32::MAX));
        }
        let common = tree.common_ancestor(start.node, end.node);
        for node in tree.descendants(common) {
            if is_text(node) && tree.is_contained(node, start, end) {
                text.push_str(tree.data(node).unwrap_or_default());
            }
        }
        if is_text(end.node) {
            text.push_str(&substring(end.node, 0, end.offset));
        }
        text
    }
}

impl std::fmt::Debug for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bounds = self.bounds();
        f.debug_struct("Range")
            .field("start", &bounds.start)
            .field("end", &bounds.end)
            .finish()
    }
}

impl DomTree {
    /// `Document.createRange()`: a collapsed range at (document, 0)
    pub fn create_range(&mut self, document: NodeId) -> DomResult<Range> {
        if !self.node(document)?.is_document() {
            return Err(DomException::Type);
        }
        let point = BoundaryPoint::new(document, 0);
        Ok(self.register_range(RangeBounds { start: point, end: point }))
    }

    fn register_range(&mut self, bounds: RangeBounds) -> Range {
        let bounds = Rc::new(RefCell::new(bounds));
        self.live_ranges.retain(|weak| weak.strong_count() > 0);
        self.live_ranges.push(Rc::downgrade(&bounds));
        Range { bounds }
    }

    fn is_character_data(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(Node::is_character_data)
    }

    pub(crate) fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        self.inclusive_ancestors(a)
            .find(|&ancestor| self.is_inclusive_ancestor(ancestor, b))
            .unwrap_or(a)
    }

    /// Node lies entirely between the two boundary points
    fn is_contained(&self, node: NodeId, start: BoundaryPoint, end: BoundaryPoint) -> bool {
        compare_points(self, BoundaryPoint::new(node, 0), start) == Some(Ordering::Greater)
            && compare_points(self, BoundaryPoint::new(node, self.length(node)), end)
                == Some(Ordering::Less)
    }

    /// Inclusive ancestor of exactly one boundary container
    fn is_partially_contained(&self, node: NodeId, start: BoundaryPoint, end: BoundaryPoint) -> bool {
        self.is_inclusive_ancestor(node, start.node) != self.is_inclusive_ancestor(node, end.node)
    }

    /// Where a range collapses after its contents are taken out
    fn collapse_point(&self, start: BoundaryPoint, end: BoundaryPoint) -> BoundaryPoint {
        if self.is_inclusive_ancestor(start.node, end.node) {
            return start;
        }
        let mut reference = start.node;
        while let Some(parent) = self.parent_node(reference) {
            if self.is_inclusive_ancestor(parent, end.node) {
                return BoundaryPoint::new(parent, self.index(reference) + 1);
            }
            reference = parent;
        }
        start
    }

    /// Shallow copy of a character data node holding `data`
    fn clone_with_data(&mut self, node: NodeId, data: String) -> DomResult<NodeId> {
        let copy = self.clone_node(node, false)?;
        if let Some(slot) = self.get_mut(copy).and_then(Node::character_data_mut) {
            *slot = data;
        }
        Ok(copy)
    }

    /// Append a node whose creator reference the caller holds, giving that reference up
    fn append_owned(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let result = self.append_child(parent, child);
        self.drop_creator_ref(child);
        result.map(|_| ())
    }

    /// Children of the common ancestor that the range cuts through or covers
    fn split_children(
        &self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<(Option<NodeId>, Vec<NodeId>, Option<NodeId>)> {
        let common = self.common_ancestor(start.node, end.node);
        let first_partial = if self.is_inclusive_ancestor(start.node, end.node) {
            None
        } else {
            self.child_iter(common)
                .find(|&c| self.is_partially_contained(c, start, end))
        };
        let last_partial = if self.is_inclusive_ancestor(end.node, start.node) {
            None
        } else {
            self.child_iter(common)
                .filter(|&c| self.is_partially_contained(c, start, end))
                .last()
        };
        let contained: Vec<NodeId> = self
            .child_iter(common)
            .filter(|&c| self.is_contained(c, start, end))
            .collect();
        if contained
            .iter()
            .any(|&c| self.get(c).is_some_and(Node::is_doctype))
        {
            return Err(DomException::HierarchyRequest);
        }
        Ok((first_partial, contained, last_partial))
    }

    fn new_fragment_for(&mut self, node: NodeId) -> DomResult<NodeId> {
        let document = self.node_document(node).ok_or(DomException::NotFound)?;
        self.create_document_fragment(document)
    }

    /// Move the contents between two boundary points into a new fragment.
    /// Also returns where the range should collapse, when it moved.
    fn extract_between(
        &mut self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<(NodeId, Option<BoundaryPoint>)> {
        if start == end {
            return Ok((self.new_fragment_for(start.node)?, None));
        }
        if start.node == end.node && self.is_character_data(start.node) {
            let fragment = self.new_fragment_for(start.node)?;
            let result = self.extract_character_data(fragment, start.node, start.offset, end.offset - start.offset);
            return self.finish_fragment(fragment, result).map(|f| (f, None));
        }

        let (first_partial, contained, last_partial) = self.split_children(start, end)?;
        let collapse_point = self.collapse_point(start, end);
        let fragment = self.new_fragment_for(start.node)?;

        let result = (|| {
            if let Some(first) = first_partial {
                if self.is_character_data(first) {
                    let count = self.length(start.node) - start.offset;
                    self.extract_character_data(fragment, start.node, start.offset, count)?;
                } else {
                    let copy = self.clone_node(first, false)?;
                    self.append_owned(fragment, copy)?;
                    let inner_end = BoundaryPoint::new(first, self.length(first));
                    let (inner, _) = self.extract_between(start, inner_end)?;
                    self.append_owned(copy, inner)?;
                }
            }

            for child in contained {
                self.append_child(fragment, child)?;
            }

            if let Some(last) = last_partial {
                if self.is_character_data(last) {
                    self.extract_character_data(fragment, end.node, 0, end.offset)?;
                } else {
                    let copy = self.clone_node(last, false)?;
                    self.append_owned(fragment, copy)?;
                    let inner_start = BoundaryPoint::new(last, 0);
                    let (inner, _) = self.extract_between(inner_start, end)?;
                    self.append_owned(copy, inner)?;
                }
            }
            Ok(())
        })();

        trace!(?start, ?end, "extracted range contents");
        self.finish_fragment(fragment, result)
            .map(|f| (f, Some(collapse_point)))
    }

    fn extract_character_data(
        &mut self,
        fragment: NodeId,
        node: NodeId,
        offset: u32,
        count: u32,
    ) -> DomResult<()> {
        let data = self.substring_data(node, offset, count)?;
        let copy = self.clone_with_data(node, data)?;
        self.append_owned(fragment, copy)?;
        self.replace_data(node, offset, count, "")
    }

    /// Hand the fragment out on success, free it on failure
    fn finish_fragment(&mut self, fragment: NodeId, result: DomResult<()>) -> DomResult<NodeId> {
        match result {
            Ok(()) => Ok(fragment),
            Err(err) => {
                self.drop_creator_ref(fragment);
                Err(err)
            }
        }
    }

    /// Copy the contents between two boundary points into a new fragment
    fn clone_between(&mut self, start: BoundaryPoint, end: BoundaryPoint) -> DomResult<NodeId> {
        if start == end {
            return self.new_fragment_for(start.node);
        }
        if start.node == end.node && self.is_character_data(start.node) {
            let fragment = self.new_fragment_for(start.node)?;
            let result = self.clone_character_data(fragment, start.node, start.offset, end.offset - start.offset);
            return self.finish_fragment(fragment, result);
        }

        let (first_partial, contained, last_partial) = self.split_children(start, end)?;
        let fragment = self.new_fragment_for(start.node)?;

        let result = (|| {
            if let Some(first) = first_partial {
                if self.is_character_data(first) {
                    let count = self.length(start.node) - start.offset;
                    self.clone_character_data(fragment, start.node, start.offset, count)?;
                } else {
                    let copy = self.clone_node(first, false)?;
                    self.append_owned(fragment, copy)?;
                    let inner_end = BoundaryPoint::new(first, self.length(first));
                    let inner = self.clone_between(start, inner_end)?;
                    self.append_owned(copy, inner)?;
                }
            }

            for child in contained {
                let copy = self.clone_node(child, true)?;
                self.append_owned(fragment, copy)?;
            }

            if let Some(last) = last_partial {
                if self.is_character_data(last) {
                    self.clone_character_data(fragment, end.node, 0, end.offset)?;
                } else {
                    let copy = self.clone_node(last, false)?;
                    self.append_owned(fragment, copy)?;
                    let inner_start = BoundaryPoint::new(last, 0);
                    let inner = self.clone_between(inner_start, end)?;
                    self.append_owned(copy, inner)?;
                }
            }
            Ok(())
        })();

        self.finish_fragment(fragment, result)
    }

    fn clone_character_data(
        &mut self,
        fragment: NodeId,
        node: NodeId,
        offset: u32,
        count: u32,
    ) -> DomResult<()> {
        let data = self.substring_data(node, offset, count)?;
        let copy = self.clone_with_data(node, data)?;
        self.append_owned(fragment, copy)
    }

    // --- Live range bookkeeping ---

    fn for_each_live_range(&mut self, mut update: impl FnMut(&DomTree, &mut RangeBounds)) {
        self.live_ranges.retain(|weak| weak.strong_count() > 0);
        let tree: &DomTree = self;
        for weak in &tree.live_ranges {
            if let Some(bounds) = weak.upgrade() {
                update(tree, &mut bounds.borrow_mut());
            }
        }
    }

    /// `count` nodes inserted into `parent` at `index`
    pub(crate) fn ranges_on_insert(&mut self, parent: NodeId, index: u32, count: u32) {
        self.for_each_live_range(|_, bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node == parent && point.offset > index {
                    point.offset += count;
                }
            }
        });
    }

    /// `node`, child `index` of `parent`, is about to be removed
    pub(crate) fn ranges_before_remove(&mut self, node: NodeId, parent: NodeId, index: u32) {
        self.for_each_live_range(|tree, bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if tree.is_inclusive_ancestor(node, point.node) {
                    *point = BoundaryPoint::new(parent, index);
                } else if point.node == parent && point.offset > index {
                    point.offset -= 1;
                }
            }
        });
    }

    /// `count` units at `offset` of `node` replaced by `inserted` units
    pub(crate) fn ranges_on_replace_data(&mut self, node: NodeId, offset: u32, count: u32, inserted: u32) {
        self.for_each_live_range(|_, bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node != node || point.offset <= offset {
                    continue;
                }
                if point.offset <= offset + count {
                    point.offset = offset;
                } else {
                    point.offset = point.offset - count + inserted;
                }
            }
        });
    }

    /// `node` (child `index` of `parent`) split at `offset`, the tail now `new_node`
    pub(crate) fn ranges_on_split(
        &mut self,
        node: NodeId,
        new_node: NodeId,
        offset: u32,
        parent: NodeId,
        index: u32,
    ) {
        self.for_each_live_range(|_, bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node == node && point.offset > offset {
                    *point = BoundaryPoint::new(new_node, point.offset - offset);
                } else if point.node == parent && point.offset == index + 1 {
                    point.offset += 1;
                }
            }
        });
    }

    /// `sibling` (child `index`) merged into `text`, whose data was `length` long before it
    pub(crate) fn ranges_on_merge(&mut self, text: NodeId, sibling: NodeId, length: u32, index: u32) {
        let parent = self.parent_node(sibling);
        self.for_each_live_range(|_, bounds| {
            for point in [&mut bounds.start, &mut bounds.end] {
                if point.node == sibling {
                    *point = BoundaryPoint::new(text, point.offset + length);
                } else if Some(point.node) == parent && point.offset == index {
                    *point = BoundaryPoint::new(text, length);
                }
            }
        });
    }
}
