//! CharacterData and Text operations
//!
//! Offsets and counts are measured in Unicode scalar values.

use crate::node::{byte_offset, data_len, Node, NodeData};
use crate::{DomException, DomResult, DomTree, NodeId};

impl DomTree {
    fn data_of(&self, node: NodeId) -> DomResult<&str> {
        self.node(node)?
            .character_data()
            .ok_or(DomException::InvalidNodeType)
    }

    /// `CharacterData.data`
    pub fn data(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.character_data()
    }

    /// Set `CharacterData.data`
    pub fn set_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = data_len(self.data_of(node)?);
        self.replace_data(node, 0, length, data)
    }

    /// `CharacterData.length`
    pub fn data_length(&self, node: NodeId) -> u32 {
        self.data(node).map_or(0, data_len)
    }

    /// `CharacterData.substringData(offset, count)`
    pub fn substring_data(&self, node: NodeId, offset: u32, count: u32) -> DomResult<String> {
        let data = self.data_of(node)?;
        let length = data_len(data);
        if offset > length {
            return Err(DomException::IndexSize);
        }
        Ok(data
            .chars()
            .skip(offset as usize)
            .take(count as usize)
            .collect())
    }

    /// `CharacterData.appendData(data)`
    pub fn append_data(&mut self, node: NodeId, data: &str) -> DomResult<()> {
        let length = data_len(self.data_of(node)?);
        self.replace_data(node, length, 0, data)
    }

    /// `CharacterData.insertData(offset, data)`
    pub fn insert_data(&mut self, node: NodeId, offset: u32, data: &str) -> DomResult<()> {
        self.replace_data(node, offset, 0, data)
    }

    /// `CharacterData.deleteData(offset, count)`
    pub fn delete_data(&mut self, node: NodeId, offset: u32, count: u32) -> DomResult<()> {
        self.replace_data(node, offset, count, "")
    }

    /// `CharacterData.replaceData(offset, count, data)`
    ///
    /// `count` is clamped to the end of the data; an offset past the end is
    /// an `IndexSize` error.
    pub fn replace_data(
        &mut self,
        node: NodeId,
        offset: u32,
        count: u32,
        data: &str,
    ) -> DomResult<()> {
        let current = self.data_of(node)?;
        let length = data_len(current);
        if offset > length {
            return Err(DomException::IndexSize);
        }
        let count = count.min(length - offset);
        let old_value = current.to_string();

        let start = byte_offset(current, offset);
        let end = byte_offset(current, offset + count);

        self.queue_character_data_record(node, old_value);

        if let Some(text) = self.get_mut(node).and_then(Node::character_data_mut) {
            text.replace_range(start..end, data);
        }

        self.ranges_on_replace_data(node, offset, count, data_len(data));
        Ok(())
    }

    /// `Text.splitText(offset)`. The new node starts with one reference,
    /// handed to the caller.
    pub fn split_text(&mut self, node: NodeId, offset: u32) -> DomResult<NodeId> {
        let source = self.node(node)?;
        if !source.is_text() {
            return Err(DomException::InvalidNodeType);
        }
        let data = source.character_data().unwrap_or_default();
        let length = data_len(data);
        if offset > length {
            return Err(DomException::IndexSize);
        }

        let count = length - offset;
        let new_data = data[byte_offset(data, offset)..].to_string();
        let payload = match source.data {
            NodeData::CDataSection(_) => NodeData::CDataSection(new_data),
            _ => NodeData::Text(new_data),
        };
        let document = source.node_document;

        let new_node = self.alloc(payload, document)?;

        if let Some(parent) = self.parent_node(node) {
            let next = self.next_sibling(node);
            self.insert_nodes(new_node, parent, next, false);
            let index = self.index(node);
            self.ranges_on_split(node, new_node, offset, parent, index);
        }

        self.replace_data(node, offset, count, "")?;
        Ok(new_node)
    }

    /// `Text.wholeText`: data of the contiguous Text siblings around `node`
    pub fn whole_text(&self, node: NodeId) -> Option<String> {
        let is_text = |id: NodeId| self.get(id).is_some_and(Node::is_text);
        if !is_text(node) {
            return None;
        }

        let mut first = node;
        while let Some(previous) = self.previous_sibling(first).filter(|p| is_text(*p)) {
            first = previous;
        }

        let mut text = String::new();
        let mut current = Some(first);
        while let Some(id) = current.filter(|c| is_text(*c)) {
            text.push_str(self.data(id).unwrap_or_default());
            current = self.next_sibling(id);
        }
        Some(text)
    }
}
