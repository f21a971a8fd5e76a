//! Element Attributes and Methods
//!
//! Attributes are stored as Attr nodes owned by their element, so a value
//! written through an Attr handle is what `getAttribute` reads back.
//! Also: element-only traversal, insertAdjacent*, and the selector entry
//! points (matches, closest, querySelector).

use crate::interner::Atom;
use crate::lifecycle::RefCounted;
use crate::node::{AttrData, Node, NodeData, QualName};
use crate::{DomException, DomResult, DomTree, NodeId};

impl DomTree {
    fn element_attributes(&self, element: NodeId) -> &[NodeId] {
        self.get(element)
            .and_then(Node::as_element)
            .map(|e| e.attributes.as_slice())
            .unwrap_or(&[])
    }

    fn attr_name(&self, attr: NodeId) -> Option<QualName> {
        self.get(attr).and_then(Node::as_attr).map(|a| a.name)
    }

    /// Element or Attr name
    fn qual_name(&self, node: NodeId) -> Option<QualName> {
        match &self.get(node)?.data {
            NodeData::Element(e) => Some(e.name),
            NodeData::Attr(a) => Some(a.name),
            _ => None,
        }
    }

    fn qualified_name_eq(&self, name: QualName, qualified: &str) -> bool {
        let local = self.atom(name.local);
        match name.prefix {
            None => local == qualified,
            Some(prefix) => {
                let prefix = self.atom(prefix);
                qualified.len() == prefix.len() + 1 + local.len()
                    && qualified.starts_with(prefix)
                    && qualified[prefix.len()..].starts_with(':')
                    && qualified.ends_with(local)
            }
        }
    }

    pub(crate) fn namespace_eq(&self, ns: Option<Atom>, namespace: Option<&str>) -> bool {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        ns.map(|atom| self.atom(atom)) == namespace
    }

    // --- Names ---

    /// `Element.tagName`: the qualified name, upper-cased for HTML elements
    /// in HTML documents
    pub fn tag_name(&self, element: NodeId) -> Option<String> {
        let node = self.get(element)?;
        let name = node.as_element()?.name;
        let qualified = self.qualified_name(name);
        let in_html_document = node
            .node_document
            .and_then(|doc| self.get(doc))
            .and_then(Node::as_document)
            .is_some_and(|doc| doc.config.is_html());
        if in_html_document && self.namespace_eq(name.namespace, Some(crate::document::HTML_NAMESPACE)) {
            return Some(qualified.to_ascii_uppercase());
        }
        Some(qualified)
    }

    /// `localName` of an element or attribute
    pub fn local_name(&self, node: NodeId) -> Option<&str> {
        self.qual_name(node).map(|name| self.atom(name.local))
    }

    /// `prefix` of an element or attribute
    pub fn prefix(&self, node: NodeId) -> Option<&str> {
        self.qual_name(node)?.prefix.map(|p| self.atom(p))
    }

    /// `namespaceURI` of an element or attribute
    pub fn namespace_uri(&self, node: NodeId) -> Option<&str> {
        self.qual_name(node)?.namespace.map(|ns| self.atom(ns))
    }

    // --- Attribute queries ---

    /// `Element.attributes` in insertion order
    pub fn attributes(&self, element: NodeId) -> &[NodeId] {
        self.element_attributes(element)
    }

    pub fn has_attributes(&self, element: NodeId) -> bool {
        !self.element_attributes(element).is_empty()
    }

    pub fn get_attribute_names(&self, element: NodeId) -> Vec<String> {
        self.element_attributes(element)
            .iter()
            .filter_map(|&attr| self.attr_name(attr))
            .map(|name| self.qualified_name(name))
            .collect()
    }

    /// First attribute whose qualified name is `qualified`
    pub fn get_attribute_node(&self, element: NodeId, qualified: &str) -> Option<NodeId> {
        self.element_attributes(element).iter().copied().find(|&attr| {
            self.attr_name(attr)
                .is_some_and(|name| self.qualified_name_eq(name, qualified))
        })
    }

    pub fn get_attribute_node_ns(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> Option<NodeId> {
        self.element_attributes(element).iter().copied().find(|&attr| {
            self.attr_name(attr).is_some_and(|name| {
                self.atom(name.local) == local_name && self.namespace_eq(name.namespace, namespace)
            })
        })
    }

    fn attr_value(&self, attr: NodeId) -> Option<&str> {
        self.get(attr).and_then(Node::as_attr).map(|a| a.value.as_str())
    }

    pub fn get_attribute(&self, element: NodeId, qualified: &str) -> Option<&str> {
        self.get_attribute_node(element, qualified)
            .and_then(|attr| self.attr_value(attr))
    }

    pub fn get_attribute_ns(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> Option<&str> {
        self.get_attribute_node_ns(element, namespace, local_name)
            .and_then(|attr| self.attr_value(attr))
    }

    pub fn has_attribute(&self, element: NodeId, qualified: &str) -> bool {
        self.get_attribute_node(element, qualified).is_some()
    }

    pub fn has_attribute_ns(
        &self,
        element: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> bool {
        self.get_attribute_node_ns(element, namespace, local_name).is_some()
    }

    /// `Attr.ownerElement`
    pub fn owner_element(&self, attr: NodeId) -> Option<NodeId> {
        self.get(attr)?.as_attr()?.owner_element
    }

    // --- Attribute mutation ---

    fn ensure_element(&self, element: NodeId) -> DomResult<()> {
        if self.node(element)?.is_element() {
            Ok(())
        } else {
            Err(DomException::InvalidNodeType)
        }
    }

    /// `Element.setAttribute(name, value)`
    pub fn set_attribute(&mut self, element: NodeId, qualified: &str, value: &str) -> DomResult<()> {
        self.ensure_element(element)?;
        if !crate::document::is_valid_name(qualified) {
            return Err(DomException::InvalidCharacter);
        }

        match self.get_attribute_node(element, qualified) {
            Some(attr) => self.change_attribute(attr, value),
            None => {
                let local = self.intern(qualified);
                let name = QualName::new(None, None, local);
                self.add_new_attribute(element, name, value)?;
            }
        }
        Ok(())
    }

    /// `Element.setAttributeNS(namespace, qualifiedName, value)`
    pub fn set_attribute_ns(
        &mut self,
        element: NodeId,
        namespace: Option<&str>,
        qualified: &str,
        value: &str,
    ) -> DomResult<()> {
        self.ensure_element(element)?;
        let name = self.validate_and_extract(namespace, qualified)?;
        let namespace = name.namespace.map(|ns| self.atom(ns).to_string());
        let local = self.atom(name.local).to_string();

        match self.get_attribute_node_ns(element, namespace.as_deref(), &local) {
            Some(attr) => self.change_attribute(attr, value),
            None => {
                self.add_new_attribute(element, name, value)?;
            }
        }
        Ok(())
    }

    fn add_new_attribute(&mut self, element: NodeId, name: QualName, value: &str) -> DomResult<NodeId> {
        let document = self.node_document(element);
        let attr = self.alloc(NodeData::Attr(AttrData::new(name, value.to_string())), document)?;
        self.append_attribute(attr, element);
        self.drop_creator_ref(attr);
        Ok(attr)
    }

    /// `Element.removeAttribute(name)`
    pub fn remove_attribute(&mut self, element: NodeId, qualified: &str) -> DomResult<()> {
        self.ensure_element(element)?;
        if let Some(attr) = self.get_attribute_node(element, qualified) {
            self.detach_attribute(attr);
            self.collect_if_unowned(attr);
        }
        Ok(())
    }

    pub fn remove_attribute_ns(
        &mut self,
        element: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> DomResult<()> {
        self.ensure_element(element)?;
        if let Some(attr) = self.get_attribute_node_ns(element, namespace, local_name) {
            self.detach_attribute(attr);
            self.collect_if_unowned(attr);
        }
        Ok(())
    }

    /// `Element.toggleAttribute(name, force)`; returns whether the attribute
    /// is present afterwards
    pub fn toggle_attribute(
        &mut self,
        element: NodeId,
        qualified: &str,
        force: Option<bool>,
    ) -> DomResult<bool> {
        self.ensure_element(element)?;
        if !crate::document::is_valid_name(qualified) {
            return Err(DomException::InvalidCharacter);
        }

        match self.get_attribute_node(element, qualified) {
            None => {
                if force == Some(false) {
                    return Ok(false);
                }
                let local = self.intern(qualified);
                self.add_new_attribute(element, QualName::new(None, None, local), "")?;
                Ok(true)
            }
            Some(attr) => {
                if force == Some(true) {
                    return Ok(true);
                }
                self.detach_attribute(attr);
                self.collect_if_unowned(attr);
                Ok(false)
            }
        }
    }

    /// `Element.setAttributeNode(attr)`. Returns the replaced Attr (with a
    /// reference handed to the caller), if any.
    pub fn set_attribute_node(&mut self, element: NodeId, attr: NodeId) -> DomResult<Option<NodeId>> {
        self.ensure_element(element)?;
        let data = self.node(attr)?.as_attr().ok_or(DomException::Type)?;
        if data.owner_element.is_some_and(|owner| owner != element) {
            return Err(DomException::InUseAttribute);
        }

        let name = data.name;
        let namespace = name.namespace.map(|ns| self.atom(ns).to_string());
        let local = self.atom(name.local).to_string();
        let old = self.get_attribute_node_ns(element, namespace.as_deref(), &local);

        match old {
            Some(old) if old == attr => {}
            Some(old) => self.replace_attribute(old, attr, element),
            None => self.append_attribute(attr, element),
        }
        if let Some(old) = old {
            old.acquire(self)?;
        }
        Ok(old)
    }

    /// `Element.setAttributeNodeNS(attr)`
    pub fn set_attribute_node_ns(
        &mut self,
        element: NodeId,
        attr: NodeId,
    ) -> DomResult<Option<NodeId>> {
        self.set_attribute_node(element, attr)
    }

    /// `Element.removeAttributeNode(attr)`. The caller receives a reference
    /// to the removed Attr.
    pub fn remove_attribute_node(&mut self, element: NodeId, attr: NodeId) -> DomResult<NodeId> {
        self.ensure_element(element)?;
        if !self.element_attributes(element).contains(&attr) {
            return Err(DomException::NotFound);
        }
        self.detach_attribute(attr);
        attr.acquire(self)?;
        Ok(attr)
    }

    /// Set `Attr.value`, going through the owner element when attached
    pub fn set_attr_value(&mut self, attr: NodeId, value: &str) -> DomResult<()> {
        let data = self.node(attr)?.as_attr().ok_or(DomException::InvalidNodeType)?;
        if data.owner_element.is_some() {
            self.change_attribute(attr, value);
        } else if let Some(data) = self.get_mut(attr).and_then(Node::as_attr_mut) {
            data.value = value.to_string();
        }
        Ok(())
    }

    // --- Attribute primitives ---

    fn queue_attribute_change(&mut self, attr: NodeId, element: NodeId, old_value: Option<String>) {
        let Some(name) = self.attr_name(attr) else {
            return;
        };
        let local = self.atom(name.local).to_string();
        let namespace = name.namespace.map(|ns| self.atom(ns).to_string());
        self.queue_attribute_record(element, local, namespace, old_value);
    }

    fn change_attribute(&mut self, attr: NodeId, value: &str) {
        let (element, old_value) = match self.get(attr).and_then(Node::as_attr) {
            Some(data) => (data.owner_element, data.value.clone()),
            None => return,
        };
        if let Some(element) = element {
            self.queue_attribute_change(attr, element, Some(old_value));
        }
        if let Some(data) = self.get_mut(attr).and_then(Node::as_attr_mut) {
            data.value = value.to_string();
        }
    }

    fn append_attribute(&mut self, attr: NodeId, element: NodeId) {
        self.queue_attribute_change(attr, element, None);
        self.attach_attribute(element, attr);
    }

    /// Link an Attr into an element's list without queuing records
    pub(crate) fn attach_attribute(&mut self, element: NodeId, attr: NodeId) {
        let document = self.node_document(element);
        if let Some(e) = self.get_mut(element).and_then(Node::as_element_mut) {
            e.attributes.push(attr);
        }
        if let Some(node) = self.get_mut(attr) {
            node.node_document = document;
            if let Some(data) = node.as_attr_mut() {
                data.owner_element = Some(element);
            }
        }
    }

    fn detach_attribute(&mut self, attr: NodeId) {
        let (element, old_value) = match self.get(attr).and_then(Node::as_attr) {
            Some(data) => match data.owner_element {
                Some(element) => (element, data.value.clone()),
                None => return,
            },
            None => return,
        };
        self.queue_attribute_change(attr, element, Some(old_value));
        if let Some(e) = self.get_mut(element).and_then(Node::as_element_mut) {
            e.attributes.retain(|&a| a != attr);
        }
        if let Some(data) = self.get_mut(attr).and_then(Node::as_attr_mut) {
            data.owner_element = None;
        }
    }

    fn replace_attribute(&mut self, old: NodeId, new: NodeId, element: NodeId) {
        let old_value = self.attr_value(old).map(str::to_string);
        self.queue_attribute_change(old, element, old_value);

        let document = self.node_document(element);
        if let Some(e) = self.get_mut(element).and_then(Node::as_element_mut) {
            if let Some(slot) = e.attributes.iter_mut().find(|a| **a == old) {
                *slot = new;
            }
        }
        if let Some(node) = self.get_mut(new) {
            node.node_document = document;
            if let Some(data) = node.as_attr_mut() {
                data.owner_element = Some(element);
            }
        }
        if let Some(data) = self.get_mut(old).and_then(Node::as_attr_mut) {
            data.owner_element = None;
        }
    }

    // --- Reflected attributes ---

    /// `Element.id`
    pub fn id(&self, element: NodeId) -> &str {
        self.get_attribute(element, "id").unwrap_or_default()
    }

    pub fn set_id(&mut self, element: NodeId, id: &str) -> DomResult<()> {
        self.set_attribute(element, "id", id)
    }

    /// `Element.className`
    pub fn class_name(&self, element: NodeId) -> &str {
        self.get_attribute(element, "class").unwrap_or_default()
    }

    pub fn set_class_name(&mut self, element: NodeId, value: &str) -> DomResult<()> {
        self.set_attribute(element, "class", value)
    }

    // --- Element traversal ---

    fn is_element(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(Node::is_element)
    }

    pub fn first_element_child(&self, parent: NodeId) -> Option<NodeId> {
        self.child_iter(parent).find(|c| self.is_element(*c))
    }

    pub fn last_element_child(&self, parent: NodeId) -> Option<NodeId> {
        std::iter::successors(self.last_child(parent), |c| self.previous_sibling(*c))
            .find(|c| self.is_element(*c))
    }

    pub fn child_element_count(&self, parent: NodeId) -> u32 {
        self.child_iter(parent).filter(|c| self.is_element(*c)).count() as u32
    }

    pub fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        std::iter::successors(self.previous_sibling(node), |c| self.previous_sibling(*c))
            .find(|c| self.is_element(*c))
    }

    pub fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        std::iter::successors(self.next_sibling(node), |c| self.next_sibling(*c))
            .find(|c| self.is_element(*c))
    }

    // --- insertAdjacent* ---

    fn insert_adjacent(
        &mut self,
        element: NodeId,
        position: &str,
        node: NodeId,
    ) -> DomResult<Option<NodeId>> {
        let position = position.to_ascii_lowercase();
        match position.as_str() {
            "beforebegin" => match self.parent_node(element) {
                Some(parent) => self.pre_insert(node, parent, Some(element)).map(Some),
                None => Ok(None),
            },
            "afterbegin" => {
                let first = self.first_child(element);
                self.pre_insert(node, element, first).map(Some)
            }
            "beforeend" => self.pre_insert(node, element, None).map(Some),
            "afterend" => match self.parent_node(element) {
                Some(parent) => {
                    let next = self.next_sibling(element);
                    self.pre_insert(node, parent, next).map(Some)
                }
                None => Ok(None),
            },
            _ => Err(DomException::Syntax),
        }
    }

    /// `Element.insertAdjacentElement(where, element)`
    pub fn insert_adjacent_element(
        &mut self,
        element: NodeId,
        position: &str,
        inserted: NodeId,
    ) -> DomResult<Option<NodeId>> {
        self.ensure_element(element)?;
        if !self.node(inserted)?.is_element() {
            return Err(DomException::Type);
        }
        self.insert_adjacent(element, position, inserted)
    }

    /// `Element.insertAdjacentText(where, data)`
    pub fn insert_adjacent_text(&mut self, element: NodeId, position: &str, data: &str) -> DomResult<()> {
        self.ensure_element(element)?;
        let document = self.node_document(element).ok_or(DomException::NotFound)?;
        let text = self.create_text_node(document, data)?;
        let result = self.insert_adjacent(element, position, text);
        self.drop_creator_ref(text);
        result.map(|_| ())
    }

    // --- Selectors ---

    /// `Element.matches(selectors)`
    pub fn matches(&self, element: NodeId, selectors: &str) -> DomResult<bool> {
        self.ensure_element(element)?;
        self.selector_matcher.matches(self, element, selectors)
    }

    /// Legacy alias of `matches`
    pub fn webkit_matches_selector(&self, element: NodeId, selectors: &str) -> DomResult<bool> {
        self.matches(element, selectors)
    }

    /// `Element.closest(selectors)`: nearest inclusive ancestor element that matches
    pub fn closest(&self, element: NodeId, selectors: &str) -> DomResult<Option<NodeId>> {
        self.ensure_element(element)?;
        for candidate in self.inclusive_ancestors(element) {
            if self.is_element(candidate)
                && self.selector_matcher.matches(self, candidate, selectors)?
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// `ParentNode.querySelector(selectors)`
    pub fn query_selector(&self, root: NodeId, selectors: &str) -> DomResult<Option<NodeId>> {
        self.node(root)?;
        self.selector_matcher.validate(selectors)?;
        for candidate in self.descendants(root) {
            if self.is_element(candidate)
                && self.selector_matcher.matches(self, candidate, selectors)?
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// `ParentNode.querySelectorAll(selectors)` (a static snapshot)
    pub fn query_selector_all(&self, root: NodeId, selectors: &str) -> DomResult<Vec<NodeId>> {
        self.node(root)?;
        self.selector_matcher.validate(selectors)?;
        let mut found = Vec::new();
        for candidate in self.descendants(root) {
            if self.is_element(candidate)
                && self.selector_matcher.matches(self, candidate, selectors)?
            {
                found.push(candidate);
            }
        }
        Ok(found)
    }
}
