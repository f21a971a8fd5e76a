//! Document - creation, node factories and document-level queries
//!
//! A document is an ordinary node in the tree whose node document is
//! itself. Every factory takes the document the new node will belong to and
//! hands the new node back with one reference held by the caller.

use tracing::debug;

use crate::config::DocumentConfig;
use crate::lifecycle::RefCounted;
use crate::node::{AttrData, DoctypeData, DocumentData, ElementData, Node, NodeData, QualName};
use crate::{DomException, DomResult, DomTree, NodeId};

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// XML `Name` production
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// XML `QName` production: a name with at most one colon, not at either end
pub(crate) fn is_valid_qualified_name(name: &str) -> bool {
    if !is_valid_name(name) {
        return false;
    }
    match name.split_once(':') {
        None => true,
        Some((prefix, local)) => !prefix.is_empty() && !local.is_empty() && !local.contains(':'),
    }
}

impl DomTree {
    /// Create a document with the default configuration
    pub fn create_document(&mut self) -> DomResult<NodeId> {
        self.create_document_with(DocumentConfig::default())
    }

    /// Create a document with a custom configuration
    pub fn create_document_with(&mut self, config: DocumentConfig) -> DomResult<NodeId> {
        let content_type = config.content_type.clone();
        let document = self.alloc(NodeData::Document(DocumentData { config }), None)?;
        if let Some(node) = self.get_mut(document) {
            node.node_document = Some(document);
        }
        debug!(?document, %content_type, "created document");
        Ok(document)
    }

    fn document_config(&self, document: NodeId) -> DomResult<&DocumentConfig> {
        self.node(document)?
            .as_document()
            .map(DocumentData::config)
            .ok_or(DomException::Type)
    }

    /// "Validate and extract" a namespace and qualified name
    pub(crate) fn validate_and_extract(
        &mut self,
        namespace: Option<&str>,
        qualified: &str,
    ) -> DomResult<QualName> {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        if !is_valid_qualified_name(qualified) {
            return Err(DomException::InvalidCharacter);
        }

        let (prefix, local) = match qualified.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qualified),
        };

        if prefix.is_some() && namespace.is_none() {
            return Err(DomException::Namespace);
        }
        if prefix == Some("xml") && namespace != Some(XML_NAMESPACE) {
            return Err(DomException::Namespace);
        }
        let is_xmlns = qualified == "xmlns" || prefix == Some("xmlns");
        if is_xmlns != (namespace == Some(XMLNS_NAMESPACE)) {
            return Err(DomException::Namespace);
        }

        Ok(QualName::new(
            namespace.map(|ns| self.intern(ns)),
            prefix.map(|p| self.intern(p)),
            self.intern(local),
        ))
    }

    // --- Factories ---

    /// `Document.createElement(localName)`
    pub fn create_element(&mut self, document: NodeId, local_name: &str) -> DomResult<NodeId> {
        let config = self.document_config(document)?;
        if !is_valid_name(local_name) {
            return Err(DomException::InvalidCharacter);
        }

        let is_html = config.is_html();
        let html_namespace =
            is_html || config.content_type.eq_ignore_ascii_case("application/xhtml+xml");
        let local = if is_html {
            self.intern(&local_name.to_ascii_lowercase())
        } else {
            self.intern(local_name)
        };
        let namespace = html_namespace.then(|| self.intern(HTML_NAMESPACE));

        let name = QualName::new(namespace, None, local);
        self.alloc(NodeData::Element(ElementData::new(name)), Some(document))
    }

    /// `Document.createElementNS(namespace, qualifiedName)`
    pub fn create_element_ns(
        &mut self,
        document: NodeId,
        namespace: Option<&str>,
        qualified: &str,
    ) -> DomResult<NodeId> {
        self.document_config(document)?;
        let name = self.validate_and_extract(namespace, qualified)?;
        self.alloc(NodeData::Element(ElementData::new(name)), Some(document))
    }

    /// `Document.createTextNode(data)`
    pub fn create_text_node(&mut self, document: NodeId, data: &str) -> DomResult<NodeId> {
        self.document_config(document)?;
        self.alloc(NodeData::Text(data.to_string()), Some(document))
    }

    /// `Document.createCDATASection(data)`
    pub fn create_cdata_section(&mut self, document: NodeId, data: &str) -> DomResult<NodeId> {
        if self.document_config(document)?.is_html() {
            return Err(DomException::NotSupported);
        }
        if data.contains("]]>") {
            return Err(DomException::InvalidCharacter);
        }
        self.alloc(NodeData::CDataSection(data.to_string()), Some(document))
    }

    /// `Document.createComment(data)`
    pub fn create_comment(&mut self, document: NodeId, data: &str) -> DomResult<NodeId> {
        self.document_config(document)?;
        self.alloc(NodeData::Comment(data.to_string()), Some(document))
    }

    /// `Document.createProcessingInstruction(target, data)`
    pub fn create_processing_instruction(
        &mut self,
        document: NodeId,
        target: &str,
        data: &str,
    ) -> DomResult<NodeId> {
        self.document_config(document)?;
        if !is_valid_name(target) || data.contains("?>") {
            return Err(DomException::InvalidCharacter);
        }
        self.alloc(
            NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            },
            Some(document),
        )
    }

    /// `Document.createAttribute(localName)`
    pub fn create_attribute(&mut self, document: NodeId, local_name: &str) -> DomResult<NodeId> {
        let is_html = self.document_config(document)?.is_html();
        if !is_valid_name(local_name) {
            return Err(DomException::InvalidCharacter);
        }
        let local = if is_html {
            self.intern(&local_name.to_ascii_lowercase())
        } else {
            self.intern(local_name)
        };
        let name = QualName::new(None, None, local);
        self.alloc(NodeData::Attr(AttrData::new(name, String::new())), Some(document))
    }

    /// `Document.createAttributeNS(namespace, qualifiedName)`
    pub fn create_attribute_ns(
        &mut self,
        document: NodeId,
        namespace: Option<&str>,
        qualified: &str,
    ) -> DomResult<NodeId> {
        self.document_config(document)?;
        let name = self.validate_and_extract(namespace, qualified)?;
        self.alloc(NodeData::Attr(AttrData::new(name, String::new())), Some(document))
    }

    /// `Document.createDocumentFragment()`
    pub fn create_document_fragment(&mut self, document: NodeId) -> DomResult<NodeId> {
        self.document_config(document)?;
        self.alloc(NodeData::DocumentFragment, Some(document))
    }

    /// `DOMImplementation.createDocumentType(name, publicId, systemId)`
    pub fn create_document_type(
        &mut self,
        document: NodeId,
        name: &str,
        public_id: &str,
        system_id: &str,
    ) -> DomResult<NodeId> {
        self.document_config(document)?;
        if !is_valid_qualified_name(name) {
            return Err(DomException::InvalidCharacter);
        }
        let doctype = DoctypeData {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        };
        self.alloc(NodeData::DocumentType(doctype), Some(document))
    }

    // --- Queries ---

    /// `Document.documentElement`
    pub fn document_element(&self, document: NodeId) -> Option<NodeId> {
        self.child_iter(document)
            .find(|c| self.get(*c).is_some_and(Node::is_element))
    }

    /// `Document.doctype`
    pub fn doctype(&self, document: NodeId) -> Option<NodeId> {
        self.child_iter(document)
            .find(|c| self.get(*c).is_some_and(Node::is_doctype))
    }

    /// `getElementById(id)`: first element in tree order under `root` with that id
    pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants(root).find(|&candidate| {
            self.get(candidate).is_some_and(Node::is_element)
                && self.get_attribute(candidate, "id") == Some(id)
        })
    }

    /// `Document.importNode(node, deep)`: a copy of `node` owned by `document`
    pub fn import_node(&mut self, document: NodeId, node: NodeId, deep: bool) -> DomResult<NodeId> {
        self.document_config(document)?;
        if self.node(node)?.is_document() {
            return Err(DomException::NotSupported);
        }
        self.clone_into(node, Some(document), deep)
    }

    /// `Document.adoptNode(node)`. When the node is taken away from a parent
    /// or owner element, the caller receives a reference and must release it.
    pub fn adopt_node(&mut self, document: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.document_config(document)?;
        let adopted = self.node(node)?;
        if adopted.is_document() {
            return Err(DomException::NotSupported);
        }

        let owner = adopted.as_attr().and_then(|attr| attr.owner_element);
        let has_parent = adopted.parent.is_some();

        if let Some(owner) = owner {
            self.remove_attribute_node(owner, node)?;
        } else if has_parent {
            node.acquire(self)?;
        }
        self.adopt(node, document);
        Ok(node)
    }

    // --- Metadata ---

    /// `Document.URL`
    pub fn url(&self, document: NodeId) -> Option<&str> {
        Some(&self.get(document)?.as_document()?.config.url)
    }

    /// `Document.contentType`
    pub fn content_type(&self, document: NodeId) -> Option<&str> {
        Some(&self.get(document)?.as_document()?.config.content_type)
    }

    /// `Document.characterSet`
    pub fn character_set(&self, document: NodeId) -> Option<&str> {
        Some(&self.get(document)?.as_document()?.config.character_set)
    }

    /// `Document.charset` (legacy alias of `characterSet`)
    pub fn charset(&self, document: NodeId) -> Option<&str> {
        self.character_set(document)
    }

    /// `Document.inputEncoding` (legacy alias of `characterSet`)
    pub fn input_encoding(&self, document: NodeId) -> Option<&str> {
        self.character_set(document)
    }

    /// `Document.compatMode`
    pub fn compat_mode(&self, document: NodeId) -> Option<&'static str> {
        Some(self.get(document)?.as_document()?.config.compat_mode.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompatMode;
    use crate::NodeType;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("div"));
        assert!(is_valid_name("_x-1.2"));
        assert!(is_valid_name("svg:rect"));
        assert!(is_valid_name("ñ"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1abc"));
        assert!(!is_valid_name("a b"));
        assert!(!is_valid_name("-a"));

        assert!(is_valid_qualified_name("svg:rect"));
        assert!(!is_valid_qualified_name(":rect"));
        assert!(!is_valid_qualified_name("svg:"));
        assert!(!is_valid_qualified_name("a:b:c"));
    }

    #[test]
    fn test_document_is_its_own_node_document() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        assert_eq!(tree.node_type(doc), Some(NodeType::Document));
        assert_eq!(tree.node_document(doc), Some(doc));
        assert_eq!(tree.owner_document(doc), None);
        assert_eq!(tree.url(doc), Some("about:blank"));
        assert_eq!(tree.content_type(doc), Some("application/xml"));
        assert_eq!(tree.charset(doc), Some("UTF-8"));
        assert_eq!(tree.input_encoding(doc), Some("UTF-8"));
        assert_eq!(tree.compat_mode(doc), Some("CSS1Compat"));
    }

    #[test]
    fn test_custom_config() {
        let mut tree = DomTree::new();
        let doc = tree
            .create_document_with(DocumentConfig {
                url: "https://example.com/".into(),
                content_type: "text/html".into(),
                character_set: "windows-1252".into(),
                compat_mode: CompatMode::Quirks,
            })
            .unwrap();
        assert_eq!(tree.url(doc), Some("https://example.com/"));
        assert_eq!(tree.compat_mode(doc), Some("BackCompat"));

        let div = tree.create_element(doc, "DIV").unwrap();
        assert_eq!(tree.local_name(div), Some("div"));
        assert_eq!(tree.namespace_uri(div), Some(HTML_NAMESPACE));
        assert_eq!(tree.create_cdata_section(doc, "x"), Err(DomException::NotSupported));
    }

    #[test]
    fn test_factories() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();

        let el = tree.create_element(doc, "Widget").unwrap();
        assert_eq!(tree.local_name(el), Some("Widget"));
        assert_eq!(tree.namespace_uri(el), None);
        assert_eq!(tree.owner_document(el), Some(doc));

        let cdata = tree.create_cdata_section(doc, "a < b").unwrap();
        assert_eq!(tree.node_name(cdata).as_deref(), Some("#cdata-section"));
        assert_eq!(tree.create_cdata_section(doc, "]]>"), Err(DomException::InvalidCharacter));

        let pi = tree.create_processing_instruction(doc, "xml-stylesheet", "href='a'").unwrap();
        assert_eq!(tree.node_name(pi).as_deref(), Some("xml-stylesheet"));
        assert_eq!(
            tree.create_processing_instruction(doc, "x", "?>"),
            Err(DomException::InvalidCharacter)
        );

        assert_eq!(tree.create_element(doc, "1bad"), Err(DomException::InvalidCharacter));
        assert_eq!(tree.create_element(el, "x"), Err(DomException::Type));
    }

    #[test]
    fn test_validate_and_extract() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();

        let rect = tree.create_element_ns(doc, Some(SVG_NAMESPACE), "svg:rect").unwrap();
        assert_eq!(tree.prefix(rect), Some("svg"));
        assert_eq!(tree.local_name(rect), Some("rect"));
        assert_eq!(tree.tag_name(rect).as_deref(), Some("svg:rect"));

        let cases: &[(Option<&str>, &str, DomException)] = &[
            (None, "p:x", DomException::Namespace),
            (Some(""), "p:x", DomException::Namespace),
            (Some(SVG_NAMESPACE), "xml:x", DomException::Namespace),
            (Some(SVG_NAMESPACE), "xmlns", DomException::Namespace),
            (Some(XMLNS_NAMESPACE), "x", DomException::Namespace),
            (Some(SVG_NAMESPACE), "a:b:c", DomException::InvalidCharacter),
        ];
        for (namespace, qualified, expected) in cases {
            assert_eq!(
                tree.create_element_ns(doc, *namespace, qualified),
                Err(*expected),
                "{qualified}"
            );
        }

        assert!(tree.create_attribute_ns(doc, Some(XML_NAMESPACE), "xml:lang").is_ok());
        assert!(tree.create_attribute_ns(doc, Some(XMLNS_NAMESPACE), "xmlns:svg").is_ok());
    }

    #[test]
    fn test_document_children() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let doctype = tree.create_document_type(doc, "html", "", "").unwrap();
        let html = tree.create_element(doc, "html").unwrap();
        tree.append_child(doc, doctype).unwrap();
        tree.append_child(doc, html).unwrap();

        assert_eq!(tree.doctype(doc), Some(doctype));
        assert_eq!(tree.document_element(doc), Some(html));
        assert_eq!(tree.node_name(doctype).as_deref(), Some("html"));
    }

    #[test]
    fn test_get_element_by_id_is_live() {
        let mut tree = DomTree::new();
        let doc = tree.create_document().unwrap();
        let root = tree.create_element(doc, "root").unwrap();
        let a = tree.create_element(doc, "a").unwrap();
        let b = tree.create_element(doc, "b").unwrap();
        tree.append_child(doc, root).unwrap();
        tree.append(root, &[a.into(), b.into()]).unwrap();

        tree.set_attribute(b, "id", "target").unwrap();
        assert_eq!(tree.get_element_by_id(doc, "target"), Some(b));
        tree.set_attribute(a, "id", "target").unwrap();
        assert_eq!(tree.get_element_by_id(doc, "target"), Some(a));
        tree.remove_attribute(a, "id").unwrap();
        assert_eq!(tree.get_element_by_id(doc, "target"), Some(b));
        assert_eq!(tree.get_element_by_id(doc, ""), None);
    }

    #[test]
    fn test_import_and_adopt() {
        let mut tree = DomTree::new();
        let first = tree.create_document().unwrap();
        let second = tree.create_document().unwrap();

        let list = tree.create_element(first, "ul").unwrap();
        let item = tree.create_element(first, "li").unwrap();
        tree.append_child(list, item).unwrap();
        tree.set_attribute(item, "class", "x").unwrap();

        let copy = tree.import_node(second, list, true).unwrap();
        assert_eq!(tree.owner_document(copy), Some(second));
        let copied_item = tree.first_child(copy).unwrap();
        assert_eq!(tree.owner_document(copied_item), Some(second));
        assert_eq!(tree.get_attribute(copied_item, "class"), Some("x"));
        assert!(tree.is_equal_node(copy, list));

        let adopted = tree.adopt_node(second, item).unwrap();
        assert_eq!(adopted, item);
        assert_eq!(tree.parent_node(item), None);
        assert_eq!(tree.owner_document(item), Some(second));
        assert_eq!(item.ref_count(&tree), 2);

        assert_eq!(tree.import_node(second, first, false), Err(DomException::NotSupported));
        assert_eq!(tree.adopt_node(second, first), Err(DomException::NotSupported));
    }
}
