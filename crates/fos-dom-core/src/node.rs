//! DOM Node - tagged union over the node kinds
//!
//! Every node shares the same structural header (parent, sibling and child
//! links, node document, reference count). Kind-specific payloads hang off
//! `NodeData`.
//!
//! Only the first/last child links are owning edges. Parent and sibling
//! links, the node document and an Attr's owner element are lookups into
//! the arena and may resolve to nothing once the referent is destroyed.

use crate::config::DocumentConfig;
use crate::interner::Atom;
use crate::NodeId;

/// Node type, numbered as `Node.nodeType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Attribute,
    Text,
    CDataSection,
    ProcessingInstruction,
    Comment,
    Document,
    DocumentType,
    DocumentFragment,
}

impl NodeType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(NodeType::Element),
            2 => Some(NodeType::Attribute),
            3 => Some(NodeType::Text),
            4 => Some(NodeType::CDataSection),
            7 => Some(NodeType::ProcessingInstruction),
            8 => Some(NodeType::Comment),
            9 => Some(NodeType::Document),
            10 => Some(NodeType::DocumentType),
            11 => Some(NodeType::DocumentFragment),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            NodeType::Element => 1,
            NodeType::Attribute => 2,
            NodeType::Text => 3,
            NodeType::CDataSection => 4,
            NodeType::ProcessingInstruction => 7,
            NodeType::Comment => 8,
            NodeType::Document => 9,
            NodeType::DocumentType => 10,
            NodeType::DocumentFragment => 11,
        }
    }
}

/// Qualified name: optional namespace and prefix plus a local name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QualName {
    pub namespace: Option<Atom>,
    pub prefix: Option<Atom>,
    pub local: Atom,
}

impl QualName {
    pub fn new(namespace: Option<Atom>, prefix: Option<Atom>, local: Atom) -> Self {
        Self { namespace, prefix, local }
    }
}

/// DOM Node - shared header plus kind payload
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    /// Node document (a Document points at itself)
    pub(crate) node_document: Option<NodeId>,
    pub(crate) ref_count: u32,
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData, node_document: Option<NodeId>) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            node_document,
            ref_count: 1,
            data,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document(_) => NodeType::Document,
            NodeData::DocumentFragment => NodeType::DocumentFragment,
            NodeData::DocumentType(_) => NodeType::DocumentType,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Attr(_) => NodeType::Attribute,
            NodeData::Text(_) => NodeType::Text,
            NodeData::CDataSection(_) => NodeType::CDataSection,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document(_))
    }

    #[inline]
    pub fn is_doctype(&self) -> bool {
        matches!(self.data, NodeData::DocumentType(_))
    }

    #[inline]
    pub fn is_attr(&self) -> bool {
        matches!(self.data, NodeData::Attr(_))
    }

    /// Text or CDATASection (the `Text` interface)
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_) | NodeData::CDataSection(_))
    }

    /// Text, CDATASection, Comment or ProcessingInstruction
    #[inline]
    pub fn is_character_data(&self) -> bool {
        self.character_data().is_some()
    }

    /// Document, DocumentFragment or Element
    #[inline]
    pub fn can_have_children(&self) -> bool {
        matches!(
            self.data,
            NodeData::Document(_) | NodeData::DocumentFragment | NodeData::Element(_)
        )
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_attr(&self) -> Option<&AttrData> {
        match &self.data {
            NodeData::Attr(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_attr_mut(&mut self) -> Option<&mut AttrData> {
        match &mut self.data {
            NodeData::Attr(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_doctype(&self) -> Option<&DoctypeData> {
        match &self.data {
            NodeData::DocumentType(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub fn as_document(&self) -> Option<&DocumentData> {
        match &self.data {
            NodeData::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Character data of Text, CDATASection, Comment and ProcessingInstruction nodes
    #[inline]
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::CDataSection(s) | NodeData::Comment(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn character_data_mut(&mut self) -> Option<&mut String> {
        match &mut self.data {
            NodeData::Text(s) | NodeData::CDataSection(s) | NodeData::Comment(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    Document(DocumentData),
    DocumentFragment,
    DocumentType(DoctypeData),
    Element(ElementData),
    Attr(AttrData),
    Text(String),
    CDataSection(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

impl NodeData {
    /// Shallow copy of the payload, dropping structural relations
    /// (an element's attribute list is rebuilt by the caller)
    pub(crate) fn shallow_clone(&self) -> NodeData {
        match self {
            NodeData::Document(d) => NodeData::Document(DocumentData { config: d.config.clone() }),
            NodeData::DocumentFragment => NodeData::DocumentFragment,
            NodeData::DocumentType(d) => NodeData::DocumentType(d.clone()),
            NodeData::Element(e) => NodeData::Element(ElementData::new(e.name)),
            NodeData::Attr(a) => NodeData::Attr(AttrData::new(a.name, a.value.clone())),
            NodeData::Text(s) => NodeData::Text(s.clone()),
            NodeData::CDataSection(s) => NodeData::CDataSection(s.clone()),
            NodeData::Comment(s) => NodeData::Comment(s.clone()),
            NodeData::ProcessingInstruction { target, data } => NodeData::ProcessingInstruction {
                target: target.clone(),
                data: data.clone(),
            },
        }
    }
}

/// Document-specific data
#[derive(Debug)]
pub struct DocumentData {
    pub(crate) config: DocumentConfig,
}

impl DocumentData {
    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }
}

/// DocumentType-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctypeData {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

/// Element-specific data
#[derive(Debug)]
pub struct ElementData {
    pub(crate) name: QualName,
    /// Attr nodes in insertion order (owning edges)
    pub(crate) attributes: Vec<NodeId>,
}

impl ElementData {
    pub(crate) fn new(name: QualName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> QualName {
        self.name
    }

    pub fn attributes(&self) -> &[NodeId] {
        &self.attributes
    }
}

/// Attr-specific data
#[derive(Debug)]
pub struct AttrData {
    pub(crate) name: QualName,
    pub(crate) value: String,
    pub(crate) owner_element: Option<NodeId>,
}

impl AttrData {
    pub(crate) fn new(name: QualName, value: String) -> Self {
        Self {
            name,
            value,
            owner_element: None,
        }
    }

    pub fn name(&self) -> QualName {
        self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn owner_element(&self) -> Option<NodeId> {
        self.owner_element
    }
}

/// Length of a string in the units used by DOM offsets (Unicode scalar values)
#[inline]
pub(crate) fn data_len(s: &str) -> u32 {
    s.chars().count() as u32
}

/// Byte index of the `offset`-th scalar value, clamped to the end
#[inline]
pub(crate) fn byte_offset(s: &str, offset: u32) -> usize {
    s.char_indices()
        .nth(offset as usize)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
