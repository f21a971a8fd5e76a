//! fOS DOM Core - Document Object Model
//!
//! In-memory DOM: the node tree and its mutation algorithms, live
//! collections, traversal, ranges, events and abort signals.
//!
//! Everything hangs off a [`DomTree`]. Nodes, signals and controllers are
//! arena slots addressed by `Copy` handles; every DOM operation is a method
//! on the tree (or takes it as an argument), so there is no shared mutable
//! state outside it.
//!
//! ```
//! use fos_dom_core::DomTree;
//!
//! let mut tree = DomTree::new();
//! let doc = tree.create_document().unwrap();
//! let root = tree.create_element(doc, "root").unwrap();
//! tree.append_child(doc, root).unwrap();
//! tree.append(root, &["hello".into()]).unwrap();
//! assert_eq!(tree.text_content(root).as_deref(), Some("hello"));
//! ```

mod abort;
mod arena;
mod character_data;
mod classlist;
mod collection;
mod config;
mod document;
mod element;
mod error;
mod event;
mod event_target;
mod interner;
mod lifecycle;
mod mutation;
mod node;
mod observer;
mod range;
mod selector;
mod static_range;
mod tree;
mod tree_walker;

pub use abort::{AbortController, AbortReason, AbortSignal};
pub use classlist::DomTokenList;
pub use collection::{CollectionFilter, HtmlCollection, NodeList};
pub use config::{CompatMode, DocumentConfig};
pub use document::{
    HTML_NAMESPACE, MATHML_NAMESPACE, SVG_NAMESPACE, XLINK_NAMESPACE, XML_NAMESPACE,
    XMLNS_NAMESPACE,
};
pub use error::{DomException, DomResult};
pub use event::{CustomEventInit, Event, EventInit, EventPhase, EventTarget};
pub use event_target::{AddEventListenerOptions, EventCallback};
pub use interner::{Atom, StringInterner};
pub use lifecycle::RefCounted;
pub use mutation::NodeOrText;
pub use node::{
    AttrData, DoctypeData, DocumentData, ElementData, Node, NodeData, NodeType, QualName,
};
pub use observer::{
    MutationCallback, MutationObserver, MutationObserverInit, MutationRecord, MutationType,
};
pub use range::{BoundaryPoint, Range, RangeCompare};
pub use selector::{SelectorList, SelectorMatcher, SimpleSelectorMatcher};
pub use static_range::{StaticRange, StaticRangeInit};
pub use tree::{
    Ancestors, Children, Descendants, DomTree, DOCUMENT_POSITION_CONTAINED_BY,
    DOCUMENT_POSITION_CONTAINS, DOCUMENT_POSITION_DISCONNECTED, DOCUMENT_POSITION_FOLLOWING,
    DOCUMENT_POSITION_IMPLEMENTATION_SPECIFIC, DOCUMENT_POSITION_PRECEDING,
};
pub use tree_walker::{FilterResult, NodeFilter, NodeIterator, TreeWalker, WhatToShow};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Node handle (generational arena key)
///
/// A handle to a destroyed node never aliases a node created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) arena::Key);
