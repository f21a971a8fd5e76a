//! Live collections
//!
//! `HtmlCollection` and `NodeList` hold a root and a predicate, never a
//! member list. Every `length`/`item` call walks the tree again, so a
//! mutation is visible on the next call. Removing members while indexing
//! through a collection shifts the remaining indices.

use crate::config::CompatMode;
use crate::node::Node;
use crate::{DomTree, NodeId};

/// Membership predicate of an `HtmlCollection`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionFilter {
    /// Descendant elements whose qualified name equals the string (`*` for all)
    TagName(String),
    /// Descendant elements by namespace and local name (`*` wildcards either)
    TagNameNs {
        namespace: Option<String>,
        local_name: String,
    },
    /// Descendant elements whose class list contains every token
    ClassNames(Vec<String>),
    /// Element children of the root
    Children,
}

/// Live, filtered collection of elements in tree order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlCollection {
    root: NodeId,
    filter: CollectionFilter,
}

impl HtmlCollection {
    pub fn new(root: NodeId, filter: CollectionFilter) -> Self {
        Self { root, filter }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn filter(&self) -> &CollectionFilter {
        &self.filter
    }

    fn accepts(&self, tree: &DomTree, id: NodeId) -> bool {
        let Some(element) = tree.get(id).and_then(Node::as_element) else {
            return false;
        };
        match &self.filter {
            CollectionFilter::Children => true,
            CollectionFilter::TagName(name) => {
                name == "*" || tree.qualified_name(element.name) == *name
            }
            CollectionFilter::TagNameNs {
                namespace,
                local_name,
            } => {
                let namespace_ok = namespace.as_deref() == Some("*")
                    || tree.namespace_eq(element.name.namespace, namespace.as_deref());
                let local_ok = local_name == "*" || tree.atom(element.name.local) == local_name;
                namespace_ok && local_ok
            }
            CollectionFilter::ClassNames(tokens) => {
                if tokens.is_empty() {
                    return false;
                }
                let quirks = tree
                    .node_document(id)
                    .and_then(|doc| tree.get(doc))
                    .and_then(Node::as_document)
                    .is_some_and(|doc| doc.config.compat_mode == CompatMode::Quirks);
                let classes: Vec<&str> = tree
                    .get_attribute(id, "class")
                    .map(|value| value.split_ascii_whitespace().collect())
                    .unwrap_or_default();
                tokens.iter().all(|token| {
                    classes.iter().any(|class| {
                        if quirks {
                            class.eq_ignore_ascii_case(token)
                        } else {
                            class == token
                        }
                    })
                })
            }
        }
    }

    /// Iterate over the current members
    pub fn iter<'a>(&'a self, tree: &'a DomTree) -> impl Iterator<Item = NodeId> + 'a {
        let candidates: Box<dyn Iterator<Item = NodeId> + 'a> = match self.filter {
            CollectionFilter::Children => Box::new(tree.child_iter(self.root)),
            _ => Box::new(tree.descendants(self.root)),
        };
        candidates.filter(move |id| self.accepts(tree, *id))
    }

    pub fn length(&self, tree: &DomTree) -> u32 {
        self.iter(tree).count() as u32
    }

    pub fn item(&self, tree: &DomTree, index: u32) -> Option<NodeId> {
        self.iter(tree).nth(index as usize)
    }

    /// First member whose `id` is `key`, else the first whose `name` attribute is
    pub fn named_item(&self, tree: &DomTree, key: &str) -> Option<NodeId> {
        if key.is_empty() {
            return None;
        }
        self.iter(tree)
            .find(|id| tree.get_attribute(*id, "id") == Some(key))
            .or_else(|| {
                self.iter(tree)
                    .find(|id| tree.get_attribute(*id, "name") == Some(key))
            })
    }

    pub fn to_vec(&self, tree: &DomTree) -> Vec<NodeId> {
        self.iter(tree).collect()
    }
}

/// Live list of a node's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeList {
    parent: NodeId,
}

impl NodeList {
    pub fn new(parent: NodeId) -> Self {
        Self { parent }
    }

    pub fn length(&self, tree: &DomTree) -> u32 {
        tree.child_count(self.parent)
    }

    pub fn item(&self, tree: &DomTree, index: u32) -> Option<NodeId> {
        tree.child_at(self.parent, index)
    }

    pub fn iter(self, tree: &DomTree) -> impl Iterator<Item = NodeId> + '_ {
        tree.child_iter(self.parent)
    }
}

fn class_tokens(class_names: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in class_names.split_ascii_whitespace() {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

impl DomTree {
    /// `Node.childNodes`
    pub fn child_nodes(&self, parent: NodeId) -> NodeList {
        NodeList::new(parent)
    }

    /// `ParentNode.children`
    pub fn children(&self, parent: NodeId) -> HtmlCollection {
        HtmlCollection::new(parent, CollectionFilter::Children)
    }

    /// `getElementsByTagName(qualifiedName)` on a document or element
    pub fn get_elements_by_tag_name(&self, root: NodeId, qualified_name: &str) -> HtmlCollection {
        HtmlCollection::new(root, CollectionFilter::TagName(qualified_name.to_string()))
    }

    /// `getElementsByTagNameNS(namespace, localName)`
    pub fn get_elements_by_tag_name_ns(
        &self,
        root: NodeId,
        namespace: Option<&str>,
        local_name: &str,
    ) -> HtmlCollection {
        HtmlCollection::new(
            root,
            CollectionFilter::TagNameNs {
                namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
                local_name: local_name.to_string(),
            },
        )
    }

    /// `getElementsByClassName(classNames)`
    pub fn get_elements_by_class_name(&self, root: NodeId, class_names: &str) -> HtmlCollection {
        HtmlCollection::new(root, CollectionFilter::ClassNames(class_tokens(class_names)))
    }
}
