//! Edge case tests
//!
//! Stale handles, boundary offsets, name validation and the document child
//! rules. Each failure must leave the tree as it was.

use fos_dom_core::{
    DomException, DomTree, NodeId, RefCounted, HTML_NAMESPACE, SVG_NAMESPACE, XMLNS_NAMESPACE,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("fos_dom_core=trace")
        .try_init();
}

fn setup() -> (DomTree, NodeId, NodeId) {
    init_tracing();
    let mut tree = DomTree::new();
    let doc = tree.create_document().unwrap();
    let root = tree.create_element(doc, "root").unwrap();
    tree.append_child(doc, root).unwrap();
    (tree, doc, root)
}

// ============================================================================
// STALE HANDLES
// ============================================================================

#[test]
fn test_stale_handle_never_aliases() {
    let (mut tree, doc, root) = setup();
    let gone = tree.create_element(doc, "gone").unwrap();
    gone.release(&mut tree).unwrap();

    let fresh = tree.create_element(doc, "fresh").unwrap();
    assert_ne!(gone, fresh);
    assert!(!tree.is_alive(gone));
    assert_eq!(tree.node_name(gone), None);
    assert_eq!(tree.append_child(root, gone), Err(DomException::NotFound));
    assert_eq!(tree.set_attribute(gone, "a", "b"), Err(DomException::NotFound));
    assert_eq!(gone.acquire(&mut tree), Err(DomException::NotFound));
    assert!(!tree.has_child_nodes(root));
}

#[test]
fn test_attached_node_outlives_released_handle() {
    let (mut tree, doc, root) = setup();
    let child = tree.create_element(doc, "child").unwrap();
    tree.append_child(root, child).unwrap();
    child.release(&mut tree).unwrap();

    assert!(tree.is_alive(child));
    assert_eq!(child.ref_count(&tree), 0);
    assert_eq!(tree.parent_node(child), Some(root));

    tree.remove(child).unwrap();
    assert!(!tree.is_alive(child));
}

// ============================================================================
// CHARACTER DATA OFFSETS
// ============================================================================

#[test]
fn test_character_data_bounds() {
    let (mut tree, doc, root) = setup();
    let text = tree.create_text_node(doc, "hello").unwrap();
    tree.append_child(root, text).unwrap();

    assert_eq!(tree.substring_data(text, 2, u32::MAX).unwrap(), "llo");
    assert_eq!(tree.substring_data(text, 5, 3).unwrap(), "");
    assert_eq!(tree.delete_data(text, 0xFFFF_FFFF, 1), Err(DomException::IndexSize));
    assert_eq!(tree.split_text(text, 6), Err(DomException::IndexSize));

    tree.replace_data(text, 1, 100, "i").unwrap();
    assert_eq!(tree.data(text), Some("hi"));
}

#[test]
fn test_split_at_end_yields_empty_sibling() {
    let (mut tree, doc, root) = setup();
    let text = tree.create_text_node(doc, "abc").unwrap();
    tree.append_child(root, text).unwrap();

    let tail = tree.split_text(text, 3).unwrap();
    assert_eq!(tree.data(tail), Some(""));
    assert_eq!(tree.next_sibling(text), Some(tail));
    assert_eq!(tree.whole_text(text).as_deref(), Some("abc"));

    tree.normalize(root).unwrap();
    assert_eq!(tree.child_count(root), 1);
    assert_eq!(tree.parent_node(tail), None);
    tail.release(&mut tree).unwrap();
    assert!(!tree.is_alive(tail));
}

// ============================================================================
// NAMES AND NAMESPACES
// ============================================================================

#[test]
fn test_name_validation() {
    let (mut tree, doc, root) = setup();
    assert_eq!(tree.create_element(doc, ""), Err(DomException::InvalidCharacter));
    assert_eq!(tree.create_element(doc, "a b"), Err(DomException::InvalidCharacter));
    assert_eq!(tree.set_attribute(root, "=x", "v"), Err(DomException::InvalidCharacter));
    assert_eq!(
        tree.create_element_ns(doc, None, "svg:rect"),
        Err(DomException::Namespace)
    );
    assert_eq!(
        tree.create_element_ns(doc, Some(SVG_NAMESPACE), "xmlns"),
        Err(DomException::Namespace)
    );
    assert!(tree.create_element_ns(doc, Some(XMLNS_NAMESPACE), "xmlns:foo").is_ok());
    assert_eq!(tree.create_element(root, "nope"), Err(DomException::Type));
}

#[test]
fn test_xml_document_keeps_name_case() {
    let (mut tree, doc, _) = setup();
    let mixed = tree.create_element(doc, "MixedCase").unwrap();
    assert_eq!(tree.tag_name(mixed).as_deref(), Some("MixedCase"));
    assert_ne!(tree.namespace_uri(mixed), Some(HTML_NAMESPACE));
}

#[test]
fn test_attribute_in_use() {
    let (mut tree, doc, root) = setup();
    let other = tree.create_element(doc, "other").unwrap();
    let attr = tree.create_attribute(doc, "title").unwrap();
    tree.set_attr_value(attr, "hi").unwrap();

    assert_eq!(tree.set_attribute_node(root, attr), Ok(None));
    assert_eq!(tree.owner_element(attr), Some(root));
    assert_eq!(tree.get_attribute(root, "title"), Some("hi"));
    assert_eq!(
        tree.set_attribute_node(other, attr),
        Err(DomException::InUseAttribute)
    );

    let removed = tree.remove_attribute_node(root, attr).unwrap();
    assert_eq!(removed, attr);
    assert_eq!(tree.owner_element(attr), None);
    assert_eq!(tree.remove_attribute_node(root, attr), Err(DomException::NotFound));
    assert!(tree.set_attribute_node(other, attr).unwrap().is_none());
}

// ============================================================================
// DOCUMENT CHILD RULES
// ============================================================================

#[test]
fn test_document_child_rules() {
    let (mut tree, doc, root) = setup();
    let text = tree.create_text_node(doc, "stray").unwrap();
    assert_eq!(tree.append_child(doc, text), Err(DomException::HierarchyRequest));

    let doctype = tree.create_document_type(doc, "html", "", "").unwrap();
    assert_eq!(
        tree.append_child(doc, doctype),
        Err(DomException::HierarchyRequest)
    );
    tree.insert_before(doc, doctype, Some(root)).unwrap();
    assert_eq!(tree.doctype(doc), Some(doctype));

    let second = tree.create_document_type(doc, "html", "", "").unwrap();
    assert_eq!(
        tree.insert_before(doc, second, Some(doctype)),
        Err(DomException::HierarchyRequest)
    );

    let fragment = tree.create_document_fragment(doc).unwrap();
    let a = tree.create_element(doc, "a").unwrap();
    let b = tree.create_element(doc, "b").unwrap();
    tree.append(fragment, &[a.into(), b.into()]).unwrap();
    assert_eq!(
        tree.replace_child(doc, fragment, root),
        Err(DomException::HierarchyRequest)
    );
    assert_eq!(tree.child_count(fragment), 2);
    assert_eq!(tree.document_element(doc), Some(root));
}

#[test]
fn test_replace_document_element() {
    let (mut tree, doc, root) = setup();
    let next = tree.create_element(doc, "next").unwrap();
    let old = tree.replace_child(doc, next, root).unwrap();
    assert_eq!(old, root);
    assert_eq!(tree.document_element(doc), Some(next));
    assert_eq!(tree.parent_node(root), None);
    assert!(tree.replace_child(doc, root, root).is_err());
}

#[test]
fn test_text_content_on_document_is_noop() {
    let (mut tree, doc, root) = setup();
    tree.set_text_content(doc, Some("ignored")).unwrap();
    assert_eq!(tree.document_element(doc), Some(root));

    tree.set_text_content(root, Some("")).unwrap();
    assert!(!tree.has_child_nodes(root));
    tree.set_text_content(root, Some("x")).unwrap();
    assert_eq!(tree.child_count(root), 1);
}
