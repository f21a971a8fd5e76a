//! Comprehensive tests for fos-dom-core
//!
//! Builds small documents through the public API and checks the tree,
//! attributes, live views, selectors and lifecycle working together.

use fos_dom_core::{
    DocumentConfig, DomException, DomTree, NodeId, NodeType, RefCounted,
    DOCUMENT_POSITION_CONTAINED_BY, DOCUMENT_POSITION_CONTAINS, DOCUMENT_POSITION_FOLLOWING,
    DOCUMENT_POSITION_PRECEDING, HTML_NAMESPACE,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("fos_dom_core=trace")
        .try_init();
}

/// doc > html > [head > title > "Doc", body > [div#main.box > [p > "one", p.note > "two"], ul > [li, li]]]
struct Page {
    tree: DomTree,
    doc: NodeId,
    html: NodeId,
    body: NodeId,
    main: NodeId,
    first_p: NodeId,
    note: NodeId,
    list: NodeId,
}

fn page() -> Page {
    init_tracing();
    let mut tree = DomTree::new();
    let doc = tree
        .create_document_with(DocumentConfig {
            content_type: "text/html".to_string(),
            ..DocumentConfig::default()
        })
        .unwrap();

    let html = tree.create_element(doc, "html").unwrap();
    let head = tree.create_element(doc, "head").unwrap();
    let title = tree.create_element(doc, "title").unwrap();
    let body = tree.create_element(doc, "body").unwrap();
    let main = tree.create_element(doc, "div").unwrap();
    let first_p = tree.create_element(doc, "p").unwrap();
    let note = tree.create_element(doc, "p").unwrap();
    let list = tree.create_element(doc, "ul").unwrap();
    let li1 = tree.create_element(doc, "li").unwrap();
    let li2 = tree.create_element(doc, "li").unwrap();

    tree.append_child(doc, html).unwrap();
    tree.append(html, &[head.into(), body.into()]).unwrap();
    tree.append(head, &[title.into()]).unwrap();
    tree.append(title, &["Doc".into()]).unwrap();
    tree.append(body, &[main.into(), list.into()]).unwrap();
    tree.append(main, &[first_p.into(), note.into()]).unwrap();
    tree.append(first_p, &["one".into()]).unwrap();
    tree.append(note, &["two".into()]).unwrap();
    tree.append(list, &[li1.into(), li2.into()]).unwrap();

    tree.set_id(main, "main").unwrap();
    tree.set_class_name(main, "box").unwrap();
    tree.set_class_name(note, "note").unwrap();

    Page {
        tree,
        doc,
        html,
        body,
        main,
        first_p,
        note,
        list,
    }
}

// ============================================================================
// TREE STRUCTURE
// ============================================================================

#[test]
fn test_document_structure() {
    let p = page();
    let tree = &p.tree;
    assert_eq!(tree.document_element(p.doc), Some(p.html));
    assert_eq!(tree.node_type(p.doc), Some(NodeType::Document));
    assert_eq!(tree.tag_name(p.main).as_deref(), Some("DIV"));
    assert_eq!(tree.namespace_uri(p.main), Some(HTML_NAMESPACE));
    assert_eq!(tree.owner_document(p.note), Some(p.doc));
    assert_eq!(tree.owner_document(p.doc), None);
    assert!(tree.is_connected(p.note));
    assert_eq!(tree.get_root_node(p.note), Some(p.doc));
    assert_eq!(tree.text_content(p.body).as_deref(), Some("onetwo"));
    assert_eq!(tree.text_content(p.doc), None);
}

#[test]
fn test_tree_order_is_consistent_with_ascension() {
    let p = page();
    let tree = &p.tree;
    let all: Vec<NodeId> = tree.descendants(p.doc).collect();
    for window in all.windows(2) {
        assert_eq!(
            tree.compare_tree_order(window[0], window[1]),
            Some(std::cmp::Ordering::Less)
        );
    }
    for &node in &all {
        for ancestor in tree.ancestors(node) {
            assert_eq!(
                tree.compare_tree_order(ancestor, node),
                Some(std::cmp::Ordering::Less)
            );
        }
    }
}

#[test]
fn test_compare_document_position() {
    let p = page();
    let tree = &p.tree;
    assert_eq!(
        tree.compare_document_position(p.main, p.note),
        DOCUMENT_POSITION_CONTAINED_BY | DOCUMENT_POSITION_FOLLOWING
    );
    assert_eq!(
        tree.compare_document_position(p.note, p.main),
        DOCUMENT_POSITION_CONTAINS | DOCUMENT_POSITION_PRECEDING
    );
    assert_eq!(
        tree.compare_document_position(p.first_p, p.list),
        DOCUMENT_POSITION_FOLLOWING
    );
    assert_eq!(tree.compare_document_position(p.list, p.list), 0);
}

#[test]
fn test_failed_insertion_leaves_tree_unchanged() {
    let mut p = page();
    let before: Vec<NodeId> = p.tree.descendants(p.doc).collect();

    assert_eq!(
        p.tree.append_child(p.note, p.body),
        Err(DomException::HierarchyRequest)
    );
    let second_root = p.tree.create_element(p.doc, "html").unwrap();
    assert_eq!(
        p.tree.append_child(p.doc, second_root),
        Err(DomException::HierarchyRequest)
    );
    assert_eq!(
        p.tree.insert_before(p.main, second_root, Some(p.list)),
        Err(DomException::NotFound)
    );

    let after: Vec<NodeId> = p.tree.descendants(p.doc).collect();
    assert_eq!(before, after);
}

// ============================================================================
// ATTRIBUTES AND LIVE VIEWS
// ============================================================================

#[test]
fn test_get_element_by_id_sees_attribute_changes() {
    let mut p = page();
    assert_eq!(p.tree.get_element_by_id(p.doc, "main"), Some(p.main));

    p.tree.set_attribute(p.note, "id", "late").unwrap();
    assert_eq!(p.tree.get_element_by_id(p.doc, "late"), Some(p.note));

    p.tree.remove_attribute(p.main, "id").unwrap();
    assert_eq!(p.tree.get_element_by_id(p.doc, "main"), None);
}

#[test]
fn test_live_collections_follow_mutations() {
    let mut p = page();
    let paragraphs = p.tree.get_elements_by_tag_name(p.doc, "p");
    let notes = p.tree.get_elements_by_class_name(p.doc, "note");
    let items = p.tree.children(p.list);
    assert_eq!(paragraphs.length(&p.tree), 2);
    assert_eq!(notes.length(&p.tree), 1);
    assert_eq!(items.length(&p.tree), 2);

    let extra = p.tree.create_element(p.doc, "p").unwrap();
    p.tree.set_class_name(extra, "note extra").unwrap();
    p.tree.append_child(p.body, extra).unwrap();
    assert_eq!(paragraphs.length(&p.tree), 3);
    assert_eq!(notes.item(&p.tree, 1), Some(extra));

    p.tree.class_list(p.note).remove(&mut p.tree, &["note"]).unwrap();
    assert_eq!(notes.to_vec(&p.tree), vec![extra]);

    let first_item = items.item(&p.tree, 0).unwrap();
    p.tree.remove(first_item).unwrap();
    assert_eq!(items.length(&p.tree), 1);
    assert_eq!(p.tree.child_nodes(p.list).length(&p.tree), 1);
}

#[test]
fn test_class_list_round_trip_through_class_name() {
    let mut p = page();
    let classes = p.tree.class_list(p.main);
    classes.add(&mut p.tree, &["wide", "box"]).unwrap();
    assert_eq!(p.tree.class_name(p.main), "box wide");
    assert!(classes.toggle(&mut p.tree, "dark", None).unwrap());
    assert_eq!(classes.length(&p.tree), 3);
    assert!(p.tree.matches(p.main, ".dark.box").unwrap());
}

#[test]
fn test_selectors() {
    let p = page();
    let tree = &p.tree;
    assert_eq!(tree.query_selector(p.doc, "#main > p.note").unwrap(), Some(p.note));
    assert_eq!(tree.query_selector_all(p.doc, "body li").unwrap().len(), 2);
    assert_eq!(tree.closest(p.note, "div.box").unwrap(), Some(p.main));
    assert_eq!(tree.closest(p.note, "ul").unwrap(), None);
    assert!(tree.webkit_matches_selector(p.first_p, "p").unwrap());
    assert_eq!(tree.query_selector(p.doc, "p[").map(|_| ()), Err(DomException::Syntax));
}

// ============================================================================
// CLONING AND LIFECYCLE
// ============================================================================

#[test]
fn test_deep_clone_is_equal_but_detached() {
    let mut p = page();
    let copy = p.tree.clone_node(p.main, true).unwrap();
    assert!(p.tree.is_equal_node(copy, p.main));
    assert!(!p.tree.is_same_node(copy, p.main));
    assert_eq!(p.tree.parent_node(copy), None);
    assert_eq!(p.tree.get_attribute(copy, "id"), Some("main"));

    p.tree.set_attribute(copy, "id", "other").unwrap();
    assert!(!p.tree.is_equal_node(copy, p.main));
    copy.release(&mut p.tree).unwrap();
    assert!(!p.tree.is_alive(copy));
}

#[test]
fn test_removed_node_survives_through_its_reference() {
    let mut p = page();
    let removed = p.tree.remove_child(p.body, p.list).unwrap();
    assert_eq!(removed, p.list);
    assert_eq!(p.list.ref_count(&p.tree), 2);

    p.list.release(&mut p.tree).unwrap();
    assert!(p.tree.is_alive(p.list));
    p.list.release(&mut p.tree).unwrap();
    assert!(!p.tree.is_alive(p.list));
    assert_eq!(p.list.release(&mut p.tree), Err(DomException::NotFound));
}

#[test]
fn test_document_release_tears_everything_down() {
    let mut p = page();
    let count = p.tree.len();
    assert!(count > 10);

    p.doc.release(&mut p.tree).unwrap();
    assert!(!p.tree.is_alive(p.doc));
    assert!(!p.tree.is_alive(p.note));
    assert!(p.tree.is_empty());
}
