//! Event dispatch, abort signals and mutation observers
//!
//! These run listeners that call back into the tree, which is where the
//! `&mut DomTree` callback shape matters.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fos_dom_core::{
    AbortController, AbortSignal, AddEventListenerOptions, CustomEventInit, DomException, DomTree,
    Event, EventCallback, EventInit, EventTarget, MutationCallback, MutationObserver,
    MutationObserverInit, MutationRecord, MutationType, NodeId, RefCounted,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("fos_dom_core=trace")
        .try_init();
}

type Log = Rc<RefCell<Vec<String>>>;

fn logger(log: &Log, label: &'static str) -> EventCallback {
    let log = Rc::clone(log);
    Rc::new(move |_: &mut DomTree, event: &mut Event| {
        log.borrow_mut()
            .push(format!("{label}:{}", event.event_phase().to_u16()));
    })
}

/// doc > outer > inner
fn setup() -> (DomTree, NodeId, NodeId, NodeId) {
    init_tracing();
    let mut tree = DomTree::new();
    let doc = tree.create_document().unwrap();
    let outer = tree.create_element(doc, "outer").unwrap();
    let inner = tree.create_element(doc, "inner").unwrap();
    tree.append_child(doc, outer).unwrap();
    tree.append_child(outer, inner).unwrap();
    (tree, doc, outer, inner)
}

fn bubbling(event_type: &str) -> Event {
    Event::new(
        event_type,
        EventInit {
            bubbles: true,
            cancelable: true,
            composed: false,
        },
    )
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_capture_target_bubble_order() {
    let (mut tree, doc, outer, inner) = setup();
    let log: Log = Rc::default();
    tree.add_event_listener(doc, "x", logger(&log, "doc-capture"), AddEventListenerOptions::capture())
        .unwrap();
    tree.add_event_listener(outer, "x", logger(&log, "L1"), AddEventListenerOptions::capture())
        .unwrap();
    tree.add_event_listener(outer, "x", logger(&log, "L2"), AddEventListenerOptions::default())
        .unwrap();
    tree.add_event_listener(inner, "x", logger(&log, "L3"), AddEventListenerOptions::default())
        .unwrap();
    tree.add_event_listener(doc, "x", logger(&log, "doc-bubble"), AddEventListenerOptions::default())
        .unwrap();

    assert!(tree.dispatch_event(inner, &mut bubbling("x")).unwrap());
    assert_eq!(
        *log.borrow(),
        vec!["doc-capture:1", "L1:1", "L3:2", "L2:3", "doc-bubble:3"]
    );
}

#[test]
fn test_path_is_fixed_before_listeners_run() {
    let (mut tree, doc, outer, inner) = setup();
    let log: Log = Rc::default();
    let detach: EventCallback = Rc::new(move |tree: &mut DomTree, _: &mut Event| {
        tree.remove(outer).unwrap();
    });
    tree.add_event_listener(inner, "x", detach, AddEventListenerOptions::default())
        .unwrap();
    tree.add_event_listener(doc, "x", logger(&log, "doc"), AddEventListenerOptions::default())
        .unwrap();

    tree.dispatch_event(inner, &mut bubbling("x")).unwrap();
    assert_eq!(tree.parent_node(outer), None);
    assert_eq!(*log.borrow(), vec!["doc:3"]);
}

#[test]
fn test_prevent_default_reports_cancellation() {
    let (mut tree, _, outer, inner) = setup();
    let cancel: EventCallback = Rc::new(|_: &mut DomTree, event: &mut Event| {
        event.prevent_default();
    });
    tree.add_event_listener(outer, "submit", cancel, AddEventListenerOptions::default())
        .unwrap();

    let mut event = bubbling("submit");
    assert!(!tree.dispatch_event(inner, &mut event).unwrap());
    assert!(event.default_prevented());
    assert!(!event.return_value());

    let mut not_cancelable = Event::new(
        "submit",
        EventInit {
            bubbles: true,
            ..EventInit::default()
        },
    );
    assert!(tree.dispatch_event(inner, &mut not_cancelable).unwrap());
}

#[test]
fn test_custom_event_detail_and_current_target() {
    let (mut tree, _, outer, inner) = setup();
    let seen = Rc::new(RefCell::new(None));
    let seen_in = Rc::clone(&seen);
    let listener: EventCallback = Rc::new(move |_: &mut DomTree, event: &mut Event| {
        let detail = event
            .detail()
            .and_then(|detail| detail.downcast_ref::<u32>())
            .copied();
        *seen_in.borrow_mut() = Some((detail, event.current_target(), event.target()));
    });
    tree.add_event_listener(outer, "ready", listener, AddEventListenerOptions::default())
        .unwrap();

    let mut event = Event::custom(
        "ready",
        CustomEventInit {
            event: EventInit {
                bubbles: true,
                ..EventInit::default()
            },
            detail: Some(Rc::new(42u32)),
        },
    );
    tree.dispatch_event(inner, &mut event).unwrap();
    assert_eq!(
        *seen.borrow(),
        Some((
            Some(42),
            Some(EventTarget::Node(outer)),
            Some(EventTarget::Node(inner))
        ))
    );
    assert_eq!(event.current_target(), None);
}

#[test]
fn test_uninitialized_event_and_dead_target() {
    let (mut tree, doc, _, _) = setup();
    assert_eq!(
        tree.dispatch_event(doc, &mut Event::default()),
        Err(DomException::InvalidState)
    );

    let lonely = tree.create_element(doc, "lonely").unwrap();
    lonely.release(&mut tree).unwrap();
    assert_eq!(
        tree.dispatch_event(lonely, &mut bubbling("x")),
        Err(DomException::NotFound)
    );
}

// ============================================================================
// ABORT
// ============================================================================

#[test]
fn test_abort_event_sees_reason() {
    init_tracing();
    let mut tree = DomTree::new();
    let controller = AbortController::new(&mut tree).unwrap();
    let signal = controller.signal(&tree).unwrap();

    let observed = Rc::new(Cell::new(false));
    let observed_in = Rc::clone(&observed);
    let on_abort: EventCallback = Rc::new(move |tree: &mut DomTree, event: &mut Event| {
        let EventTarget::Signal(signal) = event.target().unwrap() else {
            return;
        };
        observed_in.set(signal.aborted(tree) && signal.throw_if_aborted(tree).is_err());
    });
    tree.add_event_listener(signal, "abort", on_abort, AddEventListenerOptions::default())
        .unwrap();

    controller.abort(&mut tree, Some(Rc::new("stop"))).unwrap();
    assert!(observed.get());
}

#[test]
fn test_one_signal_removes_many_listeners() {
    let (mut tree, doc, outer, inner) = setup();
    let controller = AbortController::new(&mut tree).unwrap();
    let signal = controller.signal(&tree).unwrap();
    let options = AddEventListenerOptions {
        signal: Some(signal),
        ..AddEventListenerOptions::default()
    };
    let log: Log = Rc::default();
    for (node, label) in [(doc, "doc"), (outer, "outer"), (inner, "inner")] {
        tree.add_event_listener(node, "x", logger(&log, label), options)
            .unwrap();
    }
    let survivor = logger(&log, "kept");
    tree.add_event_listener(outer, "x", survivor, AddEventListenerOptions::default())
        .unwrap();

    controller.abort(&mut tree, None).unwrap();
    tree.dispatch_event(inner, &mut bubbling("x")).unwrap();
    assert_eq!(*log.borrow(), vec!["kept:3"]);
    assert_eq!(tree.listener_count(doc), 0);
    assert_eq!(tree.listener_count(outer), 1);
}

#[test]
fn test_pre_aborted_signal() {
    let (mut tree, doc, _, _) = setup();
    let signal = AbortSignal::abort(&mut tree, Some(Rc::new(7i32))).unwrap();
    let reason = signal.reason(&tree).unwrap();
    assert_eq!(reason.downcast_ref::<i32>(), Some(&7));

    let options = AddEventListenerOptions {
        signal: Some(signal),
        ..AddEventListenerOptions::default()
    };
    let log: Log = Rc::default();
    tree.add_event_listener(doc, "x", logger(&log, "never"), options)
        .unwrap();
    assert_eq!(tree.listener_count(doc), 0);
    signal.release(&mut tree).unwrap();
    assert!(!signal.aborted(&tree));
}

// ============================================================================
// MUTATION OBSERVERS
// ============================================================================

#[test]
fn test_listener_mutations_reach_observer() {
    let (mut tree, doc, outer, inner) = setup();
    let delivered = Rc::new(RefCell::new(Vec::new()));
    let delivered_in = Rc::clone(&delivered);
    let callback: MutationCallback = Rc::new(move |_: &mut DomTree, records: Vec<MutationRecord>, _: &MutationObserver| {
        for record in records {
            delivered_in
                .borrow_mut()
                .push((record.mutation_type, record.target));
        }
    });
    let observer = MutationObserver::new(&mut tree, callback);
    observer
        .observe(
            &tree,
            doc,
            MutationObserverInit {
                child_list: true,
                attributes: Some(true),
                subtree: true,
                ..MutationObserverInit::default()
            },
        )
        .unwrap();

    let mark: EventCallback = Rc::new(move |tree: &mut DomTree, _: &mut Event| {
        tree.set_attribute(inner, "data-hit", "1").unwrap();
    });
    tree.add_event_listener(outer, "x", mark, AddEventListenerOptions::default())
        .unwrap();
    tree.dispatch_event(inner, &mut bubbling("x")).unwrap();
    tree.remove(inner).unwrap();

    assert_eq!(tree.notify_mutation_observers(), 1);
    assert_eq!(
        *delivered.borrow(),
        vec![
            (MutationType::Attributes, inner),
            (MutationType::ChildList, outer),
        ]
    );
    assert_eq!(tree.notify_mutation_observers(), 0);
}

#[test]
fn test_dropped_observer_stops_observing() {
    let (mut tree, doc, outer, _) = setup();
    let count = Rc::new(Cell::new(0));
    let count_in = Rc::clone(&count);
    let callback: MutationCallback = Rc::new(move |_: &mut DomTree, records: Vec<MutationRecord>, _: &MutationObserver| {
        count_in.set(count_in.get() + records.len());
    });
    let observer = MutationObserver::new(&mut tree, callback);
    observer
        .observe(
            &tree,
            doc,
            MutationObserverInit {
                attributes: Some(true),
                subtree: true,
                ..MutationObserverInit::default()
            },
        )
        .unwrap();

    tree.set_attribute(outer, "a", "1").unwrap();
    assert_eq!(observer.take_records().len(), 1);
    drop(observer);

    tree.set_attribute(outer, "a", "2").unwrap();
    assert_eq!(tree.notify_mutation_observers(), 0);
    assert_eq!(count.get(), 0);
}
