//! Example: Basic usage of fOS DOM Core

use std::rc::Rc;

use fos_dom_core::{
    AbortController, AddEventListenerOptions, DocumentConfig, DomTree, Event, EventCallback,
    EventInit, MutationCallback, MutationObserver, MutationObserverInit, MutationRecord,
};

fn main() -> Result<(), fos_dom_core::DomException> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut tree = DomTree::new();
    let doc = tree.create_document_with(DocumentConfig {
        content_type: "text/html".to_string(),
        ..DocumentConfig::default()
    })?;

    let html = tree.create_element(doc, "html")?;
    let body = tree.create_element(doc, "body")?;
    let list = tree.create_element(doc, "ul")?;
    tree.append_child(doc, html)?;
    tree.append_child(html, body)?;
    tree.append_child(body, list)?;
    tree.set_id(list, "todo")?;

    // Watch the list for new items
    let on_mutation: MutationCallback = Rc::new(
        |_: &mut DomTree, records: Vec<MutationRecord>, _: &MutationObserver| {
            for record in records {
                println!(
                    "{}: {} added, {} removed",
                    record.mutation_type.as_str(),
                    record.added_nodes.len(),
                    record.removed_nodes.len()
                );
            }
        },
    );
    let observer = MutationObserver::new(&mut tree, on_mutation);
    observer.observe(
        &tree,
        list,
        MutationObserverInit {
            child_list: true,
            ..MutationObserverInit::default()
        },
    )?;

    for label in ["write docs", "ship it"] {
        let item = tree.create_element(doc, "li")?;
        tree.append(item, &[label.into()])?;
        tree.append_child(list, item)?;
    }
    tree.notify_mutation_observers();

    // Clicks bubble from an item up to the list until the controller aborts
    let controller = AbortController::new(&mut tree)?;
    let on_click: EventCallback = Rc::new(|tree: &mut DomTree, event: &mut Event| {
        if let Some(target) = event.target().and_then(|t| t.as_node()) {
            println!("clicked {:?}", tree.text_content(target));
        }
    });
    tree.add_event_listener(
        list,
        "click",
        on_click,
        AddEventListenerOptions {
            signal: controller.signal(&tree),
            ..AddEventListenerOptions::default()
        },
    )?;

    let click = EventInit {
        bubbles: true,
        ..EventInit::default()
    };
    if let Some(first) = tree.first_element_child(list) {
        tree.dispatch_event(first, &mut Event::new("click", click))?;
        controller.abort(&mut tree, None)?;
        tree.dispatch_event(first, &mut Event::new("click", click))?;
    }

    let items = tree.query_selector_all(doc, "#todo > li")?;
    println!("fOS DOM Core v{}: {} items", fos_dom_core::VERSION, items.len());
    Ok(())
}
