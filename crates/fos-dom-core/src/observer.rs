//! MutationObserver
//!
//! Mutations queue records on every interested observer. There is no
//! microtask checkpoint in this crate: `DomTree::notify_mutation_observers`
//! plays that role and hands each non-empty queue to its callback.
//!
//! Observers are `Rc`-backed; the tree only keeps weak registrations, so
//! dropping the last handle stops observation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::{DomException, DomResult, DomTree, NodeId};

/// Callback receiving the delivered records and the observer itself
pub type MutationCallback = Rc<dyn Fn(&mut DomTree, Vec<MutationRecord>, &MutationObserver)>;

/// Mutation observer options
///
/// `attributes` and `character_data` are `None` when omitted; the old value
/// and filter options switch an omitted one on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: Option<bool>,
    pub character_data: Option<bool>,
    pub subtree: bool,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
    pub attribute_filter: Option<Vec<String>>,
}

/// Options after defaults are applied
#[derive(Debug, Clone)]
struct Registration {
    target: NodeId,
    child_list: bool,
    attributes: bool,
    character_data: bool,
    subtree: bool,
    attribute_old_value: bool,
    character_data_old_value: bool,
    attribute_filter: Option<Vec<String>>,
}

impl Registration {
    fn resolve(target: NodeId, init: MutationObserverInit) -> DomResult<Self> {
        let attributes = init
            .attributes
            .unwrap_or(init.attribute_old_value || init.attribute_filter.is_some());
        let character_data = init
            .character_data
            .unwrap_or(init.character_data_old_value);

        if !init.child_list && !attributes && !character_data {
            return Err(DomException::Type);
        }
        if (init.attribute_old_value || init.attribute_filter.is_some()) && !attributes {
            return Err(DomException::Type);
        }
        if init.character_data_old_value && !character_data {
            return Err(DomException::Type);
        }

        Ok(Self {
            target,
            child_list: init.child_list,
            attributes,
            character_data,
            subtree: init.subtree,
            attribute_old_value: init.attribute_old_value,
            character_data_old_value: init.character_data_old_value,
            attribute_filter: init.attribute_filter,
        })
    }
}

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub attribute_name: Option<String>,
    pub attribute_namespace: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    fn new(mutation_type: MutationType, target: NodeId) -> Self {
        Self {
            mutation_type,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: None,
            attribute_namespace: None,
            old_value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

impl MutationType {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationType::Attributes => "attributes",
            MutationType::CharacterData => "characterData",
            MutationType::ChildList => "childList",
        }
    }
}

pub(crate) struct ObserverInner {
    callback: MutationCallback,
    registrations: RefCell<Vec<Registration>>,
    records: RefCell<Vec<MutationRecord>>,
}

/// Mutation observer
#[derive(Clone)]
pub struct MutationObserver {
    inner: Rc<ObserverInner>,
}

impl MutationObserver {
    pub fn new(tree: &mut DomTree, callback: MutationCallback) -> Self {
        let inner = Rc::new(ObserverInner {
            callback,
            registrations: RefCell::new(Vec::new()),
            records: RefCell::new(Vec::new()),
        });
        tree.observers.retain(|weak| weak.strong_count() > 0);
        tree.observers.push(Rc::downgrade(&inner));
        Self { inner }
    }

    /// Start observing `target`, or replace the options of an existing registration
    pub fn observe(&self, tree: &DomTree, target: NodeId, options: MutationObserverInit) -> DomResult<()> {
        tree.node(target)?;
        let registration = Registration::resolve(target, options)?;

        let mut registrations = self.inner.registrations.borrow_mut();
        match registrations.iter_mut().find(|r| r.target == target) {
            Some(existing) => *existing = registration,
            None => registrations.push(registration),
        }
        Ok(())
    }

    /// Stop observing everything and drop queued records
    pub fn disconnect(&self) {
        self.inner.registrations.borrow_mut().clear();
        self.inner.records.borrow_mut().clear();
    }

    /// Empty the record queue
    pub fn take_records(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.inner.records.borrow_mut())
    }

    /// Nodes this observer is registered on
    pub fn observed(&self) -> Vec<NodeId> {
        self.inner
            .registrations
            .borrow()
            .iter()
            .map(|r| r.target)
            .collect()
    }

    pub fn same_observer(&self, other: &MutationObserver) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("observed", &self.observed())
            .field("queued", &self.inner.records.borrow().len())
            .finish()
    }
}

impl DomTree {
    /// Queue `record` on every observer interested in it. `old_value` is
    /// only attached for registrations that asked for it.
    fn queue_mutation_record(&mut self, mut record: MutationRecord, old_value: Option<String>) {
        self.observers.retain(|weak| weak.strong_count() > 0);
        if self.observers.is_empty() {
            return;
        }

        let chain: Vec<NodeId> = self.inclusive_ancestors(record.target).collect();
        for weak in &self.observers {
            let Some(observer) = weak.upgrade() else {
                continue;
            };

            let mut interested = false;
            let mut wants_old_value = false;
            for registration in observer.registrations.borrow().iter() {
                let Some(&node) = chain.iter().find(|n| **n == registration.target) else {
                    continue;
                };
                if node != record.target && !registration.subtree {
                    continue;
                }
                let accepted = match record.mutation_type {
                    MutationType::Attributes => {
                        registration.attributes
                            && registration.attribute_filter.as_ref().is_none_or(|filter| {
                                record.attribute_namespace.is_none()
                                    && record
                                        .attribute_name
                                        .as_ref()
                                        .is_some_and(|name| filter.contains(name))
                            })
                    }
                    MutationType::CharacterData => registration.character_data,
                    MutationType::ChildList => registration.child_list,
                };
                if !accepted {
                    continue;
                }
                interested = true;
                wants_old_value |= match record.mutation_type {
                    MutationType::Attributes => registration.attribute_old_value,
                    MutationType::CharacterData => registration.character_data_old_value,
                    MutationType::ChildList => false,
                };
            }

            if interested {
                record.old_value = if wants_old_value { old_value.clone() } else { None };
                observer.records.borrow_mut().push(record.clone());
            }
        }
    }

    pub(crate) fn queue_child_list_record(
        &mut self,
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) {
        let mut record = MutationRecord::new(MutationType::ChildList, target);
        record.added_nodes = added;
        record.removed_nodes = removed;
        record.previous_sibling = previous_sibling;
        record.next_sibling = next_sibling;
        self.queue_mutation_record(record, None);
    }

    pub(crate) fn queue_attribute_record(
        &mut self,
        element: NodeId,
        local_name: String,
        namespace: Option<String>,
        old_value: Option<String>,
    ) {
        let mut record = MutationRecord::new(MutationType::Attributes, element);
        record.attribute_name = Some(local_name);
        record.attribute_namespace = namespace;
        self.queue_mutation_record(record, old_value);
    }

    pub(crate) fn queue_character_data_record(&mut self, node: NodeId, old_value: String) {
        let record = MutationRecord::new(MutationType::CharacterData, node);
        self.queue_mutation_record(record, Some(old_value));
    }

    /// Deliver queued records, invoking each observer whose queue is
    /// non-empty once. Returns the number of callbacks invoked.
    pub fn notify_mutation_observers(&mut self) -> usize {
        self.observers.retain(|weak| weak.strong_count() > 0);
        let pending: Vec<Rc<ObserverInner>> =
            self.observers.iter().filter_map(|weak| weak.upgrade()).collect();

        let mut notified = 0;
        for inner in pending {
            let records = std::mem::take(&mut *inner.records.borrow_mut());
            if records.is_empty() {
                continue;
            }
            debug!(records = records.len(), "delivering mutation records");
            let observer = MutationObserver {
                inner: Rc::clone(&inner),
            };
            (inner.callback)(self, records, &observer);
            notified += 1;
        }
        notified
    }
}
