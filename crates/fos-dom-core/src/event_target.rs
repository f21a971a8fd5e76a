//! EventTarget
//!
//! Listener registry and the dispatch algorithm. Listeners are stored per
//! target in registration order; dispatch works on a snapshot of the list
//! and checks each listener's `removed` flag before invoking it, so removal
//! during dispatch takes effect immediately.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::abort::{AbortAlgorithm, AbortSignal};
use crate::event::{Event, EventPhase, EventTarget};
use crate::{DomException, DomResult, DomTree};

/// Listener callback
pub type EventCallback = Rc<dyn Fn(&mut DomTree, &mut Event)>;

/// `addEventListener` options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddEventListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
    /// Aborting this signal removes the listener
    pub signal: Option<AbortSignal>,
}

impl AddEventListenerOptions {
    pub fn capture() -> Self {
        Self {
            capture: true,
            ..Self::default()
        }
    }
}

/// Registered listener
pub(crate) struct Listener {
    pub(crate) event_type: String,
    pub(crate) callback: EventCallback,
    pub(crate) capture: bool,
    pub(crate) once: bool,
    pub(crate) passive: bool,
    pub(crate) removed: Cell<bool>,
}

impl Listener {
    fn matches(&self, event_type: &str, callback: &EventCallback, capture: bool) -> bool {
        self.event_type == event_type
            && self.capture == capture
            && std::ptr::addr_eq(Rc::as_ptr(&self.callback), Rc::as_ptr(callback))
    }
}

impl DomTree {
    fn target_alive(&self, target: EventTarget) -> bool {
        match target {
            EventTarget::Node(node) => self.is_alive(node),
            EventTarget::Signal(signal) => self.signals.contains(signal.0),
        }
    }

    /// `EventTarget.addEventListener(type, callback, options)`
    pub fn add_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        callback: EventCallback,
        options: AddEventListenerOptions,
    ) -> DomResult<()> {
        let target = target.into();
        if !self.target_alive(target) {
            return Err(DomException::NotFound);
        }
        if let Some(signal) = options.signal {
            if signal.aborted(self) {
                return Ok(());
            }
        }

        let list = self.listeners.entry(target).or_default();
        if list
            .iter()
            .any(|l| l.matches(event_type, &callback, options.capture))
        {
            return Ok(());
        }

        let listener = Rc::new(Listener {
            event_type: event_type.to_string(),
            callback,
            capture: options.capture,
            once: options.once,
            passive: options.passive,
            removed: Cell::new(false),
        });
        list.push(Rc::clone(&listener));

        if let Some(signal) = options.signal {
            self.add_abort_algorithm(
                signal,
                AbortAlgorithm::RemoveListener {
                    target,
                    listener: Rc::downgrade(&listener),
                },
            );
        }
        Ok(())
    }

    /// `EventTarget.removeEventListener(type, callback, capture)`
    pub fn remove_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        event_type: &str,
        callback: &EventCallback,
        capture: bool,
    ) {
        let target = target.into();
        let Some(list) = self.listeners.get_mut(&target) else {
            return;
        };
        if let Some(position) = list
            .iter()
            .position(|l| l.matches(event_type, callback, capture))
        {
            let listener = list.remove(position);
            listener.removed.set(true);
        }
        if list.is_empty() {
            self.listeners.remove(&target);
        }
    }

    /// Drop one registration (by identity) from a target's list
    pub(crate) fn remove_listener_entry(&mut self, target: EventTarget, listener: &Rc<Listener>) {
        listener.removed.set(true);
        if let Some(list) = self.listeners.get_mut(&target) {
            list.retain(|l| !Rc::ptr_eq(l, listener));
            if list.is_empty() {
                self.listeners.remove(&target);
            }
        }
    }

    /// Number of listeners registered on a target
    pub fn listener_count(&self, target: impl Into<EventTarget>) -> usize {
        self.listeners.get(&target.into()).map_or(0, Vec::len)
    }

    /// `EventTarget.dispatchEvent(event)`: returns `false` if the event was canceled
    pub fn dispatch_event(
        &mut self,
        target: impl Into<EventTarget>,
        event: &mut Event,
    ) -> DomResult<bool> {
        let target = target.into();
        if event.dispatching || !event.is_initialized() {
            return Err(DomException::InvalidState);
        }
        if !self.target_alive(target) {
            warn!(dead_target = ?target, event_type = event.event_type(), "dispatch to destroyed target");
            return Err(DomException::NotFound);
        }
        event.is_trusted = false;
        Ok(self.dispatch(target, event))
    }

    /// Event path for `target`, target first
    fn event_path(&self, target: EventTarget) -> Vec<EventTarget> {
        match target {
            EventTarget::Node(node) => self
                .inclusive_ancestors(node)
                .map(EventTarget::Node)
                .collect(),
            EventTarget::Signal(_) => vec![target],
        }
    }

    /// Dispatch without the caller checks; also used for core-fired events
    pub(crate) fn dispatch(&mut self, target: EventTarget, event: &mut Event) -> bool {
        event.dispatching = true;
        event.target = Some(target);
        event.path = self.event_path(target);
        trace!(event_type = event.event_type(), path_len = event.path.len(), "computed event path");

        let path = event.path.clone();
        for &current in path.iter().rev() {
            event.phase = if current == target {
                EventPhase::AtTarget
            } else {
                EventPhase::Capturing
            };
            self.invoke_listeners(current, event, true);
        }
        for &current in &path {
            if current == target {
                event.phase = EventPhase::AtTarget;
            } else if event.bubbles() {
                event.phase = EventPhase::Bubbling;
            } else {
                continue;
            }
            self.invoke_listeners(current, event, false);
        }

        event.dispatching = false;
        event.phase = EventPhase::None;
        event.current_target = None;
        event.path.clear();
        event.stop_propagation = false;
        event.stop_immediate_propagation = false;
        !event.default_prevented()
    }

    fn invoke_listeners(&mut self, current: EventTarget, event: &mut Event, capture_pass: bool) {
        if event.stop_propagation {
            return;
        }
        let Some(listeners) = self.listeners.get(&current).cloned() else {
            return;
        };
        event.current_target = Some(current);

        for listener in listeners {
            if listener.removed.get()
                || listener.event_type != event.event_type()
                || listener.capture != capture_pass
            {
                continue;
            }
            if listener.once {
                self.remove_listener_entry(current, &listener);
            }

            event.in_passive_listener = listener.passive;
            trace!(current = ?current, phase = ?event.phase, "invoking listener");
            (listener.callback)(self, event);
            event.in_passive_listener = false;

            if event.stop_immediate_propagation {
                break;
            }
        }
    }
}
