//! DOM Events
//!
//! `Event` is a plain owned value. The dispatch algorithm in
//! `event_target` drives its phase, current target and path; listeners see
//! it through `&mut Event`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::abort::AbortSignal;
use crate::NodeId;

/// Anything listeners can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Node(NodeId),
    Signal(AbortSignal),
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        EventTarget::Node(node)
    }
}

impl From<AbortSignal> for EventTarget {
    fn from(signal: AbortSignal) -> Self {
        EventTarget::Signal(signal)
    }
}

impl EventTarget {
    pub fn as_node(self) -> Option<NodeId> {
        match self {
            EventTarget::Node(node) => Some(node),
            EventTarget::Signal(_) => None,
        }
    }
}

/// Event phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

impl EventPhase {
    pub fn to_u16(self) -> u16 {
        match self {
            EventPhase::None => 0,
            EventPhase::Capturing => 1,
            EventPhase::AtTarget => 2,
            EventPhase::Bubbling => 3,
        }
    }
}

/// `EventInit` dictionary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
}

/// `CustomEventInit` dictionary
#[derive(Clone, Default)]
pub struct CustomEventInit {
    pub event: EventInit,
    /// Opaque payload, handed back untouched by `Event::detail`
    pub detail: Option<Rc<dyn Any>>,
}

fn now_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64() * 1000.0)
}

/// DOM event
#[derive(Clone, Default)]
pub struct Event {
    event_type: String,
    pub(crate) target: Option<EventTarget>,
    pub(crate) current_target: Option<EventTarget>,
    pub(crate) phase: EventPhase,
    pub(crate) path: Vec<EventTarget>,
    bubbles: bool,
    cancelable: bool,
    composed: bool,
    pub(crate) is_trusted: bool,
    time_stamp: f64,
    detail: Option<Rc<dyn Any>>,

    // Flags
    pub(crate) stop_propagation: bool,
    pub(crate) stop_immediate_propagation: bool,
    canceled: bool,
    pub(crate) in_passive_listener: bool,
    initialized: bool,
    pub(crate) dispatching: bool,
}

impl Event {
    /// `new Event(type, init)`
    pub fn new(event_type: &str, init: EventInit) -> Self {
        Self {
            event_type: event_type.to_string(),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            composed: init.composed,
            time_stamp: now_millis(),
            initialized: true,
            ..Self::default()
        }
    }

    /// `new CustomEvent(type, init)`
    pub fn custom(event_type: &str, init: CustomEventInit) -> Self {
        Self {
            detail: init.detail,
            ..Self::new(event_type, init.event)
        }
    }

    /// Event fired by the core itself
    pub(crate) fn trusted(event_type: &str, init: EventInit) -> Self {
        Self {
            is_trusted: true,
            ..Self::new(event_type, init)
        }
    }

    // --- Accessors ---

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> Option<EventTarget> {
        self.target
    }

    /// Legacy alias of `target`
    pub fn src_element(&self) -> Option<EventTarget> {
        self.target
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
    }

    pub fn event_phase(&self) -> EventPhase {
        self.phase
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn composed(&self) -> bool {
        self.composed
    }

    pub fn default_prevented(&self) -> bool {
        self.canceled
    }

    pub fn is_trusted(&self) -> bool {
        self.is_trusted
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn time_stamp(&self) -> f64 {
        self.time_stamp
    }

    /// `CustomEvent.detail`
    pub fn detail(&self) -> Option<&Rc<dyn Any>> {
        self.detail.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// Propagation path (target first) while dispatching, empty otherwise
    pub fn composed_path(&self) -> Vec<EventTarget> {
        if self.dispatching {
            self.path.clone()
        } else {
            Vec::new()
        }
    }

    // --- Flags ---

    /// Stop moving along the path after the current target
    pub fn stop_propagation(&mut self) {
        self.stop_propagation = true;
    }

    /// Also skip the remaining listeners on the current target
    pub fn stop_immediate_propagation(&mut self) {
        self.stop_propagation = true;
        self.stop_immediate_propagation = true;
    }

    pub fn cancel_bubble(&self) -> bool {
        self.stop_propagation
    }

    /// Setting `true` stops propagation; `false` is ignored
    pub fn set_cancel_bubble(&mut self, value: bool) {
        if value {
            self.stop_propagation = true;
        }
    }

    /// Cancel the event (no effect unless cancelable and outside passive listeners)
    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.canceled = true;
        }
    }

    pub fn return_value(&self) -> bool {
        !self.canceled
    }

    /// Setting `false` is `prevent_default`; `true` is ignored
    pub fn set_return_value(&mut self, value: bool) {
        if !value {
            self.prevent_default();
        }
    }

    /// `Event.initEvent(type, bubbles, cancelable)`; ignored while dispatching
    pub fn init_event(&mut self, event_type: &str, bubbles: bool, cancelable: bool) {
        if self.dispatching {
            return;
        }
        self.initialized = true;
        self.stop_propagation = false;
        self.stop_immediate_propagation = false;
        self.canceled = false;
        self.is_trusted = false;
        self.target = None;
        self.event_type = event_type.to_string();
        self.bubbles = bubbles;
        self.cancelable = cancelable;
    }

    /// `CustomEvent.initCustomEvent(type, bubbles, cancelable, detail)`
    pub fn init_custom_event(
        &mut self,
        event_type: &str,
        bubbles: bool,
        cancelable: bool,
        detail: Option<Rc<dyn Any>>,
    ) {
        if self.dispatching {
            return;
        }
        self.init_event(event_type, bubbles, cancelable);
        self.detail = detail;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("target", &self.target)
            .field("phase", &self.phase)
            .field("bubbles", &self.bubbles)
            .field("cancelable", &self.cancelable)
            .field("default_prevented", &self.canceled)
            .field("is_trusted", &self.is_trusted)
            .field("has_detail", &self.detail.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_event_is_uninitialized() {
        let event = Event::default();
        assert!(!event.is_initialized());
        assert_eq!(event.event_type(), "");
        assert_eq!(event.event_phase(), EventPhase::None);
    }

    #[test]
    fn test_prevent_default_requires_cancelable() {
        let mut plain = Event::new("click", EventInit::default());
        plain.prevent_default();
        assert!(!plain.default_prevented());
        assert!(plain.return_value());

        let mut cancelable = Event::new(
            "click",
            EventInit {
                cancelable: true,
                ..EventInit::default()
            },
        );
        cancelable.set_return_value(true);
        assert!(!cancelable.default_prevented());
        cancelable.set_return_value(false);
        assert!(cancelable.default_prevented());
    }

    #[test]
    fn test_cancel_bubble_and_init_event() {
        let mut event = Event::new("a", EventInit::default());
        event.set_cancel_bubble(false);
        assert!(!event.cancel_bubble());
        event.set_cancel_bubble(true);
        assert!(event.cancel_bubble());

        event.init_event("b", true, true);
        assert_eq!(event.event_type(), "b");
        assert!(event.bubbles());
        assert!(!event.cancel_bubble());

        event.dispatching = true;
        event.init_event("c", false, false);
        assert_eq!(event.event_type(), "b");
    }

    #[test]
    fn test_custom_event_detail() {
        let event = Event::custom(
            "ping",
            CustomEventInit {
                event: EventInit::default(),
                detail: Some(Rc::new(42u32)),
            },
        );
        let detail = event.detail().and_then(|d| d.downcast_ref::<u32>());
        assert_eq!(detail, Some(&42));
        assert!(event.time_stamp() > 0.0);
        assert!(event.composed_path().is_empty());
    }
}
