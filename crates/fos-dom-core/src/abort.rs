//! AbortController / AbortSignal
//!
//! Signals and controllers live in arenas on the tree and are handed out as
//! `Copy` keys. A controller holds the single reference its signal starts
//! with. Aborting stores the reason, runs the signal's internal abort
//! algorithms, then fires one trusted `abort` event at the signal; later
//! aborts are no-ops.

use std::any::Any;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::arena::Key;
use crate::event::{Event, EventInit, EventTarget};
use crate::event_target::Listener;
use crate::lifecycle::RefCounted;
use crate::{DomException, DomResult, DomTree};

/// Opaque abort reason
pub type AbortReason = Rc<dyn Any>;

/// Work to run when a signal aborts
pub(crate) enum AbortAlgorithm {
    /// Listener registered with this signal in its options
    RemoveListener {
        target: EventTarget,
        listener: Weak<Listener>,
    },
}

impl AbortAlgorithm {
    fn is_live(&self) -> bool {
        match self {
            AbortAlgorithm::RemoveListener { listener, .. } => listener
                .upgrade()
                .is_some_and(|listener| !listener.removed.get()),
        }
    }
}

pub(crate) struct SignalState {
    reason: Option<AbortReason>,
    algorithms: Vec<AbortAlgorithm>,
    ref_count: u32,
}

impl SignalState {
    fn new(reason: Option<AbortReason>) -> Self {
        Self {
            reason,
            algorithms: Vec::new(),
            ref_count: 1,
        }
    }
}

pub(crate) struct ControllerState {
    signal: AbortSignal,
    ref_count: u32,
}

/// Reason used when `abort` is called without one: an `AbortError`
fn default_reason() -> AbortReason {
    Rc::new(DomException::Abort)
}

/// Handle to an abort signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbortSignal(pub(crate) Key);

/// Handle to an abort controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbortController(pub(crate) Key);

impl AbortController {
    /// New controller with a fresh, pending signal
    pub fn new(tree: &mut DomTree) -> DomResult<Self> {
        let signal = AbortSignal(tree.signals.insert(SignalState::new(None))?);
        match tree.controllers.insert(ControllerState {
            signal,
            ref_count: 1,
        }) {
            Ok(key) => Ok(Self(key)),
            Err(err) => {
                tree.signals.remove(signal.0);
                Err(err)
            }
        }
    }

    /// The controller's signal (always the same one)
    pub fn signal(self, tree: &DomTree) -> Option<AbortSignal> {
        tree.controllers.get(self.0).map(|state| state.signal)
    }

    /// Abort the signal; `None` uses an `AbortError` reason
    pub fn abort(self, tree: &mut DomTree, reason: Option<AbortReason>) -> DomResult<()> {
        let signal = self.signal(tree).ok_or(DomException::NotFound)?;
        tree.signal_abort(signal, reason);
        Ok(())
    }
}

impl AbortSignal {
    /// `AbortSignal.abort(reason)`: a signal that starts aborted
    pub fn abort(tree: &mut DomTree, reason: Option<AbortReason>) -> DomResult<Self> {
        let reason = reason.unwrap_or_else(default_reason);
        Ok(Self(tree.signals.insert(SignalState::new(Some(reason)))?))
    }

    pub fn aborted(self, tree: &DomTree) -> bool {
        tree.signals
            .get(self.0)
            .is_some_and(|state| state.reason.is_some())
    }

    pub fn reason(self, tree: &DomTree) -> Option<AbortReason> {
        tree.signals.get(self.0).and_then(|state| state.reason.clone())
    }

    /// `InvalidState` once aborted; changes nothing
    pub fn throw_if_aborted(self, tree: &DomTree) -> DomResult<()> {
        if self.aborted(tree) {
            return Err(DomException::InvalidState);
        }
        Ok(())
    }
}

impl DomTree {
    /// Register work to run on abort (dropped if the signal already aborted).
    /// Algorithms whose listener is already gone are pruned on the way.
    pub(crate) fn add_abort_algorithm(&mut self, signal: AbortSignal, algorithm: AbortAlgorithm) {
        if let Some(state) = self.signals.get_mut(signal.0) {
            if state.reason.is_none() {
                state.algorithms.retain(AbortAlgorithm::is_live);
                state.algorithms.push(algorithm);
            }
        }
    }

    /// Signal abort steps
    pub(crate) fn signal_abort(&mut self, signal: AbortSignal, reason: Option<AbortReason>) {
        let Some(state) = self.signals.get_mut(signal.0) else {
            return;
        };
        if state.reason.is_some() {
            return;
        }
        state.reason = Some(reason.unwrap_or_else(default_reason));
        let algorithms = std::mem::take(&mut state.algorithms);
        debug!(?signal, algorithms = algorithms.len(), "signal aborted");

        for algorithm in algorithms {
            match algorithm {
                AbortAlgorithm::RemoveListener { target, listener } => {
                    if let Some(listener) = listener.upgrade() {
                        self.remove_listener_entry(target, &listener);
                    }
                }
            }
        }

        let mut event = Event::trusted("abort", EventInit::default());
        self.dispatch(EventTarget::Signal(signal), &mut event);
    }

    fn destroy_signal(&mut self, signal: AbortSignal) {
        if self.signals.remove(signal.0).is_some() {
            self.listeners.remove(&EventTarget::Signal(signal));
            trace!(?signal, "destroyed signal");
        }
    }
}

impl RefCounted for AbortSignal {
    fn acquire(self, tree: &mut DomTree) -> DomResult<()> {
        let state = tree.signals.get_mut(self.0).ok_or(DomException::NotFound)?;
        state.ref_count = state.ref_count.saturating_add(1);
        Ok(())
    }

    fn release(self, tree: &mut DomTree) -> DomResult<()> {
        let state = tree.signals.get_mut(self.0).ok_or(DomException::NotFound)?;
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count == 0 {
            tree.destroy_signal(self);
        }
        Ok(())
    }

    fn ref_count(self, tree: &DomTree) -> u32 {
        tree.signals.get(self.0).map_or(0, |state| state.ref_count)
    }
}

impl RefCounted for AbortController {
    fn acquire(self, tree: &mut DomTree) -> DomResult<()> {
        let state = tree.controllers.get_mut(self.0).ok_or(DomException::NotFound)?;
        state.ref_count = state.ref_count.saturating_add(1);
        Ok(())
    }

    /// Releasing the last reference also releases the signal
    fn release(self, tree: &mut DomTree) -> DomResult<()> {
        let state = tree.controllers.get_mut(self.0).ok_or(DomException::NotFound)?;
        state.ref_count = state.ref_count.saturating_sub(1);
        if state.ref_count > 0 {
            return Ok(());
        }
        let signal = state.signal;
        tree.controllers.remove(self.0);
        if tree.signals.contains(signal.0) {
            signal.release(tree)?;
        }
        Ok(())
    }

    fn ref_count(self, tree: &DomTree) -> u32 {
        tree.controllers.get(self.0).map_or(0, |state| state.ref_count)
    }
}
