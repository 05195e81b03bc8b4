//! Graph lifecycle events and their observers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use provenant_graph::NodeId;

/// Something that happened to a [`ProvenanceGraph`](crate::ProvenanceGraph).
/// Events are emitted after the mutation is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A new action was executed and recorded.
    Execute { action: NodeId, state: NodeId },
    /// The current state moved.
    StateChanged { from: NodeId, to: NodeId },
    /// Several actions were executed as one operation: a `run_chain` call or
    /// the forward part of a jump.
    RunChain { actions: Vec<NodeId> },
    /// The slide selection changed.
    Select { slides: Vec<NodeId> },
    SlideAdded { slide: NodeId },
    SlideRemoved { slide: NodeId },
    SlideMoved { slide: NodeId },
}

impl GraphEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::Execute { .. } => "execute",
            GraphEvent::StateChanged { .. } => "state_changed",
            GraphEvent::RunChain { .. } => "run_chain",
            GraphEvent::Select { .. } => "select",
            GraphEvent::SlideAdded { .. } => "slide_added",
            GraphEvent::SlideRemoved { .. } => "slide_removed",
            GraphEvent::SlideMoved { .. } => "slide_moved",
        }
    }
}

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

/// Ordered listener list.
///
/// Listeners run synchronously, in registration order. A panicking listener
/// is logged and skipped; the remaining listeners still run and the
/// mutation that triggered the event is unaffected.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, event: &GraphEvent) {
        // Snapshot so listeners may (un)subscribe while being notified.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(event = event.name(), "event listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> GraphEvent {
        GraphEvent::StateChanged {
            from: NodeId(0),
            to: NodeId(2),
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let observers = Observers::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = log.clone();
            observers.subscribe(move |_| log.lock().unwrap().push(tag));
        }
        observers.emit(&event());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let observers = Observers::new();
        let seen = Arc::new(Mutex::new(0));
        observers.subscribe(|_| panic!("listener bug"));
        {
            let seen = seen.clone();
            observers.subscribe(move |_| *seen.lock().unwrap() += 1);
        }
        observers.emit(&event());
        observers.emit(&event());
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let observers = Observers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = seen.clone();
            observers.subscribe(move |e: &GraphEvent| seen.lock().unwrap().push(e.name()))
        };
        observers.emit(&event());
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.emit(&event());
        assert_eq!(*seen.lock().unwrap(), vec!["state_changed"]);
        assert!(observers.is_empty());
    }
}
