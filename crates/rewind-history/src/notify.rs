/// Change notifications and the listener registry.
use std::sync::Arc;

/// State changes reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    /// `undo_available()` flipped to the carried value.
    UndoAvailabilityChanged(bool),
    /// `redo_available()` flipped to the carried value.
    RedoAvailabilityChanged(bool),
    /// An operation was completed: an undo/redo bracket closed or an
    /// in-progress operation ended with trackable changes.
    OperationEnded,
}

/// Opaque handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Arc<dyn Fn(&HistoryEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl ListenerRegistry {
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners in subscription order, cloned so they can be invoked
    /// without holding the registry lock.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

/// Invokes every listener for every event, in order.
pub(crate) fn dispatch(listeners: &[Listener], events: &[HistoryEvent]) {
    for event in events {
        tracing::trace!("History event {event:?}");
        for listener in listeners {
            listener(event);
        }
    }
}
