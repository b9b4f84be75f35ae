//! In-process change notification.

use tracing::trace;

use crate::traits::{ChangeNotifier, ListenerId};

/// Minimal [`ChangeNotifier`]: listeners run synchronously, in subscription
/// order, each time [`emit`](ChangeBus::emit) is called.
#[derive(Default)]
pub struct ChangeBus {
    listeners: Vec<(ListenerId, Box<dyn FnMut()>)>,
    next_id: u64,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every subscribed listener.
    pub fn emit(&mut self) {
        trace!(listeners = self.listeners.len(), "emitting change");
        for (_, listener) in &mut self.listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ChangeNotifier for ChangeBus {
    fn subscribe(&mut self, listener: Box<dyn FnMut()>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }
}
