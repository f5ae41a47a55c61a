use cinelock_shared::SeatLockEvent;
use tokio::sync::broadcast;

/// Fan-out of seat map changes. Publishing never fails: a showing nobody is
/// watching simply drops the event.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SeatLockEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeatLockEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SeatLockEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
