use cinelock_shared::SeatLockEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::Clock;
use crate::events::EventBus;
use crate::repository::LockStore;
use crate::CoreResult;

/// Reclaims seats whose hold lapsed without release or finalize.
///
/// Housekeeping only: every read and write path already ignores lapsed
/// locks, so a late or skipped sweep never lets a stale hold through.
#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self { store, clock, events }
    }

    /// Run a single sweep; returns how many locks were expired.
    pub async fn sweep_once(&self) -> CoreResult<usize> {
        let expired = self.store.sweep_expired(self.clock.now()).await?;

        for key in &expired {
            self.events.publish(SeatLockEvent::SeatExpired {
                schedule_id: key.schedule_id.clone(),
                cinema_room_id: key.cinema_room_id.clone(),
                seat_id: key.seat_id.clone(),
            });
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale seat locks");
        }
        Ok(expired.len())
    }

    /// Sweep on a fixed interval until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(self, every: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Expiry reaper started, sweeping every {:?}", every);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            error!("Seat lock sweep failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Expiry reaper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::manager::{LockManager, LockPolicy};
    use crate::memory::MemoryLockStore;
    use crate::models::SeatKey;

    #[tokio::test]
    async fn test_sweep_reports_and_publishes_expired_seats() {
        let store = Arc::new(MemoryLockStore::new());
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::default();
        let manager = LockManager::new(store.clone(), clock.clone(), LockPolicy::default(), bus.clone());
        let reaper = ExpiryReaper::new(store.clone(), clock.clone(), bus.clone());

        manager.lock(&SeatKey::new("S1", "R1", "A5"), "alice").await.unwrap();
        assert_eq!(reaper.sweep_once().await.unwrap(), 0);

        let mut rx = bus.subscribe();
        clock.advance(chrono::Duration::minutes(11));
        assert_eq!(reaper.sweep_once().await.unwrap(), 1);
        assert_eq!(store.stored_locks().unwrap(), 0);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "seat_expired");
    }

    #[tokio::test]
    async fn test_spawned_reaper_stops_on_shutdown() {
        let store = Arc::new(MemoryLockStore::new());
        let reaper = ExpiryReaper::new(store, Arc::new(ManualClock::default()), EventBus::default());
        let (tx, rx) = watch::channel(false);

        let handle = reaper.spawn(Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper did not stop")
            .unwrap();
    }
}
