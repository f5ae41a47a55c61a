use cinelock_shared::SeatLockEvent;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::events::EventBus;
use crate::models::{require_id, Booking};
use crate::repository::{CommitOutcome, LockStore};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeResult {
    Booked(Booking),
    /// At least one hold lapsed or belongs to someone else. Nothing was booked
    /// and no lock was consumed; the customer has to pick seats again.
    LockInvalid { invalid_seats: Vec<String> },
}

/// Turns a customer's held seats into a permanent booking.
#[derive(Clone)]
pub struct BookingFinalizer {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    max_seats: usize,
}

impl BookingFinalizer {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>, events: EventBus, max_seats: usize) -> Self {
        Self { store, clock, events, max_seats }
    }

    /// Single commit point of checkout. Call only after payment is confirmed.
    pub async fn finalize(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        seat_ids: &[String],
        owner_id: &str,
    ) -> CoreResult<FinalizeResult> {
        require_id("schedule_id", schedule_id)?;
        require_id("cinema_room_id", cinema_room_id)?;
        require_id("owner_id", owner_id)?;
        self.validate_seats(seat_ids)?;

        let now = self.clock.now();
        let booking = Booking::new(
            schedule_id.to_string(),
            cinema_room_id.to_string(),
            owner_id.to_string(),
            seat_ids.to_vec(),
            now,
        );

        match self.store.commit_booking(&booking, now).await? {
            CommitOutcome::Committed(booking) => {
                info!(
                    booking_id = %booking.id,
                    schedule_id,
                    room_id = cinema_room_id,
                    owner_id,
                    seats = booking.seat_ids.len(),
                    "Booking finalized"
                );
                for seat_id in &booking.seat_ids {
                    self.events.publish(SeatLockEvent::SeatBooked {
                        schedule_id: booking.schedule_id.clone(),
                        cinema_room_id: booking.cinema_room_id.clone(),
                        seat_id: seat_id.clone(),
                        booking_id: booking.id,
                    });
                }
                Ok(FinalizeResult::Booked(booking))
            }
            CommitOutcome::Rejected { invalid_seats } => {
                warn!(
                    schedule_id,
                    room_id = cinema_room_id,
                    owner_id,
                    ?invalid_seats,
                    "Finalize rejected, holds no longer valid"
                );
                Ok(FinalizeResult::LockInvalid { invalid_seats })
            }
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        self.store.get_booking(booking_id).await
    }

    fn validate_seats(&self, seat_ids: &[String]) -> CoreResult<()> {
        if seat_ids.is_empty() {
            return Err(CoreError::InvalidRequest("at least one seat is required".to_string()));
        }
        if seat_ids.len() > self.max_seats {
            return Err(CoreError::InvalidRequest(format!(
                "at most {} seats can be booked at once",
                self.max_seats
            )));
        }

        let mut seen = HashSet::new();
        for seat_id in seat_ids {
            require_id("seat_id", seat_id)?;
            if !seen.insert(seat_id.as_str()) {
                return Err(CoreError::InvalidRequest(format!("seat {} requested twice", seat_id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::manager::{LockManager, LockPolicy, LockResult, RefreshPolicy, UnlockResult};
    use crate::memory::MemoryLockStore;
    use crate::models::SeatKey;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryLockStore>,
        clock: Arc<ManualClock>,
        manager: LockManager,
        finalizer: BookingFinalizer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryLockStore::new());
        let clock = Arc::new(ManualClock::default());
        let bus = EventBus::default();
        let policy = LockPolicy::new(Duration::seconds(300), RefreshPolicy::Fixed).unwrap();
        Fixture {
            manager: LockManager::new(store.clone(), clock.clone(), policy, bus.clone()),
            finalizer: BookingFinalizer::new(store.clone(), clock.clone(), bus, 4),
            store,
            clock,
        }
    }

    fn seats(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_finalize_books_and_blocks_future_locks() {
        let f = fixture();
        f.manager.lock(&SeatKey::new("S1", "R1", "A1"), "alice").await.unwrap();
        f.manager.lock(&SeatKey::new("S1", "R1", "A2"), "alice").await.unwrap();

        let result = f.finalizer.finalize("S1", "R1", &seats(&["A1", "A2"]), "alice").await.unwrap();
        let booking = match result {
            FinalizeResult::Booked(booking) => booking,
            other => panic!("expected booking, got {:?}", other),
        };
        assert_eq!(f.finalizer.get_booking(booking.id).await.unwrap(), Some(booking));

        assert!(f.manager.list_active_locks("S1", "R1").await.unwrap().is_empty());
        assert_eq!(
            f.manager.lock(&SeatKey::new("S1", "R1", "A1"), "bob").await.unwrap(),
            LockResult::Booked
        );

        // Still booked long after any hold would have lapsed.
        f.clock.advance(Duration::days(2));
        assert_eq!(
            f.manager.lock(&SeatKey::new("S1", "R1", "A2"), "alice").await.unwrap(),
            LockResult::Booked
        );
    }

    #[tokio::test]
    async fn test_one_expired_seat_rejects_whole_set() {
        let f = fixture();
        f.manager.lock(&SeatKey::new("S1", "R1", "B"), "alice").await.unwrap();
        f.clock.advance(Duration::seconds(200));
        f.manager.lock(&SeatKey::new("S1", "R1", "A"), "alice").await.unwrap();
        f.clock.advance(Duration::seconds(150));

        let result = f.finalizer.finalize("S1", "R1", &seats(&["A", "B"]), "alice").await.unwrap();
        assert_eq!(result, FinalizeResult::LockInvalid { invalid_seats: seats(&["B"]) });

        let held = f.manager.holds_of("S1", "R1", "alice").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].key.seat_id, "A");
        assert!(f.manager.lock(&SeatKey::new("S1", "R1", "B"), "bob").await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_stolen_seat_is_reported_invalid() {
        let f = fixture();
        f.manager.lock(&SeatKey::new("S1", "R1", "A1"), "alice").await.unwrap();
        f.manager.lock(&SeatKey::new("S1", "R1", "A2"), "bob").await.unwrap();

        let result = f.finalizer.finalize("S1", "R1", &seats(&["A1", "A2"]), "alice").await.unwrap();
        assert_eq!(result, FinalizeResult::LockInvalid { invalid_seats: seats(&["A2"]) });
    }

    #[tokio::test]
    async fn test_seat_set_validation() {
        let f = fixture();
        let empty = f.finalizer.finalize("S1", "R1", &[], "alice").await;
        assert!(matches!(empty, Err(CoreError::InvalidRequest(_))));

        let dup = f.finalizer.finalize("S1", "R1", &seats(&["A1", "A1"]), "alice").await;
        assert!(matches!(dup, Err(CoreError::InvalidRequest(_))));

        let too_many = f
            .finalizer
            .finalize("S1", "R1", &seats(&["A1", "A2", "A3", "A4", "A5"]), "alice")
            .await;
        assert!(matches!(too_many, Err(CoreError::InvalidRequest(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_finalizes_book_once() {
        let f = fixture();
        for seat in ["A1", "A2", "A3"] {
            f.manager.lock(&SeatKey::new("S1", "R1", seat), "alice").await.unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..16 {
            let finalizer = f.finalizer.clone();
            // Every set shares A2
            let wanted = if i % 2 == 0 { seats(&["A1", "A2"]) } else { seats(&["A2", "A3"]) };
            handles.push(tokio::spawn(async move {
                finalizer.finalize("S1", "R1", &wanted, "alice").await
            }));
        }

        let mut booked = 0;
        let mut invalid = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                FinalizeResult::Booked(_) => booked += 1,
                FinalizeResult::LockInvalid { invalid_seats } => {
                    assert!(invalid_seats.contains(&"A2".to_string()));
                    invalid += 1;
                }
            }
        }

        assert_eq!(booked, 1);
        assert_eq!(invalid, 15);
        assert_eq!(f.store.stored_bookings().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finalize_racing_unlock_is_all_or_nothing() {
        for _ in 0..20 {
            let f = fixture();
            let a1 = SeatKey::new("S1", "R1", "A1");
            let a2 = SeatKey::new("S1", "R1", "A2");
            f.manager.lock(&a1, "alice").await.unwrap();
            f.manager.lock(&a2, "alice").await.unwrap();

            let finalizer = f.finalizer.clone();
            let finalize = tokio::spawn(async move {
                finalizer.finalize("S1", "R1", &seats(&["A1", "A2"]), "alice").await
            });
            let manager = f.manager.clone();
            let unlock_seat = a2.clone();
            let unlock = tokio::spawn(async move { manager.unlock(&unlock_seat, "alice").await });

            let finalized = finalize.await.unwrap().unwrap();
            let unlocked = unlock.await.unwrap().unwrap();

            match finalized {
                FinalizeResult::Booked(_) => {
                    assert_eq!(unlocked, UnlockResult::NotFound);
                    assert_eq!(f.store.stored_bookings().unwrap(), 1);
                    assert_eq!(f.manager.lock(&a2, "bob").await.unwrap(), LockResult::Booked);
                }
                FinalizeResult::LockInvalid { invalid_seats } => {
                    assert_eq!(unlocked, UnlockResult::Released);
                    assert_eq!(invalid_seats, seats(&["A2"]));
                    assert_eq!(f.store.stored_bookings().unwrap(), 0);
                    // A1 was not consumed by the failed attempt
                    assert_eq!(f.manager.holds_of("S1", "R1", "alice").await.unwrap().len(), 1);
                }
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finalize_at_expiry_loses_to_new_owner() {
        let f = fixture();
        let seat = SeatKey::new("S1", "R1", "A1");
        f.manager.lock(&seat, "alice").await.unwrap();
        f.clock.advance(Duration::seconds(300));

        let finalizer = f.finalizer.clone();
        let finalize = tokio::spawn(async move {
            finalizer.finalize("S1", "R1", &seats(&["A1"]), "alice").await
        });
        let manager = f.manager.clone();
        let bob_seat = seat.clone();
        let lock = tokio::spawn(async move { manager.lock(&bob_seat, "bob").await });

        assert_eq!(
            finalize.await.unwrap().unwrap(),
            FinalizeResult::LockInvalid { invalid_seats: seats(&["A1"]) }
        );
        assert!(lock.await.unwrap().unwrap().is_granted());
        assert_eq!(f.store.stored_bookings().unwrap(), 0);
    }
}
