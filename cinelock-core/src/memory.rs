use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::manager::RefreshPolicy;
use crate::models::{Booking, LockStatus, SeatKey, SeatLock};
use crate::repository::{AcquireOutcome, AcquireRequest, CommitOutcome, LockStore, ReleaseOutcome};
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct LockTable {
    locks: HashMap<SeatKey, SeatLock>,
    booked: HashMap<SeatKey, Uuid>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-process lock store. One mutex guards the whole table so that a
/// multi-seat commit observes and mutates every seat in one critical section.
#[derive(Default)]
pub struct MemoryLockStore {
    table: Mutex<LockTable>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> CoreResult<MutexGuard<'_, LockTable>> {
        self.table
            .lock()
            .map_err(|_| CoreError::StoreUnavailable("in-memory lock table poisoned".to_string()))
    }

    /// Number of lock records still stored, live or lapsed
    pub fn stored_locks(&self) -> CoreResult<usize> {
        Ok(self.table()?.locks.len())
    }

    pub fn stored_bookings(&self) -> CoreResult<usize> {
        Ok(self.table()?.bookings.len())
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn acquire(&self, req: AcquireRequest<'_>) -> CoreResult<AcquireOutcome> {
        let mut table = self.table()?;

        if table.booked.contains_key(req.key) {
            return Ok(AcquireOutcome::Booked);
        }

        if let Some(existing) = table.locks.get_mut(req.key) {
            if existing.is_live(req.now) {
                if existing.owner_id != req.owner_id {
                    return Ok(AcquireOutcome::Conflict { held_until: existing.expires_at });
                }
                if req.refresh == RefreshPolicy::Sliding && req.expires_at > existing.expires_at {
                    existing.expires_at = req.expires_at;
                }
                return Ok(AcquireOutcome::Granted { lock: existing.clone(), renewed: true });
            }
        }

        let lock = SeatLock {
            key: req.key.clone(),
            owner_id: req.owner_id.to_string(),
            acquired_at: req.now,
            expires_at: req.expires_at,
            status: LockStatus::Active,
        };
        table.locks.insert(req.key.clone(), lock.clone());
        Ok(AcquireOutcome::Granted { lock, renewed: false })
    }

    async fn release(&self, key: &SeatKey, owner_id: &str, now: DateTime<Utc>) -> CoreResult<ReleaseOutcome> {
        let mut table = self.table()?;

        match table.locks.get(key) {
            Some(lock) if lock.is_live(now) => {
                if lock.owner_id != owner_id {
                    return Ok(ReleaseOutcome::NotOwner);
                }
            }
            _ => return Ok(ReleaseOutcome::NotFound),
        }

        match table.locks.remove(key) {
            Some(mut lock) => {
                lock.status = LockStatus::Released;
                Ok(ReleaseOutcome::Released(lock))
            }
            None => Ok(ReleaseOutcome::NotFound),
        }
    }

    async fn active_locks(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>> {
        let table = self.table()?;
        let mut locks: Vec<SeatLock> = table
            .locks
            .values()
            .filter(|lock| lock.key.in_showing(schedule_id, cinema_room_id) && lock.is_live(now))
            .cloned()
            .collect();
        locks.sort_by(|a, b| a.key.seat_id.cmp(&b.key.seat_id));
        Ok(locks)
    }

    async fn commit_booking(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<CommitOutcome> {
        let mut table = self.table()?;

        let invalid_seats: Vec<String> = booking
            .seat_keys()
            .filter(|key| {
                !table
                    .locks
                    .get(key)
                    .is_some_and(|lock| lock.is_held_by(&booking.owner_id, now))
            })
            .map(|key| key.seat_id)
            .collect();

        if !invalid_seats.is_empty() {
            return Ok(CommitOutcome::Rejected { invalid_seats });
        }

        // Booking first, then the locks it supersedes.
        table.bookings.insert(booking.id, booking.clone());
        for key in booking.seat_keys() {
            table.booked.insert(key.clone(), booking.id);
            table.locks.remove(&key);
        }

        Ok(CommitOutcome::Committed(booking.clone()))
    }

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.table()?.bookings.get(&booking_id).cloned())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatKey>> {
        let mut table = self.table()?;
        let lapsed: Vec<SeatKey> = table
            .locks
            .values()
            .filter(|lock| lock.status == LockStatus::Active && !lock.is_live(now))
            .map(|lock| lock.key.clone())
            .collect();

        for key in &lapsed {
            table.locks.remove(key);
        }
        Ok(lapsed)
    }
}
