use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::manager::RefreshPolicy;
use crate::models::{Booking, SeatKey, SeatLock};
use crate::CoreResult;

/// Atomic acquire request. `expires_at` is the expiry a fresh hold gets.
#[derive(Debug, Clone)]
pub struct AcquireRequest<'a> {
    pub key: &'a SeatKey,
    pub owner_id: &'a str,
    pub now: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh: RefreshPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// `renewed` is true when the caller already held the seat
    Granted { lock: SeatLock, renewed: bool },
    Conflict { held_until: DateTime<Utc> },
    Booked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released(SeatLock),
    NotOwner,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Booking),
    Rejected { invalid_seats: Vec<String> },
}

/// Storage for seat locks and the bookings that supersede them.
///
/// Every method is a single atomic step against the backing store. Callers
/// never combine a read with a later write to decide ownership; the store
/// makes that decision inside the same critical section, statement or script
/// that performs the mutation.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Insert-if-absent-or-expired. A booked seat is never granted.
    async fn acquire(&self, req: AcquireRequest<'_>) -> CoreResult<AcquireOutcome>;

    /// Release a live lock held by `owner_id`.
    async fn release(
        &self,
        key: &SeatKey,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<ReleaseOutcome>;

    /// Live locks of one showing, ordered by seat id.
    async fn active_locks(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Vec<SeatLock>>;

    /// Verify that `booking.owner_id` holds a live lock on every seat of the
    /// booking, then persist the booking and consume those locks. All or nothing.
    async fn commit_booking(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<CommitOutcome>;

    async fn get_booking(&self, booking_id: Uuid) -> CoreResult<Option<Booking>>;

    /// Mark every lapsed `Active` lock as expired; returns the affected keys.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<SeatKey>>;
}
