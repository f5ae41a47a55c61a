use chrono::{DateTime, Duration, Utc};
use cinelock_shared::SeatLockEvent;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::events::EventBus;
use crate::models::{require_id, SeatKey, SeatLock};
use crate::repository::{AcquireOutcome, AcquireRequest, LockStore, ReleaseOutcome};
use crate::{CoreError, CoreResult};

/// What a same-owner re-acquire does to a live hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Push the expiry forward to `now + hold` (never backwards)
    #[default]
    Sliding,
    /// Keep the expiry set at first acquisition
    Fixed,
}

#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub hold_duration: Duration,
    pub refresh: RefreshPolicy,
}

/// Longest hold a policy accepts, in seconds (one day).
pub const MAX_HOLD_SECONDS: u64 = 24 * 60 * 60;

impl LockPolicy {
    pub fn new(hold_duration: Duration, refresh: RefreshPolicy) -> CoreResult<Self> {
        if hold_duration <= Duration::zero() {
            return Err(CoreError::InvalidRequest("hold duration must be positive".to_string()));
        }
        if hold_duration > Duration::seconds(MAX_HOLD_SECONDS as i64) {
            return Err(CoreError::InvalidRequest(format!(
                "hold duration must not exceed {} seconds",
                MAX_HOLD_SECONDS
            )));
        }
        Ok(Self { hold_duration, refresh })
    }

    /// Build a policy from a configured number of seconds.
    pub fn from_seconds(hold_seconds: u64, refresh: RefreshPolicy) -> CoreResult<Self> {
        if hold_seconds > MAX_HOLD_SECONDS {
            return Err(CoreError::InvalidRequest(format!(
                "hold duration must not exceed {} seconds",
                MAX_HOLD_SECONDS
            )));
        }
        Self::new(Duration::seconds(hold_seconds as i64), refresh)
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(10),
            refresh: RefreshPolicy::Sliding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockResult {
    Granted { expires_at: DateTime<Utc>, renewed: bool },
    /// Someone else holds the seat; nothing changed
    Conflict { held_until: DateTime<Utc> },
    /// The seat has a permanent booking for this showing
    Booked,
}

impl LockResult {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockResult::Granted { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LockResult::Granted { expires_at, .. } => Some(*expires_at),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockResult {
    Released,
    NotOwner,
    NotFound,
}

/// Grants and revokes time-bounded, exclusive holds on seats.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    policy: LockPolicy,
    events: EventBus,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>, policy: LockPolicy, events: EventBus) -> Self {
        Self { store, clock, policy, events }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub async fn lock(&self, key: &SeatKey, owner_id: &str) -> CoreResult<LockResult> {
        key.validate()?;
        require_id("owner_id", owner_id)?;

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.policy.hold_duration)
            .ok_or_else(|| CoreError::InvalidRequest("hold expiry out of range".to_string()))?;
        let outcome = self
            .store
            .acquire(AcquireRequest {
                key,
                owner_id,
                now,
                expires_at,
                refresh: self.policy.refresh,
            })
            .await?;

        match outcome {
            AcquireOutcome::Granted { lock, renewed } => {
                info!(
                    schedule_id = %key.schedule_id,
                    room_id = %key.cinema_room_id,
                    seat_id = %key.seat_id,
                    owner_id,
                    renewed,
                    expires_at = %lock.expires_at,
                    "Seat lock granted"
                );
                self.events.publish(SeatLockEvent::SeatHeld {
                    schedule_id: key.schedule_id.clone(),
                    cinema_room_id: key.cinema_room_id.clone(),
                    seat_id: key.seat_id.clone(),
                    expires_at: lock.expires_at,
                });
                Ok(LockResult::Granted { expires_at: lock.expires_at, renewed })
            }
            AcquireOutcome::Conflict { held_until } => {
                debug!(seat = %key, owner_id, "Seat already held by another customer");
                Ok(LockResult::Conflict { held_until })
            }
            AcquireOutcome::Booked => {
                debug!(seat = %key, owner_id, "Seat already booked");
                Ok(LockResult::Booked)
            }
        }
    }

    /// Idempotent: releasing a seat you no longer hold is a no-op.
    pub async fn unlock(&self, key: &SeatKey, owner_id: &str) -> CoreResult<UnlockResult> {
        key.validate()?;
        require_id("owner_id", owner_id)?;

        match self.store.release(key, owner_id, self.clock.now()).await? {
            ReleaseOutcome::Released(_) => {
                info!(seat = %key, owner_id, "Seat lock released");
                self.events.publish(SeatLockEvent::SeatReleased {
                    schedule_id: key.schedule_id.clone(),
                    cinema_room_id: key.cinema_room_id.clone(),
                    seat_id: key.seat_id.clone(),
                });
                Ok(UnlockResult::Released)
            }
            ReleaseOutcome::NotOwner => Ok(UnlockResult::NotOwner),
            ReleaseOutcome::NotFound => Ok(UnlockResult::NotFound),
        }
    }

    /// Seats of a showing currently held by anyone, with their expiry.
    pub async fn list_active_locks(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
    ) -> CoreResult<Vec<(String, DateTime<Utc>)>> {
        require_id("schedule_id", schedule_id)?;
        require_id("cinema_room_id", cinema_room_id)?;

        let locks = self
            .store
            .active_locks(schedule_id, cinema_room_id, self.clock.now())
            .await?;
        Ok(locks
            .into_iter()
            .map(|lock| (lock.key.seat_id, lock.expires_at))
            .collect())
    }

    /// The caller's own live holds for a showing.
    pub async fn holds_of(
        &self,
        schedule_id: &str,
        cinema_room_id: &str,
        owner_id: &str,
    ) -> CoreResult<Vec<SeatLock>> {
        require_id("schedule_id", schedule_id)?;
        require_id("cinema_room_id", cinema_room_id)?;
        require_id("owner_id", owner_id)?;
        let locks = self
            .store
            .active_locks(schedule_id, cinema_room_id, self.clock.now())
            .await?;
        Ok(locks.into_iter().filter(|lock| lock.owner_id == owner_id).collect())
    }
}
