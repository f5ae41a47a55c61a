use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::{CoreError, CoreResult};

/// Identifies one physical seat for one showing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatKey {
    pub schedule_id: String,
    pub cinema_room_id: String,
    pub seat_id: String,
}

impl SeatKey {
    pub fn new(
        schedule_id: impl Into<String>,
        cinema_room_id: impl Into<String>,
        seat_id: impl Into<String>,
    ) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            cinema_room_id: cinema_room_id.into(),
            seat_id: seat_id.into(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        require_id("schedule_id", &self.schedule_id)?;
        require_id("cinema_room_id", &self.cinema_room_id)?;
        require_id("seat_id", &self.seat_id)
    }

    pub fn in_showing(&self, schedule_id: &str, cinema_room_id: &str) -> bool {
        self.schedule_id == schedule_id && self.cinema_room_id == cinema_room_id
    }
}

impl fmt::Display for SeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.schedule_id, self.cinema_room_id, self.seat_id)
    }
}

pub(crate) fn require_id(field: &str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidRequest(format!("{} must not be blank", field)));
    }
    Ok(())
}

/// Lock lifecycle. Only `Active` locks can block other customers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Active,
    Released,
    Expired,
    Consumed,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Active => "ACTIVE",
            LockStatus::Released => "RELEASED",
            LockStatus::Expired => "EXPIRED",
            LockStatus::Consumed => "CONSUMED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ACTIVE" => Some(LockStatus::Active),
            "RELEASED" => Some(LockStatus::Released),
            "EXPIRED" => Some(LockStatus::Expired),
            "CONSUMED" => Some(LockStatus::Consumed),
            _ => None,
        }
    }
}

/// A temporary hold on one seat by one customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatLock {
    pub key: SeatKey,
    pub owner_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: LockStatus,
}

impl SeatLock {
    pub fn new(key: SeatKey, owner_id: String, now: DateTime<Utc>, hold: Duration) -> Self {
        Self {
            key,
            owner_id,
            acquired_at: now,
            expires_at: now + hold,
            status: LockStatus::Active,
        }
    }

    /// A lock stops counting the instant its expiry is reached, whatever
    /// status the store still records for it.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == LockStatus::Active && now < self.expires_at
    }

    pub fn is_held_by(&self, owner_id: &str, now: DateTime<Utc>) -> bool {
        self.is_live(now) && self.owner_id == owner_id
    }
}

/// Permanent booking created by a successful finalize
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub schedule_id: String,
    pub cinema_room_id: String,
    pub owner_id: String,
    pub seat_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        schedule_id: String,
        cinema_room_id: String,
        owner_id: String,
        seat_ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            schedule_id,
            cinema_room_id,
            owner_id,
            seat_ids,
            created_at: now,
        }
    }

    pub fn seat_keys(&self) -> impl Iterator<Item = SeatKey> + '_ {
        self.seat_ids
            .iter()
            .map(|seat| SeatKey::new(&self.schedule_id, &self.cinema_room_id, seat))
    }
}
