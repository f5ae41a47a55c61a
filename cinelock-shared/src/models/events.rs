use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Seat map change, pushed to every viewer of a showing.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatLockEvent {
    SeatHeld {
        schedule_id: String,
        cinema_room_id: String,
        seat_id: String,
        expires_at: DateTime<Utc>,
    },
    SeatReleased {
        schedule_id: String,
        cinema_room_id: String,
        seat_id: String,
    },
    SeatExpired {
        schedule_id: String,
        cinema_room_id: String,
        seat_id: String,
    },
    SeatBooked {
        schedule_id: String,
        cinema_room_id: String,
        seat_id: String,
        booking_id: Uuid,
    },
}

impl SeatLockEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SeatLockEvent::SeatHeld { .. } => "seat_held",
            SeatLockEvent::SeatReleased { .. } => "seat_released",
            SeatLockEvent::SeatExpired { .. } => "seat_expired",
            SeatLockEvent::SeatBooked { .. } => "seat_booked",
        }
    }

    pub fn showing(&self) -> (&str, &str) {
        match self {
            SeatLockEvent::SeatHeld { schedule_id, cinema_room_id, .. }
            | SeatLockEvent::SeatReleased { schedule_id, cinema_room_id, .. }
            | SeatLockEvent::SeatExpired { schedule_id, cinema_room_id, .. }
            | SeatLockEvent::SeatBooked { schedule_id, cinema_room_id, .. } => {
                (schedule_id.as_str(), cinema_room_id.as_str())
            }
        }
    }

    pub fn is_for(&self, schedule_id: &str, cinema_room_id: &str) -> bool {
        self.showing() == (schedule_id, cinema_room_id)
    }
}
