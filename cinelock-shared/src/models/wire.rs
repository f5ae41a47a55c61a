//! Request/response shapes seen by the seat-selection UI and the checkout flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLockRequest {
    pub schedule_id: String,
    pub cinema_room_id: String,
    pub seat_id: String,
}

/// Why a lock was not granted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConflictReason {
    /// Another customer holds the seat right now
    Conflict,
    /// The seat is permanently booked for this showing
    Booked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatLockResponse {
    pub granted: bool,
    pub seat_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConflictReason>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockOutcome {
    Released,
    NotOwner,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatUnlockResponse {
    pub released: bool,
    pub outcome: UnlockOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLockView {
    pub seat_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub schedule_id: String,
    pub cinema_room_id: String,
    pub seat_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_seats: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub schedule_id: String,
    pub cinema_room_id: String,
    pub owner_id: String,
    pub seat_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_response_omits_expiry() {
        let response = SeatLockResponse {
            granted: false,
            seat_id: "A5".to_string(),
            expires_at: None,
            reason: Some(ConflictReason::Conflict),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["granted"], false);
        assert_eq!(json["reason"], "Conflict");
        assert!(json.get("expiresAt").is_none());
    }

    #[test]
    fn test_finalize_request_uses_camel_case() {
        let req: FinalizeRequest = serde_json::from_str(
            r#"{"scheduleId":"S1","cinemaRoomId":"R1","seatIds":["A1","A2"]}"#,
        )
        .unwrap();
        assert_eq!(req.seat_ids, vec!["A1", "A2"]);
    }
}
