use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension,
    Json,
    Router,
};
use cinelock_core::{LockResult, SeatKey, UnlockResult};
use cinelock_shared::models::wire::{
    ActiveLockView, ConflictReason, SeatLockRequest, SeatLockResponse, SeatUnlockResponse, UnlockOutcome,
};
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

use crate::{error::AppError, middleware::CustomerClaims, state::AppState};

// ============================================================================
// Routes
// ============================================================================

/// Seat map reads, open to anonymous visitors.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules/{schedule_id}/rooms/{room_id}/locks", get(list_active_locks))
        .route("/v1/schedules/{schedule_id}/rooms/{room_id}/stream", get(stream_showing))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/locks", post(lock_seat).delete(unlock_seat))
        .route("/v1/locks/mine", get(my_holds))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/locks
/// Hold a seat for the caller while they check out
pub async fn lock_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<SeatLockRequest>,
) -> Result<(StatusCode, Json<SeatLockResponse>), AppError> {
    let key = SeatKey::new(req.schedule_id, req.cinema_room_id, req.seat_id);
    let result = state.lock_manager.lock(&key, &claims.sub).await?;

    let (status, expires_at, reason) = match result {
        LockResult::Granted { expires_at, .. } => (StatusCode::OK, Some(expires_at), None),
        LockResult::Conflict { .. } => (StatusCode::CONFLICT, None, Some(ConflictReason::Conflict)),
        LockResult::Booked => (StatusCode::CONFLICT, None, Some(ConflictReason::Booked)),
    };

    Ok((
        status,
        Json(SeatLockResponse {
            granted: status == StatusCode::OK,
            seat_id: key.seat_id,
            expires_at,
            reason,
        }),
    ))
}

/// DELETE /v1/locks
/// Release a held seat. Releasing a seat you do not hold is not an error.
pub async fn unlock_seat(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<SeatLockRequest>,
) -> Result<Json<SeatUnlockResponse>, AppError> {
    let key = SeatKey::new(req.schedule_id, req.cinema_room_id, req.seat_id);
    let outcome = match state.lock_manager.unlock(&key, &claims.sub).await? {
        UnlockResult::Released => UnlockOutcome::Released,
        UnlockResult::NotOwner => UnlockOutcome::NotOwner,
        UnlockResult::NotFound => UnlockOutcome::NotFound,
    };

    Ok(Json(SeatUnlockResponse {
        released: outcome == UnlockOutcome::Released,
        outcome,
    }))
}

/// GET /v1/schedules/{schedule_id}/rooms/{room_id}/locks
/// Seats currently held by anyone, for greying out the seat map
pub async fn list_active_locks(
    State(state): State<AppState>,
    Path((schedule_id, room_id)): Path<(String, String)>,
) -> Result<Json<Vec<ActiveLockView>>, AppError> {
    let locks = state.lock_manager.list_active_locks(&schedule_id, &room_id).await?;
    Ok(Json(
        locks
            .into_iter()
            .map(|(seat_id, expires_at)| ActiveLockView { seat_id, expires_at })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowingQuery {
    pub schedule_id: String,
    pub cinema_room_id: String,
}

/// GET /v1/locks/mine?scheduleId=..&cinemaRoomId=..
/// The caller's own holds, so the countdown survives a page reload
pub async fn my_holds(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Query(query): Query<ShowingQuery>,
) -> Result<Json<Vec<ActiveLockView>>, AppError> {
    let holds = state
        .lock_manager
        .holds_of(&query.schedule_id, &query.cinema_room_id, &claims.sub)
        .await?;
    Ok(Json(
        holds
            .into_iter()
            .map(|lock| ActiveLockView { seat_id: lock.key.seat_id, expires_at: lock.expires_at })
            .collect(),
    ))
}

/// GET /v1/schedules/{schedule_id}/rooms/{room_id}/stream
/// Server-sent seat map updates for one showing
pub async fn stream_showing(
    State(state): State<AppState>,
    Path((schedule_id, room_id)): Path<(String, String)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) if event.is_for(&schedule_id, &room_id) => Event::default()
                .event(event.name())
                .json_data(&event)
                .ok(),
            // Lagged receivers just miss updates; the UI re-lists on reconnect.
            _ => None,
        };
        async move { event.map(Ok::<_, Infallible>) }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
