use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension,
    Json,
    Router,
};
use cinelock_core::FinalizeResult;
use cinelock_shared::models::wire::{BookingResponse, FinalizeRequest, FinalizeResponse};
use uuid::Uuid;

use crate::{error::AppError, middleware::CustomerClaims, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/finalize", post(finalize_booking))
        .route("/v1/bookings/{booking_id}", get(get_booking))
}

/// POST /v1/bookings/finalize
/// Called by checkout once the payment provider has confirmed the charge.
/// A 409 means the customer must go back to seat selection.
pub async fn finalize_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<FinalizeRequest>,
) -> Result<(StatusCode, Json<FinalizeResponse>), AppError> {
    let result = state
        .finalizer
        .finalize(&req.schedule_id, &req.cinema_room_id, &req.seat_ids, &claims.sub)
        .await?;

    match result {
        FinalizeResult::Booked(booking) => Ok((
            StatusCode::OK,
            Json(FinalizeResponse {
                success: true,
                booking_id: Some(booking.id),
                seat_ids: Some(booking.seat_ids),
                invalid_seats: None,
            }),
        )),
        FinalizeResult::LockInvalid { invalid_seats } => Ok((
            StatusCode::CONFLICT,
            Json(FinalizeResponse {
                success: false,
                booking_id: None,
                seat_ids: None,
                invalid_seats: Some(invalid_seats),
            }),
        )),
    }
}

/// GET /v1/bookings/{booking_id}
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state
        .finalizer
        .get_booking(booking_id)
        .await?
        // Someone else's booking looks exactly like a missing one.
        .filter(|b| b.owner_id == claims.sub)
        .ok_or_else(|| AppError::NotFoundError(format!("Booking {} not found", booking_id)))?;

    Ok(Json(BookingResponse {
        booking_id: booking.id,
        schedule_id: booking.schedule_id,
        cinema_room_id: booking.cinema_room_id,
        owner_id: booking.owner_id,
        seat_ids: booking.seat_ids,
        created_at: booking.created_at,
    }))
}
