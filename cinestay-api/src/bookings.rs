use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use cinestay_booking::CheckoutRequest;
use cinestay_core::booking::Booking;
use cinestay_core::lock::UnlockReceipt;
use cinestay_shared::ApiResponse;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/{code}", get(get_booking))
        .route("/api/bookings/{code}/unlock", post(unlock_room))
}

/// POST /api/bookings
/// Customer checkout. The booking stays pending until the payment IPN arrives.
async fn create_booking(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Booking>>)> {
    let booking = state.booking_service.checkout(req, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(booking, "Booking created, awaiting payment")),
    ))
}

/// GET /api/bookings/{code}
async fn get_booking(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    let booking = state.booking_service.get_by_code(&code).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// POST /api/bookings/{code}/unlock
async fn unlock_room(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<UnlockReceipt>>> {
    let receipt = state.room_access.unlock_for_booking(&code, Utc::now()).await?;
    Ok(Json(ApiResponse::ok_with_message(receipt, "Room unlocked")))
}
