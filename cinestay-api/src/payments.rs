use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use uuid::Uuid;
use cinestay_core::booking::{Booking, BookingStatus, PaymentStatus};
use cinestay_core::payment::PaymentLink;
use cinestay_shared::ApiResponse;

use crate::error::{ApiResult, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/payment/create", post(create_payment))
        .route("/api/payment/status/{booking_id}", get(payment_status))
        .route("/api/payment/stream/{booking_id}", get(payment_stream))
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    #[serde(alias = "bookingCode")]
    pub booking_code: Option<String>,
}

/// POST /api/payment/create
/// Issue a Pay2S payment link for a booking that is still awaiting payment.
async fn create_payment(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> ApiResult<Json<ApiResponse<PaymentLink>>> {
    let code = req
        .booking_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing required fields: booking_code".to_string()))?;

    let booking = state.booking_service.get_by_code(code).await?;
    let now = Utc::now();
    if !booking.is_payable(now) {
        let reason = if booking.status == BookingStatus::Pending && booking.expires_at <= now {
            "its payment window has expired".to_string()
        } else {
            format!("it is {} / {}", booking.status, booking.payment_status)
        };
        return Err(AppError::ValidationError(format!(
            "Booking {} cannot be paid: {}",
            booking.code, reason
        )));
    }

    let link = state
        .gateway
        .create_payment_link(&booking)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    tracing::info!(booking_code = %booking.code, request_id = %link.request_id, "Payment link issued");
    Ok(Json(ApiResponse::ok(link)))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub booking_id: Uuid,
    pub code: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub total_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Booking> for PaymentStatusResponse {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            code: booking.code.clone(),
            status: booking.status,
            payment_status: booking.payment_status,
            payment_transaction_id: booking.payment_transaction_id.clone(),
            total_amount: booking.total_amount,
            expires_at: booking.expires_at,
            paid_at: booking.paid_at,
        }
    }
}

/// GET /api/payment/status/{booking_id}
async fn payment_status(
    State(state): State<AppState>,
    ApiPath(booking_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<PaymentStatusResponse>>> {
    let booking = state.booking_service.get(booking_id).await?;
    Ok(Json(ApiResponse::ok(PaymentStatusResponse::from(&booking))))
}

/// GET /api/payment/stream/{booking_id}
/// Server-sent events: the current status first, then every payment event of the booking.
async fn payment_stream(
    State(state): State<AppState>,
    ApiPath(booking_id): ApiPath<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before reading so nothing published in between is missed
    let rx = state.sse_tx.subscribe();
    let booking = state.booking_service.get(booking_id).await?;
    let snapshot = Event::default()
        .event("status")
        .json_data(PaymentStatusResponse::from(&booking))?;

    let updates = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) if event.booking_id == booking_id => Event::default()
                .event("payment")
                .json_data(&event)
                .ok(),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(booking_id = %booking_id, skipped, "Payment stream subscriber lagged");
                None
            }
        };
        futures_util::future::ready(event)
    });

    let stream = stream::once(futures_util::future::ready(snapshot))
        .chain(updates)
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
