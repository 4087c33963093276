use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde_json::Value;
use cinestay_booking::ReconcileOutcome;
use cinestay_pay2s::IpnPayload;
use cinestay_shared::ApiResponse;

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/payment/ipn", post(handle_pay2s_ipn))
}

/// POST /api/payment/ipn
/// Pay2S instant payment notification. Nothing is persisted before the
/// signature checks out; redeliveries of a processed transaction answer
/// `duplicate` without touching the booking.
async fn handle_pay2s_ipn(
    State(state): State<AppState>,
    ApiJson(raw): ApiJson<Value>,
) -> ApiResult<Json<ApiResponse<ReconcileOutcome>>> {
    let payload = IpnPayload::from_value(&raw)?;

    if let Err(err) = state.verifier.verify(&payload) {
        tracing::warn!(order_id = %payload.order_id, trans_id = %payload.trans_id, "Rejected IPN: {}", err);
        return Err(err.into());
    }

    let notification = payload.into_notification(raw)?;
    tracing::info!(
        order_id = %notification.order_id,
        trans_id = %notification.transaction_id,
        result_code = notification.result_code,
        "Received Pay2S IPN"
    );

    let outcome = state.reconciler.reconcile(&notification, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}
