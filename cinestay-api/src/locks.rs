use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use cinestay_core::lock::{TokenStatus, UnlockReceipt};
use cinestay_shared::ApiResponse;

use crate::error::{ApiResult, AppError};
use crate::extract::ApiPath;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/locks/token", get(token_status))
        .route("/api/admin/locks/{lock_id}/unlock", post(unlock_lock))
}

/// GET /api/admin/locks/token
/// Token health only; the token itself never leaves the server.
async fn token_status(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<TokenStatus>>> {
    let status = state
        .lock
        .token_status()
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;
    Ok(Json(ApiResponse::ok(status)))
}

/// POST /api/admin/locks/{lock_id}/unlock
/// Manual test unlock from the admin console.
async fn unlock_lock(
    State(state): State<AppState>,
    ApiPath(lock_id): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<UnlockReceipt>>> {
    let receipt = state.room_access.unlock_lock(lock_id.trim()).await?;
    tracing::info!(lock_id = %receipt.lock_id, "Lock opened from admin console");
    Ok(Json(ApiResponse::ok_with_message(receipt, "Lock opened")))
}
