use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use uuid::Uuid;
use cinestay_catalog::{booked_slots, day_window, BookedSlot};
use cinestay_core::catalog::MenuCategory;
use cinestay_core::CoreError;
use cinestay_shared::ApiResponse;
use cinestay_store::TtlCache;

use crate::error::{ApiResult, AppError};
use crate::extract::{ApiPath, ApiQuery};
use crate::state::AppState;

// Cache key prefixes; admin writes invalidate by prefix.
pub const BRANCHES_PREFIX: &str = "branches:";
pub const ROOMS_PREFIX: &str = "rooms:";
pub const ROOM_TYPES_PREFIX: &str = "room_types:";
pub const COMBOS_PREFIX: &str = "combos:";
pub const MENU_PREFIX: &str = "menu:";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/branches", get(list_branches))
        .route("/api/branches/{id}/rooms", get(list_branch_rooms))
        .route("/api/room-types", get(list_room_types))
        .route("/api/room-types/{id}", get(get_room_type))
        .route("/api/rooms/{id}/availability", get(room_availability))
        .route("/api/combos", get(list_combos))
        .route("/api/menu-items", get(list_menu_items))
}

/// Serve `key` from the response cache, loading and storing it on a miss.
async fn cached<T, F, Fut>(cache: &TtlCache, key: String, load: F) -> ApiResult<Value>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    if let Some(hit) = cache.get(&key) {
        tracing::debug!(cache_key = %key, "Catalog cache hit");
        return Ok(hit);
    }

    let value = serde_json::to_value(load().await?)?;
    cache.set(key, value.clone());
    Ok(value)
}

/// GET /api/branches
async fn list_branches(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Value>>> {
    let key = format!("{}active", BRANCHES_PREFIX);
    let rooms = state.repos.rooms.clone();
    let data = cached(&state.cache, key, || async move {
        Ok::<_, AppError>(rooms.list_branches(true).await.map_err(CoreError::from)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/branches/{id}/rooms
async fn list_branch_rooms(
    State(state): State<AppState>,
    ApiPath(branch_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let key = format!("{}branch:{}", ROOMS_PREFIX, branch_id);
    let rooms = state.repos.rooms.clone();
    let data = cached(&state.cache, key, || async move {
        if rooms.get_branch(branch_id).await.map_err(CoreError::from)?.is_none() {
            return Err(AppError::NotFound("Branch not found".to_string()));
        }
        Ok::<_, AppError>(rooms.list_rooms(Some(branch_id), true).await.map_err(CoreError::from)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/room-types
async fn list_room_types(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Value>>> {
    let key = format!("{}active", ROOM_TYPES_PREFIX);
    let rooms = state.repos.rooms.clone();
    let data = cached(&state.cache, key, || async move {
        Ok::<_, AppError>(rooms.list_room_types(true).await.map_err(CoreError::from)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}

/// GET /api/room-types/{id}
async fn get_room_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let key = format!("{}{}", ROOM_TYPES_PREFIX, id);
    let rooms = state.repos.rooms.clone();
    let data = cached(&state.cache, key, || async move {
        rooms
            .get_room_type(id)
            .await
            .map_err(CoreError::from)?
            .filter(|room_type| room_type.is_active)
            .ok_or_else(|| AppError::NotFound("Room type not found".to_string()))
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub room_id: Uuid,
    pub date: String,
    pub booked: Vec<BookedSlot>,
}

/// GET /api/rooms/{id}/availability?date=YYYY-MM-DD
///
/// Not cached: it changes with every checkout.
async fn room_availability(
    State(state): State<AppState>,
    ApiPath(room_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> ApiResult<Json<ApiResponse<AvailabilityResponse>>> {
    let date = query
        .date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Query parameter 'date' is required".to_string()))?;

    if state.repos.rooms.get_room(room_id).await.map_err(CoreError::from)?.is_none() {
        return Err(AppError::NotFound("Room not found".to_string()));
    }

    let (from, to) = day_window(date.trim(), state.settings.utc_offset()).map_err(CoreError::from)?;
    let bookings = state.repos.bookings.list_room_bookings(room_id, from, to).await.map_err(CoreError::from)?;

    Ok(Json(ApiResponse::ok(AvailabilityResponse {
        room_id,
        date: date.trim().to_string(),
        booked: booked_slots(&bookings, from, to),
    })))
}

/// GET /api/combos
async fn list_combos(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Value>>> {
    let key = format!("{}active", COMBOS_PREFIX);
    let combos = state.repos.combos.clone();
    let data = cached(&state.cache, key, || async move {
        Ok::<_, AppError>(combos.list_combos(true).await.map_err(CoreError::from)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}

#[derive(Debug, Deserialize)]
pub struct MenuQuery {
    pub category: Option<String>,
}

/// GET /api/menu-items?category=drink
async fn list_menu_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MenuQuery>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(raw.parse::<MenuCategory>()?),
        None => None,
    };

    let key = format!("{}{}", MENU_PREFIX, category.map(|c| c.as_str()).unwrap_or("all"));
    let menu = state.repos.menu.clone();
    let data = cached(&state.cache, key, || async move {
        Ok::<_, AppError>(menu.list_menu_items(category, true).await.map_err(CoreError::from)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(data)))
}
