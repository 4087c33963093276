use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use cinestay_catalog::product::normalize_code;
use cinestay_catalog::{day_window, BranchInput, ComboInput, MenuItemInput, RoomInput, RoomTypeInput};
use cinestay_core::booking::{Booking, BookingStatus, PaymentStatus};
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::repository::{BookingFilter, ComboRepository};
use cinestay_core::CoreError;
use cinestay_shared::ApiResponse;

use crate::catalog::{BRANCHES_PREFIX, COMBOS_PREFIX, MENU_PREFIX, ROOMS_PREFIX, ROOM_TYPES_PREFIX};
use crate::error::{ApiResult, AppError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/combos", get(list_combos).post(create_combo))
        .route("/api/admin/combos/{id}", put(update_combo).delete(delete_combo))
        .route("/api/admin/menu-items", get(list_menu_items).post(create_menu_item))
        .route("/api/admin/menu-items/{id}", put(update_menu_item).delete(delete_menu_item))
        .route("/api/admin/room-types", get(list_room_types).post(create_room_type))
        .route("/api/admin/room-types/{id}", put(update_room_type))
        .route("/api/admin/branches", get(list_branches).post(create_branch))
        .route("/api/admin/rooms", get(list_rooms).post(create_room))
        .route("/api/admin/bookings", get(list_bookings))
        .route("/api/admin/bookings/{id}", get(get_booking))
        .route("/api/admin/bookings/{id}/status", patch(update_booking_status))
}

// ============================================================================
// Combo packages
// ============================================================================

/// GET /api/admin/combos
async fn list_combos(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<ComboPackage>>>> {
    let combos = state.repos.combos.list_combos(false).await.map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(combos)))
}

async fn ensure_code_free(combos: &dyn ComboRepository, code: &str, except: Option<Uuid>) -> ApiResult<()> {
    let existing = combos
        .find_combo_by_code(&normalize_code(code))
        .await
        .map_err(CoreError::from)?;
    match existing {
        Some(other) if Some(other.id) != except => Err(AppError::ValidationError(format!(
            "Combo code '{}' already exists",
            other.code
        ))),
        _ => Ok(()),
    }
}

/// Store a new combo. A concurrent create can claim the code between the
/// uniqueness check and the insert; that loser gets the duplicate-code error.
async fn insert_unique_combo(combos: &dyn ComboRepository, combo: &ComboPackage) -> ApiResult<()> {
    if let Err(err) = combos.insert_combo(combo).await {
        ensure_code_free(combos, &combo.code, Some(combo.id)).await?;
        return Err(CoreError::from(err).into());
    }
    Ok(())
}

/// Same as [`insert_unique_combo`] for a code change. `false` when the combo is gone.
async fn update_unique_combo(combos: &dyn ComboRepository, combo: &ComboPackage) -> ApiResult<bool> {
    match combos.update_combo(combo).await {
        Ok(updated) => Ok(updated),
        Err(err) => {
            ensure_code_free(combos, &combo.code, Some(combo.id)).await?;
            Err(CoreError::from(err).into())
        }
    }
}

/// POST /api/admin/combos
async fn create_combo(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ComboInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ComboPackage>>)> {
    let combo = input.into_combo(Utc::now()).map_err(CoreError::from)?;
    ensure_code_free(state.repos.combos.as_ref(), &combo.code, None).await?;

    insert_unique_combo(state.repos.combos.as_ref(), &combo).await?;
    state.cache.invalidate_prefix(COMBOS_PREFIX);

    tracing::info!(combo_code = %combo.code, "Combo package created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(combo, "Combo package created")),
    ))
}

/// PUT /api/admin/combos/{id}
async fn update_combo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ComboInput>,
) -> ApiResult<Json<ApiResponse<ComboPackage>>> {
    let existing = state
        .repos
        .combos
        .get_combo(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| AppError::NotFound("Combo package not found".to_string()))?;

    let combo = input.apply_to(&existing, Utc::now()).map_err(CoreError::from)?;
    if combo.code != existing.code {
        ensure_code_free(state.repos.combos.as_ref(), &combo.code, Some(id)).await?;
    }

    if !update_unique_combo(state.repos.combos.as_ref(), &combo).await? {
        return Err(AppError::NotFound("Combo package not found".to_string()));
    }
    state.cache.invalidate_prefix(COMBOS_PREFIX);

    Ok(Json(ApiResponse::ok_with_message(combo, "Combo package updated")))
}

/// DELETE /api/admin/combos/{id}
async fn delete_combo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.repos.combos.delete_combo(id).await.map_err(CoreError::from)? {
        return Err(AppError::NotFound("Combo package not found".to_string()));
    }
    state.cache.invalidate_prefix(COMBOS_PREFIX);

    tracing::info!(combo_id = %id, "Combo package deleted");
    Ok(Json(ApiResponse::message("Combo package deleted")))
}

// ============================================================================
// Menu items
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct MenuFilter {
    pub category: Option<String>,
}

/// GET /api/admin/menu-items?category=
async fn list_menu_items(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<MenuFilter>,
) -> ApiResult<Json<ApiResponse<Vec<MenuItem>>>> {
    let category = match filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(raw.parse::<MenuCategory>()?),
        None => None,
    };
    let items = state
        .repos
        .menu
        .list_menu_items(category, false)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(items)))
}

/// POST /api/admin/menu-items
async fn create_menu_item(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<MenuItemInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<MenuItem>>)> {
    let item = input.into_menu_item(Utc::now()).map_err(CoreError::from)?;
    state.repos.menu.insert_menu_item(&item).await.map_err(CoreError::from)?;
    state.cache.invalidate_prefix(MENU_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(item, "Menu item created")),
    ))
}

/// PUT /api/admin/menu-items/{id}
async fn update_menu_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<MenuItemInput>,
) -> ApiResult<Json<ApiResponse<MenuItem>>> {
    let existing = state
        .repos
        .menu
        .get_menu_item(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| AppError::NotFound("Menu item not found".to_string()))?;

    let item = input.apply_to(&existing, Utc::now()).map_err(CoreError::from)?;
    if !state.repos.menu.update_menu_item(&item).await.map_err(CoreError::from)? {
        return Err(AppError::NotFound("Menu item not found".to_string()));
    }
    state.cache.invalidate_prefix(MENU_PREFIX);

    Ok(Json(ApiResponse::ok_with_message(item, "Menu item updated")))
}

/// DELETE /api/admin/menu-items/{id}
async fn delete_menu_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !state.repos.menu.delete_menu_item(id).await.map_err(CoreError::from)? {
        return Err(AppError::NotFound("Menu item not found".to_string()));
    }
    state.cache.invalidate_prefix(MENU_PREFIX);
    Ok(Json(ApiResponse::message("Menu item deleted")))
}

// ============================================================================
// Room types, branches and rooms
// ============================================================================

/// GET /api/admin/room-types
async fn list_room_types(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<RoomType>>>> {
    let room_types = state.repos.rooms.list_room_types(false).await.map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(room_types)))
}

/// POST /api/admin/room-types
async fn create_room_type(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RoomTypeInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<RoomType>>)> {
    let room_type = input.into_room_type().map_err(CoreError::from)?;
    state.repos.rooms.insert_room_type(&room_type).await.map_err(CoreError::from)?;
    state.cache.invalidate_prefix(ROOM_TYPES_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(room_type, "Room type created")),
    ))
}

/// PUT /api/admin/room-types/{id}
async fn update_room_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<RoomTypeInput>,
) -> ApiResult<Json<ApiResponse<RoomType>>> {
    let existing = state
        .repos
        .rooms
        .get_room_type(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| AppError::NotFound("Room type not found".to_string()))?;

    let room_type = input.apply_to(&existing).map_err(CoreError::from)?;
    if !state.repos.rooms.update_room_type(&room_type).await.map_err(CoreError::from)? {
        return Err(AppError::NotFound("Room type not found".to_string()));
    }
    state.cache.invalidate_prefix(ROOM_TYPES_PREFIX);

    Ok(Json(ApiResponse::ok_with_message(room_type, "Room type updated")))
}

/// GET /api/admin/branches
async fn list_branches(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<Vec<Branch>>>> {
    let branches = state.repos.rooms.list_branches(false).await.map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(branches)))
}

/// POST /api/admin/branches
async fn create_branch(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BranchInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Branch>>)> {
    let branch = input.into_branch().map_err(CoreError::from)?;
    state.repos.rooms.insert_branch(&branch).await.map_err(CoreError::from)?;
    state.cache.invalidate_prefix(BRANCHES_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(branch, "Branch created")),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RoomFilter {
    #[serde(alias = "branchId")]
    pub branch_id: Option<Uuid>,
}

/// GET /api/admin/rooms?branch_id=
async fn list_rooms(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<RoomFilter>,
) -> ApiResult<Json<ApiResponse<Vec<Room>>>> {
    let rooms = state
        .repos
        .rooms
        .list_rooms(filter.branch_id, false)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(rooms)))
}

/// POST /api/admin/rooms
async fn create_room(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RoomInput>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Room>>)> {
    let room = input.into_room().map_err(CoreError::from)?;

    if state.repos.rooms.get_branch(room.branch_id).await.map_err(CoreError::from)?.is_none() {
        return Err(AppError::ValidationError(format!("Branch {} does not exist", room.branch_id)));
    }
    if state
        .repos
        .rooms
        .get_room_type(room.room_type_id)
        .await
        .map_err(CoreError::from)?
        .is_none()
    {
        return Err(AppError::ValidationError(format!(
            "Room type {} does not exist",
            room.room_type_id
        )));
    }

    state.repos.rooms.insert_room(&room).await.map_err(CoreError::from)?;
    state.cache.invalidate_prefix(ROOMS_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(room, "Room created")),
    ))
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
    #[serde(alias = "paymentStatus")]
    pub payment_status: Option<String>,
    #[serde(alias = "roomId")]
    pub room_id: Option<Uuid>,
    /// Local calendar day of the booking start, `YYYY-MM-DD`.
    pub date: Option<String>,
    pub limit: Option<i64>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// GET /api/admin/bookings?status=&payment_status=&room_id=&date=
async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BookingListQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Booking>>>> {
    let mut filter = BookingFilter {
        room_id: query.room_id,
        limit: Some(query.limit.unwrap_or(200).clamp(1, 1000)),
        ..Default::default()
    };
    if let Some(status) = non_blank(&query.status) {
        filter.status = Some(status.parse::<BookingStatus>()?);
    }
    if let Some(payment_status) = non_blank(&query.payment_status) {
        filter.payment_status = Some(payment_status.parse::<PaymentStatus>()?);
    }
    if let Some(date) = non_blank(&query.date) {
        filter.starts_between = Some(day_window(date, state.settings.utc_offset()).map_err(CoreError::from)?);
    }

    let bookings = state.repos.bookings.list_bookings(&filter).await.map_err(CoreError::from)?;
    Ok(Json(ApiResponse::ok(bookings)))
}

/// GET /api/admin/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    let booking = state.booking_service.get(id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
}

/// PATCH /api/admin/bookings/{id}/status
async fn update_booking_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusUpdateRequest>,
) -> ApiResult<Json<ApiResponse<Booking>>> {
    let target = non_blank(&req.status)
        .ok_or_else(|| AppError::ValidationError("Missing required fields: status".to_string()))?
        .parse::<BookingStatus>()?;

    let booking = state
        .booking_service
        .update_status(id, target, req.reason, Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok_with_message(booking, "Booking status updated")))
}
