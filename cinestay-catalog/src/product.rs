use serde::Deserialize;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::CoreError;

/// Catalog validation errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Invalid category '{0}'. Must be one of: drink, snack, food, extra")]
    InvalidCategory(String),

    #[error("Pricing failed: {0}")]
    PricingFailed(String),
}

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

/// Upper bound for any single catalog price, in VND.
pub const MAX_PRICE: i64 = 1_000_000_000;

fn check_price(field: &'static str, price: i64) -> Result<(), CatalogError> {
    if price > MAX_PRICE {
        return Err(invalid(field, format!("must not exceed {}", MAX_PRICE)));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidField { field, reason: reason.into() }
}

fn require<T>(value: Option<T>, field: &'static str, missing: &mut Vec<&'static str>) -> Option<T> {
    if value.is_none() {
        missing.push(field);
    }
    value
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_missing(missing: Vec<&'static str>) -> Result<(), CatalogError> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CatalogError::MissingFields(missing.join(", ")))
    }
}

/// Combo codes are matched case-insensitively and stored upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// ============================================================================
// Combo packages
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "duration_minutes")]
    pub duration_minutes: Option<i32>,
    pub price: Option<i64>,
    #[serde(alias = "display_order")]
    pub display_order: Option<i32>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl ComboInput {
    /// Normalized code of this input, if any.
    pub fn code(&self) -> Option<String> {
        non_blank(self.code.clone()).map(|c| normalize_code(&c))
    }

    pub fn into_combo(self, now: DateTime<Utc>) -> Result<ComboPackage, CatalogError> {
        let mut missing = Vec::new();
        let name = require(non_blank(self.name), "name", &mut missing);
        let code = require(non_blank(self.code), "code", &mut missing);
        let duration = require(self.duration_minutes, "durationMinutes", &mut missing);
        let price = require(self.price, "price", &mut missing);
        check_missing(missing)?;

        let combo = ComboPackage {
            id: Uuid::new_v4(),
            name: name.unwrap_or_default(),
            code: normalize_code(&code.unwrap_or_default()),
            description: non_blank(self.description),
            duration_minutes: duration.unwrap_or_default(),
            price: price.unwrap_or_default(),
            display_order: self.display_order.unwrap_or(0),
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        validate_combo(&combo)?;
        Ok(combo)
    }

    /// Partial update: absent fields keep their current value.
    pub fn apply_to(self, existing: &ComboPackage, now: DateTime<Utc>) -> Result<ComboPackage, CatalogError> {
        let mut combo = existing.clone();
        if let Some(name) = self.name {
            combo.name = non_blank(Some(name)).ok_or_else(|| invalid("name", "must not be empty"))?;
        }
        if let Some(code) = self.code {
            let code = non_blank(Some(code)).ok_or_else(|| invalid("code", "must not be empty"))?;
            combo.code = normalize_code(&code);
        }
        if self.description.is_some() {
            combo.description = non_blank(self.description);
        }
        if let Some(duration) = self.duration_minutes {
            combo.duration_minutes = duration;
        }
        if let Some(price) = self.price {
            combo.price = price;
        }
        if let Some(order) = self.display_order {
            combo.display_order = order;
        }
        if let Some(active) = self.is_active {
            combo.is_active = active;
        }
        combo.updated_at = now;
        validate_combo(&combo)?;
        Ok(combo)
    }
}

fn validate_combo(combo: &ComboPackage) -> Result<(), CatalogError> {
    if combo.duration_minutes <= 0 {
        return Err(invalid("durationMinutes", "must be greater than 0"));
    }
    if combo.price <= 0 {
        return Err(invalid("price", "must be greater than 0"));
    }
    check_price("price", combo.price)?;
    if !combo.code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(invalid("code", "only letters, digits, '-' and '_' are allowed"));
    }
    Ok(())
}

// ============================================================================
// Menu items
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemInput {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub description: Option<String>,
    #[serde(alias = "is_available")]
    pub is_available: Option<bool>,
}

fn parse_category(raw: &str) -> Result<MenuCategory, CatalogError> {
    raw.parse::<MenuCategory>()
        .map_err(|_| CatalogError::InvalidCategory(raw.to_string()))
}

impl MenuItemInput {
    pub fn into_menu_item(self, now: DateTime<Utc>) -> Result<MenuItem, CatalogError> {
        let mut missing = Vec::new();
        let name = require(non_blank(self.name), "name", &mut missing);
        let category = require(non_blank(self.category), "category", &mut missing);
        let price = require(self.price, "price", &mut missing);
        check_missing(missing)?;

        let item = MenuItem {
            id: Uuid::new_v4(),
            name: name.unwrap_or_default(),
            category: parse_category(&category.unwrap_or_default())?,
            price: price.unwrap_or_default(),
            description: non_blank(self.description),
            is_available: self.is_available.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        validate_menu_item(&item)?;
        Ok(item)
    }

    pub fn apply_to(self, existing: &MenuItem, now: DateTime<Utc>) -> Result<MenuItem, CatalogError> {
        let mut item = existing.clone();
        if let Some(name) = self.name {
            item.name = non_blank(Some(name)).ok_or_else(|| invalid("name", "must not be empty"))?;
        }
        if let Some(category) = self.category {
            item.category = parse_category(&category)?;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if self.description.is_some() {
            item.description = non_blank(self.description);
        }
        if let Some(available) = self.is_available {
            item.is_available = available;
        }
        item.updated_at = now;
        validate_menu_item(&item)?;
        Ok(item)
    }
}

fn validate_menu_item(item: &MenuItem) -> Result<(), CatalogError> {
    if item.price < 0 {
        return Err(invalid("price", "must not be negative"));
    }
    check_price("price", item.price)
}

// ============================================================================
// Room types, branches, rooms
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypeInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub capacity: Option<i32>,
    #[serde(alias = "price_per_hour")]
    pub price_per_hour: Option<i64>,
    pub amenities: Option<Vec<String>>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl RoomTypeInput {
    pub fn into_room_type(self) -> Result<RoomType, CatalogError> {
        let mut missing = Vec::new();
        let name = require(non_blank(self.name), "name", &mut missing);
        let capacity = require(self.capacity, "capacity", &mut missing);
        let price = require(self.price_per_hour, "pricePerHour", &mut missing);
        check_missing(missing)?;

        let room_type = RoomType {
            id: Uuid::new_v4(),
            name: name.unwrap_or_default(),
            description: non_blank(self.description),
            capacity: capacity.unwrap_or_default(),
            price_per_hour: price.unwrap_or_default(),
            amenities: self.amenities.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
        };
        validate_room_type(&room_type)?;
        Ok(room_type)
    }

    pub fn apply_to(self, existing: &RoomType) -> Result<RoomType, CatalogError> {
        let mut room_type = existing.clone();
        if let Some(name) = self.name {
            room_type.name = non_blank(Some(name)).ok_or_else(|| invalid("name", "must not be empty"))?;
        }
        if self.description.is_some() {
            room_type.description = non_blank(self.description);
        }
        if let Some(capacity) = self.capacity {
            room_type.capacity = capacity;
        }
        if let Some(price) = self.price_per_hour {
            room_type.price_per_hour = price;
        }
        if let Some(amenities) = self.amenities {
            room_type.amenities = amenities;
        }
        if let Some(active) = self.is_active {
            room_type.is_active = active;
        }
        validate_room_type(&room_type)?;
        Ok(room_type)
    }
}

fn validate_room_type(room_type: &RoomType) -> Result<(), CatalogError> {
    if room_type.capacity <= 0 {
        return Err(invalid("capacity", "must be greater than 0"));
    }
    if room_type.price_per_hour <= 0 {
        return Err(invalid("pricePerHour", "must be greater than 0"));
    }
    check_price("pricePerHour", room_type.price_per_hour)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInput {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl BranchInput {
    pub fn into_branch(self) -> Result<Branch, CatalogError> {
        let mut missing = Vec::new();
        let name = require(non_blank(self.name), "name", &mut missing);
        let address = require(non_blank(self.address), "address", &mut missing);
        check_missing(missing)?;

        Ok(Branch {
            id: Uuid::new_v4(),
            name: name.unwrap_or_default(),
            address: address.unwrap_or_default(),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInput {
    #[serde(alias = "branch_id")]
    pub branch_id: Option<Uuid>,
    #[serde(alias = "room_type_id")]
    pub room_type_id: Option<Uuid>,
    pub name: Option<String>,
    #[serde(alias = "lock_id")]
    pub lock_id: Option<String>,
    #[serde(alias = "is_active")]
    pub is_active: Option<bool>,
}

impl RoomInput {
    /// Referenced branch and room type are checked by the caller.
    pub fn into_room(self) -> Result<Room, CatalogError> {
        let mut missing = Vec::new();
        let branch_id = require(self.branch_id, "branchId", &mut missing);
        let room_type_id = require(self.room_type_id, "roomTypeId", &mut missing);
        let name = require(non_blank(self.name), "name", &mut missing);
        check_missing(missing)?;

        Ok(Room {
            id: Uuid::new_v4(),
            branch_id: branch_id.unwrap_or_default(),
            room_type_id: room_type_id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            lock_id: non_blank(self.lock_id),
            is_active: self.is_active.unwrap_or(true),
        })
    }
}
