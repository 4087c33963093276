use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// A physical location customers pick before choosing a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub room_type_id: Uuid,
    pub name: String,
    /// TTLock lock identifier, when the room door is smart-lock equipped.
    pub lock_id: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub capacity: i32,
    pub price_per_hour: i64,
    pub amenities: Vec<String>,
    pub is_active: bool,
}

/// A bundled pricing offer (duration + price), sold independently of room type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComboPackage {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub price: i64,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MenuCategory {
    Drink,
    Snack,
    Food,
    Extra,
}

impl MenuCategory {
    pub const ALL: [MenuCategory; 4] = [
        MenuCategory::Drink,
        MenuCategory::Snack,
        MenuCategory::Food,
        MenuCategory::Extra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MenuCategory::Drink => "drink",
            MenuCategory::Snack => "snack",
            MenuCategory::Food => "food",
            MenuCategory::Extra => "extra",
        }
    }
}

impl fmt::Display for MenuCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuCategory {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MenuCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                crate::CoreError::ValidationError(format!(
                    "Invalid category '{}'. Must be one of: drink, snack, food, extra",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: Uuid,
    pub name: String,
    pub category: MenuCategory,
    pub price: i64,
    pub description: Option<String>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
