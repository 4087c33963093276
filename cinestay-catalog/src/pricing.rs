use serde::{Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use cinestay_core::booking::BookingItem;
use cinestay_core::catalog::{ComboPackage, MenuItem, RoomType};

use crate::product::CatalogError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Shortest hourly (non-combo) session
    pub min_duration_minutes: i64,

    /// Longest session of any kind
    pub max_duration_minutes: i64,

    /// Per-line cap on menu item quantity
    pub max_item_quantity: i32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 60,
            max_duration_minutes: 12 * 60,
            max_item_quantity: 20,
        }
    }
}

/// Everything needed to price one checkout.
pub struct QuoteRequest<'a> {
    pub room_type: &'a RoomType,
    pub combo: Option<&'a ComboPackage>,
    pub start_time: DateTime<Utc>,
    /// Optional when a combo fixes the duration.
    pub end_time: Option<DateTime<Utc>>,
    pub items: Vec<(&'a MenuItem, i32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub base_amount: i64,
    pub items: Vec<BookingItem>,
    pub items_amount: i64,
    pub total_amount: i64,
}

fn overflow() -> CatalogError {
    CatalogError::PricingFailed("Booking total is too large".to_string())
}

pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Hourly room price for a session of `seconds`, rounded up to the whole
    /// currency unit. `None` when the amount does not fit in an `i64`.
    pub fn room_price(price_per_hour: i64, seconds: i64) -> Option<i64> {
        price_per_hour
            .checked_mul(seconds)?
            .checked_add(3599)
            .map(|v| v / 3600)
    }

    pub fn quote(&self, req: QuoteRequest<'_>) -> Result<PriceQuote, CatalogError> {
        // 1. Resolve the session window
        let end_time = match (req.combo, req.end_time) {
            (Some(combo), Some(end)) => {
                let expected = req.start_time + Duration::minutes(combo.duration_minutes as i64);
                if end != expected {
                    return Err(CatalogError::PricingFailed(format!(
                        "Combo {} lasts {} minutes; end time must be {}",
                        combo.code,
                        combo.duration_minutes,
                        expected.to_rfc3339()
                    )));
                }
                end
            }
            (Some(combo), None) => req.start_time + Duration::minutes(combo.duration_minutes as i64),
            (None, Some(end)) => end,
            (None, None) => {
                return Err(CatalogError::MissingFields("endTime".to_string()));
            }
        };

        if end_time <= req.start_time {
            return Err(CatalogError::PricingFailed("End time must be after start time".to_string()));
        }

        let duration_seconds = (end_time - req.start_time).num_seconds();
        let duration_minutes = (duration_seconds + 59) / 60;
        if duration_seconds > self.config.max_duration_minutes * 60 {
            return Err(CatalogError::PricingFailed(format!(
                "Sessions are limited to {} minutes",
                self.config.max_duration_minutes
            )));
        }

        // 2. Base price: combo price or hourly room price
        let base_amount = match req.combo {
            Some(combo) => combo.price,
            None => {
                if duration_seconds < self.config.min_duration_minutes * 60 {
                    return Err(CatalogError::PricingFailed(format!(
                        "Minimum booking is {} minutes",
                        self.config.min_duration_minutes
                    )));
                }
                Self::room_price(req.room_type.price_per_hour, duration_seconds).ok_or_else(overflow)?
            }
        };

        // 3. Menu extras
        let mut items = Vec::with_capacity(req.items.len());
        for (menu_item, quantity) in req.items {
            if !menu_item.is_available {
                return Err(CatalogError::PricingFailed(format!("{} is not available", menu_item.name)));
            }
            if quantity < 1 || quantity > self.config.max_item_quantity {
                return Err(CatalogError::InvalidField {
                    field: "quantity",
                    reason: format!("must be between 1 and {}", self.config.max_item_quantity),
                });
            }
            items.push(BookingItem {
                menu_item_id: menu_item.id,
                name: menu_item.name.clone(),
                unit_price: menu_item.price,
                quantity,
            });
        }
        let items_amount = items.iter().try_fold(0i64, |sum, item| {
            item.line_total().and_then(|line| sum.checked_add(line)).ok_or_else(overflow)
        })?;
        let total_amount = base_amount.checked_add(items_amount).ok_or_else(overflow)?;

        Ok(PriceQuote {
            start_time: req.start_time,
            end_time,
            duration_minutes,
            base_amount,
            items,
            items_amount,
            total_amount,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinestay_core::catalog::MenuCategory;
    use uuid::Uuid;

    fn room_type() -> RoomType {
        RoomType {
            id: Uuid::new_v4(),
            name: "Standard".to_string(),
            description: None,
            capacity: 2,
            price_per_hour: 100_000,
            amenities: vec![],
            is_active: true,
        }
    }

    fn combo() -> ComboPackage {
        let now = Utc::now();
        ComboPackage {
            id: Uuid::new_v4(),
            name: "3 hours".to_string(),
            code: "C3H".to_string(),
            description: None,
            duration_minutes: 180,
            price: 250_000,
            display_order: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn popcorn() -> MenuItem {
        let now = Utc::now();
        MenuItem {
            id: Uuid::new_v4(),
            name: "Popcorn".to_string(),
            category: MenuCategory::Snack,
            price: 45_000,
            description: None,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_hourly_price_rounds_up() {
        assert_eq!(PricingEngine::room_price(100_000, 90 * 60), Some(150_000));
        assert_eq!(PricingEngine::room_price(99_999, 60), Some(1_667));
        assert_eq!(PricingEngine::room_price(i64::MAX / 100, 7200), None);
    }

    #[test]
    fn test_partial_minutes_are_billed() {
        let engine = PricingEngine::default();
        let rt = room_type();
        let start = Utc::now() + Duration::hours(1);

        let quote = engine
            .quote(QuoteRequest {
                room_type: &rt,
                combo: None,
                start_time: start,
                end_time: Some(start + Duration::minutes(90) + Duration::seconds(59)),
                items: vec![],
            })
            .unwrap();

        // 100_000/h for 5459 s = 151_638.9, rounded up
        assert_eq!(quote.base_amount, 151_639);
        assert_eq!(quote.duration_minutes, 91);
    }

    #[test]
    fn test_huge_prices_fail_instead_of_overflowing() {
        let engine = PricingEngine::default();
        let mut rt = room_type();
        rt.price_per_hour = i64::MAX / 100;
        let start = Utc::now() + Duration::hours(1);

        let err = engine
            .quote(QuoteRequest { room_type: &rt, combo: None, start_time: start, end_time: Some(start + Duration::hours(2)), items: vec![] })
            .unwrap_err();
        assert!(matches!(err, CatalogError::PricingFailed(_)));

        let mut item = popcorn();
        item.price = i64::MAX / 10;
        let c = combo();
        let err = engine
            .quote(QuoteRequest { room_type: &room_type(), combo: Some(&c), start_time: start, end_time: None, items: vec![(&item, 20)] })
            .unwrap_err();
        assert!(matches!(err, CatalogError::PricingFailed(_)));
    }

    #[test]
    fn test_hourly_quote_with_items() {
        let engine = PricingEngine::default();
        let rt = room_type();
        let item = popcorn();
        let start = Utc::now() + Duration::hours(1);

        let quote = engine
            .quote(QuoteRequest {
                room_type: &rt,
                combo: None,
                start_time: start,
                end_time: Some(start + Duration::minutes(120)),
                items: vec![(&item, 2)],
            })
            .unwrap();

        assert_eq!(quote.base_amount, 200_000);
        assert_eq!(quote.items_amount, 90_000);
        assert_eq!(quote.total_amount, 290_000);
    }

    #[test]
    fn test_combo_fixes_end_time_and_price() {
        let engine = PricingEngine::default();
        let rt = room_type();
        let c = combo();
        let start = Utc::now() + Duration::hours(1);

        let quote = engine
            .quote(QuoteRequest { room_type: &rt, combo: Some(&c), start_time: start, end_time: None, items: vec![] })
            .unwrap();

        assert_eq!(quote.end_time, start + Duration::minutes(180));
        assert_eq!(quote.total_amount, 250_000);

        let mismatch = engine.quote(QuoteRequest {
            room_type: &rt,
            combo: Some(&c),
            start_time: start,
            end_time: Some(start + Duration::minutes(60)),
            items: vec![],
        });
        assert!(mismatch.is_err());
    }

    #[test]
    fn test_rejects_short_sessions_and_bad_quantities() {
        let engine = PricingEngine::default();
        let rt = room_type();
        let item = popcorn();
        let start = Utc::now();

        assert!(engine
            .quote(QuoteRequest { room_type: &rt, combo: None, start_time: start, end_time: Some(start + Duration::minutes(30)), items: vec![] })
            .is_err());

        assert!(engine
            .quote(QuoteRequest { room_type: &rt, combo: None, start_time: start, end_time: Some(start + Duration::hours(2)), items: vec![(&item, 0)] })
            .is_err());
    }
}
