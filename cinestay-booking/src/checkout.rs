use std::sync::Arc;
use serde::Deserialize;
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use cinestay_core::booking::{booking_code, Booking, BookingStatus, PaymentStatus};
use cinestay_core::catalog::MenuItem;
use cinestay_core::repository::{BookingRepository, ComboRepository, MenuRepository, RoomRepository};
use cinestay_core::{CoreError, CoreResult};
use cinestay_catalog::{PricingEngine, QuoteRequest};
use cinestay_shared::Masked;

use crate::cas;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    #[serde(alias = "menu_item_id")]
    pub menu_item_id: Uuid,
    pub quantity: i32,
}

/// Customer checkout body. Everything is optional at the wire level so that
/// missing fields are reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(alias = "room_id")]
    pub room_id: Option<Uuid>,
    #[serde(alias = "start_time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(alias = "end_time")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(alias = "combo_id")]
    pub combo_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    #[serde(alias = "customer_name")]
    pub customer_name: Option<String>,
    #[serde(alias = "customer_phone")]
    pub customer_phone: Option<String>,
    #[serde(alias = "customer_email")]
    pub customer_email: Option<String>,
    pub note: Option<String>,
}

/// 8 to 15 digits with an optional leading `+`.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Checkout and admin lifecycle operations on bookings.
pub struct BookingService {
    bookings: Arc<dyn BookingRepository>,
    rooms: Arc<dyn RoomRepository>,
    combos: Arc<dyn ComboRepository>,
    menu: Arc<dyn MenuRepository>,
    pricing: PricingEngine,
    payment_timeout: Duration,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        rooms: Arc<dyn RoomRepository>,
        combos: Arc<dyn ComboRepository>,
        menu: Arc<dyn MenuRepository>,
        pricing: PricingEngine,
        payment_timeout: Duration,
    ) -> Self {
        Self {
            bookings,
            rooms,
            combos,
            menu,
            pricing,
            payment_timeout,
        }
    }

    /// Validate, price and reserve a new booking. The slot is claimed
    /// atomically; an overlapping live booking yields `Conflict`.
    pub async fn checkout(&self, req: CheckoutRequest, now: DateTime<Utc>) -> CoreResult<Booking> {
        let mut missing = Vec::new();
        if req.room_id.is_none() {
            missing.push("roomId");
        }
        if req.start_time.is_none() {
            missing.push("startTime");
        }
        let customer_name = non_blank(req.customer_name);
        if customer_name.is_none() {
            missing.push("customerName");
        }
        let customer_phone = non_blank(req.customer_phone);
        if customer_phone.is_none() {
            missing.push("customerPhone");
        }
        let (Some(room_id), Some(start_time), Some(customer_name), Some(customer_phone)) =
            (req.room_id, req.start_time, customer_name, customer_phone)
        else {
            return Err(CoreError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        if !is_valid_phone(&customer_phone) {
            return Err(CoreError::ValidationError(
                "Phone number must have 8 to 15 digits".to_string(),
            ));
        }
        let customer_email = non_blank(req.customer_email);
        if let Some(email) = &customer_email {
            if !is_valid_email(email) {
                return Err(CoreError::ValidationError("Invalid email address".to_string()));
            }
        }
        if start_time < now {
            return Err(CoreError::ValidationError("Start time is in the past".to_string()));
        }

        // Room and its pricing
        let room = self
            .rooms
            .get_room(room_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Room {}", room_id)))?;
        if !room.is_active {
            return Err(CoreError::ValidationError(format!("Room {} is not available", room.name)));
        }
        let room_type = self
            .rooms
            .get_room_type(room.room_type_id)
            .await?
            .ok_or_else(|| CoreError::ValidationError(format!("Room {} has no room type", room.name)))?;

        let combo = match req.combo_id {
            Some(combo_id) => {
                let combo = self
                    .combos
                    .get_combo(combo_id)
                    .await?
                    .ok_or_else(|| CoreError::NotFound(format!("Combo {}", combo_id)))?;
                if !combo.is_active {
                    return Err(CoreError::ValidationError(format!("Combo {} is not available", combo.code)));
                }
                Some(combo)
            }
            None => None,
        };

        let mut menu_items: Vec<(MenuItem, i32)> = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let item = self
                .menu
                .get_menu_item(line.menu_item_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Menu item {}", line.menu_item_id)))?;
            menu_items.push((item, line.quantity));
        }

        let quote = self.pricing.quote(QuoteRequest {
            room_type: &room_type,
            combo: combo.as_ref(),
            start_time,
            end_time: req.end_time,
            items: menu_items.iter().map(|(item, qty)| (item, *qty)).collect(),
        })?;

        let id = Uuid::new_v4();
        let booking = Booking {
            id,
            code: booking_code(id),
            room_id: room.id,
            branch_id: room.branch_id,
            combo_id: combo.as_ref().map(|c| c.id),
            customer_name,
            customer_phone: Masked(customer_phone),
            customer_email: customer_email.map(Masked),
            start_time: quote.start_time,
            end_time: quote.end_time,
            items: quote.items,
            total_amount: quote.total_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_transaction_id: None,
            paid_at: None,
            expires_at: now + self.payment_timeout,
            cancel_reason: None,
            note: non_blank(req.note),
            created_at: now,
            updated_at: now,
        };

        if !self.bookings.insert_if_slot_free(&booking).await? {
            warn!(room_id = %room.id, start = %booking.start_time, end = %booking.end_time, "Slot already taken");
            return Err(CoreError::Conflict(
                "Room is already booked for the selected time".to_string(),
            ));
        }

        info!(
            booking_code = %booking.code,
            room_id = %booking.room_id,
            phone = %booking.customer_phone,
            total = booking.total_amount,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn get_by_code(&self, code: &str) -> CoreResult<Booking> {
        self.bookings
            .find_booking_by_code(&code.trim().to_ascii_uppercase())
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", code)))
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", id)))
    }

    /// Admin status change: only `confirmed` and `cancelled` can be requested.
    pub async fn update_status(
        &self,
        id: Uuid,
        target: BookingStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Booking> {
        let reason = non_blank(reason);
        let (booking, ()) = cas::update_booking(self.bookings.as_ref(), id, |booking| {
            match target {
                BookingStatus::Confirmed => booking.confirm_manually(now)?,
                BookingStatus::Cancelled => booking.cancel(reason.clone(), now)?,
                other => {
                    return Err(CoreError::ValidationError(format!(
                        "Status can only be set to confirmed or cancelled, not {}",
                        other
                    )))
                }
            }
            Ok(((), true))
        })
        .await?;

        info!(booking_code = %booking.code, status = %booking.status, payment_status = %booking.payment_status, "Booking status changed by admin");
        Ok(booking)
    }
}
