use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::info;
use cinestay_core::booking::{BookingStatus, PaymentStatus};
use cinestay_core::lock::{SmartLock, UnlockReceipt};
use cinestay_core::repository::{BookingRepository, RoomRepository};
use cinestay_core::{CoreError, CoreResult};

/// Opens the room door for a guest holding a paid, confirmed booking.
pub struct RoomAccess {
    bookings: Arc<dyn BookingRepository>,
    rooms: Arc<dyn RoomRepository>,
    lock: Arc<dyn SmartLock>,
    /// How early before the session the door may be opened.
    early_entry: Duration,
}

impl RoomAccess {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        rooms: Arc<dyn RoomRepository>,
        lock: Arc<dyn SmartLock>,
        early_entry: Duration,
    ) -> Self {
        Self { bookings, rooms, lock, early_entry }
    }

    pub async fn unlock_for_booking(&self, code: &str, now: DateTime<Utc>) -> CoreResult<UnlockReceipt> {
        let booking = self
            .bookings
            .find_booking_by_code(&code.trim().to_ascii_uppercase())
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", code)))?;

        if booking.status != BookingStatus::Confirmed || booking.payment_status != PaymentStatus::Paid {
            return Err(CoreError::ValidationError(
                "Only confirmed, paid bookings can open the room".to_string(),
            ));
        }
        if now < booking.start_time - self.early_entry || now > booking.end_time {
            return Err(CoreError::ValidationError(format!(
                "The room can be opened from {} until {}",
                (booking.start_time - self.early_entry).to_rfc3339(),
                booking.end_time.to_rfc3339()
            )));
        }

        let room = self
            .rooms
            .get_room(booking.room_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Room {}", booking.room_id)))?;
        let lock_id = room
            .lock_id
            .ok_or_else(|| CoreError::ValidationError(format!("Room {} has no smart lock", room.name)))?;

        let receipt = self
            .lock
            .unlock(&lock_id)
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        info!(booking_code = %booking.code, lock_id = %lock_id, "Room unlocked for guest");
        Ok(receipt)
    }

    pub async fn unlock_lock(&self, lock_id: &str) -> CoreResult<UnlockReceipt> {
        self.lock
            .unlock(lock_id)
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))
    }
}
