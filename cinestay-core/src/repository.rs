use async_trait::async_trait;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::booking::{Booking, BookingState, BookingStatus, PaymentStatus};
use crate::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use crate::payment::{PaymentTransaction, TransactionOutcome};

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Admin booking listing filter. All fields are optional and combined with AND.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub room_id: Option<Uuid>,
    /// Bookings starting inside `[from, to)`.
    pub starts_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: Option<i64>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(payment_status) = self.payment_status {
            if booking.payment_status != payment_status {
                return false;
            }
        }
        if let Some(room_id) = self.room_id {
            if booking.room_id != room_id {
                return false;
            }
        }
        if let Some((from, to)) = self.starts_between {
            if booking.start_time < from || booking.start_time >= to {
                return false;
            }
        }
        true
    }
}

/// Repository trait for combo packages
#[async_trait]
pub trait ComboRepository: Send + Sync {
    async fn list_combos(&self, active_only: bool) -> StoreResult<Vec<ComboPackage>>;

    async fn get_combo(&self, id: Uuid) -> StoreResult<Option<ComboPackage>>;

    async fn find_combo_by_code(&self, code: &str) -> StoreResult<Option<ComboPackage>>;

    async fn insert_combo(&self, combo: &ComboPackage) -> StoreResult<()>;

    /// Returns false when the combo does not exist.
    async fn update_combo(&self, combo: &ComboPackage) -> StoreResult<bool>;

    async fn delete_combo(&self, id: Uuid) -> StoreResult<bool>;
}

/// Repository trait for menu items
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn list_menu_items(
        &self,
        category: Option<MenuCategory>,
        available_only: bool,
    ) -> StoreResult<Vec<MenuItem>>;

    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>>;

    async fn insert_menu_item(&self, item: &MenuItem) -> StoreResult<()>;

    async fn update_menu_item(&self, item: &MenuItem) -> StoreResult<bool>;

    async fn delete_menu_item(&self, id: Uuid) -> StoreResult<bool>;
}

/// Repository trait for branches, rooms and room types
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn list_branches(&self, active_only: bool) -> StoreResult<Vec<Branch>>;

    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>>;

    async fn insert_branch(&self, branch: &Branch) -> StoreResult<()>;

    async fn list_rooms(&self, branch_id: Option<Uuid>, active_only: bool) -> StoreResult<Vec<Room>>;

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>>;

    async fn insert_room(&self, room: &Room) -> StoreResult<()>;

    async fn list_room_types(&self, active_only: bool) -> StoreResult<Vec<RoomType>>;

    async fn get_room_type(&self, id: Uuid) -> StoreResult<Option<RoomType>>;

    async fn insert_room_type(&self, room_type: &RoomType) -> StoreResult<()>;

    async fn update_room_type(&self, room_type: &RoomType) -> StoreResult<bool>;
}

/// Repository trait for bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Atomically insert the booking unless another slot-holding booking of the
    /// same room overlaps it. Returns false on overlap.
    async fn insert_if_slot_free(&self, booking: &Booking) -> StoreResult<bool>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>>;

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>>;

    /// Slot-holding bookings of a room overlapping `[from, to)`.
    async fn list_room_bookings(
        &self,
        room_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>>;

    /// Persist the mutable fields of `booking` only if the stored state still
    /// equals `expected`. Returns false when another writer got there first.
    async fn compare_and_set(&self, booking: &Booking, expected: BookingState) -> StoreResult<bool>;

    /// Pending bookings whose payment deadline is at or before `cutoff`.
    async fn list_overdue_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Booking>>;

    /// Confirmed bookings that ended at or before `now`.
    async fn list_finished_confirmed(&self, now: DateTime<Utc>) -> StoreResult<Vec<Booking>>;
}

/// Repository trait for gateway transactions
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert-first idempotency: returns false if the transaction id is already recorded.
    async fn record_transaction(&self, transaction: &PaymentTransaction) -> StoreResult<bool>;

    async fn get_transaction(&self, transaction_id: &str) -> StoreResult<Option<PaymentTransaction>>;

    async fn set_transaction_outcome(
        &self,
        transaction_id: &str,
        outcome: TransactionOutcome,
    ) -> StoreResult<()>;
}
