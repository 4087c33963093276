use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;
use cinestay_core::booking::{Booking, BookingState, BookingStatus};
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::payment::{PaymentTransaction, TransactionOutcome};
use cinestay_core::repository::{
    BookingFilter, BookingRepository, ComboRepository, MenuRepository, PaymentRepository, RoomRepository,
    StoreResult,
};

#[derive(Default)]
struct Tables {
    branches: HashMap<Uuid, Branch>,
    rooms: HashMap<Uuid, Room>,
    room_types: HashMap<Uuid, RoomType>,
    combos: HashMap<Uuid, ComboPackage>,
    menu_items: HashMap<Uuid, MenuItem>,
    bookings: HashMap<Uuid, Booking>,
    transactions: HashMap<String, PaymentTransaction>,
}

/// Process-local implementation of every repository, used when no database
/// is configured and in tests. Conditional writes happen under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(key);
    items
}

#[async_trait]
impl ComboRepository for MemoryStore {
    async fn list_combos(&self, active_only: bool) -> StoreResult<Vec<ComboPackage>> {
        let tables = self.tables.read().await;
        let combos = tables
            .combos
            .values()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        Ok(sorted(combos, |c: &ComboPackage| (c.display_order, c.name.clone())))
    }

    async fn get_combo(&self, id: Uuid) -> StoreResult<Option<ComboPackage>> {
        Ok(self.tables.read().await.combos.get(&id).cloned())
    }

    async fn find_combo_by_code(&self, code: &str) -> StoreResult<Option<ComboPackage>> {
        let tables = self.tables.read().await;
        Ok(tables.combos.values().find(|c| c.code.eq_ignore_ascii_case(code)).cloned())
    }

    async fn insert_combo(&self, combo: &ComboPackage) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.combos.values().any(|c| c.code == combo.code) {
            return Err(format!("combo code {} already exists", combo.code).into());
        }
        tables.combos.insert(combo.id, combo.clone());
        Ok(())
    }

    async fn update_combo(&self, combo: &ComboPackage) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.combos.values().any(|c| c.code == combo.code && c.id != combo.id) {
            return Err(format!("combo code {} already exists", combo.code).into());
        }
        match tables.combos.get_mut(&combo.id) {
            Some(existing) => {
                *existing = combo.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_combo(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.combos.remove(&id).is_some())
    }
}

#[async_trait]
impl MenuRepository for MemoryStore {
    async fn list_menu_items(
        &self,
        category: Option<MenuCategory>,
        available_only: bool,
    ) -> StoreResult<Vec<MenuItem>> {
        let tables = self.tables.read().await;
        let items = tables
            .menu_items
            .values()
            .filter(|i| category.map(|c| i.category == c).unwrap_or(true))
            .filter(|i| !available_only || i.is_available)
            .cloned()
            .collect();
        Ok(sorted(items, |i: &MenuItem| (i.category.as_str(), i.name.clone())))
    }

    async fn get_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        Ok(self.tables.read().await.menu_items.get(&id).cloned())
    }

    async fn insert_menu_item(&self, item: &MenuItem) -> StoreResult<()> {
        self.tables.write().await.menu_items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_menu_item(&self, item: &MenuItem) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.menu_items.get_mut(&item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_menu_item(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.menu_items.remove(&id).is_some())
    }
}

#[async_trait]
impl RoomRepository for MemoryStore {
    async fn list_branches(&self, active_only: bool) -> StoreResult<Vec<Branch>> {
        let tables = self.tables.read().await;
        let branches = tables
            .branches
            .values()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect();
        Ok(sorted(branches, |b: &Branch| b.name.clone()))
    }

    async fn get_branch(&self, id: Uuid) -> StoreResult<Option<Branch>> {
        Ok(self.tables.read().await.branches.get(&id).cloned())
    }

    async fn insert_branch(&self, branch: &Branch) -> StoreResult<()> {
        self.tables.write().await.branches.insert(branch.id, branch.clone());
        Ok(())
    }

    async fn list_rooms(&self, branch_id: Option<Uuid>, active_only: bool) -> StoreResult<Vec<Room>> {
        let tables = self.tables.read().await;
        let rooms = tables
            .rooms
            .values()
            .filter(|r| branch_id.map(|b| r.branch_id == b).unwrap_or(true))
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect();
        Ok(sorted(rooms, |r: &Room| r.name.clone()))
    }

    async fn get_room(&self, id: Uuid) -> StoreResult<Option<Room>> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn insert_room(&self, room: &Room) -> StoreResult<()> {
        self.tables.write().await.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn list_room_types(&self, active_only: bool) -> StoreResult<Vec<RoomType>> {
        let tables = self.tables.read().await;
        let types = tables
            .room_types
            .values()
            .filter(|t| !active_only || t.is_active)
            .cloned()
            .collect();
        Ok(sorted(types, |t: &RoomType| (t.price_per_hour, t.name.clone())))
    }

    async fn get_room_type(&self, id: Uuid) -> StoreResult<Option<RoomType>> {
        Ok(self.tables.read().await.room_types.get(&id).cloned())
    }

    async fn insert_room_type(&self, room_type: &RoomType) -> StoreResult<()> {
        self.tables.write().await.room_types.insert(room_type.id, room_type.clone());
        Ok(())
    }

    async fn update_room_type(&self, room_type: &RoomType) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.room_types.get_mut(&room_type.id) {
            Some(existing) => {
                *existing = room_type.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_if_slot_free(&self, booking: &Booking) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let taken = tables.bookings.values().any(|b| {
            b.room_id == booking.room_id && b.holds_slot() && b.overlaps(booking.start_time, booking.end_time)
        });
        if taken {
            return Ok(false);
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(true)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_booking_by_code(&self, code: &str) -> StoreResult<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables.bookings.values().find(|b| b.code == code).cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables.bookings.values().filter(|b| filter.matches(b)).cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            bookings.truncate(limit.max(0) as usize);
        }
        Ok(bookings)
    }

    async fn list_room_bookings(
        &self,
        room_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let bookings = tables
            .bookings
            .values()
            .filter(|b| b.room_id == room_id && b.holds_slot() && b.overlaps(from, to))
            .cloned()
            .collect();
        Ok(sorted(bookings, |b: &Booking| b.start_time))
    }

    async fn compare_and_set(&self, booking: &Booking, expected: BookingState) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get_mut(&booking.id) {
            Some(current) if current.state() == expected => {
                *current = booking.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_overdue_pending(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at <= cutoff)
            .cloned()
            .collect())
    }

    async fn list_finished_confirmed(&self, now: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Confirmed && b.end_time <= now)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn record_transaction(&self, transaction: &PaymentTransaction) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.transactions.contains_key(&transaction.transaction_id) {
            return Ok(false);
        }
        tables
            .transactions
            .insert(transaction.transaction_id.clone(), transaction.clone());
        Ok(true)
    }

    async fn get_transaction(&self, transaction_id: &str) -> StoreResult<Option<PaymentTransaction>> {
        Ok(self.tables.read().await.transactions.get(transaction_id).cloned())
    }

    async fn set_transaction_outcome(&self, transaction_id: &str, outcome: TransactionOutcome) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let transaction = tables
            .transactions
            .get_mut(transaction_id)
            .ok_or_else(|| format!("transaction {} not found", transaction_id))?;
        transaction.outcome = outcome;
        transaction.updated_at = Utc::now();
        Ok(())
    }
}
