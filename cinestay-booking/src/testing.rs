use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use cinestay_catalog::PricingEngine;
use cinestay_core::booking::{Booking, BookingState};
use cinestay_core::catalog::{Branch, ComboPackage, MenuCategory, MenuItem, Room, RoomType};
use cinestay_core::lock::{SmartLock, TokenStatus, UnlockReceipt};
use cinestay_core::payment::PaymentTransaction;
use cinestay_core::repository::{
    BookingRepository, ComboRepository, MenuRepository, PaymentRepository, RoomRepository,
};
use cinestay_store::memory::MemoryStore;

use crate::checkout::{BookingService, CheckoutRequest};

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub branch: Branch,
    pub room: Room,
    pub room_type: RoomType,
    pub combo: ComboPackage,
    pub menu_item: MenuItem,
}

impl Fixture {
    pub async fn seeded() -> Self {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let branch = Branch {
            id: Uuid::new_v4(),
            name: "CineStay Quan 1".to_string(),
            address: "12 Nguyen Hue, Q1".to_string(),
            is_active: true,
        };
        let room_type = RoomType {
            id: Uuid::new_v4(),
            name: "Couple".to_string(),
            description: None,
            capacity: 2,
            price_per_hour: 150_000,
            amenities: vec!["projector".to_string()],
            is_active: true,
        };
        let room = Room {
            id: Uuid::new_v4(),
            branch_id: branch.id,
            room_type_id: room_type.id,
            name: "P101".to_string(),
            lock_id: Some("7781234".to_string()),
            is_active: true,
        };
        let combo = ComboPackage {
            id: Uuid::new_v4(),
            name: "Movie night".to_string(),
            code: "NIGHT3H".to_string(),
            description: None,
            duration_minutes: 180,
            price: 399_000,
            display_order: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let menu_item = MenuItem {
            id: Uuid::new_v4(),
            name: "Popcorn".to_string(),
            category: MenuCategory::Snack,
            price: 25_000,
            description: None,
            is_available: true,
            created_at: now,
            updated_at: now,
        };

        store.insert_branch(&branch).await.unwrap();
        store.insert_room_type(&room_type).await.unwrap();
        store.insert_room(&room).await.unwrap();
        store.insert_combo(&combo).await.unwrap();
        store.insert_menu_item(&menu_item).await.unwrap();

        Self { store, branch, room, room_type, combo, menu_item }
    }

    pub fn service(&self) -> BookingService {
        BookingService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            PricingEngine::default(),
            Duration::minutes(15),
        )
    }

    /// A fresh two-hour booking starting two hours from `now`.
    pub async fn pending_booking(&self, now: DateTime<Utc>) -> Booking {
        let start = now + Duration::hours(2);
        let req = CheckoutRequest {
            room_id: Some(self.room.id),
            start_time: Some(start),
            end_time: Some(start + Duration::hours(2)),
            customer_name: Some("Pham D".to_string()),
            customer_phone: Some("0987654321".to_string()),
            ..Default::default()
        };
        self.service().checkout(req, now).await.unwrap()
    }

    pub async fn booking(&self, id: Uuid) -> Booking {
        self.store.get_booking(id).await.unwrap().unwrap()
    }

    pub async fn transaction(&self, id: &str) -> PaymentTransaction {
        self.store.get_transaction(id).await.unwrap().unwrap()
    }

    pub async fn record(&self, tx: &PaymentTransaction) {
        assert!(self.store.record_transaction(tx).await.unwrap());
    }

    pub async fn cas(&self, booking: &Booking, expected: BookingState) {
        assert!(self.store.compare_and_set(booking, expected).await.unwrap());
    }
}

/// Smart lock double that remembers which locks were opened.
#[derive(Default)]
pub struct RecordingLock {
    opened: Mutex<Vec<String>>,
}

impl RecordingLock {
    pub fn unlocked(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmartLock for RecordingLock {
    async fn unlock(&self, lock_id: &str) -> Result<UnlockReceipt, Box<dyn std::error::Error + Send + Sync>> {
        self.opened.lock().unwrap().push(lock_id.to_string());
        Ok(UnlockReceipt { lock_id: lock_id.to_string(), unlocked_at: Utc::now() })
    }

    async fn token_status(&self) -> Result<TokenStatus, Box<dyn std::error::Error + Send + Sync>> {
        Ok(TokenStatus { cached: true, expires_at: None })
    }
}
