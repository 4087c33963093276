pub mod app_config;
pub mod database;
pub mod memory;
pub mod catalog_repo;
pub mod booking_repo;
pub mod payment_repo;
pub mod cache;

use std::sync::Arc;
use sqlx::PgPool;
use cinestay_core::repository::{
    BookingRepository, ComboRepository, MenuRepository, PaymentRepository, RoomRepository,
};

pub use app_config::Config;
pub use cache::TtlCache;
pub use database::DbClient;
pub use memory::MemoryStore;

/// The repository set the services run against, backed either by Postgres or
/// by a single in-memory store.
#[derive(Clone)]
pub struct Repositories {
    pub combos: Arc<dyn ComboRepository>,
    pub menu: Arc<dyn MenuRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            combos: store.clone(),
            menu: store.clone(),
            rooms: store.clone(),
            bookings: store.clone(),
            payments: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let catalog = Arc::new(catalog_repo::StoreCatalogRepository::new(pool.clone()));
        Self {
            combos: catalog.clone(),
            menu: catalog.clone(),
            rooms: catalog,
            bookings: Arc::new(booking_repo::StoreBookingRepository::new(pool.clone())),
            payments: Arc::new(payment_repo::StorePaymentRepository::new(pool)),
        }
    }
}
