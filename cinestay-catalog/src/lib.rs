pub mod product;
pub mod pricing;
pub mod availability;

pub use product::{BranchInput, CatalogError, ComboInput, MenuItemInput, RoomInput, RoomTypeInput};
pub use pricing::{PriceQuote, PricingConfig, PricingEngine, QuoteRequest};
pub use availability::{booked_slots, day_window, BookedSlot};
