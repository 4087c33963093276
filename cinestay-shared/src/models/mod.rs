pub mod events;

pub use events::{PaymentEvent, PaymentEventKind};
