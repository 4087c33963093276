pub mod envelope;
pub mod pii;
pub mod models;

pub use envelope::ApiResponse;
pub use pii::Masked;
