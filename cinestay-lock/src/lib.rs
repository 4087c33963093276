//! TTLock cloud API: client-credentials token caching and remote unlock.

pub mod client;

pub use client::{TtlockClient, TtlockConfig};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TTLock error {code}: {message}")]
    Vendor { code: i64, message: String },

    #[error("Token response missing access_token")]
    MissingToken,
}
