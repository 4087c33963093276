//! Pay2S bank-transfer gateway: signed payment-link creation and IPN verification.

pub mod constants;
pub mod signature;
pub mod ipn;
pub mod client;

pub use client::{BankAccount, Pay2sClient, Pay2sConfig};
pub use ipn::{IpnPayload, Pay2sVerifier};

#[derive(Debug, thiserror::Error)]
pub enum Pay2sError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected request (code {code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("Gateway unavailable after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Credential mismatch: {0}")]
    CredentialMismatch(&'static str),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl From<Pay2sError> for cinestay_core::CoreError {
    fn from(err: Pay2sError) -> Self {
        match err {
            Pay2sError::InvalidSignature | Pay2sError::CredentialMismatch(_) => {
                cinestay_core::CoreError::Unauthorized(err.to_string())
            }
            Pay2sError::Malformed(msg) => cinestay_core::CoreError::ValidationError(msg),
            other => cinestay_core::CoreError::GatewayError(other.to_string()),
        }
    }
}
