pub mod booking;
pub mod catalog;
pub mod repository;
pub mod payment;
pub mod lock;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Upstream gateway error: {0}")]
    GatewayError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::StorageError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
