use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockReceipt {
    pub lock_id: String,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub cached: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Remote door-lock vendor.
#[async_trait]
pub trait SmartLock: Send + Sync {
    async fn unlock(
        &self,
        lock_id: &str,
    ) -> Result<UnlockReceipt, Box<dyn std::error::Error + Send + Sync>>;

    /// Fetch (or reuse) an access token and report its expiry.
    async fn token_status(&self) -> Result<TokenStatus, Box<dyn std::error::Error + Send + Sync>>;
}
