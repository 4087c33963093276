use std::time::Duration as StdDuration;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use cinestay_core::lock::{SmartLock, TokenStatus, UnlockReceipt};

use crate::LockError;

#[derive(Debug, Clone)]
pub struct TtlockConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Tokens are refreshed this long before they actually expire.
    pub refresh_margin: Duration,
    pub request_timeout: StdDuration,
}

impl TtlockConfig {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            refresh_margin: Duration::minutes(5),
            request_timeout: StdDuration::from_secs(15),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin > now
    }
}

pub struct TtlockClient {
    http: reqwest::Client,
    config: TtlockConfig,
    token: Mutex<Option<CachedToken>>,
}

impl TtlockClient {
    pub fn new(config: TtlockConfig) -> Result<Self, LockError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Cached access token, fetched again once inside the refresh margin.
    /// The mutex is held across the fetch so concurrent callers share one request.
    async fn access_token(&self) -> Result<CachedToken, LockError> {
        let mut guard = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = guard.as_ref() {
            if token.is_fresh(now, self.config.refresh_margin) {
                return Ok(token.clone());
            }
            debug!("TTLock token inside refresh margin, fetching a new one");
        }

        let token = self.fetch_token().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<CachedToken, LockError> {
        let url = format!("{}/oauth2/token", self.config.base_url);
        let resp: TokenResponse = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.errcode != 0 {
            return Err(LockError::Vendor { code: resp.errcode, message: resp.errmsg });
        }
        let value = resp.access_token.ok_or(LockError::MissingToken)?;
        let expires_at = Utc::now() + Duration::seconds(resp.expires_in);
        info!(%expires_at, "TTLock access token refreshed");

        Ok(CachedToken { value, expires_at })
    }

    pub async fn unlock_lock(&self, lock_id: &str) -> Result<UnlockReceipt, LockError> {
        let token = self.access_token().await?;
        let now = Utc::now();
        let date = now.timestamp_millis().to_string();
        let url = format!("{}/v3/lock/unlock", self.config.base_url);

        let resp: VendorResponse = self
            .http
            .post(&url)
            .form(&[
                ("clientId", self.config.client_id.as_str()),
                ("accessToken", token.value.as_str()),
                ("lockId", lock_id),
                ("date", date.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.errcode != 0 {
            warn!(lock_id, errcode = resp.errcode, errmsg = %resp.errmsg, "TTLock unlock rejected");
            return Err(LockError::Vendor { code: resp.errcode, message: resp.errmsg });
        }

        info!(lock_id, "Lock opened");
        Ok(UnlockReceipt {
            lock_id: lock_id.to_string(),
            unlocked_at: now,
        })
    }
}

#[async_trait]
impl SmartLock for TtlockClient {
    async fn unlock(&self, lock_id: &str) -> Result<UnlockReceipt, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.unlock_lock(lock_id).await?)
    }

    async fn token_status(&self) -> Result<TokenStatus, Box<dyn std::error::Error + Send + Sync>> {
        let was_cached = {
            let guard = self.token.lock().await;
            guard
                .as_ref()
                .map(|t| t.is_fresh(Utc::now(), self.config.refresh_margin))
                .unwrap_or(false)
        };
        let token = self.access_token().await?;
        Ok(TokenStatus {
            cached: was_cached,
            expires_at: Some(token.expires_at),
        })
    }
}
