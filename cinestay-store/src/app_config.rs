use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub pay2s: Pay2sSettings,
    pub ttlock: TtlockSettings,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// `development` relaxes the cron guard.
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.run_mode.eq_ignore_ascii_case("development")
    }
}

fn default_run_mode() -> String {
    "development".into()
}

/// Without a URL the server runs on the in-memory store.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct Pay2sSettings {
    pub endpoint: String,
    pub partner_code: String,
    #[serde(default = "default_partner_name")]
    pub partner_name: String,
    pub access_key: String,
    pub secret_key: String,
    pub ipn_url: String,
    pub redirect_url: String,
    #[serde(default)]
    pub bank_accounts: Vec<BankAccountSettings>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_partner_name() -> String {
    "CineStay".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_retry_delay_ms() -> u64 {
    1_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct BankAccountSettings {
    pub account_number: String,
    pub bank_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtlockSettings {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_seconds: i64,
}

fn default_refresh_margin() -> i64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct CronConfig {
    pub secret: Option<String>,
    #[serde(default = "default_expire_interval")]
    pub expire_interval_seconds: u64,
    #[serde(default = "default_complete_interval")]
    pub complete_interval_seconds: u64,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_seconds: u64,
}

fn default_expire_interval() -> u64 {
    60
}
fn default_complete_interval() -> u64 {
    300
}
fn default_purge_interval() -> u64 {
    300
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: None,
            expire_interval_seconds: default_expire_interval(),
            complete_interval_seconds: default_complete_interval(),
            purge_interval_seconds: default_purge_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    pub payment_timeout_minutes: i64,
    pub pending_grace_minutes: i64,
    pub unlock_early_minutes: i64,
    pub cache_ttl_seconds: u64,
    /// Offset used for calendar-day queries (Vietnam is UTC+7).
    pub utc_offset_hours: i32,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            payment_timeout_minutes: 15,
            pending_grace_minutes: 10,
            unlock_early_minutes: 15,
            cache_ttl_seconds: 60,
            utc_offset_hours: 7,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("CINESTAY").separator("__"))
            .set_override("server.run_mode", run_mode.clone())?
            .build()?;

        let mut config: Config = s.try_deserialize()?;

        // Platform cron schedulers inject the secret under this bare name.
        if config.cron.secret.is_none() {
            config.cron.secret = env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());
        }

        Ok(config)
    }
}
