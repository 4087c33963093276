use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use cinestay_api::{app, worker, ApiSettings, AppState};
use cinestay_lock::{TtlockClient, TtlockConfig};
use cinestay_pay2s::{BankAccount, Pay2sClient, Pay2sConfig, Pay2sVerifier};
use cinestay_store::app_config::Config;
use cinestay_store::{DbClient, Repositories};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn pay2s_config(config: &Config) -> Pay2sConfig {
    let settings = &config.pay2s;
    let mut pay2s = Pay2sConfig::with_defaults(
        &settings.endpoint,
        &settings.partner_code,
        &settings.access_key,
        &settings.secret_key,
    );
    pay2s.partner_name = settings.partner_name.clone();
    pay2s.ipn_url = settings.ipn_url.clone();
    pay2s.redirect_url = settings.redirect_url.clone();
    pay2s.bank_accounts = settings
        .bank_accounts
        .iter()
        .map(|account| BankAccount {
            account_number: account.account_number.clone(),
            bank_id: account.bank_id.clone(),
        })
        .collect();
    pay2s.max_retries = settings.max_retries;
    pay2s.request_timeout = Duration::from_millis(settings.request_timeout_ms);
    pay2s.retry_delay = Duration::from_millis(settings.retry_delay_ms);
    pay2s
}

fn ttlock_config(config: &Config) -> TtlockConfig {
    let settings = &config.ttlock;
    let mut ttlock = TtlockConfig::new(&settings.base_url, &settings.client_id, &settings.client_secret);
    ttlock.refresh_margin = chrono::Duration::seconds(settings.token_refresh_margin_seconds);
    ttlock
}

async fn repositories(config: &Config) -> anyhow::Result<Repositories> {
    match config.database.url.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(url) => {
            let db = DbClient::connect(&config.database, url)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(db.repositories())
        }
        None => {
            tracing::warn!("No database URL configured, using the in-memory store");
            Ok(Repositories::in_memory())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinestay_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting CineStay API on port {} ({})", config.server.port, config.server.run_mode);

    let repos = repositories(&config).await?;

    let pay2s = Pay2sClient::new(pay2s_config(&config)).context("Failed to build Pay2S client")?;
    let verifier = Pay2sVerifier::new(
        &config.pay2s.partner_code,
        &config.pay2s.access_key,
        &config.pay2s.secret_key,
    );
    let ttlock = TtlockClient::new(ttlock_config(&config)).context("Failed to build TTLock client")?;

    let settings = ApiSettings::from_config(&config);
    if !settings.development && settings.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set; cron endpoints will reject every request");
    }

    let state = AppState::new(repos, Arc::new(pay2s), Arc::new(ttlock), verifier, settings);

    worker::start_cron_workers(state.clone());

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
