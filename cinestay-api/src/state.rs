use std::sync::Arc;
use std::time::Duration;
use chrono::{FixedOffset, Offset, Utc};
use tokio::sync::broadcast;
use cinestay_booking::{BookingService, ExpirySweeper, IpnReconciler, RoomAccess};
use cinestay_catalog::PricingEngine;
use cinestay_core::lock::SmartLock;
use cinestay_core::payment::PaymentGateway;
use cinestay_pay2s::Pay2sVerifier;
use cinestay_shared::models::events::PaymentEvent;
use cinestay_store::app_config::{BookingRules, Config, CronConfig};
use cinestay_store::{Repositories, TtlCache};

use crate::cron::JobRegistry;
use crate::middleware::resiliency::ResiliencyState;

/// Runtime switches the HTTP layer needs beyond the services themselves.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Development mode opens the cron endpoints without a bearer token.
    pub development: bool,
    pub cron_secret: Option<String>,
    pub cron: CronConfig,
    pub rules: BookingRules,
    pub cors_origins: Vec<String>,
}

impl ApiSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            development: config.server.is_development(),
            cron_secret: config.cron.secret.clone(),
            cron: config.cron.clone(),
            rules: config.booking.clone(),
            cors_origins: config.server.cors_origins.clone(),
        }
    }

    /// Offset of the business's local calendar day.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.rules.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub booking_service: Arc<BookingService>,
    pub reconciler: Arc<IpnReconciler>,
    pub sweeper: Arc<ExpirySweeper>,
    pub room_access: Arc<RoomAccess>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: Arc<Pay2sVerifier>,
    pub lock: Arc<dyn SmartLock>,
    pub cache: Arc<TtlCache>,
    pub sse_tx: broadcast::Sender<PaymentEvent>,
    pub jobs: Arc<JobRegistry>,
    pub resiliency: Arc<ResiliencyState>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    /// Wire the services over a repository set and the two vendor integrations.
    pub fn new(
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        lock: Arc<dyn SmartLock>,
        verifier: Pay2sVerifier,
        settings: ApiSettings,
    ) -> Self {
        let (sse_tx, _) = broadcast::channel(100);
        let rules = &settings.rules;

        let booking_service = BookingService::new(
            repos.bookings.clone(),
            repos.rooms.clone(),
            repos.combos.clone(),
            repos.menu.clone(),
            PricingEngine::default(),
            chrono::Duration::minutes(rules.payment_timeout_minutes),
        );
        let reconciler = IpnReconciler::new(repos.bookings.clone(), repos.payments.clone(), sse_tx.clone());
        let sweeper = ExpirySweeper::new(
            repos.bookings.clone(),
            sse_tx.clone(),
            chrono::Duration::minutes(rules.pending_grace_minutes),
        );
        let room_access = RoomAccess::new(
            repos.bookings.clone(),
            repos.rooms.clone(),
            lock.clone(),
            chrono::Duration::minutes(rules.unlock_early_minutes),
        );
        let cache = TtlCache::new(Duration::from_secs(rules.cache_ttl_seconds));
        let jobs = JobRegistry::from_settings(&settings.cron);

        Self {
            repos,
            booking_service: Arc::new(booking_service),
            reconciler: Arc::new(reconciler),
            sweeper: Arc::new(sweeper),
            room_access: Arc::new(room_access),
            gateway,
            verifier: Arc::new(verifier),
            lock,
            cache: Arc::new(cache),
            sse_tx,
            jobs: Arc::new(jobs),
            resiliency: Arc::new(ResiliencyState::new()),
            settings: Arc::new(settings),
        }
    }
}
