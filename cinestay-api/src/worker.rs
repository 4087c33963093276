use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::cron::{run_job, COMPLETE_FINISHED_BOOKINGS, EXPIRE_UNPAID_BOOKINGS, PURGE_RESPONSE_CACHE};
use crate::state::AppState;

/// Start one interval task per registered cleanup job.
pub fn start_cron_workers(state: AppState) -> Vec<JoinHandle<()>> {
    let cron = state.settings.cron.clone();
    [
        (EXPIRE_UNPAID_BOOKINGS, cron.expire_interval_seconds),
        (COMPLETE_FINISHED_BOOKINGS, cron.complete_interval_seconds),
        (PURGE_RESPONSE_CACHE, cron.purge_interval_seconds),
    ]
    .into_iter()
    .map(|(name, seconds)| {
        let state = state.clone();
        tokio::spawn(run_every(state, name, Duration::from_secs(seconds.max(1))))
    })
    .collect()
}

async fn run_every(state: AppState, name: &'static str, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(job = name, every_secs = period.as_secs(), "Cron worker started");

    loop {
        ticker.tick().await;
        // Job failures are recorded in the registry; an error here means the
        // job was already running from a manual trigger.
        if let Err(e) = run_job(&state, name).await {
            debug!(job = name, error = ?e, "Skipped scheduled run");
        }
    }
}
