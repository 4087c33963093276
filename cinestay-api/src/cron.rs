use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use parking_lot::RwLock;
use cinestay_core::CoreResult;
use cinestay_shared::ApiResponse;
use cinestay_store::app_config::CronConfig;

use crate::error::{ApiResult, AppError};
use crate::extract::ApiPath;
use crate::state::AppState;

pub const EXPIRE_UNPAID_BOOKINGS: &str = "expire-unpaid-bookings";
pub const COMPLETE_FINISHED_BOOKINGS: &str = "complete-finished-bookings";
pub const PURGE_RESPONSE_CACHE: &str = "purge-response-cache";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum JobOutcome {
    Ok { affected: usize },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub name: String,
    pub interval_seconds: u64,
    pub running: bool,
    pub runs: u64,
    pub failures: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<JobOutcome>,
}

impl JobStatus {
    fn new(name: &str, interval_seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            interval_seconds,
            running: false,
            runs: 0,
            failures: 0,
            last_started_at: None,
            last_finished_at: None,
            last_outcome: None,
        }
    }
}

/// Bookkeeping for the in-process background jobs.
pub struct JobRegistry {
    jobs: RwLock<BTreeMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new(jobs: &[(&str, u64)]) -> Self {
        let jobs = jobs
            .iter()
            .map(|(name, interval)| (name.to_string(), JobStatus::new(name, *interval)))
            .collect();
        Self { jobs: RwLock::new(jobs) }
    }

    pub fn from_settings(cron: &CronConfig) -> Self {
        Self::new(&[
            (EXPIRE_UNPAID_BOOKINGS, cron.expire_interval_seconds),
            (COMPLETE_FINISHED_BOOKINGS, cron.complete_interval_seconds),
            (PURGE_RESPONSE_CACHE, cron.purge_interval_seconds),
        ])
    }

    pub fn snapshot(&self) -> Vec<JobStatus> {
        self.jobs.read().values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<JobStatus> {
        self.jobs.read().get(name).cloned()
    }

    /// Mark a job as started. Fails when it is unknown or already running.
    /// The job stays marked until the returned guard is finished or dropped.
    fn start<'a>(&'a self, name: &'a str, now: DateTime<Utc>) -> ApiResult<RunGuard<'a>> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job '{}'", name)))?;
        if job.running {
            return Err(AppError::Conflict(format!("Job '{}' is already running", name)));
        }
        job.running = true;
        job.last_started_at = Some(now);
        Ok(RunGuard { registry: self, name, finished: false })
    }

    fn finish(&self, name: &str, outcome: JobOutcome, now: DateTime<Utc>) -> Option<JobStatus> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(name)?;
        job.running = false;
        job.runs += 1;
        if matches!(outcome, JobOutcome::Error { .. }) {
            job.failures += 1;
        }
        job.last_finished_at = Some(now);
        job.last_outcome = Some(outcome);
        Some(job.clone())
    }
}

/// One in-flight run. Dropping it unfinished (the caller's future was
/// cancelled) records the run as failed and frees the job.
struct RunGuard<'a> {
    registry: &'a JobRegistry,
    name: &'a str,
    finished: bool,
}

impl RunGuard<'_> {
    fn finish(mut self, outcome: JobOutcome) -> Option<JobStatus> {
        self.finished = true;
        self.registry.finish(self.name, outcome, Utc::now())
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(job = self.name, "Cron job was cancelled before it finished");
            self.registry.finish(
                self.name,
                JobOutcome::Error { message: "cancelled".to_string() },
                Utc::now(),
            );
        }
    }
}

async fn execute(state: &AppState, name: &str) -> CoreResult<usize> {
    let now = Utc::now();
    match name {
        EXPIRE_UNPAID_BOOKINGS => state.sweeper.expire_unpaid(now).await,
        COMPLETE_FINISHED_BOOKINGS => state.sweeper.complete_finished(now).await,
        PURGE_RESPONSE_CACHE => Ok(state.cache.purge_expired()),
        other => Err(cinestay_core::CoreError::NotFound(format!("Job '{}'", other))),
    }
}

/// Run a registered job once and record the result. A failing job is
/// reported in its status rather than as an error.
pub async fn run_job(state: &AppState, name: &str) -> ApiResult<JobStatus> {
    let run = state.jobs.start(name, Utc::now())?;

    let outcome = match execute(state, name).await {
        Ok(affected) => {
            if affected > 0 {
                tracing::info!(job = name, affected, "Cron job finished");
            }
            JobOutcome::Ok { affected }
        }
        Err(e) => {
            tracing::error!(job = name, "Cron job failed: {}", e);
            JobOutcome::Error { message: e.to_string() }
        }
    };

    run.finish(outcome)
        .ok_or_else(|| AppError::NotFound(format!("Unknown job '{}'", name)))
}

/// Bearer guard for the cron endpoints. Development mode skips it; otherwise a
/// configured secret is required and must match exactly.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if state.settings.development {
        return Ok(());
    }

    let Some(secret) = state.settings.cron_secret.as_deref().filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("Cron endpoint called but no cron secret is configured");
        return Err(AppError::Unauthorized("Unauthorized".to_string()));
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if provided.is_empty() || provided.as_bytes().ct_eq(secret.as_bytes()).unwrap_u8() != 1 {
        return Err(AppError::Unauthorized("Unauthorized".to_string()));
    }
    Ok(())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cron/status", get(cron_status))
        .route("/api/cron/run/{job}", post(run_now))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStatusResponse {
    pub server_time: DateTime<Utc>,
    pub jobs: Vec<JobStatus>,
}

/// GET /api/cron/status
async fn cron_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ApiResponse<CronStatusResponse>>> {
    authorize(&state, &headers)?;
    Ok(Json(ApiResponse::ok(CronStatusResponse {
        server_time: Utc::now(),
        jobs: state.jobs.snapshot(),
    })))
}

/// POST /api/cron/run/{job}
async fn run_now(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(job): ApiPath<String>,
) -> ApiResult<Json<ApiResponse<JobStatus>>> {
    authorize(&state, &headers)?;
    let status = run_job(&state, &job).await?;
    Ok(Json(ApiResponse::ok(status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_registry_tracks_runs() {
        let registry = JobRegistry::new(&[("a", 60)]);

        let run = registry.start("a", Utc::now()).unwrap();
        assert!(registry.get("a").unwrap().running);
        assert!(registry.start("a", Utc::now()).is_err());

        let status = run.finish(JobOutcome::Error { message: "db down".into() }).unwrap();
        assert!(!status.running);
        assert_eq!(status.runs, 1);
        assert_eq!(status.failures, 1);

        let run = registry.start("a", Utc::now()).unwrap();
        let status = run.finish(JobOutcome::Ok { affected: 2 }).unwrap();
        assert_eq!(status.runs, 2);
        assert_eq!(status.failures, 1);
        assert_eq!(status.last_outcome, Some(JobOutcome::Ok { affected: 2 }));
    }

    #[tokio::test]
    async fn test_cancelled_run_frees_the_job() {
        let registry = JobRegistry::new(&[("a", 60)]);

        let slow_run = async {
            let _run = registry.start("a", Utc::now())?;
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, AppError>(())
        };
        assert!(tokio::time::timeout(Duration::from_millis(20), slow_run).await.is_err());

        let status = registry.get("a").unwrap();
        assert!(!status.running);
        assert_eq!(status.failures, 1);
        assert_eq!(status.last_outcome, Some(JobOutcome::Error { message: "cancelled".into() }));

        let run = registry.start("a", Utc::now()).unwrap();
        assert_eq!(run.finish(JobOutcome::Ok { affected: 0 }).unwrap().runs, 2);
    }

    #[test]
    fn test_unknown_job_is_not_found() {
        let registry = JobRegistry::new(&[("a", 60)]);
        let err = registry.start("b", Utc::now()).err().unwrap();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_default_jobs() {
        let registry = JobRegistry::from_settings(&CronConfig::default());
        assert_eq!(registry.get(EXPIRE_UNPAID_BOOKINGS).unwrap().interval_seconds, 60);
        assert_eq!(registry.get(COMPLETE_FINISHED_BOOKINGS).unwrap().interval_seconds, 300);
        assert_eq!(registry.get(PURGE_RESPONSE_CACHE).unwrap().interval_seconds, 300);
    }
}
