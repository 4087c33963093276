use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

pub const FAILURE_THRESHOLD: u32 = 5;
pub const RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    /// Failing fast until the reset timeout elapses.
    Open,
    /// Letting traffic probe whether the vendor is back.
    HalfOpen,
}

struct BreakerState {
    circuit: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Trips after `failure_threshold` consecutive 5xx answers from a vendor-backed route.
pub struct CircuitBreaker {
    pub name: &'static str,
    failure_threshold: u32,
    reset_timeout: Duration,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name,
            failure_threshold,
            reset_timeout,
            state: RwLock::new(BreakerState {
                circuit: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.circuit
    }

    /// Whether a request may go through right now.
    pub async fn check(&self) -> bool {
        {
            let state = self.state.read().await;
            match state.circuit {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open => {
                    let cooled_down = state
                        .opened_at
                        .map(|at| at.elapsed() >= self.reset_timeout)
                        .unwrap_or(true);
                    if !cooled_down {
                        return false;
                    }
                }
            }
        }

        let mut state = self.state.write().await;
        if state.circuit == CircuitState::Open {
            state.circuit = CircuitState::HalfOpen;
            tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
        }
        true
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if state.circuit == CircuitState::HalfOpen {
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        }
        state.circuit = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        state.consecutive_failures += 1;

        if state.consecutive_failures >= self.failure_threshold || state.circuit == CircuitState::HalfOpen {
            if state.circuit != CircuitState::Open {
                tracing::error!(
                    "Circuit Breaker [{}] TRIPPED to Open. Failures: {}",
                    self.name,
                    state.consecutive_failures
                );
            }
            state.circuit = CircuitState::Open;
            state.opened_at = Some(Instant::now());
        }
    }
}

/// One breaker per outbound vendor.
pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
    pub lock_cb: CircuitBreaker,
}

impl ResiliencyState {
    pub fn new() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("pay2s", FAILURE_THRESHOLD, RESET_TIMEOUT),
            lock_cb: CircuitBreaker::new("ttlock", FAILURE_THRESHOLD, RESET_TIMEOUT),
        }
    }

    pub fn breaker_for(&self, path: &str) -> Option<&CircuitBreaker> {
        if path == "/api/payment/create" {
            Some(&self.payment_cb)
        } else if path.ends_with("/unlock") {
            Some(&self.lock_cb)
        } else {
            None
        }
    }
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(cb) = state.resiliency.breaker_for(req.uri().path()) else {
        return next.run(req).await;
    };

    if !cb.check().await {
        return AppError::ServiceUnavailable(format!("{} is temporarily unavailable, retry later", cb.name))
            .into_response();
    }

    let response = next.run(req).await;

    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }

    response
}
