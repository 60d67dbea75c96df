//! Circuit breaker guarding the primary ranking source.
//!
//! While the breaker is open the resolver skips the ranking call and serves
//! the recency fallback directly. State is process-wide; it is the only
//! shared mutable state in the service.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::CircuitBreakerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    opened_at: Option<DateTime<Utc>>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreaker {
    state: Arc<Mutex<BreakerState>>,
    settings: CircuitBreakerSettings,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitBreakerSettings) -> Self {
        debug!(
            failure_threshold = settings.failure_threshold,
            success_threshold = settings.success_threshold,
            timeout_secs = settings.timeout_seconds,
            "ranking circuit breaker created"
        );

        Self {
            state: Arc::new(Mutex::new(BreakerState::default())),
            settings,
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Whether a call may go through right now. Moves Open -> HalfOpen once
    /// the open timeout has elapsed.
    pub async fn allow(&self) -> bool {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map(|opened| Utc::now().signed_duration_since(opened))
                    .unwrap_or_else(Duration::zero);

                if elapsed >= Duration::seconds(self.settings.timeout_seconds) {
                    debug!(
                        from = state.state.as_str(),
                        to = CircuitState::HalfOpen.as_str(),
                        elapsed_secs = elapsed.num_seconds(),
                        "ranking breaker half-open"
                    );
                    state.state = CircuitState::HalfOpen;
                    state.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::Closed => state.failure_count = 0,
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.settings.success_threshold {
                    debug!(
                        from = state.state.as_str(),
                        to = CircuitState::Closed.as_str(),
                        "ranking breaker closed"
                    );
                    *state = BreakerState::default();
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.failure_count += 1;

        let trips = match state.state {
            CircuitState::Closed => state.failure_count >= self.settings.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trips {
            warn!(
                from = state.state.as_str(),
                to = CircuitState::Open.as_str(),
                failures = state.failure_count,
                "ranking breaker opened, serving recency fallback"
            );
            state.state = CircuitState::Open;
            state.success_count = 0;
            state.opened_at = Some(Utc::now());
        }
    }
}
