//! Circuit breaker state machine
//!
//! Closed until `max_failures` consecutive failures, then open: calls are
//! rejected without running until `reset_timeout` elapses, after which one
//! probe call runs half-open. A probe success closes the breaker, a probe
//! failure reopens it. A call exceeding the configured call timeout counts
//! as a failure.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use svcbase_api::BreakerConfig;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum BreakerError {
    #[error("circuit breaker '{0}' is open")]
    Open(String),

    #[error("protected call timed out after {0:?}")]
    Timeout(Duration),

    #[error("protected call failed: {0}")]
    Operation(#[from] anyhow::Error),
}

/// Breaker state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Running totals for observability
#[derive(Clone, Debug, Default)]
pub struct BreakerStats {
    pub total_calls: u64,
    pub successes: u64,
    pub failures: u64,
    /// Calls rejected without running because the breaker was open
    pub rejections: u64,
    pub last_state_change: Option<DateTime<Utc>>,
}

impl BreakerStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        self.successes as f64 / self.total_calls as f64
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    stats: BreakerStats,
}

/// Circuit breaker shared by all protected outbound calls of a process
pub struct CircuitBreaker {
    name: String,
    max_failures: u32,
    call_timeout: Duration,
    reset_timeout: Duration,
    fallback_on_failure: bool,
    inner: RwLock<Inner>,
}

impl CircuitBreaker {
    /// Build a breaker from the `circuit-breaker` config section.
    ///
    /// `fallback_on_failure` is fixed to true; it is not a config key.
    pub fn from_config(config: &BreakerConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_failures: config.max_failures.max(1),
            call_timeout: config.call_timeout(),
            reset_timeout: config.reset_timeout(),
            fallback_on_failure: true,
            inner: RwLock::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                stats: BreakerStats::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    pub fn fallback_on_failure(&self) -> bool {
        self.fallback_on_failure
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }

    pub async fn stats(&self) -> BreakerStats {
        self.inner.read().await.stats.clone()
    }

    /// Run a protected call.
    ///
    /// Rejected immediately with `BreakerError::Open` while the breaker is
    /// open; the call timeout is enforced here and a timeout counts toward
    /// the failure threshold.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, BreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.admit().await?;

        let result = tokio::time::timeout(self.call_timeout, operation()).await;
        match result {
            Ok(Ok(value)) => {
                self.on_success().await;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.on_failure().await;
                Err(BreakerError::Operation(e))
            }
            Err(_) => {
                self.on_failure().await;
                Err(BreakerError::Timeout(self.call_timeout))
            }
        }
    }

    /// Run a protected call, producing the fallback value on any failure
    /// (open breaker, timeout or call error).
    pub async fn execute_with_fallback<F, Fut, T, FB>(&self, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        FB: FnOnce(&BreakerError) -> T,
    {
        match self.execute(operation).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Breaker '{}' falling back: {}", self.name, e);
                fallback(&e)
            }
        }
    }

    /// Decide whether a call may proceed, moving open -> half-open when the
    /// reset timeout has elapsed.
    async fn admit(&self) -> Result<(), BreakerError> {
        let mut inner = self.inner.write().await;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => {
                inner.stats.total_calls += 1;
                Ok(())
            }
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.reset_timeout {
                    Self::transition(&mut inner, BreakerState::HalfOpen, &self.name);
                    inner.stats.total_calls += 1;
                    Ok(())
                } else {
                    inner.stats.rejections += 1;
                    Err(BreakerError::Open(self.name.clone()))
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.write().await;
        inner.stats.successes += 1;
        inner.consecutive_failures = 0;
        if inner.state != BreakerState::Closed {
            Self::transition(&mut inner, BreakerState::Closed, &self.name);
            inner.opened_at = None;
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.stats.failures += 1;
        inner.consecutive_failures += 1;

        let should_open = inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= self.max_failures;
        if should_open && inner.state != BreakerState::Open {
            warn!(
                "Breaker '{}' opening after {} consecutive failures",
                self.name, inner.consecutive_failures
            );
            Self::transition(&mut inner, BreakerState::Open, &self.name);
        }
        if inner.state == BreakerState::Open {
            inner.opened_at = Some(Instant::now());
        }
    }

    fn transition(inner: &mut Inner, next: BreakerState, name: &str) {
        info!("Breaker '{}': {:?} -> {:?}", name, inner.state, next);
        inner.state = next;
        inner.stats.last_state_change = Some(Utc::now());
    }
}
