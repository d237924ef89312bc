//! Fail-fast supervision of the durable-store connection.
//!
//! The watchdog is a two-state machine driven by an external health
//! predicate. It holds no backoff logic of its own: deciding *whether*
//! traffic should flow belongs to the [`HealthCheck`] collaborator
//! (typically [`FailureBackoff`]); the watchdog only starts, stops, and
//! heartbeats the managed resource accordingly.

use crate::core::config::WatchdogConfig;
use crate::storage::buffered::BufferedStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External judge of whether traffic should currently be sent to the
/// durable store.
pub trait HealthCheck: Send + Sync {
    /// True when the managed resource should be receiving traffic.
    fn proceed(&self) -> bool;

    /// Diagnostic only: true while failures are outstanding. Never
    /// consulted by the watchdog state machine.
    fn is_in_failure_mode(&self) -> bool;
}

/// Lifecycle hooks of the resource the watchdog supervises.
///
/// All hooks are side-effecting with no return value; a resource logs its
/// own failures rather than propagating them to the watchdog.
#[async_trait::async_trait]
pub trait ManagedResource: Send + Sync {
    /// Bring the resource up after a stopped period.
    async fn on_start(&self);

    /// Take the resource down; invoked on every unhealthy tick.
    async fn on_stop(&self);

    /// Periodic tick, delivered regardless of health state.
    async fn heartbeat(&self);

    /// Idempotent re-affirmation while already started; cheaper than a
    /// full start.
    async fn ensure_started(&self);
}

/// Supervision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Resource is up and receiving traffic
    Started,
    /// Resource is down or paused
    Stopped,
}

/// Two-state fail-fast supervisor.
pub struct Watchdog {
    state: WatchdogState,
}

impl Watchdog {
    /// Create a watchdog in the initial `Stopped` state.
    pub fn new() -> Self {
        Self {
            state: WatchdogState::Stopped,
        }
    }

    /// Current supervision state.
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// One supervision tick.
    ///
    /// The heartbeat is delivered unconditionally, so buffer flushing keeps
    /// ticking even while the store is degraded. A healthy tick starts the
    /// resource on the stopped-to-started edge and re-affirms it otherwise;
    /// an unhealthy tick stops the resource every time, not only on the
    /// transition edge.
    pub async fn check(&mut self, health: &dyn HealthCheck, resource: &dyn ManagedResource) {
        resource.heartbeat().await;

        if health.proceed() {
            match self.state {
                WatchdogState::Stopped => {
                    resource.on_start().await;
                    self.state = WatchdogState::Started;
                    tracing::info!("watchdog started managed resource");
                },
                WatchdogState::Started => resource.ensure_started().await,
            }
        } else {
            resource.on_stop().await;
            if self.state == WatchdogState::Started {
                tracing::warn!("health check vetoed traffic, stopping managed resource");
            }
            self.state = WatchdogState::Stopped;
        }
    }

    /// Drive `check` on a fixed interval until `shutdown` trips.
    pub async fn run(
        mut self,
        health: Arc<dyn HealthCheck>,
        resource: Arc<dyn ManagedResource>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        while !shutdown.load(Ordering::Relaxed) {
            ticker.tick().await;
            self.check(health.as_ref(), resource.as_ref()).await;
        }
        tracing::debug!("watchdog loop shut down");
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

struct BackoffState {
    consecutive_failures: u32,
    retry_at: Option<Instant>,
}

/// [`HealthCheck`] backed by exponential backoff after recorded failures.
///
/// Each consecutive failure doubles the veto window, capped at the
/// configured maximum and stretched by up to 10% jitter; a recorded success
/// clears the failure state entirely.
pub struct FailureBackoff {
    initial_backoff: Duration,
    max_backoff: Duration,
    inner: Mutex<BackoffState>,
}

impl FailureBackoff {
    /// Create a backoff judge with explicit bounds.
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            inner: Mutex::new(BackoffState {
                consecutive_failures: 0,
                retry_at: None,
            }),
        }
    }

    /// Create a backoff judge from watchdog configuration.
    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(config.initial_backoff, config.max_backoff)
    }

    /// Record a successful store interaction, clearing the failure state.
    pub fn record_success(&self) {
        let mut state = self.inner.lock();
        if state.consecutive_failures > 0 {
            tracing::info!(
                failures = state.consecutive_failures,
                "store recovered, clearing backoff"
            );
        }
        state.consecutive_failures = 0;
        state.retry_at = None;
    }

    /// Record a failed store interaction, extending the veto window.
    pub fn record_failure(&self) {
        let mut state = self.inner.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        let exponent = state.consecutive_failures.saturating_sub(1).min(32);
        let mut backoff = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent));
        if backoff > self.max_backoff {
            backoff = self.max_backoff;
        }
        let jitter = backoff.mul_f64(rand::random::<f64>() * 0.1);
        state.retry_at = Some(Instant::now() + backoff + jitter);

        tracing::warn!(
            failures = state.consecutive_failures,
            backoff_ms = backoff.as_millis() as u64,
            "store failure recorded, vetoing traffic"
        );
    }
}

impl HealthCheck for FailureBackoff {
    fn proceed(&self) -> bool {
        self.inner
            .lock()
            .retry_at
            .map_or(true, |at| Instant::now() >= at)
    }

    fn is_in_failure_mode(&self) -> bool {
        self.inner.lock().consecutive_failures > 0
    }
}

/// [`ManagedResource`] adapter driving a [`BufferedStore`]'s heartbeat and
/// feeding flush outcomes back into a [`FailureBackoff`].
///
/// Start/stop of the actual store connection belongs to the store adapter;
/// this resource logs those edges and owns only the flush ticking.
pub struct AggregatorResource {
    aggregator: Arc<BufferedStore>,
    backoff: Arc<FailureBackoff>,
}

impl AggregatorResource {
    /// Wire an aggregator to a backoff judge.
    pub fn new(aggregator: Arc<BufferedStore>, backoff: Arc<FailureBackoff>) -> Self {
        Self { aggregator, backoff }
    }
}

#[async_trait::async_trait]
impl ManagedResource for AggregatorResource {
    async fn on_start(&self) {
        tracing::info!("aggregator resuming writes to durable store");
    }

    async fn on_stop(&self) {
        tracing::debug!("aggregator paused, buffered windows held in memory");
    }

    async fn heartbeat(&self) {
        match self.aggregator.heartbeat().await {
            Ok(()) => self.backoff.record_success(),
            Err(err) => {
                tracing::warn!("heartbeat flush failed: {}", err);
                self.backoff.record_failure();
            },
        }
    }

    async fn ensure_started(&self) {}
}
