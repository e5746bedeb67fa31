//! Sliding-window limiter on transfer-initiating requests.
//!
//! # Design
//! - One grant log shared by every worker, guarded by a single async mutex.
//! - The mutex is held across the wait, so callers are admitted in the order
//!   they queued on the lock and no worker starves.
//! - Admission is decided by a pure function of the log and `now`, which keeps
//!   the window arithmetic testable without a runtime.

use std::collections::VecDeque;
use std::time::Duration;

use astrofetch_config::DownloadConfig;
use astrofetch_telemetry::Metrics;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::debug;

/// Bounds request starts to `quota` per rolling `window`.
#[derive(Debug)]
pub struct RateLimiter {
    quota: u32,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
    metrics: Option<Metrics>,
}

impl RateLimiter {
    /// Limiter admitting `quota` requests per `window`. A zero quota or window
    /// disables limiting.
    #[must_use]
    pub fn new(quota: u32, window: Duration) -> Self {
        Self {
            quota,
            window,
            grants: Mutex::new(VecDeque::with_capacity(quota.min(1_024) as usize)),
            metrics: None,
        }
    }

    /// Limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Limiter from the `download` configuration section.
    #[must_use]
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self::new(config.rate_limit, config.rate_window())
    }

    /// Count waits in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether `acquire` can ever wait.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.quota > 0 && !self.window.is_zero()
    }

    /// Wait until one more request fits in the window, then record it.
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }
        let mut grants = self.grants.lock().await;
        loop {
            match admit(&mut grants, self.quota, self.window, Instant::now()) {
                Ok(()) => return,
                Err(ready_at) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_rate_limit_wait();
                    }
                    debug!(
                        wait_ms = ready_at
                            .saturating_duration_since(Instant::now())
                            .as_millis(),
                        "rate window full"
                    );
                    time::sleep_until(ready_at).await;
                }
            }
        }
    }
}

/// Record a grant at `now` if the window has room; otherwise return when the
/// oldest grant leaves the window.
fn admit(
    grants: &mut VecDeque<Instant>,
    quota: u32,
    window: Duration,
    now: Instant,
) -> Result<(), Instant> {
    while grants
        .front()
        .is_some_and(|granted| now.saturating_duration_since(*granted) >= window)
    {
        grants.pop_front();
    }
    if grants.len() < quota as usize {
        grants.push_back(now);
        return Ok(());
    }
    grants.front().map_or(Ok(()), |oldest| Err(*oldest + window))
}
