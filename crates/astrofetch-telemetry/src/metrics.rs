//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters cover transfers, retries, throttling, batches, and tracker saves.

use std::fmt;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across components.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    transfers_total: IntCounterVec,
    transfer_bytes_total: IntCounter,
    transfer_retries_total: IntCounter,
    rate_limit_waits_total: IntCounter,
    batches_total: IntCounter,
    tracker_saves_total: IntCounterVec,
    queue_depth: IntGauge,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Successful transfers.
    pub transfers_succeeded: u64,
    /// Failed transfers, excluding cancellations.
    pub transfers_failed: u64,
    /// Bytes written by successful transfers.
    pub transfer_bytes_total: u64,
    /// Retries scheduled after transient failures.
    pub transfer_retries_total: u64,
    /// Acquisitions that had to wait for the rate window.
    pub rate_limit_waits_total: u64,
    /// Batches dispatched.
    pub batches_total: u64,
    /// Tracker saves that failed.
    pub tracker_save_failures: u64,
    /// Tasks in the batch currently executing.
    pub queue_depth: i64,
}

impl Metrics {
    /// Construct a registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let transfers_total = register(
            &registry,
            "transfers_total",
            IntCounterVec::new(
                Opts::new("transfers_total", "Transfer tasks by terminal outcome"),
                &["outcome"],
            ),
        )?;
        let transfer_bytes_total = register(
            &registry,
            "transfer_bytes_total",
            IntCounter::with_opts(Opts::new(
                "transfer_bytes_total",
                "Bytes written by successful transfers",
            )),
        )?;
        let transfer_retries_total = register(
            &registry,
            "transfer_retries_total",
            IntCounter::with_opts(Opts::new(
                "transfer_retries_total",
                "Retries scheduled after transient failures",
            )),
        )?;
        let rate_limit_waits_total = register(
            &registry,
            "rate_limit_waits_total",
            IntCounter::with_opts(Opts::new(
                "rate_limit_waits_total",
                "Rate limiter acquisitions that waited for the window",
            )),
        )?;
        let batches_total = register(
            &registry,
            "batches_total",
            IntCounter::with_opts(Opts::new("batches_total", "Batches dispatched")),
        )?;
        let tracker_saves_total = register(
            &registry,
            "tracker_saves_total",
            IntCounterVec::new(
                Opts::new("tracker_saves_total", "Tracker saves by result"),
                &["result"],
            ),
        )?;
        let queue_depth = register(
            &registry,
            "queue_depth",
            IntGauge::with_opts(Opts::new("queue_depth", "Tasks in the executing batch")),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                transfers_total,
                transfer_bytes_total,
                transfer_retries_total,
                rate_limit_waits_total,
                batches_total,
                tracker_saves_total,
                queue_depth,
            }),
        })
    }

    /// Count a terminal transfer outcome (`succeeded`, `failed`, ...).
    pub fn inc_transfer(&self, outcome: &str) {
        self.inner
            .transfers_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Add bytes written by a successful transfer.
    pub fn add_transfer_bytes(&self, bytes: u64) {
        self.inner.transfer_bytes_total.inc_by(bytes);
    }

    /// Count a scheduled retry.
    pub fn inc_retry(&self) {
        self.inner.transfer_retries_total.inc();
    }

    /// Count a rate limiter acquisition that had to wait.
    pub fn inc_rate_limit_wait(&self) {
        self.inner.rate_limit_waits_total.inc();
    }

    /// Count a dispatched batch.
    pub fn inc_batch(&self) {
        self.inner.batches_total.inc();
    }

    /// Count a tracker save by result (`ok` or `error`).
    pub fn inc_tracker_save(&self, result: &str) {
        self.inner
            .tracker_saves_total
            .with_label_values(&[result])
            .inc();
    }

    /// Set the executing batch size.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or produces invalid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = &self.inner;
        MetricsSnapshot {
            transfers_succeeded: inner.transfers_total.with_label_values(&["succeeded"]).get(),
            transfers_failed: inner.transfers_total.with_label_values(&["failed"]).get(),
            transfer_bytes_total: inner.transfer_bytes_total.get(),
            transfer_retries_total: inner.transfer_retries_total.get(),
            rate_limit_waits_total: inner.rate_limit_waits_total.get(),
            batches_total: inner.batches_total.get(),
            tracker_save_failures: inner.tracker_saves_total.with_label_values(&["error"]).get(),
            queue_depth: inner.queue_depth.get(),
        }
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: Result<C, prometheus::Error>,
) -> TelemetryResult<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_updates() -> TelemetryResult<()> {
        let metrics = Metrics::new()?;
        metrics.inc_transfer("succeeded");
        metrics.inc_transfer("succeeded");
        metrics.inc_transfer("failed");
        metrics.add_transfer_bytes(2_048);
        metrics.inc_retry();
        metrics.inc_rate_limit_wait();
        metrics.inc_batch();
        metrics.inc_tracker_save("ok");
        metrics.inc_tracker_save("error");
        metrics.set_queue_depth(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transfers_succeeded, 2);
        assert_eq!(snapshot.transfers_failed, 1);
        assert_eq!(snapshot.transfer_bytes_total, 2_048);
        assert_eq!(snapshot.transfer_retries_total, 1);
        assert_eq!(snapshot.rate_limit_waits_total, 1);
        assert_eq!(snapshot.batches_total, 1);
        assert_eq!(snapshot.tracker_save_failures, 1);
        assert_eq!(snapshot.queue_depth, 7);

        let rendered = metrics.render()?;
        assert!(rendered.contains("transfers_total"));
        assert!(rendered.contains("tracker_saves_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> TelemetryResult<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_batch();
        assert_eq!(second.snapshot().batches_total, 0);
        Ok(())
    }
}
