//! Worker pool that turns transfer tasks into terminal results.
//!
//! # Design
//! - Every task of a batch is spawned up front and waits on a semaphore sized
//!   to the worker count; results are handed to the caller in completion
//!   order, by ownership.
//! - `run_batch` returns only after every task has exactly one result,
//!   including tasks whose worker panicked (reported as `Internal`).
//! - Cancellation is observed before a task starts, while waiting on the
//!   limiter, during an attempt, and during backoff.
//! - Payloads stream into `<destination>.part` and are renamed into place, so
//!   an interrupted attempt never leaves a truncated file under the final
//!   name.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use astrofetch_config::DownloadConfig;
use astrofetch_core::{
    ControlFlags, Fetcher, SkipReason, TransferError, TransferErrorKind, TransferOutcome,
    TransferResult, TransferTask,
};
use astrofetch_telemetry::Metrics;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio::time::{self, Instant};
use tracing::{debug, error, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::limiter::RateLimiter;

const PARTIAL_SUFFIX: &str = ".part";
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Worker pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Tasks executing at once.
    pub workers: usize,
    /// Total attempts per task.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Upper bound on one attempt.
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

impl ExecutorConfig {
    /// Settings from the `download` configuration section.
    #[must_use]
    pub const fn from_config(config: &DownloadConfig) -> Self {
        Self {
            workers: config.workers,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            timeout: config.timeout(),
        }
    }

    /// Reject settings that would stall or never attempt a transfer.
    ///
    /// # Errors
    ///
    /// Returns an error when the worker count, attempt count, or timeout is
    /// zero.
    pub fn validate(self) -> ExecutorResult<Self> {
        if self.workers == 0 {
            return Err(ExecutorError::setting("workers", "must be positive", self.workers));
        }
        if self.max_retries == 0 {
            return Err(ExecutorError::setting(
                "max_retries",
                "must be positive",
                self.max_retries,
            ));
        }
        if self.timeout.is_zero() {
            return Err(ExecutorError::setting(
                "timeout",
                "must be positive",
                self.timeout.as_secs(),
            ));
        }
        Ok(self)
    }
}

/// Delay before the retry that follows attempt number `attempts`:
/// `base * 2^(attempts - 1)`.
#[must_use]
pub fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    base.saturating_mul(1_u32 << exponent)
}

/// Runs batches of transfer tasks on a bounded worker pool.
#[derive(Clone)]
pub struct TransferExecutor {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    config: ExecutorConfig,
    control: ControlFlags,
    metrics: Option<Metrics>,
}

impl std::fmt::Debug for TransferExecutor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TransferExecutor")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl TransferExecutor {
    /// Build an executor sharing `limiter` and `control` with its caller.
    ///
    /// # Errors
    ///
    /// Returns an error when `config` fails validation.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<RateLimiter>,
        config: ExecutorConfig,
        control: ControlFlags,
    ) -> ExecutorResult<Self> {
        Ok(Self {
            fetcher,
            limiter,
            config: config.validate()?,
            control,
            metrics: None,
        })
    }

    /// Record outcomes, bytes, retries, and queue depth in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Pool settings.
    #[must_use]
    pub const fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Flags observed by every worker.
    #[must_use]
    pub const fn control(&self) -> &ControlFlags {
        &self.control
    }

    /// Execute `tasks`, handing each result to `on_result` as it completes.
    /// Returns the number of results delivered, which always equals the
    /// number of tasks.
    pub async fn run_batch(
        &self,
        tasks: Vec<TransferTask>,
        mut on_result: impl FnMut(TransferResult),
    ) -> usize {
        let total = tasks.len();
        if total == 0 {
            return 0;
        }

        let worker = Arc::new(Worker {
            fetcher: Arc::clone(&self.fetcher),
            limiter: Arc::clone(&self.limiter),
            config: self.config,
            control: self.control.clone(),
            metrics: self.metrics.clone(),
        });
        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut spawned: HashMap<task::Id, TransferTask> = HashMap::with_capacity(total);
        let mut set = JoinSet::new();
        for transfer in tasks {
            let backup = transfer.clone();
            let handle = set.spawn(Arc::clone(&worker).execute(Arc::clone(&permits), transfer));
            spawned.insert(handle.id(), backup);
        }
        self.set_queue_depth(total);

        let mut delivered = 0;
        while let Some(joined) = set.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    spawned.remove(&id);
                    result
                }
                Err(err) => {
                    let Some(transfer) = spawned.remove(&err.id()) else {
                        error!(error = %err, "unknown transfer worker terminated");
                        continue;
                    };
                    error!(error = %err, item_id = %transfer.item_id(), "transfer worker terminated");
                    let attempts = transfer.attempts;
                    TransferResult {
                        task: transfer,
                        outcome: TransferOutcome::Failed {
                            kind: TransferErrorKind::Internal,
                            attempts,
                            message: err.to_string(),
                        },
                    }
                }
            };
            delivered += 1;
            self.record_outcome(&result.outcome);
            self.set_queue_depth(total - delivered);
            on_result(result);
        }
        delivered
    }

    /// Execute `tasks` and collect the results in completion order.
    pub async fn run_collect(&self, tasks: Vec<TransferTask>) -> Vec<TransferResult> {
        let mut results = Vec::with_capacity(tasks.len());
        self.run_batch(tasks, |result| results.push(result)).await;
        results
    }

    fn record_outcome(&self, outcome: &TransferOutcome) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.inc_transfer(outcome.label());
        if let TransferOutcome::Succeeded { bytes, .. } = outcome {
            metrics.add_transfer_bytes(*bytes);
        }
    }

    fn set_queue_depth(&self, depth: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_queue_depth(i64::try_from(depth).unwrap_or(i64::MAX));
        }
    }
}

struct Worker {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    config: ExecutorConfig,
    control: ControlFlags,
    metrics: Option<Metrics>,
}

impl Worker {
    async fn execute(
        self: Arc<Self>,
        permits: Arc<Semaphore>,
        mut task: TransferTask,
    ) -> TransferResult {
        let permit = tokio::select! {
            biased;
            () = self.control.cancelled() => None,
            permit = permits.acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            let outcome = if self.control.is_cancelled() {
                TransferOutcome::cancelled(task.attempts)
            } else {
                TransferOutcome::Failed {
                    kind: TransferErrorKind::Internal,
                    attempts: task.attempts,
                    message: "worker pool closed".to_string(),
                }
            };
            return TransferResult { task, outcome };
        };

        let outcome = self.attempt_until_terminal(&mut task).await;
        debug!(item_id = %task.item_id(), outcome = outcome.label(), attempts = task.attempts, "transfer finished");
        TransferResult { task, outcome }
    }

    async fn attempt_until_terminal(&self, task: &mut TransferTask) -> TransferOutcome {
        if self.control.is_cancelled() {
            return TransferOutcome::cancelled(task.attempts);
        }
        if !task.overwrite && fs::try_exists(&task.destination).await.unwrap_or(false) {
            return TransferOutcome::Skipped {
                reason: SkipReason::ExistsOnDisk,
            };
        }

        loop {
            tokio::select! {
                biased;
                () = self.control.cancelled() => return TransferOutcome::cancelled(task.attempts),
                () = self.limiter.acquire() => {}
            }

            task.attempts += 1;
            let started = Instant::now();
            let attempt = tokio::select! {
                biased;
                () = self.control.cancelled() => None,
                result = time::timeout(self.config.timeout, self.transfer_once(task)) => Some(result),
            };
            let error = match attempt {
                Some(Ok(Ok(bytes))) => {
                    return TransferOutcome::Succeeded {
                        bytes,
                        elapsed: started.elapsed(),
                    };
                }
                Some(Ok(Err(error))) => error,
                Some(Err(_)) => TransferError::timeout(format!(
                    "attempt exceeded {}ms",
                    self.config.timeout.as_millis()
                )),
                None => {
                    discard_partial(&task.destination).await;
                    return TransferOutcome::cancelled(task.attempts);
                }
            };
            discard_partial(&task.destination).await;

            let kind = error.kind();
            if !kind.is_retryable() || task.attempts >= self.config.max_retries {
                warn!(
                    item_id = %task.item_id(),
                    kind = %kind,
                    attempts = task.attempts,
                    detail = error.detail(),
                    "transfer failed"
                );
                return TransferOutcome::Failed {
                    kind,
                    attempts: task.attempts,
                    message: error.detail().to_string(),
                };
            }

            let delay = backoff_delay(self.config.retry_delay, task.attempts);
            warn!(
                item_id = %task.item_id(),
                kind = %kind,
                attempt = task.attempts,
                delay_ms = delay.as_millis(),
                "transfer attempt failed; retrying"
            );
            if let Some(metrics) = &self.metrics {
                metrics.inc_retry();
            }
            tokio::select! {
                biased;
                () = self.control.cancelled() => return TransferOutcome::cancelled(task.attempts),
                () = time::sleep(delay) => {}
            }
        }
    }

    async fn transfer_once(&self, task: &TransferTask) -> Result<u64, TransferError> {
        let destination = &task.destination;
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| filesystem("create directory", parent, &err))?;
        }

        let partial = partial_path(destination);
        let file = fs::File::create(&partial)
            .await
            .map_err(|err| filesystem("create file", &partial, &err))?;
        let mut writer = BufWriter::new(file);
        let bytes = self.fetcher.fetch(task.source_url(), &mut writer).await?;
        writer
            .flush()
            .await
            .map_err(|err| filesystem("flush", &partial, &err))?;
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|err| filesystem("sync", &partial, &err))?;
        fs::rename(&partial, destination)
            .await
            .map_err(|err| filesystem("rename", destination, &err))?;

        if let Some(captured) = task.item.captured_at {
            preserve_mtime(destination, captured);
        }
        Ok(bytes)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(ToOwned::to_owned)
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

async fn discard_partial(destination: &Path) {
    let partial = partial_path(destination);
    match fs::remove_file(&partial).await {
        Ok(()) => debug!(path = %partial.display(), "removed partial file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(error = %err, path = %partial.display(), "failed to remove partial file"),
    }
}

fn preserve_mtime(path: &Path, captured: DateTime<Utc>) {
    let mtime = FileTime::from_unix_time(captured.timestamp(), captured.timestamp_subsec_nanos());
    if let Err(err) = filetime::set_file_mtime(path, mtime) {
        warn!(error = %err, path = %path.display(), "failed to set modification time");
    }
}

fn filesystem(operation: &str, path: &Path, err: &io::Error) -> TransferError {
    TransferError::filesystem(format!("{operation} {}: {err}", path.display()))
}
