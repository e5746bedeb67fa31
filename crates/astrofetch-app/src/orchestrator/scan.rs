//! Page traversal, batching, and the pause/cancel checkpoints.

use astrofetch_core::{
    CatalogError, CatalogItem, CatalogOrdering, CatalogPage, ControlFlags, FilterDecision,
    FilterReason, FilterSpec, PageRequest, TransferTask,
};
use astrofetch_events::Event;
use astrofetch_transfer::{TransferExecutor, backoff_delay};
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::RunState;
use super::{BatchOrchestrator, Halt};

impl BatchOrchestrator {
    pub(super) async fn scan(
        &self,
        filter: &FilterSpec,
        run: &mut RunState,
        executor: &TransferExecutor,
    ) -> Result<(), Halt> {
        let stop_at_start_date = filter.start_date.is_some()
            && self.catalog.ordering() == CatalogOrdering::NewestFirst;
        let mut offset = run.options.start_offset();
        let mut previous_total: Option<u64> = None;

        loop {
            self.checkpoint(run.run_id, &run.control).await?;
            if run.limit_reached() {
                run.stop_for_limit(previous_total.unwrap_or_default());
                return Ok(());
            }

            let request = PageRequest {
                offset,
                limit: self.settings.page_size,
                group_id: filter.group_id,
            };
            let page = self.fetch_page(&run.control, request).await?;
            if self.expiry.is_expired(previous_total, &page) {
                warn!(
                    offset,
                    previous_total = ?previous_total,
                    "catalog total dropped to zero; treating the session as expired"
                );
                return Err(Halt::AuthExpired);
            }
            previous_total = Some(page.total_count);
            self.publish(Event::PageFetched {
                run_id: run.run_id,
                offset,
                items: page.items.len(),
                total_count: page.total_count,
            });
            debug!(
                offset,
                items = page.items.len(),
                total_count = page.total_count,
                "catalog page fetched"
            );

            let CatalogPage {
                items,
                total_count,
                entries,
            } = page;
            let consumed = entries.max(items.len() as u64);
            if consumed == 0 {
                return Ok(());
            }
            offset += consumed;
            let unusable = consumed - items.len() as u64;
            if unusable > 0 {
                debug!(offset, unusable, "catalog entries could not be converted");
                run.scanned += unusable;
            }

            let mut stop = false;
            for item in items {
                if run.limit_reached() {
                    run.stop_for_limit(total_count);
                    stop = true;
                    break;
                }
                run.scanned += 1;
                run.stats.discovered += 1;

                match filter.evaluate(&item) {
                    FilterDecision::Accept => {}
                    FilterDecision::Reject(FilterReason::BeforeStart) if stop_at_start_date => {
                        run.stats.filtered_out += 1;
                        info!(
                            item_id = %item.item_id,
                            scanned = run.scanned,
                            "reached items older than the start date; stopping scan"
                        );
                        stop = true;
                        break;
                    }
                    FilterDecision::Reject(reason) => {
                        run.stats.filtered_out += 1;
                        debug!(item_id = %item.item_id, ?reason, "filtered out");
                        continue;
                    }
                }

                let companions_of = (self.settings.include_companions
                    && item.group_id != 0
                    && run.companion_groups.insert(item.group_id))
                .then(|| item.clone());
                self.queue(run, item);
                if let Some(parent) = companions_of {
                    self.queue_companions(filter, run, &parent).await?;
                }
                self.dispatch_full_batches(run, executor).await?;
            }

            let remainder = std::mem::take(&mut run.pending);
            self.dispatch(run, executor, remainder).await?;

            if stop || offset >= total_count {
                return Ok(());
            }
        }
    }

    pub(super) async fn retry_failed(
        &self,
        run: &mut RunState,
        executor: &TransferExecutor,
    ) -> Result<(), Halt> {
        let failures = self.tracker.failures();
        info!(pending = failures.len(), "retrying persisted failures");
        for failure in failures {
            if run.limit_reached() {
                break;
            }
            run.scanned += 1;
            run.stats.discovered += 1;
            self.queue(run, failure.item);
            self.dispatch_full_batches(run, executor).await?;
        }
        let remainder = std::mem::take(&mut run.pending);
        self.dispatch(run, executor, remainder).await
    }

    async fn queue_companions(
        &self,
        filter: &FilterSpec,
        run: &mut RunState,
        parent: &CatalogItem,
    ) -> Result<(), Halt> {
        let listed = tokio::select! {
            () = run.control.cancelled() => return Err(Halt::Cancelled),
            listed = self.catalog.companions(parent) => listed,
        };
        let companions = match listed {
            Ok(companions) => companions,
            Err(CatalogError::AuthExpired) => return Err(Halt::AuthExpired),
            Err(err) => {
                warn!(
                    group_id = parent.group_id,
                    error = %describe(&err),
                    "companion lookup failed; continuing without them"
                );
                return Ok(());
            }
        };
        debug!(group_id = parent.group_id, count = companions.len(), "companions listed");

        for companion in companions {
            if run.options.max_items.is_some_and(|max| run.stats.queued >= max) {
                break;
            }
            run.stats.discovered += 1;
            if let FilterDecision::Reject(reason) = filter.evaluate(&companion) {
                run.stats.filtered_out += 1;
                debug!(item_id = %companion.item_id, ?reason, "companion filtered out");
                continue;
            }
            self.queue(run, companion);
        }
        Ok(())
    }

    async fn dispatch_full_batches(
        &self,
        run: &mut RunState,
        executor: &TransferExecutor,
    ) -> Result<(), Halt> {
        let batch_size = self.settings.batch_size;
        while run.pending.len() >= batch_size {
            let batch: Vec<TransferTask> = run.pending.drain(..batch_size).collect();
            self.dispatch(run, executor, batch).await?;
        }
        Ok(())
    }

    /// Run one batch to completion and reconcile every result before
    /// returning.
    async fn dispatch(
        &self,
        run: &mut RunState,
        executor: &TransferExecutor,
        tasks: Vec<TransferTask>,
    ) -> Result<(), Halt> {
        if tasks.is_empty() {
            return Ok(());
        }
        if let Err(halt) = self.checkpoint(run.run_id, &run.control).await {
            run.abandon(tasks);
            return Err(halt);
        }

        run.stats.current_batch += 1;
        let batch_index = run.stats.current_batch;
        let batch_size = tasks.len();

        if run.options.dry_run {
            for task in tasks {
                info!(
                    item_id = %task.item_id(),
                    destination = %task.destination.display(),
                    "would transfer"
                );
                run.planned.push((task.item.item_id, task.destination));
            }
            run.report(batch_index, batch_size, 0);
            return Ok(());
        }

        info!(batch_index, size = batch_size, "batch started");
        self.publish(Event::BatchStarted {
            run_id: run.run_id,
            batch_index,
            size: batch_size,
        });
        if let Some(metrics) = &self.metrics {
            metrics.inc_batch();
        }

        let transferred_before = run.stats.transferred;
        let failed_before = run.stats.failed + run.stats.cancelled;
        let mut completed = 0;
        executor
            .run_batch(tasks, |result| {
                completed += 1;
                self.reconcile(run, result);
                run.report(batch_index, batch_size, completed);
            })
            .await;

        let transferred = run.stats.transferred - transferred_before;
        let failed = run.stats.failed + run.stats.cancelled - failed_before;
        info!(batch_index, transferred, failed, "batch completed");
        self.publish(Event::BatchCompleted {
            run_id: run.run_id,
            batch_index,
            transferred,
            failed,
        });
        self.persist(run).await;

        if run.auth_expired {
            return Err(Halt::AuthExpired);
        }
        Ok(())
    }

    /// Honour cancellation, and idle while paused.
    async fn checkpoint(&self, run_id: Uuid, control: &ControlFlags) -> Result<(), Halt> {
        if control.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        if !control.is_paused() {
            return Ok(());
        }
        info!("run paused");
        self.publish(Event::RunPaused { run_id });
        if !control.wait_while_paused().await {
            return Err(Halt::Cancelled);
        }
        info!("run resumed");
        self.publish(Event::RunResumed { run_id });
        Ok(())
    }

    async fn fetch_page(
        &self,
        control: &ControlFlags,
        request: PageRequest,
    ) -> Result<CatalogPage, Halt> {
        let retry = self.settings.executor;
        let mut attempts = 0_u32;
        loop {
            attempts += 1;
            let fetched = tokio::select! {
                () = control.cancelled() => return Err(Halt::Cancelled),
                fetched = self.catalog.fetch_page(request) => fetched,
            };
            match fetched {
                Ok(page) => return Ok(page),
                Err(CatalogError::AuthExpired) => return Err(Halt::AuthExpired),
                Err(err) if err.is_transient() && attempts < retry.max_retries => {
                    let delay = backoff_delay(retry.retry_delay, attempts);
                    warn!(
                        offset = request.offset,
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %describe(&err),
                        "catalog page fetch failed; retrying"
                    );
                    tokio::select! {
                        () = control.cancelled() => return Err(Halt::Cancelled),
                        () = time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    let detail = describe(&err);
                    error!(offset = request.offset, attempts, error = %detail, "catalog page fetch failed");
                    return Err(Halt::Failed(detail));
                }
            }
        }
    }
}

fn describe(err: &CatalogError) -> String {
    match err {
        CatalogError::Unavailable { detail } | CatalogError::Malformed { detail } => {
            format!("{err}: {detail}")
        }
        CatalogError::AuthExpired => err.to_string(),
    }
}
