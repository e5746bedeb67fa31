//! In-memory collaborators for orchestrator and executor tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use astrofetch_core::{
    ByteSink, CatalogError, CatalogItem, CatalogOrdering, CatalogPage, CatalogSource, Fetcher,
    PageRequest, TransferError, TransferErrorKind,
};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Failure injected into a specific `fetch_page` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFault {
    /// Explicit authentication expiry.
    AuthExpired,
    /// Transient outage.
    Unavailable,
    /// Empty page reporting a total of zero, as an expired session does.
    SilentEmpty,
}

/// Catalog serving a fixed item list in pages.
#[derive(Debug)]
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
    ordering: CatalogOrdering,
    companions: HashMap<u64, Vec<CatalogItem>>,
    faults: Mutex<HashMap<usize, PageFault>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<PageRequest>>,
    companion_requests: Mutex<Vec<u64>>,
}

impl StaticCatalog {
    /// Serve `items` newest first.
    #[must_use]
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            ordering: CatalogOrdering::NewestFirst,
            companions: HashMap::new(),
            faults: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            companion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Declare a different ordering guarantee.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: CatalogOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Fail the zero-based `call`-th `fetch_page` invocation.
    #[must_use]
    pub fn with_fault(self, call: usize, fault: PageFault) -> Self {
        lock(&self.faults).insert(call, fault);
        self
    }

    /// Companion assets returned for parents in `group_id`.
    #[must_use]
    pub fn with_companions(mut self, group_id: u64, companions: Vec<CatalogItem>) -> Self {
        self.companions.insert(group_id, companions);
        self
    }

    /// Page requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PageRequest> {
        lock(&self.requests).clone()
    }

    /// Group ids whose companions were requested.
    #[must_use]
    pub fn companion_requests(&self) -> Vec<u64> {
        lock(&self.companion_requests).clone()
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_page(&self, request: PageRequest) -> Result<CatalogPage, CatalogError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        match lock(&self.faults).remove(&call) {
            Some(PageFault::AuthExpired) => return Err(CatalogError::AuthExpired),
            Some(PageFault::Unavailable) => {
                return Err(CatalogError::Unavailable {
                    detail: format!("injected outage on call {call}"),
                });
            }
            Some(PageFault::SilentEmpty) => return Ok(CatalogPage::default()),
            None => {}
        }

        let scoped: Vec<&CatalogItem> = self
            .items
            .iter()
            .filter(|item| request.group_id == 0 || item.group_id == request.group_id)
            .collect();
        let start = usize::try_from(request.offset).unwrap_or(usize::MAX).min(scoped.len());
        let end = start
            .saturating_add(request.limit as usize)
            .min(scoped.len());
        Ok(CatalogPage {
            items: scoped[start..end].iter().map(|item| (*item).clone()).collect(),
            total_count: scoped.len() as u64,
            entries: (end - start) as u64,
        })
    }

    async fn companions(&self, parent: &CatalogItem) -> Result<Vec<CatalogItem>, CatalogError> {
        lock(&self.companion_requests).push(parent.group_id);
        Ok(self
            .companions
            .get(&parent.group_id)
            .map(|companions| {
                companions
                    .iter()
                    .map(|companion| CatalogItem {
                        title: parent.title.clone(),
                        device_name: parent.device_name.clone(),
                        captured_at: parent.captured_at,
                        group_id: parent.group_id,
                        ..companion.clone()
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ordering(&self) -> CatalogOrdering {
        self.ordering
    }
}

/// One scripted response to a fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStep {
    /// Write these bytes and succeed.
    Deliver(Vec<u8>),
    /// Fail with the given kind.
    Fail(TransferErrorKind),
    /// Sleep, then write these bytes and succeed.
    Delay(Duration, Vec<u8>),
    /// Never complete.
    Stall,
}

/// Fetcher answering each URL from a script; unscripted attempts deliver a
/// small payload derived from the URL.
///
/// When a URL's script runs out, its last step repeats.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Vec<FetchStep>>>,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    /// Fetcher with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for `url`, in attempt order.
    #[must_use]
    pub fn script(self, url: impl Into<String>, steps: Vec<FetchStep>) -> Self {
        lock(&self.scripts).insert(url.into(), steps);
        self
    }

    /// Payload delivered for unscripted URLs.
    #[must_use]
    pub fn default_payload(url: &str) -> Vec<u8> {
        format!("payload:{url}").into_bytes()
    }

    /// Attempts made against `url`.
    #[must_use]
    pub fn attempts(&self, url: &str) -> usize {
        lock(&self.attempts).get(url).map_or(0, Vec::len)
    }

    /// Start instants of every attempt against `url`.
    #[must_use]
    pub fn attempt_times(&self, url: &str) -> Vec<Instant> {
        lock(&self.attempts).get(url).cloned().unwrap_or_default()
    }

    /// Attempts across all URLs.
    #[must_use]
    pub fn total_attempts(&self) -> usize {
        lock(&self.attempts).values().map(Vec::len).sum()
    }

    /// Highest number of fetches observed running at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> FetchStep {
        let attempt = {
            let mut attempts = lock(&self.attempts);
            let entry = attempts.entry(url.to_string()).or_default();
            entry.push(Instant::now());
            entry.len() - 1
        };
        lock(&self.scripts)
            .get(url)
            .and_then(|steps| steps.get(attempt).or_else(|| steps.last()))
            .cloned()
            .unwrap_or_else(|| FetchStep::Deliver(Self::default_payload(url)))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, sink: &mut ByteSink<'_>) -> Result<u64, TransferError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let payload = match self.next_step(url) {
            FetchStep::Deliver(bytes) => bytes,
            FetchStep::Fail(kind) => {
                return Err(TransferError::new(kind, format!("scripted {kind} for {url}")));
            }
            FetchStep::Delay(delay, bytes) => {
                tokio::time::sleep(delay).await;
                bytes
            }
            FetchStep::Stall => {
                std::future::pending::<()>().await;
                Vec::new()
            }
        };
        sink.write_all(&payload)
            .await
            .map_err(|err| TransferError::filesystem(err.to_string()))?;
        Ok(payload.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::catalog_items;

    #[tokio::test]
    async fn pages_slice_the_item_list() -> Result<(), CatalogError> {
        let catalog = StaticCatalog::new(catalog_items(5));
        let page = catalog
            .fetch_page(PageRequest {
                offset: 4,
                limit: 3,
                group_id: 0,
            })
            .await?;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count, 5);
        assert_eq!(catalog.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn faults_fire_on_their_call_only() {
        let catalog = StaticCatalog::new(catalog_items(2)).with_fault(0, PageFault::AuthExpired);
        let request = PageRequest {
            offset: 0,
            limit: 10,
            group_id: 0,
        };
        assert!(matches!(
            catalog.fetch_page(request).await,
            Err(CatalogError::AuthExpired)
        ));
        assert!(catalog.fetch_page(request).await.is_ok());
    }

    #[tokio::test]
    async fn scripts_repeat_their_last_step() {
        let fetcher = ScriptedFetcher::new().script(
            "u",
            vec![
                FetchStep::Fail(TransferErrorKind::Network),
                FetchStep::Deliver(b"ok".to_vec()),
            ],
        );
        let mut sink = Vec::new();
        assert!(fetcher.fetch("u", &mut sink).await.is_err());
        assert!(matches!(fetcher.fetch("u", &mut sink).await, Ok(2)));
        assert!(matches!(fetcher.fetch("u", &mut sink).await, Ok(2)));
        assert_eq!(fetcher.attempts("u"), 3);
        assert_eq!(fetcher.peak_in_flight(), 1);
    }
}
