//! End-to-end runs against in-memory catalog and fetcher doubles.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use astrofetch_app::{
    BatchOrchestrator, HttpCatalog, OrchestratorDeps, OrchestratorSettings, ProgressUpdate,
    RunOptions,
};
use astrofetch_config::CatalogConfig;
use astrofetch_core::{CatalogItem, FilterSpec, RunStatus, TransferErrorKind};
use astrofetch_events::{Event, EventBus};
use astrofetch_fsops::PathOrganizer;
use astrofetch_test_support::fixtures::{catalog_item, catalog_items, newest_capture};
use astrofetch_test_support::mocks::{FetchStep, PageFault, ScriptedFetcher, StaticCatalog};
use astrofetch_tracker::{TrackerOptions, TrackerStore};
use astrofetch_transfer::{ExecutorConfig, RateLimiter};
use chrono::Duration as Days;
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    catalog: Arc<StaticCatalog>,
    fetcher: Arc<ScriptedFetcher>,
    tracker: Arc<TrackerStore>,
    orchestrator: BatchOrchestrator,
}

fn settings(batch_size: usize, page_size: u32) -> OrchestratorSettings {
    OrchestratorSettings {
        batch_size,
        page_size,
        executor: ExecutorConfig {
            workers: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(5),
            timeout: Duration::from_secs(30),
        },
        ..OrchestratorSettings::default()
    }
}

fn harness(
    catalog: StaticCatalog,
    fetcher: ScriptedFetcher,
    settings: OrchestratorSettings,
) -> Result<Harness> {
    let dir = TempDir::new()?;
    let catalog = Arc::new(catalog);
    let fetcher = Arc::new(fetcher);
    let tracker = Arc::new(TrackerStore::open(
        dir.path().join("tracker.json"),
        TrackerOptions::default(),
    )?);
    let organizer = organizer(dir.path())?;
    let orchestrator = BatchOrchestrator::new(
        OrchestratorDeps {
            catalog: catalog.clone(),
            fetcher: fetcher.clone(),
            limiter: Arc::new(RateLimiter::disabled()),
            organizer: Arc::new(organizer),
            tracker: Arc::clone(&tracker),
        },
        settings,
    )?;
    Ok(Harness {
        dir,
        catalog,
        fetcher,
        tracker,
        orchestrator,
    })
}

fn organizer(root: &Path) -> Result<PathOrganizer> {
    Ok(PathOrganizer::new(
        root.join("media"),
        "{object}/{telescope}/{format}",
        "{telescope}_{filename}",
        "Unknown",
        120,
    )?)
}

/// Orchestrator reading pages from an HTTP catalog at `base_url`.
fn http_orchestrator(
    dir: &TempDir,
    base_url: String,
    settings: OrchestratorSettings,
) -> Result<(BatchOrchestrator, Arc<TrackerStore>)> {
    let config = CatalogConfig {
        base_url,
        ..CatalogConfig::default()
    };
    let tracker = Arc::new(TrackerStore::open(
        dir.path().join("tracker.json"),
        TrackerOptions::default(),
    )?);
    let orchestrator = BatchOrchestrator::new(
        OrchestratorDeps {
            catalog: Arc::new(HttpCatalog::new(reqwest::Client::new(), &config)),
            fetcher: Arc::new(ScriptedFetcher::new()),
            limiter: Arc::new(RateLimiter::disabled()),
            organizer: Arc::new(organizer(dir.path())?),
            tracker: Arc::clone(&tracker),
        },
        settings,
    )?;
    Ok((orchestrator, tracker))
}

fn page_body(first: u64) -> serde_json::Value {
    json!({
        "firstImageNumber": first,
        "maxImageCount": 2,
        "scheduledMissionId": 0,
        "viewType": "photoRoll"
    })
}

fn picture(id: u64) -> serde_json::Value {
    json!({
        "imageId": id,
        "imageTitle": "Orion Nebula (M42)",
        "imageDownloadURL": format!("https://cdn.example.invalid/{id}.png"),
        "telescopeName": "Canary Four",
        "displayDate": "2024-03-10",
        "displayTime": "22:15:00"
    })
}

fn files_under(root: &Path) -> usize {
    walk(root).len()
}

fn walk(root: &Path) -> Vec<std::path::PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .flatten()
        .flat_map(|entry| {
            let path = entry.path();
            if path.is_dir() { walk(&path) } else { vec![path] }
        })
        .collect()
}

#[tokio::test]
async fn item_limit_stops_the_scan_and_reports_the_remainder() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(120)),
        ScriptedFetcher::new(),
        settings(50, 50),
    )?;
    let options = RunOptions {
        max_items: Some(100),
        ..RunOptions::default()
    };

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), options)?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.queued, 100);
    assert_eq!(result.stats.transferred, 100);
    assert_eq!(result.stats.limit_skipped, 20);
    assert_eq!(result.stats.current_batch, 2);
    assert_eq!(h.tracker.len(), 100);
    assert_eq!(files_under(&h.dir.path().join("media")), 100);

    let reopened = TrackerStore::open(h.tracker.path(), TrackerOptions::default())?;
    assert_eq!(reopened.len(), 100);
    assert_eq!(reopened.sessions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn second_run_transfers_nothing_new() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(10)),
        ScriptedFetcher::new(),
        settings(4, 5),
    )?;

    let first = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(first.stats.transferred, 10);

    let second = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.stats.already_tracked, 10);
    assert_eq!(second.stats.queued, 0);
    assert_eq!(h.fetcher.total_attempts(), 10);
    assert_eq!(h.tracker.sessions().len(), 2);
    Ok(())
}

#[tokio::test]
async fn force_redownload_ignores_the_tracker() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(3)),
        ScriptedFetcher::new(),
        settings(10, 10),
    )?;
    h.orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    let forced = h
        .orchestrator
        .start_run(
            FilterSpec::default(),
            RunOptions {
                force_redownload: true,
                ..RunOptions::default()
            },
        )?
        .wait()
        .await?;
    assert_eq!(forced.stats.transferred, 3);
    assert_eq!(h.fetcher.total_attempts(), 6);
    assert_eq!(files_under(&h.dir.path().join("media")), 3);
    Ok(())
}

#[tokio::test]
async fn dry_run_plans_without_side_effects() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(10)),
        ScriptedFetcher::new(),
        settings(4, 5),
    )?;

    let result = h
        .orchestrator
        .start_run(
            FilterSpec::default(),
            RunOptions {
                dry_run: true,
                ..RunOptions::default()
            },
        )?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.planned.len(), 10);
    assert_eq!(result.stats.queued, 10);
    assert_eq!(result.stats.transferred, 0);
    assert!(h.tracker.is_empty());
    assert!(h.tracker.sessions().is_empty());
    assert_eq!(h.fetcher.total_attempts(), 0);
    assert_eq!(files_under(&h.dir.path().join("media")), 0);
    assert!(!h.tracker.path().exists());
    Ok(())
}

#[tokio::test]
async fn expired_session_during_a_batch_halts_the_run() -> Result<()> {
    let items = catalog_items(10);
    let fetcher = ScriptedFetcher::new().script(
        items[2].source_url.clone(),
        vec![FetchStep::Fail(TransferErrorKind::AuthExpired)],
    );
    let h = harness(StaticCatalog::new(items.clone()), fetcher, settings(5, 10))?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::AuthHalted);
    assert!(result.error.is_some());
    assert_eq!(result.stats.transferred, 4);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(h.catalog.requests().len(), 1);
    assert_eq!(h.fetcher.attempts(&items[2].source_url), 1);
    assert_eq!(h.fetcher.total_attempts(), 5);

    let failures = h.tracker.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, TransferErrorKind::AuthExpired);
    Ok(())
}

#[tokio::test]
async fn empty_page_after_a_nonzero_total_is_an_expired_session() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(100)).with_fault(1, PageFault::SilentEmpty),
        ScriptedFetcher::new(),
        settings(50, 50),
    )?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::AuthHalted);
    assert_eq!(result.stats.transferred, 50);
    assert_eq!(h.catalog.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn empty_catalog_completes_without_transfers() -> Result<()> {
    let h = harness(
        StaticCatalog::new(Vec::new()),
        ScriptedFetcher::new(),
        settings(5, 5),
    )?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.discovered, 0);
    assert_eq!(h.fetcher.total_attempts(), 0);
    Ok(())
}

#[tokio::test]
async fn explicit_auth_failure_on_a_page_halts_before_transfers() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(10)).with_fault(0, PageFault::AuthExpired),
        ScriptedFetcher::new(),
        settings(5, 5),
    )?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::AuthHalted);
    assert_eq!(h.fetcher.total_attempts(), 0);
    assert_eq!(h.tracker.sessions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn transient_page_failure_is_retried() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(4)).with_fault(0, PageFault::Unavailable),
        ScriptedFetcher::new(),
        settings(5, 5),
    )?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.transferred, 4);
    assert_eq!(h.catalog.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn object_filter_keeps_matching_titles_only() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(10)),
        ScriptedFetcher::new(),
        settings(5, 5),
    )?;
    let filter = FilterSpec {
        object_substring: Some("Nebula".to_string()),
        ..FilterSpec::default()
    };

    let result = h
        .orchestrator
        .start_run(filter, RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.stats.discovered, 10);
    assert_eq!(result.stats.filtered_out, 5);
    assert_eq!(result.stats.transferred, 5);
    assert!(
        h.tracker
            .records()
            .iter()
            .all(|record| record.title.contains("Nebula"))
    );
    Ok(())
}

#[tokio::test]
async fn invalid_filter_is_rejected_before_the_run_starts() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(3)),
        ScriptedFetcher::new(),
        settings(5, 5),
    )?;
    let today = newest_capture().date_naive();
    let filter = FilterSpec {
        start_date: Some(today),
        end_date: today.pred_opt(),
        ..FilterSpec::default()
    };

    assert!(
        h.orchestrator
            .start_run(filter, RunOptions::default())
            .is_err()
    );
    assert!(h.catalog.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_transfer_is_retried_up_to_the_bound() -> Result<()> {
    let items = catalog_items(3);
    let url = items[1].source_url.clone();
    let fetcher =
        ScriptedFetcher::new().script(url.clone(), vec![FetchStep::Fail(TransferErrorKind::Network)]);
    let h = harness(StaticCatalog::new(items.clone()), fetcher, settings(5, 5))?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(h.fetcher.attempts(&url), 3);
    assert_eq!(result.stats.transferred, 2);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].attempts, 3);
    assert_eq!(result.failed[0].kind, TransferErrorKind::Network);
    assert!(!h.tracker.has(&items[1].item_id));
    Ok(())
}

#[tokio::test]
async fn resume_retries_persisted_failures_only() -> Result<()> {
    let items = catalog_items(3);
    let url = items[0].source_url.clone();
    let fetcher = ScriptedFetcher::new().script(
        url.clone(),
        vec![
            FetchStep::Fail(TransferErrorKind::Network),
            FetchStep::Fail(TransferErrorKind::Network),
            FetchStep::Fail(TransferErrorKind::Network),
            FetchStep::Deliver(b"late".to_vec()),
        ],
    );
    let h = harness(StaticCatalog::new(items.clone()), fetcher, settings(5, 5))?;

    let first = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(first.stats.failed, 1);
    assert_eq!(h.tracker.failures().len(), 1);

    let resumed = h
        .orchestrator
        .resume_failed(RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(resumed.stats.queued, 1);
    assert_eq!(resumed.stats.transferred, 1);
    assert_eq!(h.catalog.requests().len(), 1);
    assert!(h.tracker.has(&items[0].item_id));
    assert!(h.tracker.failures().is_empty());
    Ok(())
}

#[tokio::test]
async fn companions_are_queued_once_per_group() -> Result<()> {
    let mut items = catalog_items(3);
    for item in &mut items {
        item.group_id = 77;
    }
    let companions: Vec<CatalogItem> = ["f1", "f2"]
        .into_iter()
        .map(|id| {
            let mut companion = catalog_item(id);
            companion.media_kind = "FITS".to_string();
            companion.instrument = Some("Luminance".to_string());
            companion
        })
        .collect();
    let h = harness(
        StaticCatalog::new(items).with_companions(77, companions),
        ScriptedFetcher::new(),
        OrchestratorSettings {
            include_companions: true,
            ..settings(10, 10)
        },
    )?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(h.catalog.companion_requests(), vec![77]);
    assert_eq!(result.stats.queued, 5);
    assert_eq!(result.stats.transferred, 5);
    assert!(h.tracker.has("f1"));
    assert!(h.tracker.has("f2"));
    Ok(())
}

#[tokio::test]
async fn newest_first_scan_stops_at_the_start_date() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(30)),
        ScriptedFetcher::new(),
        settings(50, 50),
    )?;
    let filter = FilterSpec {
        start_date: Some((newest_capture() - Days::days(9)).date_naive()),
        ..FilterSpec::default()
    };

    let result = h
        .orchestrator
        .start_run(filter, RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.transferred, 10);
    assert_eq!(result.stats.discovered, 11);
    assert_eq!(result.stats.filtered_out, 1);
    Ok(())
}

#[tokio::test]
async fn scan_limit_and_start_position_bound_the_window() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(40)),
        ScriptedFetcher::new(),
        settings(10, 10),
    )?;

    let result = h
        .orchestrator
        .start_run(
            FilterSpec::default(),
            RunOptions {
                start_position: 11,
                max_scan: Some(15),
                ..RunOptions::default()
            },
        )?
        .wait()
        .await?;

    assert_eq!(result.stats.discovered, 15);
    assert_eq!(result.stats.limit_skipped, 15);
    assert_eq!(h.catalog.requests()[0].offset, 10);
    assert!(!h.tracker.has("1000"));
    assert!(h.tracker.has("1010"));
    Ok(())
}

#[tokio::test]
async fn pause_holds_the_run_until_resumed() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(6)),
        ScriptedFetcher::new(),
        settings(3, 3),
    )?;
    let events = EventBus::new();
    let mut stream = events.subscribe(None);
    let orchestrator = h.orchestrator.clone().with_events(events);

    let handle = orchestrator.start_run(FilterSpec::default(), RunOptions::default())?;
    handle.pause();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert!(h.catalog.requests().is_empty());

    handle.resume();
    let result = handle.wait().await?;
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.transferred, 6);

    let mut kinds = Vec::new();
    while let Ok(Some(envelope)) =
        tokio::time::timeout(Duration::from_millis(20), stream.next()).await
    {
        let finished = matches!(envelope.event, Event::RunFinished { .. });
        kinds.push(envelope.event.kind());
        if finished {
            break;
        }
    }
    assert!(kinds.contains(&"run_paused"));
    assert!(kinds.contains(&"run_resumed"));
    assert_eq!(kinds.last(), Some(&"run_finished"));
    Ok(())
}

#[tokio::test]
async fn cancel_drains_the_batch_in_flight() -> Result<()> {
    let items = catalog_items(8);
    let fetcher = items.iter().fold(ScriptedFetcher::new(), |fetcher, item| {
        fetcher.script(item.source_url.clone(), vec![FetchStep::Stall])
    });
    let h = harness(StaticCatalog::new(items), fetcher, settings(4, 8))?;

    let handle = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();
    let result = handle.wait().await?;

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.stats.transferred, 0);
    assert_eq!(result.stats.cancelled, 8);
    assert!(h.tracker.is_empty());
    assert!(h.tracker.failures().is_empty());
    assert_eq!(files_under(&h.dir.path().join("media")), 0);
    Ok(())
}

#[tokio::test]
async fn progress_reports_every_terminal_outcome() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(5)),
        ScriptedFetcher::new(),
        settings(2, 5),
    )?;
    let seen: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let result = h
        .orchestrator
        .start_run_with_progress(
            FilterSpec::default(),
            RunOptions::default(),
            Box::new(move |update| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(update.clone());
                }
            }),
        )?
        .wait()
        .await?;

    let seen = seen.lock().map_err(|_| anyhow::anyhow!("progress lock poisoned"))?;
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.last().map(|update| update.batch_index), Some(3));
    assert_eq!(
        seen.last().map(|update| update.stats.transferred),
        Some(result.stats.transferred)
    );
    Ok(())
}

#[tokio::test]
async fn unusable_catalog_page_does_not_end_the_scan() -> Result<()> {
    let server = MockServer::start_async().await;
    let first = server.mock(|when, then| {
        when.method(POST).json_body(page_body(1));
        then.status(200).json_body(json!({
            "totalCount": 4,
            "imageList": [{"imageId": 1}, {"imageId": 2}]
        }));
    });
    let second = server.mock(|when, then| {
        when.method(POST).json_body(page_body(3));
        then.status(200).json_body(json!({
            "totalCount": 4,
            "imageList": [picture(3), picture(4)]
        }));
    });
    let dir = TempDir::new()?;
    let (orchestrator, tracker) = http_orchestrator(&dir, server.base_url(), settings(5, 2))?;

    let result = orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    first.assert();
    second.assert();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.discovered, 2);
    assert_eq!(result.stats.transferred, 2);
    assert!(tracker.has("3") && tracker.has("4"));
    Ok(())
}

#[tokio::test]
async fn dropped_entries_still_advance_the_page_offset() -> Result<()> {
    let server = MockServer::start_async().await;
    let first = server.mock(|when, then| {
        when.method(POST).json_body(page_body(1));
        then.status(200).json_body(json!({
            "totalCount": 4,
            "imageList": [picture(1), {"imageId": 2, "imageTitle": "no url"}]
        }));
    });
    let second = server.mock(|when, then| {
        when.method(POST).json_body(page_body(3));
        then.status(200).json_body(json!({
            "totalCount": 4,
            "imageList": [picture(3), picture(4)]
        }));
    });
    let dir = TempDir::new()?;
    let (orchestrator, tracker) = http_orchestrator(&dir, server.base_url(), settings(5, 2))?;

    let result = orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    first.assert();
    second.assert();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.discovered, 3);
    assert_eq!(result.stats.queued, 3);
    assert_eq!(result.stats.already_tracked, 0);
    assert_eq!(tracker.len(), 3);
    Ok(())
}

#[tokio::test]
async fn start_date_stops_the_scan_even_when_other_filters_miss() -> Result<()> {
    let h = harness(
        StaticCatalog::new(catalog_items(200)),
        ScriptedFetcher::new(),
        settings(10, 10),
    )?;
    let filter = FilterSpec {
        object_substring: Some("Galaxy".to_string()),
        start_date: Some((newest_capture() - Days::days(9)).date_naive()),
        ..FilterSpec::default()
    };

    let result = h
        .orchestrator
        .start_run(filter, RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.stats.discovered, 11);
    assert_eq!(result.stats.transferred, 5);
    assert_eq!(h.catalog.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn repeated_ids_in_one_run_are_not_counted_as_tracked() -> Result<()> {
    let mut items = catalog_items(3);
    items[2].item_id = items[0].item_id.clone();
    let h = harness(StaticCatalog::new(items), ScriptedFetcher::new(), settings(5, 5))?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.stats.discovered, 3);
    assert_eq!(result.stats.queued, 2);
    assert_eq!(result.stats.already_tracked, 0);
    Ok(())
}

#[tokio::test]
async fn failure_found_on_disk_is_cleared_on_retry() -> Result<()> {
    let items = catalog_items(2);
    let fetcher = ScriptedFetcher::new().script(
        items[0].source_url.clone(),
        vec![FetchStep::Fail(TransferErrorKind::Filesystem)],
    );
    let h = harness(StaticCatalog::new(items), fetcher, settings(5, 5))?;

    let first = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(first.stats.failed, 1);
    let failures = h.tracker.failures();
    assert_eq!(failures.len(), 1);
    let destination = &failures[0].destination;
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(destination, b"copied by hand")?;

    let retried = h
        .orchestrator
        .resume_failed(RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(retried.stats.exists_on_disk, 1);
    assert_eq!(retried.stats.queued, 0);
    assert!(h.tracker.failures().is_empty());
    let reopened = TrackerStore::open(h.tracker.path(), TrackerOptions::default())?;
    assert!(reopened.failures().is_empty());

    let again = h
        .orchestrator
        .resume_failed(RunOptions::default())?
        .wait()
        .await?;
    assert_eq!(again.stats.discovered, 0);
    Ok(())
}

#[tokio::test]
async fn rejected_item_is_attempted_once() -> Result<()> {
    let items = catalog_items(2);
    let url = items[0].source_url.clone();
    let fetcher = ScriptedFetcher::new()
        .script(url.clone(), vec![FetchStep::Fail(TransferErrorKind::Rejected)]);
    let h = harness(StaticCatalog::new(items), fetcher, settings(5, 5))?;

    let result = h
        .orchestrator
        .start_run(FilterSpec::default(), RunOptions::default())?
        .wait()
        .await?;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(h.fetcher.attempts(&url), 1);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.failed[0].kind, TransferErrorKind::Rejected);
    Ok(())
}
