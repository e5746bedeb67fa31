use anyhow::anyhow;
use astrofetch_app::{ProgressCallback, RunHandle, RunOptions, RunResult, Services};
use astrofetch_core::RunStatus;
use tracing::{info, warn};

use crate::cli::{AppContext, DownloadArgs, OutputFormat, RunArgs};
use crate::error::{CliError, CliResult};
use crate::output::render_run_result;

pub(crate) async fn handle_download(ctx: &AppContext, args: DownloadArgs) -> CliResult<()> {
    let services = Services::from_config(ctx.config.clone()).map_err(|err| CliError::app(&err))?;
    let result = download_with(&services, &args, ctx.output).await?;
    render_run_result(&result, ctx.output)?;
    conclude(&result)
}

pub(crate) async fn handle_retry_failed(ctx: &AppContext, args: RunArgs) -> CliResult<()> {
    let services = Services::from_config(ctx.config.clone()).map_err(|err| CliError::app(&err))?;
    let result = retry_with(&services, &args, ctx.output).await?;
    render_run_result(&result, ctx.output)?;
    conclude(&result)
}

pub(crate) async fn download_with(
    services: &Services,
    args: &DownloadArgs,
    output: OutputFormat,
) -> CliResult<RunResult> {
    let options = RunOptions {
        max_scan: args.max_scan,
        start_position: args.start_position,
        ..run_options(&args.run)
    };
    let handle = services
        .orchestrator
        .start_run_with_progress(args.filter(), options, progress_printer(output))
        .map_err(|err| CliError::app(&err))?;
    await_run(handle).await
}

pub(crate) async fn retry_with(
    services: &Services,
    args: &RunArgs,
    output: OutputFormat,
) -> CliResult<RunResult> {
    let pending = services.tracker.failures().len();
    if pending == 0 && output == OutputFormat::Table {
        eprintln!("no failed transfers recorded");
    }
    let handle = services
        .orchestrator
        .resume_failed_with_progress(run_options(args), progress_printer(output))
        .map_err(|err| CliError::app(&err))?;
    await_run(handle).await
}

fn run_options(args: &RunArgs) -> RunOptions {
    RunOptions {
        dry_run: args.dry_run,
        force_redownload: args.force,
        max_items: args.max_items,
        ..RunOptions::default()
    }
}

/// Batch completion lines on stderr, so stdout stays parseable.
fn progress_printer(output: OutputFormat) -> ProgressCallback {
    if output == OutputFormat::Json {
        return Box::new(|_| {});
    }
    Box::new(|update| {
        if update.completed_in_batch == update.batch_size || update.completed_in_batch == 0 {
            eprintln!(
                "batch {}: {} items | transferred {} failed {} queued {}",
                update.batch_index,
                update.batch_size,
                update.stats.transferred,
                update.stats.failed,
                update.stats.queued
            );
        }
    })
}

/// Wait for the run, cancelling it cooperatively on Ctrl-C.
async fn await_run(handle: RunHandle) -> CliResult<RunResult> {
    let run_id = handle.run_id();
    info!(%run_id, "run started");
    let control = handle.control().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(%run_id, "interrupt received; cancelling run");
            eprintln!("interrupt received; finishing the batch in flight");
            control.cancel();
        }
    });
    let result = handle.wait().await;
    interrupt.abort();
    result.map_err(|err| CliError::app(&err))
}

fn conclude(result: &RunResult) -> CliResult<()> {
    if let Some(detail) = &result.persistence_error {
        eprintln!("warning: tracker could not be saved: {detail}");
    }
    match result.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Cancelled => Err(CliError::failure(anyhow!("run cancelled"))),
        RunStatus::AuthHalted => Err(CliError::failure(anyhow!(
            "catalog session expired; refresh the credentials and run again"
        ))),
        RunStatus::Failed => Err(CliError::failure(anyhow!(
            "run failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use astrofetch_config::AppConfig;
    use astrofetch_core::TransferErrorKind;
    use astrofetch_test_support::fixtures::catalog_items;
    use astrofetch_test_support::mocks::{FetchStep, ScriptedFetcher, StaticCatalog};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.folders.base_path = dir.path().join("media");
        config.tracking.tracker_file = dir.path().join("tracker.json");
        config.download.rate_limit = 0;
        config.download.retry_delay_secs = 0;
        config
    }

    fn download_args() -> DownloadArgs {
        DownloadArgs {
            start_position: 1,
            ..DownloadArgs::default()
        }
    }

    #[tokio::test]
    async fn dry_run_download_reports_the_plan() {
        let dir = TempDir::new().expect("tempdir");
        let services = Services::with_collaborators(
            config_in(&dir),
            Arc::new(StaticCatalog::new(catalog_items(3))),
            Arc::new(ScriptedFetcher::new()),
        )
        .expect("services");
        let args = DownloadArgs {
            run: RunArgs {
                dry_run: true,
                ..RunArgs::default()
            },
            ..download_args()
        };

        let result = download_with(&services, &args, OutputFormat::Json)
            .await
            .expect("run");
        assert_eq!(result.planned.len(), 3);
        assert!(conclude(&result).is_ok());
        assert!(services.tracker.is_empty());
    }

    #[tokio::test]
    async fn retry_failed_picks_up_earlier_failures() {
        let dir = TempDir::new().expect("tempdir");
        let items = catalog_items(2);
        let fetcher = ScriptedFetcher::new().script(
            items[0].source_url.clone(),
            vec![
                FetchStep::Fail(TransferErrorKind::Filesystem),
                FetchStep::Deliver(b"ok".to_vec()),
            ],
        );
        let services = Services::with_collaborators(
            config_in(&dir),
            Arc::new(StaticCatalog::new(items.clone())),
            Arc::new(fetcher),
        )
        .expect("services");

        let first = download_with(&services, &download_args(), OutputFormat::Json)
            .await
            .expect("run");
        assert_eq!(first.stats.failed, 1);

        let retried = retry_with(&services, &RunArgs::default(), OutputFormat::Json)
            .await
            .expect("retry");
        assert_eq!(retried.stats.transferred, 1);
        assert!(services.tracker.has(&items[0].item_id));
    }

    #[test]
    fn non_completed_runs_map_to_failures() {
        let mut result = RunResult {
            run_id: uuid::Uuid::nil(),
            status: RunStatus::AuthHalted,
            stats: astrofetch_core::SessionStats::default(),
            error: None,
            failed: Vec::new(),
            planned: Vec::new(),
            persistence_error: None,
        };
        let err = conclude(&result).expect_err("auth halt is an error");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("session expired"));

        result.status = RunStatus::Failed;
        result.error = Some("catalog unavailable".to_string());
        let err = conclude(&result).expect_err("failure is an error");
        assert!(err.display_message().contains("catalog unavailable"));
    }
}
