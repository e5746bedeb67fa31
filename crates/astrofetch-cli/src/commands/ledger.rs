//! Tracker maintenance commands. None of them contact the catalog.

use anyhow::anyhow;
use astrofetch_app::{error_chain, open_tracker};
use astrofetch_tracker::TrackerStore;

use crate::cli::{AppContext, OrphansArgs, SessionsTrimArgs};
use crate::error::{CliError, CliResult};
use crate::output::{render_orphans, render_summary, render_verification};

fn tracker(ctx: &AppContext) -> CliResult<TrackerStore> {
    open_tracker(&ctx.config.tracking).map_err(|err| CliError::app(&err))
}

fn save(tracker: &TrackerStore) -> CliResult<()> {
    tracker
        .save_if_dirty()
        .map(|_| ())
        .map_err(|err| CliError::failure(anyhow!(error_chain(&err))))
}

pub(crate) fn handle_verify(ctx: &AppContext) -> CliResult<()> {
    let report = tracker(ctx)?.verify();
    render_verification(&report, ctx.output)?;
    if report.missing > 0 || report.errored > 0 {
        return Err(CliError::failure(anyhow!(
            "{} tracked files missing, {} unreadable",
            report.missing,
            report.errored
        )));
    }
    Ok(())
}

pub(crate) fn handle_orphans(ctx: &AppContext, args: &OrphansArgs) -> CliResult<()> {
    let base = args
        .path
        .clone()
        .unwrap_or_else(|| ctx.config.folders.base_path.clone());
    if !base.is_dir() {
        return Err(CliError::validation(format!(
            "{} is not a directory",
            base.display()
        )));
    }
    let orphans = tracker(ctx)?
        .find_orphans(&base)
        .map_err(|err| CliError::failure(anyhow!(error_chain(&err))))?;
    render_orphans(&orphans, ctx.output)
}

pub(crate) fn handle_prune(ctx: &AppContext) -> CliResult<()> {
    let tracker = tracker(ctx)?;
    let removed = tracker
        .prune_missing()
        .map_err(|err| CliError::failure(anyhow!(error_chain(&err))))?;
    save(&tracker)?;
    println!("pruned {removed} records");
    Ok(())
}

pub(crate) fn handle_stats(ctx: &AppContext) -> CliResult<()> {
    render_summary(&tracker(ctx)?.summary(), ctx.output)
}

pub(crate) fn handle_sessions_trim(ctx: &AppContext, args: &SessionsTrimArgs) -> CliResult<()> {
    let tracker = tracker(ctx)?;
    let dropped = tracker.trim_sessions(args.keep);
    save(&tracker)?;
    println!("dropped {dropped} session summaries");
    Ok(())
}
