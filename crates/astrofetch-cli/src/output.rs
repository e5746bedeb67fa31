//! Output renderers and formatting helpers for CLI commands.

use std::path::PathBuf;

use anyhow::anyhow;
use astrofetch_app::RunResult;
use astrofetch_tracker::{TrackerSummary, VerificationReport};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_run_result(result: &RunResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Table => {
            let stats = &result.stats;
            println!("run: {}", result.run_id);
            println!("status: {}", result.status.as_str());
            if let Some(error) = &result.error {
                println!("reason: {error}");
            }
            println!(
                "scanned: {} discovered, {} filtered, {} tracked, {} on disk, {} beyond limit",
                stats.discovered,
                stats.filtered_out,
                stats.already_tracked,
                stats.exists_on_disk,
                stats.limit_skipped
            );
            println!(
                "transfers: {} queued, {} done, {} failed, {} cancelled, {} skipped",
                stats.queued, stats.transferred, stats.failed, stats.cancelled, stats.skipped
            );
            println!("bytes: {}", format_bytes(stats.total_bytes));
            for failure in &result.failed {
                println!(
                    "  failed {} ({}, {} attempts): {}",
                    failure.item.item_id, failure.kind, failure.attempts, failure.message
                );
            }
            for (item_id, destination) in &result.planned {
                println!("  would fetch {item_id} -> {}", destination.display());
            }
        }
    }
    Ok(())
}

pub(crate) fn render_verification(
    report: &VerificationReport,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!(
                "valid: {}  missing: {}  errored: {}",
                report.valid, report.missing, report.errored
            );
            for record in &report.missing_records {
                println!("  missing {} {}", record.item_id, record.path.display());
            }
        }
    }
    Ok(())
}

pub(crate) fn render_orphans(orphans: &[PathBuf], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&orphans)?,
        OutputFormat::Table => {
            for path in orphans {
                println!("{}", path.display());
            }
            println!("{} untracked files", orphans.len());
        }
    }
    Ok(())
}

pub(crate) fn render_summary(summary: &TrackerSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Table => {
            println!("records: {}", summary.total_records);
            println!("bytes: {}", format_bytes(summary.total_bytes));
            match summary.last_saved_at {
                Some(at) => println!("last transfer: {at}"),
                None => println!("last transfer: never"),
            }
            println!("sessions: {}", summary.sessions);
            println!("pending failures: {}", summary.pending_failures);
            for (title, counts) in [
                ("by kind", &summary.by_media_kind),
                ("by device", &summary.by_device),
                ("by object", &summary.by_object),
            ] {
                if counts.is_empty() {
                    continue;
                }
                println!("{title}:");
                for (name, count) in counts {
                    println!("  {count:>7} {name}");
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let value = bytes_to_f64(bytes);
    if value >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if value >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn bytes_to_f64(value: u64) -> f64 {
    let high = u32::try_from(value >> 32).unwrap_or(u32::MAX);
    let low = u32::try_from(value & 0xFFFF_FFFF).unwrap_or(u32::MAX);
    f64::from(high) * 4_294_967_296.0 + f64::from(low)
}
