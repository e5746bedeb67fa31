//! Command-line parsing and dispatch.

use std::path::PathBuf;

use astrofetch_app::{error_chain, init_logging, load_config};
use astrofetch_config::AppConfig;
use astrofetch_core::FilterSpec;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands::download::{handle_download, handle_retry_failed};
use crate::commands::ledger::{
    handle_orphans, handle_prune, handle_sessions_trim, handle_stats, handle_verify,
};
use crate::error::{CliError, CliResult};

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = load_config(&cli.config).map_err(|err| CliError::app(&err))?;
    if let Err(err) = init_logging(&config.logging) {
        eprintln!("warning: logging unavailable: {}", error_chain(&err));
    }

    let ctx = AppContext {
        config,
        output: cli.output,
    };
    match cli.command {
        Command::Download(args) => handle_download(&ctx, args).await,
        Command::RetryFailed(args) => handle_retry_failed(&ctx, args).await,
        Command::Verify => handle_verify(&ctx),
        Command::Orphans(args) => handle_orphans(&ctx, &args),
        Command::Prune => handle_prune(&ctx),
        Command::Stats => handle_stats(&ctx),
        Command::Sessions(SessionsCommand::Trim(args)) => handle_sessions_trim(&ctx, &args),
    }
}

/// Loaded configuration plus global flags shared by every handler.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) config: AppConfig,
    pub(crate) output: OutputFormat,
}

#[derive(Parser)]
#[command(name = "astrofetch", about = "Bulk downloader for remote image catalogs")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "ASTROFETCH_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the catalog and transfer new items.
    Download(DownloadArgs),
    /// Retry transfers that failed in earlier runs.
    RetryFailed(RunArgs),
    /// Check every tracked path on disk.
    Verify,
    /// List media files that no tracker record points at.
    Orphans(OrphansArgs),
    /// Drop tracker records whose file is gone.
    Prune,
    /// Summarise the tracker.
    Stats,
    /// Manage stored run summaries.
    #[command(subcommand)]
    Sessions(SessionsCommand),
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// Keep only the newest run summaries.
    Trim(SessionsTrimArgs),
}

/// Output format for structured results.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct RunArgs {
    /// Plan transfers without writing files or touching the tracker.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Transfer again even when tracked or present on disk.
    #[arg(long)]
    pub(crate) force: bool,
    /// Stop after queueing this many transfers.
    #[arg(long)]
    pub(crate) max_items: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct DownloadArgs {
    #[command(flatten)]
    pub(crate) run: RunArgs,
    /// Stop after inspecting this many catalog items.
    #[arg(long)]
    pub(crate) max_scan: Option<u64>,
    /// One-based catalog position to start from.
    #[arg(long = "start", default_value_t = 1)]
    pub(crate) start_position: u64,
    /// Device name substring; repeat to accept several devices.
    #[arg(long = "device")]
    pub(crate) devices: Vec<String>,
    /// Object name substring matched against the title.
    #[arg(long)]
    pub(crate) object: Option<String>,
    /// Accepted media kind; repeat to accept several kinds.
    #[arg(long = "kind")]
    pub(crate) kinds: Vec<String>,
    /// Earliest capture date (YYYY-MM-DD), inclusive.
    #[arg(long, value_parser = parse_date)]
    pub(crate) from: Option<NaiveDate>,
    /// Latest capture date (YYYY-MM-DD), inclusive.
    #[arg(long, value_parser = parse_date)]
    pub(crate) to: Option<NaiveDate>,
    /// Restrict the scan to one mission.
    #[arg(long, default_value_t = 0)]
    pub(crate) group: u64,
}

impl DownloadArgs {
    pub(crate) fn filter(&self) -> FilterSpec {
        FilterSpec {
            device_substrings: self.devices.clone(),
            object_substring: self.object.clone(),
            media_kinds: self.kinds.clone(),
            start_date: self.from,
            end_date: self.to,
            group_id: self.group,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct OrphansArgs {
    /// Directory to scan; defaults to the configured base path.
    pub(crate) path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SessionsTrimArgs {
    /// Summaries to keep.
    #[arg(long)]
    pub(crate) keep: usize,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}
