#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Astrofetch application wiring and run orchestration.
//!
//! Layout: `bootstrap.rs` (service wiring), `catalog.rs` (HTTP catalog
//! adapter), `orchestrator/` (batched runs), `error.rs` (application errors).

/// Service wiring from configuration.
pub mod bootstrap;
/// HTTP catalog adapter.
pub mod catalog;
/// Application error types.
pub mod error;
/// Batched run orchestration.
pub mod orchestrator;

pub use bootstrap::{Services, init_logging, load_config, open_tracker};
pub use catalog::HttpCatalog;
pub use error::{AppError, AppResult, error_chain};
pub use orchestrator::{
    BatchOrchestrator, ExpiryDetector, OrchestratorDeps, OrchestratorSettings, ProgressCallback,
    ProgressUpdate, RunHandle, RunOptions, RunResult, TotalCountDrop,
};
