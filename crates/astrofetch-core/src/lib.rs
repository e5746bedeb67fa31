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

//! Catalog-agnostic download interfaces and DTOs.
//!
//! Layout:
//! - `model/`: catalog items, transfer tasks, outcomes, and run statistics
//! - `filter.rs`: per-run filter snapshot and its evaluation
//! - `control.rs`: shared pause/cancel signal
//! - `service/`: collaborator traits implemented by catalog and fetch adapters
//! - `error.rs`: catalog, transfer, and validation errors

pub mod control;
pub mod error;
pub mod filter;
pub mod model;
pub mod service;

pub use control::ControlFlags;
pub use error::{CatalogError, CoreError, CoreResult, TransferError, TransferErrorKind};
pub use filter::{FilterDecision, FilterReason, FilterSpec};
pub use model::{
    CatalogItem, CatalogPage, CollisionPolicy, FailedTransfer, PageRequest, RunStatus,
    SessionStats, SkipReason, TransferOutcome, TransferResult, TransferTask,
};
pub use service::{ByteSink, CatalogOrdering, CatalogSource, Fetcher};
