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

//! Durable ledger of transferred items and past runs.
//!
//! Layout:
//! - `store.rs`: `TrackerStore`, the in-memory index behind one mutation lock
//! - `persist.rs`: document encoding, backups, and atomic replacement
//! - `maintenance.rs`: verification, orphan scans, and pruning
//! - `model.rs`: records, session summaries, and reports
//! - `error.rs`: persistence errors

pub mod error;
mod maintenance;
pub mod model;
mod persist;
pub mod store;

pub use error::{TrackerError, TrackerResult};
pub use model::{SessionRecord, TrackerRecord, TrackerSummary, VerificationReport};
pub use store::{TrackerOptions, TrackerStore};
