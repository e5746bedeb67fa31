//! Destination paths for catalog items.
//!
//! Layout:
//! - `organizer.rs`: `PathOrganizer` and collision resolution
//! - `template.rs`: placeholder templates
//! - `naming.rs`: object-name extraction and segment sanitising
//! - `error.rs`: template and input errors
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

pub mod error;
mod naming;
pub mod organizer;
mod template;

pub use error::{FsOpsError, FsOpsResult};
pub use organizer::{CollisionResolution, PathOrganizer};
