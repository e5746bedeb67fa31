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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! File-backed configuration for the downloader.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (default values),
//! `validate.rs` (field checks), `loader.rs` (`ConfigLoader`), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use model::{
    AppConfig, CatalogConfig, DownloadConfig, FolderConfig, LoggingSettings, TrackingConfig,
};
