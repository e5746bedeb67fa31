//! Rate-limited, retrying transfer workers.
//!
//! Layout:
//! - `limiter.rs`: sliding-window `RateLimiter` shared by all workers
//! - `executor.rs`: `TransferExecutor` worker pool with retry and backoff
//! - `http.rs`: reqwest-backed `HttpFetcher`
//! - `error.rs`: construction errors
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
pub mod executor;
pub mod http;
pub mod limiter;

pub use error::{ExecutorError, ExecutorResult};
pub use executor::{ExecutorConfig, TransferExecutor, backoff_delay};
pub use http::HttpFetcher;
pub use limiter::RateLimiter;
