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

//! Shared test helpers used across crate and integration suites.
//! Layout: fixtures.rs (sample catalog items), mocks.rs (in-memory catalog and scripted fetcher).

pub mod fixtures;
pub mod mocks;
