//! Command handlers grouped by concern.

pub(crate) mod download;
pub(crate) mod ledger;
