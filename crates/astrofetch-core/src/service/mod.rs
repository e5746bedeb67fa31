//! Collaborator traits implemented by catalog and payload adapters.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::{CatalogError, TransferError};
use crate::model::{CatalogItem, CatalogPage, PageRequest};

/// Destination a fetcher streams payload bytes into.
pub type ByteSink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Ordering guarantee a catalog offers for its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogOrdering {
    /// Items arrive newest capture first.
    NewestFirst,
    /// No ordering is promised.
    Unordered,
}

/// Paginated source of catalog items.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one page. Items must already be plain `CatalogItem` values.
    async fn fetch_page(&self, request: PageRequest) -> Result<CatalogPage, CatalogError>;

    /// Companion assets attached to `parent` (e.g. raw frames of a mission).
    async fn companions(&self, parent: &CatalogItem) -> Result<Vec<CatalogItem>, CatalogError> {
        let _ = parent;
        Ok(Vec::new())
    }

    /// Ordering of `fetch_page` results.
    fn ordering(&self) -> CatalogOrdering {
        CatalogOrdering::NewestFirst
    }
}

/// Retrieves one payload.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stream the payload at `url` into `sink`, returning bytes written.
    async fn fetch(&self, url: &str, sink: &mut ByteSink<'_>) -> Result<u64, TransferError>;
}
