//! reqwest-backed payload fetcher.

use std::time::Duration;

use astrofetch_core::{ByteSink, Fetcher, TransferError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;

use crate::error::{ExecutorError, ExecutorResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams payloads over HTTP(S).
///
/// 401 and 403 map to `AuthExpired`; other 4xx statuses except 429 map to
/// `Rejected`; remaining non-success statuses, connection failures, and broken
/// bodies map to `Network`. Sink write failures map to
/// `Filesystem`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Fetcher with a dedicated client.
    ///
    /// # Errors
    ///
    /// Returns an error when the TLS backend cannot be initialised.
    pub fn new() -> ExecutorResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("astrofetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ExecutorError::HttpClient { source })?;
        Ok(Self { client })
    }

    /// Fetcher reusing an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, sink: &mut ByteSink<'_>) -> Result<u64, TransferError> {
        let mut response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(TransferError::auth_expired(format!("{status} for {url}")));
        }
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            return Err(TransferError::rejected(format!("{status} for {url}")));
        }
        if !status.is_success() {
            return Err(TransferError::network(format!("unexpected status {status} for {url}")));
        }

        let mut written = 0_u64;
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            sink.write_all(&chunk)
                .await
                .map_err(|err| TransferError::filesystem(err.to_string()))?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}

fn classify(err: reqwest::Error) -> TransferError {
    if err.is_timeout() {
        TransferError::timeout(err.to_string())
    } else {
        TransferError::network(err.to_string())
    }
}
