//! Retrieval of raw provider documents.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use cloudtide_core::SearchSyncConfig;

use crate::errors::SyncError;

/// Source of raw provider documents.
#[async_trait]
pub trait DocumentFetcher: Send + Sync + std::fmt::Debug {
    /// Fetches the full document body at `url`.
    ///
    /// # Errors
    /// - `SyncError::Network` - Connection, timeout, or body read failure
    /// - `SyncError::HttpStatus` - The source answered with a non-success status
    async fn fetch(&self, url: &str) -> Result<Bytes, SyncError>;
}

/// HTTP implementation of [`DocumentFetcher`].
///
/// The configured timeout covers the whole exchange including the body, and
/// bodies larger than the configured limit are refused.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_document_bytes: usize,
}

impl HttpFetcher {
    /// Creates a fetcher from the sync configuration.
    ///
    /// # Errors
    /// - `reqwest::Error` - The HTTP client could not be constructed
    pub fn new(config: &SearchSyncConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self::with_client(client, config.max_document_bytes))
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client, max_document_bytes: usize) -> Self {
        Self {
            client,
            max_document_bytes,
        }
    }

    fn too_large(&self, url: &str) -> SyncError {
        SyncError::Network {
            url: url.to_string(),
            reason: format!("document exceeds {} bytes", self.max_document_bytes),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, SyncError> {
        let network = |e: reqwest::Error| SyncError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self.client.get(url).send().await.map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if response
            .content_length()
            .is_some_and(|length| length > self.max_document_bytes as u64)
        {
            return Err(self.too_large(url));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(network)? {
            if body.len() + chunk.len() > self.max_document_bytes {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::trace!(url, bytes = body.len(), "Fetched provider document");
        Ok(body.freeze())
    }
}
