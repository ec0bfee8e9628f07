//! Connection manager rotating over the configured node URLs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use tidemark_core::error::{ChainError, ChainResult};
use tidemark_core::ports::ConnectionManager;

use crate::client::{TendermintClient, TendermintClientConfig};

/// Opens [`TendermintClient`]s, round-robin over the node list.
///
/// Every client shares one HTTP connection pool; a "connection" is a client
/// bound to one node URL.
pub struct TendermintConnectionManager {
    urls: Vec<Url>,
    next: AtomicUsize,
    http: Client,
    timeout: Duration,
    base64_attributes: bool,
}

impl TendermintConnectionManager {
    pub fn new(urls: Vec<Url>, timeout: Duration, base64_attributes: bool) -> ChainResult<Self> {
        if urls.is_empty() {
            return Err(ChainError::ConnectionFailed("no node URL configured".into()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            urls,
            next: AtomicUsize::new(0),
            http,
            timeout,
            base64_attributes,
        })
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }
}

#[async_trait]
impl ConnectionManager for TendermintConnectionManager {
    type Connection = TendermintClient;

    async fn connect(&self) -> ChainResult<TendermintClient> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        let url = self.urls[index].clone();
        debug!(node = %url, "Opening node connection");

        let config = TendermintClientConfig {
            url,
            timeout: self.timeout,
            base64_attributes: self.base64_attributes,
        };
        Ok(TendermintClient::with_http_client(config, self.http.clone()))
    }
}
