//! Tendermint RPC client over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};
use url::Url;

use tidemark_core::error::{ChainError, ChainResult};
use tidemark_core::ports::{NodeConnector, RawBlock, TxResult};

use crate::rpc::{BlockResult, RpcResponse, StatusResult, TxResponse};

/// Configuration for the Tendermint client.
#[derive(Debug, Clone)]
pub struct TendermintClientConfig {
    /// RPC base URL (e.g., "http://localhost:26657").
    pub url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Decode base64 event attributes (Tendermint 0.34 and older).
    pub base64_attributes: bool,
}

impl TendermintClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            timeout: Duration::from_secs(30),
            base64_attributes: false,
        }
    }
}

/// Tendermint client adapter implementing the NodeConnector port.
#[derive(Debug, Clone)]
pub struct TendermintClient {
    http: Client,
    base: Url,
    base64_attributes: bool,
}

impl TendermintClient {
    /// Build a client. No request is made until the first call.
    pub fn new(config: TendermintClientConfig) -> ChainResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: TendermintClientConfig, http: Client) -> Self {
        let mut base = config.url;
        // `Url::join` replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http,
            base,
            base64_attributes: config.base64_attributes,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ChainResult<T> {
        let url = self
            .base
            .join(endpoint)
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        trace!(%url, "RPC request");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ChainError::RpcError(format!("{} request failed: {}", endpoint, e)))?;

        // JSON-RPC errors come back with a non-2xx status and a JSON body,
        // so the body is parsed before looking at the status.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChainError::RpcError(format!("{} read failed: {}", endpoint, e)))?;

        match serde_json::from_str::<RpcResponse<T>>(&body) {
            Ok(parsed) => parsed.into_result(),
            Err(_) if !status.is_success() => Err(ChainError::RpcError(format!(
                "{} returned HTTP {}",
                endpoint, status
            ))),
            Err(e) => Err(ChainError::MalformedResponse(format!(
                "{} response: {}",
                endpoint, e
            ))),
        }
    }
}

#[async_trait]
impl NodeConnector for TendermintClient {
    #[instrument(skip(self), fields(node = %self.base))]
    async fn fetch_block(&self, height: u64) -> ChainResult<RawBlock> {
        let result: BlockResult = self
            .call("block", &[("height", height.to_string())])
            .await
            .map_err(|e| ChainError::BlockFetchError {
                height,
                message: e.to_string(),
            })?;
        Ok(result.into_raw_block())
    }

    #[instrument(skip(self), fields(node = %self.base))]
    async fn fetch_tx_result(&self, hash: &str) -> ChainResult<TxResult> {
        let response: TxResponse = self.call("tx", &[("hash", format!("0x{}", hash))]).await?;
        Ok(response.into_tx_result(self.base64_attributes))
    }

    async fn chain_head_height(&self) -> ChainResult<u64> {
        let status: StatusResult = self.call("status", &[]).await?;
        debug!(head = status.sync_info.latest_block_height, "Chain head");
        Ok(status.sync_info.latest_block_height)
    }
}
