//! JSON-RPC chain client.
//!
//! Only two calls are needed: `eth_blockNumber` for the head and
//! `eth_getLogs` for one contract over a block range. The HTTP client retries
//! transport failures with exponential backoff; JSON-RPC execution errors
//! (e.g. "query returned more than 10000 results") are returned immediately.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

use soundindex_core::{EventRange, WatcherError};

use crate::retry::{RetryConfig, RetryPolicy};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.block_number)
    }

    pub fn log_index_u32(&self) -> Option<u32> {
        parse_hex_u64(&self.log_index).and_then(|n| u32::try_from(n).ok())
    }

    /// `true` if the node reports this log as dropped by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Parse a hex quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

fn to_hex_quantity(n: u64) -> String {
    format!("0x{n:x}")
}

// ─── Chain client ─────────────────────────────────────────────────────────────

/// Read access to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number.
    async fn latest_block_number(&self) -> Result<u64, WatcherError>;

    /// All logs emitted by `address` in the inclusive range.
    async fn get_logs(&self, address: &str, range: EventRange) -> Result<Vec<RawLog>, WatcherError>;
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Failures talking to the node.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("unexpected response: {0}")]
    Deserialization(String),
}

impl TransportError {
    /// Transport-level failures may succeed on retry; node-side execution
    /// errors will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            // -32005: limit exceeded, -32603: internal error (often transient)
            Self::Rpc { code, .. } => matches!(code, -32005 | -32603),
            Self::Deserialization(_) => false,
        }
    }
}

impl From<TransportError> for WatcherError {
    fn from(e: TransportError) -> Self {
        WatcherError::Rpc(e.to_string())
    }
}

// ─── HTTP client ──────────────────────────────────────────────────────────────

/// Configuration for `HttpChainClient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

/// `ChainClient` over HTTP JSON-RPC.
pub struct HttpChainClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    timeout_ms: u64,
    next_id: AtomicU64,
}

impl HttpChainClient {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, WatcherError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| WatcherError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            timeout_ms: config.request_timeout_ms,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params: params.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp = self.http.post(&self.url).json(&req).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { ms: self.timeout_ms }
            } else {
                TransportError::Http(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Deserialization(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(TransportError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| TransportError::Deserialization(format!("{method}: missing result")))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(method, &params).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                method,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                url = %self.url,
                                "retrying RPC call"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn latest_block_number(&self) -> Result<u64, WatcherError> {
        let v = self.call("eth_blockNumber", json!([])).await?;
        v.as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| WatcherError::Rpc(format!("eth_blockNumber: bad result {v}")))
    }

    async fn get_logs(&self, address: &str, range: EventRange) -> Result<Vec<RawLog>, WatcherError> {
        let filter = json!([{
            "address": address,
            "fromBlock": to_hex_quantity(range.from),
            "toBlock": to_hex_quantity(range.to),
        }]);
        let v = self.call("eth_getLogs", filter).await?;
        serde_json::from_value(v).map_err(|e| WatcherError::Rpc(format!("eth_getLogs: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_quantities() {
        assert_eq!(parse_hex_u64("0x1"), Some(1));
        assert_eq!(parse_hex_u64("0xff"), Some(255));
        assert_eq!(parse_hex_u64("1234"), Some(0x1234));
        assert_eq!(parse_hex_u64("0xzz"), None);
        assert_eq!(to_hex_quantity(255), "0xff");
        assert_eq!(to_hex_quantity(0), "0x0");
    }

    #[test]
    fn raw_log_from_node_json() {
        let log: RawLog = serde_json::from_value(json!({
            "address": "0xabc",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x12a05f200",
            "blockHash": "0xbb",
            "transactionHash": "0xtt",
            "logIndex": "0x5",
            "transactionIndex": "0x0"
        }))
        .unwrap();
        assert_eq!(log.block_number_u64(), Some(5_000_000_000));
        assert_eq!(log.log_index_u32(), Some(5));
        assert!(!log.is_removed());
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Http("reset".into()).is_retryable());
        assert!(TransportError::Timeout { ms: 10 }.is_retryable());
        assert!(TransportError::Rpc { code: -32005, message: "limit".into() }.is_retryable());
        assert!(!TransportError::Rpc { code: -32000, message: "range too large".into() }.is_retryable());
        assert!(!TransportError::Deserialization("x".into()).is_retryable());
    }

    #[test]
    fn transport_error_maps_to_rpc() {
        let e: WatcherError = TransportError::Http("down".into()).into();
        assert!(e.is_fetch_failure());
    }

    #[test]
    fn client_builds_without_network() {
        let c = HttpChainClient::new("http://localhost:8545", HttpClientConfig::default()).unwrap();
        assert_eq!(c.url(), "http://localhost:8545");
    }
}
