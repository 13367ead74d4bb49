//! Price feed collaborator.
//!
//! Reads the latest answer of an on-chain price aggregator through an EVM
//! JSON-RPC node (`eth_call` of `latestRoundData()`).

use crate::error::SourceError;
use crate::models::FixedPoint;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// `latestRoundData()` selector.
const LATEST_ROUND_DATA: &str = "0xfeaf968c";

const WORD: usize = 32;

/// Reads the latest price of a feed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `feed` is an address or any other handle the implementation understands.
    async fn read_latest_price(&self, feed: &str) -> Result<FixedPoint, SourceError>;
}

/// Named feeds plus the default feed used when a configured one fails.
#[derive(Debug, Clone)]
pub struct FeedTable {
    feeds: HashMap<String, String>,
    default_feed: String,
}

impl FeedTable {
    pub fn new(feeds: HashMap<String, String>, default_feed: impl Into<String>) -> Self {
        Self {
            feeds,
            default_feed: default_feed.into(),
        }
    }

    /// Resolve a feed name to its address. Unknown handles pass through as-is.
    pub fn resolve<'a>(&'a self, handle: &'a str) -> &'a str {
        self.feeds.get(handle).map(String::as_str).unwrap_or(handle)
    }

    /// Name of the default feed.
    pub fn default_name(&self) -> &str {
        &self.default_feed
    }

    /// Address of the default feed.
    pub fn default_address(&self) -> &str {
        self.resolve(&self.default_feed)
    }
}

/// Price source backed by an EVM JSON-RPC endpoint.
pub struct EvmRpcPriceSource {
    rpc_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

impl EvmRpcPriceSource {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let rpc_url = rpc_url.into();
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::unavailable("evm-rpc", e))?;

        Ok(Self {
            rpc_url,
            http_client,
        })
    }
}

#[async_trait]
impl PriceSource for EvmRpcPriceSource {
    async fn read_latest_price(&self, feed: &str) -> Result<FixedPoint, SourceError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [{ "to": feed, "data": LATEST_ROUND_DATA }, "latest"],
        });

        debug!("eth_call latestRoundData on {}", feed);

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::unavailable(feed, "RPC request timed out")
                } else if e.is_connect() {
                    SourceError::unavailable(feed, format!("cannot connect to {}", self.rpc_url))
                } else {
                    SourceError::unavailable(feed, e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::unavailable(
                feed,
                format!("RPC error {}: {}", status, body),
            ));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| SourceError::malformed(feed, e))?;

        if let Some(error) = rpc.error {
            return Err(SourceError::unavailable(feed, format!("call reverted: {}", error)));
        }

        let result = rpc
            .result
            .ok_or_else(|| SourceError::malformed(feed, "missing result"))?;
        let bytes = hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| SourceError::malformed(feed, e))?;

        let price =
            decode_round_answer(&bytes).map_err(|reason| SourceError::malformed(feed, reason))?;
        debug!("Feed {} answered {} (raw {})", feed, price, price.raw());
        Ok(price)
    }
}

/// Extract `answer` (the second word, an `int256`) from ABI-encoded
/// `latestRoundData()` output.
pub fn decode_round_answer(data: &[u8]) -> Result<FixedPoint, String> {
    if data.len() < 2 * WORD {
        return Err(format!("expected at least {} bytes, got {}", 2 * WORD, data.len()));
    }

    let word = &data[WORD..2 * WORD];
    let (high, low) = word.split_at(WORD - 8);
    let negative = low[0] & 0x80 != 0;
    let sign_byte = if negative { 0xff } else { 0x00 };

    if high.iter().any(|b| *b != sign_byte) {
        return Err("answer does not fit in 64 bits".to_string());
    }

    let mut raw = [0u8; 8];
    raw.copy_from_slice(low);
    Ok(FixedPoint::from_raw(i64::from_be_bytes(raw)))
}
