//! Tendermint RPC and Cosmos REST gateway provider

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::ChainRpcProvider;
use crate::domain::models::chain::{de_i64, de_null_vec, TxSearchPage};
use crate::domain::models::{Block, BlockHeight, BlockResults, NodeStatus};
use crate::infrastructure::rpc::error::RpcClientError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 100;

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    #[serde(deserialize_with = "de_i64")]
    latest_block_height: i64,
    #[serde(default, deserialize_with = "de_i64")]
    earliest_block_height: i64,
    #[serde(default)]
    catching_up: bool,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block_id: BlockId,
    block: BlockBody,
}

#[derive(Debug, Deserialize)]
struct BlockId {
    #[serde(default)]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct BlockBody {
    header: BlockHeader,
    #[serde(default)]
    data: BlockData,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    #[serde(deserialize_with = "de_i64")]
    height: i64,
    time: DateTime<Utc>,
    #[serde(default)]
    proposer_address: String,
}

#[derive(Debug, Default, Deserialize)]
struct BlockData {
    #[serde(default, deserialize_with = "de_null_vec")]
    txs: Vec<String>,
}

/// Provider backed by a Tendermint RPC endpoint and a Cosmos REST endpoint
#[derive(Debug)]
pub struct TendermintProvider {
    rpc_url: String,
    rest_url: String,
    client: Client,
}

impl TendermintProvider {
    /// Create a new provider with a per-request timeout
    pub fn new(rpc_url: &str, rest_url: &str, timeout: Duration) -> Result<Self, RpcClientError> {
        if rpc_url.is_empty() {
            return Err(RpcClientError::ConfigError(
                "RPC endpoint not configured".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcClientError::ConfigError(e.to_string()))?;

        Ok(Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            rest_url: rest_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Make a GET call to the Tendermint RPC and unwrap its JSON-RPC envelope
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RpcClientError> {
        let url = format!("{}/{}", self.rpc_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        let response_json: Value = serde_json::from_str(&response_text).map_err(|e| {
            if status.is_success() {
                RpcClientError::ParseError(e.to_string())
            } else {
                RpcClientError::NetworkError(format!("{} returned HTTP {}", url, status))
            }
        })?;

        if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
            return Err(rpc_error(error));
        }

        // CometBFT 0.38+ may serve the result without the JSON-RPC envelope
        let result = response_json
            .get("result")
            .cloned()
            .unwrap_or(response_json);
        Ok(serde_json::from_value(result)?)
    }

    /// Make a GET call to the REST gateway
    async fn rest_call<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RpcClientError> {
        if self.rest_url.is_empty() {
            return Err(RpcClientError::ConfigError(
                "REST endpoint not configured".to_string(),
            ));
        }
        let url = format!("{}/{}", self.rest_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<Value>(&response_text) {
                Ok(body) if body.get("code").is_some() => rpc_error(&body),
                _ => RpcClientError::NetworkError(format!("{} returned HTTP {}", url, status)),
            });
        }

        Ok(serde_json::from_str(&response_text)?)
    }
}

fn rpc_error(error: &Value) -> RpcClientError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
    let message = error
        .get("data")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
        .or_else(|| error.get("message").and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string();
    RpcClientError::RpcError { code, message }
}

#[async_trait]
impl ChainRpcProvider for TendermintProvider {
    fn provider_name(&self) -> String {
        format!("Tendermint ({})", self.rpc_url)
    }

    async fn status(&self) -> Result<NodeStatus, RpcClientError> {
        let result: StatusResult = self.rpc_call("status", &[]).await?;
        Ok(NodeStatus {
            earliest_height: result.sync_info.earliest_block_height,
            latest_height: result.sync_info.latest_block_height,
            catching_up: result.sync_info.catching_up,
        })
    }

    async fn block(&self, height: BlockHeight) -> Result<Block, RpcClientError> {
        let result: BlockResult = self
            .rpc_call("block", &[("height", height.to_string())])
            .await?;

        let txs = result
            .block
            .data
            .txs
            .iter()
            .map(|tx| BASE64.decode(tx))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RpcClientError::ParseError(format!("block {} tx bytes: {}", height, e)))?;

        Ok(Block {
            height: result.block.header.height,
            hash: result.block_id.hash,
            time: result.block.header.time,
            proposer_address: result.block.header.proposer_address,
            txs,
        })
    }

    async fn block_results(&self, height: BlockHeight) -> Result<BlockResults, RpcClientError> {
        self.rpc_call("block_results", &[("height", height.to_string())])
            .await
    }

    async fn txs_by_height_page(
        &self,
        height: BlockHeight,
        offset: u64,
        limit: u64,
    ) -> Result<TxSearchPage, RpcClientError> {
        self.rest_call(
            "cosmos/tx/v1beta1/txs",
            &[
                ("events", format!("tx.height={}", height)),
                ("pagination.limit", limit.to_string()),
                ("pagination.offset", offset.to_string()),
            ],
        )
        .await
    }
}
