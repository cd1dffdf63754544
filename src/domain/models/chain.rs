//! Raw payloads returned by the chain node.
//!
//! Tendermint and the Cosmos REST gateway encode 64-bit integers as JSON
//! strings, so numeric fields accept both forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::event::RawEvent;

/// Height of a block
pub type BlockHeight = i64;

pub(crate) fn de_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("{} is not an i64", n))),
        Some(Value::String(s)) if s.is_empty() => Ok(0),
        Some(Value::String(s)) => s.parse::<i64>().map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected integer, got {}",
            other
        ))),
    }
}

pub(crate) fn de_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_i64(deserializer)?;
    u32::try_from(value).map_err(serde::de::Error::custom)
}

/// Null arrays are common in block results
pub(crate) fn de_null_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Node sync status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub earliest_height: BlockHeight,
    pub latest_height: BlockHeight,
    pub catching_up: bool,
}

/// A block with its raw transaction bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub height: BlockHeight,
    pub hash: String,
    pub time: DateTime<Utc>,
    pub proposer_address: String,
    pub txs: Vec<Vec<u8>>,
}

/// Execution result of one transaction inside `block_results`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxExecResult {
    #[serde(default, deserialize_with = "de_u32")]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub info: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub gas_wanted: i64,
    #[serde(default, deserialize_with = "de_i64")]
    pub gas_used: i64,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub events: Vec<RawEvent>,
}

/// Output of the `block_results` call, with finalize-block events already split
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockResults {
    #[serde(default, deserialize_with = "de_i64")]
    pub height: BlockHeight,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub txs_results: Vec<TxExecResult>,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub begin_block_events: Vec<RawEvent>,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub end_block_events: Vec<RawEvent>,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub finalize_block_events: Vec<RawEvent>,
}

/// A transaction in the REST tx search response, messages already decoded to JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTx {
    #[serde(default)]
    pub body: SearchTxBody,
    #[serde(default)]
    pub auth_info: Value,
    #[serde(default)]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTxBody {
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub memo: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub timeout_height: i64,
    #[serde(default)]
    pub extension_options: Vec<Value>,
    #[serde(default)]
    pub non_critical_extension_options: Vec<Value>,
}

/// One message's log entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbciMessageLog {
    #[serde(default, deserialize_with = "de_i64")]
    pub msg_index: i64,
    #[serde(default)]
    pub log: String,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub events: Vec<RawEvent>,
}

/// Execution result in the REST tx search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchTxResponse {
    #[serde(default, deserialize_with = "de_i64")]
    pub height: BlockHeight,
    #[serde(default)]
    pub txhash: String,
    #[serde(default)]
    pub codespace: String,
    #[serde(default, deserialize_with = "de_u32")]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub logs: Vec<AbciMessageLog>,
    #[serde(default)]
    pub info: String,
    #[serde(default, deserialize_with = "de_i64")]
    pub gas_wanted: i64,
    #[serde(default, deserialize_with = "de_i64")]
    pub gas_used: i64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub events: Vec<RawEvent>,
}

/// Accumulated tx search pages for one height
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxSearchResponse {
    pub txs: Vec<SearchTx>,
    pub tx_responses: Vec<SearchTxResponse>,
    pub total: u64,
}

/// A single page of the tx search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxSearchPage {
    #[serde(default, deserialize_with = "de_null_vec")]
    pub txs: Vec<SearchTx>,
    #[serde(default, deserialize_with = "de_null_vec")]
    pub tx_responses: Vec<SearchTxResponse>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    /// Newer gateways report the total at the top level
    #[serde(default, deserialize_with = "de_i64")]
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "de_i64")]
    pub total: i64,
}

impl TxSearchPage {
    /// Total reported by whichever field the gateway filled in
    pub fn reported_total(&self) -> u64 {
        let total = self
            .pagination
            .as_ref()
            .map(|p| p.total)
            .filter(|t| *t > 0)
            .unwrap_or(self.total);
        total.max(0) as u64
    }
}
