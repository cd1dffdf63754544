use chrono::{DateTime, Utc};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::chain::BlockHeight;

/// A key/value pair attached to an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ABCI event as emitted by the node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, deserialize_with = "super::chain::de_null_vec")]
    pub attributes: Vec<Attribute>,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            event_type: event_type.into(),
            attributes,
        }
    }

    /// First value for `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Where in block execution an event was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockLifecyclePosition {
    BeginBlock,
    EndBlock,
}

impl BlockLifecyclePosition {
    /// Registry scope key
    pub fn scope(&self) -> &'static str {
        match self {
            BlockLifecyclePosition::BeginBlock => "begin_block",
            BlockLifecyclePosition::EndBlock => "end_block",
        }
    }
}

/// Tags the handler family that produced a piece of relevant data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    CoinReceived,
    ValidatorRewards,
    ValidatorCommission,
    EpochRewardDistribution,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::CoinReceived => "coin_received",
            EventSource::ValidatorRewards => "validator_rewards",
            EventSource::ValidatorCommission => "validator_commission",
            EventSource::EpochRewardDistribution => "epoch_reward_distribution",
        }
    }
}

/// Address-level data extracted by an event handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRelevantInformation {
    pub address: String,
    /// Integral base-denom amount
    pub amount: BigDecimal,
    pub denomination: String,
    pub event_source: EventSource,
}

/// A normalized begin/end block event ready for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEventRecord {
    pub position: BlockLifecyclePosition,
    /// Order within its lifecycle position
    pub event_index: usize,
    pub event_type: String,
    pub attributes: Vec<Attribute>,
}

/// Block events of one height with whatever the handlers extracted
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEventBatch {
    pub chain_id: String,
    pub height: BlockHeight,
    pub block_hash: String,
    pub time: DateTime<Utc>,
    pub events: Vec<BlockEventRecord>,
    pub relevant_data: Vec<EventRelevantInformation>,
    /// True when epoch-scoped handlers contributed to `relevant_data`
    pub has_epoch_data: bool,
}
