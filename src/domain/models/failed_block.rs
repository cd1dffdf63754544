use serde::{Deserialize, Serialize};
use std::fmt;

use super::chain::BlockHeight;

/// Which half of a height's data could not be indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    EventData,
    TxData,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::EventData => "event-data",
            FailureKind::TxData => "tx-data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "event-data" => Some(FailureKind::EventData),
            "tx-data" => Some(FailureKind::TxData),
            _ => None,
        }
    }
}

/// Block-level failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    NodeMissingBlockTxs,
    BlockQueryError,
    UnprocessableTxError,
    RewardLookupError,
    RewardIndexError,
    NodeMissingHistoryForBlock,
    FailedBlockEventHandling,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NodeMissingBlockTxs => "node_missing_block_txs",
            FailureReason::BlockQueryError => "block_query_error",
            FailureReason::UnprocessableTxError => "unprocessable_tx_error",
            FailureReason::RewardLookupError => "reward_lookup_error",
            FailureReason::RewardIndexError => "reward_index_error",
            FailureReason::NodeMissingHistoryForBlock => "node_missing_history_for_block",
            FailureReason::FailedBlockEventHandling => "failed_block_event_handling",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            FailureReason::NodeMissingBlockTxs,
            FailureReason::BlockQueryError,
            FailureReason::UnprocessableTxError,
            FailureReason::RewardLookupError,
            FailureReason::RewardIndexError,
            FailureReason::NodeMissingHistoryForBlock,
            FailureReason::FailedBlockEventHandling,
        ]
        .into_iter()
        .find(|r| r.as_str() == value)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A height that failed to index. Unique per (chain, height, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBlockRecord {
    pub height: BlockHeight,
    pub chain_id: String,
    pub chain_name: String,
    pub kind: FailureKind,
    pub reason: FailureReason,
}

impl FailedBlockRecord {
    pub fn new(
        height: BlockHeight,
        chain_id: &str,
        chain_name: &str,
        kind: FailureKind,
        reason: FailureReason,
    ) -> Self {
        Self {
            height,
            chain_id: chain_id.to_string(),
            chain_name: chain_name.to_string(),
            kind,
            reason,
        }
    }
}
