//! Best-effort result of fetching one height.
//!
//! Each data kind carries its own outcome so "not asked for", "fetched" and
//! "failed" stay distinct.

use super::chain::{Block, BlockResults, TxSearchResponse};
use super::failed_block::FailureReason;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Fetched(T),
    Failed(FailureReason),
    NotRequested,
}

impl<T> FetchOutcome<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    pub fn fetched(&self) -> Option<&T> {
        match self {
            FetchOutcome::Fetched(value) => Some(value),
            _ => None,
        }
    }
}

/// Where a height's transactions will be decoded from
#[derive(Debug, Clone, PartialEq)]
pub enum TxSource {
    /// Tx search response with messages already decoded by the node
    Search(TxSearchResponse),
    /// Raw block tx bytes paired with their execution results
    BlockBytes(BlockResults),
}

/// Worker output for one height
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerBlockEventData {
    pub block: Block,
    pub block_results: FetchOutcome<BlockResults>,
    pub txs: FetchOutcome<TxSource>,
}

impl IndexerBlockEventData {
    pub fn block_event_requests_failed(&self) -> bool {
        self.block_results.is_failed()
    }

    pub fn tx_requests_failed(&self) -> bool {
        self.txs.is_failed()
    }
}
