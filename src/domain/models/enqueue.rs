use serde::{Deserialize, Serialize};

use super::chain::BlockHeight;

/// A height handed to the worker pool together with what to fetch for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub height: BlockHeight,
    pub index_block_events: bool,
    pub index_transactions: bool,
}

impl EnqueueRequest {
    pub fn new(height: BlockHeight, index_block_events: bool, index_transactions: bool) -> Self {
        Self {
            height,
            index_block_events,
            index_transactions,
        }
    }

    /// True if there is nothing left to fetch for the height
    pub fn is_empty(&self) -> bool {
        !self.index_block_events && !self.index_transactions
    }
}

/// Stored index state of one height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexedBlockStatus {
    pub height: BlockHeight,
    pub tx_indexed: bool,
    pub block_events_indexed: bool,
}
