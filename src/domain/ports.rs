//! Persistence port used by the pipeline.
//!
//! Records are keyed by chain ID and height. Writes are idempotent upserts,
//! so a height may be re-emitted without producing duplicates.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::models::{
    BlockEventBatch, BlockHeight, BlockTxBatch, FailedBlockRecord, IndexedBlockStatus,
};
use crate::infrastructure::persistence::error::DbError;

#[async_trait]
pub trait IndexStore: Send + Sync + Debug {
    /// Highest height with tx or block-event data stored
    async fn highest_indexed_height(&self, chain_id: &str) -> Result<Option<BlockHeight>, DbError>;

    /// Index state of every stored height in `[from, to]`
    async fn indexed_block_status(
        &self,
        chain_id: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<IndexedBlockStatus>, DbError>;

    /// Heights in `[from, to]` containing a message of `type_url`, ascending
    async fn heights_with_message_type(
        &self,
        chain_id: &str,
        type_url: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<BlockHeight>, DbError>;

    /// Failed-block records not yet resolved
    async fn unresolved_failed_blocks(&self, chain_id: &str)
        -> Result<Vec<FailedBlockRecord>, DbError>;

    /// Insert or refresh a failed-block record
    async fn upsert_failed_block(&self, record: &FailedBlockRecord) -> Result<(), DbError>;

    /// Write a height's transactions in one transaction and resolve its tx-data failure
    async fn index_block_txs(&self, batch: &BlockTxBatch) -> Result<(), DbError>;

    /// Write a height's block events in one transaction and resolve its event-data failure
    async fn index_block_events(&self, batch: &BlockEventBatch) -> Result<(), DbError>;
}
