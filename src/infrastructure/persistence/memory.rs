//! In-memory [`IndexStore`] used for dry runs and tests

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use crate::domain::models::{
    BlockEventBatch, BlockHeight, BlockTxBatch, FailedBlockRecord, FailureKind, IndexedBlockStatus,
    NormalizedTx,
};
use crate::domain::ports::IndexStore;
use crate::infrastructure::persistence::error::DbError;

/// A stored failed-block record with its resolution state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFailure {
    pub record: FailedBlockRecord,
    pub attempts: u32,
    pub resolved: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    blocks: BTreeMap<(String, BlockHeight), IndexedBlockStatus>,
    txs: HashMap<(String, String), NormalizedTx>,
    tx_batches: BTreeMap<(String, BlockHeight), BlockTxBatch>,
    event_batches: BTreeMap<(String, BlockHeight), BlockEventBatch>,
    failures: BTreeMap<(String, BlockHeight, FailureKind), StoredFailure>,
    tx_writes: usize,
    event_writes: usize,
}

impl MemoryState {
    fn status_mut(&mut self, chain_id: &str, height: BlockHeight) -> &mut IndexedBlockStatus {
        self.blocks
            .entry((chain_id.to_string(), height))
            .or_insert(IndexedBlockStatus {
                height,
                ..IndexedBlockStatus::default()
            })
    }

    fn resolve(&mut self, chain_id: &str, height: BlockHeight, kind: FailureKind) {
        if let Some(failure) = self.failures.get_mut(&(chain_id.to_string(), height, kind)) {
            failure.resolved = true;
        }
    }
}

/// Index store holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    state: Mutex<MemoryState>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed index state, as if a previous run had stored the height
    pub async fn mark_indexed(&self, chain_id: &str, height: BlockHeight, tx: bool, events: bool) {
        let mut state = self.state.lock().await;
        let status = state.status_mut(chain_id, height);
        status.tx_indexed |= tx;
        status.block_events_indexed |= events;
    }

    /// Every failed-block record, resolved ones included
    pub async fn failures(&self, chain_id: &str) -> Vec<StoredFailure> {
        let state = self.state.lock().await;
        state
            .failures
            .iter()
            .filter(|((chain, _, _), _)| chain == chain_id)
            .map(|(_, failure)| failure.clone())
            .collect()
    }

    /// Heights with transactions fully indexed
    pub async fn tx_indexed_heights(&self, chain_id: &str) -> Vec<BlockHeight> {
        let state = self.state.lock().await;
        state
            .blocks
            .iter()
            .filter(|((chain, _), status)| chain == chain_id && status.tx_indexed)
            .map(|((_, height), _)| *height)
            .collect()
    }

    /// Heights with block events indexed
    pub async fn event_indexed_heights(&self, chain_id: &str) -> Vec<BlockHeight> {
        let state = self.state.lock().await;
        state
            .blocks
            .iter()
            .filter(|((chain, _), status)| chain == chain_id && status.block_events_indexed)
            .map(|((_, height), _)| *height)
            .collect()
    }

    pub async fn tx_batch(&self, chain_id: &str, height: BlockHeight) -> Option<BlockTxBatch> {
        let state = self.state.lock().await;
        state.tx_batches.get(&(chain_id.to_string(), height)).cloned()
    }

    pub async fn event_batch(&self, chain_id: &str, height: BlockHeight) -> Option<BlockEventBatch> {
        let state = self.state.lock().await;
        state.event_batches.get(&(chain_id.to_string(), height)).cloned()
    }

    /// Number of tx and event batch writes received
    pub async fn write_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.tx_writes, state.event_writes)
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn highest_indexed_height(&self, chain_id: &str) -> Result<Option<BlockHeight>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .blocks
            .iter()
            .filter(|((chain, _), status)| {
                chain == chain_id && (status.tx_indexed || status.block_events_indexed)
            })
            .map(|((_, height), _)| *height)
            .max())
    }

    async fn indexed_block_status(
        &self,
        chain_id: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<IndexedBlockStatus>, DbError> {
        if from > to {
            return Ok(Vec::new());
        }
        let state = self.state.lock().await;
        Ok(state
            .blocks
            .range((chain_id.to_string(), from)..=(chain_id.to_string(), to))
            .map(|(_, status)| *status)
            .collect())
    }

    async fn heights_with_message_type(
        &self,
        chain_id: &str,
        type_url: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<BlockHeight>, DbError> {
        let state = self.state.lock().await;
        let mut heights: Vec<BlockHeight> = state
            .txs
            .iter()
            .filter(|((chain, _), tx)| {
                chain == chain_id
                    && (from..=to).contains(&tx.height)
                    && tx.messages.iter().any(|m| m.type_url == type_url)
            })
            .map(|(_, tx)| tx.height)
            .collect();
        heights.sort_unstable();
        heights.dedup();
        Ok(heights)
    }

    async fn unresolved_failed_blocks(
        &self,
        chain_id: &str,
    ) -> Result<Vec<FailedBlockRecord>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .failures
            .iter()
            .filter(|((chain, _, _), failure)| chain == chain_id && !failure.resolved)
            .map(|(_, failure)| failure.record.clone())
            .collect())
    }

    async fn upsert_failed_block(&self, record: &FailedBlockRecord) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let key = (record.chain_id.clone(), record.height, record.kind);
        state
            .failures
            .entry(key)
            .and_modify(|failure| {
                failure.record = record.clone();
                failure.attempts += 1;
                failure.resolved = false;
            })
            .or_insert_with(|| StoredFailure {
                record: record.clone(),
                attempts: 1,
                resolved: false,
            });
        Ok(())
    }

    async fn index_block_txs(&self, batch: &BlockTxBatch) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        state.tx_writes += 1;

        for tx in &batch.txs {
            state
                .txs
                .insert((batch.chain_id.clone(), tx.hash.clone()), tx.clone());
        }
        state
            .tx_batches
            .insert((batch.chain_id.clone(), batch.height), batch.clone());

        if batch.is_complete() {
            state.status_mut(&batch.chain_id, batch.height).tx_indexed = true;
            state.resolve(&batch.chain_id, batch.height, FailureKind::TxData);
        } else {
            state.status_mut(&batch.chain_id, batch.height);
        }
        Ok(())
    }

    async fn index_block_events(&self, batch: &BlockEventBatch) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        state.event_writes += 1;

        state
            .event_batches
            .insert((batch.chain_id.clone(), batch.height), batch.clone());
        state.status_mut(&batch.chain_id, batch.height).block_events_indexed = true;
        state.resolve(&batch.chain_id, batch.height, FailureKind::EventData);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FailureReason;
    use chrono::Utc;

    fn batch(height: BlockHeight, unprocessable: Vec<String>) -> BlockTxBatch {
        BlockTxBatch {
            chain_id: "test-1".to_string(),
            height,
            block_hash: "HASH".to_string(),
            time: Utc::now(),
            proposer_address: "PROP".to_string(),
            txs: Vec::new(),
            unprocessable_txs: unprocessable,
        }
    }

    fn failure(height: BlockHeight, kind: FailureKind) -> FailedBlockRecord {
        FailedBlockRecord::new(height, "test-1", "test", kind, FailureReason::BlockQueryError)
    }

    #[tokio::test]
    async fn test_failed_block_upsert_is_unique_per_kind() {
        let store = MemoryIndexStore::new();
        store.upsert_failed_block(&failure(5, FailureKind::TxData)).await.unwrap();
        store.upsert_failed_block(&failure(5, FailureKind::TxData)).await.unwrap();
        store.upsert_failed_block(&failure(5, FailureKind::EventData)).await.unwrap();

        let failures = store.failures("test-1").await;
        assert_eq!(failures.len(), 2);
        assert_eq!(failures.iter().map(|f| f.attempts).max(), Some(2));
    }

    #[tokio::test]
    async fn test_successful_write_resolves_failure_and_keeps_history() {
        let store = MemoryIndexStore::new();
        store.upsert_failed_block(&failure(5, FailureKind::TxData)).await.unwrap();

        store.index_block_txs(&batch(5, Vec::new())).await.unwrap();

        assert!(store.unresolved_failed_blocks("test-1").await.unwrap().is_empty());
        let failures = store.failures("test-1").await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].resolved);
        assert_eq!(store.tx_indexed_heights("test-1").await, vec![5]);
    }

    #[tokio::test]
    async fn test_incomplete_batch_is_not_marked_indexed() {
        let store = MemoryIndexStore::new();
        store.upsert_failed_block(&failure(6, FailureKind::TxData)).await.unwrap();

        store
            .index_block_txs(&batch(6, vec!["ABC".to_string()]))
            .await
            .unwrap();

        assert!(store.tx_indexed_heights("test-1").await.is_empty());
        assert_eq!(store.unresolved_failed_blocks("test-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_indexed_block_status_range() {
        let store = MemoryIndexStore::new();
        store.mark_indexed("test-1", 3, true, false).await;
        store.mark_indexed("test-1", 7, false, true).await;
        store.mark_indexed("other-1", 4, true, true).await;

        let status = store.indexed_block_status("test-1", 1, 5).await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].height, 3);
        assert_eq!(store.highest_indexed_height("test-1").await.unwrap(), Some(7));
        assert_eq!(store.highest_indexed_height("none").await.unwrap(), None);
    }
}
