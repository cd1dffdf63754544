//! Persistence writer for processed block data
//!
//! A dedicated background task that receives persist requests from the block
//! processor, groups them into batches and writes them through the index
//! store. Each request is written in its own database transaction.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::errors::PipelineError;
use crate::domain::models::{
    BlockEventBatch, BlockHeight, FailedBlockRecord, FailureKind, FailureReason, PersistRequest,
};
use crate::domain::ports::IndexStore;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging;

/// Configuration for the persistence writer
#[derive(Debug, Clone)]
pub struct PersistenceWriterConfig {
    /// Maximum number of requests to write in a single batch
    pub batch_size: usize,
    /// Maximum time to wait before writing a partial batch
    pub batch_timeout: Duration,
    /// Number of attempts for each request
    pub max_retries: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
    /// Log elapsed time every this many written blocks, 0 disables
    pub block_timer: u64,
}

impl Default for PersistenceWriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_timeout: Duration::from_millis(500),
            max_retries: 2,
            retry_delay: Duration::from_millis(100),
            block_timer: 10000,
        }
    }
}

/// Counters reported when the writer shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub tx_batches: u64,
    pub txs: u64,
    pub event_batches: u64,
    pub failed_event_batches: u64,
}

/// Tracks elapsed time over a window of written blocks
#[derive(Debug)]
struct BlockTimer {
    every: u64,
    heights: HashSet<BlockHeight>,
    window_start: Instant,
    total: u64,
}

impl BlockTimer {
    fn new(every: u64) -> Self {
        Self {
            every,
            heights: HashSet::new(),
            window_start: Instant::now(),
            total: 0,
        }
    }

    fn record(&mut self, chain_id: &str, height: BlockHeight) {
        if self.every == 0 || !self.heights.insert(height) {
            return;
        }
        if self.heights.len() as u64 >= self.every {
            self.total += self.every;
            logging::log_info(&format!(
                "[{}] Wrote {} blocks in {:.2}s ({} total, latest height {})",
                chain_id,
                self.every,
                self.window_start.elapsed().as_secs_f64(),
                self.total,
                height
            ));
            self.heights.clear();
            self.window_start = Instant::now();
        }
    }
}

/// Persistence writer service
#[derive(Debug)]
pub struct PersistenceWriter {
    store: Arc<dyn IndexStore>,
    chain_id: String,
    chain_name: String,
    config: PersistenceWriterConfig,
    receiver: Option<mpsc::Receiver<PersistRequest>>,
    summary: WriterSummary,
    timer: BlockTimer,
}

impl PersistenceWriter {
    /// Create a new persistence writer
    pub fn new(
        store: Arc<dyn IndexStore>,
        chain_id: &str,
        chain_name: &str,
        receiver: mpsc::Receiver<PersistRequest>,
        config: Option<PersistenceWriterConfig>,
    ) -> Self {
        let config = config.unwrap_or_default();
        Self {
            store,
            chain_id: chain_id.to_string(),
            chain_name: chain_name.to_string(),
            timer: BlockTimer::new(config.block_timer),
            config,
            receiver: Some(receiver),
            summary: WriterSummary::default(),
        }
    }

    /// Run until the request channel is closed and drained.
    ///
    /// A transaction batch that cannot be written is fatal. A block event
    /// batch that cannot be written is recorded as a failed block instead.
    pub async fn start(mut self) -> Result<WriterSummary, PipelineError> {
        let mut receiver = self
            .receiver
            .take()
            .ok_or_else(|| PipelineError::WriterFailed("writer already started".to_string()))?;
        let mut batch_timer = interval(self.config.batch_timeout);
        batch_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut current_batch = Vec::with_capacity(self.config.batch_size);

        logging::log_info(&format!(
            "[DATABASE_WRITER] Starting persistence writer (batch_size: {}, timeout: {:?})",
            self.config.batch_size, self.config.batch_timeout
        ));

        loop {
            tokio::select! {
                request = receiver.recv() => {
                    match request {
                        Some(req) => {
                            current_batch.push(req);
                            if current_batch.len() >= self.config.batch_size {
                                self.process_batch(&mut current_batch).await?;
                            }
                        }
                        None => {
                            self.process_batch(&mut current_batch).await?;
                            logging::log_info("[DATABASE_WRITER] Channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = batch_timer.tick() => {
                    self.process_batch(&mut current_batch).await?;
                }
            }
        }

        logging::log_info(&format!(
            "[DATABASE_WRITER] Wrote {} tx batches ({} txs) and {} event batches, {} event batches failed",
            self.summary.tx_batches,
            self.summary.txs,
            self.summary.event_batches,
            self.summary.failed_event_batches
        ));
        Ok(self.summary)
    }

    /// Write a batch of requests, one database transaction each
    async fn process_batch(&mut self, batch: &mut Vec<PersistRequest>) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let start_time = Instant::now();
        let batch_size = batch.len();

        for request in batch.drain(..) {
            let height = request.height();
            match request {
                PersistRequest::Transactions(txs) => {
                    let result = self
                        .with_retries(height, || self.store.index_block_txs(&txs))
                        .await;
                    if let Err(e) = result {
                        return Err(PipelineError::WriterFailed(format!(
                            "transactions at height {}: {}",
                            height, e
                        )));
                    }
                    self.summary.tx_batches += 1;
                    self.summary.txs += txs.txs.len() as u64;
                }
                PersistRequest::BlockEvents(events) => {
                    let result = self
                        .with_retries(height, || self.store.index_block_events(&events))
                        .await;
                    match result {
                        Ok(()) => self.summary.event_batches += 1,
                        Err(e) => {
                            self.summary.failed_event_batches += 1;
                            self.record_event_failure(&events, &e).await;
                        }
                    }
                }
            }
            self.timer.record(&self.chain_id, height);
        }

        let duration = start_time.elapsed();
        logging::log_debug(&format!(
            "[DATABASE_WRITER] Wrote batch of {} requests in {:?}",
            batch_size, duration
        ));
        if duration.as_secs_f64() > 2.0 {
            logging::log_warning(&format!(
                "[DATABASE_WRITER] Slow batch: {} requests took {:.2}s",
                batch_size,
                duration.as_secs_f64()
            ));
        }

        Ok(())
    }

    async fn with_retries<F, Fut>(&self, height: BlockHeight, operation: F) -> Result<(), DbError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), DbError>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    logging::log_error(&format!(
                        "[DATABASE_WRITER] Failed to write height {} (attempt {}/{}): {}",
                        height, attempts, max_attempts, e
                    ));
                    if attempts >= max_attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    async fn record_event_failure(&self, batch: &BlockEventBatch, error: &DbError) {
        let reason = if batch.has_epoch_data {
            FailureReason::RewardIndexError
        } else {
            FailureReason::FailedBlockEventHandling
        };
        logging::log_error(&format!(
            "[{}] Block events at height {} not written ({}): {}",
            self.chain_id, batch.height, reason, error
        ));

        let record = FailedBlockRecord::new(
            batch.height,
            &self.chain_id,
            &self.chain_name,
            FailureKind::EventData,
            reason,
        );
        logging::log_failed_block(&record);
        if let Err(e) = self.store.upsert_failed_block(&record).await {
            logging::log_failed_block_not_recorded(&record, &e);
        }
    }
}

/// Builder for creating PersistenceWriter instances with custom configuration
pub struct PersistenceWriterBuilder {
    config: PersistenceWriterConfig,
}

impl PersistenceWriterBuilder {
    pub fn new() -> Self {
        Self {
            config: PersistenceWriterConfig::default(),
        }
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size.max(1);
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn block_timer(mut self, every: u64) -> Self {
        self.config.block_timer = every;
        self
    }

    pub fn build(
        self,
        store: Arc<dyn IndexStore>,
        chain_id: &str,
        chain_name: &str,
        receiver: mpsc::Receiver<PersistRequest>,
    ) -> PersistenceWriter {
        PersistenceWriter::new(store, chain_id, chain_name, receiver, Some(self.config))
    }
}

impl Default for PersistenceWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BlockTxBatch, IndexedBlockStatus};
    use crate::infrastructure::persistence::MemoryIndexStore;
    use async_trait::async_trait;
    use chrono::Utc;

    const CHAIN: &str = "test-1";

    fn tx_batch(height: BlockHeight) -> PersistRequest {
        PersistRequest::Transactions(BlockTxBatch {
            chain_id: CHAIN.to_string(),
            height,
            block_hash: format!("HASH{}", height),
            time: Utc::now(),
            proposer_address: String::new(),
            txs: Vec::new(),
            unprocessable_txs: Vec::new(),
        })
    }

    fn event_batch(height: BlockHeight, has_epoch_data: bool) -> PersistRequest {
        PersistRequest::BlockEvents(BlockEventBatch {
            chain_id: CHAIN.to_string(),
            height,
            block_hash: format!("HASH{}", height),
            time: Utc::now(),
            events: Vec::new(),
            relevant_data: Vec::new(),
            has_epoch_data,
        })
    }

    /// Memory store whose writes always fail
    #[derive(Debug, Default)]
    struct BrokenStore {
        inner: MemoryIndexStore,
    }

    #[async_trait]
    impl IndexStore for BrokenStore {
        async fn highest_indexed_height(&self, chain_id: &str) -> Result<Option<BlockHeight>, DbError> {
            self.inner.highest_indexed_height(chain_id).await
        }

        async fn indexed_block_status(
            &self,
            chain_id: &str,
            from: BlockHeight,
            to: BlockHeight,
        ) -> Result<Vec<IndexedBlockStatus>, DbError> {
            self.inner.indexed_block_status(chain_id, from, to).await
        }

        async fn heights_with_message_type(
            &self,
            chain_id: &str,
            type_url: &str,
            from: BlockHeight,
            to: BlockHeight,
        ) -> Result<Vec<BlockHeight>, DbError> {
            self.inner
                .heights_with_message_type(chain_id, type_url, from, to)
                .await
        }

        async fn unresolved_failed_blocks(
            &self,
            chain_id: &str,
        ) -> Result<Vec<FailedBlockRecord>, DbError> {
            self.inner.unresolved_failed_blocks(chain_id).await
        }

        async fn upsert_failed_block(&self, record: &FailedBlockRecord) -> Result<(), DbError> {
            self.inner.upsert_failed_block(record).await
        }

        async fn index_block_txs(&self, _batch: &BlockTxBatch) -> Result<(), DbError> {
            Err(DbError::SeaOrm(sea_orm::DbErr::Custom("disk full".to_string())))
        }

        async fn index_block_events(&self, _batch: &BlockEventBatch) -> Result<(), DbError> {
            Err(DbError::SeaOrm(sea_orm::DbErr::Custom("disk full".to_string())))
        }
    }

    fn writer(
        store: Arc<dyn IndexStore>,
        receiver: mpsc::Receiver<PersistRequest>,
    ) -> PersistenceWriter {
        PersistenceWriterBuilder::new()
            .batch_size(2)
            .retry_delay(Duration::from_millis(1))
            .build(store, CHAIN, "test", receiver)
    }

    #[tokio::test]
    async fn test_writer_drains_channel() {
        let store = Arc::new(MemoryIndexStore::new());
        let (sender, receiver) = mpsc::channel(8);
        let handle = tokio::spawn(writer(store.clone(), receiver).start());

        for height in 1..=3 {
            sender.send(tx_batch(height)).await.unwrap();
        }
        sender.send(event_batch(2, false)).await.unwrap();
        drop(sender);

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.tx_batches, 3);
        assert_eq!(summary.event_batches, 1);
        assert_eq!(store.tx_indexed_heights(CHAIN).await, vec![1, 2, 3]);
        assert_eq!(store.event_indexed_heights(CHAIN).await, vec![2]);
    }

    #[tokio::test]
    async fn test_failed_tx_batch_is_fatal() {
        let store = Arc::new(BrokenStore::default());
        let (sender, receiver) = mpsc::channel(8);
        let handle = tokio::spawn(writer(store, receiver).start());

        sender.send(tx_batch(1)).await.unwrap();
        drop(sender);

        assert!(matches!(
            handle.await.unwrap(),
            Err(PipelineError::WriterFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_event_batch_is_recorded() {
        let store = Arc::new(BrokenStore::default());
        let (sender, receiver) = mpsc::channel(8);
        let handle = tokio::spawn(writer(store.clone(), receiver).start());

        sender.send(event_batch(4, false)).await.unwrap();
        sender.send(event_batch(5, true)).await.unwrap();
        drop(sender);

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.failed_event_batches, 2);

        let failures = store.unresolved_failed_blocks(CHAIN).await.unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].reason, FailureReason::FailedBlockEventHandling);
        assert_eq!(failures[1].reason, FailureReason::RewardIndexError);
        assert!(failures.iter().all(|f| f.kind == FailureKind::EventData));
    }
}
