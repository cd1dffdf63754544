//! RPC worker pool.
//!
//! Workers share one request receiver and fetch the block, block results and
//! transactions of each height. Fetch failures are recorded as failed blocks
//! and never stop a worker.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::domain::models::{
    BlockHeight, BlockResults, EnqueueRequest, FailedBlockRecord, FailureKind, FailureReason,
    FetchOutcome, IndexerBlockEventData, TxSource,
};
use crate::domain::ports::IndexStore;
use crate::infrastructure::rpc::ChainClient;
use crate::utils::logging;

/// Settings shared by every worker
#[derive(Debug, Clone)]
pub struct RpcWorkerSettings {
    pub chain_id: String,
    pub chain_name: String,
    pub workers: usize,
    pub skip_tx_search: bool,
}

impl RpcWorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chain_id: config.chain.chain_id.clone(),
            chain_name: config.chain.chain_name.clone(),
            workers: config.indexer.effective_rpc_workers(),
            skip_tx_search: config.indexer.skip_tx_search,
        }
    }

    /// Capacity of the worker output channel
    pub fn output_capacity(&self) -> usize {
        self.workers * 4
    }
}

/// Fixed-size pool of block fetchers
#[derive(Debug, Clone)]
pub struct RpcWorkerPool {
    client: ChainClient,
    store: Arc<dyn IndexStore>,
    settings: RpcWorkerSettings,
}

impl RpcWorkerPool {
    pub fn new(client: ChainClient, store: Arc<dyn IndexStore>, settings: RpcWorkerSettings) -> Self {
        Self {
            client,
            store,
            settings,
        }
    }

    /// Spawn the workers. The returned task ends once the request channel is
    /// closed and drained, dropping the output sender with it.
    pub fn spawn(
        self,
        receiver: mpsc::Receiver<EnqueueRequest>,
        sender: mpsc::Sender<IndexerBlockEventData>,
    ) -> JoinHandle<()> {
        let receiver = Arc::new(Mutex::new(receiver));
        let worker_count = self.settings.workers;

        let handles: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|worker_id| {
                let pool = self.clone();
                let receiver = Arc::clone(&receiver);
                let sender = sender.clone();
                tokio::spawn(async move { pool.run_worker(worker_id, receiver, sender).await })
            })
            .collect();

        let chain_id = self.settings.chain_id.clone();
        tokio::spawn(async move {
            for result in join_all(handles).await {
                if let Err(e) = result {
                    logging::log_error(&format!("[{}] RPC worker panicked: {}", chain_id, e));
                }
            }
            logging::log_info(&format!("[{}] All {} RPC workers stopped", chain_id, worker_count));
        })
    }

    async fn run_worker(
        &self,
        worker_id: usize,
        receiver: Arc<Mutex<mpsc::Receiver<EnqueueRequest>>>,
        sender: mpsc::Sender<IndexerBlockEventData>,
    ) {
        logging::log_debug(&format!(
            "[{}] RPC worker {} started",
            self.settings.chain_id, worker_id
        ));

        loop {
            let request = { receiver.lock().await.recv().await };
            let Some(request) = request else {
                break;
            };

            if let Some(data) = self.fetch(request).await {
                if sender.send(data).await.is_err() {
                    logging::log_warning(&format!(
                        "[{}] RPC worker {} output closed, stopping",
                        self.settings.chain_id, worker_id
                    ));
                    break;
                }
            }
        }
    }

    /// Fetch everything a request asks for. `None` when the block itself
    /// could not be fetched.
    pub async fn fetch(&self, request: EnqueueRequest) -> Option<IndexerBlockEventData> {
        let height = request.height;

        let block = match self.client.block(height).await {
            Ok(block) => block,
            Err(e) => {
                logging::log_error(&format!(
                    "[{}] Failed to fetch block {}: {}",
                    self.settings.chain_id, height, e
                ));
                // The block record is kept whatever was requested, the event
                // record only when events were asked for
                self.record_failure(height, FailureKind::TxData, FailureReason::BlockQueryError)
                    .await;
                if request.index_block_events {
                    self.record_failure(
                        height,
                        FailureKind::EventData,
                        FailureReason::BlockQueryError,
                    )
                    .await;
                }
                return None;
            }
        };

        let block_results = if request.index_block_events {
            match self.client.block_results_with_retry(height).await {
                Ok(results) => FetchOutcome::Fetched(results),
                Err(e) => {
                    logging::log_error(&format!(
                        "[{}] Failed to fetch block results {}: {}",
                        self.settings.chain_id, height, e
                    ));
                    self.record_failure(
                        height,
                        FailureKind::EventData,
                        FailureReason::NodeMissingHistoryForBlock,
                    )
                    .await;
                    FetchOutcome::Failed(FailureReason::NodeMissingHistoryForBlock)
                }
            }
        } else {
            FetchOutcome::NotRequested
        };

        let txs = if request.index_transactions {
            self.fetch_txs(height, block_results.fetched()).await
        } else {
            FetchOutcome::NotRequested
        };

        Some(IndexerBlockEventData {
            block,
            block_results,
            txs,
        })
    }

    async fn fetch_txs(
        &self,
        height: BlockHeight,
        block_results: Option<&BlockResults>,
    ) -> FetchOutcome<TxSource> {
        if !self.settings.skip_tx_search {
            match self.client.txs_by_height_with_retry(height).await {
                Ok(response) => return FetchOutcome::Fetched(TxSource::Search(response)),
                Err(e) => logging::log_warning(&format!(
                    "[{}] Tx search failed at height {}, decoding block txs instead: {}",
                    self.settings.chain_id, height, e
                )),
            }
        }

        if let Some(results) = block_results {
            return FetchOutcome::Fetched(TxSource::BlockBytes(results.clone()));
        }

        match self.client.block_results_with_retry(height).await {
            Ok(results) => FetchOutcome::Fetched(TxSource::BlockBytes(results)),
            Err(e) => {
                logging::log_error(&format!(
                    "[{}] No transaction source for height {}: {}",
                    self.settings.chain_id, height, e
                ));
                self.record_failure(height, FailureKind::TxData, FailureReason::NodeMissingBlockTxs)
                    .await;
                FetchOutcome::Failed(FailureReason::NodeMissingBlockTxs)
            }
        }
    }

    async fn record_failure(&self, height: BlockHeight, kind: FailureKind, reason: FailureReason) {
        let record = FailedBlockRecord::new(
            height,
            &self.settings.chain_id,
            &self.settings.chain_name,
            kind,
            reason,
        );
        logging::log_failed_block(&record);
        if let Err(e) = self.store.upsert_failed_block(&record).await {
            logging::log_failed_block_not_recorded(&record, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::chain::TxSearchPage;
    use crate::domain::models::{Block, NodeStatus};
    use crate::domain::services::RetryPolicy;
    use crate::infrastructure::persistence::MemoryIndexStore;
    use crate::infrastructure::rpc::{ChainRpcProvider, RpcClientError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FlakyProvider {
        missing_blocks: HashSet<BlockHeight>,
        missing_results: HashSet<BlockHeight>,
        search_down: bool,
    }

    #[async_trait]
    impl ChainRpcProvider for FlakyProvider {
        fn provider_name(&self) -> String {
            "flaky".to_string()
        }

        async fn status(&self) -> Result<NodeStatus, RpcClientError> {
            Ok(NodeStatus {
                earliest_height: 1,
                latest_height: 100,
                catching_up: false,
            })
        }

        async fn block(&self, height: BlockHeight) -> Result<Block, RpcClientError> {
            if self.missing_blocks.contains(&height) {
                return Err(RpcClientError::RpcError {
                    code: -32603,
                    message: "height is not available".to_string(),
                });
            }
            Ok(Block {
                height,
                hash: format!("HASH{}", height),
                time: Utc::now(),
                proposer_address: "PROPOSER".to_string(),
                txs: Vec::new(),
            })
        }

        async fn block_results(&self, height: BlockHeight) -> Result<BlockResults, RpcClientError> {
            if self.missing_results.contains(&height) {
                return Err(RpcClientError::NetworkError("pruned".to_string()));
            }
            Ok(BlockResults {
                height,
                ..BlockResults::default()
            })
        }

        async fn txs_by_height_page(
            &self,
            _height: BlockHeight,
            _offset: u64,
            _limit: u64,
        ) -> Result<TxSearchPage, RpcClientError> {
            if self.search_down {
                return Err(RpcClientError::Timeout("tx search".to_string()));
            }
            Ok(TxSearchPage::default())
        }
    }

    fn pool(provider: FlakyProvider, skip_tx_search: bool) -> (RpcWorkerPool, Arc<MemoryIndexStore>) {
        let store = Arc::new(MemoryIndexStore::new());
        let client = ChainClient::new(
            Arc::new(provider),
            RetryPolicy::new(1, Duration::from_secs(1)),
        );
        let settings = RpcWorkerSettings {
            chain_id: "testchain-1".to_string(),
            chain_name: "testchain".to_string(),
            workers: 2,
            skip_tx_search,
        };
        (RpcWorkerPool::new(client, store.clone(), settings), store)
    }

    #[tokio::test]
    async fn test_block_fetch_failure_records_both_kinds() {
        let provider = FlakyProvider {
            missing_blocks: HashSet::from([7]),
            ..FlakyProvider::default()
        };
        let (pool, store) = pool(provider, false);

        assert!(pool.fetch(EnqueueRequest::new(7, true, true)).await.is_none());

        let failures = store.failures("testchain-1").await;
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .all(|f| f.record.reason == FailureReason::BlockQueryError));
    }

    #[tokio::test]
    async fn test_block_fetch_failure_always_records_the_block() {
        let provider = FlakyProvider {
            missing_blocks: HashSet::from([7, 9]),
            ..FlakyProvider::default()
        };
        let (pool, store) = pool(provider, false);

        assert!(pool.fetch(EnqueueRequest::new(7, true, false)).await.is_none());
        assert!(pool.fetch(EnqueueRequest::new(9, false, true)).await.is_none());

        let mut recorded: Vec<(BlockHeight, FailureKind)> = store
            .failures("testchain-1")
            .await
            .iter()
            .map(|f| (f.record.height, f.record.kind))
            .collect();
        recorded.sort();
        assert_eq!(
            recorded,
            vec![
                (7, FailureKind::EventData),
                (7, FailureKind::TxData),
                (9, FailureKind::TxData),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_block_results_keep_the_height() {
        let provider = FlakyProvider {
            missing_results: HashSet::from([8]),
            ..FlakyProvider::default()
        };
        let (pool, store) = pool(provider, false);

        let data = pool.fetch(EnqueueRequest::new(8, true, true)).await.unwrap();
        assert!(data.block_event_requests_failed());
        assert!(!data.tx_requests_failed());
        assert!(matches!(data.txs, FetchOutcome::Fetched(TxSource::Search(_))));

        let failures = store.failures("testchain-1").await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].record.kind, FailureKind::EventData);
        assert_eq!(
            failures[0].record.reason,
            FailureReason::NodeMissingHistoryForBlock
        );
    }

    #[tokio::test]
    async fn test_tx_search_failure_falls_back_to_block_bytes() {
        let provider = FlakyProvider {
            search_down: true,
            ..FlakyProvider::default()
        };
        let (pool, store) = pool(provider, false);

        let data = pool.fetch(EnqueueRequest::new(9, false, true)).await.unwrap();
        assert!(matches!(data.txs, FetchOutcome::Fetched(TxSource::BlockBytes(_))));
        assert_eq!(data.block_results, FetchOutcome::NotRequested);
        assert!(store.failures("testchain-1").await.is_empty());
    }

    #[tokio::test]
    async fn test_no_tx_source_records_missing_txs() {
        let provider = FlakyProvider {
            search_down: true,
            missing_results: HashSet::from([10]),
            ..FlakyProvider::default()
        };
        let (pool, store) = pool(provider, false);

        let data = pool.fetch(EnqueueRequest::new(10, false, true)).await.unwrap();
        assert_eq!(
            data.txs,
            FetchOutcome::Failed(FailureReason::NodeMissingBlockTxs)
        );
        let failures = store.failures("testchain-1").await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].record.kind, FailureKind::TxData);
    }

    #[tokio::test]
    async fn test_skip_tx_search_uses_block_bytes() {
        let (pool, _store) = pool(FlakyProvider::default(), true);
        let data = pool.fetch(EnqueueRequest::new(3, true, true)).await.unwrap();
        assert!(matches!(data.txs, FetchOutcome::Fetched(TxSource::BlockBytes(_))));
    }

    #[tokio::test]
    async fn test_pool_drains_requests_and_closes_output() {
        let (pool, _store) = pool(FlakyProvider::default(), false);
        let (request_tx, request_rx) = mpsc::channel(16);
        let (data_tx, mut data_rx) = mpsc::channel(8);

        let handle = pool.spawn(request_rx, data_tx);
        for height in 1..=5 {
            request_tx
                .send(EnqueueRequest::new(height, false, true))
                .await
                .unwrap();
        }
        drop(request_tx);

        let mut heights = Vec::new();
        while let Some(data) = data_rx.recv().await {
            heights.push(data.block.height);
        }
        handle.await.unwrap();

        heights.sort_unstable();
        assert_eq!(heights, vec![1, 2, 3, 4, 5]);
    }
}
