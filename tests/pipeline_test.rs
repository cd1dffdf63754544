use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use cosmos_indexer::application::indexer::Indexer;
use cosmos_indexer::config::{AppConfig, ChainConfig, DatabaseConfig, IndexerConfig};
use cosmos_indexer::domain::models::chain::TxSearchPage;
use cosmos_indexer::domain::models::{
    Attribute, Block, BlockHeight, BlockResults, FailureKind, FailureReason, NodeStatus, RawEvent,
};
use cosmos_indexer::domain::ports::IndexStore;
use cosmos_indexer::domain::services::event_registry::handlers::register_generic_handlers;
use cosmos_indexer::domain::services::tx_decoder::register_cosmos_sdk_message_types;
use cosmos_indexer::domain::services::{
    AddressResolver, EventHandlerRegistry, MessageDecoder, RetryPolicy,
};
use cosmos_indexer::infrastructure::persistence::MemoryIndexStore;
use cosmos_indexer::infrastructure::rpc::{ChainClient, ChainRpcProvider, RpcClientError};

const CHAIN_ID: &str = "testchain-1";

/// Node with empty blocks up to `latest`, some of which can be made unavailable
#[derive(Debug)]
struct MockNode {
    latest: BlockHeight,
    unavailable: Mutex<HashSet<BlockHeight>>,
}

impl MockNode {
    fn new(latest: BlockHeight, unavailable: &[BlockHeight]) -> Self {
        Self {
            latest,
            unavailable: Mutex::new(unavailable.iter().copied().collect()),
        }
    }

    fn heal(&self) {
        self.unavailable.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChainRpcProvider for MockNode {
    fn provider_name(&self) -> String {
        "mock".to_string()
    }

    async fn status(&self) -> Result<NodeStatus, RpcClientError> {
        Ok(NodeStatus {
            earliest_height: 1,
            latest_height: self.latest,
            catching_up: false,
        })
    }

    async fn block(&self, height: BlockHeight) -> Result<Block, RpcClientError> {
        if self.unavailable.lock().unwrap().contains(&height) {
            return Err(RpcClientError::RpcError {
                code: -32603,
                message: format!("height {} is not available", height),
            });
        }
        Ok(Block {
            height,
            hash: format!("{:064X}", height),
            time: Utc::now(),
            proposer_address: "PROPOSER".to_string(),
            txs: Vec::new(),
        })
    }

    async fn block_results(&self, height: BlockHeight) -> Result<BlockResults, RpcClientError> {
        Ok(BlockResults {
            height,
            begin_block_events: vec![RawEvent::new(
                "coin_received",
                vec![
                    Attribute::new("receiver", "cosmos1validatorpool"),
                    Attribute::new("amount", "1000uatom"),
                ],
            )],
            ..BlockResults::default()
        })
    }

    async fn txs_by_height_page(
        &self,
        _height: BlockHeight,
        _offset: u64,
        _limit: u64,
    ) -> Result<TxSearchPage, RpcClientError> {
        Ok(TxSearchPage::default())
    }
}

fn config(start: BlockHeight, end: BlockHeight) -> AppConfig {
    AppConfig {
        chain: ChainConfig {
            chain_id: CHAIN_ID.to_string(),
            chain_name: "testchain".to_string(),
            account_prefix: "cosmos".to_string(),
            rpc_url: "http://localhost:26657".to_string(),
            rest_url: "http://localhost:1317".to_string(),
            rpc_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: String::new(),
            dry_run: true,
        },
        indexer: IndexerConfig {
            start_block: start,
            end_block: end,
            reindex: false,
            reindex_message_type: String::new(),
            block_input_file: String::new(),
            throttling: 0.0,
            rpc_workers: 2,
            request_retry_attempts: 0,
            request_retry_max_wait: 1,
            block_event_indexing_enabled: false,
            transaction_indexing_enabled: true,
            reattempt_failed_blocks: false,
            exit_when_caught_up: true,
            epoch_identifier: None,
            wait_for_chain: false,
            wait_for_chain_delay: 1,
            skip_tx_search: false,
            block_event_attributes_base64: false,
            block_timer: 0,
            writer_batch_size: 4,
            writer_batch_timeout_ms: 50,
            writer_max_retries: 1,
            filter_file: String::new(),
        },
    }
}

fn indexer(config: AppConfig, node: Arc<MockNode>, store: Arc<MemoryIndexStore>) -> Indexer {
    let client = ChainClient::new(node, RetryPolicy::from_secs(0, 1));

    let mut registry = EventHandlerRegistry::new();
    register_generic_handlers(&mut registry).unwrap();

    let mut decoder = MessageDecoder::new(AddressResolver::new("cosmos").unwrap());
    register_cosmos_sdk_message_types(&mut decoder);

    let store: Arc<dyn IndexStore> = store;
    Indexer::new(config, client, store, decoder, registry)
}

#[tokio::test]
async fn test_failed_block_is_recorded_and_the_rest_persisted() {
    let node = Arc::new(MockNode::new(110, &[103]));
    let store = Arc::new(MemoryIndexStore::new());

    let summary = indexer(config(100, 105), node, store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.enqueued, 6);
    assert_eq!(summary.writer.tx_batches, 5);
    assert_eq!(
        store.tx_indexed_heights(CHAIN_ID).await,
        vec![100, 101, 102, 104, 105]
    );

    let failures = store.failures(CHAIN_ID).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record.height, 103);
    assert_eq!(failures[0].record.kind, FailureKind::TxData);
    assert_eq!(failures[0].record.reason, FailureReason::BlockQueryError);
    assert!(!failures[0].resolved);
}

#[tokio::test]
async fn test_reattempt_resolves_failure_without_reindexing() {
    let node = Arc::new(MockNode::new(110, &[103]));
    let store = Arc::new(MemoryIndexStore::new());

    indexer(config(100, 105), node.clone(), store.clone())
        .run()
        .await
        .unwrap();
    node.heal();

    let mut second_run = config(100, 105);
    second_run.indexer.reattempt_failed_blocks = true;
    let summary = indexer(second_run, node, store.clone())
        .run()
        .await
        .unwrap();

    // Only the failed height comes back, the tip scan finds the rest indexed
    assert_eq!(summary.enqueued, 1);
    assert_eq!(
        store.tx_indexed_heights(CHAIN_ID).await,
        vec![100, 101, 102, 103, 104, 105]
    );
    assert!(store.unresolved_failed_blocks(CHAIN_ID).await.unwrap().is_empty());
    assert_eq!(store.write_counts().await, (6, 0));
}

#[tokio::test]
async fn test_block_events_are_indexed_with_handler_data() {
    let node = Arc::new(MockNode::new(50, &[]));
    let store = Arc::new(MemoryIndexStore::new());

    let mut config = config(48, -1);
    config.indexer.block_event_indexing_enabled = true;
    config.indexer.transaction_indexing_enabled = false;

    let summary = indexer(config, node, store.clone()).run().await.unwrap();

    assert_eq!(summary.enqueued, 3);
    assert_eq!(summary.writer.event_batches, 3);
    assert_eq!(store.event_indexed_heights(CHAIN_ID).await, vec![48, 49, 50]);
    assert!(store.tx_indexed_heights(CHAIN_ID).await.is_empty());

    let batch = store.event_batch(CHAIN_ID, 49).await.unwrap();
    assert_eq!(batch.events.len(), 1);
    assert_eq!(batch.relevant_data.len(), 1);
    assert_eq!(batch.relevant_data[0].address, "cosmos1validatorpool");
    assert_eq!(batch.relevant_data[0].denomination, "uatom");
}
