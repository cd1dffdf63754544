//! Block enqueue strategies.
//!
//! An enqueuer decides which heights enter the pipeline and pushes them on
//! the bounded request channel. Sends block while the channel is full, which
//! is what throttles the source of heights.

pub mod block_file;
pub mod failed_blocks;
pub mod message_type;
pub mod tip_following;

pub use block_file::BlockFileEnqueuer;
pub use failed_blocks::FailedBlockEnqueuer;
pub use message_type::MessageTypeEnqueuer;
pub use tip_following::TipFollowingEnqueuer;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::domain::errors::EnqueueError;
use crate::domain::models::{BlockHeight, EnqueueRequest};
use crate::domain::ports::IndexStore;
use crate::infrastructure::rpc::ChainClient;
use crate::utils::logging;

/// Capacity of the request channel between the enqueuer and the workers
pub const ENQUEUE_CHANNEL_CAPACITY: usize = 10_000;

const REFILL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Produces the heights to index
#[async_trait]
pub trait BlockEnqueuer: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Push requests until the strategy is exhausted. Returns the number sent.
    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError>;
}

/// Settings every strategy reads
#[derive(Debug, Clone)]
pub struct EnqueueSettings {
    pub chain_id: String,
    pub index_block_events: bool,
    pub index_transactions: bool,
    pub reindex: bool,
    pub start_block: BlockHeight,
    /// -1 for unbounded
    pub end_block: BlockHeight,
    pub throttle: Duration,
    pub exit_when_caught_up: bool,
}

impl EnqueueSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chain_id: config.chain.chain_id.clone(),
            index_block_events: config.indexer.block_event_indexing_enabled,
            index_transactions: config.indexer.transaction_indexing_enabled,
            reindex: config.indexer.reindex,
            start_block: config.indexer.effective_start_block(),
            end_block: config.indexer.end_block,
            throttle: config.indexer.throttle(),
            exit_when_caught_up: config.indexer.exit_when_caught_up,
        }
    }

    /// True once `height` is past the configured ceiling
    pub fn past_end(&self, height: BlockHeight) -> bool {
        self.end_block != -1 && height > self.end_block
    }

    /// Request carrying the configured indexing flags
    pub fn full_request(&self, height: BlockHeight) -> EnqueueRequest {
        EnqueueRequest::new(height, self.index_block_events, self.index_transactions)
    }
}

/// Refill once the queue holds at most a quarter of its capacity
pub fn refill_threshold(capacity: usize) -> usize {
    capacity / 4
}

/// Number of requests waiting in the channel
pub fn queue_len<T>(sender: &mpsc::Sender<T>) -> usize {
    sender.max_capacity() - sender.capacity()
}

/// Wait until the channel drains down to the refill threshold
pub async fn wait_for_refill<T>(sender: &mpsc::Sender<T>) -> Result<(), EnqueueError> {
    let threshold = refill_threshold(sender.max_capacity());
    while queue_len(sender) > threshold {
        if sender.is_closed() {
            return Err(EnqueueError::ChannelClosed);
        }
        sleep(REFILL_POLL_INTERVAL).await;
    }
    Ok(())
}

/// Blocking send of one request
pub async fn send_request(
    sender: &mpsc::Sender<EnqueueRequest>,
    request: EnqueueRequest,
) -> Result<(), EnqueueError> {
    logging::log_debug(&format!(
        "Enqueue height {} (events: {}, txs: {})",
        request.height, request.index_block_events, request.index_transactions
    ));
    sender
        .send(request)
        .await
        .map_err(|_| EnqueueError::ChannelClosed)
}

pub async fn throttle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

/// Poll node status until it reports it is no longer catching up
pub async fn wait_for_chain(client: &ChainClient, delay: Duration) -> Result<(), EnqueueError> {
    loop {
        let status = client.status_with_retry().await?;
        if !status.catching_up {
            logging::log_info(&format!(
                "Chain node is synced at height {}",
                status.latest_height
            ));
            return Ok(());
        }
        logging::log_info(&format!(
            "Chain node is catching up (latest height {}), waiting {:?}",
            status.latest_height, delay
        ));
        sleep(delay).await;
    }
}

/// Pick the primary strategy. Message-type wins over file, file over tip-following.
///
/// `in_flight` holds requests already pushed in this run, tip-following
/// leaves them out.
pub fn select_strategy(
    config: &AppConfig,
    client: ChainClient,
    store: Arc<dyn IndexStore>,
    in_flight: Vec<EnqueueRequest>,
) -> Box<dyn BlockEnqueuer> {
    let settings = EnqueueSettings::from_config(config);

    if !config.indexer.reindex_message_type.is_empty() {
        Box::new(MessageTypeEnqueuer::new(
            settings,
            store,
            &config.indexer.reindex_message_type,
        ))
    } else if !config.indexer.block_input_file.is_empty() {
        Box::new(BlockFileEnqueuer::new(
            settings,
            client,
            &config.indexer.block_input_file,
        ))
    } else {
        Box::new(TipFollowingEnqueuer::new(settings, client, store).with_in_flight(in_flight))
    }
}
