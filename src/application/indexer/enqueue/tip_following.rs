use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

use super::{send_request, throttle, wait_for_refill, BlockEnqueuer, EnqueueSettings};
use crate::domain::errors::EnqueueError;
use crate::domain::models::{BlockHeight, EnqueueRequest, IndexedBlockStatus};
use crate::domain::ports::IndexStore;
use crate::infrastructure::rpc::ChainClient;
use crate::utils::logging;

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Walks from the start height to the chain tip, then follows it.
///
/// Every height from the start is checked against the index so a kind that
/// was enabled later still gets backfilled.
#[derive(Debug)]
pub struct TipFollowingEnqueuer {
    settings: EnqueueSettings,
    client: ChainClient,
    store: Arc<dyn IndexStore>,
    /// Pushed earlier in this run by another strategy
    in_flight: HashMap<BlockHeight, EnqueueRequest>,
}

impl TipFollowingEnqueuer {
    pub fn new(settings: EnqueueSettings, client: ChainClient, store: Arc<dyn IndexStore>) -> Self {
        Self {
            settings,
            client,
            store,
            in_flight: HashMap::new(),
        }
    }

    /// Do not push again what these requests already cover
    pub fn with_in_flight(mut self, requests: impl IntoIterator<Item = EnqueueRequest>) -> Self {
        self.in_flight = requests.into_iter().map(|r| (r.height, r)).collect();
        self
    }

    /// What is still missing for `height`, `None` when nothing is
    fn request_for(
        &self,
        height: BlockHeight,
        status: Option<&IndexedBlockStatus>,
    ) -> Option<EnqueueRequest> {
        let mut request = if self.settings.reindex {
            self.settings.full_request(height)
        } else {
            let tx_indexed = status.map_or(false, |s| s.tx_indexed);
            let events_indexed = status.map_or(false, |s| s.block_events_indexed);
            EnqueueRequest::new(
                height,
                self.settings.index_block_events && !events_indexed,
                self.settings.index_transactions && !tx_indexed,
            )
        };

        if let Some(pending) = self.in_flight.get(&height) {
            request.index_block_events &= !pending.index_block_events;
            request.index_transactions &= !pending.index_transactions;
        }
        (!request.is_empty()).then_some(request)
    }
}

#[async_trait]
impl BlockEnqueuer for TipFollowingEnqueuer {
    fn name(&self) -> &'static str {
        "tip-following"
    }

    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError> {
        let chain_id = &self.settings.chain_id;
        let window = sender.max_capacity() as BlockHeight;
        let poll_interval = self.settings.throttle.max(MIN_POLL_INTERVAL);
        let mut current = self.settings.start_block;
        let mut sent = 0u64;

        logging::log_info(&format!(
            "[{}] Scanning from height {} towards the chain tip",
            chain_id, current
        ));

        loop {
            if self.settings.past_end(current) {
                logging::log_info(&format!(
                    "[{}] Reached end height {}",
                    chain_id, self.settings.end_block
                ));
                break;
            }

            let latest = self.client.latest_height_with_retry().await?;
            if current > latest {
                if self.settings.exit_when_caught_up {
                    logging::log_info(&format!(
                        "[{}] Caught up at height {}",
                        chain_id, latest
                    ));
                    break;
                }
                sleep(poll_interval).await;
                continue;
            }

            let mut window_end = latest.min(current + window - 1);
            if self.settings.end_block != -1 {
                window_end = window_end.min(self.settings.end_block);
            }

            let statuses: HashMap<BlockHeight, IndexedBlockStatus> = self
                .store
                .indexed_block_status(chain_id, current, window_end)
                .await?
                .into_iter()
                .map(|s| (s.height, s))
                .collect();

            while current <= window_end {
                if let Some(request) = self.request_for(current, statuses.get(&current)) {
                    send_request(sender, request).await?;
                    sent += 1;
                }
                current += 1;
            }

            wait_for_refill(sender).await?;
            throttle(self.settings.throttle).await;
        }

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indexer::enqueue::tests::{collect, settings, status_client};
    use crate::infrastructure::persistence::MemoryIndexStore;

    fn heights(requests: &[EnqueueRequest]) -> Vec<BlockHeight> {
        requests.iter().map(|r| r.height).collect()
    }

    #[tokio::test]
    async fn test_enqueues_to_tip_and_exits() {
        let store = Arc::new(MemoryIndexStore::new());
        let enqueuer = TipFollowingEnqueuer::new(settings(), status_client(1, 5), store);

        let requests = collect(&enqueuer).await;
        assert_eq!(heights(&requests), vec![1, 2, 3, 4, 5]);
        assert!(requests.iter().all(|r| r.index_transactions && !r.index_block_events));
    }

    #[tokio::test]
    async fn test_resumes_after_indexed_heights() {
        let store = Arc::new(MemoryIndexStore::new());
        for height in 1..=3 {
            store.mark_indexed("testchain-1", height, true, false).await;
        }
        let enqueuer = TipFollowingEnqueuer::new(settings(), status_client(1, 6), store);

        assert_eq!(heights(&collect(&enqueuer).await), vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_gaps_below_the_highest_height_are_filled() {
        let store = Arc::new(MemoryIndexStore::new());
        store.mark_indexed("testchain-1", 3, true, false).await;
        let enqueuer = TipFollowingEnqueuer::new(settings(), status_client(1, 4), store);

        assert_eq!(heights(&collect(&enqueuer).await), vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_enabling_events_backfills_tx_only_heights() {
        let store = Arc::new(MemoryIndexStore::new());
        for height in 1..=3 {
            store.mark_indexed("testchain-1", height, true, false).await;
        }
        let mut settings = settings();
        settings.index_block_events = true;
        let enqueuer = TipFollowingEnqueuer::new(settings, status_client(1, 5), store);

        assert_eq!(
            collect(&enqueuer).await,
            vec![
                EnqueueRequest::new(1, true, false),
                EnqueueRequest::new(2, true, false),
                EnqueueRequest::new(3, true, false),
                EnqueueRequest::new(4, true, true),
                EnqueueRequest::new(5, true, true),
            ]
        );
    }

    #[tokio::test]
    async fn test_indexed_heights_are_not_enqueued_twice() {
        let store = Arc::new(MemoryIndexStore::new());
        let enqueuer = TipFollowingEnqueuer::new(settings(), status_client(1, 4), store.clone());

        let first = heights(&collect(&enqueuer).await);
        assert_eq!(first, vec![1, 2, 3, 4]);
        for height in first {
            store.mark_indexed("testchain-1", height, true, false).await;
        }

        assert!(collect(&enqueuer).await.is_empty());
    }

    #[test]
    fn test_flags_only_request_missing_data() {
        let mut settings = settings();
        settings.index_block_events = true;
        let enqueuer = TipFollowingEnqueuer::new(
            settings,
            status_client(1, 3),
            Arc::new(MemoryIndexStore::new()),
        );

        let txs_only = IndexedBlockStatus {
            height: 1,
            tx_indexed: true,
            block_events_indexed: false,
        };
        assert_eq!(
            enqueuer.request_for(1, Some(&txs_only)),
            Some(EnqueueRequest::new(1, true, false))
        );

        let complete = IndexedBlockStatus {
            height: 3,
            tx_indexed: true,
            block_events_indexed: true,
        };
        assert_eq!(enqueuer.request_for(3, Some(&complete)), None);
        assert_eq!(
            enqueuer.request_for(2, None),
            Some(EnqueueRequest::new(2, true, true))
        );
    }

    #[tokio::test]
    async fn test_in_flight_requests_are_not_repeated() {
        let store = Arc::new(MemoryIndexStore::new());
        let mut settings = settings();
        settings.index_block_events = true;
        let enqueuer = TipFollowingEnqueuer::new(settings, status_client(1, 3), store)
            .with_in_flight([EnqueueRequest::new(2, false, true), EnqueueRequest::new(3, true, true)]);

        assert_eq!(
            collect(&enqueuer).await,
            vec![
                EnqueueRequest::new(1, true, true),
                EnqueueRequest::new(2, true, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_reindex_ignores_index_state() {
        let store = Arc::new(MemoryIndexStore::new());
        store.mark_indexed("testchain-1", 4, true, false).await;
        let mut settings = settings();
        settings.reindex = true;
        settings.start_block = 3;
        let enqueuer = TipFollowingEnqueuer::new(settings, status_client(1, 5), store);

        assert_eq!(heights(&collect(&enqueuer).await), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_end_block_ceiling() {
        let store = Arc::new(MemoryIndexStore::new());
        let mut settings = settings();
        settings.end_block = 3;
        settings.exit_when_caught_up = false;
        let enqueuer = TipFollowingEnqueuer::new(settings, status_client(1, 100), store);

        assert_eq!(heights(&collect(&enqueuer).await), vec![1, 2, 3]);
    }
}
