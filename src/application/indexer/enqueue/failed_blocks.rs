use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::{send_request, throttle, BlockEnqueuer, EnqueueSettings};
use crate::domain::errors::EnqueueError;
use crate::domain::models::{BlockHeight, EnqueueRequest, FailedBlockRecord, FailureKind};
use crate::domain::ports::IndexStore;
use crate::utils::logging;

/// Re-enqueues unresolved failed blocks. Runs once before the primary strategy.
#[derive(Debug)]
pub struct FailedBlockEnqueuer {
    settings: EnqueueSettings,
    store: Arc<dyn IndexStore>,
    sent: Mutex<Vec<EnqueueRequest>>,
}

impl FailedBlockEnqueuer {
    pub fn new(settings: EnqueueSettings, store: Arc<dyn IndexStore>) -> Self {
        Self {
            settings,
            store,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Requests pushed by the last `enqueue` call
    pub async fn sent_requests(&self) -> Vec<EnqueueRequest> {
        self.sent.lock().await.clone()
    }

    /// Merge records per height, keeping only kinds that are still configured
    fn merge(&self, records: &[FailedBlockRecord]) -> Vec<EnqueueRequest> {
        let mut merged: BTreeMap<BlockHeight, EnqueueRequest> = BTreeMap::new();
        for record in records {
            let request = merged
                .entry(record.height)
                .or_insert_with(|| EnqueueRequest::new(record.height, false, false));
            match record.kind {
                FailureKind::EventData => {
                    request.index_block_events |= self.settings.index_block_events
                }
                FailureKind::TxData => {
                    request.index_transactions |= self.settings.index_transactions
                }
            }
        }
        merged.into_values().filter(|r| !r.is_empty()).collect()
    }
}

#[async_trait]
impl BlockEnqueuer for FailedBlockEnqueuer {
    fn name(&self) -> &'static str {
        "failed-blocks"
    }

    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError> {
        let records = self
            .store
            .unresolved_failed_blocks(&self.settings.chain_id)
            .await?;
        let requests = self.merge(&records);

        logging::log_info(&format!(
            "[{}] Reattempting {} failed heights ({} records)",
            self.settings.chain_id,
            requests.len(),
            records.len()
        ));

        let mut sent = self.sent.lock().await;
        sent.clear();
        for request in requests {
            if self.settings.past_end(request.height) {
                break;
            }
            send_request(sender, request).await?;
            sent.push(request);
            throttle(self.settings.throttle).await;
        }
        Ok(sent.len() as u64)
    }
}
