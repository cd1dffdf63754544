use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{send_request, throttle, BlockEnqueuer, EnqueueSettings};
use crate::domain::errors::EnqueueError;
use crate::domain::models::EnqueueRequest;
use crate::domain::ports::IndexStore;
use crate::utils::logging;

/// Re-enqueues the stored heights whose transactions carry a given message type
#[derive(Debug)]
pub struct MessageTypeEnqueuer {
    settings: EnqueueSettings,
    store: Arc<dyn IndexStore>,
    type_url: String,
}

impl MessageTypeEnqueuer {
    pub fn new(settings: EnqueueSettings, store: Arc<dyn IndexStore>, type_url: &str) -> Self {
        Self {
            settings,
            store,
            type_url: type_url.to_string(),
        }
    }
}

#[async_trait]
impl BlockEnqueuer for MessageTypeEnqueuer {
    fn name(&self) -> &'static str {
        "message-type"
    }

    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError> {
        let chain_id = &self.settings.chain_id;

        let end = if self.settings.end_block == -1 {
            match self.store.highest_indexed_height(chain_id).await? {
                Some(height) => height,
                None => {
                    logging::log_info(&format!(
                        "[{}] No indexed heights, nothing to reindex for {}",
                        chain_id, self.type_url
                    ));
                    return Ok(0);
                }
            }
        } else {
            self.settings.end_block
        };

        let heights = self
            .store
            .heights_with_message_type(chain_id, &self.type_url, self.settings.start_block, end)
            .await?;

        logging::log_info(&format!(
            "[{}] Reindexing {} heights containing {} in [{}, {}]",
            chain_id,
            heights.len(),
            self.type_url,
            self.settings.start_block,
            end
        ));

        let mut sent = 0u64;
        for height in heights {
            if self.settings.past_end(height) {
                break;
            }
            send_request(sender, self.settings.full_request(height)).await?;
            sent += 1;
            throttle(self.settings.throttle).await;
        }
        Ok(sent)
    }
}
