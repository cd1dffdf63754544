use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use super::{send_request, throttle, BlockEnqueuer, EnqueueSettings};
use crate::domain::errors::EnqueueError;
use crate::domain::models::{BlockHeight, EnqueueRequest};
use crate::infrastructure::rpc::ChainClient;
use crate::utils::logging;

/// Enqueues the heights listed in a JSON file
#[derive(Debug)]
pub struct BlockFileEnqueuer {
    settings: EnqueueSettings,
    client: ChainClient,
    path: PathBuf,
}

impl BlockFileEnqueuer {
    pub fn new(settings: EnqueueSettings, client: ChainClient, path: impl AsRef<Path>) -> Self {
        Self {
            settings,
            client,
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Parse a JSON array of heights into a sorted, deduplicated list
pub fn parse_heights(content: &str) -> Result<Vec<BlockHeight>, EnqueueError> {
    let mut heights: Vec<u64> = serde_json::from_str(content)
        .map_err(|e| EnqueueError::InputFile(format!("invalid height list: {}", e)))?;
    heights.sort_unstable();
    heights.dedup();

    heights
        .into_iter()
        .map(|h| {
            BlockHeight::try_from(h)
                .map_err(|_| EnqueueError::InputFile(format!("height {} out of range", h)))
        })
        .collect()
}

#[async_trait]
impl BlockEnqueuer for BlockFileEnqueuer {
    fn name(&self) -> &'static str {
        "block-file"
    }

    async fn enqueue(&self, sender: &mpsc::Sender<EnqueueRequest>) -> Result<u64, EnqueueError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            EnqueueError::InputFile(format!("{}: {}", self.path.display(), e))
        })?;
        let heights = parse_heights(&content)?;

        let status = self.client.status_with_retry().await?;
        let (in_range, out_of_range): (Vec<_>, Vec<_>) = heights
            .into_iter()
            .partition(|h| (status.earliest_height..=status.latest_height).contains(h));

        for height in &out_of_range {
            logging::log_warning(&format!(
                "[{}] Height {} is outside the node range [{}, {}], skipping",
                self.settings.chain_id, height, status.earliest_height, status.latest_height
            ));
        }

        logging::log_info(&format!(
            "[{}] Enqueueing {} heights from {}",
            self.settings.chain_id,
            in_range.len(),
            self.path.display()
        ));

        let mut sent = 0u64;
        for height in in_range {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indexer::enqueue::tests::{collect, settings, status_client};

    #[test]
    fn test_parse_heights_sorts_and_dedups() {
        assert_eq!(parse_heights("[9, 3, 3, 7]").unwrap(), vec![3, 7, 9]);
        assert_eq!(parse_heights("[]").unwrap(), Vec::<BlockHeight>::new());
    }

    #[test]
    fn test_parse_heights_rejects_bad_input() {
        assert!(matches!(
            parse_heights("[1, -2]"),
            Err(EnqueueError::InputFile(_))
        ));
        assert!(matches!(
            parse_heights("{\"heights\": [1]}"),
            Err(EnqueueError::InputFile(_))
        ));
    }

    #[tokio::test]
    async fn test_filters_heights_outside_node_range() {
        let path = std::env::temp_dir().join(format!("heights-{}.json", std::process::id()));
        tokio::fs::write(&path, "[1, 12, 10, 15, 12, 30]").await.unwrap();

        let enqueuer = BlockFileEnqueuer::new(settings(), status_client(10, 20), &path);
        let heights: Vec<BlockHeight> =
            collect(&enqueuer).await.iter().map(|r| r.height).collect();
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(heights, vec![10, 12, 15]);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_input_error() {
        let enqueuer = BlockFileEnqueuer::new(
            settings(),
            status_client(1, 20),
            "/nonexistent/heights.json",
        );
        let (sender, _receiver) = mpsc::channel(4);
        assert!(matches!(
            enqueuer.enqueue(&sender).await,
            Err(EnqueueError::InputFile(_))
        ));
    }
}
