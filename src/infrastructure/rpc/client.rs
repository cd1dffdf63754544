use std::sync::Arc;

use crate::domain::models::{Block, BlockHeight, BlockResults, NodeStatus, TxSearchResponse};
use crate::domain::services::block_events::fold_finalize_block_events;
use crate::domain::services::RetryPolicy;
use crate::infrastructure::rpc::error::RpcClientError;
use crate::infrastructure::rpc::providers::ChainRpcProvider;

/// Page size for the tx search endpoint
pub const TX_SEARCH_PAGE_LIMIT: u64 = 100;

/// Client for a chain node, adding retries and pagination on top of a provider
#[derive(Debug, Clone)]
pub struct ChainClient {
    provider: Arc<dyn ChainRpcProvider>,
    retry: RetryPolicy,
}

impl ChainClient {
    pub fn new(provider: Arc<dyn ChainRpcProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    pub fn provider_name(&self) -> String {
        self.provider.provider_name()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Current node status
    pub async fn status(&self) -> Result<NodeStatus, RpcClientError> {
        self.provider.status().await
    }

    pub async fn status_with_retry(&self) -> Result<NodeStatus, RpcClientError> {
        self.retry
            .with_retry("status", || self.provider.status())
            .await
    }

    /// Latest block height known to the node
    pub async fn latest_height_with_retry(&self) -> Result<BlockHeight, RpcClientError> {
        Ok(self.status_with_retry().await?.latest_height)
    }

    /// Block at a height, single attempt
    pub async fn block(&self, height: BlockHeight) -> Result<Block, RpcClientError> {
        self.provider.block(height).await
    }

    /// Block results with finalize-block events folded into begin/end lists
    pub async fn block_results_with_retry(
        &self,
        height: BlockHeight,
    ) -> Result<BlockResults, RpcClientError> {
        let operation = format!("block_results({})", height);
        self.retry
            .with_retry(&operation, || async {
                let mut results = self.provider.block_results(height).await?;
                fold_finalize_block_events(&mut results).map_err(RpcClientError::ParseError)?;
                Ok(results)
            })
            .await
    }

    /// All tx search pages for a height
    pub async fn txs_by_height_with_retry(
        &self,
        height: BlockHeight,
    ) -> Result<TxSearchResponse, RpcClientError> {
        let operation = format!("txs_by_height({})", height);
        self.retry
            .with_retry(&operation, || self.txs_by_height(height))
            .await
    }

    /// Accumulate pages while the reported total exceeds what was collected
    pub async fn txs_by_height(&self, height: BlockHeight) -> Result<TxSearchResponse, RpcClientError> {
        let first = self
            .provider
            .txs_by_height_page(height, 0, TX_SEARCH_PAGE_LIMIT)
            .await?;
        let total = first.reported_total();
        let mut response = TxSearchResponse {
            txs: first.txs,
            tx_responses: first.tx_responses,
            total,
        };

        while total > response.txs.len() as u64 {
            let offset = response.txs.len() as u64;
            let page = self
                .provider
                .txs_by_height_page(height, offset, TX_SEARCH_PAGE_LIMIT)
                .await?;
            if page.txs.is_empty() {
                return Err(RpcClientError::ParseError(format!(
                    "tx search for height {} reported {} txs but returned {}",
                    height, total, offset
                )));
            }
            response.txs.extend(page.txs);
            response.tx_responses.extend(page.tx_responses);
        }

        if response.txs.len() != response.tx_responses.len() {
            return Err(RpcClientError::ParseError(format!(
                "tx search for height {} returned {} txs and {} responses",
                height,
                response.txs.len(),
                response.tx_responses.len()
            )));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::chain::{SearchTx, SearchTxResponse, TxSearchPage};
    use crate::domain::models::{Attribute, RawEvent};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct PagedProvider {
        total: usize,
        offsets: Mutex<Vec<u64>>,
        finalize_events: Vec<RawEvent>,
    }

    #[async_trait]
    impl ChainRpcProvider for PagedProvider {
        fn provider_name(&self) -> String {
            "paged".to_string()
        }

        async fn status(&self) -> Result<NodeStatus, RpcClientError> {
            Ok(NodeStatus {
                earliest_height: 1,
                latest_height: 10,
                catching_up: false,
            })
        }

        async fn block(&self, _height: BlockHeight) -> Result<Block, RpcClientError> {
            Err(RpcClientError::NetworkError("unused".to_string()))
        }

        async fn block_results(&self, height: BlockHeight) -> Result<BlockResults, RpcClientError> {
            Ok(BlockResults {
                height,
                finalize_block_events: self.finalize_events.clone(),
                ..BlockResults::default()
            })
        }

        async fn txs_by_height_page(
            &self,
            height: BlockHeight,
            offset: u64,
            limit: u64,
        ) -> Result<TxSearchPage, RpcClientError> {
            self.offsets.lock().unwrap().push(offset);
            let count = (self.total as u64).saturating_sub(offset).min(limit) as usize;
            Ok(TxSearchPage {
                txs: vec![SearchTx::default(); count],
                tx_responses: vec![
                    SearchTxResponse {
                        height,
                        ..SearchTxResponse::default()
                    };
                    count
                ],
                pagination: None,
                total: self.total as i64,
            })
        }
    }

    fn client(provider: PagedProvider) -> (ChainClient, Arc<PagedProvider>) {
        let provider = Arc::new(provider);
        let client = ChainClient::new(provider.clone(), RetryPolicy::new(1, Duration::from_secs(2)));
        (client, provider)
    }

    #[tokio::test]
    async fn test_tx_search_accumulates_pages() {
        let (client, provider) = client(PagedProvider {
            total: 250,
            ..PagedProvider::default()
        });

        let response = client.txs_by_height(7).await.unwrap();
        assert_eq!(response.txs.len(), 250);
        assert_eq!(response.total, 250);
        assert_eq!(*provider.offsets.lock().unwrap(), vec![0, 100, 200]);
    }

    #[tokio::test]
    async fn test_tx_search_empty_block() {
        let (client, provider) = client(PagedProvider::default());
        let response = client.txs_by_height(7).await.unwrap();
        assert!(response.txs.is_empty());
        assert_eq!(provider.offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_block_results_fold_finalize_events() {
        let (client, _) = client(PagedProvider {
            finalize_events: vec![
                RawEvent::new("mint", vec![Attribute::new("mode", "BeginBlock")]),
                RawEvent::new("unbond", vec![Attribute::new("mode", "EndBlock")]),
            ],
            ..PagedProvider::default()
        });

        let results = client.block_results_with_retry(3).await.unwrap();
        assert_eq!(results.begin_block_events[0].event_type, "mint");
        assert_eq!(results.end_block_events[0].event_type, "unbond");
        assert!(results.finalize_block_events.is_empty());
    }

    #[tokio::test]
    async fn test_block_results_bad_mode_is_an_error() {
        let (client, _) = client(PagedProvider {
            finalize_events: vec![RawEvent::new("mint", vec![])],
            ..PagedProvider::default()
        });

        assert!(matches!(
            client.block_results_with_retry(3).await,
            Err(RpcClientError::ParseError(_))
        ));
    }
}
