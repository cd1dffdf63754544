//! Chain node provider implementations
//!
//! A provider performs single requests against a node. Retries, pagination
//! and event folding live in [`ChainClient`](super::ChainClient).

pub mod tendermint;

pub use tendermint::TendermintProvider;

use async_trait::async_trait;

use crate::domain::models::chain::TxSearchPage;
use crate::domain::models::{Block, BlockHeight, BlockResults, NodeStatus};
use crate::infrastructure::rpc::error::RpcClientError;

/// Trait for chain node providers
#[async_trait]
pub trait ChainRpcProvider: Send + Sync + std::fmt::Debug {
    /// Get the provider name for identification
    fn provider_name(&self) -> String;

    /// Current sync status of the node
    async fn status(&self) -> Result<NodeStatus, RpcClientError>;

    /// Block header and raw transactions at a height
    async fn block(&self, height: BlockHeight) -> Result<Block, RpcClientError>;

    /// Execution results and lifecycle events at a height
    async fn block_results(&self, height: BlockHeight) -> Result<BlockResults, RpcClientError>;

    /// One page of the REST tx search for a height
    async fn txs_by_height_page(
        &self,
        height: BlockHeight,
        offset: u64,
        limit: u64,
    ) -> Result<TxSearchPage, RpcClientError>;
}
