pub mod block_event_repository;
pub mod block_repository;
pub mod denom_repository;
pub mod failed_block_repository;
pub mod tx_repository;

pub use block_event_repository::BlockEventRepository;
pub use block_repository::{BlockRepository, BlockRow};
pub use denom_repository::DenomRepository;
pub use failed_block_repository::FailedBlockRepository;
pub use tx_repository::TxRepository;

/// Collection of all repositories
#[derive(Debug, Clone)]
pub struct Repositories {
    /// Repository for block index state
    pub block: BlockRepository,
    /// Repository for failed block records
    pub failed_block: FailedBlockRepository,
    /// Repository for transactions
    pub tx: TxRepository,
}

impl Repositories {
    /// Create a new Repositories instance
    pub fn new(block: BlockRepository, failed_block: FailedBlockRepository, tx: TxRepository) -> Self {
        Self {
            block,
            failed_block,
            tx,
        }
    }
}
