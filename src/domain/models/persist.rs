use super::event::BlockEventBatch;
use super::transaction::BlockTxBatch;

/// Unit of work handed to the persistence writer
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    Transactions(BlockTxBatch),
    BlockEvents(BlockEventBatch),
}

impl PersistRequest {
    pub fn height(&self) -> i64 {
        match self {
            PersistRequest::Transactions(batch) => batch.height,
            PersistRequest::BlockEvents(batch) => batch.height,
        }
    }
}
