pub mod chain;
pub mod coin;
pub mod denom;
pub mod enqueue;
pub mod event;
pub mod failed_block;
pub mod fetch;
pub mod persist;
pub mod transaction;

pub use chain::{Block, BlockHeight, BlockResults, NodeStatus, TxExecResult, TxSearchResponse};
pub use coin::{parse_coins, Coin};
pub use denom::{AssetList, DenomMetadata, DenomUnitMetadata, UNKNOWN_DENOM};
pub use enqueue::{EnqueueRequest, IndexedBlockStatus};
pub use event::{
    Attribute, BlockEventBatch, BlockEventRecord, BlockLifecyclePosition, EventRelevantInformation,
    EventSource, RawEvent,
};
pub use failed_block::{FailedBlockRecord, FailureKind, FailureReason};
pub use fetch::{FetchOutcome, IndexerBlockEventData, TxSource};
pub use persist::PersistRequest;
pub use transaction::{
    AuthInfoSummary, BlockTxBatch, DecodedMessageRecord, Fee, FeeInfo, MessageEvent, MessageLog,
    MessagePayload, MessageRelevantInformation, NormalizedTx, PublicKeyBytes, SignerInfoSummary,
};
