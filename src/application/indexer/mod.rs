//! Block indexing pipeline
//!
//! Heights come from an enqueue strategy, get fetched by the RPC worker pool,
//! are decoded by the block processor and written by the persistence writer.

pub mod block_processor;
pub mod enqueue;
pub mod pipeline;
pub mod rpc_worker;

pub use block_processor::{BlockProcessor, BlockProcessorSettings};
pub use enqueue::{BlockEnqueuer, EnqueueSettings};
pub use pipeline::{Indexer, PipelineSummary};
pub use rpc_worker::{RpcWorkerPool, RpcWorkerSettings};
