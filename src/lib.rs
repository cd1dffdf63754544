//! Cosmos block ingestion pipeline.
//!
//! Heights flow from a [`BlockEnqueuer`](application::indexer::enqueue::BlockEnqueuer)
//! through a pool of RPC workers, get decoded and normalized by the block
//! processor and end up in the index store through the persistence writer.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod utils;
