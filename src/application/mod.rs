pub mod denoms;
pub mod indexer;
