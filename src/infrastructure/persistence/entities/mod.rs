pub mod block_events;
pub mod blocks;
pub mod denom_units;
pub mod denoms;
pub mod event_relevant_data;
pub mod failed_blocks;
pub mod fees;
pub mod message_relevant_data;
pub mod messages;
pub mod txes;
