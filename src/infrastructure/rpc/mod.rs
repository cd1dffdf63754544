pub mod assetlist;
pub mod client;
mod error;
pub mod providers;

pub use assetlist::{asset_list_url, AssetListClient, SUPPORTED_ASSET_LISTS};
pub use client::ChainClient;
pub use error::RpcClientError;
pub use providers::{ChainRpcProvider, TendermintProvider};
