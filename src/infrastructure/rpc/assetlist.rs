//! Chain registry asset list downloads

use std::time::Duration;

use reqwest::Client;

use crate::domain::models::AssetList;
use crate::domain::services::RetryPolicy;
use crate::infrastructure::rpc::error::RpcClientError;

const ASSET_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Chains with a vetted asset list, keyed by chain id
pub const SUPPORTED_ASSET_LISTS: &[(&str, &str)] = &[
    (
        "osmosis-1",
        "https://raw.githubusercontent.com/osmosis-labs/assetlists/main/osmosis-1/osmosis-1.assetlist.json",
    ),
    (
        "juno-1",
        "https://raw.githubusercontent.com/cosmos/chain-registry/master/juno/assetlist.json",
    ),
];

/// Asset list URL for a chain id
pub fn asset_list_url(chain_id: &str) -> Option<&'static str> {
    SUPPORTED_ASSET_LISTS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, url)| *url)
}

#[derive(Debug, Clone)]
pub struct AssetListClient {
    client: Client,
    retry: RetryPolicy,
}

impl AssetListClient {
    pub fn new(retry: RetryPolicy) -> Result<Self, RpcClientError> {
        let client = Client::builder()
            .timeout(ASSET_LIST_TIMEOUT)
            .build()
            .map_err(|e| RpcClientError::ConfigError(e.to_string()))?;
        Ok(Self { client, retry })
    }

    async fn get(&self, url: &str) -> Result<AssetList, RpcClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcClientError::NetworkError(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Download an asset list, retrying with the configured backoff
    pub async fn fetch(&self, url: &str) -> Result<AssetList, RpcClientError> {
        self.retry
            .with_retry(&format!("asset list {}", url), || self.get(url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_list_url_for_supported_chains() {
        assert!(asset_list_url("osmosis-1")
            .unwrap()
            .ends_with("osmosis-1.assetlist.json"));
        assert!(asset_list_url("juno-1").unwrap().contains("chain-registry"));
        assert_eq!(asset_list_url("cosmoshub-4"), None);
    }

    #[tokio::test]
    async fn test_unreachable_asset_list_is_a_network_error() {
        let client = AssetListClient::new(RetryPolicy::from_secs(1, 2)).unwrap();
        let result = client.fetch("http://127.0.0.1:9/assetlist.json").await;
        assert!(matches!(result, Err(RpcClientError::NetworkError(_))));
    }
}
