use std::sync::Arc;
use std::time::Duration;

use cosmos_indexer::config::AppConfig;
use cosmos_indexer::domain::ports::IndexStore;
use cosmos_indexer::domain::services::RetryPolicy;
use cosmos_indexer::infrastructure::persistence::{DbPool, SeaOrmIndexStore};
use cosmos_indexer::infrastructure::rpc::{ChainClient, TendermintProvider};
use cosmos_indexer::utils::logging;

#[tokio::main]
async fn main() {
    logging::init_logger();
    logging::log_info("Cosmos indexer - environment test");

    let config = AppConfig::from_env();
    logging::log_info(&format!("CHAIN_ID: {}", config.chain.chain_id));
    logging::log_info(&format!("CHAIN_NAME: {}", config.chain.chain_name));
    logging::log_info(&format!("ACCOUNT_PREFIX: {}", config.chain.account_prefix));
    logging::log_info(&format!("RPC_URL: {}", config.chain.rpc_url));
    logging::log_info(&format!("REST_URL: {}", config.chain.rest_url));
    logging::log_info(&format!("START_BLOCK: {}", config.indexer.start_block));
    logging::log_info(&format!("END_BLOCK: {}", config.indexer.end_block));
    logging::log_info(&format!("RPC_WORKERS: {}", config.indexer.effective_rpc_workers()));

    if let Err(e) = config.validate() {
        logging::log_error(&format!("Configuration is invalid: {}", e));
        return;
    }

    match TendermintProvider::new(
        &config.chain.rpc_url,
        &config.chain.rest_url,
        Duration::from_secs(config.chain.rpc_timeout_secs),
    ) {
        Ok(provider) => {
            let client = ChainClient::new(Arc::new(provider), RetryPolicy::default());
            match client.status().await {
                Ok(status) => logging::log_info(&format!(
                    "Node is reachable: heights {} to {}, catching up: {}",
                    status.earliest_height, status.latest_height, status.catching_up
                )),
                Err(e) => logging::log_error(&format!("Node status request failed: {}", e)),
            }
        }
        Err(e) => logging::log_error(&format!("Failed to create RPC provider: {}", e)),
    }

    if config.database.dry_run {
        logging::log_info("DRY_RUN is set, skipping database check");
        return;
    }

    match DbPool::new(&config).await {
        Ok(db_pool) => {
            let store = SeaOrmIndexStore::new(&db_pool);
            match store.highest_indexed_height(&config.chain.chain_id).await {
                Ok(Some(height)) => {
                    logging::log_info(&format!("Highest indexed height: {}", height))
                }
                Ok(None) => logging::log_info("Nothing indexed yet for this chain"),
                Err(e) => logging::log_error(&format!("Index query failed: {}", e)),
            }
        }
        Err(e) => logging::log_error(&format!("Failed to connect to database: {}", e)),
    }
}
