use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::AppConfig;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging;

/// Connections kept beside the RPC workers: the writer, the enqueuer and the
/// failed-block bookkeeping of the processor
const PIPELINE_CONNECTIONS: u32 = 4;

/// Pool size for a configuration: one connection per RPC worker, since each
/// may record a failed block, plus the rest of the pipeline
pub fn pool_size(config: &AppConfig) -> u32 {
    config.indexer.effective_rpc_workers() as u32 + PIPELINE_CONNECTIONS
}

/// Index database pool shared by the store and the repositories
pub struct DbPool {
    connection: DatabaseConnection,
}

impl DbPool {
    /// Opens the pool for the configured chain
    pub async fn new(config: &AppConfig) -> Result<Self, DbError> {
        let chain_id = &config.chain.chain_id;
        let max_connections = pool_size(config);
        logging::log_database_connection_details(&config.database.url, Some(max_connections));

        let mut options = ConnectOptions::new(config.database.url.clone());
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        let connection = Database::connect(options)
            .await
            .map_err(|e| DbError::Connection {
                chain_id: chain_id.clone(),
                message: format!("{}: {}", logging::redact_database_url(&config.database.url), e),
            })?;

        logging::log_info(&format!("[{}] Index database ready", chain_id));
        Ok(DbPool { connection })
    }

    /// Returns the database connection
    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_pool_grows_with_rpc_workers() {
        let mut config = test_config();
        config.indexer.rpc_workers = 4;
        assert_eq!(pool_size(&config), 8);

        config.indexer.rpc_workers = 12;
        assert_eq!(pool_size(&config), 16);
    }

    #[test]
    fn test_pool_uses_default_worker_count() {
        let mut config = test_config();
        config.indexer.rpc_workers = 0;
        assert_eq!(
            pool_size(&config),
            config.indexer.effective_rpc_workers() as u32 + PIPELINE_CONNECTIONS
        );
    }
}
