use sea_orm::DatabaseConnection;

use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::repositories::{
    BlockRepository, FailedBlockRepository, Repositories, TxRepository,
};

/// Factory for creating repositories
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create all repositories
    pub fn create_repositories(db_pool: &DbPool) -> Repositories {
        let conn = db_pool.get_connection().clone();

        Repositories::new(
            Self::create_block_repository(conn.clone()),
            Self::create_failed_block_repository(conn.clone()),
            Self::create_tx_repository(conn),
        )
    }

    /// Create a block repository
    pub fn create_block_repository(conn: DatabaseConnection) -> BlockRepository {
        BlockRepository::new(conn)
    }

    /// Create a failed block repository
    pub fn create_failed_block_repository(conn: DatabaseConnection) -> FailedBlockRepository {
        FailedBlockRepository::new(conn)
    }

    /// Create a tx repository
    pub fn create_tx_repository(conn: DatabaseConnection) -> TxRepository {
        TxRepository::new(conn)
    }
}
