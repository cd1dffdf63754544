//! Database backed [`IndexStore`]

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::models::{
    BlockEventBatch, BlockHeight, BlockTxBatch, FailedBlockRecord, FailureKind, IndexedBlockStatus,
};
use crate::domain::ports::IndexStore;
use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::factory::RepositoryFactory;
use crate::infrastructure::persistence::repositories::{
    BlockEventRepository, BlockRepository, BlockRow, DenomRepository, FailedBlockRepository,
    Repositories, TxRepository,
};
use crate::utils::logging;

/// Index store writing through sea-orm
#[derive(Clone)]
pub struct SeaOrmIndexStore {
    conn: DatabaseConnection,
    repositories: Repositories,
}

impl fmt::Debug for SeaOrmIndexStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeaOrmIndexStore").finish_non_exhaustive()
    }
}

impl SeaOrmIndexStore {
    pub fn new(db_pool: &DbPool) -> Self {
        Self {
            conn: db_pool.get_connection().clone(),
            repositories: RepositoryFactory::create_repositories(db_pool),
        }
    }
}

#[async_trait]
impl IndexStore for SeaOrmIndexStore {
    async fn highest_indexed_height(&self, chain_id: &str) -> Result<Option<BlockHeight>, DbError> {
        self.repositories.block.highest_indexed_height(chain_id).await
    }

    async fn indexed_block_status(
        &self,
        chain_id: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<IndexedBlockStatus>, DbError> {
        self.repositories
            .block
            .indexed_block_status(chain_id, from, to)
            .await
    }

    async fn heights_with_message_type(
        &self,
        chain_id: &str,
        type_url: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<BlockHeight>, DbError> {
        self.repositories
            .tx
            .heights_with_message_type(chain_id, type_url, from, to)
            .await
    }

    async fn unresolved_failed_blocks(
        &self,
        chain_id: &str,
    ) -> Result<Vec<FailedBlockRecord>, DbError> {
        self.repositories.failed_block.find_unresolved(chain_id).await
    }

    async fn upsert_failed_block(&self, record: &FailedBlockRecord) -> Result<(), DbError> {
        self.repositories.failed_block.upsert(record).await
    }

    async fn index_block_txs(&self, batch: &BlockTxBatch) -> Result<(), DbError> {
        self.write_block_txs(batch)
            .await
            .map_err(|source| DbError::BlockWrite {
                chain_id: batch.chain_id.clone(),
                height: batch.height,
                kind: FailureKind::TxData,
                source: Box::new(source),
            })
    }

    async fn index_block_events(&self, batch: &BlockEventBatch) -> Result<(), DbError> {
        self.write_block_events(batch)
            .await
            .map_err(|source| DbError::BlockWrite {
                chain_id: batch.chain_id.clone(),
                height: batch.height,
                kind: FailureKind::EventData,
                source: Box::new(source),
            })
    }
}

impl SeaOrmIndexStore {
    /// Block row, denoms, txs and the tx-data resolution in one transaction
    async fn write_block_txs(&self, batch: &BlockTxBatch) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;

        let row = BlockRow {
            chain_id: &batch.chain_id,
            height: batch.height,
            block_hash: &batch.block_hash,
            time: batch.time,
            proposer_address: Some(&batch.proposer_address),
        };
        let indexed = batch.is_complete().then_some(FailureKind::TxData);
        BlockRepository::upsert(&txn, &row, indexed).await?;

        let denoms: BTreeSet<String> = batch
            .txs
            .iter()
            .flat_map(|tx| tx.fees.iter().map(|fee| fee.denomination.clone()))
            .collect();
        DenomRepository::backfill(&txn, &denoms).await?;

        for tx in &batch.txs {
            TxRepository::upsert_tx(&txn, &batch.chain_id, tx).await?;
        }

        if batch.is_complete() {
            let resolved =
                FailedBlockRepository::resolve(&txn, &batch.chain_id, batch.height, FailureKind::TxData)
                    .await?;
            if resolved > 0 {
                logging::log_info(&format!(
                    "[{}] Resolved tx-data failure at height {}",
                    batch.chain_id, batch.height
                ));
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn write_block_events(&self, batch: &BlockEventBatch) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;

        let row = BlockRow {
            chain_id: &batch.chain_id,
            height: batch.height,
            block_hash: &batch.block_hash,
            time: batch.time,
            proposer_address: None,
        };
        BlockRepository::upsert(&txn, &row, Some(FailureKind::EventData)).await?;

        let denoms: BTreeSet<String> = batch
            .relevant_data
            .iter()
            .map(|data| data.denomination.clone())
            .collect();
        DenomRepository::backfill(&txn, &denoms).await?;

        BlockEventRepository::replace(&txn, batch).await?;

        let resolved = FailedBlockRepository::resolve(
            &txn,
            &batch.chain_id,
            batch.height,
            FailureKind::EventData,
        )
        .await?;
        if resolved > 0 {
            logging::log_info(&format!(
                "[{}] Resolved event-data failure at height {}",
                batch.chain_id, batch.height
            ));
        }

        txn.commit().await?;
        Ok(())
    }
}
