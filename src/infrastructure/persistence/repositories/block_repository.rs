//! Repository for blocks operations
//! Tracks which data kinds are indexed for each height

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Condition, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::fmt;

use crate::domain::models::{BlockHeight, FailureKind, IndexedBlockStatus};
use crate::infrastructure::persistence::entities::blocks;
use crate::infrastructure::persistence::error::DbError;

/// Block header fields stored alongside the index flags
#[derive(Debug, Clone)]
pub struct BlockRow<'a> {
    pub chain_id: &'a str,
    pub height: BlockHeight,
    pub block_hash: &'a str,
    pub time: DateTime<Utc>,
    /// Not known when only block results were fetched
    pub proposer_address: Option<&'a str>,
}

/// Repository for blocks operations
#[derive(Clone)]
pub struct BlockRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for BlockRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRepository").finish_non_exhaustive()
    }
}

impl BlockRepository {
    /// Create a new BlockRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Highest height with any data kind indexed
    pub async fn highest_indexed_height(&self, chain_id: &str) -> Result<Option<BlockHeight>, DbError> {
        let result = blocks::Entity::find()
            .filter(blocks::Column::ChainId.eq(chain_id))
            .filter(
                Condition::any()
                    .add(blocks::Column::TxIndexed.eq(true))
                    .add(blocks::Column::BlockEventsIndexed.eq(true)),
            )
            .order_by_desc(blocks::Column::Height)
            .one(&self.conn)
            .await?;

        Ok(result.map(|b| b.height))
    }

    /// Index flags of the stored heights in `[from, to]`
    pub async fn indexed_block_status(
        &self,
        chain_id: &str,
        from: BlockHeight,
        to: BlockHeight,
    ) -> Result<Vec<IndexedBlockStatus>, DbError> {
        let rows: Vec<(i64, bool, bool)> = blocks::Entity::find()
            .select_only()
            .column(blocks::Column::Height)
            .column(blocks::Column::TxIndexed)
            .column(blocks::Column::BlockEventsIndexed)
            .filter(blocks::Column::ChainId.eq(chain_id))
            .filter(blocks::Column::Height.between(from, to))
            .order_by_asc(blocks::Column::Height)
            .into_tuple()
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(height, tx_indexed, block_events_indexed)| IndexedBlockStatus {
                height,
                tx_indexed,
                block_events_indexed,
            })
            .collect())
    }

    /// Upsert the block row. When `indexed` is set, the flag of that data kind
    /// is set to true; the other flag is left as stored.
    pub async fn upsert<C: ConnectionTrait>(
        db: &C,
        row: &BlockRow<'_>,
        indexed: Option<FailureKind>,
    ) -> Result<(), DbError> {
        let now = Utc::now();
        let model = blocks::ActiveModel {
            chain_id: Set(row.chain_id.to_string()),
            height: Set(row.height),
            block_hash: Set(row.block_hash.to_string()),
            time_stamp: Set(row.time.into()),
            proposer_address: Set(row.proposer_address.unwrap_or_default().to_string()),
            tx_indexed: Set(indexed == Some(FailureKind::TxData)),
            block_events_indexed: Set(indexed == Some(FailureKind::EventData)),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let mut update = vec![
            blocks::Column::BlockHash,
            blocks::Column::TimeStamp,
            blocks::Column::UpdatedAt,
        ];
        if row.proposer_address.is_some() {
            update.push(blocks::Column::ProposerAddress);
        }
        match indexed {
            Some(FailureKind::TxData) => update.push(blocks::Column::TxIndexed),
            Some(FailureKind::EventData) => update.push(blocks::Column::BlockEventsIndexed),
            None => {}
        }

        blocks::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([blocks::Column::ChainId, blocks::Column::Height])
                    .update_columns(update)
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        Ok(())
    }
}
