//! Repository for failed_blocks operations

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::fmt;

use crate::domain::models::{BlockHeight, FailedBlockRecord, FailureKind, FailureReason};
use crate::infrastructure::persistence::entities::failed_blocks;
use crate::infrastructure::persistence::error::DbError;
use crate::utils::logging;

/// Repository for failed block operations
#[derive(Clone)]
pub struct FailedBlockRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for FailedBlockRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedBlockRepository").finish_non_exhaustive()
    }
}

impl FailedBlockRepository {
    /// Create a new FailedBlockRepository
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Unresolved failures of a chain, lowest height first
    pub async fn find_unresolved(&self, chain_id: &str) -> Result<Vec<FailedBlockRecord>, DbError> {
        let rows = failed_blocks::Entity::find()
            .filter(failed_blocks::Column::ChainId.eq(chain_id))
            .filter(failed_blocks::Column::ResolvedAt.is_null())
            .order_by_asc(failed_blocks::Column::Height)
            .order_by_asc(failed_blocks::Column::Kind)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().filter_map(to_domain_model).collect())
    }

    /// Insert a failure, or reopen and bump the existing one for the same
    /// (chain, height, kind)
    pub async fn upsert(&self, record: &FailedBlockRecord) -> Result<(), DbError> {
        let now = Utc::now();
        let model = failed_blocks::ActiveModel {
            chain_id: Set(record.chain_id.clone()),
            chain_name: Set(record.chain_name.clone()),
            height: Set(record.height),
            kind: Set(record.kind.as_str().to_string()),
            reason: Set(record.reason.as_str().to_string()),
            attempts: Set(1),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            resolved_at: Set(None),
            ..Default::default()
        };

        failed_blocks::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    failed_blocks::Column::ChainId,
                    failed_blocks::Column::Height,
                    failed_blocks::Column::Kind,
                ])
                .update_columns([
                    failed_blocks::Column::ChainName,
                    failed_blocks::Column::Reason,
                    failed_blocks::Column::UpdatedAt,
                    failed_blocks::Column::ResolvedAt,
                ])
                .value(
                    failed_blocks::Column::Attempts,
                    Expr::col((failed_blocks::Entity, failed_blocks::Column::Attempts)).add(1),
                )
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .map_err(|source| DbError::FailedBlockUpsert {
                chain_id: record.chain_id.clone(),
                height: record.height,
                kind: record.kind,
                source,
            })?;

        Ok(())
    }

    /// Mark an open failure resolved, keeping the row
    pub async fn resolve<C: ConnectionTrait>(
        db: &C,
        chain_id: &str,
        height: BlockHeight,
        kind: FailureKind,
    ) -> Result<u64, DbError> {
        let result = failed_blocks::Entity::update_many()
            .col_expr(failed_blocks::Column::ResolvedAt, Expr::value(Utc::now()))
            .col_expr(failed_blocks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(failed_blocks::Column::ChainId.eq(chain_id))
            .filter(failed_blocks::Column::Height.eq(height))
            .filter(failed_blocks::Column::Kind.eq(kind.as_str()))
            .filter(failed_blocks::Column::ResolvedAt.is_null())
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }
}

fn to_domain_model(entity: failed_blocks::Model) -> Option<FailedBlockRecord> {
    let kind = FailureKind::parse(&entity.kind);
    let reason = FailureReason::parse(&entity.reason);

    match (kind, reason) {
        (Some(kind), Some(reason)) => Some(FailedBlockRecord {
            height: entity.height,
            chain_id: entity.chain_id,
            chain_name: entity.chain_name,
            kind,
            reason,
        }),
        _ => {
            logging::log_warning(&format!(
                "Skipping failed block {} with unknown kind {:?} or reason {:?}",
                entity.height, entity.kind, entity.reason
            ));
            None
        }
    }
}
