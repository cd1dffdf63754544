//! Repository for block_events and event_relevant_data

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::domain::models::BlockEventBatch;
use crate::infrastructure::persistence::entities::{block_events, event_relevant_data};
use crate::infrastructure::persistence::error::DbError;

/// Block event writes. Reads go through the block repository's index flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockEventRepository;

impl BlockEventRepository {
    /// Replace the stored events and relevant data of the batch's height
    pub async fn replace<C: ConnectionTrait>(db: &C, batch: &BlockEventBatch) -> Result<(), DbError> {
        block_events::Entity::delete_many()
            .filter(block_events::Column::ChainId.eq(batch.chain_id.as_str()))
            .filter(block_events::Column::Height.eq(batch.height))
            .exec(db)
            .await?;
        event_relevant_data::Entity::delete_many()
            .filter(event_relevant_data::Column::ChainId.eq(batch.chain_id.as_str()))
            .filter(event_relevant_data::Column::Height.eq(batch.height))
            .exec(db)
            .await?;

        let events = batch
            .events
            .iter()
            .map(|event| {
                let attributes =
                    serde_json::to_value(&event.attributes).map_err(|e| DbError::Encode {
                        column: "attributes",
                        message: e.to_string(),
                    })?;
                Ok(block_events::ActiveModel {
                    chain_id: Set(batch.chain_id.clone()),
                    height: Set(batch.height),
                    lifecycle_position: Set(event.position.scope().to_string()),
                    event_index: Set(event.event_index as i32),
                    event_type: Set(event.event_type.clone()),
                    attributes: Set(attributes),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        if !events.is_empty() {
            block_events::Entity::insert_many(events)
                .exec_without_returning(db)
                .await?;
        }

        let relevant: Vec<event_relevant_data::ActiveModel> = batch
            .relevant_data
            .iter()
            .map(|data| event_relevant_data::ActiveModel {
                chain_id: Set(batch.chain_id.clone()),
                height: Set(batch.height),
                address: Set(data.address.clone()),
                amount: Set(data.amount.clone()),
                denomination: Set(data.denomination.clone()),
                event_source: Set(data.event_source.as_str().to_string()),
                ..Default::default()
            })
            .collect();
        if !relevant.is_empty() {
            event_relevant_data::Entity::insert_many(relevant)
                .exec_without_returning(db)
                .await?;
        }

        Ok(())
    }
}
