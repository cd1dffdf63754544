//! SeaORM Entity for blocks table
//! One row per (chain, height) with the index state of each data kind

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blocks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub chain_id: String,
    pub height: i64,
    #[sea_orm(column_type = "Text")]
    pub block_hash: String,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub time_stamp: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text")]
    pub proposer_address: String,
    pub tx_indexed: bool,
    pub block_events_indexed: bool,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
