//! SeaORM Entity for message_relevant_data table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_relevant_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tx_id: i64,
    pub message_index: i32,
    #[sea_orm(column_type = "Text")]
    pub type_url: String,
    #[sea_orm(column_type = "Text")]
    pub sender_address: String,
    #[sea_orm(column_type = "Text")]
    pub receiver_address: String,
    #[sea_orm(column_type = "Decimal(Some((78, 0)))")]
    pub amount: BigDecimal,
    #[sea_orm(column_type = "Text")]
    pub denomination: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
