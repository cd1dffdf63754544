//! SeaORM Entity for txes table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "txes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_type = "Text")]
    pub chain_id: String,
    #[sea_orm(column_type = "Text")]
    pub hash: String,
    pub height: i64,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub time_stamp: DateTimeWithTimeZone,
    pub code: i64,
    #[sea_orm(column_type = "Text")]
    pub codespace: String,
    #[sea_orm(column_type = "Text")]
    pub raw_log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    #[sea_orm(column_type = "Text")]
    pub memo: String,
    pub timeout_height: i64,
    #[sea_orm(column_type = "JsonBinary")]
    pub signers: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub auth_info: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub dropped_extension_options: Json,
    pub decoded_with_fallback: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
