//! SeaORM Entity for denom_units table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "denom_units")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub denom_id: i64,
    #[sea_orm(column_type = "Text")]
    pub name: String,
    pub exponent: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
