//! Repository for denoms and denom units

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, EntityTrait, QuerySelect, Set, TransactionTrait,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::models::{DenomMetadata, UNKNOWN_DENOM};
use crate::infrastructure::persistence::entities::{denom_units, denoms};
use crate::infrastructure::persistence::error::DbError;

#[derive(Debug, Clone, Copy, Default)]
pub struct DenomRepository;

/// Unit rows of a denom, one per unit name. A repeated name keeps its last
/// exponent.
fn unit_rows(denom: &DenomMetadata) -> Vec<(String, i32)> {
    let mut units: BTreeMap<&str, i32> = BTreeMap::new();
    for unit in &denom.units {
        units.insert(unit.name.as_str(), i32::try_from(unit.exponent).unwrap_or(i32::MAX));
    }
    units
        .into_iter()
        .map(|(name, exponent)| (name.to_string(), exponent))
        .collect()
}

/// Denoms without any unit, paired with the base unit they should get
fn missing_base_units(denoms: Vec<(i64, String)>, with_units: &BTreeSet<i64>) -> Vec<(i64, String)> {
    denoms
        .into_iter()
        .filter(|(id, _)| !with_units.contains(id))
        .collect()
}

impl DenomRepository {
    /// Insert denoms that are not stored yet
    pub async fn backfill<C: ConnectionTrait>(db: &C, denoms: &BTreeSet<String>) -> Result<(), DbError> {
        if denoms.is_empty() {
            return Ok(());
        }

        let models: Vec<denoms::ActiveModel> = denoms
            .iter()
            .map(|base| denoms::ActiveModel {
                base: Set(base.clone()),
                name: Set(UNKNOWN_DENOM.to_string()),
                symbol: Set(UNKNOWN_DENOM.to_string()),
                ..Default::default()
            })
            .collect();

        let result = denoms::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(denoms::Column::Base)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(_) => Ok(()),
            // All rows conflicted
            Err(sea_orm::DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert asset list metadata in one transaction. Existing denoms get the
    /// vetted name and symbol, and their units are added or updated.
    pub async fn upsert_metadata(
        db: &DatabaseConnection,
        metadata: &[DenomMetadata],
    ) -> Result<usize, DbError> {
        let txn = db.begin().await?;

        for denom in metadata {
            let denom_id = denoms::Entity::insert(denoms::ActiveModel {
                base: Set(denom.base.clone()),
                name: Set(denom.name.clone()),
                symbol: Set(denom.symbol.clone()),
                ..Default::default()
            })
            .on_conflict(
                OnConflict::column(denoms::Column::Base)
                    .update_columns([denoms::Column::Name, denoms::Column::Symbol])
                    .to_owned(),
            )
            .exec(&txn)
            .await?
            .last_insert_id;

            let units: Vec<denom_units::ActiveModel> = unit_rows(denom)
                .into_iter()
                .map(|(name, exponent)| denom_units::ActiveModel {
                    denom_id: Set(denom_id),
                    name: Set(name),
                    exponent: Set(exponent),
                    ..Default::default()
                })
                .collect();
            if units.is_empty() {
                continue;
            }
            denom_units::Entity::insert_many(units)
                .on_conflict(
                    OnConflict::columns([denom_units::Column::DenomId, denom_units::Column::Name])
                        .update_column(denom_units::Column::Exponent)
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(metadata.len())
    }

    /// Give every denom without units a base unit named after it with
    /// exponent 0. Returns the number of units added.
    pub async fn backfill_missing_units(db: &DatabaseConnection) -> Result<usize, DbError> {
        let stored: Vec<(i64, String)> = denoms::Entity::find()
            .select_only()
            .column(denoms::Column::Id)
            .column(denoms::Column::Base)
            .into_tuple()
            .all(db)
            .await?;
        let with_units: BTreeSet<i64> = denom_units::Entity::find()
            .select_only()
            .column(denom_units::Column::DenomId)
            .distinct()
            .into_tuple::<i64>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        let missing = missing_base_units(stored, &with_units);
        if missing.is_empty() {
            return Ok(0);
        }

        let count = missing.len();
        let txn = db.begin().await?;
        denom_units::Entity::insert_many(missing.into_iter().map(|(denom_id, base)| {
            denom_units::ActiveModel {
                denom_id: Set(denom_id),
                name: Set(base),
                exponent: Set(0),
                ..Default::default()
            }
        }))
        .exec_without_returning(&txn)
        .await?;
        txn.commit().await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DenomUnitMetadata;

    fn unit(name: &str, exponent: u32) -> DenomUnitMetadata {
        DenomUnitMetadata {
            name: name.to_string(),
            exponent,
        }
    }

    #[test]
    fn test_unit_rows_dedupe_by_name() {
        let denom = DenomMetadata {
            base: "uatom".to_string(),
            name: "Cosmos Hub Atom".to_string(),
            symbol: "ATOM".to_string(),
            units: vec![unit("uatom", 0), unit("atom", 6), unit("atom", 7)],
        };
        assert_eq!(
            unit_rows(&denom),
            vec![("atom".to_string(), 7), ("uatom".to_string(), 0)]
        );
    }

    #[test]
    fn test_missing_base_units_skip_denoms_with_units() {
        let stored = vec![
            (1, "uatom".to_string()),
            (2, "ibc/27394FB0".to_string()),
            (3, "uosmo".to_string()),
        ];
        let with_units = BTreeSet::from([1, 3]);
        assert_eq!(
            missing_base_units(stored, &with_units),
            vec![(2, "ibc/27394FB0".to_string())]
        );
    }
}
