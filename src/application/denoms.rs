//! Denom metadata update task.
//!
//! Downloads the asset lists of the selected chains, upserts their denoms
//! and units, then gives every denom still lacking units a base unit.

use std::error::Error;
use std::fmt;

use sea_orm::DatabaseConnection;

use crate::domain::errors::ConfigError;
use crate::infrastructure::persistence::repositories::DenomRepository;
use crate::infrastructure::persistence::DbError;
use crate::infrastructure::rpc::{AssetListClient, RpcClientError, SUPPORTED_ASSET_LISTS};
use crate::utils::logging;

#[derive(Debug)]
pub enum DenomUpdateError {
    Fetch { chain_id: String, source: RpcClientError },
    Store { chain_id: String, source: DbError },
    UnitBackfill(DbError),
}

impl fmt::Display for DenomUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenomUpdateError::Fetch { chain_id, source } => {
                write!(f, "[{}] Asset list download failed: {}", chain_id, source)
            }
            DenomUpdateError::Store { chain_id, source } => {
                write!(f, "[{}] Denom upsert failed: {}", chain_id, source)
            }
            DenomUpdateError::UnitBackfill(source) => {
                write!(f, "Denom unit backfill failed: {}", source)
            }
        }
    }
}

impl Error for DenomUpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DenomUpdateError::Fetch { source, .. } => Some(source),
            DenomUpdateError::Store { source, .. } | DenomUpdateError::UnitBackfill(source) => {
                Some(source)
            }
        }
    }
}

/// Asset lists to update: all supported ones, or the one of `chain_id`
pub fn select_asset_lists(
    update_all: bool,
    chain_id: &str,
) -> Result<Vec<(&'static str, &'static str)>, ConfigError> {
    if update_all {
        return Ok(SUPPORTED_ASSET_LISTS.to_vec());
    }
    if chain_id.is_empty() {
        return Err(ConfigError::MissingValue(
            "CHAIN_ID (or pass --update-all)".to_string(),
        ));
    }
    let selected: Vec<_> = SUPPORTED_ASSET_LISTS
        .iter()
        .copied()
        .filter(|(id, _)| *id == chain_id)
        .collect();
    if selected.is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "no denom asset list for chain {}",
            chain_id
        )));
    }
    Ok(selected)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenomUpdateSummary {
    pub denoms: usize,
    pub units_backfilled: usize,
}

/// Run the update for the selected asset lists
pub async fn update_denoms(
    conn: &DatabaseConnection,
    client: &AssetListClient,
    asset_lists: &[(&str, &str)],
) -> Result<DenomUpdateSummary, DenomUpdateError> {
    let mut summary = DenomUpdateSummary::default();

    for (chain_id, url) in asset_lists {
        logging::log_info(&format!("[{}] Updating denoms from {}", chain_id, url));
        let asset_list = client
            .fetch(url)
            .await
            .map_err(|source| DenomUpdateError::Fetch {
                chain_id: chain_id.to_string(),
                source,
            })?;

        let metadata = asset_list.into_denoms();
        let count = DenomRepository::upsert_metadata(conn, &metadata)
            .await
            .map_err(|source| DenomUpdateError::Store {
                chain_id: chain_id.to_string(),
                source,
            })?;
        logging::log_info(&format!("[{}] Upserted {} denoms", chain_id, count));
        summary.denoms += count;
    }

    summary.units_backfilled = DenomRepository::backfill_missing_units(conn)
        .await
        .map_err(DenomUpdateError::UnitBackfill)?;
    if summary.units_backfilled > 0 {
        logging::log_info(&format!(
            "Added base units for {} denoms without units",
            summary.units_backfilled
        ));
    } else {
        logging::log_info("All denoms have at least one unit");
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_all_selects_every_supported_list() {
        let lists = select_asset_lists(true, "").unwrap();
        assert_eq!(lists.len(), SUPPORTED_ASSET_LISTS.len());
    }

    #[test]
    fn test_chain_id_selects_its_list() {
        let lists = select_asset_lists(false, "osmosis-1").unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].0, "osmosis-1");
    }

    #[test]
    fn test_unsupported_or_missing_chain_is_rejected() {
        assert!(matches!(
            select_asset_lists(false, "cosmoshub-4"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            select_asset_lists(false, ""),
            Err(ConfigError::MissingValue(_))
        ));
    }
}
