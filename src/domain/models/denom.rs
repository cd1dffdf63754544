//! Denom metadata and the chain registry asset list format

use serde::Deserialize;

/// Name and symbol of denoms seen on chain but absent from any asset list
pub const UNKNOWN_DENOM: &str = "UNKNOWN";

/// One unit of a denom, e.g. `atom` with exponent 6 for `uatom`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenomUnitMetadata {
    pub name: String,
    pub exponent: u32,
}

/// Vetted metadata for a base denom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenomMetadata {
    pub base: String,
    pub name: String,
    pub symbol: String,
    pub units: Vec<DenomUnitMetadata>,
}

/// Chain registry `assetlist.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetList {
    #[serde(default)]
    pub chain_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub denom_units: Vec<AssetDenomUnit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetDenomUnit {
    pub denom: String,
    #[serde(default)]
    pub exponent: u32,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AssetList {
    /// Denom metadata of every asset with a base denom
    pub fn into_denoms(self) -> Vec<DenomMetadata> {
        self.assets
            .into_iter()
            .filter(|asset| !asset.base.is_empty())
            .map(|asset| DenomMetadata {
                base: asset.base,
                name: asset.name,
                symbol: asset.symbol,
                units: asset
                    .denom_units
                    .into_iter()
                    .map(|unit| DenomUnitMetadata {
                        name: unit.denom,
                        exponent: unit.exponent,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET_LIST: &str = r#"{
        "chain_name": "juno",
        "assets": [
            {
                "description": "The native token of JUNO Chain",
                "denom_units": [
                    {"denom": "ujuno", "exponent": 0},
                    {"denom": "juno", "exponent": 6, "aliases": ["JUNO"]}
                ],
                "base": "ujuno",
                "name": "Juno",
                "display": "juno",
                "symbol": "JUNO"
            },
            {"name": "no base", "symbol": "NB", "denom_units": []}
        ]
    }"#;

    #[test]
    fn test_asset_list_to_denoms() {
        let list: AssetList = serde_json::from_str(ASSET_LIST).unwrap();
        assert_eq!(list.chain_name, "juno");

        let denoms = list.into_denoms();
        assert_eq!(denoms.len(), 1);
        assert_eq!(denoms[0].base, "ujuno");
        assert_eq!(denoms[0].symbol, "JUNO");
        assert_eq!(
            denoms[0].units,
            vec![
                DenomUnitMetadata {
                    name: "ujuno".to_string(),
                    exponent: 0
                },
                DenomUnitMetadata {
                    name: "juno".to_string(),
                    exponent: 6
                },
            ]
        );
    }

    #[test]
    fn test_missing_exponent_defaults_to_base_unit() {
        let list: AssetList = serde_json::from_str(
            r#"{"assets": [{"base": "uosmo", "denom_units": [{"denom": "uosmo"}]}]}"#,
        )
        .unwrap();
        let denoms = list.into_denoms();
        assert_eq!(denoms[0].units[0].exponent, 0);
        assert_eq!(denoms[0].name, "");
    }
}
