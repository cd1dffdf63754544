use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::errors::DecodeError;

/// An amount of a single denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub amount: BigDecimal,
    pub denom: String,
}

impl Coin {
    pub fn new(amount: BigDecimal, denom: impl Into<String>) -> Self {
        Self {
            amount,
            denom: denom.into(),
        }
    }

    /// Parse an amount string as carried in coin JSON
    pub fn from_parts(amount: &str, denom: &str) -> Result<Self, DecodeError> {
        let amount = BigDecimal::from_str(amount.trim())
            .map_err(|e| DecodeError::InvalidCoins(format!("{}{}: {}", amount, denom, e)))?;
        validate_denom(denom)?;
        Ok(Self::new(amount, denom))
    }
}

fn validate_denom(denom: &str) -> Result<(), DecodeError> {
    let valid_len = (2..=128).contains(&denom.len());
    let starts_alpha = denom.chars().next().map_or(false, |c| c.is_ascii_alphabetic());
    let valid_chars = denom
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));

    if valid_len && starts_alpha && valid_chars {
        Ok(())
    } else {
        Err(DecodeError::InvalidCoins(format!("invalid denom {:?}", denom)))
    }
}

/// Parse a comma separated coin list such as `"100uatom,5ibc/ABCD"`.
///
/// Decimal amounts (`"1.5uosmo"`) are accepted for DecCoins.
pub fn parse_coins(input: &str) -> Result<Vec<Coin>, DecodeError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            let split_at = part
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| DecodeError::InvalidCoins(format!("missing denom in {:?}", part)))?;
            if split_at == 0 {
                return Err(DecodeError::InvalidCoins(format!(
                    "missing amount in {:?}",
                    part
                )));
            }
            let (amount, denom) = part.split_at(split_at);
            Coin::from_parts(amount, denom.trim())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_multiple_coins() {
        let coins = parse_coins("100uatom, 5ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2").unwrap();
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0], Coin::new(BigDecimal::from(100), "uatom"));
        assert!(coins[1].denom.starts_with("ibc/"));
    }

    #[test]
    fn test_parse_dec_coin() {
        let coins = parse_coins("1.5uosmo").unwrap();
        assert_eq!(coins[0].amount, BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_coins("uatom").is_err());
        assert!(parse_coins("100").is_err());
        assert!(parse_coins("100u").is_err());
        assert_eq!(parse_coins("").unwrap(), Vec::new());
    }

    #[test]
    fn test_amounts_beyond_96_bits() {
        // 18-decimal chains routinely carry amounts wider than 28 digits
        let coins = parse_coins("100000000000000000000000000000ainj,123456789012345678901234567890.5aevmos").unwrap();
        assert_eq!(
            coins[0].amount,
            BigDecimal::from_str("100000000000000000000000000000").unwrap()
        );
        assert_eq!(coins[0].amount.to_string(), "100000000000000000000000000000");
        assert_eq!(coins[1].denom, "aevmos");
        assert_eq!(
            coins[1].amount,
            BigDecimal::from_str("123456789012345678901234567890.5").unwrap()
        );
    }
}
