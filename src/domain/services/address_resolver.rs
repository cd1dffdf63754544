//! Public key to bech32 address resolution.
//!
//! Keys show up hex encoded (Tendermint validator sets), base64 encoded (tx
//! search JSON) or as legacy amino bech32 strings. Resolution tries those in
//! that order and the first interpretation that yields a supported key wins.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::domain::errors::AddressError;

pub const ED25519_KEY_LEN: usize = 32;
pub const SECP256K1_KEY_LEN: usize = 33;
const MAX_ADDRESS_LEN: usize = 255;

const AMINO_SECP256K1_PREFIX: [u8; 5] = [0xeb, 0x5a, 0xe9, 0x87, 0x21];
const AMINO_ED25519_PREFIX: [u8; 5] = [0x16, 0x24, 0xde, 0x64, 0x20];

/// A public key of a supported algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(Vec<u8>),
    Ed25519(Vec<u8>),
}

impl PublicKey {
    /// Interpret raw bytes. Lengths that fit no algorithm give `None`.
    pub fn from_raw(bytes: &[u8], type_hint: &str) -> Option<Self> {
        if type_hint == "ed25519" && bytes.len() == ED25519_KEY_LEN {
            Some(PublicKey::Ed25519(bytes.to_vec()))
        } else if bytes.len() == SECP256K1_KEY_LEN {
            Some(PublicKey::Secp256k1(bytes.to_vec()))
        } else {
            None
        }
    }

    /// Unwrap an amino encoded key
    fn from_amino(bytes: &[u8]) -> Option<Self> {
        if let Some(key) = bytes.strip_prefix(&AMINO_SECP256K1_PREFIX[..]) {
            (key.len() == SECP256K1_KEY_LEN).then(|| PublicKey::Secp256k1(key.to_vec()))
        } else if let Some(key) = bytes.strip_prefix(&AMINO_ED25519_PREFIX[..]) {
            (key.len() == ED25519_KEY_LEN).then(|| PublicKey::Ed25519(key.to_vec()))
        } else {
            None
        }
    }

    /// 20-byte address of the key
    pub fn address(&self) -> Vec<u8> {
        match self {
            PublicKey::Secp256k1(key) => Ripemd160::digest(Sha256::digest(key)).to_vec(),
            PublicKey::Ed25519(key) => Sha256::digest(key)[..20].to_vec(),
        }
    }
}

/// Derives account addresses for one bech32 prefix
#[derive(Debug, Clone)]
pub struct AddressResolver {
    hrp: Hrp,
    prefix: String,
}

impl AddressResolver {
    pub fn new(account_prefix: &str) -> Result<Self, AddressError> {
        if account_prefix.is_empty() {
            return Err(AddressError::InvalidPrefix(account_prefix.to_string()));
        }
        let hrp = Hrp::parse(account_prefix)
            .map_err(|_| AddressError::InvalidPrefix(account_prefix.to_string()))?;

        Ok(Self {
            hrp,
            prefix: account_prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a public key string to an account address
    pub fn resolve(&self, key: &str, type_hint: &str) -> Result<String, AddressError> {
        let key = key.trim();

        if let Ok(bytes) = hex::decode(key) {
            if let Some(public_key) = PublicKey::from_raw(&bytes, type_hint) {
                return self.encode_address(&public_key.address());
            }
        }

        if let Ok(bytes) = BASE64.decode(key) {
            if let Some(public_key) = PublicKey::from_raw(&bytes, type_hint) {
                return self.encode_address(&public_key.address());
            }
        }

        // Account, validator operator and consensus key prefixes, in that order
        for suffix in ["pub", "valoperpub", "valconspub"] {
            if let Some(public_key) = self.decode_legacy_bech32(key, suffix) {
                return self.encode_address(&public_key.address());
            }
        }

        Err(AddressError::UnrecognizedEncoding(key.to_string()))
    }

    /// Address for already decoded key bytes
    pub fn resolve_bytes(&self, bytes: &[u8], type_hint: &str) -> Result<String, AddressError> {
        let public_key = PublicKey::from_raw(bytes, type_hint)
            .ok_or(AddressError::InvalidKeyLength(bytes.len()))?;
        self.encode_address(&public_key.address())
    }

    /// Bech32 encode address bytes under the account prefix
    pub fn encode_address(&self, address: &[u8]) -> Result<String, AddressError> {
        if address.is_empty() || address.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::InvalidAddressLength(address.len()));
        }
        bech32::encode::<Bech32>(self.hrp, address).map_err(|e| AddressError::Bech32(e.to_string()))
    }

    fn decode_legacy_bech32(&self, key: &str, suffix: &str) -> Option<PublicKey> {
        let (hrp, data) = bech32::decode(key).ok()?;
        let expected = format!("{}{}", self.prefix, suffix);
        if hrp.to_string().to_lowercase() != expected.to_lowercase() {
            return None;
        }
        PublicKey::from_amino(&data)
    }
}
