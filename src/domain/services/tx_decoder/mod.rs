//! Transaction decoding.
//!
//! Raw block transactions go through a strict decoder first. When it refuses
//! a transaction (unknown message type, extension options, malformed auth
//! info) the lenient in-app decoder re-reads the envelope and keeps whatever
//! it can: message type URLs with their payloads, memo, timeout height and
//! signer info.

pub mod message_types;
pub mod normalize;
pub mod proto;

use prost::Message;
use std::collections::HashSet;

use crate::domain::errors::DecodeError;
use crate::domain::models::{AuthInfoSummary, Coin, FeeInfo, PublicKeyBytes, SignerInfoSummary};
use crate::domain::services::address_resolver::AddressResolver;
use crate::utils::logging;

pub use message_types::register_cosmos_sdk_message_types;

/// Envelope fields of a decoded raw transaction
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTx {
    /// (type URL, protobuf value) per message
    pub messages: Vec<(String, Vec<u8>)>,
    pub memo: String,
    pub timeout_height: u64,
    pub auth_info: AuthInfoSummary,
    pub dropped_extension_options: Vec<String>,
    pub used_fallback: bool,
}

/// Decodes transactions and normalizes them for storage
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    resolver: AddressResolver,
    known_message_types: HashSet<String>,
}

impl MessageDecoder {
    pub fn new(resolver: AddressResolver) -> Self {
        Self {
            resolver,
            known_message_types: HashSet::new(),
        }
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Make a message type decodable by the strict decoder
    pub fn register_message_type(&mut self, type_url: &str) {
        self.known_message_types.insert(type_url.to_string());
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        self.known_message_types.contains(type_url)
    }

    /// Decode raw tx bytes, falling back to the lenient decoder on failure
    pub fn decode_raw(&self, tx_bytes: &[u8]) -> Result<DecodedTx, DecodeError> {
        match self.decode_strict(tx_bytes) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                logging::log_debug(&format!(
                    "Standard tx decode failed ({}), using in-app decoder",
                    e
                ));
                self.decode_fallback(tx_bytes)
            }
        }
    }

    /// Strict decode: every message type must be registered and no extension
    /// options may be present
    pub fn decode_strict(&self, tx_bytes: &[u8]) -> Result<DecodedTx, DecodeError> {
        let raw = proto::TxRaw::decode(tx_bytes)?;
        let body = proto::TxBody::decode(raw.body_bytes.as_slice())
            .map_err(|e| DecodeError::InvalidBody(e.to_string()))?;

        if let Some(option) = body.extension_options.first() {
            return Err(DecodeError::UnsupportedExtensionOption(
                option.type_url.clone(),
            ));
        }
        if let Some(unknown) = body
            .messages
            .iter()
            .find(|m| !self.is_registered(&m.type_url))
        {
            return Err(DecodeError::UnknownMessageType(unknown.type_url.clone()));
        }

        let auth_info = proto::AuthInfo::decode(raw.auth_info_bytes.as_slice())
            .map_err(|e| DecodeError::InvalidAuthInfo(e.to_string()))
            .and_then(summarize_auth_info)?;

        Ok(DecodedTx {
            messages: body
                .messages
                .into_iter()
                .map(|m| (m.type_url, m.value))
                .collect(),
            memo: body.memo,
            timeout_height: body.timeout_height,
            auth_info,
            dropped_extension_options: Vec::new(),
            used_fallback: false,
        })
    }

    /// Lenient decode of the envelope.
    ///
    /// Extension options are dropped (their type URLs are reported) and an
    /// undecodable auth info is replaced by an empty one.
    pub fn decode_fallback(&self, tx_bytes: &[u8]) -> Result<DecodedTx, DecodeError> {
        let raw = proto::TxRaw::decode(tx_bytes)?;
        let body = proto::TxBodyCore::decode(raw.body_bytes.as_slice())
            .map_err(|e| DecodeError::InvalidBody(e.to_string()))?;

        let dropped_extension_options: Vec<String> = proto::TxBodyExtensions::decode(raw.body_bytes.as_slice())
            .map(|ext| {
                ext.extension_options
                    .into_iter()
                    .chain(ext.non_critical_extension_options)
                    .map(|option| option.type_url)
                    .collect()
            })
            .unwrap_or_default();
        if !dropped_extension_options.is_empty() {
            logging::log_warning(&format!(
                "In-app decoder dropped extension options: {}",
                dropped_extension_options.join(", ")
            ));
        }

        let auth_info = match proto::AuthInfo::decode(raw.auth_info_bytes.as_slice())
            .map_err(|e| DecodeError::InvalidAuthInfo(e.to_string()))
            .and_then(summarize_auth_info)
        {
            Ok(auth_info) => auth_info,
            Err(e) => {
                logging::log_warning(&format!(
                    "In-app decoder could not read auth info, continuing without it: {}",
                    e
                ));
                AuthInfoSummary::default()
            }
        };

        Ok(DecodedTx {
            messages: body
                .messages
                .into_iter()
                .map(|m| (m.type_url, m.value))
                .collect(),
            memo: body.memo,
            timeout_height: body.timeout_height,
            auth_info,
            dropped_extension_options,
            used_fallback: true,
        })
    }
}

fn decode_key(any: &proto::Any) -> Result<PublicKeyBytes, DecodeError> {
    let key = proto::PubKey::decode(any.value.as_slice())
        .map_err(|e| DecodeError::InvalidAuthInfo(format!("{}: {}", any.type_url, e)))?;
    Ok(PublicKeyBytes {
        type_url: any.type_url.clone(),
        key: key.key,
    })
}

fn summarize_signer_info(info: proto::SignerInfo) -> Result<SignerInfoSummary, DecodeError> {
    let Some(public_key) = info.public_key else {
        return Ok(SignerInfoSummary {
            sequence: info.sequence,
            ..SignerInfoSummary::default()
        });
    };

    let public_keys = if public_key.type_url == proto::MULTISIG_PUBKEY_URL {
        let multisig = proto::LegacyAminoPubKey::decode(public_key.value.as_slice())
            .map_err(|e| DecodeError::InvalidAuthInfo(format!("multisig key: {}", e)))?;
        multisig
            .public_keys
            .iter()
            .map(decode_key)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![decode_key(&public_key)?]
    };

    Ok(SignerInfoSummary {
        key_type_url: public_key.type_url,
        public_keys,
        sequence: info.sequence,
    })
}

fn summarize_auth_info(auth_info: proto::AuthInfo) -> Result<AuthInfoSummary, DecodeError> {
    let signer_infos = auth_info
        .signer_infos
        .into_iter()
        .map(summarize_signer_info)
        .collect::<Result<Vec<_>, _>>()?;

    let fee = match auth_info.fee {
        Some(fee) => FeeInfo {
            amount: fee
                .amount
                .iter()
                .map(|c| Coin::from_parts(&c.amount, &c.denom))
                .collect::<Result<Vec<_>, _>>()?,
            gas_limit: fee.gas_limit,
            payer: fee.payer,
            granter: fee.granter,
        },
        None => FeeInfo::default(),
    };

    Ok(AuthInfoSummary { signer_infos, fee })
}
