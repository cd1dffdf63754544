use chrono::{DateTime, Utc};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chain::BlockHeight;
use super::coin::Coin;
use super::event::Attribute;

/// An event emitted while executing one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub event_type: String,
    pub attributes: Vec<Attribute>,
}

impl MessageEvent {
    /// First value for `key`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Log entry for one message of a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLog {
    pub msg_index: usize,
    pub log: String,
    pub events: Vec<MessageEvent>,
}

/// Message body as it came out of decoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessagePayload {
    /// Already decoded by the node (tx search)
    Json(Value),
    /// Protobuf bytes of the `Any` value (block tx bytes)
    Raw(Vec<u8>),
}

/// One message of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessageRecord {
    pub message_index: usize,
    pub type_url: String,
    pub payload: MessagePayload,
    pub events: Vec<MessageEvent>,
}

/// Signer info with its public key(s) unpacked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfoSummary {
    /// Type URL of the outer key, e.g. `/cosmos.crypto.secp256k1.PubKey`
    pub key_type_url: String,
    /// One key, or the constituents of a multisig key in order
    pub public_keys: Vec<PublicKeyBytes>,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBytes {
    pub type_url: String,
    pub key: Vec<u8>,
}

impl PublicKeyBytes {
    /// Algorithm hint derived from the key type URL
    pub fn type_hint(&self) -> &'static str {
        if self.type_url.contains("ed25519") {
            "ed25519"
        } else if self.type_url.contains("secp256k1") {
            "secp256k1"
        } else {
            ""
        }
    }
}

/// Fee as declared in auth info
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeInfo {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    pub payer: String,
    pub granter: String,
}

/// Auth info projected to what the pipeline uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfoSummary {
    pub signer_infos: Vec<SignerInfoSummary>,
    pub fee: FeeInfo,
}

/// A fee coin paid by one address. Zero amounts are never produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: BigDecimal,
    pub denomination: String,
    pub payer_address: String,
}

/// Value moved by one message, as read by its message handler.
/// Either address is empty when the message does not name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRelevantInformation {
    pub message_index: usize,
    pub type_url: String,
    pub sender_address: String,
    pub receiver_address: String,
    pub amount: BigDecimal,
    pub denomination: String,
}

/// Chain-agnostic projection of a decoded transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTx {
    pub hash: String,
    pub height: BlockHeight,
    pub timestamp: DateTime<Utc>,
    pub code: u32,
    pub codespace: String,
    pub raw_log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub memo: String,
    pub timeout_height: u64,
    pub messages: Vec<DecodedMessageRecord>,
    pub signers: Vec<String>,
    pub auth_info: AuthInfoSummary,
    pub per_message_logs: Vec<MessageLog>,
    pub fees: Vec<Fee>,
    /// Filled by the message handlers after normalization
    pub relevant_data: Vec<MessageRelevantInformation>,
    /// Extension option type URLs the decoder did not carry through
    pub dropped_extension_options: Vec<String>,
    pub decoded_with_fallback: bool,
}

impl NormalizedTx {
    pub fn succeeded(&self) -> bool {
        self.code == 0
    }
}

/// All transactions of one height
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTxBatch {
    pub chain_id: String,
    pub height: BlockHeight,
    pub block_hash: String,
    pub time: DateTime<Utc>,
    pub proposer_address: String,
    pub txs: Vec<NormalizedTx>,
    /// Hashes of transactions that could not be decoded. While non-empty the
    /// height stays marked as not tx-indexed.
    pub unprocessable_txs: Vec<String>,
}

impl BlockTxBatch {
    pub fn is_complete(&self) -> bool {
        self.unprocessable_txs.is_empty()
    }
}
