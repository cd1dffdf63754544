//! Projection of decoded transactions into [`NormalizedTx`].
//!
//! Failed transactions (non-zero code) keep their fees and signers but carry
//! no messages or per-message logs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bigdecimal::Zero;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{proto, MessageDecoder};
use crate::domain::errors::DecodeError;
use crate::domain::models::chain::{AbciMessageLog, SearchTx, SearchTxResponse};
use crate::domain::models::{
    AuthInfoSummary, Block, BlockResults, Coin, DecodedMessageRecord, Fee, FeeInfo, MessageEvent,
    MessageLog, MessagePayload, NormalizedTx, PublicKeyBytes, RawEvent, SignerInfoSummary,
    TxExecResult, TxSearchResponse,
};

/// Uppercase hex SHA-256 of the raw tx bytes
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(tx_bytes))
}

fn to_message_events(events: &[RawEvent]) -> Vec<MessageEvent> {
    events
        .iter()
        .map(|e| MessageEvent {
            event_type: e.event_type.clone(),
            attributes: e.attributes.clone(),
        })
        .collect()
}

fn from_abci_logs(logs: &[AbciMessageLog]) -> Vec<MessageLog> {
    logs.iter()
        .map(|log| MessageLog {
            msg_index: log.msg_index.max(0) as usize,
            log: log.log.clone(),
            events: to_message_events(&log.events),
        })
        .collect()
}

/// Group tx events by their `msg_index` attribute. Events without one belong
/// to the tx as a whole (fees, signatures) and are left out.
fn group_events_by_msg_index(events: &[RawEvent], message_count: usize) -> Vec<MessageLog> {
    let mut logs: Vec<MessageLog> = (0..message_count)
        .map(|msg_index| MessageLog {
            msg_index,
            ..MessageLog::default()
        })
        .collect();

    for event in events {
        let Some(index) = event
            .attribute("msg_index")
            .and_then(|v| v.parse::<usize>().ok())
        else {
            continue;
        };
        if let Some(log) = logs.get_mut(index) {
            log.events.push(MessageEvent {
                event_type: event.event_type.clone(),
                attributes: event.attributes.clone(),
            });
        }
    }

    logs
}

/// Per-message logs of a successful transaction.
///
/// Older nodes put a JSON array in the raw log; newer ones leave it empty and
/// tag each event with `msg_index`.
pub fn message_logs(
    code: u32,
    raw_log: &str,
    events: &[RawEvent],
    message_count: usize,
) -> Result<Vec<MessageLog>, DecodeError> {
    if code != 0 {
        return Ok(Vec::new());
    }

    let trimmed = raw_log.trim();
    if trimmed.starts_with('[') {
        let logs: Vec<AbciMessageLog> = serde_json::from_str(trimmed)
            .map_err(|e| DecodeError::InvalidLogs(e.to_string()))?;
        return Ok(from_abci_logs(&logs));
    }

    Ok(group_events_by_msg_index(events, message_count))
}

/// Fee entries of a transaction, zero amounts excluded.
///
/// The payer is the explicit fee payer, otherwise the first signer. A fee
/// whose payer cannot be resolved is kept with an empty payer.
pub fn collect_fees(fee: &FeeInfo, signers: &[String]) -> Vec<Fee> {
    let payer = if !fee.payer.is_empty() {
        fee.payer.clone()
    } else {
        signers.first().cloned().unwrap_or_default()
    };

    fee.amount
        .iter()
        .filter(|coin| !coin.amount.is_zero())
        .map(|coin| Fee {
            amount: coin.amount.clone(),
            denomination: coin.denom.clone(),
            payer_address: payer.clone(),
        })
        .collect()
}

/// Signer addresses in order, fee payer last if not already present
fn collect_signers(signer_addresses: Vec<String>, fee_payer: &str) -> Vec<String> {
    let mut signers: Vec<String> = Vec::with_capacity(signer_addresses.len() + 1);
    for address in signer_addresses
        .into_iter()
        .chain((!fee_payer.is_empty()).then(|| fee_payer.to_string()))
    {
        if !signers.contains(&address) {
            signers.push(address);
        }
    }
    signers
}

fn attach_events(messages: &mut [DecodedMessageRecord], logs: &[MessageLog]) {
    for message in messages.iter_mut() {
        if let Some(log) = logs.iter().find(|l| l.msg_index == message.message_index) {
            message.events = log.events.clone();
        }
    }
}

fn json_key(value: &Value) -> Option<(String, String)> {
    let type_url = value.get("@type")?.as_str()?.to_string();
    let key = value.get("key")?.as_str()?.to_string();
    Some((type_url, key))
}

fn json_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn json_str(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl MessageDecoder {
    fn signer_addresses(&self, auth_info: &AuthInfoSummary) -> Result<Vec<String>, DecodeError> {
        let mut addresses = Vec::new();
        for signer_info in &auth_info.signer_infos {
            for key in &signer_info.public_keys {
                addresses.push(self.resolver().resolve_bytes(&key.key, key.type_hint())?);
            }
        }
        Ok(addresses)
    }

    /// Normalize one raw block transaction with its execution result
    pub fn normalize_block_tx(
        &self,
        block: &Block,
        tx_bytes: &[u8],
        exec: &TxExecResult,
    ) -> Result<NormalizedTx, DecodeError> {
        let decoded = self.decode_raw(tx_bytes)?;

        let signers = collect_signers(
            self.signer_addresses(&decoded.auth_info)?,
            &decoded.auth_info.fee.payer,
        );
        let fees = collect_fees(&decoded.auth_info.fee, &signers);

        let (messages, per_message_logs) = if exec.code == 0 {
            let logs = message_logs(exec.code, &exec.log, &exec.events, decoded.messages.len())?;
            let mut messages: Vec<DecodedMessageRecord> = decoded
                .messages
                .into_iter()
                .enumerate()
                .map(|(message_index, (type_url, value))| DecodedMessageRecord {
                    message_index,
                    type_url,
                    payload: MessagePayload::Raw(value),
                    events: Vec::new(),
                })
                .collect();
            attach_events(&mut messages, &logs);
            (messages, logs)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(NormalizedTx {
            hash: tx_hash(tx_bytes),
            height: block.height,
            timestamp: block.time,
            code: exec.code,
            codespace: exec.codespace.clone(),
            raw_log: exec.log.clone(),
            gas_wanted: exec.gas_wanted,
            gas_used: exec.gas_used,
            memo: decoded.memo,
            timeout_height: decoded.timeout_height,
            messages,
            signers,
            auth_info: decoded.auth_info,
            per_message_logs,
            fees,
            relevant_data: Vec::new(),
            dropped_extension_options: decoded.dropped_extension_options,
            decoded_with_fallback: decoded.used_fallback,
        })
    }

    /// Normalize every transaction of a block from its raw bytes
    pub fn normalize_block_txs(
        &self,
        block: &Block,
        results: &BlockResults,
    ) -> Vec<Result<NormalizedTx, DecodeError>> {
        block
            .txs
            .iter()
            .enumerate()
            .map(|(index, tx_bytes)| {
                let exec = results.txs_results.get(index).ok_or_else(|| {
                    DecodeError::InvalidEnvelope(format!(
                        "no execution result for tx {} at height {}",
                        index, block.height
                    ))
                })?;
                self.normalize_block_tx(block, tx_bytes, exec)
            })
            .collect()
    }

    fn json_auth_info(
        &self,
        auth_info: &Value,
    ) -> Result<(AuthInfoSummary, Vec<String>), DecodeError> {
        let mut signer_infos = Vec::new();
        let mut addresses = Vec::new();

        let infos = auth_info
            .get("signer_infos")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for info in infos {
            let public_key = info.get("public_key").unwrap_or(&Value::Null);
            let key_type_url = json_str(public_key.get("@type"));

            let keys: Vec<(String, String)> = if key_type_url == proto::MULTISIG_PUBKEY_URL {
                public_key
                    .get("public_keys")
                    .and_then(Value::as_array)
                    .map(|keys| keys.iter().filter_map(json_key).collect())
                    .unwrap_or_default()
            } else {
                json_key(public_key).into_iter().collect()
            };

            let mut public_keys = Vec::with_capacity(keys.len());
            for (type_url, key) in keys {
                let key_bytes = PublicKeyBytes {
                    type_url,
                    key: BASE64.decode(&key).unwrap_or_default(),
                };
                addresses.push(self.resolver().resolve(&key, key_bytes.type_hint())?);
                public_keys.push(key_bytes);
            }

            signer_infos.push(SignerInfoSummary {
                key_type_url,
                public_keys,
                sequence: json_u64(info.get("sequence")),
            });
        }

        let fee_json = auth_info.get("fee").unwrap_or(&Value::Null);
        let amount = fee_json
            .get("amount")
            .and_then(Value::as_array)
            .map(|coins| {
                coins
                    .iter()
                    .map(|c| {
                        Coin::from_parts(&json_str(c.get("amount")), &json_str(c.get("denom")))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        let fee = FeeInfo {
            amount,
            gas_limit: json_u64(fee_json.get("gas_limit")),
            payer: json_str(fee_json.get("payer")),
            granter: json_str(fee_json.get("granter")),
        };

        Ok((AuthInfoSummary { signer_infos, fee }, addresses))
    }

    /// Normalize one transaction of the tx search response
    pub fn normalize_search_tx(
        &self,
        block: &Block,
        tx: &SearchTx,
        response: &SearchTxResponse,
    ) -> Result<NormalizedTx, DecodeError> {
        let (auth_info, signer_addresses) = self.json_auth_info(&tx.auth_info)?;
        let signers = collect_signers(signer_addresses, &auth_info.fee.payer);
        let fees = collect_fees(&auth_info.fee, &signers);

        let (messages, per_message_logs) = if response.code == 0 {
            let logs = if response.logs.is_empty() {
                message_logs(
                    response.code,
                    &response.raw_log,
                    &response.events,
                    tx.body.messages.len(),
                )?
            } else {
                from_abci_logs(&response.logs)
            };

            let mut messages = tx
                .body
                .messages
                .iter()
                .enumerate()
                .map(|(message_index, message)| {
                    let type_url = message
                        .get("@type")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            DecodeError::UnknownMessageType(format!(
                                "message {} of {} has no @type",
                                message_index, response.txhash
                            ))
                        })?;
                    Ok(DecodedMessageRecord {
                        message_index,
                        type_url: type_url.to_string(),
                        payload: MessagePayload::Json(message.clone()),
                        events: Vec::new(),
                    })
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            attach_events(&mut messages, &logs);
            (messages, logs)
        } else {
            (Vec::new(), Vec::new())
        };

        let timestamp = DateTime::parse_from_rfc3339(&response.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(block.time);

        Ok(NormalizedTx {
            hash: response.txhash.to_uppercase(),
            height: if response.height > 0 {
                response.height
            } else {
                block.height
            },
            timestamp,
            code: response.code,
            codespace: response.codespace.clone(),
            raw_log: response.raw_log.clone(),
            gas_wanted: response.gas_wanted,
            gas_used: response.gas_used,
            memo: tx.body.memo.clone(),
            timeout_height: tx.body.timeout_height.max(0) as u64,
            messages,
            signers,
            auth_info,
            per_message_logs,
            fees,
            relevant_data: Vec::new(),
            dropped_extension_options: Vec::new(),
            decoded_with_fallback: false,
        })
    }

    /// Normalize every transaction of a tx search response
    pub fn normalize_search_response(
        &self,
        block: &Block,
        response: &TxSearchResponse,
    ) -> Vec<Result<NormalizedTx, DecodeError>> {
        if response.txs.len() != response.tx_responses.len() {
            return vec![Err(DecodeError::InvalidEnvelope(format!(
                "tx search at height {} returned {} txs but {} responses",
                block.height,
                response.txs.len(),
                response.tx_responses.len()
            )))];
        }

        response
            .txs
            .iter()
            .zip(&response.tx_responses)
            .map(|(tx, tx_response)| self.normalize_search_tx(block, tx, tx_response))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Attribute;
    use crate::domain::services::tx_decoder::tests::{
        auth_info_bytes, decoder, encode_tx, secp_key, send_msg, SEND_URL,
    };
    use chrono::TimeZone;
    use bigdecimal::BigDecimal;
    use serde_json::json;

    fn block() -> Block {
        Block {
            height: 10,
            hash: "ABCD".to_string(),
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            proposer_address: "PROPOSER".to_string(),
            txs: Vec::new(),
        }
    }

    #[test]
    fn test_zero_fee_coins_are_excluded() {
        let fee = FeeInfo {
            amount: vec![
                Coin::new(BigDecimal::zero(), "uosmo"),
                Coin::new(BigDecimal::from(2500), "uatom"),
            ],
            gas_limit: 100,
            payer: String::new(),
            granter: String::new(),
        };
        let fees = collect_fees(&fee, &["cosmos1signer".to_string()]);

        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].denomination, "uatom");
        assert_eq!(fees[0].amount, BigDecimal::from(2500));
        assert_eq!(fees[0].payer_address, "cosmos1signer");
    }

    #[test]
    fn test_explicit_payer_wins() {
        let fee = FeeInfo {
            amount: vec![Coin::new(BigDecimal::from(1), "uatom")],
            payer: "cosmos1payer".to_string(),
            ..FeeInfo::default()
        };
        let fees = collect_fees(&fee, &["cosmos1signer".to_string()]);
        assert_eq!(fees[0].payer_address, "cosmos1payer");
    }

    #[test]
    fn test_signers_are_deduplicated_with_payer_last() {
        let signers = collect_signers(
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
            "c",
        );
        assert_eq!(signers, vec!["a", "b", "c"]);
        assert_eq!(collect_signers(vec!["a".to_string()], "a"), vec!["a"]);
    }

    #[test]
    fn test_logs_from_raw_log_json() {
        let raw_log = r#"[{"msg_index":0,"events":[{"type":"transfer","attributes":[{"key":"amount","value":"1uatom"}]}]}]"#;
        let logs = message_logs(0, raw_log, &[], 1).unwrap();
        assert_eq!(logs[0].events[0].event_type, "transfer");
        assert!(message_logs(0, "[not json", &[], 1).is_err());
        assert!(message_logs(5, "[not json", &[], 1).unwrap().is_empty());
    }

    #[test]
    fn test_logs_grouped_by_msg_index() {
        let events = vec![
            RawEvent::new("tx", vec![Attribute::new("fee", "5uatom")]),
            RawEvent::new(
                "transfer",
                vec![Attribute::new("amount", "1uatom"), Attribute::new("msg_index", "1")],
            ),
            RawEvent::new("message", vec![Attribute::new("msg_index", "0")]),
        ];
        let logs = message_logs(0, "", &events, 2).unwrap();

        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].events[0].event_type, "message");
        assert_eq!(logs[1].events[0].event_type, "transfer");
    }

    #[test]
    fn test_normalize_block_tx() {
        let decoder = decoder();
        let tx = encode_tx(vec![send_msg()], vec![], auth_info_bytes(vec![("0", "uosmo"), ("750", "uatom")]));
        let exec = TxExecResult {
            code: 0,
            log: r#"[{"msg_index":0,"events":[{"type":"transfer","attributes":[{"key":"recipient","value":"cosmos1x"}]}]}]"#.to_string(),
            gas_used: 90,
            gas_wanted: 100,
            ..TxExecResult::default()
        };

        let normalized = decoder.normalize_block_tx(&block(), &tx, &exec).unwrap();
        let signer = decoder.resolver().resolve_bytes(&secp_key(), "").unwrap();

        assert_eq!(normalized.hash, tx_hash(&tx));
        assert_eq!(normalized.hash, normalized.hash.to_uppercase());
        assert_eq!(normalized.height, 10);
        assert_eq!(normalized.messages[0].type_url, SEND_URL);
        assert_eq!(normalized.messages[0].events[0].event_type, "transfer");
        assert_eq!(normalized.signers, vec![signer.clone()]);
        assert_eq!(normalized.fees.len(), 1);
        assert_eq!(normalized.fees[0].payer_address, signer);
        assert!(!normalized.decoded_with_fallback);
    }

    #[test]
    fn test_failed_tx_keeps_fees_but_no_messages() {
        let decoder = decoder();
        let tx = encode_tx(vec![send_msg()], vec![], auth_info_bytes(vec![("750", "uatom")]));
        let exec = TxExecResult {
            code: 11,
            log: "out of gas".to_string(),
            ..TxExecResult::default()
        };

        let normalized = decoder.normalize_block_tx(&block(), &tx, &exec).unwrap();
        assert!(!normalized.succeeded());
        assert!(normalized.messages.is_empty());
        assert!(normalized.per_message_logs.is_empty());
        assert_eq!(normalized.fees.len(), 1);
    }

    #[test]
    fn test_normalize_search_response() {
        let decoder = decoder();
        let key_b64 = BASE64.encode(secp_key());
        let tx: SearchTx = serde_json::from_value(json!({
            "body": {
                "messages": [{"@type": SEND_URL, "from_address": "cosmos1a", "to_address": "cosmos1b", "amount": []}],
                "memo": "memo",
                "timeout_height": "0"
            },
            "auth_info": {
                "signer_infos": [{"public_key": {"@type": "/cosmos.crypto.secp256k1.PubKey", "key": key_b64}, "sequence": "3"}],
                "fee": {"amount": [{"denom": "uatom", "amount": "1000"}], "gas_limit": "200000", "payer": "", "granter": ""}
            },
            "signatures": []
        }))
        .unwrap();
        let response: SearchTxResponse = serde_json::from_value(json!({
            "height": "10",
            "txhash": "abcdef",
            "code": 0,
            "raw_log": "",
            "logs": [],
            "gas_wanted": "200000",
            "gas_used": "100000",
            "timestamp": "2024-01-02T03:04:05Z",
            "events": [{"type": "transfer", "attributes": [{"key": "msg_index", "value": "0"}]}]
        }))
        .unwrap();
        let search = TxSearchResponse {
            txs: vec![tx],
            tx_responses: vec![response],
            total: 1,
        };

        let results = decoder.normalize_search_response(&block(), &search);
        let normalized = results[0].as_ref().unwrap();

        assert_eq!(normalized.hash, "ABCDEF");
        assert_eq!(normalized.auth_info.signer_infos[0].sequence, 3);
        assert_eq!(normalized.messages[0].events[0].event_type, "transfer");
        assert_eq!(
            normalized.signers,
            vec![decoder.resolver().resolve_bytes(&secp_key(), "").unwrap()]
        );
        assert_eq!(normalized.fees[0].amount, BigDecimal::from(1000));
    }

    #[test]
    fn test_fee_without_payer_is_kept() {
        let fee = FeeInfo {
            amount: vec![Coin::new(BigDecimal::from(7), "uatom")],
            ..FeeInfo::default()
        };
        let fees = collect_fees(&fee, &[]);

        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].amount, BigDecimal::from(7));
        assert_eq!(fees[0].payer_address, "");
    }

    #[test]
    fn test_search_tx_with_null_public_key() {
        let decoder = decoder();
        let tx: SearchTx = serde_json::from_value(json!({
            "body": {"messages": [], "memo": "", "timeout_height": "0"},
            "auth_info": {
                "signer_infos": [{"public_key": null, "sequence": "0"}],
                "fee": {"amount": [{"denom": "uatom", "amount": "500"}], "gas_limit": "100000", "payer": "", "granter": ""}
            },
            "signatures": []
        }))
        .unwrap();
        let response: SearchTxResponse = serde_json::from_value(json!({
            "height": "10",
            "txhash": "ff00",
            "code": 0,
            "raw_log": "[]",
            "logs": [],
            "gas_wanted": "100000",
            "gas_used": "50000",
            "timestamp": "2024-01-02T03:04:05Z",
            "events": []
        }))
        .unwrap();

        let normalized = decoder.normalize_search_tx(&block(), &tx, &response).unwrap();

        assert!(normalized.signers.is_empty());
        assert_eq!(normalized.fees.len(), 1);
        assert_eq!(normalized.fees[0].amount, BigDecimal::from(500));
        assert_eq!(normalized.fees[0].payer_address, "");
    }
}
