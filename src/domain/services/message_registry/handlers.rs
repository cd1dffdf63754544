//! Bank and distribution message handlers

use bigdecimal::{BigDecimal, Zero};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::errors::MessageHandlerError;
use crate::domain::models::{
    parse_coins, DecodedMessageRecord, MessageEvent, MessagePayload, MessageRelevantInformation,
};
use crate::domain::services::tx_decoder::proto;

use super::{MessageHandler, MessageHandlerFactory, MessageHandlerRegistry};

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_MULTI_SEND: &str = "/cosmos.bank.v1beta1.MsgMultiSend";
pub const MSG_WITHDRAW_DELEGATOR_REWARD: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const MSG_WITHDRAW_VALIDATOR_COMMISSION: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission";

const TRANSFER_EVENT: &str = "transfer";
const COIN_RECEIVED_EVENT: &str = "coin_received";
const WITHDRAW_REWARDS_EVENT: &str = "withdraw_rewards";
const WITHDRAW_COMMISSION_EVENT: &str = "withdraw_commission";

/// Decode the payload from protobuf bytes or from the node's JSON
fn read_payload<M>(message: &DecodedMessageRecord) -> Result<M, MessageHandlerError>
where
    M: prost::Message + Default + DeserializeOwned,
{
    let decoded = match &message.payload {
        MessagePayload::Raw(bytes) => M::decode(bytes.as_slice()).map_err(|e| e.to_string()),
        MessagePayload::Json(value) => {
            serde_json::from_value(value.clone()).map_err(|e| e.to_string())
        }
    };
    decoded.map_err(|reason| MessageHandlerError::InvalidPayload {
        type_url: message.type_url.clone(),
        message: reason,
    })
}

/// Non-zero (amount, denom) pairs of a coin list
fn message_coins(
    type_url: &str,
    coins: &[proto::Coin],
) -> Result<Vec<(BigDecimal, String)>, MessageHandlerError> {
    let mut parsed = Vec::with_capacity(coins.len());
    for coin in coins {
        let amount =
            BigDecimal::from_str(&coin.amount).map_err(|e| MessageHandlerError::InvalidPayload {
                type_url: type_url.to_string(),
                message: format!("amount {:?} of {}: {}", coin.amount, coin.denom, e),
            })?;
        if !amount.is_zero() {
            parsed.push((amount, coin.denom.clone()));
        }
    }
    Ok(parsed)
}

fn event<'a>(message: &'a DecodedMessageRecord, event_type: &str) -> Option<&'a MessageEvent> {
    message.events.iter().find(|e| e.event_type == event_type)
}

/// Coins of a log attribute, truncated to whole base units. Absent or empty
/// attributes are no coins.
fn log_coins(
    type_url: &str,
    event: &MessageEvent,
) -> Result<Vec<(BigDecimal, String)>, MessageHandlerError> {
    let coins = parse_coins(event.attribute("amount").unwrap_or_default()).map_err(|e| {
        MessageHandlerError::InvalidLog {
            type_url: type_url.to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(coins
        .into_iter()
        .map(|coin| (coin.amount.with_scale(0), coin.denom))
        .filter(|(amount, _)| !amount.is_zero())
        .collect())
}

fn relevant_data(
    message: &DecodedMessageRecord,
    sender: &str,
    receiver: &str,
    coins: Vec<(BigDecimal, String)>,
) -> Vec<MessageRelevantInformation> {
    coins
        .into_iter()
        .map(|(amount, denomination)| MessageRelevantInformation {
            message_index: message.message_index,
            type_url: message.type_url.clone(),
            sender_address: sender.to_string(),
            receiver_address: receiver.to_string(),
            amount,
            denomination,
        })
        .collect()
}

/// `MsgSend`: one entry per coin sent
#[derive(Debug, Default)]
pub struct BankSendHandler {
    data: Vec<MessageRelevantInformation>,
}

impl MessageHandler for BankSendHandler {
    fn type_url(&self) -> &str {
        MSG_SEND
    }

    fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError> {
        let msg: proto::MsgSend = read_payload(message)?;

        let recipient = event(message, TRANSFER_EVENT).and_then(|e| e.attribute("recipient"));
        if let Some(recipient) = recipient {
            if !recipient.eq_ignore_ascii_case(&msg.to_address) {
                return Err(MessageHandlerError::InvalidLog {
                    type_url: message.type_url.clone(),
                    message: format!(
                        "transfer recipient {} does not match {}",
                        recipient, msg.to_address
                    ),
                });
            }
        }

        let coins = message_coins(&message.type_url, &msg.amount)?;
        self.data = relevant_data(message, &msg.from_address, &msg.to_address, coins);
        Ok(())
    }

    fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation> {
        self.data.clone()
    }
}

/// `MsgMultiSend`: one entry per output coin. The sender is only known when
/// the message has a single input.
#[derive(Debug, Default)]
pub struct BankMultiSendHandler {
    data: Vec<MessageRelevantInformation>,
}

impl BankMultiSendHandler {
    fn totals(
        type_url: &str,
        entries: &[proto::AddressCoins],
    ) -> Result<BTreeMap<String, BigDecimal>, MessageHandlerError> {
        let mut totals: BTreeMap<String, BigDecimal> = BTreeMap::new();
        for entry in entries {
            for (amount, denom) in message_coins(type_url, &entry.coins)? {
                *totals.entry(denom).or_insert_with(BigDecimal::zero) += amount;
            }
        }
        Ok(totals)
    }
}

impl MessageHandler for BankMultiSendHandler {
    fn type_url(&self) -> &str {
        MSG_MULTI_SEND
    }

    fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError> {
        let msg: proto::MsgMultiSend = read_payload(message)?;

        let sent = Self::totals(&message.type_url, &msg.inputs)?;
        let received = Self::totals(&message.type_url, &msg.outputs)?;
        if sent != received {
            return Err(MessageHandlerError::InvalidPayload {
                type_url: message.type_url.clone(),
                message: format!("inputs {:?} do not match outputs {:?}", sent, received),
            });
        }

        let sender = match msg.inputs.as_slice() {
            [input] => input.address.as_str(),
            _ => "",
        };
        let mut data = Vec::new();
        for output in &msg.outputs {
            let coins = message_coins(&message.type_url, &output.coins)?;
            data.extend(relevant_data(message, sender, &output.address, coins));
        }
        self.data = data;
        Ok(())
    }

    fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation> {
        self.data.clone()
    }
}

/// `MsgWithdrawDelegatorReward`: rewards paid out to the withdraw address
#[derive(Debug, Default)]
pub struct WithdrawDelegatorRewardHandler {
    data: Vec<MessageRelevantInformation>,
}

impl MessageHandler for WithdrawDelegatorRewardHandler {
    fn type_url(&self) -> &str {
        MSG_WITHDRAW_DELEGATOR_REWARD
    }

    fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError> {
        let msg: proto::MsgWithdrawDelegatorReward = read_payload(message)?;
        let transfer = event(message, TRANSFER_EVENT);

        // The withdraw address may differ from the delegator
        let receiver = transfer
            .and_then(|e| e.attribute("recipient"))
            .unwrap_or(msg.delegator_address.as_str());
        let coins = match event(message, WITHDRAW_REWARDS_EVENT).or(transfer) {
            Some(source) => log_coins(&message.type_url, source)?,
            // Nothing was paid out
            None => Vec::new(),
        };

        self.data = relevant_data(message, "", receiver, coins);
        Ok(())
    }

    fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation> {
        self.data.clone()
    }
}

/// `MsgWithdrawValidatorCommission`: commission paid to the operator's
/// withdraw address
#[derive(Debug, Default)]
pub struct WithdrawValidatorCommissionHandler {
    data: Vec<MessageRelevantInformation>,
}

impl MessageHandler for WithdrawValidatorCommissionHandler {
    fn type_url(&self) -> &str {
        MSG_WITHDRAW_VALIDATOR_COMMISSION
    }

    fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError> {
        let msg: proto::MsgWithdrawValidatorCommission = read_payload(message)?;

        let payout = event(message, COIN_RECEIVED_EVENT)
            .and_then(|e| e.attribute("receiver").map(|receiver| (receiver, e)))
            .or_else(|| {
                event(message, TRANSFER_EVENT)
                    .and_then(|e| e.attribute("recipient").map(|recipient| (recipient, e)))
            });
        let withdrawn = event(message, WITHDRAW_COMMISSION_EVENT);

        let (receiver, coins) = match (payout, withdrawn) {
            (Some((receiver, _)), Some(withdrawn)) => {
                (receiver, log_coins(&message.type_url, withdrawn)?)
            }
            (Some((receiver, source)), None) => (receiver, log_coins(&message.type_url, source)?),
            (None, Some(withdrawn)) => {
                let coins = log_coins(&message.type_url, withdrawn)?;
                // An empty withdrawal moves nothing and names no receiver
                if !coins.is_empty() {
                    return Err(MessageHandlerError::InvalidLog {
                        type_url: message.type_url.clone(),
                        message: format!(
                            "commission of {} withdrawn without a receiver",
                            msg.validator_address
                        ),
                    });
                }
                ("", coins)
            }
            (None, None) => {
                return Err(MessageHandlerError::InvalidLog {
                    type_url: message.type_url.clone(),
                    message: "no commission withdrawal events".to_string(),
                })
            }
        };

        self.data = relevant_data(message, "", receiver, coins);
        Ok(())
    }

    fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation> {
        self.data.clone()
    }
}

fn factory<H>() -> MessageHandlerFactory
where
    H: MessageHandler + Default + 'static,
{
    Arc::new(|| Box::new(H::default()) as Box<dyn MessageHandler>)
}

/// Register the chain-agnostic bank and distribution handlers
pub fn register_generic_message_handlers(
    registry: &mut MessageHandlerRegistry,
) -> Result<(), MessageHandlerError> {
    registry.register_generic(MSG_SEND, "generic-bank-send", factory::<BankSendHandler>())?;
    registry.register_generic(
        MSG_MULTI_SEND,
        "generic-bank-multi-send",
        factory::<BankMultiSendHandler>(),
    )?;
    registry.register_generic(
        MSG_WITHDRAW_DELEGATOR_REWARD,
        "generic-withdraw-delegator-reward",
        factory::<WithdrawDelegatorRewardHandler>(),
    )?;
    registry.register_generic(
        MSG_WITHDRAW_VALIDATOR_COMMISSION,
        "generic-withdraw-validator-commission",
        factory::<WithdrawValidatorCommissionHandler>(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Attribute;
    use prost::Message;
    use serde_json::json;

    fn record(type_url: &str, payload: MessagePayload, events: Vec<MessageEvent>) -> DecodedMessageRecord {
        DecodedMessageRecord {
            message_index: 0,
            type_url: type_url.to_string(),
            payload,
            events,
        }
    }

    fn log_event(event_type: &str, attributes: &[(&str, &str)]) -> MessageEvent {
        MessageEvent {
            event_type: event_type.to_string(),
            attributes: attributes
                .iter()
                .map(|(key, value)| Attribute::new(*key, *value))
                .collect(),
        }
    }

    fn coin(amount: &str, denom: &str) -> proto::Coin {
        proto::Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }

    #[test]
    fn test_send_from_protobuf_keeps_large_amounts() {
        let msg = proto::MsgSend {
            from_address: "cosmos1from".to_string(),
            to_address: "cosmos1to".to_string(),
            amount: vec![
                coin("123456789012345678901234567890", "aevmos"),
                coin("0", "uatom"),
            ],
        };
        let message = record(
            MSG_SEND,
            MessagePayload::Raw(msg.encode_to_vec()),
            vec![log_event(TRANSFER_EVENT, &[("recipient", "cosmos1to")])],
        );

        let mut handler = BankSendHandler::default();
        handler.handle_msg(&message).unwrap();
        let data = handler.parse_relevant_data();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].sender_address, "cosmos1from");
        assert_eq!(data[0].receiver_address, "cosmos1to");
        assert_eq!(
            data[0].amount,
            BigDecimal::from_str("123456789012345678901234567890").unwrap()
        );
        assert_eq!(data[0].denomination, "aevmos");
    }

    #[test]
    fn test_send_from_search_json() {
        let payload = json!({
            "@type": MSG_SEND,
            "from_address": "cosmos1from",
            "to_address": "cosmos1to",
            "amount": [{"denom": "uatom", "amount": "2500"}]
        });
        let message = record(MSG_SEND, MessagePayload::Json(payload), Vec::new());

        let mut handler = BankSendHandler::default();
        handler.handle_msg(&message).unwrap();
        let data = handler.parse_relevant_data();
        assert_eq!(data[0].amount, BigDecimal::from(2500));
        assert_eq!(data[0].type_url, MSG_SEND);
    }

    #[test]
    fn test_send_with_mismatched_recipient_is_refused() {
        let msg = proto::MsgSend {
            from_address: "cosmos1from".to_string(),
            to_address: "cosmos1to".to_string(),
            amount: vec![coin("5", "uatom")],
        };
        let message = record(
            MSG_SEND,
            MessagePayload::Raw(msg.encode_to_vec()),
            vec![log_event(TRANSFER_EVENT, &[("recipient", "cosmos1other")])],
        );

        let mut handler = BankSendHandler::default();
        assert!(matches!(
            handler.handle_msg(&message),
            Err(MessageHandlerError::InvalidLog { .. })
        ));
    }

    #[test]
    fn test_multi_send_pairs_single_input_with_outputs() {
        let msg = proto::MsgMultiSend {
            inputs: vec![proto::AddressCoins {
                address: "cosmos1from".to_string(),
                coins: vec![coin("30", "uatom")],
            }],
            outputs: vec![
                proto::AddressCoins {
                    address: "cosmos1a".to_string(),
                    coins: vec![coin("10", "uatom")],
                },
                proto::AddressCoins {
                    address: "cosmos1b".to_string(),
                    coins: vec![coin("20", "uatom")],
                },
            ],
        };
        let message = record(MSG_MULTI_SEND, MessagePayload::Raw(msg.encode_to_vec()), Vec::new());

        let mut handler = BankMultiSendHandler::default();
        handler.handle_msg(&message).unwrap();
        let data = handler.parse_relevant_data();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|d| d.sender_address == "cosmos1from"));
        assert_eq!(data[1].receiver_address, "cosmos1b");
        assert_eq!(data[1].amount, BigDecimal::from(20));
    }

    #[test]
    fn test_multi_send_with_unbalanced_totals_is_refused() {
        let payload = json!({
            "inputs": [{"address": "cosmos1from", "coins": [{"denom": "uatom", "amount": "30"}]}],
            "outputs": [{"address": "cosmos1a", "coins": [{"denom": "uatom", "amount": "29"}]}]
        });
        let message = record(MSG_MULTI_SEND, MessagePayload::Json(payload), Vec::new());

        let mut handler = BankMultiSendHandler::default();
        assert!(matches!(
            handler.handle_msg(&message),
            Err(MessageHandlerError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_withdraw_reward_reads_withdraw_rewards_event() {
        let payload = json!({
            "delegator_address": "cosmos1delegator",
            "validator_address": "cosmosvaloper1val"
        });
        let message = record(
            MSG_WITHDRAW_DELEGATOR_REWARD,
            MessagePayload::Json(payload),
            vec![
                log_event(
                    TRANSFER_EVENT,
                    &[("recipient", "cosmos1withdraw"), ("amount", "999uatom")],
                ),
                log_event(
                    WITHDRAW_REWARDS_EVENT,
                    &[("amount", "1500uatom,3uosmo"), ("validator", "cosmosvaloper1val")],
                ),
            ],
        );

        let mut handler = WithdrawDelegatorRewardHandler::default();
        handler.handle_msg(&message).unwrap();
        let data = handler.parse_relevant_data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].receiver_address, "cosmos1withdraw");
        assert_eq!(data[0].amount, BigDecimal::from(1500));
        assert_eq!(data[1].denomination, "uosmo");
        assert!(data[0].sender_address.is_empty());
    }

    #[test]
    fn test_withdraw_reward_without_payout_is_empty() {
        let payload = json!({
            "delegator_address": "cosmos1delegator",
            "validator_address": "cosmosvaloper1val"
        });
        let message = record(
            MSG_WITHDRAW_DELEGATOR_REWARD,
            MessagePayload::Json(payload),
            vec![log_event(
                WITHDRAW_REWARDS_EVENT,
                &[("amount", ""), ("validator", "cosmosvaloper1val")],
            )],
        );

        let mut handler = WithdrawDelegatorRewardHandler::default();
        handler.handle_msg(&message).unwrap();
        assert!(handler.parse_relevant_data().is_empty());
    }

    #[test]
    fn test_withdraw_commission_reads_withdraw_commission_event() {
        let msg = proto::MsgWithdrawValidatorCommission {
            validator_address: "cosmosvaloper1val".to_string(),
        };
        let message = record(
            MSG_WITHDRAW_VALIDATOR_COMMISSION,
            MessagePayload::Raw(msg.encode_to_vec()),
            vec![
                log_event(
                    COIN_RECEIVED_EVENT,
                    &[("receiver", "cosmos1operator"), ("amount", "77uatom")],
                ),
                log_event(WITHDRAW_COMMISSION_EVENT, &[("amount", "77uatom")]),
            ],
        );

        let mut handler = WithdrawValidatorCommissionHandler::default();
        handler.handle_msg(&message).unwrap();
        let data = handler.parse_relevant_data();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].receiver_address, "cosmos1operator");
        assert_eq!(data[0].amount, BigDecimal::from(77));
    }

    #[test]
    fn test_withdraw_commission_edge_cases() {
        let payload = MessagePayload::Json(json!({"validator_address": "cosmosvaloper1val"}));

        let empty = record(
            MSG_WITHDRAW_VALIDATOR_COMMISSION,
            payload.clone(),
            vec![log_event(WITHDRAW_COMMISSION_EVENT, &[("amount", "")])],
        );
        let mut handler = WithdrawValidatorCommissionHandler::default();
        handler.handle_msg(&empty).unwrap();
        assert!(handler.parse_relevant_data().is_empty());

        let no_receiver = record(
            MSG_WITHDRAW_VALIDATOR_COMMISSION,
            payload.clone(),
            vec![log_event(WITHDRAW_COMMISSION_EVENT, &[("amount", "5uatom")])],
        );
        assert!(WithdrawValidatorCommissionHandler::default()
            .handle_msg(&no_receiver)
            .is_err());

        let no_events = record(MSG_WITHDRAW_VALIDATOR_COMMISSION, payload, Vec::new());
        assert!(WithdrawValidatorCommissionHandler::default()
            .handle_msg(&no_events)
            .is_err());
    }

    #[test]
    fn test_generic_registration_covers_bank_and_distribution() {
        let mut registry = MessageHandlerRegistry::new();
        register_generic_message_handlers(&mut registry).unwrap();

        for type_url in [
            MSG_SEND,
            MSG_MULTI_SEND,
            MSG_WITHDRAW_DELEGATOR_REWARD,
            MSG_WITHDRAW_VALIDATOR_COMMISSION,
        ] {
            assert_eq!(registry.handler_ids(type_url).len(), 1, "{}", type_url);
        }
    }
}
