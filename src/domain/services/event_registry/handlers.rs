//! Handlers shipped with the indexer

use std::sync::Arc;

use crate::domain::errors::EventHandlerError;
use crate::domain::models::{
    parse_coins, BlockLifecyclePosition, EventRelevantInformation, EventSource, RawEvent,
};

use super::{EventHandler, EventHandlerRegistry, HandlerFactory};

pub const COIN_RECEIVED_EVENT: &str = "coin_received";
pub const REWARDS_EVENT: &str = "rewards";
pub const COMMISSION_EVENT: &str = "commission";
pub const DISTRIBUTION_EVENT: &str = "distribution";
pub const EPOCH_START_EVENT: &str = "epoch_start";

/// Reads an address attribute and a coin list attribute off one event type
#[derive(Debug, Clone)]
pub struct AddressAmountHandler {
    event_type: &'static str,
    address_key: &'static str,
    source: EventSource,
    data: Vec<EventRelevantInformation>,
}

impl AddressAmountHandler {
    pub fn new(event_type: &'static str, address_key: &'static str, source: EventSource) -> Self {
        Self {
            event_type,
            address_key,
            source,
            data: Vec::new(),
        }
    }

    pub fn coin_received() -> Self {
        Self::new(COIN_RECEIVED_EVENT, "receiver", EventSource::CoinReceived)
    }

    pub fn validator_rewards() -> Self {
        Self::new(REWARDS_EVENT, "validator", EventSource::ValidatorRewards)
    }

    pub fn validator_commission() -> Self {
        Self::new(COMMISSION_EVENT, "validator", EventSource::ValidatorCommission)
    }

    pub fn epoch_distribution() -> Self {
        Self::new(DISTRIBUTION_EVENT, "receiver", EventSource::EpochRewardDistribution)
    }

    fn required<'a>(&self, event: &'a RawEvent, key: &str) -> Result<&'a str, EventHandlerError> {
        event
            .attribute(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EventHandlerError::MissingAttribute {
                event_type: self.event_type.to_string(),
                key: key.to_string(),
            })
    }
}

impl EventHandler for AddressAmountHandler {
    fn event_type(&self) -> &str {
        self.event_type
    }

    fn handle_event(&mut self, event_type: &str, event: &RawEvent) -> Result<(), EventHandlerError> {
        if event_type != self.event_type {
            return Err(EventHandlerError::InvalidAttribute {
                event_type: event_type.to_string(),
                message: format!("handler expects {}", self.event_type),
            });
        }

        let address = self.required(event, self.address_key)?.to_string();
        // Zero DecCoins are emitted as an empty amount
        let amount = event.attribute("amount").unwrap_or_default();
        let coins = parse_coins(amount).map_err(|e| EventHandlerError::InvalidAttribute {
            event_type: event_type.to_string(),
            message: e.to_string(),
        })?;

        // DecCoins are truncated to whole base units
        self.data = coins
            .into_iter()
            .map(|coin| EventRelevantInformation {
                address: address.clone(),
                amount: coin.amount.with_scale(0),
                denomination: coin.denom,
                event_source: self.source,
            })
            .collect();
        Ok(())
    }

    fn parse_relevant_data(&self) -> Vec<EventRelevantInformation> {
        self.data.clone()
    }
}

fn factory(build: fn() -> AddressAmountHandler) -> HandlerFactory {
    Arc::new(move || Box::new(build()) as Box<dyn EventHandler>)
}

/// Register the chain-agnostic reward and transfer handlers
pub fn register_generic_handlers(registry: &mut EventHandlerRegistry) -> Result<(), EventHandlerError> {
    for position in [BlockLifecyclePosition::BeginBlock, BlockLifecyclePosition::EndBlock] {
        registry.register_generic(
            position,
            COIN_RECEIVED_EVENT,
            "generic-coin-received",
            factory(AddressAmountHandler::coin_received),
        )?;
    }
    registry.register_generic(
        BlockLifecyclePosition::BeginBlock,
        REWARDS_EVENT,
        "generic-validator-rewards",
        factory(AddressAmountHandler::validator_rewards),
    )?;
    registry.register_generic(
        BlockLifecyclePosition::BeginBlock,
        COMMISSION_EVENT,
        "generic-validator-commission",
        factory(AddressAmountHandler::validator_commission),
    )?;
    Ok(())
}

/// Register reward distribution handlers for one epoch identifier
pub fn register_epoch_reward_handlers(
    registry: &mut EventHandlerRegistry,
    epoch_identifier: &str,
) -> Result<(), EventHandlerError> {
    registry.register_epoch_handler(
        epoch_identifier,
        BlockLifecyclePosition::BeginBlock,
        DISTRIBUTION_EVENT,
        "epoch-reward-distribution",
        factory(AddressAmountHandler::epoch_distribution),
    )
}

/// True when the begin block events open a new epoch
pub fn starts_epoch(begin_block_events: &[RawEvent], epoch_identifier: &str) -> bool {
    begin_block_events.iter().any(|event| {
        event.event_type == EPOCH_START_EVENT
            && event
                .attribute("epoch_id")
                .map_or(true, |id| id == epoch_identifier)
    })
}
