//! Message type and block event filters.
//!
//! Filters come from a JSON file:
//!
//! ```json
//! {
//!   "begin_block_filters": [{"type": "event_type", "event_type": "rewards", "inclusive": true}],
//!   "end_block_filters": [],
//!   "message_type_filters": [{"type": "message_type", "message_type": "/cosmos.bank.v1beta1.MsgSend"}]
//! }
//! ```
//!
//! An empty filter list lets everything through. Otherwise the list is an
//! allow list: a message is kept when any message type filter matches it and
//! a block event is kept when the last filter matching it is inclusive.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::domain::errors::ConfigError;
use crate::domain::models::{BlockEventRecord, BlockLifecyclePosition, DecodedMessageRecord};

/// Filter matching one block event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockEventFilter {
    EventType {
        event_type: String,
        #[serde(default)]
        inclusive: bool,
    },
    EventTypeAndAttributeValue {
        event_type: String,
        attribute_key: String,
        attribute_value: String,
        #[serde(default)]
        inclusive: bool,
    },
    /// Consecutive events matching `subfilters` in order
    RollingWindow {
        subfilters: Vec<BlockEventFilter>,
        #[serde(default)]
        inclusive: bool,
    },
}

impl BlockEventFilter {
    fn inclusive(&self) -> bool {
        match self {
            BlockEventFilter::EventType { inclusive, .. }
            | BlockEventFilter::EventTypeAndAttributeValue { inclusive, .. }
            | BlockEventFilter::RollingWindow { inclusive, .. } => *inclusive,
        }
    }

    /// Events covered by the filter when the window starts at `events[0]`
    fn window_len(&self) -> usize {
        match self {
            BlockEventFilter::RollingWindow { subfilters, .. } => subfilters.len(),
            _ => 1,
        }
    }

    fn matches_event(&self, event: &BlockEventRecord) -> bool {
        match self {
            BlockEventFilter::EventType { event_type, .. } => event.event_type == *event_type,
            BlockEventFilter::EventTypeAndAttributeValue {
                event_type,
                attribute_key,
                attribute_value,
                ..
            } => {
                event.event_type == *event_type
                    && event
                        .attributes
                        .iter()
                        .any(|a| a.key == *attribute_key && a.value == *attribute_value)
            }
            BlockEventFilter::RollingWindow { .. } => false,
        }
    }

    fn matches_window(&self, events: &[BlockEventRecord]) -> bool {
        match self {
            BlockEventFilter::RollingWindow { subfilters, .. } => {
                events.len() >= subfilters.len()
                    && subfilters
                        .iter()
                        .zip(events)
                        .all(|(filter, event)| filter.matches_event(event))
            }
            _ => events.first().is_some_and(|event| self.matches_event(event)),
        }
    }

    fn validate(&self, nested: bool) -> Result<(), String> {
        match self {
            BlockEventFilter::EventType { event_type, .. } if event_type.is_empty() => {
                Err("event_type must be set".to_string())
            }
            BlockEventFilter::EventTypeAndAttributeValue {
                event_type,
                attribute_key,
                attribute_value,
                ..
            } if event_type.is_empty() || attribute_key.is_empty() || attribute_value.is_empty() => {
                Err("event_type, attribute_key and attribute_value must be set".to_string())
            }
            BlockEventFilter::RollingWindow { .. } if nested => {
                Err("rolling windows cannot be nested".to_string())
            }
            BlockEventFilter::RollingWindow { subfilters, .. } => {
                if subfilters.is_empty() {
                    return Err("subfilters must be set".to_string());
                }
                for (index, subfilter) in subfilters.iter().enumerate() {
                    subfilter
                        .validate(true)
                        .map_err(|e| format!("subfilter {}: {}", index, e))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Filter matching a transaction message by type URL
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageTypeFilter {
    MessageType { message_type: String },
}

impl MessageTypeFilter {
    fn matches(&self, type_url: &str) -> bool {
        match self {
            MessageTypeFilter::MessageType { message_type } => message_type == type_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterFile {
    #[serde(default)]
    begin_block_filters: Vec<BlockEventFilter>,
    #[serde(default)]
    end_block_filters: Vec<BlockEventFilter>,
    #[serde(default)]
    message_type_filters: Vec<MessageTypeFilter>,
}

/// Filters applied by the block processor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFilters {
    block_events: HashMap<BlockLifecyclePosition, Vec<BlockEventFilter>>,
    message_types: Vec<MessageTypeFilter>,
}

impl IndexFilters {
    /// Parse and validate a filter document
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let file: FilterFile = serde_json::from_str(json)
            .map_err(|e| ConfigError::InvalidValue(format!("filter file: {}", e)))?;

        for (name, filters) in [
            ("begin_block_filters", &file.begin_block_filters),
            ("end_block_filters", &file.end_block_filters),
        ] {
            for (index, filter) in filters.iter().enumerate() {
                filter.validate(false).map_err(|e| {
                    ConfigError::InvalidValue(format!("{} at index {}: {}", name, index, e))
                })?;
            }
        }
        for (index, filter) in file.message_type_filters.iter().enumerate() {
            let MessageTypeFilter::MessageType { message_type } = filter;
            if message_type.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "message_type_filters at index {}: message_type must be set",
                    index
                )));
            }
        }

        let mut block_events = HashMap::new();
        block_events.insert(BlockLifecyclePosition::BeginBlock, file.begin_block_filters);
        block_events.insert(BlockLifecyclePosition::EndBlock, file.end_block_filters);
        Ok(Self {
            block_events,
            message_types: file.message_type_filters,
        })
    }

    /// Read a filter file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidValue(format!("filter file {}: {}", path, e)))?;
        Self::parse(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.message_types.is_empty() && self.block_events.values().all(Vec::is_empty)
    }

    /// Number of (block event, message type) filters
    pub fn counts(&self) -> (usize, usize) {
        (
            self.block_events.values().map(Vec::len).sum(),
            self.message_types.len(),
        )
    }

    pub fn should_index_message(&self, message: &DecodedMessageRecord) -> bool {
        self.message_types.is_empty()
            || self
                .message_types
                .iter()
                .any(|filter| filter.matches(&message.type_url))
    }

    /// Keep the events of each lifecycle position its filters allow.
    /// Positions without filters keep all of their events.
    pub fn filter_block_events(&self, events: Vec<BlockEventRecord>) -> Vec<BlockEventRecord> {
        let (begin, end): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|e| e.position == BlockLifecyclePosition::BeginBlock);

        let mut kept = self.filter_position(BlockLifecyclePosition::BeginBlock, begin);
        kept.extend(self.filter_position(BlockLifecyclePosition::EndBlock, end));
        kept
    }

    fn filter_position(
        &self,
        position: BlockLifecyclePosition,
        events: Vec<BlockEventRecord>,
    ) -> Vec<BlockEventRecord> {
        let filters = match self.block_events.get(&position) {
            Some(filters) if !filters.is_empty() => filters,
            _ => return events,
        };

        // Single-event filters are evaluated before rolling windows
        let (single, windows): (Vec<_>, Vec<_>) = filters
            .iter()
            .partition(|f| !matches!(f, BlockEventFilter::RollingWindow { .. }));

        let mut keep = vec![false; events.len()];
        for start in 0..events.len() {
            for filter in single.iter().chain(windows.iter()) {
                let len = filter.window_len();
                if start + len <= events.len() && filter.matches_window(&events[start..]) {
                    for slot in &mut keep[start..start + len] {
                        *slot = filter.inclusive();
                    }
                }
            }
        }

        events
            .into_iter()
            .zip(keep)
            .filter_map(|(event, keep)| keep.then_some(event))
            .collect()
    }
}
