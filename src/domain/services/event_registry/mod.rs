//! Registry of block event handlers.
//!
//! Handlers are looked up by lifecycle scope (`begin_block`/`end_block`) and
//! event type. Epoch-scoped handlers sit under an extra epoch identifier key.
//! For each event the registered handlers are tried in order and the first
//! one that accepts the event provides the relevant data.

pub mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::EventHandlerError;
use crate::domain::models::{BlockHeight, BlockLifecyclePosition, EventRelevantInformation, RawEvent};
use crate::utils::logging;

/// A stateful handler instantiated once per event
pub trait EventHandler: Send {
    /// Event type this handler understands
    fn event_type(&self) -> &str;

    /// Read the event. An error lets the next registered handler try.
    fn handle_event(&mut self, event_type: &str, event: &RawEvent) -> Result<(), EventHandlerError>;

    /// Data extracted by a successful `handle_event`
    fn parse_relevant_data(&self) -> Vec<EventRelevantInformation>;
}

/// Builds a fresh handler instance
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn EventHandler> + Send + Sync>;

#[derive(Clone)]
struct RegisteredHandler {
    id: String,
    generic: bool,
    factory: HandlerFactory,
}

impl fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("id", &self.id)
            .field("generic", &self.generic)
            .finish_non_exhaustive()
    }
}

/// scope -> event type -> ordered handlers
#[derive(Debug, Clone, Default)]
struct ScopedHandlers {
    scopes: HashMap<BlockLifecyclePosition, HashMap<String, Vec<RegisteredHandler>>>,
}

impl ScopedHandlers {
    fn insert(
        &mut self,
        position: BlockLifecyclePosition,
        event_type: &str,
        handler: RegisteredHandler,
    ) -> Result<(), EventHandlerError> {
        let handlers = self
            .scopes
            .entry(position)
            .or_default()
            .entry(event_type.to_string())
            .or_default();

        let handles = (handler.factory)().event_type().to_string();
        if handles != event_type {
            return Err(EventHandlerError::TypeMismatch {
                id: handler.id,
                registered: event_type.to_string(),
                handles,
            });
        }

        if handlers.iter().any(|h| h.id == handler.id) {
            return Err(EventHandlerError::DuplicateHandler(handler.id));
        }

        if handler.generic {
            handlers.push(handler);
        } else {
            // Chain-specific handlers go ahead of every generic one
            let at = handlers
                .iter()
                .position(|h| h.generic)
                .unwrap_or(handlers.len());
            handlers.insert(at, handler);
        }
        Ok(())
    }

    fn get(&self, position: BlockLifecyclePosition, event_type: &str) -> &[RegisteredHandler] {
        self.scopes
            .get(&position)
            .and_then(|types| types.get(event_type))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn dispatch(
        &self,
        height: BlockHeight,
        begin: &[RawEvent],
        end: &[RawEvent],
    ) -> Result<Vec<EventRelevantInformation>, EventHandlerError> {
        let mut relevant = Vec::new();
        let events = begin
            .iter()
            .map(|e| (BlockLifecyclePosition::BeginBlock, e))
            .chain(end.iter().map(|e| (BlockLifecyclePosition::EndBlock, e)));

        for (position, event) in events {
            let handlers = self.get(position, &event.event_type);
            if handlers.is_empty() {
                continue;
            }
            relevant.extend(dispatch_event(handlers, height, event)?);
        }

        Ok(relevant)
    }
}

fn dispatch_event(
    handlers: &[RegisteredHandler],
    height: BlockHeight,
    event: &RawEvent,
) -> Result<Vec<EventRelevantInformation>, EventHandlerError> {
    for registered in handlers {
        let mut handler = (registered.factory)();
        match handler.handle_event(&event.event_type, event) {
            Ok(()) => return Ok(handler.parse_relevant_data()),
            Err(e) => {
                logging::log_debug(&format!(
                    "Handler {} refused {} event at height {}: {}",
                    registered.id, event.event_type, height, e
                ));
            }
        }
    }

    logging::log_error(&format!(
        "No handler accepted {} event at height {}",
        event.event_type, height
    ));
    Err(EventHandlerError::HandlersExhausted {
        event_type: event.event_type.clone(),
        height,
    })
}

/// Event handler registry owned by the pipeline
#[derive(Debug, Clone, Default)]
pub struct EventHandlerRegistry {
    block: ScopedHandlers,
    epochs: HashMap<String, ScopedHandlers>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain-specific handler, tried before generic ones
    pub fn register_chain_specific(
        &mut self,
        position: BlockLifecyclePosition,
        event_type: &str,
        id: &str,
        factory: HandlerFactory,
    ) -> Result<(), EventHandlerError> {
        self.block.insert(
            position,
            event_type,
            RegisteredHandler {
                id: id.to_string(),
                generic: false,
                factory,
            },
        )
    }

    /// Register a chain-agnostic handler, tried after chain-specific ones
    pub fn register_generic(
        &mut self,
        position: BlockLifecyclePosition,
        event_type: &str,
        id: &str,
        factory: HandlerFactory,
    ) -> Result<(), EventHandlerError> {
        self.block.insert(
            position,
            event_type,
            RegisteredHandler {
                id: id.to_string(),
                generic: true,
                factory,
            },
        )
    }

    /// Register a handler that only runs for blocks of an epoch boundary
    pub fn register_epoch_handler(
        &mut self,
        epoch_identifier: &str,
        position: BlockLifecyclePosition,
        event_type: &str,
        id: &str,
        factory: HandlerFactory,
    ) -> Result<(), EventHandlerError> {
        self.epochs
            .entry(epoch_identifier.to_string())
            .or_default()
            .insert(
                position,
                event_type,
                RegisteredHandler {
                    id: id.to_string(),
                    generic: false,
                    factory,
                },
            )
    }

    /// Handler ids for an event type, in dispatch order
    pub fn handler_ids(&self, position: BlockLifecyclePosition, event_type: &str) -> Vec<String> {
        self.block
            .get(position, event_type)
            .iter()
            .map(|h| h.id.clone())
            .collect()
    }

    pub fn has_epoch(&self, epoch_identifier: &str) -> bool {
        self.epochs.contains_key(epoch_identifier)
    }

    /// Run the registered handlers over a block's begin and end events.
    ///
    /// Events without handlers are skipped. If every handler of a type fails
    /// the whole call fails.
    pub fn dispatch_block_events(
        &self,
        height: BlockHeight,
        begin: &[RawEvent],
        end: &[RawEvent],
    ) -> Result<Vec<EventRelevantInformation>, EventHandlerError> {
        self.block.dispatch(height, begin, end)
    }

    /// Same as [`dispatch_block_events`](Self::dispatch_block_events) with the
    /// handlers of one epoch identifier
    pub fn dispatch_epoch_events(
        &self,
        epoch_identifier: &str,
        height: BlockHeight,
        begin: &[RawEvent],
        end: &[RawEvent],
    ) -> Result<Vec<EventRelevantInformation>, EventHandlerError> {
        match self.epochs.get(epoch_identifier) {
            Some(handlers) => handlers.dispatch(height, begin, end),
            None => Ok(Vec::new()),
        }
    }
}
