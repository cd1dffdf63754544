//! Registry of transaction message handlers.
//!
//! Handlers are looked up by message type URL. Chain-specific handlers are
//! tried before generic ones and the first handler that accepts a message
//! provides its relevant data. Messages without a handler are left alone.

pub mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::MessageHandlerError;
use crate::domain::models::{DecodedMessageRecord, MessageRelevantInformation, NormalizedTx};
use crate::utils::logging;

/// A stateful handler instantiated once per message
pub trait MessageHandler: Send {
    /// Message type URL this handler understands
    fn type_url(&self) -> &str;

    /// Read the message and its log. An error lets the next registered
    /// handler try.
    fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError>;

    /// Data extracted by a successful `handle_msg`
    fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation>;
}

/// Builds a fresh message handler instance
pub type MessageHandlerFactory = Arc<dyn Fn() -> Box<dyn MessageHandler> + Send + Sync>;

#[derive(Clone)]
struct RegisteredMessageHandler {
    id: String,
    generic: bool,
    factory: MessageHandlerFactory,
}

impl fmt::Debug for RegisteredMessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredMessageHandler")
            .field("id", &self.id)
            .field("generic", &self.generic)
            .finish_non_exhaustive()
    }
}

/// Message handler registry owned by the pipeline
#[derive(Debug, Clone, Default)]
pub struct MessageHandlerRegistry {
    handlers: HashMap<String, Vec<RegisteredMessageHandler>>,
}

impl MessageHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain-specific handler, tried before generic ones
    pub fn register_chain_specific(
        &mut self,
        type_url: &str,
        id: &str,
        factory: MessageHandlerFactory,
    ) -> Result<(), MessageHandlerError> {
        self.insert(
            type_url,
            RegisteredMessageHandler {
                id: id.to_string(),
                generic: false,
                factory,
            },
        )
    }

    /// Register a chain-agnostic handler, tried after chain-specific ones
    pub fn register_generic(
        &mut self,
        type_url: &str,
        id: &str,
        factory: MessageHandlerFactory,
    ) -> Result<(), MessageHandlerError> {
        self.insert(
            type_url,
            RegisteredMessageHandler {
                id: id.to_string(),
                generic: true,
                factory,
            },
        )
    }

    fn insert(
        &mut self,
        type_url: &str,
        handler: RegisteredMessageHandler,
    ) -> Result<(), MessageHandlerError> {
        let handles = (handler.factory)().type_url().to_string();
        if handles != type_url {
            return Err(MessageHandlerError::TypeMismatch {
                id: handler.id,
                registered: type_url.to_string(),
                handles,
            });
        }

        let handlers = self.handlers.entry(type_url.to_string()).or_default();
        if handlers.iter().any(|h| h.id == handler.id) {
            return Err(MessageHandlerError::DuplicateHandler(handler.id));
        }

        if handler.generic {
            handlers.push(handler);
        } else {
            let at = handlers
                .iter()
                .position(|h| h.generic)
                .unwrap_or(handlers.len());
            handlers.insert(at, handler);
        }
        Ok(())
    }

    /// Handler ids for a type URL, in dispatch order
    pub fn handler_ids(&self, type_url: &str) -> Vec<String> {
        self.handlers
            .get(type_url)
            .map(|handlers| handlers.iter().map(|h| h.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Relevant data of every handled message of a transaction.
    ///
    /// Failed transactions carry no messages and yield nothing. If every
    /// handler of a message type refuses a message the whole call fails.
    pub fn dispatch_tx(
        &self,
        tx: &NormalizedTx,
    ) -> Result<Vec<MessageRelevantInformation>, MessageHandlerError> {
        let mut relevant = Vec::new();
        for message in &tx.messages {
            let Some(handlers) = self.handlers.get(&message.type_url) else {
                continue;
            };
            relevant.extend(dispatch_message(handlers, tx, message)?);
        }
        Ok(relevant)
    }
}

fn dispatch_message(
    handlers: &[RegisteredMessageHandler],
    tx: &NormalizedTx,
    message: &DecodedMessageRecord,
) -> Result<Vec<MessageRelevantInformation>, MessageHandlerError> {
    for registered in handlers {
        let mut handler = (registered.factory)();
        match handler.handle_msg(message) {
            Ok(()) => return Ok(handler.parse_relevant_data()),
            Err(e) => {
                logging::log_debug(&format!(
                    "Message handler {} refused message {} of tx {}: {}",
                    registered.id, message.message_index, tx.hash, e
                ));
            }
        }
    }

    Err(MessageHandlerError::HandlersExhausted {
        type_url: message.type_url.clone(),
        tx_hash: tx.hash.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessagePayload;
    use bigdecimal::BigDecimal;
    use serde_json::json;

    const TEST_URL: &str = "/test.v1.MsgTest";

    /// Accepts every message and tags its data with an id
    struct TaggingHandler {
        tag: &'static str,
        accept: bool,
        data: Vec<MessageRelevantInformation>,
    }

    impl MessageHandler for TaggingHandler {
        fn type_url(&self) -> &str {
            TEST_URL
        }

        fn handle_msg(&mut self, message: &DecodedMessageRecord) -> Result<(), MessageHandlerError> {
            if !self.accept {
                return Err(MessageHandlerError::InvalidPayload {
                    type_url: message.type_url.clone(),
                    message: "rejected".to_string(),
                });
            }
            self.data = vec![MessageRelevantInformation {
                message_index: message.message_index,
                type_url: message.type_url.clone(),
                sender_address: self.tag.to_string(),
                receiver_address: String::new(),
                amount: BigDecimal::from(1),
                denomination: "utest".to_string(),
            }];
            Ok(())
        }

        fn parse_relevant_data(&self) -> Vec<MessageRelevantInformation> {
            self.data.clone()
        }
    }

    fn tagging(tag: &'static str, accept: bool) -> MessageHandlerFactory {
        Arc::new(move || {
            Box::new(TaggingHandler {
                tag,
                accept,
                data: Vec::new(),
            }) as Box<dyn MessageHandler>
        })
    }

    fn tx_with(type_urls: &[&str]) -> NormalizedTx {
        NormalizedTx {
            hash: "TXHASH".to_string(),
            messages: type_urls
                .iter()
                .enumerate()
                .map(|(message_index, type_url)| DecodedMessageRecord {
                    message_index,
                    type_url: type_url.to_string(),
                    payload: MessagePayload::Json(json!({})),
                    events: Vec::new(),
                })
                .collect(),
            ..NormalizedTx::default()
        }
    }

    #[test]
    fn test_chain_specific_handlers_go_first() {
        let mut registry = MessageHandlerRegistry::new();
        registry
            .register_generic(TEST_URL, "generic", tagging("generic", true))
            .unwrap();
        registry
            .register_chain_specific(TEST_URL, "chain", tagging("chain", true))
            .unwrap();

        assert_eq!(registry.handler_ids(TEST_URL), vec!["chain", "generic"]);
        let data = registry.dispatch_tx(&tx_with(&[TEST_URL])).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].sender_address, "chain");
    }

    #[test]
    fn test_refused_message_falls_through_to_generic() {
        let mut registry = MessageHandlerRegistry::new();
        registry
            .register_chain_specific(TEST_URL, "chain", tagging("chain", false))
            .unwrap();
        registry
            .register_generic(TEST_URL, "generic", tagging("generic", true))
            .unwrap();

        let data = registry.dispatch_tx(&tx_with(&[TEST_URL])).unwrap();
        assert_eq!(data[0].sender_address, "generic");
    }

    #[test]
    fn test_all_handlers_refusing_fails_the_tx() {
        let mut registry = MessageHandlerRegistry::new();
        registry
            .register_generic(TEST_URL, "generic", tagging("generic", false))
            .unwrap();

        assert_eq!(
            registry.dispatch_tx(&tx_with(&[TEST_URL])),
            Err(MessageHandlerError::HandlersExhausted {
                type_url: TEST_URL.to_string(),
                tx_hash: "TXHASH".to_string(),
            })
        );
    }

    #[test]
    fn test_messages_without_handlers_are_skipped() {
        let mut registry = MessageHandlerRegistry::new();
        registry
            .register_generic(TEST_URL, "generic", tagging("generic", true))
            .unwrap();

        let data = registry
            .dispatch_tx(&tx_with(&["/other.v1.MsgOther", TEST_URL]))
            .unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].message_index, 1);
    }

    #[test]
    fn test_registration_checks_type_url_and_duplicates() {
        let mut registry = MessageHandlerRegistry::new();
        assert_eq!(
            registry.register_generic("/other.v1.MsgOther", "wrong", tagging("wrong", true)),
            Err(MessageHandlerError::TypeMismatch {
                id: "wrong".to_string(),
                registered: "/other.v1.MsgOther".to_string(),
                handles: TEST_URL.to_string(),
            })
        );
        assert!(registry.is_empty());

        registry
            .register_generic(TEST_URL, "generic", tagging("generic", true))
            .unwrap();
        assert_eq!(
            registry.register_generic(TEST_URL, "generic", tagging("generic", true)),
            Err(MessageHandlerError::DuplicateHandler("generic".to_string()))
        );
    }
}
