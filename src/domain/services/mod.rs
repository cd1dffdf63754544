pub mod address_resolver;
pub mod block_events;
pub mod event_registry;
pub mod filters;
pub mod message_registry;
pub mod retry_policy;
pub mod tx_decoder;

pub use address_resolver::AddressResolver;
pub use event_registry::{EventHandler, EventHandlerRegistry, HandlerFactory};
pub use filters::IndexFilters;
pub use message_registry::{MessageHandler, MessageHandlerFactory, MessageHandlerRegistry};
pub use retry_policy::RetryPolicy;
pub use tx_decoder::MessageDecoder;
