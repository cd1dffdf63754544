use std::error::Error;
use std::fmt;

use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::rpc::RpcClientError;

/// Error type for invalid configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingValue(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingValue(key) => write!(f, "Missing configuration value: {}", key),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl Error for ConfigError {}

/// Error type for public key to address resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Prefix is empty or not a valid bech32 human readable part
    InvalidPrefix(String),
    /// Raw key bytes do not match any supported algorithm
    InvalidKeyLength(usize),
    /// Derived address bytes cannot be bech32 encoded
    InvalidAddressLength(usize),
    /// Bech32 layer rejected the input
    Bech32(String),
    /// Input is none of hex, base64 or legacy bech32
    UnrecognizedEncoding(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidPrefix(prefix) => write!(f, "Invalid bech32 prefix: {:?}", prefix),
            AddressError::InvalidKeyLength(len) => {
                write!(f, "Unsupported public key length: {} bytes", len)
            }
            AddressError::InvalidAddressLength(len) => {
                write!(f, "Invalid address length: {} bytes", len)
            }
            AddressError::Bech32(msg) => write!(f, "Bech32 error: {}", msg),
            AddressError::UnrecognizedEncoding(key) => write!(
                f,
                "Public key {} is not valid hex, base64 or bech32",
                key
            ),
        }
    }
}

impl Error for AddressError {}

/// Error type for transaction decoding and normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    InvalidEnvelope(String),
    InvalidBody(String),
    InvalidAuthInfo(String),
    UnknownMessageType(String),
    UnsupportedExtensionOption(String),
    InvalidLogs(String),
    InvalidCoins(String),
    Address(AddressError),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidEnvelope(msg) => write!(f, "Invalid tx envelope: {}", msg),
            DecodeError::InvalidBody(msg) => write!(f, "Invalid tx body: {}", msg),
            DecodeError::InvalidAuthInfo(msg) => write!(f, "Invalid auth info: {}", msg),
            DecodeError::UnknownMessageType(url) => write!(f, "Unknown message type: {}", url),
            DecodeError::UnsupportedExtensionOption(url) => {
                write!(f, "Unsupported extension option: {}", url)
            }
            DecodeError::InvalidLogs(msg) => write!(f, "Logs could not be parsed: {}", msg),
            DecodeError::InvalidCoins(msg) => write!(f, "Invalid coins: {}", msg),
            DecodeError::Address(e) => write!(f, "Address error: {}", e),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeError::Address(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AddressError> for DecodeError {
    fn from(error: AddressError) -> Self {
        DecodeError::Address(error)
    }
}

impl From<prost::DecodeError> for DecodeError {
    fn from(error: prost::DecodeError) -> Self {
        DecodeError::InvalidEnvelope(error.to_string())
    }
}

/// Error type for event handlers and their dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventHandlerError {
    MissingAttribute { event_type: String, key: String },
    InvalidAttribute { event_type: String, message: String },
    /// Every registered handler refused the event
    HandlersExhausted { event_type: String, height: i64 },
    DuplicateHandler(String),
    /// A handler was registered under an event type it does not handle
    TypeMismatch {
        id: String,
        registered: String,
        handles: String,
    },
}

impl fmt::Display for EventHandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventHandlerError::MissingAttribute { event_type, key } => {
                write!(f, "Event {} is missing attribute {}", event_type, key)
            }
            EventHandlerError::InvalidAttribute {
                event_type,
                message,
            } => write!(f, "Event {} has an invalid attribute: {}", event_type, message),
            EventHandlerError::HandlersExhausted { event_type, height } => write!(
                f,
                "All handlers failed for event {} at height {}",
                event_type, height
            ),
            EventHandlerError::DuplicateHandler(id) => {
                write!(f, "Handler {} is already registered", id)
            }
            EventHandlerError::TypeMismatch {
                id,
                registered,
                handles,
            } => write!(
                f,
                "Handler {} handles {} events but was registered for {}",
                id, handles, registered
            ),
        }
    }
}

impl Error for EventHandlerError {}

/// Error type for message handlers and their dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageHandlerError {
    /// Payload could not be read as the handler's message type
    InvalidPayload { type_url: String, message: String },
    /// The message log does not show what the message should have done
    InvalidLog { type_url: String, message: String },
    /// Every registered handler refused the message
    HandlersExhausted { type_url: String, tx_hash: String },
    DuplicateHandler(String),
    /// A handler was registered under a type URL it does not handle
    TypeMismatch {
        id: String,
        registered: String,
        handles: String,
    },
}

impl fmt::Display for MessageHandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageHandlerError::InvalidPayload { type_url, message } => {
                write!(f, "Message {} could not be read: {}", type_url, message)
            }
            MessageHandlerError::InvalidLog { type_url, message } => {
                write!(f, "Message {} has an unexpected log: {}", type_url, message)
            }
            MessageHandlerError::HandlersExhausted { type_url, tx_hash } => write!(
                f,
                "All handlers failed for message {} of tx {}",
                type_url, tx_hash
            ),
            MessageHandlerError::DuplicateHandler(id) => {
                write!(f, "Message handler {} is already registered", id)
            }
            MessageHandlerError::TypeMismatch {
                id,
                registered,
                handles,
            } => write!(
                f,
                "Message handler {} handles {} but was registered for {}",
                id, handles, registered
            ),
        }
    }
}

impl Error for MessageHandlerError {}

/// Error type for block enqueue strategies
#[derive(Debug)]
pub enum EnqueueError {
    RpcClientError(RpcClientError),
    DbError(DbError),
    InputFile(String),
    ChannelClosed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::RpcClientError(e) => write!(f, "RPC client error: {}", e),
            EnqueueError::DbError(e) => write!(f, "Database error: {}", e),
            EnqueueError::InputFile(msg) => write!(f, "Block input file error: {}", msg),
            EnqueueError::ChannelClosed => write!(f, "Block request channel closed"),
        }
    }
}

impl Error for EnqueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnqueueError::RpcClientError(e) => Some(e),
            EnqueueError::DbError(e) => Some(e),
            EnqueueError::InputFile(_) => None,
            EnqueueError::ChannelClosed => None,
        }
    }
}

impl From<RpcClientError> for EnqueueError {
    fn from(error: RpcClientError) -> Self {
        EnqueueError::RpcClientError(error)
    }
}

impl From<DbError> for EnqueueError {
    fn from(error: DbError) -> Self {
        EnqueueError::DbError(error)
    }
}

/// Top-level error type for a pipeline run
#[derive(Debug)]
pub enum PipelineError {
    ConfigError(ConfigError),
    RpcClientError(RpcClientError),
    DbError(DbError),
    EnqueueError(EnqueueError),
    WriterFailed(String),
    TaskJoin(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            PipelineError::RpcClientError(e) => write!(f, "RPC client error: {}", e),
            PipelineError::DbError(e) => write!(f, "Database error: {}", e),
            PipelineError::EnqueueError(e) => write!(f, "Enqueue error: {}", e),
            PipelineError::WriterFailed(msg) => write!(f, "Persistence writer failed: {}", msg),
            PipelineError::TaskJoin(msg) => write!(f, "Pipeline task failed: {}", msg),
        }
    }
}

impl Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(error: ConfigError) -> Self {
        PipelineError::ConfigError(error)
    }
}

impl From<RpcClientError> for PipelineError {
    fn from(error: RpcClientError) -> Self {
        PipelineError::RpcClientError(error)
    }
}

impl From<DbError> for PipelineError {
    fn from(error: DbError) -> Self {
        PipelineError::DbError(error)
    }
}

impl From<EnqueueError> for PipelineError {
    fn from(error: EnqueueError) -> Self {
        PipelineError::EnqueueError(error)
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(error: tokio::task::JoinError) -> Self {
        PipelineError::TaskJoin(error.to_string())
    }
}
