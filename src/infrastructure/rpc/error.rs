use std::error::Error;
use std::fmt;

/// Represents errors that can occur talking to a chain node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcClientError {
    /// Transport failure or non-success HTTP status
    NetworkError(String),
    /// Request exceeded the configured timeout
    Timeout(String),
    /// Response body could not be interpreted
    ParseError(String),
    /// Node answered with a JSON-RPC or gRPC gateway error
    RpcError { code: i64, message: String },
    /// Configuration error
    ConfigError(String),
}

impl fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcClientError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            RpcClientError::Timeout(msg) => write!(f, "Request timed out: {}", msg),
            RpcClientError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            RpcClientError::RpcError { code, message } => {
                write!(f, "Node returned error {}: {}", code, message)
            }
            RpcClientError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RpcClientError {}

impl From<reqwest::Error> for RpcClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            RpcClientError::Timeout(error.to_string())
        } else if error.is_decode() {
            RpcClientError::ParseError(error.to_string())
        } else {
            RpcClientError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for RpcClientError {
    fn from(error: serde_json::Error) -> Self {
        RpcClientError::ParseError(error.to_string())
    }
}
