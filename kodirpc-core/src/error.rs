//! Error types for kodirpc
//!
//! Every failure a caller can observe falls into one of a small number of
//! categories, so that code sitting on top of the bridge can tell apart
//! "the server rejected it", "the reply was unusable" and "the network is
//! unreachable":
//!
//! - **Transport**: connection refused, IO failure, timeout, non-2xx status
//! - **ProtocolViolation**: the peer answered, but not with a usable JSON-RPC reply
//! - **Rpc**: the server reported an application-level error
//! - **Decode**: a payload did not match the shape the caller asked for
//!
//! The remaining variants cover local misuse and limits.
//!
//! # Examples
//!
//! ```rust
//! use kodirpc_core::{Error, ServerError};
//! use serde_json::json;
//!
//! let error = Error::Rpc(ServerError::new(json!({"code": -32601, "message": "Method not found."})));
//! assert!(error.is_rpc());
//! assert_eq!(error.server_error().and_then(|e| e.code()), Some(-32601));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for kodirpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kodirpc operations
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Connection or IO failure, including non-success HTTP statuses
    ///
    /// Fatal to the current call. On the notification channel it ends the
    /// read loop.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer replied, but the reply is missing required JSON-RPC fields
    /// or is not JSON at all
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Server-reported error, carried verbatim
    ///
    /// The channel stays usable after this error.
    #[error("RPC error: {0}")]
    Rpc(ServerError),

    /// A result or notification payload did not match the expected type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Request parameters could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// The notification buffer grew past its limit without yielding a message
    #[error("Notification frame too large: limit={limit}, actual={actual}")]
    FrameTooLarge {
        /// Configured maximum buffered bytes
        limit: usize,
        /// Bytes buffered when the limit was hit
        actual: usize,
    },

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for connection, IO and HTTP status failures
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// True when the server answered with an `error` member
    pub fn is_rpc(&self) -> bool {
        matches!(self, Error::Rpc(_))
    }

    /// True when the reply could not be interpreted as a JSON-RPC response
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::ProtocolViolation(_))
    }

    /// True when a payload had the wrong shape
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// The server error payload, if this is an [`Error::Rpc`]
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Error::Rpc(e) => Some(e),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transport(_) => "transport",
            Error::ProtocolViolation(_) => "protocol_violation",
            Error::Rpc(_) => "rpc",
            Error::Decode(_) => "decode",
            Error::Encode(_) => "encode",
            Error::FrameTooLarge { .. } => "frame_too_large",
            Error::InvalidState(_) => "invalid_state",
            Error::Config(_) => "config",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

/// The `error` member of a JSON-RPC response, kept exactly as the server sent it
///
/// Kodi normally sends `{"code": .., "message": .., "data": ..}`, but nothing
/// here relies on that: the accessors return `None` when a member is missing
/// or has an unexpected type, and [`ServerError::payload`] always gives back
/// the original value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerError(serde_json::Value);

impl ServerError {
    /// Wrap a raw error payload
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    /// Numeric error code, if present
    pub fn code(&self) -> Option<i64> {
        self.0.get("code").and_then(serde_json::Value::as_i64)
    }

    /// Error message, if present
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(serde_json::Value::as_str)
    }

    /// Additional error data, if present
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.0.get("data")
    }

    /// The verbatim payload
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }

    /// Consume and return the verbatim payload
    pub fn into_payload(self) -> serde_json::Value {
        self.0
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "[{}] {}", code, message),
            (None, Some(message)) => write!(f, "{}", message),
            _ => write!(f, "{}", self.0),
        }
    }
}
