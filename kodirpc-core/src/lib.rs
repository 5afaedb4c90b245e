//! Core JSON-RPC types and codec for kodirpc
//!
//! This crate holds the transport-independent half of the Kodi bridge:
//!
//! - **Types**: request envelope, raw response, notification shapes
//! - **Codec**: envelope building/encoding and response decoding
//! - **Error handling**: the error taxonomy shared by every kodirpc crate
//! - **Observability**: `tracing` subscriber and OpenTelemetry bootstrap
//!
//! The `kodirpc-client` crate adds the HTTP invoker and the TCP
//! notification channel on top.
//!
//! # Example
//!
//! ```rust
//! use kodirpc_core::{codec, Error, ResponseOutcome};
//! use serde_json::json;
//!
//! let request = codec::build_request("Player.GetActivePlayers", None, 0);
//! let body = codec::encode_request(&request).unwrap();
//! assert!(!body.is_empty());
//!
//! let outcome = codec::decode_response(br#"{"error":{"code":-32601,"message":"Method not found."}}"#).unwrap();
//! let err: Error = outcome.into_result().unwrap_err();
//! assert!(err.is_rpc());
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result, ServerError};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, NotificationMessage, RequestId,
    ResponseOutcome, JSONRPC_VERSION,
};
