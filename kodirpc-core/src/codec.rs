//! Encoding of requests and decoding of responses
//!
//! These are the pure halves of a call: [`build_request`] /
//! [`encode_request`] produce the bytes that go out, and
//! [`decode_response`] turns the bytes that come back into a
//! [`ResponseOutcome`]. Neither does any IO.
//!
//! # Error Mapping
//!
//! - Bytes that are not JSON, or JSON that is not an object → `ProtocolViolation`
//! - An object with neither `result` nor `error` → `ProtocolViolation("missing result")`
//! - Parameters that fail to serialize → `Encode`
//! - A result that does not fit the requested type → `Decode`
//!
//! # Examples
//!
//! ```rust
//! use kodirpc_core::{codec, ResponseOutcome};
//! use serde_json::json;
//!
//! let body = codec::encode_request(&codec::build_request("JSONRPC.Ping", None, 0)).unwrap();
//! assert_eq!(
//!     serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
//!     json!({"jsonrpc": "2.0", "method": "JSONRPC.Ping", "id": 0})
//! );
//!
//! let outcome = codec::decode_response(br#"{"id":0,"jsonrpc":"2.0","result":"pong"}"#).unwrap();
//! assert_eq!(outcome, ResponseOutcome::Success(json!("pong")));
//! ```

use crate::error::{Error, Result};
use crate::types::{JsonRpcRequest, JsonRpcResponse, RequestId, ResponseOutcome};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Build the canonical request envelope
///
/// Thin alias of [`JsonRpcRequest::new`]; `params` is dropped when `None`
/// or JSON `null`.
pub fn build_request(
    method: impl Into<String>,
    params: Option<serde_json::Value>,
    id: RequestId,
) -> JsonRpcRequest {
    JsonRpcRequest::new(method, params, id)
}

/// Serialize caller parameters into a JSON value
pub fn encode_params<P: Serialize>(params: P) -> Result<serde_json::Value> {
    serde_json::to_value(params).map_err(|e| Error::Encode(e.to_string()))
}

/// Encode a request envelope to UTF-8 JSON bytes
pub fn encode_request(req: &JsonRpcRequest) -> Result<Vec<u8>> {
    serde_json::to_vec(req).map_err(|e| Error::Encode(e.to_string()))
}

/// Decode a complete response body
pub fn decode_response(body: &[u8]) -> Result<ResponseOutcome> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::ProtocolViolation("empty response body".to_string()));
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::ProtocolViolation(format!("response is not valid JSON: {}", e)))?;

    decode_response_value(value)
}

/// Decode a response that has already been parsed
pub fn decode_response_value(value: serde_json::Value) -> Result<ResponseOutcome> {
    if !value.is_object() {
        return Err(Error::ProtocolViolation(
            "response is not a JSON object".to_string(),
        ));
    }

    let response: JsonRpcResponse = serde_json::from_value(value)
        .map_err(|e| Error::ProtocolViolation(format!("malformed response: {}", e)))?;

    response.into_outcome()
}

/// Deserialize a `result` (or notification payload) into the caller's type
pub fn decode_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}
