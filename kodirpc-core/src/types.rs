//! JSON-RPC 2.0 message types as spoken by Kodi
//!
//! Kodi uses two message families:
//!
//! 1. **Request/Response** over HTTP: the client posts a [`JsonRpcRequest`]
//!    and receives exactly one [`JsonRpcResponse`].
//! 2. **Notifications** over the raw TCP channel: the server pushes
//!    [`JsonRpcNotification`] objects shaped
//!    `{"method": .., "params": {"sender": .., "data": ..}}`, which are
//!    flattened into [`NotificationMessage`] for dispatch.
//!
//! # Request IDs
//!
//! Calls are sequential, so correlation is by call order rather than by
//! matching ids against interleaved replies. Ids are still unique per
//! in-flight call: each invoker hands out a `u32` counter that starts at 0
//! and wraps.

use crate::error::{Error, Result, ServerError};
use serde::{Deserialize, Deserializer, Serialize};

/// Protocol version tag carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Client-assigned request identifier
pub type RequestId = u32;

/// JSON-RPC 2.0 request envelope
///
/// `params` is skipped on the wire when absent, and [`JsonRpcRequest::new`]
/// folds an explicit JSON `null` into "absent", so the serialized form
/// never carries `"params": null`.
///
/// # Examples
///
/// ```rust
/// use kodirpc_core::JsonRpcRequest;
/// use serde_json::json;
///
/// let req = JsonRpcRequest::new("Player.GetActivePlayers", None, 0);
/// assert_eq!(req.jsonrpc, "2.0");
/// assert!(req.params.is_none());
///
/// let req = JsonRpcRequest::new("Player.PlayPause", Some(json!({"playerid": 1})), 1);
/// assert_eq!(req.params, Some(json!({"playerid": 1})));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Namespaced method name, e.g. `Player.Open`
    pub method: String,
    /// Parameters, omitted when there are none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request id
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Build a request envelope
    ///
    /// # Panics
    ///
    /// Panics if `method` is empty. A nameless call can only come from a
    /// programming error in the caller.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>, id: RequestId) -> Self {
        let method = method.into();
        assert!(!method.is_empty(), "JSON-RPC method name must not be empty");

        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params: params.filter(|p| !p.is_null()),
            id,
        }
    }
}

/// JSON-RPC 2.0 response as received from the server
///
/// Both `result` and `error` are optional here because the server is not
/// trusted to be well-formed; [`JsonRpcResponse::into_outcome`] turns the
/// raw shape into a checked [`ResponseOutcome`].
///
/// A `"result": null` member counts as present (it is how void methods
/// answer), which is why `result` uses a custom deserializer instead of the
/// plain `Option` behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcResponse {
    /// Version tag echoed by the server, if any
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Id echoed by the server, if any
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Result member; `Some(Value::Null)` when the server sent `null`
    #[serde(default, deserialize_with = "present")]
    pub result: Option<serde_json::Value>,
    /// Error member
    #[serde(default)]
    pub error: Option<ServerError>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    /// Check the response and split it into success or failure
    ///
    /// An `error` member takes precedence over `result`. A response with
    /// neither is a [`Error::ProtocolViolation`].
    pub fn into_outcome(self) -> Result<ResponseOutcome> {
        match (self.error, self.result) {
            (Some(error), _) => Ok(ResponseOutcome::Failure(error)),
            (None, Some(result)) => Ok(ResponseOutcome::Success(result)),
            (None, None) => Err(Error::ProtocolViolation("missing result".to_string())),
        }
    }
}

/// Checked outcome of a single call
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The `result` member
    Success(serde_json::Value),
    /// The `error` member, verbatim
    Failure(ServerError),
}

impl ResponseOutcome {
    /// Convert into a `Result`, mapping a server failure to [`Error::Rpc`]
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self {
            ResponseOutcome::Success(value) => Ok(value),
            ResponseOutcome::Failure(error) => Err(Error::Rpc(error)),
        }
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success(_))
    }
}

/// Notification object as it appears on the TCP stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Version tag, Kodi always sends "2.0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Namespaced notification name, e.g. `Player.OnPlay`
    pub method: String,
    /// `{"sender": .., "data": ..}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    /// Build a notification, mostly useful for tests and mock servers
    pub fn new(
        method: impl Into<String>,
        sender: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let mut params = serde_json::Map::new();
        params.insert("sender".to_string(), serde_json::Value::String(sender.into()));
        if let Some(data) = data {
            params.insert("data".to_string(), data);
        }

        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            method: method.into(),
            params: Some(serde_json::Value::Object(params)),
        }
    }
}

/// A notification flattened for dispatch
///
/// Ephemeral: built from one frame, handed to the dispatcher, then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    /// Notification name, matched case-sensitively
    pub method: String,
    /// `params.sender`, usually `"xbmc"`
    pub sender: String,
    /// `params.data`, absent for payload-less events
    pub data: Option<serde_json::Value>,
}

impl NotificationMessage {
    /// Create a message directly
    pub fn new(
        method: impl Into<String>,
        sender: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            method: method.into(),
            sender: sender.into(),
            data,
        }
    }

    /// Extract a message from one parsed frame
    ///
    /// Returns `None` when the frame has no string `method`, no `params`
    /// object, or no `params.sender`. A sender that is not a string is kept
    /// as its JSON text.
    pub fn from_frame(frame: serde_json::Value) -> Option<Self> {
        let serde_json::Value::Object(mut frame) = frame else {
            return None;
        };

        let method = match frame.remove("method")? {
            serde_json::Value::String(method) => method,
            _ => return None,
        };

        let serde_json::Value::Object(mut params) = frame.remove("params")? else {
            return None;
        };

        let sender = match params.remove("sender")? {
            serde_json::Value::String(sender) => sender,
            other => other.to_string(),
        };

        Some(Self {
            method,
            sender,
            data: params.remove("data"),
        })
    }
}

impl TryFrom<JsonRpcNotification> for NotificationMessage {
    type Error = Error;

    fn try_from(notification: JsonRpcNotification) -> Result<Self> {
        let method = notification.method.clone();
        let frame = serde_json::to_value(notification).map_err(|e| Error::Decode(e.to_string()))?;
        Self::from_frame(frame).ok_or_else(|| {
            Error::ProtocolViolation(format!("notification {} has no params.sender", method))
        })
    }
}
