//! Request/response over the HTTP JSON-RPC endpoint
//!
//! Every call is one HTTP POST carrying one request envelope, answered by
//! exactly one response body. Correlation is therefore positional: the body
//! returned by the POST is the reply to the envelope it carried. The invoker
//! still stamps each envelope with its own sequential id so the server and
//! any traffic capture can tell calls apart.
//!
//! # Call Pipeline
//!
//! 1. **Encode**: serialize caller params into a JSON value
//! 2. **Envelope**: assign the next id and build the request
//! 3. **Send**: POST through the [`HttpTransport`]
//! 4. **Decode**: split the reply into success or server error
//! 5. **Convert**: deserialize `result` into the caller's type
//!
//! Calls are not retried and carry no timeout of their own; the transport
//! enforces [`crate::ConnectionSettings::request_timeout`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use kodirpc_client::{ConnectionSettings, ReqwestTransport, RpcInvoker};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> kodirpc_core::Result<()> {
//! let settings = ConnectionSettings::new("192.168.1.20");
//! let invoker = RpcInvoker::new(&settings, Arc::new(ReqwestTransport::new()?));
//!
//! let players: serde_json::Value = invoker.call("Player.GetActivePlayers", ()).await?;
//! let _: String = invoker.call("Player.PlayPause", json!({"playerid": 1})).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConnectionSettings, Credentials};
use crate::metrics::ClientMetrics;
use crate::transport::HttpTransport;
use kodirpc_core::{codec, RequestId, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Issues JSON-RPC calls against one Kodi web server
pub struct RpcInvoker {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    credentials: Option<Credentials>,
    next_id: AtomicU32,
    metrics: Option<Arc<ClientMetrics>>,
}

impl RpcInvoker {
    /// Create an invoker for the endpoint described by `settings`
    pub fn new(settings: &ConnectionSettings, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint: settings.json_interface_address(),
            credentials: settings.credentials.clone(),
            next_id: AtomicU32::new(0),
            metrics: None,
        }
    }

    /// Record calls in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// URL every call is posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Hand out the next request id
    ///
    /// Starts at 0 and wraps around at `u32::MAX`.
    pub fn next_id(&self) -> RequestId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call `method` and deserialize its result into `R`
    ///
    /// Pass `()` or `None::<T>` for methods without parameters; they are
    /// left out of the envelope.
    ///
    /// # Errors
    ///
    /// - [`kodirpc_core::Error::Encode`] if `params` cannot be serialized
    /// - [`kodirpc_core::Error::Transport`] if the POST fails
    /// - [`kodirpc_core::Error::ProtocolViolation`] if the reply is not a
    ///   JSON-RPC response or has no `result`
    /// - [`kodirpc_core::Error::Rpc`] if the server reported an error
    /// - [`kodirpc_core::Error::Decode`] if `result` does not fit `R`
    ///
    /// # Panics
    ///
    /// Panics if `method` is empty.
    #[tracing::instrument(skip(self, params), fields(id = tracing::field::Empty))]
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let result = self.round_trip(method, params).await;

        if let Some(metrics) = &self.metrics {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics.record_call(method, status, start.elapsed().as_secs_f64());
            if let Err(e) = &result {
                metrics.record_error(e.kind());
            }
        }

        if let Err(e) = &result {
            tracing::debug!(method, error = %e, "Call failed");
        }
        result
    }

    /// Untyped call, returning `result` as raw JSON
    pub async fn call_value(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.call(method, params).await
    }

    async fn round_trip<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = codec::encode_params(params)?;
        let id = self.next_id();
        tracing::Span::current().record("id", id);

        let request = codec::build_request(method, Some(params), id);
        let body = codec::encode_request(&request)?;
        tracing::debug!(method, id, bytes = body.len(), "Sending request");

        let reply = self
            .transport
            .post(&self.endpoint, self.credentials.as_ref(), body)
            .await?;
        tracing::debug!(method, id, bytes = reply.len(), "Received response");

        let result = codec::decode_response(&reply)?.into_result()?;
        codec::decode_value(result)
    }
}

impl std::fmt::Debug for RpcInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcInvoker")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
