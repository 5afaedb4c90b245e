//! Kodi client facade
//!
//! `KodiClient` ties the two channels of one Kodi peer together: RPC calls
//! go through an [`RpcInvoker`] over HTTP, and notifications arrive through
//! a [`NotificationChannel`] over TCP and are routed by a shared
//! [`EventDispatcher`].
//!
//! # Client Lifecycle
//!
//! 1. **Build**: `KodiClient::new(settings)` or [`crate::ClientBuilder`]
//! 2. **Subscribe**: register handlers with `on_notification` / `on`
//! 3. **Listen**: `start_notification_listener()` opens the TCP channel
//! 4. **Call**: `call(method, params)` at any time, listener or not
//! 5. **Dispose**: `dispose()` closes the notification channel
//!
//! Handlers can be registered before or after the listener starts; the
//! registry is shared. A listener that closed (peer went away, disposal)
//! can be replaced by calling `start_notification_listener()` again.
//!
//! # Cloning
//!
//! `KodiClient` is cheaply cloneable. All clones share the same invoker,
//! dispatcher and notification channel.

use crate::channel::{ChannelState, NotificationChannel};
use crate::config::ConnectionSettings;
use crate::dispatcher::{EventDispatcher, HandlerId};
use crate::events::Notification;
use crate::invoker::RpcInvoker;
use crate::metrics::ClientMetrics;
use crate::transport::{ReqwestTransport, SocketFactory, TcpSocketFactory};
use crate::ClientBuilder;
use kodirpc_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Client for one Kodi instance
#[derive(Clone)]
pub struct KodiClient {
    pub(crate) settings: Arc<ConnectionSettings>,
    pub(crate) invoker: Arc<RpcInvoker>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) socket_factory: Arc<dyn SocketFactory>,
    pub(crate) channel: Arc<Mutex<Option<Arc<NotificationChannel>>>>,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl KodiClient {
    /// Create a client with the default reqwest and TCP transports
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(settings.timeout())?;
        let invoker = RpcInvoker::new(&settings, Arc::new(transport));

        Ok(Self {
            settings: Arc::new(settings),
            invoker: Arc::new(invoker),
            dispatcher: EventDispatcher::new(),
            socket_factory: Arc::new(TcpSocketFactory),
            channel: Arc::new(Mutex::new(None)),
            metrics: None,
        })
    }

    /// Start configuring a client
    pub fn builder(settings: ConnectionSettings) -> ClientBuilder {
        ClientBuilder::new(settings)
    }

    /// Settings this client was built with
    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Call a JSON-RPC method and deserialize its result
    ///
    /// See [`RpcInvoker::call`] for the error cases.
    ///
    /// ```rust,no_run
    /// # async fn example(client: kodirpc_client::KodiClient) -> kodirpc_core::Result<()> {
    /// let version: serde_json::Value = client
    ///     .call("Application.GetProperties", serde_json::json!({"properties": ["version"]}))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.invoker.call(method, params).await
    }

    /// Untyped call returning raw JSON
    pub async fn call_value(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.invoker.call_value(method, params).await
    }

    /// Register a handler for notifications named `method`
    pub fn on_notification<F>(&self, method: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&str, Option<&serde_json::Value>) + Send + Sync + 'static,
    {
        self.dispatcher.register(method, handler)
    }

    /// Register a typed handler for a known notification
    pub fn on<N, F>(&self, handler: F) -> HandlerId
    where
        N: Notification,
        F: Fn(&str, Option<N::Data>) + Send + Sync + 'static,
    {
        self.dispatcher.on::<N, F>(handler)
    }

    /// Remove a handler registered on this client
    pub fn unregister(&self, method: &str, id: HandlerId) -> bool {
        self.dispatcher.unregister(method, id)
    }

    /// Shared handler registry
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Underlying RPC invoker
    pub fn invoker(&self) -> &RpcInvoker {
        &self.invoker
    }

    /// Open the notification channel
    ///
    /// A closed channel from an earlier run is replaced by a fresh one.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if a listener is already connecting or
    ///   listening
    /// - [`Error::Transport`] if the TCP connection cannot be opened
    pub async fn start_notification_listener(&self) -> Result<()> {
        // The slot lock is not held across the connect, so dispose and
        // notification_state stay responsive while it is pending
        let channel = {
            let mut slot = self.channel.lock().await;

            if let Some(current) = slot.as_ref() {
                if !current.state().is_closed() {
                    return Err(Error::InvalidState(format!(
                        "notification listener already started ({})",
                        current.state()
                    )));
                }
            }

            let mut channel = NotificationChannel::new(
                &self.settings,
                Arc::clone(&self.socket_factory),
                self.dispatcher.clone(),
            );
            if let Some(metrics) = &self.metrics {
                channel = channel.with_metrics(Arc::clone(metrics));
            }

            let channel = Arc::new(channel);
            *slot = Some(Arc::clone(&channel));
            channel
        };

        channel.start().await
    }

    /// State of the notification channel, `None` before the first start
    pub async fn notification_state(&self) -> Option<ChannelState> {
        self.channel.lock().await.as_ref().map(|channel| channel.state())
    }

    /// Close the notification channel, if any
    ///
    /// RPC calls keep working afterwards.
    pub async fn dispose(&self) {
        let channel = self.channel.lock().await.clone();
        if let Some(channel) = channel {
            channel.dispose().await;
        }
    }
}

impl std::fmt::Debug for KodiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KodiClient")
            .field("settings", &self.settings)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
