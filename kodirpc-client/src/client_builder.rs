//! Client builder for transports and observability
//!
//! The `ClientBuilder` provides a fluent API for assembling a
//! [`KodiClient`]. It allows you to:
//! - Replace the HTTP transport or the socket factory
//! - Share an existing [`EventDispatcher`]
//! - Configure observability (OpenTelemetry)
//! - Set service name for telemetry
//!
//! # Examples
//!
//! ```rust,no_run
//! use kodirpc_client::{ClientBuilder, ConnectionSettings};
//!
//! # fn example() -> kodirpc_core::Result<()> {
//! let settings = ConnectionSettings::new("192.168.1.20").credentials("kodi", "secret");
//!
//! let client = ClientBuilder::new(settings)
//!     .with_default_observability()
//!     .service_name("living-room")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::client::KodiClient;
use crate::config::ConnectionSettings;
use crate::dispatcher::EventDispatcher;
use crate::invoker::RpcInvoker;
use crate::metrics::ClientMetrics;
use crate::transport::{HttpTransport, ReqwestTransport, SocketFactory, TcpSocketFactory};
use kodirpc_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builder for configuring and creating a [`KodiClient`]
pub struct ClientBuilder {
    settings: ConnectionSettings,
    http_transport: Option<Arc<dyn HttpTransport>>,
    socket_factory: Option<Arc<dyn SocketFactory>>,
    dispatcher: Option<EventDispatcher>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            http_transport: None,
            socket_factory: None,
            dispatcher: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Use a custom HTTP transport for RPC calls
    pub fn with_http_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.http_transport = Some(transport);
        self
    }

    /// Use a custom socket factory for the notification channel
    pub fn with_socket_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.socket_factory = Some(factory);
        self
    }

    /// Deliver notifications to an existing dispatcher
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client
    ///
    /// Nothing is connected yet: RPC calls open HTTP connections on demand
    /// and the notification channel opens on
    /// [`KodiClient::start_notification_listener`].
    pub fn build(self) -> Result<KodiClient> {
        let metrics = if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            kodirpc_core::init_observability(config.clone())
                .map_err(|e| Error::Config(format!("Failed to initialize observability: {}", e)))?;

            Some(Arc::new(ClientMetrics::new(config.service_name)))
        } else {
            None
        };

        let transport: Arc<dyn HttpTransport> = match self.http_transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_timeout(self.settings.timeout())?),
        };

        let mut invoker = RpcInvoker::new(&self.settings, transport);
        if let Some(metrics) = &metrics {
            invoker = invoker.with_metrics(Arc::clone(metrics));
        }

        tracing::debug!(
            endpoint = %invoker.endpoint(),
            tcp_port = self.settings.tcp_port,
            "Kodi client built"
        );

        Ok(KodiClient {
            settings: Arc::new(self.settings),
            invoker: Arc::new(invoker),
            dispatcher: self.dispatcher.unwrap_or_default(),
            socket_factory: self
                .socket_factory
                .unwrap_or_else(|| Arc::new(TcpSocketFactory)),
            channel: Arc::new(Mutex::new(None)),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new(ConnectionSettings::default());

        assert!(builder.http_transport.is_none());
        assert!(builder.socket_factory.is_none());
        assert!(builder.dispatcher.is_none());
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::new("test-client")
            .with_endpoint("http://localhost:4317")
            .with_log_level("debug");

        let builder = ClientBuilder::new(ConnectionSettings::default()).with_observability(config);

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "test-client");
        assert_eq!(obs_config.log_level, "debug");
    }

    #[test]
    fn test_builder_default_observability() {
        let builder = ClientBuilder::new(ConnectionSettings::default()).with_default_observability();

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "kodirpc");
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClientBuilder::new(ConnectionSettings::new("htpc"))
            .with_socket_factory(Arc::new(TcpSocketFactory))
            .with_dispatcher(EventDispatcher::new())
            .service_name("test-service")
            .with_default_observability();

        assert!(builder.socket_factory.is_some());
        assert!(builder.dispatcher.is_some());
        assert!(builder.observability_config.is_some());
        assert_eq!(builder.service_name, Some("test-service".to_string()));
    }

    #[test]
    fn test_build_without_observability() {
        let dispatcher = EventDispatcher::new();
        dispatcher.register("System.OnQuit", |_, _| {});

        let client = ClientBuilder::new(ConnectionSettings::new("htpc").json_path("/rpc"))
            .with_dispatcher(dispatcher.clone())
            .build()
            .unwrap();

        assert!(client.metrics.is_none());
        assert_eq!(client.invoker().endpoint(), "http://htpc:8080/rpc");
        assert!(client.dispatcher().has_handler("System.OnQuit"));
    }
}
