//! Kodi JSON-RPC client over HTTP and TCP
//!
//! This crate talks to one Kodi (formerly XBMC) media center over its two
//! JSON-RPC channels:
//!
//! - **RPC channel**: JSON-RPC 2.0 over HTTP POST to the web server, one
//!   call, one reply ([`RpcInvoker`])
//! - **Notification channel**: a raw TCP stream on which Kodi pushes
//!   notification objects back-to-back with no framing
//!   ([`NotificationChannel`], [`NotificationFramer`])
//!
//! Notifications are routed by method name through an open registry
//! ([`EventDispatcher`]); the [`events`] module adds typed payloads for the
//! notifications Kodi is known to send.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kodirpc_client::events::PlayerOnPlay;
//! use kodirpc_client::{ConnectionSettings, KodiClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KodiClient::new(ConnectionSettings::new("192.168.1.20"))?;
//!
//!     // Make a call
//!     let pong: String = client.call("JSONRPC.Ping", ()).await?;
//!     println!("Result: {}", pong);
//!
//!     // Handle notifications
//!     client.on::<PlayerOnPlay, _>(|_sender, data| {
//!         if let Some(play) = data {
//!             println!("Player {} started", play.player.playerid);
//!         }
//!     });
//!     client.on_notification("System.OnQuit", |_, _| println!("Kodi is quitting"));
//!
//!     client.start_notification_listener().await?;
//!     tokio::signal::ctrl_c().await?;
//!     client.dispose().await;
//!
//!     Ok(())
//! }
//! ```

mod channel;
mod client;
mod client_builder;
mod config;
mod dispatcher;
pub mod events;
mod framer;
mod invoker;
mod metrics;
mod transport;

pub use channel::{ChannelState, NotificationChannel};
pub use client::KodiClient;
pub use client_builder::ClientBuilder;
pub use config::{
    ConnectionSettings, Credentials, DEFAULT_HTTP_PORT, DEFAULT_JSON_PATH, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_TCP_PORT,
};
pub use dispatcher::{DispatchReport, EventDispatcher, HandlerFn, HandlerId};
pub use events::Notification;
pub use framer::NotificationFramer;
pub use invoker::RpcInvoker;
pub use metrics::ClientMetrics;
pub use transport::{
    HttpTransport, NotificationStream, ReqwestTransport, SocketFactory, TcpSocketFactory,
};
