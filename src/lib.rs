//! kodirpc - Kodi JSON-RPC bridge
//!
//! This is the convenience crate that re-exports the kodirpc sub-crates.
//! Use it if you want a single dependency for talking to Kodi.
//!
//! # Architecture
//!
//! kodirpc is organized into two crates:
//!
//! - **kodirpc-core**: Wire types, codec, error handling, observability
//! - **kodirpc-client**: HTTP invoker, TCP notification channel, dispatcher
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kodirpc::{ConnectionSettings, KodiClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConnectionSettings::new("192.168.1.20").credentials("kodi", "secret");
//!     let client = KodiClient::new(settings)?;
//!
//!     let volume: serde_json::Value = client
//!         .call("Application.GetProperties", serde_json::json!({"properties": ["volume"]}))
//!         .await?;
//!     println!("Result: {}", volume);
//!
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under short names
pub use kodirpc_client as client;
pub use kodirpc_core as core;

// Convenience re-exports of the most commonly used types
pub use kodirpc_client::{events, ClientBuilder, ConnectionSettings, EventDispatcher, KodiClient};
pub use kodirpc_core::{Error, ObservabilityConfig, Result};
