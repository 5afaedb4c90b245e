//! Connection settings shared by the RPC and notification paths
//!
//! Both channels talk to the same Kodi instance, so they share one
//! [`ConnectionSettings`]: the host, the web server port used for HTTP
//! JSON-RPC, the raw TCP port used for notifications, and the optional
//! web server credentials.
//!
//! Settings derive `Deserialize` with per-field defaults so an application
//! can load them from whatever configuration format it already uses.
//!
//! # Examples
//!
//! ```rust
//! use kodirpc_client::ConnectionSettings;
//! use std::time::Duration;
//!
//! let settings = ConnectionSettings::new("192.168.1.20")
//!     .http_port(8080)
//!     .tcp_port(9090)
//!     .credentials("kodi", "secret")
//!     .request_timeout(Duration::from_secs(5));
//!
//! assert_eq!(settings.json_interface_address(), "http://192.168.1.20:8080/jsonrpc");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default Kodi web server port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default Kodi JSON-RPC TCP port
pub const DEFAULT_TCP_PORT: u16 = 9090;
/// Default path of the JSON-RPC endpoint on the web server
pub const DEFAULT_JSON_PATH: &str = "/jsonrpc";
/// Default bound on bytes buffered for one notification
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// HTTP basic-auth credentials for the Kodi web server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Address and session configuration for one Kodi peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Host name or IP address
    pub host: String,
    /// Web server port (RPC channel)
    pub http_port: u16,
    /// Raw TCP port (notification channel)
    pub tcp_port: u16,
    /// Path of the JSON-RPC endpoint
    pub json_path: String,
    /// Web server credentials
    pub credentials: Option<Credentials>,
    /// Whole-request timeout for RPC calls, in milliseconds
    pub request_timeout_ms: Option<u64>,
    /// Maximum bytes buffered while waiting for a notification to complete
    pub max_frame_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            http_port: DEFAULT_HTTP_PORT,
            tcp_port: DEFAULT_TCP_PORT,
            json_path: DEFAULT_JSON_PATH.to_string(),
            credentials: None,
            request_timeout_ms: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ConnectionSettings {
    /// Settings for `host` with default ports
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set the web server port
    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Set the notification TCP port
    pub fn tcp_port(mut self, port: u16) -> Self {
        self.tcp_port = port;
        self
    }

    /// Set the JSON-RPC endpoint path
    pub fn json_path(mut self, path: impl Into<String>) -> Self {
        self.json_path = path.into();
        self
    }

    /// Set web server credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Set the RPC request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the notification buffer bound
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// RPC request timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Full URL of the HTTP JSON-RPC endpoint
    pub fn json_interface_address(&self) -> String {
        let path = if self.json_path.starts_with('/') {
            self.json_path.clone()
        } else {
            format!("/{}", self.json_path)
        };
        format!("http://{}:{}{}", self.host, self.http_port, path)
    }
}
