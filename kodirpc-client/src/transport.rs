//! Transport capabilities consumed by the invoker and the notification channel
//!
//! The bridge never opens sockets or HTTP connections directly. It goes
//! through two small traits so that hosts (and tests) can substitute their
//! own plumbing:
//!
//! - [`HttpTransport`]: "POST these bytes, give me the response bytes"
//! - [`SocketFactory`]: "connect to host:port, give me a readable stream"
//!
//! Default implementations are [`ReqwestTransport`] and
//! [`TcpSocketFactory`].

use crate::config::Credentials;
use futures::future::BoxFuture;
use kodirpc_core::{Error, Result};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;

/// Readable half of a notification connection
///
/// Dropping the stream releases the connection.
pub type NotificationStream = Box<dyn AsyncRead + Send + Unpin>;

/// HTTP POST capability used by [`crate::RpcInvoker`]
pub trait HttpTransport: Send + Sync {
    /// POST `body` as `application/json` to `url` and return the full
    /// response body
    ///
    /// Connection failures, timeouts and non-2xx statuses must be reported
    /// as [`Error::Transport`].
    fn post<'a>(
        &'a self,
        url: &'a str,
        credentials: Option<&'a Credentials>,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Stream capability used by [`crate::NotificationChannel`]
pub trait SocketFactory: Send + Sync {
    /// Open a connection to `host:port`
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<NotificationStream>>;
}

/// [`HttpTransport`] backed by `reqwest`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport without a request timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    /// Create a transport with an optional whole-request timeout
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        credentials: Option<&'a Credentials>,
        body: Vec<u8>,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let mut request = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
            if let Some(credentials) = credentials {
                request = request.basic_auth(&credentials.username, Some(&credentials.password));
            }

            let response = request.send().await.map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Transport(format!("HTTP status {}", status)));
            }

            let bytes = response.bytes().await.map_err(transport_error)?;
            Ok(bytes.to_vec())
        })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Transport(format!("request timed out: {}", err))
    } else if err.is_connect() {
        Error::Transport(format!("connection failed: {}", err))
    } else {
        Error::Transport(err.to_string())
    }
}

/// [`SocketFactory`] backed by tokio's `TcpStream`
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpSocketFactory;

impl SocketFactory for TcpSocketFactory {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<NotificationStream>> {
        Box::pin(async move {
            let stream = TcpStream::connect((host, port))
                .await
                .map_err(|e| Error::Transport(format!("failed to connect to {}:{}: {}", host, port, e)))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as NotificationStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_factory_connects_and_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"{}").await.unwrap();
        });

        let mut stream = TcpSocketFactory.connect("127.0.0.1", port).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"{}");
    }

    #[tokio::test]
    async fn test_tcp_factory_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = match TcpSocketFactory.connect("127.0.0.1", port).await {
            Ok(_) => panic!("Expected connection failure"),
            Err(e) => e,
        };
        assert!(err.is_transport());
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
        assert!(ReqwestTransport::with_timeout(Some(Duration::from_secs(2))).is_ok());
    }
}
