//! Common test utilities for kodirpc-client integration tests
//!
//! A mock Kodi notification endpoint (plain TCP, no framing) and helpers
//! for building wire messages.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

enum Command {
    Write(Vec<u8>),
    Close,
}

/// Mock Kodi TCP endpoint that writes whatever the test tells it to
///
/// Connections are served one after another. Each connection forwards
/// queued writes until the test closes it or the client goes away.
pub struct MockNotificationServer {
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<Command>,
    accepted: mpsc::UnboundedReceiver<()>,
    client_closed: mpsc::UnboundedReceiver<()>,
}

impl MockNotificationServer {
    /// Bind to an ephemeral port and start accepting
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (commands, mut command_rx) = mpsc::unbounded_channel::<Command>();
        let (accepted_tx, accepted) = mpsc::unbounded_channel();
        let (closed_tx, client_closed) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = accepted_tx.send(());
                let mut buf = [0u8; 256];

                loop {
                    tokio::select! {
                        command = command_rx.recv() => match command {
                            Some(Command::Write(bytes)) => {
                                if socket.write_all(&bytes).await.is_err() {
                                    break;
                                }
                                let _ = socket.flush().await;
                            }
                            Some(Command::Close) => break,
                            None => return,
                        },
                        read = socket.read(&mut buf) => {
                            if matches!(read, Ok(0) | Err(_)) {
                                let _ = closed_tx.send(());
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            addr,
            commands,
            accepted,
            client_closed,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Queue one write on the current connection
    pub fn write(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.commands.send(Command::Write(bytes.into()));
    }

    /// Write each chunk separately, pausing in between so the client sees
    /// them as separate reads
    pub async fn write_chunks(&self, chunks: &[&[u8]]) {
        for chunk in chunks {
            self.write(chunk.to_vec());
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
    }

    /// Close the current connection from the server side
    pub fn close_connection(&self) {
        let _ = self.commands.send(Command::Close);
    }

    /// Wait until a client has connected
    pub async fn wait_for_client(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.accepted.recv())
            .await
            .expect("no client connected")
            .expect("server task ended");
    }

    /// Wait until the client side of the connection has gone away
    pub async fn wait_for_client_close(&mut self) {
        tokio::time::timeout(Duration::from_secs(5), self.client_closed.recv())
            .await
            .expect("client did not close the connection")
            .expect("server task ended");
    }
}

/// Notification exactly as Kodi writes it
pub fn notification(method: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": {
            "sender": "xbmc",
            "data": data
        }
    })
    .to_string()
}

/// `Player.OnPlay` for the given player id
pub fn player_on_play(playerid: i64) -> String {
    notification(
        "Player.OnPlay",
        serde_json::json!({
            "item": {"id": 12, "type": "episode"},
            "player": {"playerid": playerid, "speed": 1}
        }),
    )
}

/// JSON-RPC success body
pub fn rpc_result(id: u32, result: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
    .to_string()
}

/// JSON-RPC error body
pub fn rpc_error(id: u32, code: i64, message: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
    .to_string()
}

/// Receive from `rx` or fail the test after a timeout
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for value")
        .expect("channel closed")
}
