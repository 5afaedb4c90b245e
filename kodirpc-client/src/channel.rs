//! Notification channel lifecycle
//!
//! The channel owns the TCP connection Kodi pushes notifications over, and
//! the background task that reads it. Bytes go through a
//! [`NotificationFramer`], each recovered frame becomes a
//! [`NotificationMessage`], and messages are handed to the shared
//! [`EventDispatcher`].
//!
//! # Channel States
//!
//! ```text
//! Idle → Connecting → Listening → Closed
//!   └──────────┴────────────────────↗
//! ```
//!
//! - **Idle**: created, nothing opened yet
//! - **Connecting**: waiting for the socket factory
//! - **Listening**: read task running
//! - **Closed**: terminal; the stream has been released
//!
//! The read task ends on disposal, end of stream, a read error or an
//! oversized frame. In every case it releases the stream and moves the
//! channel to `Closed`. Nothing reconnects automatically; create a new
//! channel to listen again.
//!
//! # Examples
//!
//! ```rust,no_run
//! use kodirpc_client::{ConnectionSettings, EventDispatcher, NotificationChannel, TcpSocketFactory};
//! use std::sync::Arc;
//!
//! # async fn example() -> kodirpc_core::Result<()> {
//! let dispatcher = EventDispatcher::new();
//! dispatcher.register("Player.OnPlay", |sender, _| println!("play from {}", sender));
//!
//! let settings = ConnectionSettings::new("192.168.1.20");
//! let channel = NotificationChannel::new(&settings, Arc::new(TcpSocketFactory), dispatcher);
//! channel.start().await?;
//!
//! // ...
//! channel.dispose().await;
//! # Ok(())
//! # }
//! ```

use crate::config::ConnectionSettings;
use crate::dispatcher::EventDispatcher;
use crate::framer::NotificationFramer;
use crate::metrics::ClientMetrics;
use crate::transport::{NotificationStream, SocketFactory};
use kodirpc_core::{Error, NotificationMessage, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Bytes requested per socket read
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Lifecycle state of a [`NotificationChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Created, not started
    Idle,
    /// Opening the connection
    Connecting,
    /// Reading notifications
    Listening,
    /// Finished, cannot be restarted
    Closed,
}

impl ChannelState {
    fn as_u8(self) -> u8 {
        match self {
            ChannelState::Idle => 0,
            ChannelState::Connecting => 1,
            ChannelState::Listening => 2,
            ChannelState::Closed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ChannelState::Idle,
            1 => ChannelState::Connecting,
            2 => ChannelState::Listening,
            _ => ChannelState::Closed,
        }
    }

    /// Numeric value reported on the state gauge
    pub fn as_gauge(self) -> i64 {
        i64::from(self.as_u8())
    }

    /// Check if the state is terminal
    pub fn is_closed(self) -> bool {
        self == ChannelState::Closed
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Listening => "listening",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State shared between the channel handle and its read task
struct StateCell {
    state: AtomicU8,
    metrics: Option<Arc<ClientMetrics>>,
}

impl StateCell {
    fn get(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: ChannelState) {
        self.state.store(state.as_u8(), Ordering::Release);
        self.report(state);
    }

    fn transition(&self, from: ChannelState, to: ChannelState) -> bool {
        let moved = self
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            self.report(to);
        }
        moved
    }

    fn report(&self, state: ChannelState) {
        if let Some(metrics) = &self.metrics {
            metrics.update_channel_state(state);
        }
    }
}

/// Long-lived TCP listener for server-pushed notifications
pub struct NotificationChannel {
    host: String,
    port: u16,
    max_frame_size: usize,
    factory: Arc<dyn SocketFactory>,
    dispatcher: EventDispatcher,
    metrics: Option<Arc<ClientMetrics>>,
    state: Arc<StateCell>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl NotificationChannel {
    /// Create an idle channel for the peer in `settings`
    pub fn new(
        settings: &ConnectionSettings,
        factory: Arc<dyn SocketFactory>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            host: settings.host.clone(),
            port: settings.tcp_port,
            max_frame_size: settings.max_frame_size,
            factory,
            dispatcher,
            metrics: None,
            state: Arc::new(StateCell {
                state: AtomicU8::new(ChannelState::Idle.as_u8()),
                metrics: None,
            }),
            shutdown,
            task: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    /// Record channel activity in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.state = Arc::new(StateCell {
            state: AtomicU8::new(self.state.get().as_u8()),
            metrics: Some(metrics.clone()),
        });
        self.metrics = Some(metrics);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.state.get()
    }

    /// Dispatcher notifications are delivered to
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Open the connection and start delivering notifications
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the channel is `Idle`, or if it was
    ///   disposed while connecting
    /// - [`Error::Transport`] if the connection cannot be opened; the channel
    ///   is `Closed` afterwards
    #[tracing::instrument(skip(self), fields(host = %self.host, port = self.port))]
    pub async fn start(&self) -> Result<()> {
        if !self.state.transition(ChannelState::Idle, ChannelState::Connecting) {
            return Err(Error::InvalidState(format!(
                "notification channel cannot start from state {}",
                self.state.get()
            )));
        }

        let mut shutdown = self.shutdown.subscribe();
        let connected = tokio::select! {
            result = self.factory.connect(&self.host, self.port) => result,
            _ = shutdown.wait_for(|stop| *stop) => {
                Err(Error::InvalidState("notification channel disposed while connecting".to_string()))
            }
        };

        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                self.state.set(ChannelState::Closed);
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(e.kind());
                }
                tracing::warn!(error = %e, "Failed to open notification channel");
                return Err(e);
            }
        };

        let mut task = self.task.lock().await;
        if !self.state.transition(ChannelState::Connecting, ChannelState::Listening) {
            return Err(Error::InvalidState(
                "notification channel disposed while connecting".to_string(),
            ));
        }

        let reader = ReadLoop {
            stream,
            framer: NotificationFramer::with_max_frame_size(self.max_frame_size),
            dispatcher: self.dispatcher.clone(),
            metrics: self.metrics.clone(),
            state: Arc::clone(&self.state),
            shutdown,
        };
        *task = Some(tokio::spawn(reader.run()));

        tracing::info!("Listening for notifications");
        Ok(())
    }

    /// Stop listening and release the connection
    ///
    /// Waits for the read task to finish. Only the first call does any
    /// work; later and concurrent calls return immediately.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown.send_replace(true);

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Notification read task ended abnormally");
            }
        }

        self.state.set(ChannelState::Closed);
        tracing::debug!("Notification channel disposed");
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        // Stop the read task even when dispose was never awaited
        self.shutdown.send_replace(true);
    }
}

impl fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Background task body: read, frame, dispatch
struct ReadLoop {
    stream: NotificationStream,
    framer: NotificationFramer,
    dispatcher: EventDispatcher,
    metrics: Option<Arc<ClientMetrics>>,
    state: Arc<StateCell>,
    shutdown: watch::Receiver<bool>,
}

impl ReadLoop {
    async fn run(mut self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            if *self.shutdown.borrow() {
                tracing::debug!("Notification read loop stopping on shutdown");
                break;
            }

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Notification channel handle dropped");
                        break;
                    }
                }
                read = self.stream.read(&mut buf) => match read {
                    Ok(0) => {
                        tracing::info!("Notification stream closed by peer");
                        break;
                    }
                    Ok(n) => {
                        if let Err(e) = self.process(&buf[..n]) {
                            tracing::warn!(error = %e, "Notification stream unusable, closing");
                            self.record_error(&e);
                            break;
                        }
                    }
                    Err(e) => {
                        let e = Error::from(e);
                        tracing::warn!(error = %e, "Notification stream read failed");
                        self.record_error(&e);
                        break;
                    }
                }
            }
        }

        let ReadLoop { stream, state, .. } = self;
        drop(stream);
        state.set(ChannelState::Closed);
    }

    /// Dispatch every frame the chunk completes, then report any framing error
    fn process(&mut self, chunk: &[u8]) -> Result<()> {
        let discarded_before = self.framer.discarded_bytes();
        let mut frames = Vec::new();
        let fed = self.framer.feed_into(chunk, &mut frames);
        if let Some(metrics) = &self.metrics {
            metrics.record_discarded(self.framer.discarded_bytes() - discarded_before);
        }

        for frame in frames {
            if *self.shutdown.borrow() {
                break;
            }

            let Some(message) = NotificationMessage::from_frame(frame) else {
                tracing::debug!("Dropping frame that is not a notification");
                continue;
            };

            tracing::debug!(method = %message.method, sender = %message.sender, "Notification received");
            let report = self.dispatcher.dispatch(&message);
            if let Some(metrics) = &self.metrics {
                metrics.record_notification(&message.method, report.handled(), report.failures.len());
            }
        }

        fed
    }

    fn record_error(&self, error: &Error) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(error.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
    use tokio::sync::mpsc;

    const PLAY: &str = r#"{"jsonrpc":"2.0","method":"Player.OnPlay","params":{"sender":"xbmc","data":{"player":{"playerid":1,"speed":1}}}}"#;

    /// Read half that counts how often it is dropped
    struct CountingStream {
        inner: DuplexStream,
        drops: Arc<AtomicUsize>,
    }

    impl AsyncRead for CountingStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl Drop for CountingStream {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Hands out one prepared stream, or refuses
    struct OneShotFactory {
        stream: std::sync::Mutex<Option<NotificationStream>>,
    }

    impl SocketFactory for OneShotFactory {
        fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<NotificationStream>> {
            let stream = self.stream.lock().unwrap().take();
            Box::pin(async move {
                stream.ok_or_else(|| Error::Transport(format!("connection to {}:{} refused", host, port)))
            })
        }
    }

    struct Harness {
        channel: NotificationChannel,
        peer: DuplexStream,
        drops: Arc<AtomicUsize>,
        received: mpsc::UnboundedReceiver<String>,
    }

    fn harness(settings: ConnectionSettings) -> Harness {
        let (local, peer) = tokio::io::duplex(64 * 1024);
        let drops = Arc::new(AtomicUsize::new(0));
        let stream = CountingStream {
            inner: local,
            drops: Arc::clone(&drops),
        };
        let factory = OneShotFactory {
            stream: std::sync::Mutex::new(Some(Box::new(stream))),
        };

        let dispatcher = EventDispatcher::new();
        let (tx, received) = mpsc::unbounded_channel();
        dispatcher.register("Player.OnPlay", move |sender, _| {
            let _ = tx.send(sender.to_string());
        });

        Harness {
            channel: NotificationChannel::new(&settings, Arc::new(factory), dispatcher),
            peer,
            drops,
            received,
        }
    }

    async fn wait_for_state(channel: &NotificationChannel, expected: ChannelState) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while channel.state() != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("channel did not reach expected state");
    }

    #[tokio::test]
    async fn test_start_dispatch_dispose() {
        let mut h = harness(ConnectionSettings::default());
        assert_eq!(h.channel.state(), ChannelState::Idle);

        h.channel.start().await.unwrap();
        assert_eq!(h.channel.state(), ChannelState::Listening);

        let (head, tail) = PLAY.split_at(40);
        h.peer.write_all(head.as_bytes()).await.unwrap();
        h.peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.peer.write_all(tail.as_bytes()).await.unwrap();

        let sender = tokio::time::timeout(Duration::from_secs(2), h.received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sender, "xbmc");

        h.channel.dispose().await;
        assert_eq!(h.channel.state(), ChannelState::Closed);
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);

        // Second dispose is a no-op
        h.channel.dispose().await;
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_dispose_releases_stream_once() {
        let h = harness(ConnectionSettings::default());
        let channel = Arc::new(h.channel);
        channel.start().await.unwrap();

        let (first, second) = (Arc::clone(&channel), Arc::clone(&channel));
        tokio::join!(first.dispose(), second.dispose());

        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_channel_cannot_restart() {
        let h = harness(ConnectionSettings::default());
        h.channel.start().await.unwrap();
        h.channel.dispose().await;

        let err = h.channel.start().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(h.channel.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let h = harness(ConnectionSettings::default());
        h.channel.start().await.unwrap();

        let err = h.channel.start().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(h.channel.state(), ChannelState::Listening);

        h.channel.dispose().await;
    }

    #[tokio::test]
    async fn test_peer_close_moves_to_closed() {
        let h = harness(ConnectionSettings::default());
        h.channel.start().await.unwrap();

        drop(h.peer);
        wait_for_state(&h.channel, ChannelState::Closed).await;
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);

        h.channel.dispose().await;
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_closes_channel() {
        let factory = OneShotFactory {
            stream: std::sync::Mutex::new(None),
        };
        let channel = NotificationChannel::new(
            &ConnectionSettings::new("kodi.local"),
            Arc::new(factory),
            EventDispatcher::new(),
        );

        let err = channel.start().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(channel.state(), ChannelState::Closed);

        let err = channel.start().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_dispose_idle_channel() {
        let h = harness(ConnectionSettings::default());
        h.channel.dispose().await;
        assert_eq!(h.channel.state(), ChannelState::Closed);
        assert!(h.channel.start().await.is_err());
        // Never connected, so the stream was never taken
        assert_eq!(h.drops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_channel() {
        let mut h = harness(ConnectionSettings::default().max_frame_size(32));
        h.channel.start().await.unwrap();

        h.peer
            .write_all(br#"{"method":"Player.OnPropertyChanged","params":{"sender":"#)
            .await
            .unwrap();

        wait_for_state(&h.channel, ChannelState::Closed).await;
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
        assert!(h.received.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_frames_ahead_of_oversized_remainder_are_dispatched() {
        let mut h = harness(ConnectionSettings::default().max_frame_size(32));
        h.channel.start().await.unwrap();

        let chunk = format!(r#"{}{{"method":"Player.OnPropertyChanged","params":{{"sender":"#, PLAY);
        h.peer.write_all(chunk.as_bytes()).await.unwrap();

        let sender = tokio::time::timeout(Duration::from_secs(2), h.received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sender, "xbmc");

        wait_for_state(&h.channel, ChannelState::Closed).await;
        assert_eq!(h.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_dispatch_after_dispose() {
        let mut h = harness(ConnectionSettings::default());
        h.channel.start().await.unwrap();
        h.channel.dispose().await;

        // The read side is gone, so the write may fail
        let _ = h.peer.write_all(PLAY.as_bytes()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.received.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_notification_frames_are_skipped() {
        let mut h = harness(ConnectionSettings::default());
        h.channel.start().await.unwrap();

        let chunk = format!(r#"{{"jsonrpc":"2.0","id":1,"result":"OK"}}{}"#, PLAY);
        h.peer.write_all(chunk.as_bytes()).await.unwrap();

        let sender = tokio::time::timeout(Duration::from_secs(2), h.received.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sender, "xbmc");
        assert_eq!(h.channel.state(), ChannelState::Listening);

        h.channel.dispose().await;
    }

    #[test]
    fn test_state_encoding() {
        for state in [
            ChannelState::Idle,
            ChannelState::Connecting,
            ChannelState::Listening,
            ChannelState::Closed,
        ] {
            assert_eq!(ChannelState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ChannelState::Listening.to_string(), "listening");
        assert!(ChannelState::Closed.is_closed());
    }
}
