//! Client metrics definitions
//!
//! OpenTelemetry instruments for both channels. They are only created when
//! metrics are enabled through [`crate::ClientBuilder::with_observability`];
//! otherwise nothing is recorded.
//!
//! # Metrics Collected
//!
//! - **calls_total**: RPC calls by method and status (counter)
//! - **call_duration**: RPC latency in seconds (histogram)
//! - **errors_total**: errors by kind (counter)
//! - **notifications_received**: notifications by method (counter)
//! - **notifications_unhandled**: notifications nobody subscribed to (counter)
//! - **handler_failures**: handlers that returned an error (counter)
//! - **discarded_bytes**: malformed stream bytes thrown away (counter)
//! - **channel_state**: notification channel state (gauge)
//!
//! # Examples
//!
//! ```rust,no_run
//! use kodirpc_client::ClientMetrics;
//!
//! let metrics = ClientMetrics::new("living-room-kodi");
//! metrics.record_call("Player.GetActivePlayers", "success", 0.012);
//! ```

use crate::channel::ChannelState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// OpenTelemetry instruments for one client
pub struct ClientMetrics {
    /// Channel state (0=idle, 1=connecting, 2=listening, 3=closed)
    pub channel_state: Gauge<i64>,
    /// Total number of RPC calls
    pub calls_total: Counter<u64>,
    /// RPC call duration in seconds
    pub call_duration: Histogram<f64>,
    /// Total number of errors
    pub errors_total: Counter<u64>,
    /// Total number of notifications received
    pub notifications_received: Counter<u64>,
    /// Notifications that reached no handler
    pub notifications_unhandled: Counter<u64>,
    /// Handler invocations that failed
    pub handler_failures: Counter<u64>,
    /// Malformed bytes dropped by the framer
    pub discarded_bytes: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            channel_state: meter
                .i64_gauge("kodirpc.client.channel.state")
                .with_description("Notification channel state (0=idle, 1=connecting, 2=listening, 3=closed)")
                .build(),
            calls_total: meter
                .u64_counter("kodirpc.client.calls.total")
                .with_description("Total number of RPC calls")
                .build(),
            call_duration: meter
                .f64_histogram("kodirpc.client.call.duration")
                .with_description("RPC call duration in seconds")
                .build(),
            errors_total: meter
                .u64_counter("kodirpc.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            notifications_received: meter
                .u64_counter("kodirpc.client.notifications.received")
                .with_description("Total number of notifications received")
                .build(),
            notifications_unhandled: meter
                .u64_counter("kodirpc.client.notifications.unhandled")
                .with_description("Notifications with no registered handler")
                .build(),
            handler_failures: meter
                .u64_counter("kodirpc.client.handler.failures")
                .with_description("Notification handlers that returned an error")
                .build(),
            discarded_bytes: meter
                .u64_counter("kodirpc.client.stream.discarded_bytes")
                .with_description("Malformed notification stream bytes discarded")
                .build(),
        }
    }

    /// Update the channel state gauge
    pub fn update_channel_state(&self, state: ChannelState) {
        self.channel_state.record(state.as_gauge(), &[]);
    }

    /// Record one RPC call
    pub fn record_call(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    /// Record an error by kind
    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("error_type", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a dispatched notification
    pub fn record_notification(&self, method: &str, handled: bool, failures: usize) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.notifications_received.add(1, attributes);
        if !handled {
            self.notifications_unhandled.add(1, attributes);
        }
        if failures > 0 {
            self.handler_failures.add(failures as u64, attributes);
        }
    }

    /// Record bytes dropped by the framer
    pub fn record_discarded(&self, bytes: u64) {
        if bytes > 0 {
            self.discarded_bytes.add(bytes, &[]);
        }
    }
}
