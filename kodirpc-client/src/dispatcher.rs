//! Routing of notifications to registered handlers
//!
//! The dispatcher is an open registry: any method name can be subscribed to,
//! and each name holds an ordered list of handlers. Kodi pushes dozens of
//! notification kinds and new ones appear between releases, so nothing here
//! depends on a fixed set of names. The typed table in [`crate::events`] is
//! layered on top through [`EventDispatcher::on`].
//!
//! # Handler Semantics
//!
//! - Handlers for one message run synchronously, in registration order, on
//!   the task that calls [`EventDispatcher::dispatch`].
//! - Dispatch works on a snapshot of the handler list taken under the lock;
//!   the lock is released before any handler runs, so handlers may register
//!   or unregister freely.
//! - A handler removed while a dispatch is in flight is skipped for the rest
//!   of that dispatch.
//! - A failing handler (e.g. a typed handler whose payload does not decode)
//!   does not prevent the remaining handlers from running.
//!
//! # Examples
//!
//! ```rust
//! use kodirpc_client::EventDispatcher;
//! use kodirpc_core::NotificationMessage;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let dispatcher = EventDispatcher::new();
//! let plays = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&plays);
//! let id = dispatcher.register("Player.OnPlay", move |_sender, _data| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! let report = dispatcher.dispatch(&NotificationMessage::new("Player.OnPlay", "xbmc", None));
//! assert_eq!(report.invoked, 1);
//! assert_eq!(plays.load(Ordering::SeqCst), 1);
//!
//! assert!(dispatcher.unregister("Player.OnPlay", id));
//! ```

use crate::events::Notification;
use kodirpc_core::{Error, NotificationMessage, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Type-erased handler stored in the registry
pub type HandlerFn = dyn Fn(&NotificationMessage) -> Result<()> + Send + Sync;

/// Token identifying one registration, used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    active: Arc<AtomicBool>,
    handler: Arc<HandlerFn>,
}

#[derive(Default)]
struct Registry {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

/// Outcome of dispatching one message
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of handlers that ran
    pub invoked: usize,
    /// Handlers that returned an error, with the error
    pub failures: Vec<(HandlerId, Error)>,
}

impl DispatchReport {
    /// True if at least one handler ran
    pub fn handled(&self) -> bool {
        self.invoked > 0
    }

    /// True if no handler failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Method-name keyed registry of notification handlers
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Registry>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler receiving the sender and the raw `data` payload
    pub fn register<F>(&self, method: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&str, Option<&serde_json::Value>) + Send + Sync + 'static,
    {
        self.register_raw(method, move |msg: &NotificationMessage| {
            handler(&msg.sender, msg.data.as_ref());
            Ok(())
        })
    }

    /// Register a handler receiving `data` decoded into `T`
    ///
    /// An absent or `null` payload is passed as `None`. A payload that does
    /// not match `T` is reported as [`Error::Decode`] in the
    /// [`DispatchReport`] and the handler is not called.
    pub fn register_typed<T, F>(&self, method: impl Into<String>, handler: F) -> HandlerId
    where
        T: DeserializeOwned + 'static,
        F: Fn(&str, Option<T>) + Send + Sync + 'static,
    {
        self.register_raw(method, move |msg: &NotificationMessage| {
            let data = match msg.data.as_ref() {
                Some(value) if !value.is_null() => Some(T::deserialize(value).map_err(|e| {
                    Error::Decode(format!("{} payload: {}", msg.method, e))
                })?),
                _ => None,
            };
            handler(&msg.sender, data);
            Ok(())
        })
    }

    /// Register a typed handler for a known notification
    ///
    /// ```rust
    /// use kodirpc_client::events::PlayerOnStop;
    /// use kodirpc_client::EventDispatcher;
    ///
    /// let dispatcher = EventDispatcher::new();
    /// dispatcher.on::<PlayerOnStop, _>(|_sender, data| {
    ///     if let Some(stop) = data {
    ///         println!("stopped, reached end: {}", stop.end);
    ///     }
    /// });
    /// ```
    pub fn on<N, F>(&self, handler: F) -> HandlerId
    where
        N: Notification,
        F: Fn(&str, Option<N::Data>) + Send + Sync + 'static,
    {
        self.register_typed::<N::Data, F>(N::METHOD, handler)
    }

    /// Register a handler that sees the whole message and may fail
    pub fn register_raw<F>(&self, method: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&NotificationMessage) -> Result<()> + Send + Sync + 'static,
    {
        let method = method.into();
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Registration {
            id,
            active: Arc::new(AtomicBool::new(true)),
            handler: Arc::new(handler),
        };

        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.clone())
            .or_default()
            .push(registration);

        tracing::debug!(method = %method, handler = %id, "Registered notification handler");
        id
    }

    /// Remove one registration, returning whether it existed
    pub fn unregister(&self, method: &str, id: HandlerId) -> bool {
        let mut handlers = self.inner.handlers.write().unwrap_or_else(PoisonError::into_inner);

        let Some(list) = handlers.get_mut(method) else {
            return false;
        };
        let Some(index) = list.iter().position(|r| r.id == id) else {
            return false;
        };

        let removed = list.remove(index);
        removed.active.store(false, Ordering::Release);
        if list.is_empty() {
            handlers.remove(method);
        }
        true
    }

    /// Remove every handler for `method`, returning how many were removed
    pub fn clear(&self, method: &str) -> usize {
        let removed = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(method)
            .unwrap_or_default();

        for registration in &removed {
            registration.active.store(false, Ordering::Release);
        }
        removed.len()
    }

    /// Number of handlers registered for `method`
    pub fn handler_count(&self, method: &str) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .map_or(0, Vec::len)
    }

    /// Check if any handler is registered for `method`
    pub fn has_handler(&self, method: &str) -> bool {
        self.handler_count(method) > 0
    }

    /// Method names with at least one handler
    pub fn methods(&self) -> Vec<String> {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Deliver `msg` to every handler registered for its method
    ///
    /// Unknown methods produce an empty report.
    pub fn dispatch(&self, msg: &NotificationMessage) -> DispatchReport {
        let snapshot = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&msg.method)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        if snapshot.is_empty() {
            tracing::trace!(method = %msg.method, "No handler for notification");
            return report;
        }

        for registration in snapshot {
            if !registration.active.load(Ordering::Acquire) {
                continue;
            }

            report.invoked += 1;
            if let Err(e) = (registration.handler)(msg) {
                tracing::warn!(
                    method = %msg.method,
                    handler = %registration.id,
                    error = %e,
                    "Notification handler failed"
                );
                report.failures.push((registration.id, e));
            }
        }

        report
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("methods", &self.methods())
            .finish()
    }
}
