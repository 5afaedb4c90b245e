//! Reassembly of notification messages from the raw TCP stream
//!
//! Kodi writes notification objects back-to-back on the socket with no
//! length prefix and no delimiter. A single read can end in the middle of an
//! object, and a single read can carry several objects, so message
//! boundaries have to be recovered from the JSON itself.
//!
//! # Algorithm
//!
//! The framer keeps one byte buffer. Every [`NotificationFramer::feed`]
//! appends the new chunk and then repeatedly parses one JSON value from the
//! front of the buffer:
//!
//! - a complete value is emitted and its bytes are consumed;
//! - running out of input inside a value means the message is not complete
//!   yet, and the remainder stays buffered for the next chunk;
//! - a syntax error means the front of the buffer can never become valid.
//!   If the bad value opened with `{` or `[`, the framer skips to the end of
//!   it, tracking nesting and strings, so objects nested inside the broken
//!   message are never emitted on their own. Otherwise it skips to the next
//!   `{` after the bad byte.
//!
//! Bytes are kept raw until a value is complete, which keeps multi-byte
//! UTF-8 sequences split across reads intact.
//!
//! # Examples
//!
//! ```rust
//! use kodirpc_client::NotificationFramer;
//!
//! let mut framer = NotificationFramer::new();
//!
//! let frames = framer.feed(br#"{"method":"Player.OnP"#).unwrap();
//! assert!(frames.is_empty());
//!
//! let frames = framer
//!     .feed(br#"lay","params":{"sender":"xbmc","data":{}}}"#)
//!     .unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0]["method"], "Player.OnPlay");
//! ```

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use kodirpc_core::{Error, Result};

/// Incremental splitter for a stream of concatenated JSON values
#[derive(Debug)]
pub struct NotificationFramer {
    buffer: Vec<u8>,
    max_frame_size: usize,
    discarded_bytes: u64,
    skip: Option<Skip>,
}

impl NotificationFramer {
    /// Create a framer with the default buffer bound
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a framer that gives up once more than `max_frame_size` bytes
    /// are buffered without completing a value
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_size,
            discarded_bytes: 0,
            skip: None,
        }
    }

    /// Append a chunk and return every value it completes, in stream order
    ///
    /// # Errors
    ///
    /// [`Error::FrameTooLarge`] when the incomplete remainder exceeds the
    /// bound. Values completed by the same chunk are dropped; use
    /// [`NotificationFramer::feed_into`] to keep them.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<serde_json::Value>> {
        let mut frames = Vec::new();
        self.feed_into(chunk, &mut frames)?;
        Ok(frames)
    }

    /// Append a chunk and push every value it completes onto `frames`
    ///
    /// Completed values are pushed before the bound is checked, so they are
    /// in `frames` even when this returns [`Error::FrameTooLarge`]. The
    /// buffer is cleared on that error.
    pub fn feed_into(&mut self, chunk: &[u8], frames: &mut Vec<serde_json::Value>) -> Result<()> {
        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;

        while consumed < self.buffer.len() {
            let pending = &self.buffer[consumed..];

            if let Some(skip) = self.skip.as_mut() {
                let closed = skip.advance(pending);
                let n = closed.unwrap_or(pending.len());
                skip.skipped += n;
                self.discarded_bytes += n as u64;
                consumed += n;

                if closed.is_some() {
                    tracing::warn!(discarded = skip.skipped, "Discarded malformed notification");
                    self.skip = None;
                } else if skip.skipped > self.max_frame_size {
                    tracing::warn!(
                        discarded = skip.skipped,
                        "Malformed notification never closed, resyncing on the next object"
                    );
                    self.skip = None;
                }
                continue;
            }

            let mut values = serde_json::Deserializer::from_slice(pending).into_iter::<serde_json::Value>();

            match values.next() {
                // Nothing but whitespace left
                None => consumed = self.buffer.len(),
                Some(Ok(value)) => {
                    consumed += values.byte_offset();
                    frames.push(value);
                }
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => {
                    let start = pending
                        .iter()
                        .position(|b| !b.is_ascii_whitespace())
                        .unwrap_or(pending.len());

                    if matches!(pending.get(start), Some(b'{' | b'[')) {
                        tracing::debug!(error = %e, "Malformed notification, skipping to its end");
                        self.discarded_bytes += start as u64;
                        consumed += start;
                        self.skip = Some(Skip {
                            skipped: start,
                            ..Skip::default()
                        });
                    } else {
                        let skip = resync_offset(pending);
                        tracing::warn!(
                            error = %e,
                            discarded = skip,
                            "Discarding malformed notification data"
                        );
                        self.discarded_bytes += skip as u64;
                        consumed += skip;
                    }
                }
            }
        }

        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_frame_size {
            let actual = self.buffer.len();
            self.reset();
            return Err(Error::FrameTooLarge {
                limit: self.max_frame_size,
                actual,
            });
        }

        Ok(())
    }

    /// Bytes waiting for the rest of their message
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes thrown away as malformed since creation
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.skip = None;
    }
}

impl Default for NotificationFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of bytes to skip so that `pending` starts at the next candidate
/// object after the first offending byte
fn resync_offset(pending: &[u8]) -> usize {
    let start = pending
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(pending.len());

    pending
        .get(start + 1..)
        .and_then(|rest| rest.iter().position(|&b| b == b'{'))
        .map(|pos| start + 1 + pos)
        .unwrap_or(pending.len())
}

/// Position inside a malformed array or object being thrown away
#[derive(Debug, Default, Clone, Copy)]
struct Skip {
    depth: usize,
    in_string: bool,
    escaped: bool,
    skipped: usize,
}

impl Skip {
    /// Scan `bytes`, returning the length up to and including the bracket
    /// that closes the value, or `None` if it is still open
    fn advance(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
