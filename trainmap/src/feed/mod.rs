//! Feed consumer: live vehicle snapshots over WebSocket.
//!
//! The connection task only moves text. Each inbound frame is forwarded to
//! the session as [`SessionEvent::FeedMessage`], where it is decoded and
//! validated before any registry mutation; connection changes are reported
//! as [`SessionEvent::FeedStatus`].
//!
//! ```text
//!   ws://.../  ──frames──►  FeedConnection  ──SessionEvent──►  MapSession
//!                              │ reconnect with backoff
//!                              └ 1s, 2s, 4s ... max_backoff
//! ```
//!
//! [`SessionEvent::FeedMessage`]: crate::session::SessionEvent::FeedMessage
//! [`SessionEvent::FeedStatus`]: crate::session::SessionEvent::FeedStatus

mod connection;

pub use connection::{FeedConnection, DEFAULT_MAX_BACKOFF_SECS};

use std::fmt;

use thiserror::Error;

/// Errors from the feed connection.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("feed stream error: {0}")]
    Stream(String),

    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Connection state of the live feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedStatus {
    /// No connection attempt has completed yet.
    #[default]
    Connecting,
    Connected,
    /// Live updates paused; the connection task is retrying.
    Disconnected,
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedStatus::Connecting => write!(f, "connecting"),
            FeedStatus::Connected => write!(f, "connected"),
            FeedStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}
