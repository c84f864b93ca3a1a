//! Error types for the pgnotify crate
//!
//! This module contains all error types that can be returned while resolving a
//! listen target, subscribing, waiting for notifications or sending them.

use signal_bridge::SignalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListenError {
    #[error("Database connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Invalid listen target: {0}")]
    InvalidTarget(String),

    #[error("Failed to subscribe to channel {channel:?}: {source}")]
    Subscription {
        channel: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Listening cancelled by repeated signal {signal}")]
    Cancelled { signal: i32 },

    #[error("Database driver error: {0}")]
    Driver(#[from] sqlx::Error),

    #[error("Notification connection closed")]
    ConnectionClosed,

    #[error("Signal handling error: {0}")]
    Signal(#[from] SignalError),

    #[error("Invalid listen configuration: {0}")]
    Config(String),

    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ListenError {
    /// Whether the sequence was stopped by a repeated watched signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ListenError::Cancelled { .. })
    }
}
