//! Convenience re-exports for common pgnotify usage
//!
//! # Example
//!
//! ```rust
//! use pgnotify::prelude::*;
//!
//! let options = ListenOptions::new(["jobs"]).with_yield_on_timeout(true);
//! ```

pub use crate::errors::ListenError;
pub use crate::notification::{ListenEvent, Notification};
pub use crate::notify::{notify_json, pg_notify};
pub use crate::options::ListenOptions;
pub use crate::poller::{Notifications, PollState};
pub use crate::resolver::{ResolvedConnection, Target};
pub use crate::source::NotificationSource;
pub use crate::timeout::Timeout;
pub use crate::await_notifications;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, ListenConfig};

pub use signal_bridge::Signal;

// Common external dependencies
pub use async_trait::async_trait;
pub use sqlx;
pub use tokio;

// Commonly used sqlx types
pub use sqlx::PgPool;
pub use sqlx::postgres::PgListener;
