//! Notification records and the values a listener yields
//!
//! A [`Notification`] is one `NOTIFY` as reported by the driver. A
//! [`ListenEvent`] is one element of a notification sequence.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgNotification;

/// A notification received on a subscribed channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Channel the notification was sent on
    pub channel: String,
    /// Payload text, empty when none was given
    pub payload: String,
    /// Backend process id of the sending session
    pub process_id: u32,
    /// When this process read the notification (UTC)
    pub received_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>, process_id: u32) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            process_id,
            received_at: Utc::now(),
        }
    }

    /// Decode the payload as JSON
    pub fn payload_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

impl From<PgNotification> for Notification {
    fn from(notification: PgNotification) -> Self {
        Self::new(
            notification.channel(),
            notification.payload(),
            notification.process_id(),
        )
    }
}

/// One element of a notification sequence
#[derive(Debug, Clone, PartialEq)]
pub enum ListenEvent {
    /// A single notification (default delivery)
    Notification(Notification),
    /// Everything drained in one cycle, in arrival order
    Batch(Vec<Notification>),
    /// The wait elapsed with nothing to report
    Timeout,
    /// First delivery of a watched signal, as its signal number
    Signal(i32),
}

impl ListenEvent {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ListenEvent::Timeout)
    }

    pub fn as_signal(&self) -> Option<i32> {
        match self {
            ListenEvent::Signal(signal) => Some(*signal),
            _ => None,
        }
    }

    /// Notifications carried by this event, in arrival order
    pub fn notifications(&self) -> &[Notification] {
        match self {
            ListenEvent::Notification(notification) => std::slice::from_ref(notification),
            ListenEvent::Batch(batch) => batch,
            ListenEvent::Timeout | ListenEvent::Signal(_) => &[],
        }
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        match self {
            ListenEvent::Notification(notification) => vec![notification],
            ListenEvent::Batch(batch) => batch,
            ListenEvent::Timeout | ListenEvent::Signal(_) => Vec::new(),
        }
    }
}
