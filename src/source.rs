//! The driver side of a listener
//!
//! [`NotificationSource`] is everything the poller needs from a database
//! connection. `PgListener` is the production implementation.

use async_trait::async_trait;
use sqlx::postgres::PgListener;

use crate::notification::Notification;

#[async_trait]
pub trait NotificationSource: Send {
    /// Subscribe to `channel`, quoting it as an identifier
    async fn listen(&mut self, channel: &str) -> Result<(), sqlx::Error>;

    /// Wait for the next notification; `None` means the connection closed
    ///
    /// Must be cancel-safe: dropping the future before it completes loses no
    /// notification.
    async fn recv(&mut self) -> Result<Option<Notification>, sqlx::Error>;

    /// A notification already buffered on the connection, without waiting
    fn next_buffered(&mut self) -> Option<Notification>;
}

#[async_trait]
impl NotificationSource for PgListener {
    async fn listen(&mut self, channel: &str) -> Result<(), sqlx::Error> {
        // Sends LISTEN "<channel>" with embedded quotes doubled
        PgListener::listen(self, channel).await
    }

    async fn recv(&mut self) -> Result<Option<Notification>, sqlx::Error> {
        Ok(self.try_recv().await?.map(Notification::from))
    }

    fn next_buffered(&mut self) -> Option<Notification> {
        PgListener::next_buffered(self).map(Notification::from)
    }
}
