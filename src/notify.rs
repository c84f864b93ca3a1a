//! Sending notifications

use std::io;

use serde::Serialize;
use sqlx::postgres::{PgConnection, Postgres};
use sqlx::{Connection, Executor};

use crate::errors::ListenError;
use crate::resolver::Target;

// pg_notify takes the channel as text and matches it exactly like a quoted
// identifier in LISTEN; both values are bound, never spliced into the statement.
const NOTIFY_SQL: &str = "SELECT pg_notify($1, $2)";

/// Send `payload` on `channel`
///
/// `Url` and `Config` targets open a short-lived connection for this one
/// statement.
pub async fn pg_notify<'a>(
    target: impl Into<Target<'a>>,
    channel: &str,
    payload: &str,
) -> Result<(), ListenError> {
    match target.into() {
        Target::Url(url) => {
            if url.trim().is_empty() {
                return Err(ListenError::InvalidTarget(
                    "connection string cannot be empty".to_string(),
                ));
            }
            let connection = PgConnection::connect(&url)
                .await
                .map_err(ListenError::Connection)?;
            send_once(connection, channel, payload).await
        }
        Target::Config {
            options,
            connect_timeout,
        } => {
            let connecting = PgConnection::connect_with(&options);
            let connection = tokio::time::timeout(connect_timeout, connecting)
                .await
                .map_err(|_| {
                    ListenError::Connection(sqlx::Error::Io(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "timed out opening notify connection",
                    )))
                })?
                .map_err(ListenError::Connection)?;
            send_once(connection, channel, payload).await
        }
        Target::Pool(pool) => send(&pool, channel, payload).await,
        Target::Listener(listener) => send(listener, channel, payload).await,
    }
}

/// Send `value` serialized as JSON on `channel`
pub async fn notify_json<'a, T: Serialize>(
    target: impl Into<Target<'a>>,
    channel: &str,
    value: &T,
) -> Result<(), ListenError> {
    let payload = serde_json::to_string(value)?;
    pg_notify(target, channel, &payload).await
}

async fn send_once(
    mut connection: PgConnection,
    channel: &str,
    payload: &str,
) -> Result<(), ListenError> {
    let sent = send(&mut connection, channel, payload).await;
    connection.close().await?;
    sent
}

async fn send<'e, E>(executor: E, channel: &str, payload: &str) -> Result<(), ListenError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(NOTIFY_SQL)
        .bind(channel)
        .bind(payload)
        .execute(executor)
        .await?;
    crate::trace_log!("Sent notification on {:?}", channel);
    Ok(())
}
