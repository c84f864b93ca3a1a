//! Connection resolution
//!
//! A listener can be pointed at a connection string, database configuration,
//! a `PgListener` the caller already opened, or a connection pool. Each ends
//! up as one dedicated notification connection. None of them ever opens a transaction, so
//! notifications are delivered as soon as they are committed.

use std::fmt::Debug;
use std::time::Duration;

use config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions};

use crate::errors::ListenError;

/// Where a listener gets its connection from
pub enum Target<'a> {
    /// Open a new connection; it is closed when listening ends
    Url(String),
    /// Open a new connection from discrete settings; closed when listening ends
    Config {
        options: PgConnectOptions,
        connect_timeout: Duration,
    },
    /// Listen on a connection the caller owns; it is never closed here
    Listener(&'a mut PgListener),
    /// Check a connection out of the pool; it is returned when listening ends
    Pool(PgPool),
}

impl Debug for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Connection strings carry credentials
        match self {
            Target::Url(_) => f.write_str("Url(..)"),
            Target::Config { options, .. } => f
                .debug_struct("Config")
                .field("host", &options.get_host())
                .field("database", &options.get_database())
                .finish_non_exhaustive(),
            Target::Listener(_) => f.write_str("Listener(..)"),
            Target::Pool(pool) => f.debug_tuple("Pool").field(&pool.size()).finish(),
        }
    }
}

impl From<&str> for Target<'_> {
    fn from(url: &str) -> Self {
        Target::Url(url.to_string())
    }
}

impl From<String> for Target<'_> {
    fn from(url: String) -> Self {
        Target::Url(url)
    }
}

impl From<&DatabaseConfig> for Target<'_> {
    fn from(config: &DatabaseConfig) -> Self {
        Target::Config {
            options: connect_options(config),
            connect_timeout: config.connection_timeout(),
        }
    }
}

/// Connection settings for `config`
///
/// Each field is set on its own, so credentials need no URL escaping.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username);
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    if let Some(name) = &config.application_name {
        options = options.application_name(name);
    }
    options
}

impl From<PgPool> for Target<'_> {
    fn from(pool: PgPool) -> Self {
        Target::Pool(pool)
    }
}

impl From<&PgPool> for Target<'_> {
    fn from(pool: &PgPool) -> Self {
        Target::Pool(pool.clone())
    }
}

impl<'a> From<&'a mut PgListener> for Target<'a> {
    fn from(listener: &'a mut PgListener) -> Self {
        Target::Listener(listener)
    }
}

/// The connection a listener waits on, and who is responsible for it
#[derive(Debug)]
pub enum ResolvedConnection<'a, S> {
    /// Opened for this listener; closed on teardown
    Dedicated(S),
    /// Checked out of a caller's pool; handed back on teardown
    Pooled(S),
    /// Caller-owned; left open on teardown
    Borrowed(&'a mut S),
}

impl<S> ResolvedConnection<'_, S> {
    /// Whether teardown closes the connection
    pub fn owns_connection(&self) -> bool {
        matches!(self, ResolvedConnection::Dedicated(_))
    }

    pub fn get_mut(&mut self) -> &mut S {
        match self {
            ResolvedConnection::Dedicated(source) | ResolvedConnection::Pooled(source) => source,
            ResolvedConnection::Borrowed(source) => &mut **source,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedConnection::Dedicated(_) => "dedicated",
            ResolvedConnection::Pooled(_) => "pooled",
            ResolvedConnection::Borrowed(_) => "borrowed",
        }
    }
}

/// Turn a target into a notification connection
pub async fn resolve(target: Target<'_>) -> Result<ResolvedConnection<'_, PgListener>, ListenError> {
    let connection = match target {
        Target::Url(url) => {
            if url.trim().is_empty() {
                return Err(ListenError::InvalidTarget(
                    "connection string cannot be empty".to_string(),
                ));
            }
            let listener = PgListener::connect(&url)
                .await
                .map_err(ListenError::Connection)?;
            ResolvedConnection::Dedicated(listener)
        }
        Target::Config {
            options,
            connect_timeout,
        } => {
            // A private single-connection pool, the way PgListener::connect builds one
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(connect_timeout)
                .max_lifetime(None)
                .idle_timeout(None)
                .connect_with(options)
                .await
                .map_err(ListenError::Connection)?;
            let listener = PgListener::connect_with(&pool)
                .await
                .map_err(ListenError::Connection)?;
            ResolvedConnection::Dedicated(listener)
        }
        Target::Listener(listener) => ResolvedConnection::Borrowed(listener),
        Target::Pool(pool) => {
            let listener = PgListener::connect_with(&pool)
                .await
                .map_err(ListenError::Connection)?;
            ResolvedConnection::Pooled(listener)
        }
    };

    crate::debug_log!("Resolved {} notification connection", connection.kind());
    Ok(connection)
}
