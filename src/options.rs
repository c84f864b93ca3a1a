//! Caller-facing configuration of a notification sequence

use config::ListenConfig;
use signal_bridge::{parse_signal, Signal};

use crate::errors::ListenError;
use crate::timeout::Timeout;

/// What to listen on and how the sequence behaves
#[derive(Debug)]
pub struct ListenOptions {
    pub(crate) channels: Vec<String>,
    pub(crate) timeout: Timeout,
    pub(crate) yield_on_timeout: bool,
    pub(crate) notifications_as_list: bool,
    pub(crate) handle_signals: Vec<Signal>,
}

impl ListenOptions {
    /// Listen on `channels` with a 5 second timeout, intercepting SIGINT
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            timeout: Timeout::default(),
            yield_on_timeout: false,
            notifications_as_list: false,
            handle_signals: vec![Signal::SIGINT],
        }
    }

    /// Build options from the `[listen]` section of the configuration file
    pub fn from_config(config: &ListenConfig) -> Result<Self, ListenError> {
        let handle_signals = config
            .handle_signals
            .iter()
            .map(|name| parse_signal(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ListenError::Config(err.to_string()))?;

        Ok(Self::new(config.channels.iter().cloned())
            .with_timeout(config.timeout_seconds)
            .with_yield_on_timeout(config.yield_on_timeout)
            .with_notifications_as_list(config.notifications_as_list)
            .with_handle_signals(handle_signals))
    }

    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Compute the timeout before every wait
    pub fn with_dynamic_timeout<F>(self, producer: F) -> Self
    where
        F: FnMut() -> f64 + Send + 'static,
    {
        self.with_timeout(Timeout::dynamic(producer))
    }

    /// Yield [`ListenEvent::Timeout`](crate::ListenEvent::Timeout) when a wait elapses
    pub fn with_yield_on_timeout(mut self, yield_on_timeout: bool) -> Self {
        self.yield_on_timeout = yield_on_timeout;
        self
    }

    /// Yield each drain as one batch instead of one notification at a time
    pub fn with_notifications_as_list(mut self, notifications_as_list: bool) -> Self {
        self.notifications_as_list = notifications_as_list;
        self
    }

    pub fn with_handle_signals<I>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = Signal>,
    {
        self.handle_signals = signals.into_iter().collect();
        self
    }

    /// Leave every signal disposition untouched
    pub fn without_signal_handling(self) -> Self {
        self.with_handle_signals([])
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn handle_signals(&self) -> &[Signal] {
        &self.handle_signals
    }
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}
