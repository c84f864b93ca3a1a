//! Notification polling
//!
//! [`Notifications`] is a lazy, non-restartable sequence of [`ListenEvent`]s.
//! Each call to [`Notifications::next`] runs the cycle
//!
//! 1. hand out an event queued by an earlier drain, if any
//! 2. resolve the timeout and wait for a signal, a notification or the deadline
//! 3. on a notification, drain everything already buffered on the connection
//!
//! The wait in step 2 is the only suspension point. Draining never blocks.
//! A zero deadline still gives up one scheduler turn per wait, so a polling
//! sequence never starves the runtime it runs on.
//!
//! Watched signals are captured from the moment the sequence starts. The first
//! delivery of a signal is yielded as [`ListenEvent::Signal`]; a second
//! delivery of the same signal ends the sequence with
//! [`ListenError::Cancelled`]. Previous signal handlers are restored on every
//! way out: [`Notifications::close`], drop, errors and cancellation.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::io;
use std::time::Duration;

use futures::Stream;
use signal_bridge::{SignalBridge, SignalError};
use sqlx::postgres::PgListener;

use crate::errors::ListenError;
use crate::notification::{ListenEvent, Notification};
use crate::options::ListenOptions;
use crate::resolver::ResolvedConnection;
use crate::source::NotificationSource;
use crate::subscriber::subscribe;
use crate::timeout::Timeout;

/// Where a sequence is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// About to wait, or waiting
    Waiting,
    /// Reading buffered notifications
    Draining,
    /// Handed an event to the caller
    Yielding,
    /// Finished; every further call returns `None`
    Done,
}

/// What ended a wait
enum Wake {
    Signal(i32),
    Notification(Notification),
    Elapsed,
}

/// A running notification sequence
pub struct Notifications<'a, S: NotificationSource = PgListener> {
    connection: Option<ResolvedConnection<'a, S>>,
    bridge: Option<SignalBridge>,
    timeout: Timeout,
    yield_on_timeout: bool,
    notifications_as_list: bool,
    signalled: HashSet<i32>,
    pending: VecDeque<ListenEvent>,
    state: PollState,
}

impl<S: NotificationSource> Debug for Notifications<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("state", &self.state)
            .field(
                "connection",
                &self.connection.as_ref().map(ResolvedConnection::kind),
            )
            .field("bridge", &self.bridge)
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<'a, S: NotificationSource> Notifications<'a, S> {
    /// Subscribe `connection` to the configured channels and start capturing signals
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        mut connection: ResolvedConnection<'a, S>,
        options: ListenOptions,
    ) -> Result<Self, ListenError> {
        let ListenOptions {
            channels,
            timeout,
            yield_on_timeout,
            notifications_as_list,
            handle_signals,
        } = options;

        subscribe(connection.get_mut(), &channels).await?;

        let bridge = if handle_signals.is_empty() {
            None
        } else {
            Some(SignalBridge::install(&handle_signals)?)
        };

        crate::debug_log!(
            "Listening on {} channel(s) over a {} connection",
            channels.len(),
            connection.kind()
        );

        Ok(Self {
            connection: Some(connection),
            bridge,
            timeout,
            yield_on_timeout,
            notifications_as_list,
            signalled: HashSet::new(),
            pending: VecDeque::new(),
            state: PollState::Waiting,
        })
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == PollState::Done
    }

    /// The connection being listened on, until the sequence is done
    pub fn connection(&self) -> Option<&ResolvedConnection<'a, S>> {
        self.connection.as_ref()
    }

    /// Next event of the sequence
    ///
    /// Returns `Ok(None)` once the sequence is done. Errors end the sequence;
    /// signal handlers are restored and an owned connection closed before the
    /// error is returned.
    pub async fn next(&mut self) -> Result<Option<ListenEvent>, ListenError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                self.state = PollState::Yielding;
                return Ok(Some(event));
            }
            if self.state == PollState::Done {
                return Ok(None);
            }

            self.state = PollState::Waiting;
            let deadline = self.timeout.resolve();
            let wake = match self.wait(deadline).await {
                Ok(wake) => wake,
                Err(err) => {
                    self.finish();
                    return Err(err);
                }
            };

            match wake {
                Wake::Signal(signal) => {
                    if self.signalled.insert(signal) {
                        crate::debug_log!("Signal {} received while listening", signal);
                        self.state = PollState::Yielding;
                        return Ok(Some(ListenEvent::Signal(signal)));
                    }
                    tracing::warn!(
                        "Signal {} received again, cancelling notification listener",
                        signal
                    );
                    self.finish();
                    return Err(ListenError::Cancelled { signal });
                }
                Wake::Elapsed => {
                    crate::trace_log!("Wait elapsed after {:?}", deadline);
                    if self.yield_on_timeout {
                        self.state = PollState::Yielding;
                        return Ok(Some(ListenEvent::Timeout));
                    }
                }
                Wake::Notification(first) => {
                    self.state = PollState::Draining;
                    let batch = self.drain(first);
                    crate::trace_log!("Drained {} notification(s)", batch.len());
                    if self.notifications_as_list {
                        self.pending.push_back(ListenEvent::Batch(batch));
                    } else {
                        self.pending
                            .extend(batch.into_iter().map(ListenEvent::Notification));
                    }
                }
            }
        }
    }

    /// Stop listening
    ///
    /// Restores signal handlers, closes a connection opened for this sequence
    /// and returns pooled or borrowed connections to their owner.
    pub fn close(&mut self) {
        if !self.is_done() {
            self.finish();
        }
    }

    /// Adapt the sequence into a [`Stream`]; it ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<ListenEvent, ListenError>> {
        futures::stream::try_unfold(self, |mut notifications| async move {
            let event = notifications.next().await?;
            Ok(event.map(|event| (event, notifications)))
        })
    }

    async fn wait(&mut self, deadline: Option<Duration>) -> Result<Wake, ListenError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ListenError::ConnectionClosed);
        };
        let source = connection.get_mut();
        let bridge = self.bridge.as_mut();

        tokio::select! {
            biased;

            signal = next_signal(bridge) => {
                let signal = signal.map_err(SignalError::from)?;
                Ok(Wake::Signal(signal))
            }
            received = source.recv() => match received? {
                Some(notification) => Ok(Wake::Notification(notification)),
                None => Err(ListenError::ConnectionClosed),
            },
            _ = expire(deadline) => Ok(Wake::Elapsed),
        }
    }

    fn drain(&mut self, first: Notification) -> Vec<Notification> {
        let mut batch = vec![first];
        if let Some(connection) = self.connection.as_mut() {
            let source = connection.get_mut();
            while let Some(notification) = source.next_buffered() {
                batch.push(notification);
            }
        }
        batch
    }

    fn finish(&mut self) {
        self.state = PollState::Done;
        self.pending.clear();
        self.bridge = None;
        if let Some(connection) = self.connection.take() {
            crate::debug_log!(
                "Releasing {} notification connection (owned: {})",
                connection.kind(),
                connection.owns_connection()
            );
            drop(connection);
        }
    }
}

async fn next_signal(bridge: Option<&mut SignalBridge>) -> io::Result<i32> {
    match bridge {
        Some(bridge) => bridge.recv().await,
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Duration>) {
    match deadline {
        // One scheduler turn, so the driver can report ready sockets
        Some(deadline) if deadline.is_zero() => tokio::task::yield_now().await,
        Some(deadline) => tokio::time::sleep(deadline).await,
        None => std::future::pending().await,
    }
}
