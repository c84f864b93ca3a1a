//! Scoped signal capture
//!
//! A [`SignalBridge`] routes a set of signals to a socket pair. The async side
//! reads the signal numbers back in delivery order. While several bridges
//! capture the same signal, the newest one receives it. The handler that was
//! installed before the first bridge comes back once the last bridge for that
//! signal is dropped, whatever order the bridges go away in, so the host
//! application's own handling is never clobbered.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream as StdUnixStream;

use nix::sys::signal::Signal;
use tokio::io::unix::AsyncFd;

use crate::errors::SignalError;
use crate::wakeup;

const READ_CHUNK: usize = 32;

/// Captures a set of process signals until dropped
pub struct SignalBridge {
    signals: Vec<Signal>,
    reader: AsyncFd<StdUnixStream>,
    writer: StdUnixStream,
    pending: VecDeque<i32>,
}

impl Debug for SignalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBridge")
            .field("signals", &self.signals)
            .field("pending", &self.pending)
            .finish()
    }
}

impl SignalBridge {
    /// Install handlers for `signals`
    ///
    /// Must be called from within a tokio runtime. Repeated signals in the
    /// slice are installed once. If any installation fails, signals that were
    /// already taken are released before the error is returned.
    pub fn install(signals: &[Signal]) -> Result<Self, SignalError> {
        let (reader, writer) = StdUnixStream::pair()?;
        reader.set_nonblocking(true)?;
        writer.set_nonblocking(true)?;

        let mut bridge = Self {
            signals: Vec::with_capacity(signals.len()),
            reader: AsyncFd::new(reader)?,
            writer,
            pending: VecDeque::new(),
        };

        for &signal in signals {
            if bridge.signals.contains(&signal) {
                continue;
            }
            wakeup::attach(signal, bridge.writer.as_raw_fd())?;
            bridge.signals.push(signal);
        }

        Ok(bridge)
    }

    /// Signals captured by this bridge
    pub fn signals(&self) -> impl Iterator<Item = Signal> + '_ {
        self.signals.iter().copied()
    }

    /// Wait for the next captured signal number
    ///
    /// Cancel-safe: a signal is never consumed by a future that did not
    /// complete.
    pub async fn recv(&mut self) -> io::Result<i32> {
        loop {
            if let Some(signal) = self.try_recv()? {
                return Ok(signal);
            }
            // Cleared only after a read came back empty, so no byte is missed
            self.reader.readable().await?.clear_ready();
        }
    }

    /// Next captured signal number, if one is already waiting
    pub fn try_recv(&mut self) -> io::Result<Option<i32>> {
        if let Some(signal) = self.pending.pop_front() {
            return Ok(Some(signal));
        }

        let mut buf = [0u8; READ_CHUNK];
        let mut stream = self.reader.get_ref();
        match stream.read(&mut buf) {
            Ok(read) => {
                self.buffer(&buf[..read])?;
                Ok(self.pending.pop_front())
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "signal wakeup channel closed",
            ));
        }
        self.pending.extend(bytes.iter().map(|&b| i32::from(b)));
        Ok(())
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        // The write end closes after this body, once no slot names it
        let fd = self.writer.as_raw_fd();
        while let Some(signal) = self.signals.pop() {
            wakeup::detach(signal, fd);
        }
    }
}

/// Parse a signal from configuration text
///
/// Accepts `"SIGINT"`, `"int"` or the number `"2"`.
pub fn parse_signal(name: &str) -> Result<Signal, SignalError> {
    let trimmed = name.trim();
    let unknown = || SignalError::Unknown(name.to_string());

    if let Ok(number) = trimmed.parse::<i32>() {
        return Signal::try_from(number).map_err(|_| unknown());
    }

    let upper = trimmed.to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    full.parse::<Signal>().map_err(|_| unknown())
}
