//! Error types for signal handler installation and signal delivery

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Signal bridge errors
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Failed to install handler for {signal}: {source}")]
    Install {
        signal: Signal,
        #[source]
        source: Errno,
    },

    #[error("Signal {0} cannot be bridged")]
    Unsupported(i32),

    #[error("Unknown signal: {0}")]
    Unknown(String),

    #[error("Signal wakeup channel error: {0}")]
    Io(#[from] std::io::Error),
}
