//! Convenience re-exports for common signal-bridge usage

pub use crate::bridge::{SignalBridge, parse_signal};
pub use crate::errors::SignalError;
pub use nix::sys::signal::Signal;
