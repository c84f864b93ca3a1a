//! Signal bridge for notification listeners
//!
//! This crate captures process signals for the lifetime of a scoped guard and
//! turns them into values an async task can wait on, restoring whatever
//! handlers were installed before once the guard goes away.

#![cfg(unix)]

pub mod bridge;
pub mod errors;
pub mod prelude;
mod wakeup;

pub use bridge::{SignalBridge, parse_signal};
pub use errors::SignalError;
pub use nix::sys::signal::Signal;
