//! Process-wide handler registry and the wakeup table consulted by the handler.
//!
//! Every signal with at least one live bridge has one registration holding
//! the action that was installed before any bridge took the signal, plus the
//! live bridges in install order. The wakeup slot of a signal always names the
//! write end of the newest live bridge, or `-1` when there is none. The
//! original action comes back only when the last bridge for a signal detaches,
//! so bridges may be dropped in any order.
//!
//! The handler is async-signal-safe: it reads an atomic, calls `write(2)` and
//! puts `errno` back. It never touches the registry lock.

use std::collections::BTreeMap;
use std::ffi::c_int;
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::errors::SignalError;

const MAX_SIGNAL: usize = 65;

static WAKEUP_FDS: [AtomicI32; MAX_SIGNAL] = [const { AtomicI32::new(-1) }; MAX_SIGNAL];

static REGISTRY: Mutex<BTreeMap<i32, Registration>> = Mutex::new(BTreeMap::new());

pub(crate) const NO_FD: RawFd = -1;

struct Registration {
    original: SigAction,
    /// Write ends of live bridges, oldest first
    bridges: Vec<RawFd>,
}

fn registry() -> MutexGuard<'static, BTreeMap<i32, Registration>> {
    // The map stays consistent even if a holder panicked
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wakeup slot for `signal`
pub(crate) fn slot(signal: Signal) -> Result<&'static AtomicI32, SignalError> {
    let number = signal as i32;
    usize::try_from(number)
        .ok()
        .and_then(|index| WAKEUP_FDS.get(index))
        .ok_or(SignalError::Unsupported(number))
}

/// Route `signal` to the bridge writing on `fd`
///
/// The first bridge for a signal installs the handler and keeps the action it
/// replaced. Later bridges only take over the wakeup slot.
pub(crate) fn attach(signal: Signal, fd: RawFd) -> Result<(), SignalError> {
    let slot = slot(signal)?;
    let mut registry = registry();

    if let Some(registration) = registry.get_mut(&(signal as i32)) {
        registration.bridges.push(fd);
        slot.store(fd, Ordering::Release);
        return Ok(());
    }

    slot.store(fd, Ordering::Release);
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: on_signal only touches an atomic, write(2) and errno.
    match unsafe { sigaction(signal, &action) } {
        Ok(original) => {
            registry.insert(
                signal as i32,
                Registration {
                    original,
                    bridges: vec![fd],
                },
            );
            #[cfg(feature = "debug-logging")]
            tracing::debug!("Installed bridge handler for {}", signal);
            Ok(())
        }
        Err(source) => {
            slot.store(NO_FD, Ordering::Release);
            Err(SignalError::Install { signal, source })
        }
    }
}

/// Stop routing `signal` to the bridge writing on `fd`
///
/// Hands the wakeup slot to the newest remaining bridge, or restores the
/// original action when none is left.
pub(crate) fn detach(signal: Signal, fd: RawFd) {
    let Ok(slot) = slot(signal) else {
        return;
    };
    let mut registry = registry();
    let key = signal as i32;
    let Some(registration) = registry.get_mut(&key) else {
        return;
    };

    registration.bridges.retain(|&bridge| bridge != fd);
    if let Some(&newest) = registration.bridges.last() {
        slot.store(newest, Ordering::Release);
        return;
    }

    if let Some(registration) = registry.remove(&key) {
        // SAFETY: restores exactly the action the kernel handed back on attach.
        if let Err(errno) = unsafe { sigaction(signal, &registration.original) } {
            tracing::warn!("Failed to restore handler for {}: {}", signal, errno);
        }
        slot.store(NO_FD, Ordering::Release);

        #[cfg(feature = "debug-logging")]
        tracing::debug!("Restored handler for {}", signal);
    }
}

pub(crate) extern "C" fn on_signal(signum: c_int) {
    let Some(slot) = usize::try_from(signum).ok().and_then(|i| WAKEUP_FDS.get(i)) else {
        return;
    };
    let fd = slot.load(Ordering::Acquire);
    if fd == NO_FD {
        return;
    }

    let saved = Errno::last_raw();
    // SAFETY: the slot is cleared or handed to another live bridge before a
    // bridge closes its write end.
    let fd = unsafe { BorrowedFd::borrow_raw(fd) };
    // A full socket buffer drops the byte; earlier bytes are still pending.
    let _ = nix::unistd::write(fd, &[signum as u8]);
    Errno::set_raw(saved);
}
