//! Signals the controller reacts to, recorded as pending [`Event`]s.
//!
//! Handlers do nothing but set a bit. The signals stay blocked except while
//! the engine sleeps in `pselect`, which swaps in the wait mask atomically,
//! so a signal arriving between draining the bits and going to sleep is
//! delivered the moment the wait starts instead of being lost.

use crate::error::SessionError;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use std::sync::atomic::{AtomicU32, Ordering};

/// Something a signal asked the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `SIGWINCH`: the caller's terminal changed size.
    Resize,
    /// `SIGCHLD`: only used to wake the wait.
    ChildExited,
    /// `SIGHUP`: forwarded to the child.
    Hangup,
    /// `SIGTERM`: forwarded to the child.
    Terminate,
    /// `SIGINT`: typed into the terminal as `^C`.
    Interrupt,
    /// `SIGTSTP`: typed into the terminal as `^Z`.
    Suspend,
}

impl Event {
    pub const ALL: [Event; 6] = [
        Event::Resize,
        Event::ChildExited,
        Event::Hangup,
        Event::Terminate,
        Event::Interrupt,
        Event::Suspend,
    ];

    pub fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::SIGWINCH => Some(Event::Resize),
            Signal::SIGCHLD => Some(Event::ChildExited),
            Signal::SIGHUP => Some(Event::Hangup),
            Signal::SIGTERM => Some(Event::Terminate),
            Signal::SIGINT => Some(Event::Interrupt),
            Signal::SIGTSTP => Some(Event::Suspend),
            _ => None,
        }
    }

    pub fn signal(self) -> Signal {
        match self {
            Event::Resize => Signal::SIGWINCH,
            Event::ChildExited => Signal::SIGCHLD,
            Event::Hangup => Signal::SIGHUP,
            Event::Terminate => Signal::SIGTERM,
            Event::Interrupt => Signal::SIGINT,
            Event::Suspend => Signal::SIGTSTP,
        }
    }

    /// The byte a user would type to produce this signal, if the event is
    /// delivered by typing rather than by forwarding.
    pub fn control_byte(self) -> Option<u8> {
        match self {
            Event::Interrupt => Some(0x03),
            Event::Suspend => Some(0x1a),
            _ => None,
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

static PENDING: AtomicU32 = AtomicU32::new(0);

extern "C" fn record(signum: libc::c_int) {
    if let Ok(signal) = Signal::try_from(signum) {
        if let Some(event) = Event::from_signal(signal) {
            PENDING.fetch_or(event.bit(), Ordering::SeqCst);
        }
    }
}

/// Take every pending event, in declaration order.
pub fn take_pending() -> Vec<Event> {
    let bits = PENDING.swap(0, Ordering::SeqCst);
    Event::ALL
        .into_iter()
        .filter(|event| bits & event.bit() != 0)
        .collect()
}

/// The signals that are blocked outside the wait.
pub fn blocked_signals() -> SigSet {
    let mut set = SigSet::empty();
    for event in Event::ALL {
        set.add(event.signal());
    }
    set
}

/// Block the controller's signals and install the recording handlers.
///
/// Returns the mask to use while waiting. Must run before the child is
/// forked so that no signal slips through in between.
pub fn install() -> Result<SigSet, SessionError> {
    signal::sigprocmask(SigmaskHow::SIG_BLOCK, Some(&blocked_signals()), None)
        .map_err(SessionError::Signals)?;

    let action = SigAction::new(SigHandler::Handler(record), SaFlags::empty(), SigSet::empty());
    for event in Event::ALL {
        // SAFETY: `record` only touches an atomic, which is async-signal-safe.
        unsafe { signal::sigaction(event.signal(), &action) }.map_err(SessionError::Signals)?;
    }

    Ok(SigSet::empty())
}

/// Give a freshly forked child the signal state a normal program expects.
///
/// Caught handlers are reset by `exec` anyway; the mask and ignored
/// dispositions are not.
pub fn reset_for_child() -> nix::Result<()> {
    signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None)?;
    // SAFETY: restoring the default disposition installs no handler.
    unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
    Ok(())
}
