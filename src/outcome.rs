//! How a run ended, and the exit code scripts see for it.

use std::fmt;
use std::process::ExitCode;

/// Exit code reported when the target was killed by a signal.
pub const SIGNALED_EXIT_CODE: u8 = 255;

/// The final result of a run.
///
/// Every variant maps to a fixed exit code (see [`Outcome::exit_code`]) so
/// calling scripts can branch on the cause of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    InvalidArguments,
    ConflictingArguments,
    RuntimeError,
    /// Reserved; nothing in the current tool produces it.
    ParseError,
    /// The password prompt came back after the password was sent.
    IncorrectPassword,
    HostKeyUnknown,
    HostKeyChanged,
    /// The target ran and exited on its own with this status.
    ChildExitStatus(i32),
    /// The target died from a signal it did not handle.
    ChildSignaled,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::InvalidArguments => 1,
            Outcome::ConflictingArguments => 2,
            Outcome::RuntimeError => 3,
            Outcome::ParseError => 4,
            Outcome::IncorrectPassword => 5,
            Outcome::HostKeyUnknown => 6,
            Outcome::HostKeyChanged => 7,
            // waitpid only ever reports the low 8 bits.
            Outcome::ChildExitStatus(status) => (*status & 0xff) as u8,
            Outcome::ChildSignaled => SIGNALED_EXIT_CODE,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::InvalidArguments => write!(f, "invalid arguments"),
            Outcome::ConflictingArguments => write!(f, "conflicting password source"),
            Outcome::RuntimeError => write!(f, "runtime error"),
            Outcome::ParseError => write!(f, "parse error"),
            Outcome::IncorrectPassword => write!(f, "incorrect password"),
            Outcome::HostKeyUnknown => write!(f, "host key unknown"),
            Outcome::HostKeyChanged => write!(f, "host key changed"),
            Outcome::ChildExitStatus(status) => write!(f, "command exited with status {status}"),
            Outcome::ChildSignaled => write!(f, "command terminated by a signal"),
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_contract() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::InvalidArguments.exit_code(), 1);
        assert_eq!(Outcome::ConflictingArguments.exit_code(), 2);
        assert_eq!(Outcome::RuntimeError.exit_code(), 3);
        assert_eq!(Outcome::ParseError.exit_code(), 4);
        assert_eq!(Outcome::IncorrectPassword.exit_code(), 5);
        assert_eq!(Outcome::HostKeyUnknown.exit_code(), 6);
        assert_eq!(Outcome::HostKeyChanged.exit_code(), 7);
        assert_eq!(Outcome::ChildSignaled.exit_code(), 255);
    }

    #[test]
    fn test_child_status_passes_through() {
        assert_eq!(Outcome::ChildExitStatus(0).exit_code(), 0);
        assert_eq!(Outcome::ChildExitStatus(42).exit_code(), 42);
        assert_eq!(Outcome::ChildExitStatus(255).exit_code(), 255);
    }
}
