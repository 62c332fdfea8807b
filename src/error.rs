//! Error types for configuration, launching, and running a session.
//!
//! Protocol results such as a rejected password are not errors; they are
//! [`Outcome`] values produced by the prompt watcher.

use crate::outcome::Outcome;
use thiserror::Error;

/// Rejected configuration. No child is ever spawned when one of these occurs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Conflicting password source")]
    ConflictingSources,

    #[error("-e option given but {var} environment variable not set")]
    MissingEnvPassword { var: &'static str },

    #[error("Password prompt must not be empty")]
    EmptyPrompt,

    #[error("Invalid file descriptor {0}")]
    InvalidDescriptor(i32),
}

/// Failures while creating the pseudo-terminal or the child process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to get a pseudo terminal: {0}")]
    OpenMaster(#[source] nix::Error),

    #[error("Failed to change pseudo terminal's permission: {0}")]
    Grant(#[source] nix::Error),

    #[error("Failed to unlock pseudo terminal: {0}")]
    Unlock(#[source] nix::Error),

    #[error("Failed to resolve pseudo terminal slave name: {0}")]
    SlaveName(#[source] nix::Error),

    #[error("Failed to configure pseudo terminal: {0}")]
    Configure(#[source] nix::Error),

    #[error("Failed to create child process: {0}")]
    Fork(#[source] nix::Error),

    #[error("Invalid command argument: {0}")]
    InvalidArgument(#[from] std::ffi::NulError),

    #[error("No command given")]
    EmptyCommand,
}

/// Failures of the event loop itself, after the child is running.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] nix::Error),

    #[error("Failed to wait for terminal output: {0}")]
    Select(#[source] nix::Error),

    #[error("Failed to collect child status: {0}")]
    Wait(#[source] nix::Error),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

impl From<&ConfigError> for Outcome {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::ConflictingSources => Outcome::ConflictingArguments,
            ConfigError::MissingEnvPassword { .. }
            | ConfigError::EmptyPrompt
            | ConfigError::InvalidDescriptor(_) => Outcome::InvalidArguments,
        }
    }
}

impl From<&LaunchError> for Outcome {
    fn from(_: &LaunchError) -> Self {
        Outcome::RuntimeError
    }
}

impl From<&SessionError> for Outcome {
    fn from(_: &SessionError) -> Self {
        Outcome::RuntimeError
    }
}
