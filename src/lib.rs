//! # Ptypass
//!
//! Non-interactive password authentication for programs that will only read
//! a password from a terminal.
//!
//! Ptypass runs a command (typically `ssh`) with a freshly allocated
//! pseudo-terminal as its controlling tty, watches what the command writes to
//! that terminal, and types the password when the prompt appears. It never
//! retries: a second prompt means the password was wrong, and a host key
//! question aborts the run. Each cause gets its own exit code.
//!
//! ## Quick start
//!
//! ```no_run
//! use ptypass::{Config, PasswordOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_options(
//!         PasswordOptions {
//!             file: Some("/run/secrets/ssh".into()),
//!             ..Default::default()
//!         },
//!         None,
//!     )?;
//!
//!     let args = ["backup@example.com".to_string(), "uptime".to_string()];
//!     let outcome = ptypass::run(config, "ssh", &args)?;
//!     std::process::exit(outcome.exit_code().into());
//! }
//! ```
//!
//! ## Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | the command exited 0 |
//! | 1 | invalid arguments |
//! | 2 | conflicting password sources |
//! | 3 | runtime error (pty, fork or exec failure) |
//! | 4 | parse error (reserved) |
//! | 5 | incorrect password |
//! | 6 | host key unknown |
//! | 7 | host key changed |
//! | 255 | the command was killed by a signal |
//!
//! Any other code is the command's own exit status.
//!
//! ## Watching output yourself
//!
//! [`PromptWatcher`] holds the matching rules and can be fed output from
//! any source:
//!
//! ```
//! use ptypass::{Outcome, PromptWatcher};
//!
//! let mut watcher = PromptWatcher::default();
//! assert!(watcher.scan(b"user@host's pass").outcome.is_none());
//! assert!(watcher.scan(b"word: ").reply);
//! assert_eq!(
//!     watcher.scan(b"Permission denied, please try again.\r\nPassword: ").outcome,
//!     Some(Outcome::IncorrectPassword)
//! );
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod matcher;
pub mod outcome;
pub mod pty;
pub(crate) mod pty_reader;
pub mod source;
pub mod watcher;
pub mod writer;

pub use config::{Config, PasswordOptions};
pub use engine::{Engine, run};
pub use error::{ConfigError, LaunchError, SessionError};
pub use matcher::Matcher;
pub use outcome::Outcome;
pub use pty::{NativePtySystem, PtySession, PtySystem};
pub use source::ByteSource;
pub use watcher::{PromptWatcher, Verdict};
