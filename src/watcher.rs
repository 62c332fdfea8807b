//! Decides what each chunk of terminal output means for the run.
//!
//! Three phrases are tracked at once. The password prompt is checked first;
//! the two host key notices only matter if the prompt did not already end the
//! run.

use crate::matcher::Matcher;
use crate::outcome::Outcome;
use tracing::{debug, info, warn};

/// Default phrase identifying a password prompt. Matches both `Password:`
/// and `user@host's password:`.
pub const DEFAULT_PASSWORD_PROMPT: &str = "assword";

/// Printed by ssh when asked to confirm an unknown host key.
pub const HOST_KEY_UNKNOWN: &str = "The authenticity of host ";

/// Printed by ssh when a known host key no longer matches.
pub const HOST_KEY_CHANGED: &str = "differs from the key for the IP address";

/// What the engine should do after a chunk was scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    /// The password prompt appeared for the first time; send the secret.
    pub reply: bool,
    /// The run is over for the given reason.
    pub outcome: Option<Outcome>,
}

/// Matches terminal output against the password prompt and the host key
/// notices, and enforces that the password is only ever sent once.
#[derive(Debug, Clone)]
pub struct PromptWatcher {
    password: Matcher,
    host_unknown: Matcher,
    host_changed: Matcher,
    replied: bool,
}

impl PromptWatcher {
    pub fn new(prompt: impl Into<Vec<u8>>) -> Self {
        Self {
            password: Matcher::new(prompt),
            host_unknown: Matcher::new(HOST_KEY_UNKNOWN),
            host_changed: Matcher::new(HOST_KEY_CHANGED),
            replied: false,
        }
    }

    /// Whether the password has already been sent.
    pub fn replied(&self) -> bool {
        self.replied
    }

    pub fn prompt(&self) -> &[u8] {
        self.password.phrase()
    }

    /// Scan one chunk of output.
    ///
    /// A second sighting of the prompt after a reply means the password was
    /// rejected; the host key matchers are then not consulted at all.
    pub fn scan(&mut self, chunk: &[u8]) -> Verdict {
        let mut verdict = Verdict::default();

        if self.password.feed(chunk) {
            if self.replied {
                warn!("detected prompt again, wrong password");
                verdict.outcome = Some(Outcome::IncorrectPassword);
                return verdict;
            }
            debug!("detected prompt, sending password");
            self.password.reset();
            self.replied = true;
            verdict.reply = true;
        }

        if self.host_unknown.feed(chunk) {
            info!("detected host authentication prompt, exiting");
            verdict.outcome = Some(Outcome::HostKeyUnknown);
        } else if self.host_changed.feed(chunk) {
            info!("detected host key change, exiting");
            verdict.outcome = Some(Outcome::HostKeyChanged);
        }

        verdict
    }
}

impl Default for PromptWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PASSWORD_PROMPT)
    }
}
