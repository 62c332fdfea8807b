//! Run configuration: which password source to use and which prompt to
//! answer.

use crate::error::ConfigError;
use crate::source::ByteSource;
use crate::watcher::DEFAULT_PASSWORD_PROMPT;
use secrecy::SecretString;
use std::os::fd::RawFd;
use std::path::PathBuf;

/// Environment variable read by the `-e` option.
pub const PASSWORD_ENV_VAR: &str = "SSHPASS";

/// Password source options as given by the caller, before validation.
///
/// At most one of them may be set.
#[derive(Debug, Default)]
pub struct PasswordOptions {
    pub file: Option<PathBuf>,
    pub fd: Option<RawFd>,
    pub password: Option<SecretString>,
    /// `-e` was given. The variable's value, if set, is in `env_value`.
    pub from_env: bool,
    pub env_value: Option<SecretString>,
}

/// Validated configuration for one run.
#[derive(Debug)]
pub struct Config {
    pub source: ByteSource,
    pub prompt: Vec<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: ByteSource::Stdin,
            prompt: DEFAULT_PASSWORD_PROMPT.as_bytes().to_vec(),
        }
    }
}

impl Config {
    /// Build a configuration, rejecting conflicting password sources, a
    /// negative descriptor and an empty prompt.
    pub fn from_options(
        options: PasswordOptions,
        prompt: Option<String>,
    ) -> Result<Self, ConfigError> {
        let chosen = [
            options.file.is_some(),
            options.fd.is_some(),
            options.password.is_some(),
            options.from_env,
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if chosen > 1 {
            return Err(ConfigError::ConflictingSources);
        }

        let source = if let Some(path) = options.file {
            ByteSource::File(path)
        } else if let Some(fd) = options.fd {
            if fd < 0 {
                return Err(ConfigError::InvalidDescriptor(fd));
            }
            ByteSource::Descriptor(fd)
        } else if let Some(password) = options.password {
            ByteSource::Literal(password)
        } else if options.from_env {
            let value = options.env_value.ok_or(ConfigError::MissingEnvPassword {
                var: PASSWORD_ENV_VAR,
            })?;
            ByteSource::Literal(value)
        } else {
            ByteSource::Stdin
        };

        let prompt = match prompt {
            Some(p) if p.is_empty() => return Err(ConfigError::EmptyPrompt),
            Some(p) => p.into_bytes(),
            None => DEFAULT_PASSWORD_PROMPT.as_bytes().to_vec(),
        };

        Ok(Self { source, prompt })
    }
}
