use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the log filter, e.g. `PTYPASS_LOG=trace`.
pub const LOG_ENV_VAR: &str = "PTYPASS_LOG";

/// Default filter for a given number of `-v` flags.
///
/// Warnings (unreadable password file, short writes) are always shown.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    }
}

/// Send diagnostics to stderr. Stdout belongs to the command being run.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
