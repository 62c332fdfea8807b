use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use ptypass::config::PASSWORD_ENV_VAR;
use ptypass::{Config, ConfigError, Outcome, PasswordOptions, logging};
use secrecy::SecretString;
use std::os::fd::RawFd;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(
    name = "ptypass",
    about = "Run a command that asks for a password on its terminal, and answer it",
    version,
    after_help = "With no password option the password is read from stdin.\n\
                  At most one of -f, -d, -p or -e should be used."
)]
struct Args {
    /// Take password to use from file
    #[arg(short = 'f', value_name = "FILENAME")]
    file: Option<PathBuf>,

    /// Use number as file descriptor for getting password
    #[arg(short = 'd', value_name = "NUMBER")]
    fd: Option<RawFd>,

    /// Provide password as argument (security unwise: other users can read
    /// it in the process list for as long as ptypass runs)
    #[arg(short = 'p', value_name = "PASSWORD")]
    password: Option<String>,

    /// Password is passed as env-var "SSHPASS"
    #[arg(short = 'e')]
    env: bool,

    /// Which string to search for to detect a password prompt
    #[arg(short = 'P', value_name = "PROMPT", overrides_with = "prompt")]
    prompt: Option<String>,

    /// Be verbose about what you're doing
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let outcome = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Outcome::Success,
                ErrorKind::ArgumentConflict => Outcome::ConflictingArguments,
                _ => Outcome::InvalidArguments,
            };
            let _ = err.print();
            return outcome.into();
        }
    };

    logging::init(args.verbose);

    if args.command.is_empty() {
        let _ = Args::command().print_help();
        return Outcome::Success.into();
    }

    match run(args) {
        Ok(outcome) => {
            debug!("exiting: {outcome}");
            outcome.into()
        }
        Err(err) => {
            error!("{err:#}");
            failure_outcome(&err).into()
        }
    }
}

fn run(args: Args) -> Result<Outcome> {
    let env_value = if args.env {
        std::env::var(PASSWORD_ENV_VAR).ok().map(SecretString::from)
    } else {
        None
    };
    let options = PasswordOptions {
        file: args.file,
        fd: args.fd,
        password: args.password.map(SecretString::from),
        from_env: args.env,
        env_value,
    };
    let config = Config::from_options(options, args.prompt)?;

    let (command, rest) = args.command.split_first().context("No command given")?;
    let outcome = ptypass::run(config, command, rest)
        .with_context(|| format!("Failed to run command: {command}"))?;
    Ok(outcome)
}

/// Exit code for an error that stopped the run early.
fn failure_outcome(err: &anyhow::Error) -> Outcome {
    match err.downcast_ref::<ConfigError>() {
        Some(config_err) => Outcome::from(config_err),
        None => Outcome::RuntimeError,
    }
}
