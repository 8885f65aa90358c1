use thiserror::Error;

pub mod cli;
pub mod config;
pub mod exec;
pub mod guard;
pub mod lifecycle;
pub mod logging;
pub mod orchestrator;
pub mod runtime;
pub mod selection;
pub mod snapshot;
pub mod units;

pub type Result<T> = anyhow::Result<T>;

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG: i32 = 1;
pub const EXIT_VALIDATION: i32 = 2;
pub const EXIT_SNAPSHOT: i32 = 3;
pub const EXIT_LIFECYCLE: i32 = 4;
pub const EXIT_INTERRUPTED: i32 = 5;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid backup root: {0}")]
    InvalidRoot(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
    #[error("another run is active (pid {0})")]
    AlreadyRunning(i32),
    #[error("lifecycle error for {unit}: {reason}")]
    Lifecycle { unit: String, reason: String },
    #[error("snapshot error for {unit}: {reason}")]
    Snapshot { unit: String, reason: String },
    #[error("interrupted by signal")]
    Interrupted,
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cli error: {0}")]
    Cli(String),
    /// Rejected command line; carries clap's rendered message.
    #[error("{0}")]
    Usage(String),
    /// `--help` or `--version` was requested; carries the rendered text.
    #[error("{0}")]
    Help(String),
}

impl Error {
    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidRoot(_) | Error::Validation(_) | Error::UnknownUnit(_) => EXIT_VALIDATION,
            Error::Snapshot { .. } => EXIT_SNAPSHOT,
            Error::Lifecycle { .. } => EXIT_LIFECYCLE,
            Error::Interrupted => EXIT_INTERRUPTED,
            Error::Help(_) => EXIT_OK,
            Error::Config(_)
            | Error::AlreadyRunning(_)
            | Error::Serde(_)
            | Error::Io(_)
            | Error::Cli(_)
            | Error::Usage(_) => EXIT_CONFIG,
        }
    }
}

/// Map any error bubbling out of [`run`] to a process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<Error>()
        .map(Error::exit_code)
        .unwrap_or(EXIT_CONFIG)
}

/// Entry point for the library, called by the CLI thin wrapper. Returns the
/// exit code of a completed command; run-scoped failures come back as `Err`.
pub fn run<I, S>(args: I) -> Result<i32>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cli_args = match cli::parse_args(args.into_iter().map(Into::into)) {
        Ok(cli_args) => cli_args,
        Err(err) => match err.downcast_ref::<Error>() {
            Some(Error::Help(text)) => {
                print!("{text}");
                return Ok(EXIT_OK);
            }
            _ => return Err(err),
        },
    };
    cli::dispatch(cli_args)
}
