//! Command-line surface; subcommands live here.

use std::path::PathBuf;

use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};

use crate::{
    config::{Config, DEFAULT_CONFIG_PATH},
    logging, Error, Result,
};

pub mod list;
pub mod run;
pub mod select;
pub mod sync;

#[derive(Debug, Clone)]
pub enum Command {
    Run(run::RunArgs),
    Sync(sync::SyncArgs),
    List(list::ListArgs),
    Enable(select::SelectArgs),
    Disable(select::SelectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Path to the TOML configuration file
    #[arg(long = "config", env = "STACKSNAP_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Backup root holding one directory per stack (overrides paths.root)
    #[arg(long = "root", global = true)]
    pub root: Option<PathBuf>,

    /// Log debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Discover and synchronize, but only log stop/snapshot/start actions
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
}

impl GlobalArgs {
    /// Load configuration, start logging and resolve the backup root.
    ///
    /// A missing config file is tolerated when `--root` supplies the only
    /// required path.
    pub fn load_config(&self) -> Result<(Config, PathBuf)> {
        let config = match Config::load(&self.config) {
            Ok(config) => config,
            Err(_) if !self.config.exists() && self.root.is_some() => Config::default(),
            Err(err) => return Err(err),
        }
        .with_root_override(self.root.clone());

        logging::init_logging(config.logging.to_logging_config(self.verbose))?;
        config.validate()?;
        let root = config.root()?;
        Ok((config, root))
    }
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub global: GlobalArgs,
    pub command: Command,
}

/// Run the selected command and return its exit code.
pub fn dispatch(args: CliArgs) -> Result<i32> {
    let global = args.global;
    match args.command {
        Command::Run(r) => run::execute(&global, r),
        Command::Sync(s) => sync::execute(&global, s),
        Command::List(l) => list::execute(&global, l),
        Command::Enable(e) => select::execute(&global, e, true),
        Command::Disable(d) => select::execute(&global, d, false),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "stacksnap",
    version,
    about = "Stop, snapshot and restart selected compose stacks"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Subcommands>,
}

#[derive(Subcommand, Debug)]
enum Subcommands {
    /// Back up every enabled stack (default when no command is given).
    Run(run::RunArgs),
    /// Discover stacks and synchronize the selection list.
    Sync(sync::SyncArgs),
    /// Show the selection list.
    List(list::ListArgs),
    /// Enable stacks for backup.
    Enable(select::SelectArgs),
    /// Exclude stacks from backup.
    Disable(select::SelectArgs),
}

/// Parse CLI arguments into internal representation.
///
/// Never exits the process: rejected arguments become [`Error::Usage`] and
/// `--help`/`--version` become [`Error::Help`] carrying the text to print.
pub fn parse_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let argv: Vec<String> = args.into_iter().map(Into::into).collect();
    let cli = Cli::try_parse_from(argv).map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            Error::Help(err.render().to_string())
        }
        _ => Error::Usage(err.render().to_string()),
    })?;
    let command = match cli.command {
        Some(Subcommands::Run(args)) => Command::Run(args),
        Some(Subcommands::Sync(args)) => Command::Sync(args),
        Some(Subcommands::List(args)) => Command::List(args),
        Some(Subcommands::Enable(args)) => Command::Enable(args),
        Some(Subcommands::Disable(args)) => Command::Disable(args),
        None => Command::Run(run::RunArgs::default()),
    };

    Ok(CliArgs {
        global: cli.global,
        command,
    })
}

/// Build the underlying clap `Command` (useful for help/usage contract tests).
pub fn clap_command() -> clap::Command {
    Cli::command()
}
