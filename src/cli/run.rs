//! Implementation of `stacksnap run`.

use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
};

use clap::Args;
use tracing::{info, warn};

use crate::{
    cli::GlobalArgs, guard::RunGuard, logging::log_run_summary, orchestrator::Orchestrator,
    Error, Result,
};

#[derive(Debug, Clone, Args, Default)]
pub struct RunArgs {
    /// Write the JSON run summary to this file
    #[arg(long = "summary")]
    pub summary: Option<PathBuf>,

    /// Print the JSON run summary to stdout
    #[arg(long = "json")]
    pub json: bool,
}

static INTERRUPT: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Install the SIGINT/SIGTERM handler once per process and return its flag.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    if let Some(flag) = INTERRUPT.get() {
        return Ok(flag.clone());
    }
    let flag = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let flag = flag.clone();
        move || {
            warn!("signal received; finishing current step");
            flag.store(true, Ordering::SeqCst);
        }
    })
    .map_err(|e| Error::Cli(format!("failed to install signal handler: {e}")))?;
    Ok(INTERRUPT.get_or_init(|| flag).clone())
}

pub fn execute(global: &GlobalArgs, args: RunArgs) -> Result<i32> {
    let (config, root) = global.load_config()?;
    let orchestrator = Orchestrator::from_config(&config, &root)?.with_dry_run(global.dry_run);

    let guard = RunGuard::acquire(&config.lock_path(&root), &root)?;
    let interrupt = interrupt_flag()?;
    if global.dry_run {
        info!("dry run: no service or snapshot command will be executed");
    }

    let report = orchestrator.with_interrupt(interrupt).run()?;
    drop(guard);

    log_run_summary(&report);
    if let Some(path) = &args.summary {
        fs::write(path, serde_json::to_vec_pretty(&report)?)?;
        info!(path = %path.display(), "run summary written");
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(report.exit_code)
}
