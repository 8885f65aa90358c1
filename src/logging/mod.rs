//! Logging initialization using `tracing` and `tracing-subscriber`.

use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

use crate::{orchestrator::RunReport, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogSink {
    #[default]
    Console,
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub sink: LogSink,
    pub debug: bool,
}

/// Initialize global tracing subscriber. Safe to call multiple times; subsequent
/// calls will no-op.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false);

    match (config.format, config.sink) {
        (LogFormat::Human, LogSink::Console) => {
            let _ = builder.with_writer(std::io::stderr).finish().try_init();
        }
        (LogFormat::Json, LogSink::Console) => {
            let _ = builder
                .json()
                .with_writer(std::io::stderr)
                .finish()
                .try_init();
        }
        (format, LogSink::File(path)) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let writer = Mutex::new(file);
            match format {
                LogFormat::Human => {
                    let _ = builder
                        .with_ansi(false)
                        .with_writer(writer)
                        .finish()
                        .try_init();
                }
                LogFormat::Json => {
                    let _ = builder.json().with_writer(writer).finish().try_init();
                }
            }
        }
    }

    Ok(())
}

/// Emit the end-of-run summary as one structured event.
pub fn log_run_summary(report: &RunReport) {
    if report.failed > 0 || report.skipped > 0 {
        warn!(
            target: "stacksnap::summary",
            run_id = %report.run_id,
            dry_run = report.dry_run,
            discovered = report.discovered,
            enabled = report.enabled,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            exit_code = report.exit_code,
            "backup_run_finished_with_failures"
        );
    } else {
        info!(
            target: "stacksnap::summary",
            run_id = %report.run_id,
            dry_run = report.dry_run,
            discovered = report.discovered,
            enabled = report.enabled,
            processed = report.processed,
            succeeded = report.succeeded,
            exit_code = report.exit_code,
            "backup_run_finished"
        );
    }
}
