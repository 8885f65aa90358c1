//! Implementation of `stacksnap sync`.

use clap::Args;
use tracing::info;

use crate::{
    cli::GlobalArgs, guard::RunGuard, orchestrator::synchronize_selection, Result, EXIT_OK,
};

#[derive(Debug, Clone, Args, Default)]
pub struct SyncArgs {
    /// Print the change summary as JSON
    #[arg(long = "json")]
    pub json: bool,
}

pub fn execute(global: &GlobalArgs, args: SyncArgs) -> Result<i32> {
    let (config, root) = global.load_config()?;
    let _guard = RunGuard::acquire(&config.lock_path(&root), &root)?;

    let selection_path = config.selection_path(&root);
    let (units, changes) =
        synchronize_selection(&root, &config.runtime.manifests, &selection_path)?;
    info!(discovered = units.len(), path = %selection_path.display(), "sync finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else if changes.is_empty() {
        println!("already synchronized ({} units)", units.len());
    } else {
        for name in &changes.added {
            println!("+ {name} (disabled)");
        }
        for name in &changes.removed {
            println!("- {name}");
        }
    }

    Ok(EXIT_OK)
}
