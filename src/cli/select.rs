//! Implementation of `stacksnap enable` / `stacksnap disable`.

use clap::Args;
use tracing::info;

use crate::{
    cli::GlobalArgs, guard::RunGuard, selection::SelectionStore, Error, Result, EXIT_OK,
};

#[derive(Debug, Clone, Args, Default)]
pub struct SelectArgs {
    /// Unit names as listed in the selection file
    #[arg(required = true)]
    pub units: Vec<String>,
}

pub fn execute(global: &GlobalArgs, args: SelectArgs, enabled: bool) -> Result<i32> {
    let (config, root) = global.load_config()?;
    let _guard = RunGuard::acquire(&config.lock_path(&root), &root)?;

    let path = config.selection_path(&root);
    let mut store = SelectionStore::load(&path)?.ok_or_else(|| {
        Error::Validation(format!(
            "no selection list at {}; run `stacksnap sync` first",
            path.display()
        ))
    })?;

    // Validate every name before changing anything.
    for name in &args.units {
        if !store.contains(name) {
            return Err(Error::UnknownUnit(name.clone()).into());
        }
    }
    for name in &args.units {
        store.set_enabled(name, enabled)?;
    }

    if global.dry_run {
        info!(units = ?args.units, enabled, "dry run: selection list left unchanged");
        return Ok(EXIT_OK);
    }
    store.save()?;
    info!(units = ?args.units, enabled, path = %path.display(), "selection list updated");
    Ok(EXIT_OK)
}
