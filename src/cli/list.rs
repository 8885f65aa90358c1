//! Implementation of `stacksnap list`.

use std::path::Path;

use clap::{Args, ValueEnum};
use serde::Serialize;

use crate::{
    cli::GlobalArgs,
    selection::SelectionStore,
    units::{find_manifest, BackupUnit},
    Result, EXIT_OK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum ListFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Args, Default)]
pub struct ListArgs {
    /// Output format.
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: ListFormat,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListEntry {
    pub unit: String,
    pub enabled: bool,
    /// Directory still exists and carries a manifest.
    pub present: bool,
}

/// Selection entries annotated with their on-disk presence.
pub fn list_entries(store: &SelectionStore, root: &Path, manifests: &[String]) -> Vec<ListEntry> {
    store
        .entries()
        .map(|(name, enabled)| {
            let unit = BackupUnit::under_root(root, name);
            ListEntry {
                unit: name.to_string(),
                enabled,
                present: unit.exists() && find_manifest(&unit.path, manifests).is_some(),
            }
        })
        .collect()
}

pub fn execute(global: &GlobalArgs, args: ListArgs) -> Result<i32> {
    let (config, root) = global.load_config()?;
    let store = SelectionStore::load_or_empty(&config.selection_path(&root))?;
    let entries = list_entries(&store, &root, &config.runtime.manifests);

    match args.format {
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        ListFormat::Text => print!("{}", format_text(&entries)),
    }
    Ok(EXIT_OK)
}

fn format_text(entries: &[ListEntry]) -> String {
    if entries.is_empty() {
        return "no units in selection list (run `stacksnap sync`)\n".into();
    }
    let width = entries.iter().map(|e| e.unit.len()).max().unwrap_or(0);
    let mut out = String::new();
    for entry in entries {
        let mark = if entry.enabled { "[x]" } else { "[ ]" };
        let missing = if entry.present { "" } else { "  (missing)" };
        out.push_str(&format!("{mark} {:width$}{missing}\n", entry.unit));
    }
    out
}
