use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{units::BackupUnit, Error, Result};

/// Return the first manifest in `manifests` present in `dir`.
pub fn find_manifest(dir: &Path, manifests: &[String]) -> Option<PathBuf> {
    manifests
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Whether `name` reads back unchanged from a `name=value` selection line.
///
/// Leading `#` or `/` turn the line into a comment or an external path,
/// surrounding whitespace is trimmed on load, and `=` separates the value.
pub fn representable_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.starts_with(|c| matches!(c, '#' | '/'))
        && !name.contains(|c| matches!(c, '=' | '\n' | '\r'))
}

/// Scan the immediate subdirectories of `root` for units.
///
/// Hidden directories, directories without a manifest and names the
/// selection file cannot hold are skipped. The result is sorted by name and
/// may be empty.
pub fn discover_units(root: &Path, manifests: &[String]) -> Result<Vec<BackupUnit>> {
    if !root.is_dir() {
        return Err(Error::InvalidRoot(root.display().to_string()).into());
    }

    let mut units = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|err| {
            Error::InvalidRoot(format!("{}: {err}", root.display()))
        })?;
        // Symlinked stack directories count as units too.
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if !representable_name(&name) {
            warn!(dir = %entry.path().display(), "directory name cannot be stored in the selection list; skipping");
            continue;
        }
        match find_manifest(entry.path(), manifests) {
            Some(manifest) => {
                debug!(unit = %name, manifest = %manifest.display(), "discovered unit");
                units.push(BackupUnit::new(name, entry.path()));
            }
            None => debug!(dir = %entry.path().display(), "no manifest; skipping"),
        }
    }

    units.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(units)
}
