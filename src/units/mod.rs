//! Backup units: one directory holding one compose stack.

use std::path::{Path, PathBuf};

use serde::Serialize;

pub mod discovery;

pub use discovery::{discover_units, find_manifest, representable_name};

/// Manifest names recognized by default, in lookup order.
pub const DEFAULT_MANIFESTS: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BackupUnit {
    pub name: String,
    pub path: PathBuf,
}

impl BackupUnit {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Unit for a selection entry, resolved against the backup root.
    pub fn under_root(root: &Path, name: &str) -> Self {
        Self::new(name, root.join(name))
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}
