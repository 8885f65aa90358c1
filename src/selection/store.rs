use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParsedLine {
    Entry { name: String, enabled: bool },
    Preserved,
}

/// Classify one line of the selection file.
fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return ParsedLine::Preserved;
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return ParsedLine::Preserved;
    };
    let key = key.trim();
    // Absolute paths are external locations managed by hand, not units.
    if key.is_empty() || key.starts_with('/') {
        return ParsedLine::Preserved;
    }
    match value.trim() {
        "true" => ParsedLine::Entry {
            name: key.to_string(),
            enabled: true,
        },
        "false" => ParsedLine::Entry {
            name: key.to_string(),
            enabled: false,
        },
        other => {
            warn!(line = %line, value = %other, "selection value must be true or false; keeping line as-is");
            ParsedLine::Preserved
        }
    }
}

/// Outcome of [`SelectionStore::synchronize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SyncChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStore {
    path: PathBuf,
    preserved: Vec<String>,
    entries: BTreeMap<String, bool>,
}

impl SelectionStore {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            preserved: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Build a store from file contents without touching the filesystem.
    pub fn parse(path: impl Into<PathBuf>, contents: &str) -> Self {
        let mut store = Self::empty(path);
        for line in contents.lines() {
            match parse_line(line) {
                ParsedLine::Entry { name, enabled } => {
                    if store.entries.insert(name.clone(), enabled).is_some() {
                        warn!(unit = %name, "duplicate selection entry; last one wins");
                    }
                }
                ParsedLine::Preserved => store.preserved.push(line.to_string()),
            }
        }
        store
    }

    /// Load the selection file. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(
                    Error::Config(format!("cannot read selection file {}: {err}", path.display()))
                        .into(),
                )
            }
        };
        let store = Self::parse(path, &contents);
        debug!(
            path = %path.display(),
            entries = store.entries.len(),
            preserved = store.preserved.len(),
            "selection list loaded"
        );
        Ok(Some(store))
    }

    /// Load the selection file, starting empty if it does not exist yet.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        Ok(Self::load(path)?.unwrap_or_else(|| Self::empty(path)))
    }

    /// Reconcile stored entries with the discovered unit names.
    ///
    /// Vanished units are dropped; new units are added disabled so nothing is
    /// backed up without an explicit opt-in.
    pub fn synchronize<I, S>(&mut self, discovered: I) -> SyncChanges
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let discovered: BTreeSet<String> = discovered
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        let removed: Vec<String> = self
            .entries
            .keys()
            .filter(|name| !discovered.contains(*name))
            .cloned()
            .collect();
        for name in &removed {
            self.entries.remove(name);
            info!(unit = %name, "removed from selection list (no longer on disk)");
        }

        let mut added = Vec::new();
        for name in discovered {
            if !self.entries.contains_key(&name) {
                info!(unit = %name, "added to selection list (disabled by default)");
                self.entries.insert(name.clone(), false);
                added.push(name);
            }
        }

        let changes = SyncChanges { added, removed };
        if changes.is_empty() {
            info!("selection list already synchronized");
        }
        changes
    }

    /// Change one entry in memory; persisted by [`SelectionStore::save`].
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        match self.entries.get_mut(name) {
            Some(value) => {
                *value = enabled;
                Ok(())
            }
            None => Err(Error::UnknownUnit(name.to_string()).into()),
        }
    }

    /// Render the file: preserved lines first, then entries sorted by name.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preserved {
            out.push_str(line);
            out.push('\n');
        }
        for (name, enabled) in &self.entries {
            out.push_str(&format!("{name}={enabled}\n"));
        }
        out
    }

    /// Atomically replace the selection file (temp file in the same directory + rename).
    pub fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(self.render().as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| Error::Io(err.error))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "selection list saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    /// Enabled unit names in sorted order.
    pub fn enabled_units(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn preserved_lines(&self) -> &[String] {
        &self.preserved
    }
}
