//! Local inventory: one snapshot of the working root's directories.

use std::fs::DirEntry;
use std::path::Path;

use gitsync_core::{LocalEntry, RepoName};

use crate::error::{inventory_err, SyncError};

/// List the directories directly under `root`, sorted by name.
///
/// Files are ignored. Each entry records whether it holds a `.git` entry;
/// nothing else is read from disk.
pub fn scan(root: &Path) -> Result<Vec<LocalEntry>, SyncError> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| inventory_err(root, e))? {
        if let Some(local) = local_entry(root, entry)? {
            entries.push(local);
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(root = %root.display(), count = entries.len(), "scanned working root");
    Ok(entries)
}

/// An unreadable entry fails the scan; a missing name would otherwise be
/// planned as a clone over it.
fn local_entry(
    root: &Path,
    entry: std::io::Result<DirEntry>,
) -> Result<Option<LocalEntry>, SyncError> {
    let entry = entry.map_err(|e| inventory_err(root, e))?;
    let path = entry.path();
    if !path.is_dir() {
        return Ok(None);
    }
    Ok(Some(LocalEntry {
        name: RepoName::from(entry.file_name().to_string_lossy().into_owned()),
        is_working_copy: path.join(".git").exists(),
    }))
}
