//! Staging area
//!
//! Two pending-change sets relative to the head commit: files staged for
//! addition (`staged.json`, path -> blob id) and files staged for removal
//! (`removed.json`). A path is never in both at once.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::RepoResult;
use crate::object::{ObjectId, Snapshot};

const STAGED_FILE: &str = "staged.json";
const REMOVED_FILE: &str = "removed.json";

/// Pending additions and removals for the next commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    staged: Snapshot,
    removed: BTreeSet<String>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both sets from a metadata directory; missing files are empty sets
    pub fn load(meta_dir: &Path) -> RepoResult<Self> {
        Ok(Self {
            staged: read_json(&meta_dir.join(STAGED_FILE))?.unwrap_or_default(),
            removed: read_json(&meta_dir.join(REMOVED_FILE))?.unwrap_or_default(),
        })
    }

    pub fn save(&self, meta_dir: &Path) -> RepoResult<()> {
        write_json(&meta_dir.join(STAGED_FILE), &self.staged)?;
        write_json(&meta_dir.join(REMOVED_FILE), &self.removed)?;
        Ok(())
    }

    /// Queue `path` for inclusion with content `id`; cancels a pending removal
    pub fn stage_add(&mut self, path: &str, id: ObjectId) {
        self.removed.remove(path);
        self.staged.insert(path.to_string(), id);
    }

    /// Queue `path` for removal; cancels a pending addition
    pub fn stage_remove(&mut self, path: &str) {
        self.staged.remove(path);
        self.removed.insert(path.to_string());
    }

    /// Forget any pending change for `path`
    pub fn clear_path(&mut self, path: &str) {
        self.staged.remove(path);
        self.removed.remove(path);
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty() && self.removed.is_empty()
    }

    pub fn staged(&self) -> &Snapshot {
        &self.staged
    }

    pub fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }

    pub fn staged_id(&self, path: &str) -> Option<ObjectId> {
        self.staged.get(path).copied()
    }

    pub fn is_staged(&self, path: &str) -> bool {
        self.staged.contains_key(path)
    }

    pub fn is_removed(&self, path: &str) -> bool {
        self.removed.contains(path)
    }

    /// Take both sets, leaving the index empty
    pub fn drain(&mut self) -> (Snapshot, BTreeSet<String>) {
        (
            std::mem::take(&mut self.staged),
            std::mem::take(&mut self.removed),
        )
    }
}

/// Build the next snapshot: `base` with staged entries overwritten, then
/// removed paths dropped
pub fn overlay(base: &Snapshot, staged: &Snapshot, removed: &BTreeSet<String>) -> Snapshot {
    let mut next = base.clone();
    next.extend(staged.iter().map(|(path, id)| (path.clone(), *id)));
    for path in removed {
        next.remove(path);
    }
    next
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RepoResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RepoResult<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Convenience for building snapshots in tests and callers
pub fn snapshot_of<I, S>(entries: I) -> Snapshot
where
    I: IntoIterator<Item = (S, ObjectId)>,
    S: Into<String>,
{
    entries
        .into_iter()
        .map(|(path, id)| (path.into(), id))
        .collect()
}
