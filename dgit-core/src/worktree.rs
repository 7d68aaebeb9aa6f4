//! Working tree reconciliation
//!
//! The working tree is the flat set of regular files directly inside the
//! repository root; the metadata directory and any subdirectories are ignored.
//! This module diffs those files against the index and the head commit, and
//! materializes stored snapshots back onto disk.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{RepoError, RepoResult};
use crate::index::Index;
use crate::object::{ObjectId, Snapshot};
use crate::storage::ObjectStore;

/// Handle on the files of a working directory
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
}

impl WorkTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a tracked file name, rejecting anything that is not a
    /// single plain component
    pub fn file_path(&self, name: &str) -> RepoResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !name.contains('/') => Ok(self.root.join(name)),
            _ => Err(RepoError::InvalidName(name.to_string())),
        }
    }

    /// Names of the regular files in the working directory, sorted
    pub fn files(&self) -> RepoResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> RepoResult<bool> {
        Ok(self.file_path(name)?.is_file())
    }

    pub fn read(&self, name: &str) -> RepoResult<Vec<u8>> {
        Ok(fs::read(self.file_path(name)?)?)
    }

    /// Content id of the working copy, or `None` if the file is missing
    pub fn hash(&self, name: &str) -> RepoResult<Option<ObjectId>> {
        match fs::read(self.file_path(name)?) {
            Ok(data) => Ok(Some(ObjectId::from_data(&data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, name: &str, data: &[u8]) -> RepoResult<()> {
        fs::write(self.file_path(name)?, data)?;
        Ok(())
    }

    /// Delete a working file; a file that is already gone is not an error
    pub fn remove(&self, name: &str) -> RepoResult<()> {
        match fs::remove_file(self.file_path(name)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the stored blob `id` to the working file `name`
    pub fn checkout_blob(&self, blobs: &dyn ObjectStore, name: &str, id: ObjectId) -> RepoResult<()> {
        let data = blobs.get(id)?;
        self.write(name, &data)
    }

    /// Refuse to proceed if a file untracked by `current` would be clobbered
    /// by a file tracked in `target`
    pub fn check_untracked(&self, current: &Snapshot, target: &Snapshot) -> RepoResult<()> {
        for name in self.files()? {
            if !current.contains_key(&name) && target.contains_key(&name) {
                return Err(RepoError::WouldOverwriteUntracked(name));
            }
        }
        Ok(())
    }

    /// Make the working tree reflect `target` after having reflected `current`
    ///
    /// Files tracked by `current` but absent from `target` are deleted; every
    /// file of `target` is written out. Untracked files are left alone.
    pub fn sync(&self, blobs: &dyn ObjectStore, current: &Snapshot, target: &Snapshot) -> RepoResult<()> {
        let mut removed = 0usize;
        for name in current.keys().filter(|name| !target.contains_key(*name)) {
            self.remove(name)?;
            removed += 1;
        }
        for (name, id) in target {
            self.checkout_blob(blobs, name, *id)?;
        }
        tracing::debug!(removed, written = target.len(), "synced working tree");
        Ok(())
    }

    /// Compare the working tree against the index and the head snapshot
    pub fn status(&self, head: &Snapshot, index: &Index) -> RepoResult<TreeStatus> {
        let files = self.files()?;
        let mut status = TreeStatus {
            staged: index.staged().keys().cloned().collect(),
            removed: index.removed().iter().cloned().collect(),
            ..TreeStatus::default()
        };

        for (name, id) in index.staged() {
            match self.hash(name)? {
                None => status.push_change(name, Change::Deleted),
                Some(actual) if actual != *id => status.push_change(name, Change::Modified),
                Some(_) => {}
            }
        }

        for (name, id) in head {
            if index.is_staged(name) || index.is_removed(name) {
                continue;
            }
            match self.hash(name)? {
                None => status.push_change(name, Change::Deleted),
                Some(actual) if actual != *id => status.push_change(name, Change::Modified),
                Some(_) => {}
            }
        }
        status.not_staged.sort();

        status.untracked = files
            .into_iter()
            .filter(|name| {
                !head.contains_key(name) && !index.is_staged(name) && !index.is_removed(name)
            })
            .collect();

        Ok(status)
    }
}

/// Kind of unstaged change to a tracked or staged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Change {
    Deleted,
    Modified,
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Deleted => write!(f, "deleted"),
            Change::Modified => write!(f, "modified"),
        }
    }
}

/// File-level part of a status report; every list is sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStatus {
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub not_staged: Vec<(String, Change)>,
    pub untracked: Vec<String>,
}

impl TreeStatus {
    fn push_change(&mut self, name: &str, change: Change) {
        self.not_staged.push((name.to_string(), change));
    }

    /// True when nothing is staged, removed, modified or untracked
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.not_staged.is_empty()
            && self.untracked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::snapshot_of;
    use crate::storage::LooseStore;
    use tempfile::TempDir;

    fn id(data: &[u8]) -> ObjectId {
        ObjectId::from_data(data)
    }

    fn tree() -> (TempDir, WorkTree) {
        let tmp = TempDir::new().unwrap();
        let tree = WorkTree::new(tmp.path());
        (tmp, tree)
    }

    #[test]
    fn test_files_skips_directories() {
        let (tmp, tree) = tree();
        fs::create_dir(tmp.path().join(".dgit")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        tree.write("b.txt", b"b").unwrap();
        tree.write("a.txt", b"a").unwrap();

        let files: Vec<_> = tree.files().unwrap().into_iter().collect();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_file_path_rejects_nested_names() {
        let (_tmp, tree) = tree();
        assert!(tree.file_path("ok.txt").is_ok());
        for bad in ["", "..", "sub/file", "/etc/passwd", "."] {
            assert!(tree.file_path(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_hash_and_remove() {
        let (_tmp, tree) = tree();
        assert_eq!(tree.hash("f").unwrap(), None);
        tree.write("f", b"content").unwrap();
        assert_eq!(tree.hash("f").unwrap(), Some(id(b"content")));

        tree.remove("f").unwrap();
        tree.remove("f").unwrap();
        assert!(!tree.exists("f").unwrap());
    }

    #[test]
    fn test_check_untracked() {
        let (_tmp, tree) = tree();
        tree.write("new.txt", b"local").unwrap();
        let current = snapshot_of([("a.txt", id(b"a"))]);
        let target = snapshot_of([("a.txt", id(b"a")), ("new.txt", id(b"theirs"))]);

        assert!(matches!(
            tree.check_untracked(&current, &target),
            Err(RepoError::WouldOverwriteUntracked(name)) if name == "new.txt"
        ));
        assert!(tree.check_untracked(&current, &current).is_ok());
    }

    #[test]
    fn test_sync_deletes_and_writes() {
        let (tmp, tree) = tree();
        let blobs = LooseStore::open(tmp.path().join(".dgit/blobs")).unwrap();
        let a = blobs.put(b"a").unwrap();
        let b = blobs.put(b"b").unwrap();
        tree.write("a.txt", b"a").unwrap();
        tree.write("keep.txt", b"untracked").unwrap();

        let current = snapshot_of([("a.txt", a)]);
        let target = snapshot_of([("b.txt", b)]);
        tree.sync(&blobs, &current, &target).unwrap();

        assert!(!tree.exists("a.txt").unwrap());
        assert_eq!(tree.read("b.txt").unwrap(), b"b");
        assert_eq!(tree.read("keep.txt").unwrap(), b"untracked");
    }

    #[test]
    fn test_status_classification() {
        let (_tmp, tree) = tree();
        let head = snapshot_of([
            ("same.txt", id(b"same")),
            ("edited.txt", id(b"v1")),
            ("vanished.txt", id(b"gone")),
            ("removed.txt", id(b"r")),
        ]);
        tree.write("same.txt", b"same").unwrap();
        tree.write("edited.txt", b"v2").unwrap();
        tree.write("staged.txt", b"s2").unwrap();
        tree.write("loose.txt", b"?").unwrap();

        let mut index = Index::new();
        index.stage_add("staged.txt", id(b"s1"));
        index.stage_add("staged-gone.txt", id(b"x"));
        index.stage_remove("removed.txt");

        let status = tree.status(&head, &index).unwrap();
        assert_eq!(status.staged, vec!["staged-gone.txt", "staged.txt"]);
        assert_eq!(status.removed, vec!["removed.txt"]);
        assert_eq!(
            status.not_staged,
            vec![
                ("edited.txt".to_string(), Change::Modified),
                ("staged-gone.txt".to_string(), Change::Deleted),
                ("staged.txt".to_string(), Change::Modified),
                ("vanished.txt".to_string(), Change::Deleted),
            ]
        );
        assert_eq!(status.untracked, vec!["loose.txt"]);
        assert!(!status.is_clean());
    }
}
