//! Remote sync between repositories on the same filesystem
//!
//! A remote is another dgit repository addressed by path. Transfers copy
//! commit records and the blobs they reference, skipping anything the
//! destination already holds.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, RepoResult};
use crate::merge::MergeOutcome;
use crate::object::{Commit, ObjectId};
use crate::repository::{META_DIR, Repository};
use crate::storage::copy_object;

/// Statistics from a push or fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Commit records copied
    pub commits: usize,
    /// Blobs copied
    pub blobs: usize,
    /// Blobs already present at the destination
    pub skipped: usize,
}

impl TransferStats {
    pub fn is_empty(&self) -> bool {
        self.commits == 0 && self.blobs == 0
    }
}

/// One-way copy of history from `source` into `dest`
struct Transfer<'a> {
    source: &'a Repository,
    dest: &'a Repository,
}

impl<'a> Transfer<'a> {
    fn new(source: &'a Repository, dest: &'a Repository) -> Self {
        Self { source, dest }
    }

    /// Copy every commit reachable from `tip` that the destination lacks.
    ///
    /// The walk stops at commits the destination already has; their history
    /// is assumed present. Commits are copied parents first, and each
    /// commit's blobs are written before the commit itself.
    fn copy_history(&self, tip: ObjectId) -> RepoResult<TransferStats> {
        let src = self.source.commits();
        let dst = self.dest.commits();

        let mut missing = HashMap::new();
        let mut queue = VecDeque::from([tip]);
        while let Some(id) = queue.pop_front() {
            if missing.contains_key(&id) || dst.contains(id) {
                continue;
            }
            let commit = src.get(id)?;
            queue.extend(commit.parents());
            missing.insert(id, commit);
        }

        let mut stats = TransferStats::default();
        let mut seen_blobs = HashSet::new();
        for commit in parents_first(tip, &missing) {
            for blob in commit.blobs().values() {
                if !seen_blobs.insert(*blob) {
                    continue;
                }
                if copy_object(self.source.blobs(), self.dest.blobs(), *blob)? {
                    stats.blobs += 1;
                } else {
                    stats.skipped += 1;
                }
            }
            copy_object(src.store(), dst.store(), commit.id())?;
            stats.commits += 1;
            tracing::debug!(commit = %commit.id(), "copied commit");
        }
        Ok(stats)
    }
}

/// Commits of `missing` reachable from `tip`, ordered so every commit comes
/// after those of its parents that are also in `missing`
fn parents_first(tip: ObjectId, missing: &HashMap<ObjectId, Commit>) -> Vec<&Commit> {
    let mut order = Vec::with_capacity(missing.len());
    let mut done = HashSet::new();
    // (id, parents already pushed)
    let mut stack = vec![(tip, false)];
    while let Some((id, expanded)) = stack.pop() {
        let Some(commit) = missing.get(&id) else {
            continue;
        };
        if expanded {
            if done.insert(id) {
                order.push(commit);
            }
            continue;
        }
        if done.contains(&id) {
            continue;
        }
        stack.push((id, true));
        stack.extend(
            commit
                .parents()
                .filter(|parent| !done.contains(parent))
                .map(|parent| (parent, false)),
        );
    }
    order
}

impl Repository {
    /// Register another repository under `name`
    pub fn add_remote(&self, name: &str, location: impl AsRef<Path>) -> RepoResult<()> {
        if self.refs().remote(name)?.is_some() {
            return Err(RepoError::RemoteExists(name.to_string()));
        }
        self.refs().set_remote(name, location.as_ref())?;
        tracing::info!(remote = name, location = ?location.as_ref(), "added remote");
        Ok(())
    }

    pub fn remove_remote(&self, name: &str) -> RepoResult<()> {
        if !self.refs().delete_remote(name)? {
            return Err(RepoError::NoSuchRemote(name.to_string()));
        }
        tracing::info!(remote = name, "removed remote");
        Ok(())
    }

    /// Open the repository registered as remote `name`
    pub fn open_remote(&self, name: &str) -> RepoResult<Repository> {
        let location = self
            .refs()
            .remote(name)?
            .ok_or_else(|| RepoError::NoSuchRemote(name.to_string()))?;
        let meta_dir = self.remote_meta_dir(&location);

        let remote = match Repository::open_meta(&meta_dir) {
            Ok(remote) => remote,
            Err(RepoError::NotInitialized(_)) => {
                return Err(RepoError::RemoteUnreachable(location));
            }
            Err(e) => return Err(e),
        };
        if remote.uuid() == self.uuid() {
            return Err(RepoError::RemoteIsSelf(name.to_string()));
        }
        Ok(remote)
    }

    /// Metadata directory for a stored remote location, which may name either
    /// the metadata directory itself or the working root above it
    fn remote_meta_dir(&self, location: &Path) -> PathBuf {
        let location = if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.root().join(location)
        };
        if location.file_name().is_some_and(|n| n == META_DIR) {
            location
        } else {
            location.join(META_DIR)
        }
    }

    /// Send local head to `branch` on remote `name`
    pub fn push(&self, name: &str, branch: &str) -> RepoResult<TransferStats> {
        let remote = self.open_remote(name)?;
        let head = self.head()?;

        if let Some(tip) = remote.refs().branch(branch)? {
            if !self.commits().in_first_parent_history(tip, head)? {
                return Err(RepoError::NonFastForward {
                    remote: name.to_string(),
                    branch: branch.to_string(),
                });
            }
        } else {
            remote.refs().check_branch_name(branch)?;
        }

        let stats = Transfer::new(self, &remote).copy_history(head)?;
        remote.refs().set_branch(branch, head)?;
        if remote.current_branch()? == branch {
            remote.refs().set_head(head)?;
        }

        tracing::info!(
            remote = name,
            branch,
            commits = stats.commits,
            blobs = stats.blobs,
            skipped = stats.skipped,
            "pushed"
        );
        Ok(stats)
    }

    /// Copy `branch` of remote `name` into the tracking branch `name/branch`
    pub fn fetch(&self, name: &str, branch: &str) -> RepoResult<TransferStats> {
        let remote = self.open_remote(name)?;
        let tip = remote
            .refs()
            .branch(branch)?
            .ok_or_else(|| RepoError::NoSuchRemoteBranch {
                remote: name.to_string(),
                branch: branch.to_string(),
            })?;

        let tracking = tracking_branch(name, branch);
        self.refs().check_branch_name(&tracking)?;

        let stats = Transfer::new(&remote, self).copy_history(tip)?;
        self.refs().set_branch(&tracking, tip)?;

        tracing::info!(
            remote = name,
            branch = %tracking,
            commits = stats.commits,
            blobs = stats.blobs,
            skipped = stats.skipped,
            "fetched"
        );
        Ok(stats)
    }

    /// Fetch, then merge the tracking branch into the current branch
    pub fn pull(&self, name: &str, branch: &str) -> RepoResult<MergeOutcome> {
        self.fetch(name, branch)?;
        self.merge(&tracking_branch(name, branch))
    }
}

/// Local name of the branch that mirrors `branch` on remote `remote`
pub fn tracking_branch(remote: &str, branch: &str) -> String {
    format!("{}/{}", remote, branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remote_bookkeeping() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();

        repo.add_remote("origin", "../elsewhere").unwrap();
        assert!(matches!(
            repo.add_remote("origin", "../other"),
            Err(RepoError::RemoteExists(_))
        ));
        repo.remove_remote("origin").unwrap();
        assert!(matches!(
            repo.remove_remote("origin"),
            Err(RepoError::NoSuchRemote(_))
        ));
    }

    #[test]
    fn test_remote_location_forms() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path().join("local")).unwrap();

        assert_eq!(
            repo.remote_meta_dir(Path::new("../other")),
            tmp.path().join("local").join("../other").join(META_DIR)
        );
        assert_eq!(
            repo.remote_meta_dir(&tmp.path().join("other").join(META_DIR)),
            tmp.path().join("other").join(META_DIR)
        );
    }

    #[test]
    fn test_unreachable_remote() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path().join("local")).unwrap();
        repo.add_remote("origin", tmp.path().join("missing")).unwrap();

        assert!(matches!(
            repo.fetch("origin", "master"),
            Err(RepoError::RemoteUnreachable(_))
        ));
        assert!(matches!(
            repo.push("nope", "master"),
            Err(RepoError::NoSuchRemote(_))
        ));
    }

    #[test]
    fn test_remote_pointing_at_self() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.add_remote("me", tmp.path()).unwrap();

        assert!(matches!(
            repo.push("me", "master"),
            Err(RepoError::RemoteIsSelf(_))
        ));
    }

    fn commit(message: &str, parent: Option<ObjectId>, second: Option<ObjectId>) -> Commit {
        Commit::with_timestamp(message.into(), "t".into(), parent, second, Default::default())
            .unwrap()
    }

    #[test]
    fn test_parents_first_order() {
        // `side` sits one step from `tip` but is a child of `a`, which a
        // breadth-first walk reaches at the same depth
        let root = commit("root", None, None);
        let a = commit("a", Some(root.id()), None);
        let side = commit("side", Some(a.id()), None);
        let tip = commit("tip", Some(a.id()), Some(side.id()));
        let missing: HashMap<ObjectId, Commit> = [&a, &side, &tip]
            .into_iter()
            .map(|c| (c.id(), c.clone()))
            .collect();

        let order: Vec<ObjectId> = parents_first(tip.id(), &missing)
            .into_iter()
            .map(Commit::id)
            .collect();
        assert_eq!(order, vec![a.id(), side.id(), tip.id()]);
    }

    #[test]
    fn test_parents_first_skips_present_commits() {
        let root = commit("root", None, None);
        let a = commit("a", Some(root.id()), None);
        let missing = HashMap::from([(a.id(), a.clone())]);

        let order = parents_first(a.id(), &missing);
        assert_eq!(order, vec![&a]);
        assert!(parents_first(root.id(), &missing).is_empty());
    }

    #[test]
    fn test_tracking_branch_name() {
        assert_eq!(tracking_branch("origin", "master"), "origin/master");
    }
}
