//! Repository operations
//!
//! A [`Repository`] binds a working directory to its metadata directory:
//!
//! ```text
//! {root}/
//!   .dgit/
//!     uuid                  — repository UUID
//!     config.json           — [`RepoConfig`]
//!     HEAD, current_branch  — see [`Refs`]
//!     branches/, remotes/
//!     commits/{id}          — bincode commit records
//!     blobs/{id}            — raw file contents
//!     staged.json, removed.json — the [`Index`]
//!   <tracked files>
//! ```
//!
//! Every mutating operation runs its precondition checks before it writes
//! anything.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RepoConfig;
use crate::error::{RepoError, RepoResult};
use crate::graph::{CommitGraph, Log};
use crate::index::{self, Index};
use crate::object::{Commit, ObjectId};
use crate::refs::Refs;
use crate::storage::{LooseStore, ObjectStore, StorageError};
use crate::worktree::{TreeStatus, WorkTree};

/// Name of the metadata directory inside a working root
pub const META_DIR: &str = ".dgit";

const UUID_FILE: &str = "uuid";
const COMMITS_DIR: &str = "commits";
const BLOBS_DIR: &str = "blobs";

/// A dgit repository rooted at a working directory
#[derive(Debug, Clone)]
pub struct Repository {
    meta_dir: PathBuf,
    uuid: String,
    config: RepoConfig,
    worktree: WorkTree,
    refs: Refs,
    commits: CommitGraph,
    blobs: LooseStore,
}

/// Everything `status` reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub current_branch: String,
    /// All local branch names, sorted
    pub branches: Vec<String>,
    pub tree: TreeStatus,
}

impl Repository {
    /// Initialize a new repository in `root` with default configuration
    pub fn init(root: impl AsRef<Path>) -> RepoResult<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Initialize a new repository: root commit, default branch, empty index
    pub fn init_with_config(root: impl AsRef<Path>, config: RepoConfig) -> RepoResult<Self> {
        let root = root.as_ref();
        let meta_dir = root.join(META_DIR);
        if meta_dir.exists() {
            return Err(RepoError::AlreadyInitialized(meta_dir));
        }
        fs::create_dir_all(&meta_dir)?;

        let uuid = uuid::Uuid::new_v4().to_string();
        fs::write(meta_dir.join(UUID_FILE), &uuid)?;
        config.save(&meta_dir)?;

        let repo = Self::load(root.to_path_buf(), meta_dir, uuid, config)?;
        repo.refs.init()?;

        let root = Commit::root().map_err(StorageError::from)?;
        let root_id = repo.commits.write(&root)?;
        let branch = repo.config.default_branch.clone();
        repo.refs.set_branch(&branch, root_id)?;
        repo.refs.set_head(root_id)?;
        repo.refs.set_current_branch(&branch)?;
        Index::new().save(&repo.meta_dir)?;

        tracing::info!(root = ?repo.root(), uuid = %repo.uuid, "initialized repository");
        Ok(repo)
    }

    /// Open the repository whose working root is `root`
    pub fn open(root: impl AsRef<Path>) -> RepoResult<Self> {
        let root = root.as_ref();
        Self::open_meta(root.join(META_DIR))
    }

    /// Open a repository given its metadata directory; the working root is
    /// the directory containing it
    pub fn open_meta(meta_dir: impl Into<PathBuf>) -> RepoResult<Self> {
        let meta_dir = meta_dir.into();
        if !meta_dir.is_dir() || !meta_dir.join(COMMITS_DIR).is_dir() {
            return Err(RepoError::NotInitialized(meta_dir));
        }
        let root = meta_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let uuid = fs::read_to_string(meta_dir.join(UUID_FILE))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let config = RepoConfig::load(&meta_dir)?;
        Self::load(root, meta_dir, uuid, config)
    }

    fn load(root: PathBuf, meta_dir: PathBuf, uuid: String, config: RepoConfig) -> RepoResult<Self> {
        let commits = CommitGraph::new(LooseStore::open(meta_dir.join(COMMITS_DIR))?);
        let blobs =
            LooseStore::open(meta_dir.join(BLOBS_DIR))?.with_verification(config.verify_objects);
        Ok(Self {
            refs: Refs::new(&meta_dir),
            worktree: WorkTree::new(root),
            meta_dir,
            uuid,
            config,
            commits,
            blobs,
        })
    }

    // ==================== Accessors ====================

    pub fn root(&self) -> &Path {
        self.worktree.root()
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn commits(&self) -> &CommitGraph {
        &self.commits
    }

    pub fn blobs(&self) -> &LooseStore {
        &self.blobs
    }

    pub fn worktree(&self) -> &WorkTree {
        &self.worktree
    }

    pub fn head(&self) -> RepoResult<ObjectId> {
        self.refs.head()
    }

    pub fn head_commit(&self) -> RepoResult<Commit> {
        self.commits.get(self.refs.head()?)
    }

    pub fn current_branch(&self) -> RepoResult<String> {
        self.refs.current_branch()
    }

    pub fn index(&self) -> RepoResult<Index> {
        Index::load(&self.meta_dir)
    }

    pub(crate) fn save_index(&self, index: &Index) -> RepoResult<()> {
        index.save(&self.meta_dir)
    }

    /// Tip of a local branch, failing with `NoSuchBranch`
    pub fn branch_tip(&self, name: &str) -> RepoResult<ObjectId> {
        self.refs
            .branch(name)?
            .ok_or_else(|| RepoError::NoSuchBranch(name.to_string()))
    }

    // ==================== Staging ====================

    /// Stage the working copy of `name` for the next commit
    pub fn add(&self, name: &str) -> RepoResult<()> {
        if !self.worktree.exists(name)? {
            return Err(RepoError::FileNotFound(name.to_string()));
        }
        let data = self.worktree.read(name)?;
        let id = ObjectId::from_data(&data);
        let head = self.head_commit()?;
        let mut index = self.index()?;

        if head.blob(name) == Some(id) {
            index.clear_path(name);
            tracing::debug!(file = name, "working copy matches head; unstaged");
        } else {
            self.blobs.put(&data)?;
            index.stage_add(name, id);
            tracing::debug!(file = name, blob = %id, "staged file");
        }
        self.save_index(&index)
    }

    /// Unstage `name` and, if the head commit tracks it, stage its removal
    /// and delete the working copy
    pub fn rm(&self, name: &str) -> RepoResult<()> {
        let head = self.head_commit()?;
        let mut index = self.index()?;
        let staged = index.is_staged(name);
        let tracked = head.tracks(name);
        if !staged && !tracked {
            return Err(RepoError::NothingToRemove(name.to_string()));
        }

        if tracked {
            index.stage_remove(name);
            self.worktree.remove(name)?;
        } else {
            index.clear_path(name);
        }
        self.save_index(&index)
    }

    // ==================== Commits ====================

    /// Record the staged changes as a new commit on the current branch
    pub fn commit(&self, message: &str) -> RepoResult<ObjectId> {
        let mut index = self.index()?;
        self.commit_index(message, &mut index, None)
    }

    /// Shared by `commit` and `merge`: build the next snapshot from head plus
    /// `index`, write the commit, advance head and the current branch, and
    /// clear the index. A merge commit may have an empty index.
    pub(crate) fn commit_index(
        &self,
        message: &str,
        index: &mut Index,
        second_parent: Option<ObjectId>,
    ) -> RepoResult<ObjectId> {
        if message.trim().is_empty() {
            return Err(RepoError::EmptyMessage);
        }
        if index.is_empty() && second_parent.is_none() {
            return Err(RepoError::NothingToCommit);
        }

        let head = self.head_commit()?;
        let (staged, removed) = index.drain();
        let blobs = index::overlay(head.blobs(), &staged, &removed);
        let commit = Commit::new(message.to_string(), head.id(), second_parent, blobs)
            .map_err(StorageError::from)?;
        let id = self.commits.write(&commit)?;

        let branch = self.current_branch()?;
        self.refs.set_head(id)?;
        self.refs.set_branch(&branch, id)?;
        self.save_index(index)?;

        tracing::info!(commit = %id, branch = %branch, files = commit.blobs().len(), "created commit");
        Ok(id)
    }

    /// History of the head commit, newest first
    pub fn log(&self) -> RepoResult<Log<'_>> {
        Ok(self.commits.log(self.head()?))
    }

    /// Every commit ever made, in no particular order
    pub fn global_log(&self) -> RepoResult<Vec<Commit>> {
        self.commits.all()
    }

    /// Ids of the commits with exactly this message
    pub fn find(&self, message: &str) -> RepoResult<Vec<ObjectId>> {
        self.commits.find(message)
    }

    pub fn status(&self) -> RepoResult<Status> {
        let head = self.head_commit()?;
        let index = self.index()?;
        Ok(Status {
            current_branch: self.current_branch()?,
            branches: self.refs.branches()?,
            tree: self.worktree.status(head.blobs(), &index)?,
        })
    }

    // ==================== Checkout / reset ====================

    /// Restore `name` from the head commit
    pub fn checkout_file(&self, name: &str) -> RepoResult<()> {
        let head = self.head_commit()?;
        self.restore_file(&head, name)
    }

    /// Restore `name` from a (possibly abbreviated) commit id
    pub fn checkout_file_from(&self, commit: &str, name: &str) -> RepoResult<()> {
        let id = self.commits.resolve(commit)?;
        let commit = self.commits.get(id)?;
        self.restore_file(&commit, name)
    }

    fn restore_file(&self, commit: &Commit, name: &str) -> RepoResult<()> {
        let blob = commit
            .blob(name)
            .ok_or_else(|| RepoError::FileNotInCommit(name.to_string()))?;
        self.worktree.checkout_blob(&self.blobs, name, blob)
    }

    /// Switch to another branch, replacing the working tree with its tip
    pub fn checkout_branch(&self, name: &str) -> RepoResult<()> {
        let target = self.branch_tip(name)?;
        let current = self.current_branch()?;
        if name == current {
            return Err(RepoError::AlreadyOnBranch(name.to_string()));
        }

        let target = self.commits.get(target)?;
        self.move_to(&target)?;
        self.refs.set_current_branch(name)?;
        tracing::info!(from = %current, to = name, "switched branch");
        Ok(())
    }

    /// Move head and the current branch to an arbitrary commit
    pub fn reset(&self, commit: &str) -> RepoResult<ObjectId> {
        let id = self.commits.resolve(commit)?;
        let target = self.commits.get(id)?;
        self.move_to(&target)?;
        self.refs.set_branch(&self.current_branch()?, id)?;
        tracing::info!(commit = %id, "reset current branch");
        Ok(id)
    }

    /// Guard, sync the working tree from head to `target`, clear the index
    /// and point head at `target`. Branch pointers are left to the caller.
    pub(crate) fn move_to(&self, target: &Commit) -> RepoResult<()> {
        let head = self.head_commit()?;
        self.worktree.check_untracked(head.blobs(), target.blobs())?;

        self.worktree.sync(&self.blobs, head.blobs(), target.blobs())?;
        self.save_index(&Index::new())?;
        self.refs.set_head(target.id())?;
        Ok(())
    }

    // ==================== Branches ====================

    /// Create a branch pointing at head
    pub fn branch(&self, name: &str) -> RepoResult<()> {
        if self.refs.has_branch(name)? {
            return Err(RepoError::BranchExists(name.to_string()));
        }
        let head = self.head()?;
        self.refs.set_branch(name, head)?;
        tracing::info!(branch = name, commit = %head, "created branch");
        Ok(())
    }

    /// Delete a branch pointer; its commits stay in the store
    pub fn remove_branch(&self, name: &str) -> RepoResult<()> {
        if !self.refs.has_branch(name)? {
            return Err(RepoError::NoSuchBranch(name.to_string()));
        }
        if name == self.current_branch()? {
            return Err(RepoError::CannotRemoveCurrent(name.to_string()));
        }
        self.refs.delete_branch(name)?;
        tracing::info!(branch = name, "removed branch");
        Ok(())
    }
}
