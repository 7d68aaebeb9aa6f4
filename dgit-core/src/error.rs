//! Repository error types
//!
//! Every precondition failure carries the exact message shown to the user.
//! Storage and filesystem failures are wrapped and treated as fatal.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// The main error type for repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("A dgit version-control system already exists in the current directory.")]
    AlreadyInitialized(PathBuf),

    #[error("Not in an initialized dgit directory.")]
    NotInitialized(PathBuf),

    #[error("File does not exist.")]
    FileNotFound(String),

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No changes added to the commit.")]
    NothingToCommit,

    #[error("No reason to remove the file.")]
    NothingToRemove(String),

    #[error("No commit with that id exists.")]
    NoSuchCommit(String),

    #[error("Ambiguous commit id: multiple matches found.")]
    AmbiguousId(String),

    #[error("Found no commit with that message.")]
    NoCommitWithMessage(String),

    #[error("File does not exist in that commit.")]
    FileNotInCommit(String),

    #[error("No such branch exists.")]
    NoSuchBranch(String),

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch(String),

    #[error("A branch with that name already exists.")]
    BranchExists(String),

    /// Branch names nest as directories, so `a` and `a/b` cannot coexist
    #[error("Branch {name} conflicts with existing branch {existing}.")]
    BranchNameClash { name: String, existing: String },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Cannot remove the current branch.")]
    CannotRemoveCurrent(String),

    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    WouldOverwriteUntracked(String),

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    #[error("Cannot merge a branch with itself.")]
    MergeWithSelf(String),

    #[error("A remote with that name already exists.")]
    RemoteExists(String),

    #[error("A remote with that name does not exist.")]
    NoSuchRemote(String),

    #[error("Remote directory not found.")]
    RemoteUnreachable(PathBuf),

    #[error("Remote refers to this repository.")]
    RemoteIsSelf(String),

    #[error("That remote does not have that branch.")]
    NoSuchRemoteBranch { remote: String, branch: String },

    #[error("Please pull down remote changes before pushing.")]
    NonFastForward { remote: String, branch: String },

    /// Object store failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Filesystem failure outside the object store
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Index or configuration file could not be (de)serialized
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A ref file holds something that is not an object id
    #[error("corrupted ref at {}: {reason}", path.display())]
    CorruptedRef { path: PathBuf, reason: String },
}

impl RepoError {
    /// Check if this error indicates the named resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::FileNotFound(_)
                | RepoError::NoSuchCommit(_)
                | RepoError::NoCommitWithMessage(_)
                | RepoError::FileNotInCommit(_)
                | RepoError::NoSuchBranch(_)
                | RepoError::NoSuchRemote(_)
                | RepoError::RemoteUnreachable(_)
                | RepoError::NoSuchRemoteBranch { .. }
                | RepoError::Storage(StorageError::NotFound(_))
        )
    }

    /// Check if the operation was refused before anything was written
    pub fn is_precondition(&self) -> bool {
        !self.is_fatal()
    }

    /// Errors the user cannot fix by changing their request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RepoError::Storage(_)
                | RepoError::Io(_)
                | RepoError::Metadata(_)
                | RepoError::CorruptedRef { .. }
        )
    }
}

/// Result type alias for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
