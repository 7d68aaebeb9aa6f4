//! dgit Core Library
//!
//! Core functionality for dgit including:
//! - Object model (ObjectId, Commit, Snapshot)
//! - Content-addressed loose object storage
//! - Staging index, branches and remotes
//! - Commit graph traversal and split-point search
//! - Working tree reconciliation
//! - Three-way merge
//! - Push / fetch / pull between local repositories

pub mod object;
pub mod storage;
pub mod error;
pub mod config;
pub mod index;
pub mod refs;
pub mod graph;
pub mod worktree;
pub mod repository;
pub mod merge;
pub mod remote;

pub use object::{Commit, ObjectId, Snapshot, INITIAL_MESSAGE};
pub use storage::{LooseStore, ObjectStore, RecordStore, Result, StorageError};
pub use error::{RepoError, RepoResult};
pub use config::RepoConfig;
pub use index::Index;
pub use refs::Refs;
pub use graph::{CommitGraph, Log};
pub use worktree::{Change, TreeStatus, WorkTree};
pub use repository::{Repository, Status, META_DIR};
pub use merge::MergeOutcome;
pub use remote::{tracking_branch, TransferStats};
