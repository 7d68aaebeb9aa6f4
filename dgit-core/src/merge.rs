//! Three-way merge of a branch into the current branch

use std::collections::BTreeSet;

use crate::error::{RepoError, RepoResult};
use crate::index::Index;
use crate::object::{ObjectId, Snapshot};
use crate::repository::Repository;
use crate::storage::ObjectStore;

const CONFLICT_START: &[u8] = b"<<<<<<< HEAD\n";
const CONFLICT_SEP: &[u8] = b"=======\n";
const CONFLICT_END: &[u8] = b">>>>>>>\n";

/// What a merge did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The given branch is already contained in the current one
    GivenBranchIsAncestor,
    /// The current branch was moved to the given branch's tip
    FastForwarded,
    /// A two-parent commit was created
    Merged { commit: ObjectId, conflicted: bool },
}

/// Per-path decision, given the split, current and other versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    KeepCurrent,
    /// Take the other side's version; `None` deletes the file
    TakeOther(Option<ObjectId>),
    Conflict {
        current: Option<ObjectId>,
        other: Option<ObjectId>,
    },
}

pub(crate) fn classify(
    split: Option<ObjectId>,
    current: Option<ObjectId>,
    other: Option<ObjectId>,
) -> Resolution {
    if current == other || other == split {
        Resolution::KeepCurrent
    } else if current == split {
        Resolution::TakeOther(other)
    } else {
        Resolution::Conflict { current, other }
    }
}

/// Resolution for every path in the union of the three snapshots, skipping
/// paths where the current version wins
fn plan(split: &Snapshot, current: &Snapshot, other: &Snapshot) -> Vec<(String, Resolution)> {
    let paths: BTreeSet<&String> = split.keys().chain(current.keys()).chain(other.keys()).collect();
    paths
        .into_iter()
        .filter_map(|path| {
            let resolution = classify(
                split.get(path).copied(),
                current.get(path).copied(),
                other.get(path).copied(),
            );
            (resolution != Resolution::KeepCurrent).then(|| (path.clone(), resolution))
        })
        .collect()
}

impl Repository {
    /// Merge branch `name` into the current branch
    pub fn merge(&self, name: &str) -> RepoResult<MergeOutcome> {
        let other_id = self.branch_tip(name)?;
        let current_branch = self.current_branch()?;
        if name == current_branch {
            return Err(RepoError::MergeWithSelf(name.to_string()));
        }
        if !self.index()?.is_empty() {
            return Err(RepoError::UncommittedChanges);
        }

        let head_id = self.head()?;
        let split_id = self.commits().split_point(head_id, other_id)?;
        if split_id == Some(other_id) {
            tracing::info!(branch = name, "given branch is an ancestor; nothing to merge");
            return Ok(MergeOutcome::GivenBranchIsAncestor);
        }

        let other = self.commits().get(other_id)?;
        if split_id == Some(head_id) {
            self.move_to(&other)?;
            self.refs().set_branch(&current_branch, other_id)?;
            tracing::info!(branch = %current_branch, commit = %other_id, "fast-forwarded");
            return Ok(MergeOutcome::FastForwarded);
        }

        let head = self.commits().get(head_id)?;
        let split = match split_id {
            Some(id) => self.commits().get(id)?.blobs().clone(),
            None => Snapshot::new(),
        };
        // Same guard as checkout: runs before anything is written
        self.worktree().check_untracked(head.blobs(), other.blobs())?;
        let plan = plan(&split, head.blobs(), other.blobs());

        let mut index = Index::new();
        let mut conflicted = false;
        for (path, resolution) in plan {
            match resolution {
                Resolution::KeepCurrent => {}
                Resolution::TakeOther(Some(id)) => {
                    self.worktree().checkout_blob(self.blobs(), &path, id)?;
                    index.stage_add(&path, id);
                }
                Resolution::TakeOther(None) => {
                    self.worktree().remove(&path)?;
                    index.stage_remove(&path);
                }
                Resolution::Conflict { current, other } => {
                    let data = self.conflict_contents(current, other)?;
                    let id = self.blobs().put(&data)?;
                    self.worktree().write(&path, &data)?;
                    index.stage_add(&path, id);
                    conflicted = true;
                    tracing::debug!(file = %path, "merge conflict");
                }
            }
        }

        let message = format!("Merged {} into {}.", name, current_branch);
        let commit = self.commit_index(&message, &mut index, Some(other_id))?;
        tracing::info!(branch = name, commit = %commit, conflicted, "merged");
        Ok(MergeOutcome::Merged { commit, conflicted })
    }

    fn conflict_contents(
        &self,
        current: Option<ObjectId>,
        other: Option<ObjectId>,
    ) -> RepoResult<Vec<u8>> {
        let mut data = CONFLICT_START.to_vec();
        if let Some(id) = current {
            data.extend_from_slice(&self.blobs().get(id)?);
        }
        data.extend_from_slice(CONFLICT_SEP);
        if let Some(id) = other {
            data.extend_from_slice(&self.blobs().get(id)?);
        }
        data.extend_from_slice(CONFLICT_END);
        Ok(data)
    }
}
