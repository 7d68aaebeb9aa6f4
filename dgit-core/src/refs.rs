//! Named pointers into the commit graph
//!
//! ```text
//! {meta}/
//!   HEAD               — commit id the working tree reflects
//!   current_branch     — name of the checked-out branch
//!   branches/{name}    — commit id per branch; `origin/master` nests
//!   remotes/{name}     — filesystem path of another repository
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{RepoError, RepoResult};
use crate::object::ObjectId;

const HEAD_FILE: &str = "HEAD";
const CURRENT_BRANCH_FILE: &str = "current_branch";
const BRANCHES_DIR: &str = "branches";
const REMOTES_DIR: &str = "remotes";

/// Ref storage for one metadata directory
#[derive(Debug, Clone)]
pub struct Refs {
    meta_dir: PathBuf,
}

impl Refs {
    pub fn new(meta_dir: impl Into<PathBuf>) -> Self {
        Self {
            meta_dir: meta_dir.into(),
        }
    }

    /// Create the ref directories
    pub fn init(&self) -> RepoResult<()> {
        fs::create_dir_all(self.meta_dir.join(BRANCHES_DIR))?;
        fs::create_dir_all(self.meta_dir.join(REMOTES_DIR))?;
        Ok(())
    }

    // ==================== Head ====================

    pub fn head(&self) -> RepoResult<ObjectId> {
        read_id(&self.meta_dir.join(HEAD_FILE))
    }

    pub fn set_head(&self, id: ObjectId) -> RepoResult<()> {
        write_text(&self.meta_dir.join(HEAD_FILE), &id.to_hex())
    }

    pub fn current_branch(&self) -> RepoResult<String> {
        let path = self.meta_dir.join(CURRENT_BRANCH_FILE);
        Ok(fs::read_to_string(path)?.trim().to_string())
    }

    pub fn set_current_branch(&self, name: &str) -> RepoResult<()> {
        write_text(&self.meta_dir.join(CURRENT_BRANCH_FILE), name)
    }

    // ==================== Branches ====================

    fn branch_path(&self, name: &str) -> RepoResult<PathBuf> {
        validate_name(name)?;
        Ok(self.meta_dir.join(BRANCHES_DIR).join(name))
    }

    /// Tip of `name`, or `None` if there is no such branch
    pub fn branch(&self, name: &str) -> RepoResult<Option<ObjectId>> {
        let path = self.branch_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        read_id(&path).map(Some)
    }

    pub fn has_branch(&self, name: &str) -> RepoResult<bool> {
        Ok(self.branch_path(name)?.is_file())
    }

    /// Create or move a branch
    pub fn set_branch(&self, name: &str, id: ObjectId) -> RepoResult<()> {
        let path = self.check_branch_name(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_text(&path, &id.to_hex())?;
        tracing::debug!(branch = name, commit = %id, "moved branch");
        Ok(())
    }

    /// Check that `name` can be written as a branch: it must be a valid name,
    /// none of its prefixes may be a branch, and it may not itself be the
    /// prefix of other branches. Returns the ref file path.
    pub fn check_branch_name(&self, name: &str) -> RepoResult<PathBuf> {
        let path = self.branch_path(name)?;
        let root = self.meta_dir.join(BRANCHES_DIR);
        for (end, _) in name.match_indices('/') {
            let prefix = &name[..end];
            if root.join(prefix).is_file() {
                return Err(RepoError::BranchNameClash {
                    name: name.to_string(),
                    existing: prefix.to_string(),
                });
            }
        }
        if path.is_dir() {
            let mut nested = Vec::new();
            collect_names(&path, name, &mut nested)?;
            nested.sort();
            return Err(RepoError::BranchNameClash {
                name: name.to_string(),
                existing: nested.into_iter().next().unwrap_or_else(|| name.to_string()),
            });
        }
        Ok(path)
    }

    /// Delete a branch; returns `false` if it did not exist
    pub fn delete_branch(&self, name: &str) -> RepoResult<bool> {
        let path = self.branch_path(name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        let root = self.meta_dir.join(BRANCHES_DIR);
        prune_empty_dirs(path.parent(), &root)?;
        Ok(true)
    }

    /// All branch names, sorted, with nested names joined by `/`
    pub fn branches(&self) -> RepoResult<Vec<String>> {
        let mut names = Vec::new();
        collect_names(&self.meta_dir.join(BRANCHES_DIR), "", &mut names)?;
        names.sort();
        Ok(names)
    }

    // ==================== Remotes ====================

    fn remote_path(&self, name: &str) -> RepoResult<PathBuf> {
        validate_name(name)?;
        if name.contains('/') {
            return Err(RepoError::InvalidName(name.to_string()));
        }
        Ok(self.meta_dir.join(REMOTES_DIR).join(name))
    }

    /// Stored location of remote `name`, as written by `add-remote`
    pub fn remote(&self, name: &str) -> RepoResult<Option<PathBuf>> {
        let path = self.remote_path(name)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(PathBuf::from(fs::read_to_string(path)?.trim())))
    }

    pub fn set_remote(&self, name: &str, location: &Path) -> RepoResult<()> {
        let path = self.remote_path(name)?;
        fs::create_dir_all(self.meta_dir.join(REMOTES_DIR))?;
        write_text(&path, &location.to_string_lossy())
    }

    /// Delete a remote; returns `false` if it did not exist
    pub fn delete_remote(&self, name: &str) -> RepoResult<bool> {
        let path = self.remote_path(name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    pub fn remotes(&self) -> RepoResult<Vec<String>> {
        let mut names = Vec::new();
        collect_names(&self.meta_dir.join(REMOTES_DIR), "", &mut names)?;
        names.sort();
        Ok(names)
    }
}

/// Reject names that would escape the ref directory or cannot be files
fn validate_name(name: &str) -> RepoResult<()> {
    let invalid = name.is_empty()
        || name.ends_with('/')
        || name.contains('\\')
        || Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if invalid {
        return Err(RepoError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn read_id(path: &Path) -> RepoResult<ObjectId> {
    let text = fs::read_to_string(path)?;
    text.parse().map_err(|e: hex::FromHexError| RepoError::CorruptedRef {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_text(path: &Path, text: &str) -> RepoResult<()> {
    fs::write(path, text)?;
    Ok(())
}

fn collect_names(dir: &Path, prefix: &str, names: &mut Vec<String>) -> RepoResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let full = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_names(&entry.path(), &full, names)?;
        } else if file_type.is_file() {
            names.push(full);
        }
    }
    Ok(())
}

fn prune_empty_dirs(mut dir: Option<&Path>, root: &Path) -> RepoResult<()> {
    while let Some(current) = dir {
        if current == root || fs::read_dir(current)?.next().is_some() {
            break;
        }
        fs::remove_dir(current)?;
        dir = current.parent();
    }
    Ok(())
}
