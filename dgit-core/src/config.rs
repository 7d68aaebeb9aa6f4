//! Repository configuration stored at `.dgit/config.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RepoResult;

const CONFIG_FILE: &str = "config.json";

/// Per-repository settings. A missing file means defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Branch created by `init` and pointed at the root commit.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Re-hash blobs when reading them back from the store.
    #[serde(default)]
    pub verify_objects: bool,
}

fn default_branch() -> String {
    "master".to_string()
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            verify_objects: false,
        }
    }
}

impl RepoConfig {
    /// Load config from a metadata directory.
    pub fn load(meta_dir: &Path) -> RepoResult<Self> {
        let config_path = Self::file_path(meta_dir);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save config to a metadata directory.
    pub fn save(&self, meta_dir: &Path) -> RepoResult<()> {
        let config_path = Self::file_path(meta_dir);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }

    fn file_path(meta_dir: &Path) -> PathBuf {
        meta_dir.join(CONFIG_FILE)
    }
}
