//! Storage abstraction layer for dgit
//!
//! Objects live in flat namespaces on disk, one file per object named by its
//! full hex id. A repository has two namespaces: `commits/` holding
//! bincode-encoded [`Commit`] records and `blobs/` holding raw file contents.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

use crate::object::{HEX_LEN, ObjectId};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Object {id} is corrupted: content hashes to {actual}")]
    Corrupted { id: ObjectId, actual: ObjectId },
}

/// Generic object store interface
///
/// Remote sync copies between two stores through this trait, so it stays
/// object-safe; typed record helpers live in [`RecordStore`].
pub trait ObjectStore {
    /// Get object data by ID
    fn get(&self, id: ObjectId) -> Result<Bytes>;

    /// Check if object exists
    fn exists(&self, id: ObjectId) -> bool;

    /// Put content-addressed data (returns the object ID)
    fn put(&self, data: &[u8]) -> Result<ObjectId>;

    /// Store data under a caller-computed key; a no-op if the key is present
    fn insert(&self, id: ObjectId, data: &[u8]) -> Result<()>;

    /// List all object IDs in the store
    fn list(&self) -> Result<Vec<ObjectId>>;
}

/// Serde-typed access on top of any [`ObjectStore`]
pub trait RecordStore: ObjectStore {
    /// Serialize `record` and store it under the hash of its encoding
    fn put_record<T: Serialize>(&self, record: &T) -> Result<ObjectId> {
        let data = bincode::serialize(record)?;
        self.put(&data)
    }

    /// Load and deserialize the record stored under `id`
    fn get_record<T: DeserializeOwned>(&self, id: ObjectId) -> Result<T> {
        let data = self.get(id)?;
        Ok(bincode::deserialize(&data)?)
    }
}

impl<S: ObjectStore + ?Sized> RecordStore for S {}

/// Loose object store: one file per object in a single directory
#[derive(Debug, Clone)]
pub struct LooseStore {
    dir: PathBuf,
    verify: bool,
}

impl LooseStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, verify: false })
    }

    /// Re-hash content on read and report mismatches as [`StorageError::Corrupted`]
    ///
    /// Only meaningful for content-addressed namespaces.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        self.dir.join(id.to_hex())
    }

    fn write_new(&self, id: ObjectId, data: &[u8]) -> Result<()> {
        let path = self.object_path(id);
        if path.exists() {
            return Ok(());
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;
        tracing::debug!(object = %id, bytes = data.len(), dir = ?self.dir, "stored object");
        Ok(())
    }
}

impl ObjectStore for LooseStore {
    fn get(&self, id: ObjectId) -> Result<Bytes> {
        let path = self.object_path(id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        if self.verify {
            let actual = ObjectId::from_data(&data);
            if actual != id {
                return Err(StorageError::Corrupted { id, actual });
            }
        }
        Ok(Bytes::from(data))
    }

    fn exists(&self, id: ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    fn put(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        self.write_new(id, data)?;
        Ok(id)
    }

    fn insert(&self, id: ObjectId, data: &[u8]) -> Result<()> {
        self.write_new(id, data)
    }

    fn list(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.len() != HEX_LEN {
                continue;
            }
            if let Ok(id) = ObjectId::from_hex(name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Copy one object between stores unless the destination already has it.
///
/// Returns `true` when bytes were actually written.
pub fn copy_object(
    src: &dyn ObjectStore,
    dst: &dyn ObjectStore,
    id: ObjectId,
) -> Result<bool> {
    if dst.exists(id) {
        return Ok(false);
    }
    let data = src.get(id)?;
    dst.insert(id, &data)?;
    Ok(true)
}
