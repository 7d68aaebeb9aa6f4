//! Core object model for dgit
//!
//! Content-addressable identifiers and the immutable commit record.
//! File contents are stored as raw blobs; a commit holds the complete
//! snapshot of tracked files as a `path -> blob id` mapping.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Length of a full hex-encoded object id.
pub const HEX_LEN: usize = 64;

/// Number of hex digits shown for abbreviated ids.
pub const SHORT_LEN: usize = 7;

/// Message of the root commit created by `init`.
pub const INITIAL_MESSAGE: &str = "initial commit";

const TIMESTAMP_FORMAT: &str = "%a %b %-d %H:%M:%S %Y %z";

/// Unique identifier for any stored object
///
/// Serialized as its hex string so that the same representation is used in
/// commit records, index files and ref files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form used in merge log lines
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_LEN);
        hex
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Whether the hex form of this id begins with `prefix` (case-insensitive)
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for ObjectId {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

/// Tracked files of a commit: file name -> blob id
pub type Snapshot = BTreeMap<String, ObjectId>;

/// Commit object
///
/// Immutable once built. The id is the hash of the bincode encoding of the
/// record with `id` unset, so it is a pure function of the other fields.
/// Constructors always seal the id; a stored record without one is rejected
/// on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    message: String,
    timestamp: String,
    parent: Option<ObjectId>,
    second_parent: Option<ObjectId>,
    blobs: Snapshot,
    #[serde(with = "sealed_id")]
    id: ObjectId,
}

/// Borrowed view of a commit with the id slot empty; encodes to the same
/// bytes as a `Commit` whose id is not yet set
#[derive(Serialize)]
struct Unsealed<'a> {
    message: &'a str,
    timestamp: &'a str,
    parent: Option<ObjectId>,
    second_parent: Option<ObjectId>,
    blobs: &'a Snapshot,
    id: Option<ObjectId>,
}

impl Unsealed<'_> {
    fn hash(&self) -> Result<ObjectId, bincode::Error> {
        Ok(ObjectId::from_data(&bincode::serialize(self)?))
    }
}

/// The id is written as `Some(id)`, the slot `Unsealed` leaves as `None`
mod sealed_id {
    use super::ObjectId;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error> {
        Some(id).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ObjectId, D::Error> {
        Option::<ObjectId>::deserialize(deserializer)?
            .ok_or_else(|| D::Error::custom("commit record has no id"))
    }
}

impl Commit {
    /// The root commit: fixed message, epoch timestamp, empty snapshot
    pub fn root() -> Result<Self, bincode::Error> {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default();
        Self::with_timestamp(
            INITIAL_MESSAGE.to_string(),
            format_timestamp(&epoch),
            None,
            None,
            Snapshot::new(),
        )
    }

    /// Create a commit stamped with the current local time
    pub fn new(
        message: String,
        parent: ObjectId,
        second_parent: Option<ObjectId>,
        blobs: Snapshot,
    ) -> Result<Self, bincode::Error> {
        Self::with_timestamp(
            message,
            format_timestamp(&Local::now()),
            Some(parent),
            second_parent,
            blobs,
        )
    }

    /// Create a commit with an explicit timestamp string and seal its id
    pub fn with_timestamp(
        message: String,
        timestamp: String,
        parent: Option<ObjectId>,
        second_parent: Option<ObjectId>,
        blobs: Snapshot,
    ) -> Result<Self, bincode::Error> {
        let id = Unsealed {
            message: &message,
            timestamp: &timestamp,
            parent,
            second_parent,
            blobs: &blobs,
            id: None,
        }
        .hash()?;
        Ok(Self {
            message,
            timestamp,
            parent,
            second_parent,
            blobs,
            id,
        })
    }

    /// Hash of the record as it looks before the id is assigned
    pub fn compute_id(&self) -> Result<ObjectId, bincode::Error> {
        Unsealed {
            message: &self.message,
            timestamp: &self.timestamp,
            parent: self.parent,
            second_parent: self.second_parent,
            blobs: &self.blobs,
            id: None,
        }
        .hash()
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn second_parent(&self) -> Option<ObjectId> {
        self.second_parent
    }

    /// Both parent links, first parent first
    pub fn parents(&self) -> impl Iterator<Item = ObjectId> {
        self.parent.into_iter().chain(self.second_parent)
    }

    pub fn blobs(&self) -> &Snapshot {
        &self.blobs
    }

    /// Blob id tracked for `path`, if any
    pub fn blob(&self, path: &str) -> Option<ObjectId> {
        self.blobs.get(path).copied()
    }

    pub fn tracks(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}
