//! # Fingerprint Index
//!
//! Persistent store for image fingerprints with secondary indices on the
//! content digest, the normalized path, and each perceptual hash kind.
//!
//! Three interchangeable backends share one contract:
//! - `BucketStore` - embedded sled store, the desktop default
//! - `SqliteStore` - embedded relational store for richer queries
//! - `MemoryStore` - in-memory, for testing
//!
//! ## Contract
//! - `save` and `delete` are atomic across all six namespaces; a failed
//!   secondary update rolls back the primary write
//! - `save` is idempotent per id: the newer record replaces the older
//!   and stale secondary entries go first; a fingerprint occupying the
//!   same path under a different id is evicted in the same transaction
//! - zero-valued perceptual hashes get no index entry
//! - a corrupt record discovered by `all()` is logged and skipped so one
//!   bad record cannot poison a scan
//! - `find_similar` results equal a linear scan of the hash namespace

mod bucket;
mod memory;
mod sqlite;

pub use bucket::BucketStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::core::config::{EngineConfig, StoreBackend};
use crate::core::hasher::{digest, HashKind};
use crate::core::types::{Fingerprint, ImageId};
use crate::error::IndexError;
use serde::{Deserialize, Serialize};

/// How long `open` waits for the backing file lock
pub const OPEN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Index statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_images: u64,
    /// Total byte size of the referenced image files
    pub total_size_bytes: u64,
    pub average_quality: f64,
    /// On-disk size of the index itself (0 for the memory backend)
    pub index_size_bytes: u64,
}

/// The closed set of storage backends
pub enum FingerprintStore {
    Bucket(BucketStore),
    Relational(SqliteStore),
    Memory(MemoryStore),
}

impl FingerprintStore {
    /// Open the backend selected by the configuration
    pub fn open(config: &EngineConfig) -> Result<Self, IndexError> {
        match config.backend {
            StoreBackend::Bucket => Ok(Self::Bucket(BucketStore::open(&config.index_path)?)),
            StoreBackend::Relational => {
                Ok(Self::Relational(SqliteStore::open(&config.index_path)?))
            }
            StoreBackend::Memory => Ok(Self::Memory(MemoryStore::new())),
        }
    }

    pub fn save(&self, fingerprint: &Fingerprint) -> Result<(), IndexError> {
        validate(fingerprint)?;
        match self {
            Self::Bucket(s) => s.save(fingerprint),
            Self::Relational(s) => s.save(fingerprint),
            Self::Memory(s) => s.save(fingerprint),
        }
    }

    pub fn get(&self, id: &ImageId) -> Result<Fingerprint, IndexError> {
        match self {
            Self::Bucket(s) => s.get(id),
            Self::Relational(s) => s.get(id),
            Self::Memory(s) => s.get(id),
        }
    }

    /// Every fingerprint; ordering is unspecified but stable per call
    pub fn all(&self) -> Result<Vec<Fingerprint>, IndexError> {
        match self {
            Self::Bucket(s) => s.all(),
            Self::Relational(s) => s.all(),
            Self::Memory(s) => s.all(),
        }
    }

    pub fn find_by_sha256(&self, sha256: &str) -> Result<Vec<Fingerprint>, IndexError> {
        match self {
            Self::Bucket(s) => s.find_by_sha256(sha256),
            Self::Relational(s) => s.find_by_sha256(sha256),
            Self::Memory(s) => s.find_by_sha256(sha256),
        }
    }

    /// Every fingerprint whose hash of `kind` lies within `max_distance`
    /// of `target`. Fingerprints without that hash never match.
    pub fn find_similar(
        &self,
        target: u64,
        max_distance: u32,
        kind: HashKind,
    ) -> Result<Vec<Fingerprint>, IndexError> {
        match self {
            Self::Bucket(s) => s.find_similar(target, max_distance, kind),
            Self::Relational(s) => s.find_similar(target, max_distance, kind),
            Self::Memory(s) => s.find_similar(target, max_distance, kind),
        }
    }

    pub fn delete(&self, id: &ImageId) -> Result<(), IndexError> {
        match self {
            Self::Bucket(s) => s.delete(id),
            Self::Relational(s) => s.delete(id),
            Self::Memory(s) => s.delete(id),
        }
    }

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        match self {
            Self::Bucket(s) => s.stats(),
            Self::Relational(s) => s.stats(),
            Self::Memory(s) => s.stats(),
        }
    }

    pub fn close(&self) -> Result<(), IndexError> {
        match self {
            Self::Bucket(s) => s.close(),
            Self::Relational(s) => s.close(),
            Self::Memory(s) => s.close(),
        }
    }

    pub fn compact(&self) -> Result<(), IndexError> {
        match self {
            Self::Bucket(s) => s.compact(),
            Self::Relational(s) => s.compact(),
            Self::Memory(s) => s.compact(),
        }
    }
}

/// Record-level validation applied before every save
fn validate(fingerprint: &Fingerprint) -> Result<(), IndexError> {
    if !digest::is_valid_sha256_hex(&fingerprint.metadata.sha256) {
        return Err(IndexError::Corrupt(format!(
            "fingerprint {} carries an invalid sha256 digest",
            fingerprint.id
        )));
    }
    Ok(())
}

/// Serialize a fingerprint for the key-value backends
pub(crate) fn encode_record(fingerprint: &Fingerprint) -> Result<Vec<u8>, IndexError> {
    serde_json::to_vec(fingerprint).map_err(|e| IndexError::Serialization(e.to_string()))
}

/// Deserialize a fingerprint record
pub(crate) fn decode_record(bytes: &[u8]) -> Result<Fingerprint, IndexError> {
    serde_json::from_slice(bytes).map_err(|e| IndexError::Serialization(e.to_string()))
}
