//! Bucketed store backend on sled.
//!
//! One tree per namespace: the primary fingerprint records plus the
//! sha256, path and per-hash-kind secondary indices. Saves and deletes
//! run as one multi-tree transaction, so a failed secondary update rolls
//! the whole write back and partial state is never visible.

use super::{decode_record, encode_record, IndexStats, OPEN_TIMEOUT};
use crate::core::hasher::{to_hex, HashKind};
use crate::core::types::{Fingerprint, ImageId};
use crate::error::IndexError;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const FINGERPRINTS: &str = "fingerprints";
const SHA256_INDEX: &str = "sha256_index";
const PATH_INDEX: &str = "path_index";

type TxResult<T> = Result<T, ConflictableTransactionError<String>>;

pub struct BucketStore {
    db: sled::Db,
    fingerprints: sled::Tree,
    sha256_index: sled::Tree,
    path_index: sled::Tree,
    a_index: sled::Tree,
    p_index: sled::Tree,
    d_index: sled::Tree,
    w_index: sled::Tree,
    closed: AtomicBool,
}

impl BucketStore {
    /// Open or create the store, waiting up to five seconds for the
    /// backing file lock held by another process.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let started = Instant::now();
        let db = loop {
            match sled::open(path) {
                Ok(db) => break db,
                Err(e) => {
                    if started.elapsed() >= OPEN_TIMEOUT {
                        return Err(IndexError::OpenFailed {
                            path: path.to_path_buf(),
                            reason: e.to_string(),
                        });
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
        };

        let tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| IndexError::Storage(e.to_string()))
        };

        Ok(Self {
            fingerprints: tree(FINGERPRINTS)?,
            sha256_index: tree(SHA256_INDEX)?,
            path_index: tree(PATH_INDEX)?,
            a_index: tree(HashKind::Average.key())?,
            p_index: tree(HashKind::Perception.key())?,
            d_index: tree(HashKind::Difference.key())?,
            w_index: tree(HashKind::Wavelet.key())?,
            db,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), IndexError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IndexError::StorageClosed);
        }
        Ok(())
    }

    fn hash_tree(&self, kind: HashKind) -> &sled::Tree {
        match kind {
            HashKind::Average => &self.a_index,
            HashKind::Perception => &self.p_index,
            HashKind::Difference => &self.d_index,
            HashKind::Wavelet => &self.w_index,
        }
    }

    fn all_trees(&self) -> Vec<&sled::Tree> {
        vec![
            &self.fingerprints,
            &self.sha256_index,
            &self.path_index,
            &self.a_index,
            &self.p_index,
            &self.d_index,
            &self.w_index,
        ]
    }

    fn map_txn_error(error: TransactionError<String>) -> IndexError {
        match error {
            TransactionError::Abort(message) => IndexError::Serialization(message),
            TransactionError::Storage(e) => IndexError::Storage(e.to_string()),
        }
    }

    pub fn save(&self, fingerprint: &Fingerprint) -> Result<(), IndexError> {
        self.ensure_open()?;
        let record = encode_record(fingerprint)?;

        let result: sled::transaction::TransactionResult<(), String> =
            self.all_trees().transaction(|txs| {
                let tx = TxView::new(txs);

                // Stale entries first: the same id, then whatever other
                // record already owns this path
                tx.remove_record(fingerprint.id.as_str())?;
                let path_key = fingerprint.metadata.path.to_string_lossy().into_owned();
                if let Some(existing) = tx.path.get(path_key.as_bytes())? {
                    let existing_id = String::from_utf8_lossy(&existing).into_owned();
                    if existing_id != fingerprint.id.as_str() {
                        tx.remove_record(&existing_id)?;
                    }
                }

                tx.fingerprints
                    .insert(fingerprint.id.as_str().as_bytes(), record.clone())?;
                tx.push_id(tx.sha256, &fingerprint.metadata.sha256, &fingerprint.id)?;
                tx.path.insert(
                    path_key.as_bytes(),
                    fingerprint.id.as_str().as_bytes(),
                )?;

                for kind in HashKind::ALL {
                    if let Some(hash) = fingerprint.perceptual_hashes.get(kind) {
                        tx.push_id(tx.hash_tree(kind), &to_hex(hash), &fingerprint.id)?;
                    }
                }

                Ok(())
            });

        result.map_err(Self::map_txn_error)
    }

    pub fn get(&self, id: &ImageId) -> Result<Fingerprint, IndexError> {
        self.ensure_open()?;
        let bytes = self
            .fingerprints
            .get(id.as_str().as_bytes())
            .map_err(|e| IndexError::Storage(e.to_string()))?
            .ok_or_else(|| IndexError::NotFound { id: id.to_string() })?;
        decode_record(&bytes)
    }

    pub fn all(&self) -> Result<Vec<Fingerprint>, IndexError> {
        self.ensure_open()?;
        let mut fingerprints = Vec::new();

        for entry in self.fingerprints.iter() {
            let (key, value) = entry.map_err(|e| IndexError::Storage(e.to_string()))?;
            match decode_record(&value) {
                Ok(fp) => fingerprints.push(fp),
                Err(e) => {
                    tracing::warn!(
                        id = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping corrupt fingerprint record"
                    );
                }
            }
        }
        Ok(fingerprints)
    }

    pub fn find_by_sha256(&self, sha256: &str) -> Result<Vec<Fingerprint>, IndexError> {
        self.ensure_open()?;
        let Some(bytes) = self
            .sha256_index
            .get(sha256.as_bytes())
            .map_err(|e| IndexError::Storage(e.to_string()))?
        else {
            return Ok(Vec::new());
        };

        let ids: Vec<ImageId> =
            serde_json::from_slice(&bytes).map_err(|e| IndexError::Serialization(e.to_string()))?;
        self.fetch_ids(&ids)
    }

    pub fn find_similar(
        &self,
        target: u64,
        max_distance: u32,
        kind: HashKind,
    ) -> Result<Vec<Fingerprint>, IndexError> {
        self.ensure_open()?;
        let mut matches = Vec::new();

        for entry in self.hash_tree(kind).iter() {
            let (key, value) = entry.map_err(|e| IndexError::Storage(e.to_string()))?;
            let hex = String::from_utf8_lossy(&key);
            let Some(hash) = crate::core::hasher::from_hex(&hex) else {
                tracing::warn!(hex = %hex, "skipping unparsable hash index entry");
                continue;
            };
            if crate::core::hasher::hamming(target, hash) <= max_distance {
                let ids: Vec<ImageId> = serde_json::from_slice(&value)
                    .map_err(|e| IndexError::Serialization(e.to_string()))?;
                matches.extend(self.fetch_ids(&ids)?);
            }
        }

        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    pub fn delete(&self, id: &ImageId) -> Result<(), IndexError> {
        self.ensure_open()?;

        if self
            .fingerprints
            .get(id.as_str().as_bytes())
            .map_err(|e| IndexError::Storage(e.to_string()))?
            .is_none()
        {
            return Err(IndexError::NotFound { id: id.to_string() });
        }

        let result: sled::transaction::TransactionResult<(), String> =
            self.all_trees().transaction(|txs| {
                let tx = TxView::new(txs);
                tx.remove_record(id.as_str())?;
                Ok(())
            });

        result.map_err(Self::map_txn_error)
    }

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        self.ensure_open()?;
        let mut total = 0u64;
        let mut total_size = 0u64;
        let mut quality_sum = 0.0;

        for fp in self.all()? {
            total += 1;
            total_size += fp.metadata.size_bytes;
            quality_sum += fp.quality.final_score;
        }

        Ok(IndexStats {
            total_images: total,
            total_size_bytes: total_size,
            average_quality: if total > 0 { quality_sum / total as f64 } else { 0.0 },
            index_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    pub fn close(&self) -> Result<(), IndexError> {
        self.db
            .flush()
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn compact(&self) -> Result<(), IndexError> {
        self.ensure_open()?;
        self.db
            .flush()
            .map_err(|e| IndexError::Storage(e.to_string()))?;
        Ok(())
    }

    fn fetch_ids(&self, ids: &[ImageId]) -> Result<Vec<Fingerprint>, IndexError> {
        let mut fingerprints = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(id) {
                Ok(fp) => fingerprints.push(fp),
                Err(IndexError::NotFound { .. }) => {
                    tracing::warn!(%id, "dangling id in secondary index");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(fingerprints)
    }
}

/// Borrowed view of all seven transactional trees, in `all_trees` order
struct TxView<'a> {
    fingerprints: &'a TransactionalTree,
    sha256: &'a TransactionalTree,
    path: &'a TransactionalTree,
    a: &'a TransactionalTree,
    p: &'a TransactionalTree,
    d: &'a TransactionalTree,
    w: &'a TransactionalTree,
}

impl<'a> TxView<'a> {
    fn new(txs: &'a [TransactionalTree]) -> Self {
        Self {
            fingerprints: &txs[0],
            sha256: &txs[1],
            path: &txs[2],
            a: &txs[3],
            p: &txs[4],
            d: &txs[5],
            w: &txs[6],
        }
    }

    fn hash_tree(&self, kind: HashKind) -> &'a TransactionalTree {
        match kind {
            HashKind::Average => self.a,
            HashKind::Perception => self.p,
            HashKind::Difference => self.d,
            HashKind::Wavelet => self.w,
        }
    }

    /// Append an id to the list stored under `key`, once
    fn push_id(&self, tree: &TransactionalTree, key: &str, id: &ImageId) -> TxResult<()> {
        let mut ids: Vec<ImageId> = match tree.get(key.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?,
            None => Vec::new(),
        };

        if !ids.contains(id) {
            ids.push(id.clone());
            let encoded = serde_json::to_vec(&ids)
                .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
            tree.insert(key.as_bytes(), encoded)?;
        }
        Ok(())
    }

    /// Drop an id from the list under `key`, removing the key when empty
    fn drop_id(&self, tree: &TransactionalTree, key: &str, id: &str) -> TxResult<()> {
        let Some(bytes) = tree.get(key.as_bytes())? else {
            return Ok(());
        };
        let mut ids: Vec<ImageId> = serde_json::from_slice(&bytes)
            .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
        ids.retain(|other| other.as_str() != id);

        if ids.is_empty() {
            tree.remove(key.as_bytes())?;
        } else {
            let encoded = serde_json::to_vec(&ids)
                .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;
            tree.insert(key.as_bytes(), encoded)?;
        }
        Ok(())
    }

    /// Remove a record and every secondary entry pointing at it
    fn remove_record(&self, id: &str) -> TxResult<()> {
        let Some(bytes) = self.fingerprints.get(id.as_bytes())? else {
            return Ok(());
        };
        let fp = decode_record(&bytes)
            .map_err(|e| ConflictableTransactionError::Abort(e.to_string()))?;

        self.fingerprints.remove(id.as_bytes())?;
        self.drop_id(self.sha256, &fp.metadata.sha256, id)?;

        let path_key = fp.metadata.path.to_string_lossy().into_owned();
        if let Some(owner) = self.path.get(path_key.as_bytes())? {
            if String::from_utf8_lossy(&owner) == id {
                self.path.remove(path_key.as_bytes())?;
            }
        }

        for kind in HashKind::ALL {
            if let Some(hash) = fp.perceptual_hashes.get(kind) {
                self.drop_id(self.hash_tree(kind), &to_hex(hash), id)?;
            }
        }
        Ok(())
    }
}
