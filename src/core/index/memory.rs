//! In-memory store backend for testing.
//!
//! Holds the same six namespaces as the persistent backends in plain
//! maps behind a single mutex; a poisoned lock is reported as corruption
//! rather than propagating a panic.

use super::IndexStats;
use crate::core::hasher::HashKind;
use crate::core::types::{Fingerprint, ImageId};
use crate::error::IndexError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
struct Namespaces {
    fingerprints: HashMap<ImageId, Fingerprint>,
    sha256_index: HashMap<String, Vec<ImageId>>,
    path_index: HashMap<PathBuf, ImageId>,
    a_index: HashMap<u64, Vec<ImageId>>,
    p_index: HashMap<u64, Vec<ImageId>>,
    d_index: HashMap<u64, Vec<ImageId>>,
    w_index: HashMap<u64, Vec<ImageId>>,
    closed: bool,
}

impl Namespaces {
    fn hash_index(&mut self, kind: HashKind) -> &mut HashMap<u64, Vec<ImageId>> {
        match kind {
            HashKind::Average => &mut self.a_index,
            HashKind::Perception => &mut self.p_index,
            HashKind::Difference => &mut self.d_index,
            HashKind::Wavelet => &mut self.w_index,
        }
    }

    fn hash_index_ref(&self, kind: HashKind) -> &HashMap<u64, Vec<ImageId>> {
        match kind {
            HashKind::Average => &self.a_index,
            HashKind::Perception => &self.p_index,
            HashKind::Difference => &self.d_index,
            HashKind::Wavelet => &self.w_index,
        }
    }

    /// Remove every namespace entry belonging to `id`
    fn remove_entries(&mut self, id: &ImageId) {
        let Some(fp) = self.fingerprints.remove(id) else {
            return;
        };

        if let Some(ids) = self.sha256_index.get_mut(&fp.metadata.sha256) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.sha256_index.remove(&fp.metadata.sha256);
            }
        }

        if self.path_index.get(&fp.metadata.path) == Some(id) {
            self.path_index.remove(&fp.metadata.path);
        }

        for kind in HashKind::ALL {
            if let Some(hash) = fp.perceptual_hashes.get(kind) {
                let index = self.hash_index(kind);
                if let Some(ids) = index.get_mut(&hash) {
                    ids.retain(|other| other != id);
                    if ids.is_empty() {
                        index.remove(&hash);
                    }
                }
            }
        }
    }
}

/// Thread-safe in-memory fingerprint store
pub struct MemoryStore {
    inner: Mutex<Namespaces>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Namespaces::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Namespaces>, IndexError> {
        self.inner
            .lock()
            .map_err(|_| IndexError::Corrupt("memory store mutex poisoned".to_string()))
    }

    fn lock_open(&self) -> Result<std::sync::MutexGuard<'_, Namespaces>, IndexError> {
        let guard = self.lock()?;
        if guard.closed {
            return Err(IndexError::StorageClosed);
        }
        Ok(guard)
    }

    pub fn save(&self, fingerprint: &Fingerprint) -> Result<(), IndexError> {
        let mut ns = self.lock_open()?;

        // Stale entries first: same id, then a different record that
        // already occupies this path
        ns.remove_entries(&fingerprint.id);
        if let Some(existing) = ns.path_index.get(&fingerprint.metadata.path).cloned() {
            if existing != fingerprint.id {
                ns.remove_entries(&existing);
            }
        }

        ns.fingerprints
            .insert(fingerprint.id.clone(), fingerprint.clone());
        ns.sha256_index
            .entry(fingerprint.metadata.sha256.clone())
            .or_default()
            .push(fingerprint.id.clone());
        ns.path_index
            .insert(fingerprint.metadata.path.clone(), fingerprint.id.clone());

        for kind in HashKind::ALL {
            if let Some(hash) = fingerprint.perceptual_hashes.get(kind) {
                ns.hash_index(kind)
                    .entry(hash)
                    .or_default()
                    .push(fingerprint.id.clone());
            }
        }

        Ok(())
    }

    pub fn get(&self, id: &ImageId) -> Result<Fingerprint, IndexError> {
        let ns = self.lock_open()?;
        ns.fingerprints
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound { id: id.to_string() })
    }

    pub fn all(&self) -> Result<Vec<Fingerprint>, IndexError> {
        let ns = self.lock_open()?;
        let mut fingerprints: Vec<_> = ns.fingerprints.values().cloned().collect();
        fingerprints.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(fingerprints)
    }

    pub fn find_by_sha256(&self, sha256: &str) -> Result<Vec<Fingerprint>, IndexError> {
        let ns = self.lock_open()?;
        let ids = ns.sha256_index.get(sha256).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| ns.fingerprints.get(id).cloned())
            .collect())
    }

    pub fn find_similar(
        &self,
        target: u64,
        max_distance: u32,
        kind: HashKind,
    ) -> Result<Vec<Fingerprint>, IndexError> {
        let ns = self.lock_open()?;
        let mut matches = Vec::new();

        for (&hash, ids) in ns.hash_index_ref(kind) {
            if crate::core::hasher::hamming(target, hash) <= max_distance {
                matches.extend(ids.iter().filter_map(|id| ns.fingerprints.get(id).cloned()));
            }
        }

        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    pub fn delete(&self, id: &ImageId) -> Result<(), IndexError> {
        let mut ns = self.lock_open()?;
        if !ns.fingerprints.contains_key(id) {
            return Err(IndexError::NotFound { id: id.to_string() });
        }
        ns.remove_entries(id);
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let ns = self.lock_open()?;
        let total = ns.fingerprints.len() as u64;
        let total_size: u64 = ns.fingerprints.values().map(|fp| fp.metadata.size_bytes).sum();
        let quality_sum: f64 = ns
            .fingerprints
            .values()
            .map(|fp| fp.quality.final_score)
            .sum();

        Ok(IndexStats {
            total_images: total,
            total_size_bytes: total_size,
            average_quality: if total > 0 { quality_sum / total as f64 } else { 0.0 },
            index_size_bytes: 0,
        })
    }

    pub fn close(&self) -> Result<(), IndexError> {
        let mut ns = self.lock()?;
        ns.closed = true;
        Ok(())
    }

    pub fn compact(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PerceptualHashes;

    fn fingerprint(path: &str, sha: char) -> Fingerprint {
        super::super::tests::sample_fingerprint(
            path,
            sha,
            PerceptualHashes {
                a_hash: 0x1111,
                ..Default::default()
            },
        )
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = MemoryStore::new();
        store.save(&fingerprint("/a.png", 'a')).unwrap();
        store.close().unwrap();

        assert!(matches!(store.all(), Err(IndexError::StorageClosed)));
        assert!(matches!(
            store.save(&fingerprint("/b.png", 'b')),
            Err(IndexError::StorageClosed)
        ));
    }

    #[test]
    fn delete_of_missing_id_is_not_found() {
        let store = MemoryStore::new();
        let missing = ImageId("img_missing".to_string());
        assert!(matches!(
            store.delete(&missing),
            Err(IndexError::NotFound { .. })
        ));
    }

    #[test]
    fn shared_hash_keeps_other_entries_on_delete() {
        let store = MemoryStore::new();
        let a = fingerprint("/a.png", 'a');
        let b = fingerprint("/b.png", 'b');
        store.save(&a).unwrap();
        store.save(&b).unwrap();

        store.delete(&a.id).unwrap();

        let remaining = store
            .find_similar(0x1111, 0, HashKind::Average)
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);
    }

    #[test]
    fn all_is_sorted_and_stable() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.save(&fingerprint(&format!("/{i}.png"), 'a')).unwrap();
        }
        let first = store.all().unwrap();
        let second = store.all().unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].id <= w[1].id));
    }
}
