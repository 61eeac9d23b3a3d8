//! SQLite store backend.
//!
//! One row per fingerprint: the JSON record plus indexed columns for the
//! content digest, the path, and each perceptual hash. WAL mode keeps
//! readers unblocked during writes; the 5-second busy timeout covers the
//! index-open lock window.

use super::{decode_record, encode_record, IndexStats, OPEN_TIMEOUT};
use crate::core::hasher::{to_hex, HashKind};
use crate::core::types::{Fingerprint, ImageId};
use crate::error::IndexError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the index database
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| IndexError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.busy_timeout(OPEN_TIMEOUT)
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        // WAL lets readers proceed while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS fingerprints (
                id          TEXT PRIMARY KEY,
                path        TEXT NOT NULL UNIQUE,
                sha256      TEXT NOT NULL,
                a_hash      TEXT,
                p_hash      TEXT,
                d_hash      TEXT,
                w_hash      TEXT,
                size_bytes  INTEGER NOT NULL,
                quality     REAL NOT NULL,
                record      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sha256 ON fingerprints(sha256);
            CREATE INDEX IF NOT EXISTS idx_a_hash ON fingerprints(a_hash);
            CREATE INDEX IF NOT EXISTS idx_p_hash ON fingerprints(p_hash);
            CREATE INDEX IF NOT EXISTS idx_d_hash ON fingerprints(d_hash);
            CREATE INDEX IF NOT EXISTS idx_w_hash ON fingerprints(w_hash);",
        )
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            db_path: path.to_path_buf(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Connection>>, IndexError> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Corrupt("sqlite connection mutex poisoned".to_string()))
    }

    fn column(kind: HashKind) -> &'static str {
        match kind {
            HashKind::Average => "a_hash",
            HashKind::Perception => "p_hash",
            HashKind::Difference => "d_hash",
            HashKind::Wavelet => "w_hash",
        }
    }

    fn hash_param(value: u64) -> Option<String> {
        (value != 0).then(|| to_hex(value))
    }

    pub fn save(&self, fingerprint: &Fingerprint) -> Result<(), IndexError> {
        let record = encode_record(fingerprint)?;
        let record_text = String::from_utf8(record)
            .map_err(|e| IndexError::Serialization(e.to_string()))?;

        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(IndexError::StorageClosed)?;

        let tx = conn
            .transaction()
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        // Replace by id and evict whatever previously owned this path
        tx.execute(
            "DELETE FROM fingerprints WHERE id = ?1 OR path = ?2",
            params![
                fingerprint.id.as_str(),
                fingerprint.metadata.path.to_string_lossy()
            ],
        )
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        tx.execute(
            "INSERT INTO fingerprints
             (id, path, sha256, a_hash, p_hash, d_hash, w_hash, size_bytes, quality, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                fingerprint.id.as_str(),
                fingerprint.metadata.path.to_string_lossy(),
                fingerprint.metadata.sha256,
                Self::hash_param(fingerprint.perceptual_hashes.a_hash),
                Self::hash_param(fingerprint.perceptual_hashes.p_hash),
                Self::hash_param(fingerprint.perceptual_hashes.d_hash),
                Self::hash_param(fingerprint.perceptual_hashes.w_hash),
                fingerprint.metadata.size_bytes as i64,
                fingerprint.quality.final_score,
                record_text,
            ],
        )
        .map_err(|e| IndexError::Storage(e.to_string()))?;

        tx.commit().map_err(|e| IndexError::Storage(e.to_string()))
    }

    pub fn get(&self, id: &ImageId) -> Result<Fingerprint, IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let record: Option<String> = conn
            .query_row(
                "SELECT record FROM fingerprints WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        match record {
            Some(text) => decode_record(text.as_bytes()),
            None => Err(IndexError::NotFound { id: id.to_string() }),
        }
    }

    pub fn all(&self) -> Result<Vec<Fingerprint>, IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let mut stmt = conn
            .prepare("SELECT id, record FROM fingerprints ORDER BY id")
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let mut fingerprints = Vec::new();
        for row in rows {
            let (id, record) = row.map_err(|e| IndexError::Storage(e.to_string()))?;
            match decode_record(record.as_bytes()) {
                Ok(fp) => fingerprints.push(fp),
                Err(e) => {
                    tracing::warn!(id, error = %e, "skipping corrupt fingerprint record");
                }
            }
        }
        Ok(fingerprints)
    }

    pub fn find_by_sha256(&self, sha256: &str) -> Result<Vec<Fingerprint>, IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let mut stmt = conn
            .prepare("SELECT record FROM fingerprints WHERE sha256 = ?1 ORDER BY id")
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([sha256], |row| row.get::<_, String>(0))
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let mut fingerprints = Vec::new();
        for row in rows {
            let record = row.map_err(|e| IndexError::Storage(e.to_string()))?;
            fingerprints.push(decode_record(record.as_bytes())?);
        }
        Ok(fingerprints)
    }

    pub fn find_similar(
        &self,
        target: u64,
        max_distance: u32,
        kind: HashKind,
    ) -> Result<Vec<Fingerprint>, IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let sql = format!(
            "SELECT {col}, record FROM fingerprints WHERE {col} IS NOT NULL ORDER BY id",
            col = Self::column(kind)
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let mut fingerprints = Vec::new();
        for row in rows {
            let (hex, record) = row.map_err(|e| IndexError::Storage(e.to_string()))?;
            let Some(hash) = crate::core::hasher::from_hex(&hex) else {
                tracing::warn!(hex, "skipping unparsable hash index entry");
                continue;
            };
            if crate::core::hasher::hamming(target, hash) <= max_distance {
                fingerprints.push(decode_record(record.as_bytes())?);
            }
        }
        Ok(fingerprints)
    }

    pub fn delete(&self, id: &ImageId) -> Result<(), IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let affected = conn
            .execute("DELETE FROM fingerprints WHERE id = ?1", [id.as_str()])
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(IndexError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;

        let (total, total_size, average_quality): (i64, i64, f64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(AVG(quality), 0.0)
                 FROM fingerprints",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|e| IndexError::Storage(e.to_string()))?;

        let index_size = std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0);

        Ok(IndexStats {
            total_images: total as u64,
            total_size_bytes: total_size as u64,
            average_quality,
            index_size_bytes: index_size,
        })
    }

    pub fn close(&self) -> Result<(), IndexError> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| IndexError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    pub fn compact(&self) -> Result<(), IndexError> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(IndexError::StorageClosed)?;
        conn.execute_batch("VACUUM;")
            .map_err(|e| IndexError::Storage(e.to_string()))
    }
}
