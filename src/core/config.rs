//! Engine configuration.
//!
//! All knobs are serde-loadable so a JSON config file can override the
//! defaults; missing fields keep their default values.

use crate::core::types::{
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MEMORY_BUDGET, DEFAULT_NUM_WORKERS,
};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which storage backend holds the fingerprint index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Embedded bucketed store (sled), the desktop default
    Bucket,
    /// Embedded relational store (SQLite) for richer queries
    Relational,
    /// In-memory store for testing
    Memory,
}

/// Which perceptual hashes to compute during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashConfig {
    #[serde(default = "default_true")]
    pub compute_a_hash: bool,
    #[serde(default = "default_true")]
    pub compute_p_hash: bool,
    #[serde(default = "default_true")]
    pub compute_d_hash: bool,
    #[serde(default)]
    pub compute_w_hash: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            compute_a_hash: true,
            compute_p_hash: true,
            compute_d_hash: true,
            compute_w_hash: false,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the index file (ignored by the memory backend)
    pub index_path: PathBuf,
    pub backend: StoreBackend,
    /// Scan worker count (W); the work queue is bounded at 2*W
    pub num_workers: usize,
    /// Skip files larger than this many bytes
    pub max_file_size: u64,
    /// In-flight file bytes allowed before the producer blocks
    pub memory_budget: u64,
    pub hashes: HashConfig,
    /// Extract EXIF metadata during scans
    pub extract_exif: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("imgdedup.db"),
            backend: StoreBackend::Bucket,
            num_workers: DEFAULT_NUM_WORKERS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            hashes: HashConfig::default(),
            extract_exif: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&data)
            .map_err(|e| EngineError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Worker count, never zero
    pub fn workers(&self) -> usize {
        self.num_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.max_file_size, 500 * 1024 * 1024);
        assert!(config.hashes.compute_a_hash);
        assert!(!config.hashes.compute_w_hash);
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{ "num_workers": 8, "backend": "memory" }}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.num_workers, 8);
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn invalid_config_file_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = EngineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn workers_never_zero() {
        let config = EngineConfig {
            num_workers: 0,
            ..Default::default()
        };
        assert_eq!(config.workers(), 1);
    }
}
