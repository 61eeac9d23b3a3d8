//! # Scanner
//!
//! Recursive discovery of candidate image files: walks directory trees,
//! filters by extension and size, and records per-file errors without
//! ever failing the walk.

mod filter;
mod walker;

pub use filter::FileFilter;
pub use walker::{DiscoveryResult, Walker};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A file the walker considers worth fingerprinting
#[derive(Debug, Clone, PartialEq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    /// Canonical format name derived from the extension ("jpeg", "png", ...)
    pub format: String,
}

/// Scanner behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Skip files larger than this many bytes
    pub max_file_size: u64,
    pub follow_symlinks: bool,
    pub include_hidden: bool,
    /// Directory names never descended into
    pub exclude_dirs: Vec<String>,
    /// Maximum walk depth (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_size: crate::core::types::DEFAULT_MAX_FILE_SIZE,
            follow_symlinks: false,
            include_hidden: false,
            exclude_dirs: vec![
                ".git".to_string(),
                ".svn".to_string(),
                ".hg".to_string(),
                "node_modules".to_string(),
                "__pycache__".to_string(),
            ],
            max_depth: None,
        }
    }
}
