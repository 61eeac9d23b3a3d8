//! # Error Module
//!
//! Error types for the deduplication engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, ids, what went wrong
//! - **Per-image errors never abort a scan** - they are logged and counted

use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Cleaning error: {0}")]
    Clean(#[from] CleanError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation was cancelled")]
    Cancelled,
}

/// Errors decoding or preprocessing a single image
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode image {path}: {reason}")]
    DecodeFailed { path: PathBuf, reason: String },

    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Image {path} is too small for analysis ({width}x{height}, minimum {min})")]
    ImageTooSmall {
        path: PathBuf,
        width: u32,
        height: u32,
        min: u32,
    },

    #[error("Failed to read image file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the fingerprint index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Image not found in index: {id}")]
    NotFound { id: String },

    #[error("Failed to open index at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Index is corrupted: {0}")]
    Corrupt(String),

    #[error("Storage backend is closed")]
    StorageClosed,

    #[error("Storage I/O failure: {0}")]
    Storage(String),

    #[error("Failed to serialize fingerprint: {0}")]
    Serialization(String),
}

/// Errors from similarity queries
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Invalid similarity threshold: {value} (must be within 0.0..=1.0)")]
    InvalidThreshold { value: f64 },

    #[error("No fingerprints to compare")]
    NoFingerprints,
}

/// Errors during folder scanning
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("File too large: {path} ({size} bytes, limit {limit})")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while moving duplicates aside
#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} -> {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_includes_path_and_reason() {
        let error = DecodeError::DecodeFailed {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "invalid JPEG marker".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("invalid JPEG marker"));
    }

    #[test]
    fn threshold_error_includes_value() {
        let error = CompareError::InvalidThreshold { value: 1.5 };
        assert!(error.to_string().contains("1.5"));
    }

    #[test]
    fn index_errors_convert_to_engine_error() {
        let error: EngineError = IndexError::StorageClosed.into();
        assert!(matches!(error, EngineError::Index(IndexError::StorageClosed)));
    }

    #[test]
    fn scan_error_includes_limit() {
        let error = ScanError::FileTooLarge {
            path: PathBuf::from("/photos/huge.tiff"),
            size: 600,
            limit: 500,
        };
        let message = error.to_string();
        assert!(message.contains("600"));
        assert!(message.contains("500"));
    }
}
