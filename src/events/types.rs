//! Event type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// File discovery phase
    Scan(ScanEvent),
    /// Per-image fingerprinting phase
    Process(ProcessEvent),
    /// Duplicate grouping phase
    Duplicate(DuplicateEvent),
    /// Engine lifecycle
    Engine(EngineEvent),
}

/// Events during file discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    Started { roots: Vec<PathBuf> },
    FileFound { path: PathBuf },
    Error { path: PathBuf, message: String },
    Completed { total_files: usize },
}

/// Events while fingerprinting individual images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessEvent {
    Started { total_files: usize },
    Progress(ProcessProgress),
    /// An image failed and was counted as skipped
    Skipped { path: PathBuf, message: String },
    Completed { processed: usize, skipped: usize },
}

/// Progress snapshot during fingerprinting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessProgress {
    pub completed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

/// Events from duplicate queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DuplicateEvent {
    Started { total_fingerprints: usize },
    GroupFound { group_id: String, members: usize },
    Completed { groups: usize },
}

/// Engine lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    ScanStarted { scan_id: String },
    ScanCancelled { scan_id: String },
    ScanCompleted { scan_id: String, duration_ms: u64 },
}
