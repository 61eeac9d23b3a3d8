//! # image-dedup
//!
//! An image deduplication and quality assessment engine. Scans
//! directory trees into a persistent index of per-image fingerprints
//! (perceptual hashes, content digest, quality metrics), then answers
//! which files are byte-identical and which are visually near-identical
//! despite resampling, recompression or retouching.
//!
//! ## Architecture
//! - `core` - the engine: hashing, quality, index, similarity, scanning
//! - `events` - progress reporting for front ends
//! - `error` - error types
//! - `cli` - the command-line surface

pub mod cli;
pub mod core;
pub mod error;
pub mod events;

pub use crate::core::engine::{CancellationToken, Engine};
pub use crate::error::{EngineError, Result};

/// Initialize tracing for the process.
///
/// Called once by the application entry point; honors `RUST_LOG`.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
