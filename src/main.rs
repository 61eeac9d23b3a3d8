//! # imgdedup CLI
//!
//! Command-line front end for the deduplication engine.
//!
//! ## Usage
//! ```bash
//! imgdedup scan ~/Photos
//! imgdedup find-duplicates --threshold 0.85
//! imgdedup clean --output-dir ./duplicates --execute
//! ```

use image_dedup::Result;

fn main() -> Result<()> {
    image_dedup::init_tracing();
    image_dedup::cli::run()
}
