//! Duplicate cleaning: move (or delete) the non-main members of each
//! duplicate group, keeping the selected best image in place.
//!
//! Exact groups are re-verified by byte comparison before anything
//! moves, which protects against digest collisions in the index and
//! against files that mutated after ingestion. Dry-run mode never
//! touches the filesystem and therefore never fails on permissions.

use super::{CancellationToken, Engine};
use crate::core::similarity::{find_exact_groups, find_near_groups};
use crate::core::types::{CleanOptions, CleanReport, DuplicateGroup, Fingerprint};
use crate::error::{EngineError, Result};
use std::fs;
use std::path::Path;

pub fn clean(
    engine: &Engine,
    options: &CleanOptions,
    cancel: &CancellationToken,
) -> Result<CleanReport> {
    tracing::info!(dry_run = options.dry_run, "starting duplicate clean");

    let fingerprints = engine.store().all()?;
    let exact = find_exact_groups(&fingerprints, options.selection_policy);

    // Images claimed by an exact group (even one later suppressed) are
    // not considered again by the near pass
    let exact_members: std::collections::HashSet<_> =
        exact.iter().flat_map(|g| g.member_ids()).collect();
    let near_input: Vec<Fingerprint> = fingerprints
        .iter()
        .filter(|fp| !exact_members.contains(&fp.id))
        .cloned()
        .collect();
    let near = find_near_groups(
        &near_input,
        options.max_similarity_threshold,
        &engine.comparator,
        options.selection_policy,
    )?;

    let mut report = CleanReport {
        total_processed: exact.len() + near.len(),
        ..Default::default()
    };

    for group in &exact {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match verify_binary_match(engine, group) {
            Ok(true) => process_group(engine, group, options, &mut report),
            Ok(false) => {
                tracing::warn!(group = group.group_id, "byte re-verification failed, group suppressed");
            }
            Err(error) => {
                tracing::warn!(group = group.group_id, error = %error, "verification unreadable, group suppressed");
            }
        }
    }

    for group in &near {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        process_group(engine, group, options, &mut report);
    }

    tracing::info!(
        moved = report.moved_files,
        freed = report.freed_space_bytes,
        errors = report.errors.len(),
        "clean complete"
    );
    Ok(report)
}

/// Byte-compare every duplicate against the main image
fn verify_binary_match(engine: &Engine, group: &DuplicateGroup) -> Result<bool> {
    let main = engine.store().get(&group.main_image_id)?;
    let main_bytes = fs::read(&main.metadata.path).map_err(|e| {
        EngineError::Scan(crate::error::ScanError::Read {
            path: main.metadata.path.clone(),
            source: e,
        })
    })?;

    for id in &group.duplicate_ids {
        let duplicate = engine.store().get(id)?;
        let bytes = fs::read(&duplicate.metadata.path).map_err(|e| {
            EngineError::Scan(crate::error::ScanError::Read {
                path: duplicate.metadata.path.clone(),
                source: e,
            })
        })?;
        if bytes != main_bytes {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Move or delete every qualifying duplicate of one group. Failures are
/// recorded and the rest of the group continues.
fn process_group(
    engine: &Engine,
    group: &DuplicateGroup,
    options: &CleanOptions,
    report: &mut CleanReport,
) {
    for id in &group.duplicate_ids {
        let fingerprint = match engine.store().get(id) {
            Ok(fp) => fp,
            Err(error) => {
                report.errors.push(format!("{id}: {error}"));
                continue;
            }
        };

        if fingerprint.quality.final_score < options.min_quality_score {
            tracing::debug!(
                path = %fingerprint.metadata.path.display(),
                score = fingerprint.quality.final_score,
                "below quality floor, left in place"
            );
            continue;
        }

        if options.dry_run {
            tracing::info!(
                from = %fingerprint.metadata.path.display(),
                group = group.group_id,
                "dry run: would move duplicate"
            );
            continue;
        }

        let outcome = if options.move_duplicates {
            move_duplicate(&fingerprint, &group.group_id, options)
        } else {
            fs::remove_file(&fingerprint.metadata.path).map_err(|e| {
                EngineError::Clean(crate::error::CleanError::Delete {
                    path: fingerprint.metadata.path.clone(),
                    source: e,
                })
            })
        };

        match outcome {
            Ok(()) => {
                report.moved_files += 1;
                report.freed_space_bytes += fingerprint.metadata.size_bytes;
                // The owning file is gone from its indexed location
                if let Err(error) = engine.store().delete(id) {
                    tracing::warn!(%id, error = %error, "fingerprint removal after move failed");
                }
            }
            Err(error) => {
                tracing::warn!(%id, error = %error, "duplicate not moved");
                report.errors.push(format!("{id}: {error}"));
            }
        }
    }
}

fn move_duplicate(
    fingerprint: &Fingerprint,
    group_id: &str,
    options: &CleanOptions,
) -> Result<()> {
    let source = &fingerprint.metadata.path;
    let file_name = source
        .file_name()
        .map(Path::new)
        .unwrap_or_else(|| Path::new("unnamed"));
    let dest_dir = options.output_dir.join(group_id);
    let destination = dest_dir.join(file_name);

    fs::create_dir_all(&dest_dir).map_err(|e| {
        EngineError::Clean(crate::error::CleanError::CreateOutputDir {
            path: dest_dir.clone(),
            source: e,
        })
    })?;

    rename_or_copy(source, &destination).map_err(|e| {
        EngineError::Clean(crate::error::CleanError::Move {
            from: source.clone(),
            to: destination.clone(),
            source: e,
        })
    })?;

    tracing::debug!(from = %source.display(), to = %destination.display(), "moved duplicate");
    Ok(())
}

/// Rename, falling back to copy-verify-delete across filesystems
fn rename_or_copy(source: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(_) => {
            let source_size = fs::metadata(source)?.len();
            fs::copy(source, destination)?;
            let dest_size = fs::metadata(destination)?.len();
            if dest_size != source_size {
                let _ = fs::remove_file(destination);
                return Err(std::io::Error::other(format!(
                    "copy verification failed: source {source_size} bytes, dest {dest_size} bytes"
                )));
            }
            fs::remove_file(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{EngineConfig, StoreBackend};
    use crate::core::engine::CancellationToken;
    use crate::core::index::{FingerprintStore, MemoryStore};
    use crate::core::types::SelectionPolicy;
    use crate::events::null_sender;
    use image::{ImageBuffer, Rgb};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn engine() -> Engine {
        let config = EngineConfig {
            backend: StoreBackend::Memory,
            num_workers: 2,
            ..Default::default()
        };
        Engine::with_store(config, FingerprintStore::Memory(MemoryStore::new()))
    }

    fn write_identical_pair(dir: &Path) -> (PathBuf, PathBuf) {
        let img = ImageBuffer::from_fn(32, 32, |x, y| {
            let v = ((x * 5 + y * 3) % 256) as u8;
            Rgb([v, v, v])
        });
        let a = dir.join("a.png");
        let b = dir.join("b.png");
        img.save(&a).unwrap();
        std::fs::copy(&a, &b).unwrap();
        (a, b)
    }

    fn scan(engine: &Engine, dir: &Path) {
        engine
            .scan_folder(
                &[dir.to_path_buf()],
                &CancellationToken::new(),
                &null_sender(),
            )
            .unwrap();
    }

    #[test]
    fn dry_run_moves_nothing() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_identical_pair(dir.path());

        let engine = engine();
        scan(&engine, dir.path());

        let options = CleanOptions {
            dry_run: true,
            output_dir: dir.path().join("dups"),
            ..Default::default()
        };
        let report = engine
            .clean_duplicates(&options, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.moved_files, 0);
        assert!(a.exists() && b.exists());
        assert_eq!(engine.store().all().unwrap().len(), 2);
    }

    #[test]
    fn live_clean_moves_duplicate_and_keeps_main() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_identical_pair(dir.path());

        let engine = engine();
        scan(&engine, dir.path());

        let options = CleanOptions {
            dry_run: false,
            output_dir: dir.path().join("dups"),
            selection_policy: SelectionPolicy::HighestQuality,
            ..Default::default()
        };
        let report = engine
            .clean_duplicates(&options, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.moved_files, 1);
        assert!(report.freed_space_bytes > 0);
        // Exactly one of the pair remains in place
        assert_eq!(a.exists() as u8 + b.exists() as u8, 1);
        // The moved file landed under the group directory
        assert!(dir.path().join("dups").exists());
        // Its fingerprint left the index
        assert_eq!(engine.store().all().unwrap().len(), 1);
    }

    #[test]
    fn mutated_file_suppresses_exact_group() {
        let dir = TempDir::new().unwrap();
        let (_a, b) = write_identical_pair(dir.path());

        let engine = engine();
        scan(&engine, dir.path());

        // Mutate one file after ingestion: digests in the index still
        // match, bytes on disk no longer do
        let mut bytes = std::fs::read(&b).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&b, bytes).unwrap();

        let options = CleanOptions {
            dry_run: false,
            output_dir: dir.path().join("dups"),
            max_similarity_threshold: 1.0,
            ..Default::default()
        };
        let report = engine
            .clean_duplicates(&options, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.moved_files, 0, "suppressed group must not move files");
    }

    #[test]
    fn cancelled_clean_returns_cancelled() {
        let dir = TempDir::new().unwrap();
        write_identical_pair(dir.path());

        let engine = engine();
        scan(&engine, dir.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine.clean_duplicates(&CleanOptions::default(), &cancel);
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn quality_floor_leaves_duplicates_in_place() {
        let dir = TempDir::new().unwrap();
        let (a, b) = write_identical_pair(dir.path());

        let engine = engine();
        scan(&engine, dir.path());

        let options = CleanOptions {
            dry_run: false,
            min_quality_score: 101.0,
            output_dir: dir.path().join("dups"),
            ..Default::default()
        };
        let report = engine
            .clean_duplicates(&options, &CancellationToken::new())
            .unwrap();

        assert_eq!(report.moved_files, 0);
        assert!(a.exists() && b.exists());
    }
}
