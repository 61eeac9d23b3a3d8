//! End-to-end scenarios: scan real files on disk through the full
//! pipeline and query the index.

use image_dedup::core::config::{EngineConfig, HashConfig, StoreBackend};
use image_dedup::core::engine::{CancellationToken, Engine};
use image_dedup::core::hasher::{hamming, HashKind};
use image_dedup::core::index::{FingerprintStore, MemoryStore};
use image_dedup::core::similarity::Comparator;
use image_dedup::events::{null_sender, Event, EventChannel, ProcessEvent};
use image_dedup::EngineError;
use image::{ImageBuffer, Rgb};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn memory_config() -> EngineConfig {
    EngineConfig {
        backend: StoreBackend::Memory,
        num_workers: 2,
        ..Default::default()
    }
}

fn memory_engine(config: EngineConfig) -> Engine {
    Engine::with_store(config, FingerprintStore::Memory(MemoryStore::new()))
}

fn scan(engine: &Engine, dir: &Path) -> image_dedup::core::types::ScanReport {
    engine
        .scan_folder(
            &[dir.to_path_buf()],
            &CancellationToken::new(),
            &null_sender(),
        )
        .unwrap()
}

/// A photograph-like image: smooth radial gradient with an off-center
/// highlight so every hash kind has structure to latch onto
fn photo_like(width: u32, height: u32) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f64 / width as f64 - 0.35;
        let dy = y as f64 / height as f64 - 0.4;
        let d = (dx * dx + dy * dy).sqrt();
        let v = (235.0 - 190.0 * d).clamp(0.0, 255.0) as u8;
        Rgb([v, v.saturating_sub(10), v.saturating_sub(20)])
    })
}

fn write_textured_png(dir: &Path, name: &str, seed: u32) -> PathBuf {
    let path = dir.join(name);
    let img = ImageBuffer::from_fn(64, 64, |x, y| {
        let v = ((x * seed + y * (seed + 3)) % 256) as u8;
        Rgb([v, v, v])
    });
    img.save(&path).unwrap();
    path
}

// Scenario S1: byte-identical pair plus a one-byte-different third file
#[test]
fn exact_duplicates_are_found_and_disjoint() {
    let dir = TempDir::new().unwrap();
    let a = write_textured_png(dir.path(), "a.png", 5);
    let b = dir.path().join("b.png");
    std::fs::copy(&a, &b).unwrap();

    // c: same pixels, one extra trailing byte after IEND; decodes the
    // same but carries a different digest
    let mut bytes = std::fs::read(&a).unwrap();
    bytes.push(0x00);
    std::fs::write(dir.path().join("c.png"), bytes).unwrap();

    let engine = memory_engine(memory_config());
    scan(&engine, dir.path());

    let groups = engine.find_exact(&CancellationToken::new()).unwrap();
    assert_eq!(groups.len(), 1);

    let group = &groups[0];
    assert_eq!(group.confidence, 1.0);
    assert_eq!(group.duplicate_ids.len(), 1);
    assert!(!group.duplicate_ids.contains(&group.main_image_id));

    // c is in no group
    let members = group.member_ids();
    let all = engine.store().all().unwrap();
    let c_fp = all
        .iter()
        .find(|fp| fp.metadata.path.ends_with("c.png"))
        .unwrap();
    assert!(!members.contains(&c_fp.id));

    // Exact soundness: members share the digest
    let lookup: std::collections::HashMap<_, _> =
        all.iter().map(|fp| (fp.id.clone(), fp)).collect();
    let digest = &lookup[&members[0]].metadata.sha256;
    assert!(members.iter().all(|id| &lookup[id].metadata.sha256 == digest));
}

// Scenario S2: a photograph and its downsample are near duplicates
#[test]
fn rescaled_image_is_a_near_duplicate() {
    let dir = TempDir::new().unwrap();
    let large = photo_like(1024, 768);
    large.save(dir.path().join("large.png")).unwrap();

    let small = image::imageops::resize(
        &large,
        256,
        192,
        image::imageops::FilterType::Triangle,
    );
    small.save(dir.path().join("small.png")).unwrap();

    let engine = memory_engine(memory_config());
    scan(&engine, dir.path());

    let all = engine.store().all().unwrap();
    assert_eq!(all.len(), 2);
    let h1 = &all[0].perceptual_hashes;
    let h2 = &all[1].perceptual_hashes;

    assert!(
        hamming(h1.a_hash, h2.a_hash) <= 8,
        "a_hash distance {}",
        hamming(h1.a_hash, h2.a_hash)
    );
    assert!(
        hamming(h1.p_hash, h2.p_hash) <= 8,
        "p_hash distance {}",
        hamming(h1.p_hash, h2.p_hash)
    );

    let groups = engine
        .find_near(0.85, &CancellationToken::new())
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].member_ids().len(), 2);
    assert!(groups[0].confidence >= 0.85);
}

// Scenario S5: cancellation mid-scan leaves valid partial state
#[test]
fn cancelled_scan_keeps_valid_partial_state() {
    let dir = TempDir::new().unwrap();
    const TOTAL: usize = 300;
    for i in 0..TOTAL {
        write_textured_png(dir.path(), &format!("img_{i:04}.png"), 3 + (i as u32 % 40));
    }

    let config = EngineConfig {
        num_workers: 1,
        ..memory_config()
    };
    let engine = memory_engine(config);
    let cancel = CancellationToken::new();
    let (sender, receiver) = EventChannel::new();

    let result = std::thread::scope(|scope| {
        let engine = &engine;
        let cancel_for_scan = cancel.clone();
        let dir = dir.path().to_path_buf();
        let handle =
            scope.spawn(move || engine.scan_folder(&[dir], &cancel_for_scan, &sender));

        // Cancel once a few images have been fingerprinted
        for event in receiver.iter() {
            if let Event::Process(ProcessEvent::Progress(p)) = event {
                if p.completed >= 3 {
                    cancel.cancel();
                    break;
                }
            }
        }
        // Drain remaining events so the scan never blocks
        for _ in receiver.iter() {}

        handle.join().unwrap()
    });

    assert!(matches!(result, Err(EngineError::Cancelled)));

    let partial = engine.store().all().unwrap();
    assert!(!partial.is_empty(), "some records must be durable");
    assert!(partial.len() < TOTAL, "cancellation must stop the scan early");

    // Every durable record round-trips and deletes completely
    for fp in &partial {
        assert_eq!(engine.store().get(&fp.id).unwrap(), *fp);
    }
    let victim = partial[0].clone();
    engine.store().delete(&victim.id).unwrap();
    assert!(engine
        .store()
        .find_by_sha256(&victim.metadata.sha256)
        .unwrap()
        .iter()
        .all(|fp| fp.id != victim.id));
}

// Scenario S6: only a_hash enabled
#[test]
fn zero_hashes_are_excluded_from_similarity_and_lookup() {
    let dir = TempDir::new().unwrap();
    write_textured_png(dir.path(), "one.png", 5);
    write_textured_png(dir.path(), "two.png", 5);

    let config = EngineConfig {
        hashes: HashConfig {
            compute_a_hash: true,
            compute_p_hash: false,
            compute_d_hash: false,
            compute_w_hash: false,
        },
        ..memory_config()
    };
    let engine = memory_engine(config);
    scan(&engine, dir.path());

    let all = engine.store().all().unwrap();
    assert_eq!(all.len(), 2);
    for fp in &all {
        assert_ne!(fp.perceptual_hashes.a_hash, 0);
        assert_eq!(fp.perceptual_hashes.p_hash, 0);
        assert_eq!(fp.perceptual_hashes.d_hash, 0);
        assert_eq!(fp.perceptual_hashes.w_hash, 0);
    }

    // Similarity uses a_hash only; identical pixels give 1.0
    let comparator = Comparator::new();
    assert_eq!(comparator.similarity(&all[0], &all[1]), 1.0);

    // No p_hash, no p-index entry
    let by_p = engine
        .store()
        .find_similar(all[0].perceptual_hashes.a_hash, 64, HashKind::Perception)
        .unwrap();
    assert!(by_p.is_empty());
}

// The persistent backends run the same pipeline as the memory store
#[test]
fn sqlite_backend_scans_and_persists() {
    let photos = TempDir::new().unwrap();
    let index_dir = TempDir::new().unwrap();
    write_textured_png(photos.path(), "a.png", 7);

    let config = EngineConfig {
        backend: StoreBackend::Relational,
        index_path: index_dir.path().join("index.db"),
        num_workers: 2,
        ..Default::default()
    };

    {
        let engine = Engine::new(config.clone()).unwrap();
        let report = scan(&engine, photos.path());
        assert_eq!(report.processed_images, 1);
        engine.close().unwrap();
    }

    // Reopen and read back
    let engine = Engine::new(config).unwrap();
    assert_eq!(engine.store().all().unwrap().len(), 1);
    assert_eq!(engine.stats().unwrap().total_images, 1);
    engine.close().unwrap();
}

#[test]
fn bucket_backend_scans_and_persists() {
    let photos = TempDir::new().unwrap();
    let index_dir = TempDir::new().unwrap();
    write_textured_png(photos.path(), "a.png", 7);

    let config = EngineConfig {
        backend: StoreBackend::Bucket,
        index_path: index_dir.path().join("index.sled"),
        num_workers: 2,
        ..Default::default()
    };

    {
        let engine = Engine::new(config.clone()).unwrap();
        assert_eq!(scan(&engine, photos.path()).processed_images, 1);
        engine.close().unwrap();
    }

    let engine = Engine::new(config).unwrap();
    assert_eq!(engine.store().all().unwrap().len(), 1);
    engine.close().unwrap();
}

// Re-ingesting the same path replaces rather than duplicates
#[test]
fn rescan_replaces_fingerprints_for_unchanged_paths() {
    let dir = TempDir::new().unwrap();
    write_textured_png(dir.path(), "a.png", 5);

    let engine = memory_engine(memory_config());
    scan(&engine, dir.path());
    let first = engine.store().all().unwrap();
    assert_eq!(first.len(), 1);

    scan(&engine, dir.path());
    let second = engine.store().all().unwrap();
    assert_eq!(second.len(), 1, "same path must map to one fingerprint");
}

// Groups returned by one query never share members
#[test]
fn near_groups_are_pairwise_disjoint() {
    let dir = TempDir::new().unwrap();
    // Two identical pairs and one loner
    let a = write_textured_png(dir.path(), "a1.png", 5);
    std::fs::copy(&a, dir.path().join("a2.png")).unwrap();
    let b = dir.path().join("b1.png");
    photo_like(64, 64).save(&b).unwrap();
    std::fs::copy(&b, dir.path().join("b2.png")).unwrap();
    let loner: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(64, 64, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    });
    loner.save(dir.path().join("loner.png")).unwrap();

    let engine = memory_engine(memory_config());
    scan(&engine, dir.path());

    let groups = engine.find_near(0.99, &CancellationToken::new()).unwrap();
    assert!(groups.len() >= 2);

    let mut seen = std::collections::HashSet::new();
    for group in &groups {
        for id in group.member_ids() {
            assert!(seen.insert(id), "image in two groups");
        }
    }
}
