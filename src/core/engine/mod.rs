//! # Engine
//!
//! The central coordinator: owns the fingerprint index, the quality
//! analyzer, the similarity comparator and the scanner, and exposes the
//! public operations - scan, duplicate queries, quality rating, cleaning
//! and stats.
//!
//! ## Scan scheduling
//! A scan is one producer thread (the directory walker) feeding a
//! bounded queue of depth 2*W, with W consumer threads that decode,
//! digest, hash, analyze and write each image through the index. The
//! index `save` is the linearization point for a file's ingestion. A
//! byte budget blocks the producer while too many file bytes are in
//! flight. Cancellation is cooperative: workers finish their current
//! item and exit, leaving durable partial state behind.

mod cancel;
mod cleaner;

pub use cancel::{CancellationToken, MemoryBudget};

use crate::core::config::EngineConfig;
use crate::core::hasher::{self, HashKind};
use crate::core::index::{FingerprintStore, IndexStats};
use crate::core::metadata;
use crate::core::preprocess::DecodedImage;
use crate::core::quality::{QualityAnalyzer, QualityWeights};
use crate::core::scanner::{FileCandidate, ScanConfig, Walker};
use crate::core::similarity::{
    cluster_by_content, find_exact_groups, find_near_groups, Comparator,
};
use crate::core::types::{
    CleanOptions, CleanReport, Cluster, DuplicateGroup, Fingerprint, ImageId, ImageMetadata,
    ImageQuality, PerceptualHashes, ScanReport, SelectionPolicy,
};
use crate::error::{DecodeError, EngineError, IndexError, Result};
use crate::events::{
    EngineEvent, Event, EventSender, ProcessEvent, ProcessProgress, ScanEvent,
};
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// The image deduplication engine
pub struct Engine {
    config: EngineConfig,
    store: FingerprintStore,
    analyzer: QualityAnalyzer,
    comparator: Comparator,
    walker: Walker,
}

impl Engine {
    /// Create an engine, opening the configured index backend
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = FingerprintStore::open(&config)?;
        Ok(Self::with_store(config, store))
    }

    /// Create an engine over an already-open store (used by tests to
    /// inject the memory backend)
    pub fn with_store(config: EngineConfig, store: FingerprintStore) -> Self {
        let scan_config = ScanConfig {
            max_file_size: config.max_file_size,
            ..Default::default()
        };
        Self {
            walker: Walker::new(scan_config),
            analyzer: QualityAnalyzer::default(),
            comparator: Comparator::new(),
            store,
            config,
        }
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Override composite quality weights (renormalized to sum to 1)
    pub fn set_quality_weights(&mut self, weights: QualityWeights) {
        self.analyzer.set_weights(weights);
    }

    pub fn set_comparator(&mut self, comparator: Comparator) {
        self.comparator = comparator;
    }

    /// Recursively scan folders, fingerprinting every supported image
    /// and writing through the index. Per-image failures are counted as
    /// skipped; only structural storage failure aborts the scan.
    pub fn scan_folder(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Result<ScanReport> {
        let scan_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();
        let workers = self.config.workers();

        tracing::info!(scan_id, ?roots, workers, "starting scan");
        events.send(Event::Engine(EngineEvent::ScanStarted {
            scan_id: scan_id.clone(),
        }));
        events.send(Event::Scan(ScanEvent::Started {
            roots: roots.to_vec(),
        }));

        let total_files = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);
        let fatal: Mutex<Option<IndexError>> = Mutex::new(None);
        let budget = MemoryBudget::new(self.config.memory_budget);

        let (tx, rx) = crossbeam_channel::bounded::<FileCandidate>(2 * workers);

        std::thread::scope(|scope| {
            let budget = &budget;
            let total_files = &total_files;
            let processed = &processed;
            let skipped = &skipped;
            let fatal = &fatal;

            // Producer: walk the roots and feed the bounded queue
            scope.spawn(move || {
                let mut walk_errors = Vec::new();
                self.walker.walk(
                    roots,
                    |candidate| {
                        if cancel.is_cancelled() {
                            return ControlFlow::Break(());
                        }
                        budget.acquire(candidate.size);
                        total_files.fetch_add(1, Ordering::SeqCst);
                        events.send(Event::Scan(ScanEvent::FileFound {
                            path: candidate.path.clone(),
                        }));
                        if tx.send(candidate).is_err() {
                            return ControlFlow::Break(());
                        }
                        ControlFlow::Continue(())
                    },
                    &mut walk_errors,
                );
                drop(tx);

                for error in walk_errors {
                    tracing::warn!(error = %error, "scan error");
                    if let Some(path) = file_error_path(&error) {
                        // Unreadable or oversized files count as skipped
                        total_files.fetch_add(1, Ordering::SeqCst);
                        skipped.fetch_add(1, Ordering::SeqCst);
                        events.send(Event::Scan(ScanEvent::Error {
                            path,
                            message: error.to_string(),
                        }));
                    }
                }
            });

            // Consumers: fingerprint and persist
            for _ in 0..workers {
                let rx = rx.clone();
                scope.spawn(move || {
                    while let Ok(candidate) = rx.recv() {
                        let size = candidate.size;
                        self.consume(candidate, processed, skipped, total_files, fatal, events);
                        budget.release(size);

                        if cancel.is_cancelled() || fatal.lock().is_ok_and(|g| g.is_some()) {
                            break;
                        }
                    }
                    // Drain without processing so the producer never
                    // blocks on a full queue after cancellation
                    while let Ok(candidate) = rx.recv() {
                        budget.release(candidate.size);
                    }
                });
            }
        });

        if let Ok(mut guard) = fatal.lock() {
            if let Some(error) = guard.take() {
                return Err(EngineError::Index(error));
            }
        }

        let total = total_files.load(Ordering::SeqCst);
        let done = processed.load(Ordering::SeqCst);
        let skip = skipped.load(Ordering::SeqCst);

        if cancel.is_cancelled() {
            tracing::info!(scan_id, processed = done, "scan cancelled");
            events.send(Event::Engine(EngineEvent::ScanCancelled { scan_id }));
            return Err(EngineError::Cancelled);
        }

        events.send(Event::Process(ProcessEvent::Completed {
            processed: done,
            skipped: skip,
        }));
        events.send(Event::Scan(ScanEvent::Completed { total_files: total }));

        let completed_at = Utc::now();
        let duration = clock.elapsed();
        tracing::info!(
            scan_id,
            total,
            processed = done,
            skipped = skip,
            duration_ms = duration.as_millis() as u64,
            "scan completed"
        );
        events.send(Event::Engine(EngineEvent::ScanCompleted {
            scan_id: scan_id.clone(),
            duration_ms: duration.as_millis() as u64,
        }));

        Ok(ScanReport {
            scan_id,
            total_files: total,
            processed_images: done,
            skipped_files: skip,
            exact_duplicate_count: 0,
            near_duplicate_count: 0,
            groups: Vec::new(),
            clusters: Vec::new(),
            scan_duration: duration,
            started_at,
            completed_at,
        })
    }

    fn consume(
        &self,
        candidate: FileCandidate,
        processed: &AtomicUsize,
        skipped: &AtomicUsize,
        total_files: &AtomicUsize,
        fatal: &Mutex<Option<IndexError>>,
        events: &EventSender,
    ) {
        let path = candidate.path.clone();
        match self.process_file(&candidate) {
            Ok(fingerprint) => match self.store.save(&fingerprint) {
                Ok(()) => {
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    events.send(Event::Process(ProcessEvent::Progress(ProcessProgress {
                        completed: done,
                        total: total_files.load(Ordering::SeqCst),
                        current_path: path,
                    })));
                }
                Err(error @ (IndexError::Corrupt(_) | IndexError::StorageClosed)) => {
                    // Unrecoverable store: abort the whole scan
                    tracing::error!(error = %error, "structural storage failure");
                    if let Ok(mut guard) = fatal.lock() {
                        guard.get_or_insert(error);
                    }
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), error = %error, "index write failed");
                    skipped.fetch_add(1, Ordering::SeqCst);
                    events.send(Event::Process(ProcessEvent::Skipped {
                        path,
                        message: error.to_string(),
                    }));
                }
            },
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "image skipped");
                skipped.fetch_add(1, Ordering::SeqCst);
                events.send(Event::Process(ProcessEvent::Skipped {
                    path,
                    message: error.to_string(),
                }));
            }
        }
    }

    /// Fingerprint a single candidate file
    fn process_file(&self, candidate: &FileCandidate) -> Result<Fingerprint> {
        let path = &candidate.path;
        let created_at = Utc::now();

        let sha256 = hasher::sha256_file(path).map_err(|e| {
            EngineError::Decode(DecodeError::Io {
                path: path.clone(),
                source: e,
            })
        })?;

        let decoded = DecodedImage::open(path)?;

        let metadata = ImageMetadata {
            path: path.clone(),
            size_bytes: candidate.size,
            format: decoded.format().to_string(),
            width: decoded.width(),
            height: decoded.height(),
            modified_at: DateTime::<Utc>::from(candidate.modified),
            sha256,
            exif: self
                .config
                .extract_exif
                .then(|| metadata::extract(path))
                .flatten(),
        };

        let perceptual_hashes = self.compute_hashes(&decoded, path);
        let quality = self.analyzer.analyze(&decoded);

        Ok(Fingerprint {
            id: ImageId::derive(path, created_at),
            metadata,
            perceptual_hashes,
            quality,
            created_at,
            color_histogram: None,
            feature_vector: None,
        })
    }

    /// Compute the configured subset of perceptual hashes. A kernel that
    /// rejects the image (too small for the DCT) leaves its hash at zero.
    fn compute_hashes(&self, decoded: &DecodedImage, path: &Path) -> PerceptualHashes {
        let mut hashes = PerceptualHashes::default();
        let toggles = [
            (HashKind::Average, self.config.hashes.compute_a_hash),
            (HashKind::Perception, self.config.hashes.compute_p_hash),
            (HashKind::Difference, self.config.hashes.compute_d_hash),
            (HashKind::Wavelet, self.config.hashes.compute_w_hash),
        ];

        for (kind, enabled) in toggles {
            if !enabled {
                continue;
            }
            match hasher::compute(kind, decoded, path) {
                Ok(value) => match kind {
                    HashKind::Average => hashes.a_hash = value,
                    HashKind::Perception => hashes.p_hash = value,
                    HashKind::Difference => hashes.d_hash = value,
                    HashKind::Wavelet => hashes.w_hash = value,
                },
                Err(error) => {
                    tracing::warn!(path = %path.display(), %kind, error = %error, "hash skipped");
                }
            }
        }
        hashes
    }

    /// Groups of byte-identical images
    pub fn find_exact(&self, cancel: &CancellationToken) -> Result<Vec<DuplicateGroup>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let fingerprints = self.store.all()?;
        tracing::info!(count = fingerprints.len(), "searching exact duplicates");
        let groups = find_exact_groups(&fingerprints, SelectionPolicy::HighestQuality);
        tracing::info!(groups = groups.len(), "exact duplicate search complete");
        Ok(groups)
    }

    /// Groups of visually near-identical images at `threshold`
    pub fn find_near(
        &self,
        threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<Vec<DuplicateGroup>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let fingerprints = self.store.all()?;
        tracing::info!(
            count = fingerprints.len(),
            threshold,
            "searching near duplicates"
        );
        let groups = find_near_groups(
            &fingerprints,
            threshold,
            &self.comparator,
            SelectionPolicy::HighestQuality,
        )?;
        tracing::info!(groups = groups.len(), "near duplicate search complete");
        Ok(groups)
    }

    /// Analyze one image file without touching the index
    pub fn rate_quality(&self, path: &Path) -> Result<ImageQuality> {
        let decoded = DecodedImage::open(path)?;
        Ok(self.analyzer.analyze(&decoded))
    }

    pub fn analyzer(&self) -> &QualityAnalyzer {
        &self.analyzer
    }

    /// Partition the indexed collection into similarity clusters
    pub fn cluster(&self, threshold: f64) -> Result<Vec<Cluster>> {
        let fingerprints = self.store.all()?;
        Ok(cluster_by_content(&fingerprints, threshold, &self.comparator)?)
    }

    /// Move (or plan moving) duplicates aside, keeping the best of each
    /// group per the selection policy
    pub fn clean_duplicates(
        &self,
        options: &CleanOptions,
        cancel: &CancellationToken,
    ) -> Result<CleanReport> {
        cleaner::clean(self, options, cancel)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.store.stats()?)
    }

    /// Flush and close the index
    pub fn close(&self) -> Result<()> {
        tracing::info!("closing engine");
        Ok(self.store.close()?)
    }
}

/// Path of a per-file (not per-directory) scan error
fn file_error_path(error: &crate::error::ScanError) -> Option<PathBuf> {
    use crate::error::ScanError;
    match error {
        ScanError::FileTooLarge { path, .. } | ScanError::Read { path, .. } => Some(path.clone()),
        ScanError::DirectoryNotFound { .. } | ScanError::PermissionDenied { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StoreBackend;
    use crate::core::index::MemoryStore;
    use crate::events::null_sender;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn memory_engine() -> Engine {
        let config = EngineConfig {
            backend: StoreBackend::Memory,
            num_workers: 2,
            ..Default::default()
        };
        Engine::with_store(config, FingerprintStore::Memory(MemoryStore::new()))
    }

    fn write_png(dir: &Path, name: &str, seed: u32) -> PathBuf {
        let path = dir.join(name);
        let img = ImageBuffer::from_fn(32, 32, |x, y| {
            let v = ((x * seed + y * 7) % 256) as u8;
            Rgb([v, v, v])
        });
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn scan_ingests_every_supported_file() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "a.png", 3);
        write_png(dir.path(), "b.png", 5);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let engine = memory_engine();
        let report = engine
            .scan_folder(
                &[dir.path().to_path_buf()],
                &CancellationToken::new(),
                &null_sender(),
            )
            .unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.processed_images, 2);
        assert_eq!(report.skipped_files, 0);
        assert_eq!(engine.store().all().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_image_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "good.png", 3);
        std::fs::write(dir.path().join("broken.png"), b"definitely not a png").unwrap();

        let engine = memory_engine();
        let report = engine
            .scan_folder(
                &[dir.path().to_path_buf()],
                &CancellationToken::new(),
                &null_sender(),
            )
            .unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.processed_images, 1);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(
            report.processed_images + report.skipped_files,
            report.total_files
        );
    }

    #[test]
    fn pre_cancelled_scan_returns_cancelled() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "a.png", 3);

        let engine = memory_engine();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine.scan_folder(
            &[dir.path().to_path_buf()],
            &cancel,
            &null_sender(),
        );
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn fingerprints_carry_metadata_and_hashes() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "photo.png", 11);

        let engine = memory_engine();
        engine
            .scan_folder(
                &[dir.path().to_path_buf()],
                &CancellationToken::new(),
                &null_sender(),
            )
            .unwrap();

        let all = engine.store().all().unwrap();
        let fp = &all[0];
        assert_eq!(fp.metadata.format, "png");
        assert_eq!(fp.metadata.width, 32);
        assert_eq!(fp.metadata.sha256.len(), 64);
        // a/p/d enabled by default; w disabled
        assert_ne!(fp.perceptual_hashes.d_hash, 0);
        assert_eq!(fp.perceptual_hashes.w_hash, 0);
        assert!(fp.quality.final_score > 0.0);
    }

    #[test]
    fn rate_quality_reads_without_indexing() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "q.png", 9);

        let engine = memory_engine();
        let quality = engine.rate_quality(&path).unwrap();
        assert!((0.0..=100.0).contains(&quality.final_score));
        assert!(engine.store().all().unwrap().is_empty());
    }

    #[test]
    fn rate_quality_on_missing_file_errors() {
        let engine = memory_engine();
        let result = engine.rate_quality(Path::new("/missing.png"));
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }

    #[test]
    fn find_near_rejects_bad_threshold() {
        let engine = memory_engine();
        let result = engine.find_near(2.0, &CancellationToken::new());
        assert!(matches!(
            result,
            Err(EngineError::Compare(
                crate::error::CompareError::InvalidThreshold { .. }
            ))
        ));
    }

    #[test]
    fn stats_reflect_scanned_images() {
        let dir = TempDir::new().unwrap();
        write_png(dir.path(), "a.png", 3);

        let engine = memory_engine();
        engine
            .scan_folder(
                &[dir.path().to_path_buf()],
                &CancellationToken::new(),
                &null_sender(),
            )
            .unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.total_images, 1);
        assert!(stats.total_size_bytes > 0);
    }
}
