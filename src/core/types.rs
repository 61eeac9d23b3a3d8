//! Core data model: fingerprints, metadata, quality, duplicate groups.
//!
//! All persisted records serialize with serde. Timestamps are RFC-3339
//! UTC, perceptual hashes are 16-char lowercase hex, sha256 is 64-char
//! lowercase hex. Readers ignore unknown fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Supported image file extensions (lowercase, with the leading dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".webp", ".tiff", ".tif", ".bmp", ".gif",
];

/// Default maximum size of a file eligible for scanning (500 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Default similarity threshold for near-duplicate detection
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default number of scan workers
pub const DEFAULT_NUM_WORKERS: usize = 4;

/// Default in-flight memory budget for a scan (1 GiB)
pub const DEFAULT_MEMORY_BUDGET: u64 = 1024 * 1024 * 1024;

/// Opaque, stable identifier for an indexed image.
///
/// Content-derived: a prefix plus the low-order half of the SHA-256 of
/// `path || ingest_timestamp`. Within one index the relation between an
/// id and a file path is 1:1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl ImageId {
    /// Derive a fresh id for a path at its ingestion time
    pub fn derive(path: &Path, ingested_at: DateTime<Utc>) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(ingested_at.to_rfc3339().as_bytes());
        let digest = hasher.finalize();
        // Low-order half of the 32-byte digest
        let hex: String = digest[16..].iter().map(|b| format!("{:02x}", b)).collect();
        ImageId(format!("img_{}", hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// EXIF metadata extracted from an image file.
///
/// Orientation is observed but never applied to pixel data, so rotated
/// copies of an image fingerprint differently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<f64>,
    #[serde(default)]
    pub has_gps: bool,
}

/// File-level metadata for an indexed image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub modified_at: DateTime<Utc>,
    /// 64-char lowercase hex SHA-256 of the entire file content
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifInfo>,
}

/// The four 64-bit perceptual hashes.
///
/// Zero means "not computed"; zero values are excluded from similarity
/// comparisons and get no secondary-index entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHashes {
    #[serde(with = "hash_hex")]
    pub a_hash: u64,
    #[serde(with = "hash_hex")]
    pub p_hash: u64,
    #[serde(with = "hash_hex")]
    pub d_hash: u64,
    #[serde(with = "hash_hex")]
    pub w_hash: u64,
}

/// Serialize 64-bit hashes as 16-char lowercase hex strings
mod hash_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:016x}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}

impl PerceptualHashes {
    /// Hash value for a given kind, `None` when not computed
    pub fn get(&self, kind: crate::core::hasher::HashKind) -> Option<u64> {
        use crate::core::hasher::HashKind;
        let value = match kind {
            HashKind::Average => self.a_hash,
            HashKind::Perception => self.p_hash,
            HashKind::Difference => self.d_hash,
            HashKind::Wavelet => self.w_hash,
        };
        (value != 0).then_some(value)
    }

    /// True when no hash was computed at all
    pub fn is_empty(&self) -> bool {
        self.a_hash == 0 && self.p_hash == 0 && self.d_hash == 0 && self.w_hash == 0
    }
}

/// Quality analysis results.
///
/// Polarity: sharpness and contrast are better high; noise, compression
/// and color_cast are better low; exposure is ideal at 0.5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageQuality {
    pub sharpness: f64,
    pub noise: f64,
    pub exposure: f64,
    pub contrast: f64,
    pub compression: f64,
    pub color_cast: f64,
    /// Composite score on a 0-100 scale
    pub final_score: f64,
}

/// Quality tiers used by reporting and the `quality` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Average,
    Poor,
    VeryPoor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => QualityLevel::Excellent,
            s if s >= 70.0 => QualityLevel::Good,
            s if s >= 50.0 => QualityLevel::Average,
            s if s >= 30.0 => QualityLevel::Poor,
            _ => QualityLevel::VeryPoor,
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Average => "average",
            QualityLevel::Poor => "poor",
            QualityLevel::VeryPoor => "very_poor",
        };
        f.write_str(name)
    }
}

/// A complete digital fingerprint of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: ImageId,
    pub metadata: ImageMetadata,
    pub perceptual_hashes: PerceptualHashes,
    pub quality: ImageQuality,
    pub created_at: DateTime<Utc>,
    /// Reserved extension point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_histogram: Option<Vec<f64>>,
    /// Reserved extension point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_vector: Option<Vec<f32>>,
}

/// Why a duplicate group was formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Identical content digests
    Exact,
    /// Weighted perceptual similarity above the threshold
    Near,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::Exact => f.write_str("exact"),
            DuplicateReason::Near => f.write_str("near"),
        }
    }
}

/// A group of duplicate images. `main_image_id` is never listed in
/// `duplicate_ids`; groups returned by one query are pairwise disjoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_id: String,
    pub main_image_id: ImageId,
    pub duplicate_ids: Vec<ImageId>,
    pub reason: DuplicateReason,
    /// 1.0 for exact groups, mean pairwise similarity for near groups
    pub confidence: f64,
}

impl DuplicateGroup {
    /// All member ids including the main image
    pub fn member_ids(&self) -> Vec<ImageId> {
        let mut ids = Vec::with_capacity(self.duplicate_ids.len() + 1);
        ids.push(self.main_image_id.clone());
        ids.extend(self.duplicate_ids.iter().cloned());
        ids
    }
}

/// A cluster of visually similar images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub images: Vec<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Vec<f32>>,
}

/// Rule used to pick the "main" image of a duplicate group.
/// Ties are broken by lexicographic path order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    HighestQuality,
    HighestResolution,
    BestExposure,
    Oldest,
    Newest,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::HighestQuality
    }
}

/// Results of a scan operation.
///
/// `processed_images + skipped_files == total_files` even when errors
/// occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub total_files: usize,
    pub processed_images: usize,
    pub skipped_files: usize,
    pub exact_duplicate_count: usize,
    pub near_duplicate_count: usize,
    pub groups: Vec<DuplicateGroup>,
    pub clusters: Vec<Cluster>,
    pub scan_duration: std::time::Duration,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Options controlling duplicate cleaning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Plan only, never touch the filesystem
    pub dry_run: bool,
    pub selection_policy: SelectionPolicy,
    /// Duplicates scoring below this are left in place
    pub min_quality_score: f64,
    /// Threshold for the near-duplicate pass
    pub max_similarity_threshold: f64,
    pub move_duplicates: bool,
    pub output_dir: PathBuf,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            selection_policy: SelectionPolicy::HighestQuality,
            min_quality_score: 0.0,
            max_similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            move_duplicates: true,
            output_dir: PathBuf::from("duplicates"),
        }
    }
}

/// Results of a cleaning operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanReport {
    pub total_processed: usize,
    pub moved_files: usize,
    pub freed_space_bytes: u64,
    pub errors: Vec<String>,
}

/// Format a byte count for human consumption
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ["K", "M", "G", "T", "P"][exp])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::HashKind;

    #[test]
    fn image_id_is_stable_for_same_inputs() {
        let ts = Utc::now();
        let a = ImageId::derive(Path::new("/photos/a.jpg"), ts);
        let b = ImageId::derive(Path::new("/photos/a.jpg"), ts);
        assert_eq!(a, b);
    }

    #[test]
    fn image_id_has_prefix_and_hex_tail() {
        let id = ImageId::derive(Path::new("/photos/a.jpg"), Utc::now());
        assert!(id.as_str().starts_with("img_"));
        assert_eq!(id.as_str().len(), 4 + 32);
        assert!(id.as_str()[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn zero_hashes_are_not_reported() {
        let hashes = PerceptualHashes {
            a_hash: 0xDEAD,
            ..Default::default()
        };
        assert_eq!(hashes.get(HashKind::Average), Some(0xDEAD));
        assert_eq!(hashes.get(HashKind::Perception), None);
        assert!(!hashes.is_empty());
        assert!(PerceptualHashes::default().is_empty());
    }

    #[test]
    fn hashes_serialize_as_16_char_hex() {
        let hashes = PerceptualHashes {
            a_hash: 0xAB,
            ..Default::default()
        };
        let json = serde_json::to_string(&hashes).unwrap();
        assert!(json.contains("\"00000000000000ab\""));

        let back: PerceptualHashes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.a_hash, 0xAB);
    }

    #[test]
    fn fingerprint_reader_ignores_unknown_fields() {
        let json = serde_json::json!({
            "id": "img_00",
            "metadata": {
                "path": "/a.jpg",
                "size_bytes": 10,
                "format": "jpeg",
                "width": 4,
                "height": 4,
                "modified_at": "2024-01-01T00:00:00Z",
                "sha256": "ab".repeat(32),
                "some_future_field": true
            },
            "perceptual_hashes": {
                "a_hash": "0000000000000001",
                "p_hash": "0000000000000000",
                "d_hash": "0000000000000000",
                "w_hash": "0000000000000000"
            },
            "quality": { "sharpness": 0.0, "noise": 0.0, "exposure": 0.5,
                          "contrast": 0.0, "compression": 0.0, "color_cast": 0.0,
                          "final_score": 50.0 },
            "created_at": "2024-01-01T00:00:00Z",
            "extra": "ignored"
        });

        let fp: Fingerprint = serde_json::from_value(json).unwrap();
        assert_eq!(fp.perceptual_hashes.a_hash, 1);
        assert!(fp.color_histogram.is_none());
        assert!(fp.feature_vector.is_none());
    }

    #[test]
    fn quality_levels_follow_score_bands() {
        assert_eq!(QualityLevel::from_score(85.0), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(72.0), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(55.0), QualityLevel::Average);
        assert_eq!(QualityLevel::from_score(35.0), QualityLevel::Poor);
        assert_eq!(QualityLevel::from_score(10.0), QualityLevel::VeryPoor);
    }

    #[test]
    fn group_members_include_main() {
        let group = DuplicateGroup {
            group_id: "exact_0".to_string(),
            main_image_id: ImageId("img_a".to_string()),
            duplicate_ids: vec![ImageId("img_b".to_string())],
            reason: DuplicateReason::Exact,
            confidence: 1.0,
        };
        assert_eq!(group.member_ids().len(), 2);
    }

    #[test]
    fn format_bytes_picks_sensible_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
