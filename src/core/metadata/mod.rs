//! # EXIF Metadata
//!
//! Extracts camera, exposure and GPS information from image files.
//! Extraction is strictly best-effort: a file without EXIF (or with a
//! mangled block) simply yields `None`, never an error.
//!
//! Orientation is read and logged but deliberately not applied to pixel
//! data; rotated variants of an image are meant to fingerprint apart.

use crate::core::types::ExifInfo;
use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read EXIF metadata from a file, if any is present
pub fn extract(path: &Path) -> Option<ExifInfo> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(&file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    let mut info = ExifInfo::default();

    if let Some(field) = exif.get_field(Tag::Model, In::PRIMARY) {
        info.camera_model = Some(trimmed_display(field));
    }
    if let Some(field) = exif.get_field(Tag::LensModel, In::PRIMARY) {
        info.lens_model = Some(trimmed_display(field));
    }
    if let Some(field) = exif.get_field(Tag::PhotographicSensitivity, In::PRIMARY) {
        info.iso = field.value.get_uint(0);
    }
    if let Some(field) = exif.get_field(Tag::ExposureTime, In::PRIMARY) {
        info.exposure_time = Some(trimmed_display(field));
    }
    if let Some(field) = exif.get_field(Tag::FNumber, In::PRIMARY) {
        info.aperture = first_rational(&field.value);
    }
    if let Some(field) = exif.get_field(Tag::FocalLength, In::PRIMARY) {
        info.focal_length = first_rational(&field.value);
    }
    if let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) {
        info.taken_at = parse_exif_datetime(&trimmed_display(field));
    }

    if let Some(orientation) = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
    {
        // Observed only; fingerprints are orientation-sensitive on purpose
        tracing::debug!(path = %path.display(), orientation, "EXIF orientation present");
    }

    info.gps_lat = read_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S");
    info.gps_lon = read_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W");
    info.has_gps = info.gps_lat.is_some() && info.gps_lon.is_some();

    Some(info)
}

fn trimmed_display(field: &exif::Field) -> String {
    field
        .display_value()
        .to_string()
        .trim_matches('"')
        .trim()
        .to_string()
}

fn first_rational(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(v) => v.first().map(|r| r.to_f64()),
        _ => None,
    }
}

/// EXIF datetime format: "YYYY:MM:DD HH:MM:SS", assumed UTC
fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Degrees/minutes/seconds to signed decimal degrees
fn read_coordinate(
    exif: &exif::Exif,
    value_tag: Tag,
    ref_tag: Tag,
    negative_ref: &str,
) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 {
        return None;
    }

    let degrees = parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0;

    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .map(|f| f.display_value().to_string())
        .unwrap_or_default();

    if reference.contains(negative_ref) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}
