//! # Report Rendering
//!
//! Serializes a `ScanReport` for consumption outside the engine: JSON
//! for tooling, plain text for terminals, and a small self-contained
//! HTML page.

use crate::core::types::{format_bytes, ScanReport};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Output formats for `export`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Json,
    Text,
    Html,
}

/// Render a report in the requested format
pub fn render(report: &ScanReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => render_json(report),
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Html => Ok(render_html(report)),
    }
}

/// Render and write to a file
pub fn export(report: &ScanReport, format: ReportFormat, path: &Path) -> Result<()> {
    let rendered = render(report, format)?;
    std::fs::write(path, rendered)
        .map_err(|e| EngineError::Config(format!("cannot write report {}: {e}", path.display())))
}

pub fn render_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| EngineError::Config(format!("report serialization failed: {e}")))
}

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scan {}", report.scan_id);
    let _ = writeln!(out, "  started:    {}", report.started_at.to_rfc3339());
    let _ = writeln!(out, "  completed:  {}", report.completed_at.to_rfc3339());
    let _ = writeln!(out, "  duration:   {:.1}s", report.scan_duration.as_secs_f64());
    let _ = writeln!(out, "  files:      {} total", report.total_files);
    let _ = writeln!(out, "  processed:  {}", report.processed_images);
    let _ = writeln!(out, "  skipped:    {}", report.skipped_files);
    let _ = writeln!(
        out,
        "  duplicates: {} exact, {} near",
        report.exact_duplicate_count, report.near_duplicate_count
    );

    for group in &report.groups {
        let _ = writeln!(
            out,
            "  group {} [{}] main={} duplicates={} confidence={:.2}",
            group.group_id,
            group.reason,
            group.main_image_id,
            group.duplicate_ids.len(),
            group.confidence
        );
    }

    for cluster in &report.clusters {
        let _ = writeln!(
            out,
            "  cluster {} images={}",
            cluster.cluster_id,
            cluster.images.len()
        );
    }
    out
}

pub fn render_html(report: &ScanReport) -> String {
    let mut rows = String::new();
    for group in &report.groups {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td></tr>",
            escape(&group.group_id),
            group.reason,
            escape(group.main_image_id.as_str()),
            group.duplicate_ids.len(),
            group.confidence
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Scan report {scan_id}</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 4px 10px; }}
</style>
</head>
<body>
<h1>Scan report {scan_id}</h1>
<p>{total} files, {processed} processed, {skipped} skipped,
{exact} exact and {near} near duplicate groups in {duration:.1}s.</p>
<table>
<tr><th>Group</th><th>Reason</th><th>Main image</th><th>Duplicates</th><th>Confidence</th></tr>
{rows}
</table>
</body>
</html>
"#,
        scan_id = escape(&report.scan_id),
        total = report.total_files,
        processed = report.processed_images,
        skipped = report.skipped_files,
        exact = report.exact_duplicate_count,
        near = report.near_duplicate_count,
        duration = report.scan_duration.as_secs_f64(),
        rows = rows,
    )
}

/// Short human summary used by the CLI
pub fn summary_line(report: &ScanReport, reclaimable_bytes: u64) -> String {
    format!(
        "{} files, {} duplicates groups, {} reclaimable",
        report.total_files,
        report.groups.len(),
        format_bytes(reclaimable_bytes)
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
