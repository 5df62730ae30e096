//! CLI output formatting.
//!
//! Output is **stencil-centric**: each entry leads with its position and
//! display name, with ids, paths and parameters as indented context lines.
//!
//! # Output Format
//!
//! ## List / search
//!
//! ```text
//! 001 * Rose Outline (10.0 x 15.0 cm, A4)
//!     Id: 3f0c...
//!     Note: left forearm
//! 002 Koi (8.0 x 4.0 cm, A5)
//!     Id: 91aa...
//! ```
//!
//! ## Show
//!
//! ```text
//! Rose Outline
//!     Id: 3f0c...
//!     Size: 10.0 x 15.0 cm on A4
//!     Transform: rotate 90, mirror H, contrast 75
//!     Created: 2024-05-01 12:00 UTC
//!     ...
//! ```
//!
//! ## Stats
//!
//! ```text
//! 2 stencils (1 favorite, 1 exported)
//!     original: 1.2 MB
//!     processed: 640.0 KB
//!     thumbnail: 18.3 KB
//!     export: 0 B
//!     total: 1.8 MB
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::catalog::{CatalogStats, ReconcileReport};
use crate::types::StencilRecord;
use chrono::{DateTime, Utc};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn format_size(record: &StencilRecord) -> String {
    format!("{:.1} x {:.1} cm", record.width_cm, record.height_cm)
}

/// Human-readable byte count, 1024-based.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Transform settings that differ from identity. Contrast always shows.
fn format_transform(record: &StencilRecord) -> String {
    let mut parts = Vec::new();
    if record.rotation_degrees.degrees() != 0 {
        parts.push(format!("rotate {}", record.rotation_degrees.degrees()));
    }
    if record.is_mirrored_h {
        parts.push("mirror H".to_string());
    }
    if record.is_mirrored_v {
        parts.push("mirror V".to_string());
    }
    if !record.brightness_level.is_neutral() {
        parts.push(format!("brightness {:+}", record.brightness_level.value()));
    }
    parts.push(format!("contrast {}", record.contrast_level.value()));
    parts.join(", ")
}

// ============================================================================
// Views
// ============================================================================

/// One header line per stencil plus id and note context lines.
/// Favorites are marked with `*`.
pub fn format_stencil_list(records: &[StencilRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No stencils".to_string()];
    }
    let mut lines = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let star = if record.is_favorite { "* " } else { "" };
        lines.push(format!(
            "{} {star}{} ({}, {})",
            format_index(i + 1),
            record.name,
            format_size(record),
            record.paper_size
        ));
        lines.push(format!("{}Id: {}", indent(1), record.id));
        if let Some(note) = &record.client_note {
            lines.push(format!("{}Note: {note}", indent(1)));
        }
    }
    lines
}

pub fn print_stencil_list(records: &[StencilRecord]) {
    for line in format_stencil_list(records) {
        println!("{line}");
    }
}

/// Every field of one stencil.
pub fn format_stencil_detail(record: &StencilRecord) -> Vec<String> {
    let i = indent(1);
    let mut lines = vec![
        record.name.clone(),
        format!("{i}Id: {}", record.id),
        format!("{i}Size: {} on {}", format_size(record), record.paper_size),
        format!("{i}Transform: {}", format_transform(record)),
        format!("{i}Created: {}", format_time(record.created_at)),
        format!("{i}Modified: {}", format_time(record.last_modified_at)),
        format!(
            "{i}Exported: {}",
            record
                .last_exported_at
                .map(format_time)
                .unwrap_or_else(|| "never".to_string())
        ),
        format!("{i}Favorite: {}", if record.is_favorite { "yes" } else { "no" }),
    ];
    if let Some(note) = &record.client_note {
        lines.push(format!("{i}Note: {note}"));
    }
    lines.push(format!("{i}Original: {}", record.original_image_path));
    lines.push(format!("{i}Processed: {}", record.processed_image_path));
    if let Some(thumb) = &record.thumbnail_path {
        lines.push(format!("{i}Thumbnail: {thumb}"));
    }
    if !record.fits_paper() {
        lines.push(format!("{i}Warning: larger than {} paper", record.paper_size));
    }
    lines
}

pub fn print_stencil_detail(record: &StencilRecord) {
    for line in format_stencil_detail(record) {
        println!("{line}");
    }
}

/// Summary line followed by per-category storage use.
pub fn format_stats(stats: &CatalogStats) -> Vec<String> {
    let mut lines = vec![stats.to_string()];
    for (category, bytes) in &stats.bytes {
        lines.push(format!("{}{category}: {}", indent(1), format_bytes(*bytes)));
    }
    lines.push(format!(
        "{}total: {}",
        indent(1),
        format_bytes(stats.total_bytes())
    ));
    lines
}

pub fn print_stats(stats: &CatalogStats) {
    for line in format_stats(stats) {
        println!("{line}");
    }
}

pub fn format_reconcile_report(report: &ReconcileReport) -> Vec<String> {
    if report.is_clean() {
        return vec!["Catalog is consistent".to_string()];
    }
    let mut lines = Vec::new();
    if !report.removed_orphans.is_empty() {
        lines.push(format!(
            "Removed {} orphaned asset(s)",
            report.removed_orphans.len()
        ));
        for path in &report.removed_orphans {
            lines.push(format!("{}{path}", indent(1)));
        }
    }
    if !report.missing_assets.is_empty() {
        lines.push(format!("Missing {} asset(s)", report.missing_assets.len()));
        for missing in &report.missing_assets {
            lines.push(format!("{}{}: {}", indent(1), missing.id, missing.path));
        }
    }
    lines
}

pub fn print_reconcile_report(report: &ReconcileReport) {
    for line in format_reconcile_report(report) {
        println!("{line}");
    }
}
