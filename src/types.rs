//! Shared types persisted by the metadata store and passed through the catalog.
//!
//! [`StencilRecord`] is serialized field-name keyed (camelCase) so the stored
//! JSON stays portable and readable. [`StencilPatch`] is the partial-update
//! shape: every field optional, applied only by
//! [`Catalog::update_stencil`](crate::catalog::Catalog::update_stencil).

use crate::imaging::{BrightnessLevel, ContrastLevel, Rotation, TransformParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Paper the stencil is printed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
    A5,
    A6,
    Letter,
}

impl PaperSize {
    pub const ALL: [PaperSize; 4] = [PaperSize::A4, PaperSize::A5, PaperSize::A6, PaperSize::Letter];

    /// Portrait `(width, height)` in centimeters.
    pub fn dimensions_cm(self) -> (f64, f64) {
        match self {
            PaperSize::A4 => (21.0, 29.7),
            PaperSize::A5 => (14.8, 21.0),
            PaperSize::A6 => (10.5, 14.8),
            PaperSize::Letter => (21.59, 27.94),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::A6 => "A6",
            PaperSize::Letter => "Letter",
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperSize::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown paper size '{s}' (expected A4, A5, A6 or Letter)"))
    }
}

/// Metadata for one stencil project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StencilRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    /// Untouched source bytes; the only input the pipeline ever sees.
    pub original_image_path: String,
    /// Overwritten in place on every reprocess.
    pub processed_image_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    pub width_cm: f64,
    /// Always derived from `width_cm` and the ratio captured at creation.
    pub height_cm: f64,
    #[serde(default)]
    pub is_mirrored_h: bool,
    #[serde(default)]
    pub is_mirrored_v: bool,
    #[serde(default)]
    pub rotation_degrees: Rotation,
    #[serde(default)]
    pub contrast_level: ContrastLevel,
    #[serde(default)]
    pub brightness_level: BrightnessLevel,
    #[serde(default)]
    pub paper_size: PaperSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exported_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_note: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl StencilRecord {
    /// Pipeline parameters for this record. Thermal mode is a print-time
    /// choice and never stored, so it starts off.
    pub fn transform_params(&self) -> TransformParams {
        TransformParams {
            rotation: self.rotation_degrees,
            mirror_h: self.is_mirrored_h,
            mirror_v: self.is_mirrored_v,
            brightness: self.brightness_level,
            contrast: self.contrast_level,
            thermal_mode: false,
        }
    }

    /// Case-insensitive substring match on name or client note.
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .client_note
                .as_deref()
                .is_some_and(|note| note.to_lowercase().contains(needle))
    }

    pub fn is_exported(&self) -> bool {
        self.last_exported_at.is_some()
    }

    /// Logical paths of every asset this record owns.
    pub fn asset_paths(&self) -> Vec<&str> {
        let mut paths = vec![
            self.original_image_path.as_str(),
            self.processed_image_path.as_str(),
        ];
        if let Some(thumb) = &self.thumbnail_path {
            paths.push(thumb);
        }
        paths
    }

    /// Whether the print fits on the selected paper in either orientation.
    pub fn fits_paper(&self) -> bool {
        let (short, long) = self.paper_size.dimensions_cm();
        let (w, h) = (self.width_cm, self.height_cm);
        (w <= short && h <= long) || (w <= long && h <= short)
    }
}

/// Partial update for a stencil. `None` leaves the stored value alone.
///
/// Rotation and tone levels arrive raw; the catalog validates rotation and
/// clamps the levels when merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StencilPatch {
    pub name: Option<String>,
    pub width_cm: Option<f64>,
    pub is_mirrored_h: Option<bool>,
    pub is_mirrored_v: Option<bool>,
    pub rotation_degrees: Option<u32>,
    pub contrast_level: Option<i32>,
    pub brightness_level: Option<i32>,
    pub paper_size: Option<PaperSize>,
    /// `Some(None)` clears the note.
    pub client_note: Option<Option<String>>,
    pub is_favorite: Option<bool>,
}

impl StencilPatch {
    /// Whether applying this patch requires re-running the pipeline.
    pub fn touches_pipeline(&self) -> bool {
        self.is_mirrored_h.is_some()
            || self.is_mirrored_v.is_some()
            || self.rotation_degrees.is_some()
            || self.contrast_level.is_some()
            || self.brightness_level.is_some()
    }
}
