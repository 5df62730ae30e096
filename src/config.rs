//! User settings.
//!
//! Handles loading, validating, and merging `settings.toml`. Stock defaults
//! are the base layer; the user file in the base directory overrides any
//! subset of keys.
//!
//! ## Settings File Location
//!
//! ```text
//! stencils/
//! ├── settings.toml     # Overrides stock defaults
//! ├── stencils.json
//! └── ...
//! ```
//!
//! ## Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [printer]
//! paper_size = "A4"         # A4, A5, A6 or Letter
//! default_width_cm = 10.0   # Print width when none is given
//! thermal_mode = false      # Binarize exports for direct-thermal printers
//!
//! [stencil]
//! default_contrast = 60     # 0-100, for new stencils
//! default_brightness = 0    # -50..50, for new stencils
//!
//! [thumbnails]
//! size = 200                # Square edge in pixels
//! quality = 85              # JPEG quality (1-100)
//!
//! [retention]
//! export_days = 7           # Exports older than this are pruned
//!
//! [processing]
//! max_processes = 4         # Max worker threads (omit for auto = CPU cores)
//!
//! [ui]
//! favorites_first = false   # Default ordering for `list`
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{BrightnessLevel, ContrastLevel, Quality, ThumbnailParams};
use crate::types::PaperSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name of the user settings inside the base directory.
pub const SETTINGS_FILENAME: &str = "settings.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Settings validation error: {0}")]
    Validation(String),
}

/// Application settings loaded from `settings.toml`.
///
/// All fields have defaults. User files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub printer: PrinterConfig,
    pub stencil: StencilDefaults,
    pub thumbnails: ThumbnailsConfig,
    pub retention: RetentionConfig,
    pub processing: ProcessingConfig,
    pub ui: UiConfig,
}

impl AppSettings {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let width = self.printer.default_width_cm;
        if !width.is_finite() || width <= 0.0 {
            return Err(ConfigError::Validation(
                "printer.default_width_cm must be a positive number".into(),
            ));
        }
        if !(ContrastLevel::MIN..=ContrastLevel::MAX).contains(&self.stencil.default_contrast) {
            return Err(ConfigError::Validation(
                "stencil.default_contrast must be 0-100".into(),
            ));
        }
        if !(BrightnessLevel::MIN..=BrightnessLevel::MAX).contains(&self.stencil.default_brightness)
        {
            return Err(ConfigError::Validation(
                "stencil.default_brightness must be -50..50".into(),
            ));
        }
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn thumbnail_params(&self) -> ThumbnailParams {
        ThumbnailParams {
            edge: self.thumbnails.size,
            quality: Quality::new(self.thumbnails.quality),
        }
    }

    pub fn export_retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention.export_days) * 24 * 60 * 60)
    }
}

/// Printer and paper settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrinterConfig {
    pub paper_size: PaperSize,
    pub default_width_cm: f64,
    pub thermal_mode: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            paper_size: PaperSize::A4,
            default_width_cm: 10.0,
            thermal_mode: false,
        }
    }
}

/// Tone levels applied to newly created stencils.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StencilDefaults {
    pub default_contrast: i32,
    pub default_brightness: i32,
}

impl Default for StencilDefaults {
    fn default() -> Self {
        Self {
            default_contrast: ContrastLevel::DEFAULT,
            default_brightness: 0,
        }
    }
}

impl StencilDefaults {
    pub fn contrast(&self) -> ContrastLevel {
        ContrastLevel::new(self.default_contrast)
    }

    pub fn brightness(&self) -> BrightnessLevel {
        BrightnessLevel::new(self.default_brightness)
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Edge of the square thumbnail in pixels.
    pub size: u32,
    /// JPEG quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        let params = ThumbnailParams::default();
        Self {
            size: params.edge,
            quality: params.quality.value(),
        }
    }
}

/// How long exports are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionConfig {
    pub export_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { export_days: 7 }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of image worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Presentation preferences for the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub favorites_first: bool,
}

// =============================================================================
// Settings loading, merging, and validation
// =============================================================================

/// Returns the stock defaults as a `toml::Value::Table`, the base layer for
/// merging user overrides.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppSettings::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `settings.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist, `Err` if it is invalid TOML.
pub fn load_raw_settings(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = dir.join(SETTINGS_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_settings(overlay: Option<toml::Value>) -> Result<AppSettings, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let settings: AppSettings = merged.try_into()?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings from `settings.toml` in `dir`, falling back to defaults.
pub fn load_settings(dir: &Path) -> Result<AppSettings, ConfigError> {
    resolve_settings(load_raw_settings(dir)?)
}

/// Returns a fully-commented stock `settings.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Stencil Forge Settings
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file at <base-dir>/settings.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Printer
# ---------------------------------------------------------------------------
[printer]
# Paper loaded in the printer: "A4", "A5", "A6" or "Letter".
paper_size = "A4"
# Print width in centimeters used when `create` gets no --width-cm.
default_width_cm = 10.0
# Binarize exports to pure black and white for direct-thermal printers.
thermal_mode = false

# ---------------------------------------------------------------------------
# New stencil defaults
# ---------------------------------------------------------------------------
[stencil]
# Contrast level 0-100. 60 is a mild boost.
default_contrast = 60
# Brightness level -50..50. 0 leaves tones alone.
default_brightness = 0

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Edge of the square preview in pixels.
size = 200
# JPEG quality 1-100.
quality = 85

# ---------------------------------------------------------------------------
# Retention
# ---------------------------------------------------------------------------
[retention]
# Exports older than this many days are deleted by `cleanup`.
export_days = 7

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum worker threads for image processing.
# Omit to use all CPU cores. Values above the core count are clamped.
# max_processes = 4

# ---------------------------------------------------------------------------
# Listing
# ---------------------------------------------------------------------------
[ui]
# List favorites before everything else.
favorites_first = false
"##
}
