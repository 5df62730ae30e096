//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`catalog`](crate::catalog) (which decides what a
//! stencil should look like) and the [`backend`](super::backend) (which does
//! the actual pixel work).
//!
//! ## Types
//!
//! - [`Rotation`]: Right-angle rotation. Anything but 0/90/180/270 is rejected.
//! - [`ContrastLevel`]: Stencil contrast (0–100, default 60). Clamped on construction.
//! - [`BrightnessLevel`]: Additive brightness (-50–50, default 0). Clamped on construction.
//! - [`TransformParams`]: Everything the pipeline needs for one run.
//! - [`Quality`]: Lossy encoding quality (1–100) for thumbnails.
//! - [`ThumbnailParams`]: Target edge and quality for the catalog preview.

use super::backend::BackendError;
use serde::{Deserialize, Serialize};

/// Clockwise rotation by a right angle.
///
/// Serialized as the plain degree value so stored records stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = BackendError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::ThreeQuarter),
            other => Err(BackendError::InvalidRotation(other)),
        }
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// Contrast slider position (0-100).
///
/// Mapped to a multiplicative factor by
/// [`contrast_factor`](super::calculations::contrast_factor): 0 flattens,
/// ~33 is neutral, 100 doubles the spread around mid-grey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct ContrastLevel(u8);

impl ContrastLevel {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;
    pub const DEFAULT: i32 = 60;

    pub fn new(value: i32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX) as u8)
    }

    pub fn value(self) -> i32 {
        i32::from(self.0)
    }
}

impl Default for ContrastLevel {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl From<i32> for ContrastLevel {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<ContrastLevel> for i32 {
    fn from(level: ContrastLevel) -> Self {
        level.value()
    }
}

/// Brightness slider position (-50..=50). Zero leaves pixels untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct BrightnessLevel(i8);

impl BrightnessLevel {
    pub const MIN: i32 = -50;
    pub const MAX: i32 = 50;

    pub fn new(value: i32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX) as i8)
    }

    pub fn value(self) -> i32 {
        i32::from(self.0)
    }

    pub fn is_neutral(self) -> bool {
        self.0 == 0
    }
}

impl From<i32> for BrightnessLevel {
    fn from(value: i32) -> Self {
        Self::new(value)
    }
}

impl From<BrightnessLevel> for i32 {
    fn from(level: BrightnessLevel) -> Self {
        level.value()
    }
}

/// Full parameter set for one pipeline run.
///
/// Jobs handed to the worker pool take their own copy and never share state
/// with the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransformParams {
    pub rotation: Rotation,
    pub mirror_h: bool,
    pub mirror_v: bool,
    pub brightness: BrightnessLevel,
    pub contrast: ContrastLevel,
    pub thermal_mode: bool,
}

impl TransformParams {
    pub fn with_thermal(mut self, thermal_mode: bool) -> Self {
        self.thermal_mode = thermal_mode;
        self
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Parameters for the catalog thumbnail (exact square resize, JPEG).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    /// Edge length in pixels; the output is `edge x edge`.
    pub edge: u32,
    pub quality: Quality,
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self {
            edge: 200,
            quality: Quality::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_accepts_right_angles() {
        for degrees in [0, 90, 180, 270] {
            let rotation = Rotation::try_from(degrees).unwrap();
            assert_eq!(rotation.degrees(), degrees);
        }
    }

    #[test]
    fn rotation_rejects_other_angles() {
        for degrees in [45, 360, 1, 89, 271] {
            assert!(matches!(
                Rotation::try_from(degrees),
                Err(BackendError::InvalidRotation(d)) if d == degrees
            ));
        }
    }

    #[test]
    fn rotation_serializes_as_degrees() {
        assert_eq!(serde_json::to_string(&Rotation::Half).unwrap(), "180");
        let parsed: Rotation = serde_json::from_str("270").unwrap();
        assert_eq!(parsed, Rotation::ThreeQuarter);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }

    #[test]
    fn contrast_clamps_to_valid_range() {
        assert_eq!(ContrastLevel::new(-10).value(), 0);
        assert_eq!(ContrastLevel::new(80).value(), 80);
        assert_eq!(ContrastLevel::new(250).value(), 100);
    }

    #[test]
    fn contrast_default_is_60() {
        assert_eq!(ContrastLevel::default().value(), 60);
    }

    #[test]
    fn brightness_clamps_to_valid_range() {
        assert_eq!(BrightnessLevel::new(-80).value(), -50);
        assert_eq!(BrightnessLevel::new(20).value(), 20);
        assert_eq!(BrightnessLevel::new(51).value(), 50);
        assert!(BrightnessLevel::default().is_neutral());
    }

    #[test]
    fn default_params_are_identity_except_contrast() {
        let params = TransformParams::default();
        assert_eq!(params.rotation, Rotation::None);
        assert!(!params.mirror_h);
        assert!(!params.mirror_v);
        assert!(params.brightness.is_neutral());
        assert_eq!(params.contrast.value(), 60);
        assert!(!params.thermal_mode);
    }

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }
}
