//! Pure calculation functions for tone curves and print dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{BrightnessLevel, ContrastLevel};

/// Luminance cutoff used by thermal binarization (0-255 scale).
pub const THERMAL_THRESHOLD: u8 = 128;

/// Map a contrast level to its multiplicative factor.
///
/// `factor = 0.5 + (level / 100) * 1.5`, so 0 → 0.5, 100 → 2.0 and a level
/// of roughly 33 is neutral.
pub fn contrast_factor(level: ContrastLevel) -> f32 {
    0.5 + (level.value() as f32 / 100.0) * 1.5
}

/// Map a brightness level to the additive per-channel offset.
///
/// Linear over the 0-255 range: ±50 shifts by roughly half the range.
pub fn brightness_offset(level: BrightnessLevel) -> i32 {
    (f64::from(level.value()) * 255.0 / 100.0).round() as i32
}

/// Lookup table applying `(c - 128) * factor + 128` to every 8-bit value.
pub fn contrast_lut(factor: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let adjusted = (value as f32 - 128.0) * factor + 128.0;
        *slot = adjusted.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Lookup table adding `offset` to every 8-bit value, saturating at both ends.
pub fn brightness_lut(offset: i32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        *slot = (value as i32 + offset).clamp(0, 255) as u8;
    }
    lut
}

/// Derive the print height from the requested width and pixel dimensions.
///
/// `height_cm = width_cm * (pixel_height / pixel_width)`
pub fn derive_height_cm(width_cm: f64, pixel_dims: (u32, u32)) -> f64 {
    let (w, h) = pixel_dims;
    width_cm * (f64::from(h) / f64::from(w))
}

/// Recompute the height after a width change, preserving the stored ratio.
///
/// The ratio is the one captured at creation (`old_height / old_width`),
/// not a fresh measurement of the image.
pub fn rescale_height_cm(new_width_cm: f64, old_width_cm: f64, old_height_cm: f64) -> f64 {
    new_width_cm * (old_height_cm / old_width_cm)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn contrast_factor_endpoints() {
        assert_eq!(contrast_factor(ContrastLevel::new(0)), 0.5);
        assert_eq!(contrast_factor(ContrastLevel::new(100)), 2.0);
    }

    #[test]
    fn contrast_factor_near_neutral_at_33() {
        let f = contrast_factor(ContrastLevel::new(33));
        assert!((f - 1.0).abs() < 0.01, "factor was {f}");
    }

    #[test]
    fn contrast_lut_keeps_midpoint() {
        for factor in [0.5, 1.0, 1.4, 2.0] {
            assert_eq!(contrast_lut(factor)[128], 128);
        }
    }

    #[test]
    fn contrast_lut_identity_at_factor_one() {
        let lut = contrast_lut(1.0);
        for (value, mapped) in lut.iter().enumerate() {
            assert_eq!(*mapped as usize, value);
        }
    }

    #[test]
    fn contrast_lut_spreads_and_clamps() {
        let lut = contrast_lut(2.0);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[64], 0);
        assert_eq!(lut[160], 192);
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn contrast_lut_flattens_at_half() {
        let lut = contrast_lut(0.5);
        assert_eq!(lut[0], 64);
        assert_eq!(lut[255], 192);
    }

    #[test]
    fn brightness_offset_is_linear() {
        assert_eq!(brightness_offset(BrightnessLevel::new(0)), 0);
        assert_eq!(brightness_offset(BrightnessLevel::new(20)), 51);
        assert_eq!(brightness_offset(BrightnessLevel::new(-20)), -51);
        assert_eq!(brightness_offset(BrightnessLevel::new(50)), 128);
    }

    #[test]
    fn brightness_lut_saturates() {
        let lut = brightness_lut(100);
        assert_eq!(lut[0], 100);
        assert_eq!(lut[200], 255);
        let lut = brightness_lut(-100);
        assert_eq!(lut[50], 0);
        assert_eq!(lut[255], 155);
    }

    #[test]
    fn derive_height_from_portrait_source() {
        // 800x1200 source at 10cm wide → 15cm tall
        assert!((derive_height_cm(10.0, (800, 1200)) - 15.0).abs() < EPS);
    }

    #[test]
    fn derive_height_from_landscape_source() {
        assert!((derive_height_cm(12.0, (400, 300)) - 9.0).abs() < EPS);
    }

    #[test]
    fn rescale_height_preserves_ratio() {
        assert!((rescale_height_cm(6.0, 12.0, 18.0) - 9.0).abs() < EPS);
        assert!((rescale_height_cm(24.0, 12.0, 18.0) - 36.0).abs() < EPS);
    }
}
