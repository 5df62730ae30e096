//! The individual steps of the stencil pipeline.
//!
//! Each [`Stage`] takes the working image by value and returns the next one.
//! Stages know nothing about ordering; [`plan_pipeline`](super::pipeline::plan_pipeline)
//! decides which stages run and in what sequence.
//!
//! Tonal stages work on 8-bit RGBA through 256-entry lookup tables and split
//! the pixel buffer across the rayon pool. Every pixel is computed on its own,
//! so the split never changes the result.

use super::calculations::{brightness_lut, brightness_offset, contrast_factor, contrast_lut};
use super::params::{BrightnessLevel, ContrastLevel, Rotation};
use image::{DynamicImage, GrayImage, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

/// One named pipeline step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    Rotate(Rotation),
    MirrorHorizontal,
    MirrorVertical,
    Brightness(BrightnessLevel),
    Contrast(ContrastLevel),
    /// Luminance binarization; pixels below the cutoff go black, the rest white.
    Threshold(u8),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Rotate(_) => "rotate",
            Stage::MirrorHorizontal => "mirror-horizontal",
            Stage::MirrorVertical => "mirror-vertical",
            Stage::Brightness(_) => "brightness",
            Stage::Contrast(_) => "contrast",
            Stage::Threshold(_) => "threshold",
        }
    }

    pub fn apply(&self, img: DynamicImage) -> DynamicImage {
        debug!(
            stage = self.name(),
            width = img.width(),
            height = img.height(),
            "Applying stage"
        );
        match *self {
            Stage::Rotate(rotation) => rotate(img, rotation),
            Stage::MirrorHorizontal => img.fliph(),
            Stage::MirrorVertical => img.flipv(),
            Stage::Brightness(level) => {
                let lut = brightness_lut(brightness_offset(level));
                DynamicImage::ImageRgba8(map_rgb(img.into_rgba8(), &lut))
            }
            Stage::Contrast(level) => {
                let lut = contrast_lut(contrast_factor(level));
                DynamicImage::ImageRgba8(map_rgb(img.into_rgba8(), &lut))
            }
            Stage::Threshold(cutoff) => DynamicImage::ImageLuma8(threshold(img.to_luma8(), cutoff)),
        }
    }
}

fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => img,
        Rotation::Quarter => img.rotate90(),
        Rotation::Half => img.rotate180(),
        Rotation::ThreeQuarter => img.rotate270(),
    }
}

/// Push R, G and B through `lut`, leaving alpha alone.
fn map_rgb(mut rgba: RgbaImage, lut: &[u8; 256]) -> RgbaImage {
    let raw: &mut [u8] = &mut rgba;
    raw.par_chunks_mut(4).for_each(|px| {
        px[0] = lut[px[0] as usize];
        px[1] = lut[px[1] as usize];
        px[2] = lut[px[2] as usize];
    });
    rgba
}

fn threshold(mut gray: GrayImage, cutoff: u8) -> GrayImage {
    let raw: &mut [u8] = &mut gray;
    raw.par_iter_mut()
        .for_each(|v| *v = if *v < cutoff { 0 } else { 255 });
    gray
}
