//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP, TIFF, GIF, BMP) | `image::load_from_memory` |
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Rotate / mirror | `DynamicImage::rotate*`, `fliph`, `flipv` |
//! | Tone stages + threshold | lookup tables over the raw buffer, split with rayon |
//! | Encode → PNG (processed, exports) | `image::codecs::png::PngEncoder` |
//! | Thumbnail | `resize_exact` (Triangle) + `JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{ThumbnailParams, TransformParams};
use super::pipeline;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Decode `source` into 8-bit RGBA. Zero-area images are rejected.
pub(crate) fn decode(source: &[u8]) -> Result<DynamicImage, BackendError> {
    let img = image::load_from_memory(source).map_err(|e| BackendError::Decode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(BackendError::Decode("image has zero area".into()));
    }
    Ok(DynamicImage::ImageRgba8(img.into_rgba8()))
}

/// Encode losslessly so repeated edits never stack compression artifacts.
pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    img.write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(|e| BackendError::Encode(format!("PNG encode failed: {e}")))?;
    Ok(buf)
}

fn encode_jpeg(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality as u8))
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// File extension matching the format sniffed from `bytes`, or `"bin"`.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(BackendError::Decode("image has zero area".into()));
        }
        Ok(Dimensions { width, height })
    }

    fn transform(&self, source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError> {
        pipeline::run(source, params)
    }

    fn thumbnail(&self, source: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError> {
        let img = decode(source)?;
        // Exact resize: the preview is always square, whatever the source aspect.
        let thumb = img.resize_exact(params.edge, params.edge, FilterType::Triangle);
        encode_jpeg(&thumb, params.quality.value())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use image::{GenericImageView, ImageEncoder, ImageFormat, RgbImage};

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in bytes {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                crc = if crc & 1 == 1 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
            }
        }
        !crc
    }

    fn png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        let start = out.len();
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let crc = crc32(&out[start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }

    /// A well-formed PNG header declaring a 0×16 RGB image.
    pub fn zero_width_png() -> Vec<u8> {
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&0u32.to_be_bytes());
        ihdr.extend_from_slice(&16u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
        png_chunk(&mut png, b"IHDR", &ihdr);
        png_chunk(&mut png, b"IEND", &[]);
        png
    }

    /// Encode a small gradient as JPEG in memory.
    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        JpegEncoder::new(&mut buf)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let dims = RustBackend::new().identify(&test_jpeg(200, 150)).unwrap();
        assert_eq!(dims.as_tuple(), (200, 150));
    }

    #[test]
    fn identify_garbage_errors() {
        let result = RustBackend::new().identify(b"GIF? no.");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn zero_area_is_decode_error() {
        let png = zero_width_png();
        let backend = RustBackend::new();
        assert!(matches!(backend.identify(&png), Err(BackendError::Decode(_))));
        assert!(matches!(decode(&png), Err(BackendError::Decode(_))));
        assert!(matches!(
            backend.thumbnail(&png, &ThumbnailParams::default()),
            Err(BackendError::Decode(_))
        ));
    }

    #[test]
    fn iend_chunk_crc_matches_png_constant() {
        let mut out = Vec::new();
        png_chunk(&mut out, b"IEND", &[]);
        assert_eq!(out[8..], [0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn decode_normalizes_to_rgba8() {
        let img = decode(&test_jpeg(10, 10)).unwrap();
        assert!(img.as_rgba8().is_some());
    }

    #[test]
    fn transform_produces_png() {
        let out = RustBackend::new()
            .transform(&test_jpeg(64, 32), &TransformParams::default())
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn thumbnail_is_square_jpeg() {
        let out = RustBackend::new()
            .thumbnail(
                &test_jpeg(400, 100),
                &ThumbnailParams {
                    edge: 200,
                    quality: Quality::new(80),
                },
            )
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));
    }

    #[test]
    fn sniff_extension_known_formats() {
        assert_eq!(sniff_extension(&test_jpeg(4, 4)), "jpg");
        let png = encode_png(&DynamicImage::new_rgba8(2, 2)).unwrap();
        assert_eq!(sniff_extension(&png), "png");
        assert_eq!(sniff_extension(b"plain text"), "bin");
    }
}
