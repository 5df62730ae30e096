//! Image processing: pure Rust, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Stencil pipeline** | [`pipeline::run`]: rotate → mirror → brightness → contrast → threshold |
//! | **Output** | PNG (lossless) |
//! | **Thumbnail** | `resize_exact` 200×200 → JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for tone curves and print dimensions (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Stages**: One enum variant per pipeline step
//! - **Pipeline**: Planning and running the fixed stage order
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod pipeline;
pub mod rust_backend;
pub mod stages;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{derive_height_cm, rescale_height_cm};
pub use params::{
    BrightnessLevel, ContrastLevel, Quality, Rotation, ThumbnailParams, TransformParams,
};
pub use rust_backend::{RustBackend, sniff_extension};
