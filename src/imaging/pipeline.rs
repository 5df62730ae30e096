//! The stencil transform pipeline.
//!
//! ```text
//! decode → rotate → mirror H → mirror V → brightness → contrast → [threshold] → PNG
//! ```
//!
//! The order is fixed and matters: brightness before contrast gives a
//! different tone curve than the reverse, and thresholding has to see the
//! final tones. [`plan_pipeline`] turns a [`TransformParams`] into the list
//! of stages that will run, which is what the tests pin down.
//!
//! Rotation, mirroring, brightness and threshold only appear in the plan when
//! their parameter asks for them. Contrast always runs.
//!
//! The pipeline is a pure function of `(bytes, params)`: no I/O, no shared
//! state, byte-identical output for identical input. Always feed it the
//! *original* asset; thermal output in particular has lost its tones.

use super::backend::BackendError;
use super::calculations::THERMAL_THRESHOLD;
use super::params::{Rotation, TransformParams};
use super::rust_backend::{decode, encode_png};
use super::stages::Stage;
use image::DynamicImage;
use tracing::debug;

/// Decide which stages run for `params`, in application order.
pub fn plan_pipeline(params: &TransformParams) -> Vec<Stage> {
    let mut plan = Vec::with_capacity(6);
    if params.rotation != Rotation::None {
        plan.push(Stage::Rotate(params.rotation));
    }
    if params.mirror_h {
        plan.push(Stage::MirrorHorizontal);
    }
    if params.mirror_v {
        plan.push(Stage::MirrorVertical);
    }
    if !params.brightness.is_neutral() {
        plan.push(Stage::Brightness(params.brightness));
    }
    plan.push(Stage::Contrast(params.contrast));
    if params.thermal_mode {
        plan.push(Stage::Threshold(THERMAL_THRESHOLD));
    }
    plan
}

/// Apply a planned stage list to an already decoded image.
pub fn apply_plan(img: DynamicImage, plan: &[Stage]) -> DynamicImage {
    plan.iter().fold(img, |img, stage| stage.apply(img))
}

/// Run the full pipeline: decode `source`, apply every planned stage, encode PNG.
pub fn run(source: &[u8], params: &TransformParams) -> Result<Vec<u8>, BackendError> {
    let img = decode(source)?;
    let plan = plan_pipeline(params);
    let stage_names: Vec<&str> = plan.iter().map(Stage::name).collect();
    debug!(
        stages = ?stage_names,
        width = img.width(),
        height = img.height(),
        "Running stencil pipeline"
    );
    encode_png(&apply_plan(img, &plan))
}
