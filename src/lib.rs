//! # Stencil Forge
//!
//! Turns photographs into printable tattoo stencils and keeps a catalog of
//! stencil projects: the source photo, the transform settings, a processed
//! print-ready image, a thumbnail, and print metadata (physical size, paper).
//!
//! # Architecture
//!
//! ```text
//! CLI ──▶ Catalog ──▶ PipelineWorker ──▶ ImageBackend (pipeline, thumbnail)
//!            │
//!            ├──▶ ContentStore   originals/ processed/ exports/ cache/
//!            └──▶ MetadataStore  stencils.json
//! ```
//!
//! The catalog receives a create or update, hands the original bytes and the
//! merged parameters to the worker, writes the returned bytes through the
//! content store, and stores the record last.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Every stencil operation: create, update, query, duplicate, export, cleanup, reconcile |
//! | [`imaging`] | The stencil pipeline (rotate → mirror → brightness → contrast → threshold) and thumbnails |
//! | [`worker`] | Runs image jobs on a dedicated thread pool and hands results back as futures |
//! | [`store`] | Asset files on disk and the JSON metadata document |
//! | [`config`] | `settings.toml` loading, validation, and merging over stock defaults |
//! | [`types`] | `StencilRecord`, `StencilPatch`, `PaperSize` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Always Reprocess From the Original
//!
//! The original photo is stored untouched and is the only input the pipeline
//! ever sees. Every edit re-runs the whole pipeline with the full merged
//! parameter set. Stacking edits on the processed output would compound
//! contrast and, once thermal mode has thresholded an image, lose its tones
//! for good.
//!
//! ## Fixed Stage Order
//!
//! Rotation and mirroring come first so tonal stages see the final geometry;
//! brightness runs before contrast; thresholding runs last on the final
//! tones. The order is data ([`imaging::pipeline::plan_pipeline`]), not
//! configuration.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, encoding and pixel work use the `image` crate with rayon for the
//! per-pixel loops. No system libraries: the binary is self-contained.
//!
//! ## Files Over a Database
//!
//! Assets are plain files in category directories and metadata is one JSON
//! document. Both are easy to inspect, back up and sync, and every write is a
//! temp file renamed into place.

pub mod catalog;
pub mod config;
pub mod imaging;
pub mod output;
pub mod store;
pub mod types;
pub mod worker;
