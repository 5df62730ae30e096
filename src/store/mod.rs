//! Persistence: binary assets on disk and stencil metadata.
//!
//! ```text
//! <base>/
//! ├── originals/      untouched sources, <id>.<sniffed ext>
//! ├── processed/      pipeline output, <id>.png (overwritten on reprocess)
//! ├── exports/        print-ready renders, <id>_<millis>_<nonce>.png (expire)
//! ├── cache/          thumbnails, <id>_thumb.jpg
//! ├── stencils.json   metadata, one record per stencil
//! └── settings.toml   user settings (see config)
//! ```
//!
//! Paths handed out by the stores are *logical*: relative to the base
//! directory, `/`-separated, never absolute. Both stores sit behind traits
//! ([`ContentStore`], [`MetadataStore`]) so the catalog can run against fakes.

pub mod content;
pub mod metadata;

pub use content::{AssetCategory, ContentStore, FsContentStore};
pub use metadata::{JsonMetadataStore, MetadataStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid logical path: {0}")]
    InvalidPath(String),
    #[error("Unsupported metadata version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Store lock poisoned")]
    LockPoisoned,
}
