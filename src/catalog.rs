//! The stencil catalog: every user-facing operation on stencil projects.
//!
//! The catalog owns no state of its own. It coordinates three injected
//! collaborators:
//!
//! - a [`MetadataStore`] for records,
//! - a [`ContentStore`] for image assets,
//! - a [`PipelineWorker`] that runs decoding and the stencil pipeline off
//!   the caller's thread.
//!
//! Store calls are synchronous filesystem work. Each operation bundles its
//! store calls into one job on tokio's blocking pool, so a slow disk
//! suspends only the caller that is waiting on it.
//!
//! ## Write ordering
//!
//! Assets are always written before the record that points at them. A
//! create that fails halfway removes what it already wrote (best effort) and
//! never stores a record. An update whose record write fails puts the
//! previous processed asset back. Either way a record never references a
//! missing or stale asset. Anything a crash still leaves behind is found by
//! [`Catalog::reconcile`].
//!
//! ## Reprocessing
//!
//! The pipeline is always fed the **original** asset with the full merged
//! parameter set. Processed output is never re-transformed, so edits don't
//! accumulate and thermal output never leaks into later renders.
//!
//! No per-stencil locking: concurrent writes to the same id are last-write-wins.

use crate::config::{AppSettings, effective_threads};
use crate::imaging::{
    BackendError, Rotation, TransformParams, derive_height_cm, rescale_height_cm,
};
use crate::store::{
    AssetCategory, ContentStore, FsContentStore, JsonMetadataStore, MetadataStore, StoreError,
};
use crate::types::{StencilPatch, StencilRecord};
use crate::worker::{PipelineWorker, WorkerError};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Stencil not found: {0}")]
    NotFound(String),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Processing error: {0}")]
    Processing(#[from] BackendError),
    #[error("Worker error: {0}")]
    Worker(WorkerError),
    #[error("Storage task failed: {0}")]
    StorageTask(#[from] task::JoinError),
}

impl From<WorkerError> for CatalogError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Backend(e) => CatalogError::Processing(e),
            other => CatalogError::Worker(other),
        }
    }
}

/// Decode failures on user-supplied bytes mean the bytes are bad; anything
/// else the backend reports is a processing failure.
fn invalid_image(e: WorkerError) -> CatalogError {
    match e {
        WorkerError::Backend(BackendError::Decode(reason)) => CatalogError::InvalidImage(reason),
        other => other.into(),
    }
}

fn validate_width(width_cm: f64) -> Result<(), CatalogError> {
    if width_cm.is_finite() && width_cm > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidParameter(format!(
            "width must be a positive number of centimeters, got {width_cm}"
        )))
    }
}

fn default_name(created_at: DateTime<Utc>) -> String {
    format!("Stencil {}", created_at.format("%Y-%m-%d %H:%M"))
}

/// Listing order: favorites first (if asked), newest edit first, then id.
fn compare_records(a: &StencilRecord, b: &StencilRecord, favorites_first: bool) -> Ordering {
    let favorites = if favorites_first {
        b.is_favorite.cmp(&a.is_favorite)
    } else {
        Ordering::Equal
    };
    favorites
        .then_with(|| b.last_modified_at.cmp(&a.last_modified_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Summary counts for the whole catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStats {
    pub total: usize,
    pub favorites: usize,
    pub exported: usize,
    /// Bytes on disk per asset category.
    pub bytes: BTreeMap<AssetCategory, u64>,
}

impl CatalogStats {
    pub fn total_bytes(&self) -> u64 {
        self.bytes.values().sum()
    }
}

impl fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.total == 1 { "stencil" } else { "stencils" };
        write!(
            f,
            "{} {noun} ({} favorite, {} exported)",
            self.total, self.favorites, self.exported
        )
    }
}

/// A record whose asset file is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAsset {
    pub id: String,
    pub path: String,
}

/// Outcome of [`Catalog::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Asset files deleted because no record owns them.
    pub removed_orphans: Vec<String>,
    /// Record assets that no longer exist. Records are left in place.
    pub missing_assets: Vec<MissingAsset>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.removed_orphans.is_empty() && self.missing_assets.is_empty()
    }
}

// ============================================================================
// Store-side steps
// ============================================================================
//
// Everything below runs inside `Catalog::with_stores`, on the blocking pool.

fn find_record(metadata: &dyn MetadataStore, id: &str) -> Result<StencilRecord, CatalogError> {
    metadata
        .get(id)?
        .ok_or_else(|| CatalogError::NotFound(id.to_string()))
}

/// Delete `paths`, logging failures. Used to undo partial writes.
fn remove_assets_best_effort(content: &dyn ContentStore, paths: &[String]) {
    for path in paths {
        if let Err(e) = content.delete(path) {
            warn!(path = %path, error = %e, "Failed to remove partial asset");
        }
    }
}

fn write_assets(
    content: &dyn ContentStore,
    id: &str,
    assets: &[(AssetCategory, &[u8])],
    written: &mut Vec<String>,
) -> Result<(), CatalogError> {
    for (category, bytes) in assets {
        written.push(content.save(*category, id, bytes)?);
    }
    Ok(())
}

/// Save each `(category, bytes)` for `id`, then store the record built from
/// the saved paths. On any failure the saved assets are removed.
fn persist_new(
    metadata: &dyn MetadataStore,
    content: &dyn ContentStore,
    id: &str,
    assets: &[(AssetCategory, &[u8])],
    build: impl FnOnce(&[String]) -> StencilRecord,
) -> Result<StencilRecord, CatalogError> {
    let mut written = Vec::with_capacity(assets.len());
    let result = write_assets(content, id, assets, &mut written).and_then(|()| {
        let record = build(&written);
        metadata.put(record.clone())?;
        Ok(record)
    });
    if result.is_err() {
        remove_assets_best_effort(content, &written);
    }
    result
}

/// Store `next`, first replacing the processed asset with `rendered` if
/// there is one. If the record can't be stored the previous processed asset
/// is put back, so `current` still describes what is on disk.
fn store_update(
    metadata: &dyn MetadataStore,
    content: &dyn ContentStore,
    current: &StencilRecord,
    mut next: StencilRecord,
    rendered: Option<Vec<u8>>,
) -> Result<StencilRecord, CatalogError> {
    let Some(processed) = rendered else {
        metadata.put(next.clone())?;
        return Ok(next);
    };
    let previous = match content.read(&current.processed_image_path) {
        Ok(bytes) => Some(bytes),
        Err(StoreError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };
    next.processed_image_path = content.save(AssetCategory::Processed, &next.id, &processed)?;
    if let Err(e) = metadata.put(next.clone()) {
        restore_processed(content, current, &next.processed_image_path, previous);
        return Err(e.into());
    }
    Ok(next)
}

fn restore_processed(
    content: &dyn ContentStore,
    current: &StencilRecord,
    written: &str,
    previous: Option<Vec<u8>>,
) {
    let restored = match previous {
        Some(bytes) if written == current.processed_image_path => content
            .save(AssetCategory::Processed, &current.id, &bytes)
            .map(|_| ()),
        _ => content.delete(written),
    };
    match restored {
        Ok(()) => debug!(id = %current.id, "Restored processed asset after failed update"),
        Err(e) => warn!(id = %current.id, error = %e, "Failed to restore processed asset"),
    }
}

/// Set `lastExportedAt`. Returns whether the record existed.
fn mark_exported(metadata: &dyn MetadataStore, id: &str) -> Result<bool, CatalogError> {
    let Some(mut record) = metadata.get(id)? else {
        return Ok(false);
    };
    record.last_exported_at = Some(Utc::now());
    metadata.put(record)?;
    Ok(true)
}

fn reconcile_stores(
    metadata: &dyn MetadataStore,
    content: &dyn ContentStore,
) -> Result<ReconcileReport, CatalogError> {
    let records = metadata.all()?;
    let owned: HashSet<&str> = records.iter().flat_map(|r| r.asset_paths()).collect();
    let mut report = ReconcileReport::default();

    for category in [
        AssetCategory::Original,
        AssetCategory::Processed,
        AssetCategory::Thumbnail,
    ] {
        for path in content.list(category)? {
            if !owned.contains(path.as_str()) {
                content.delete(&path)?;
                warn!(path = %path, "Removed orphaned asset");
                report.removed_orphans.push(path);
            }
        }
    }

    for record in &records {
        for path in record.asset_paths() {
            if !content.exists(path)? {
                warn!(id = %record.id, path, "Stencil asset missing");
                report.missing_assets.push(MissingAsset {
                    id: record.id.clone(),
                    path: path.to_string(),
                });
            }
        }
    }
    Ok(report)
}

pub struct Catalog {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    worker: PipelineWorker,
    settings: AppSettings,
}

impl Catalog {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        worker: PipelineWorker,
        settings: AppSettings,
    ) -> Self {
        Self {
            metadata,
            content,
            worker,
            settings,
        }
    }

    /// Catalog over the standard on-disk layout rooted at `base`.
    pub fn open(base: &Path, settings: AppSettings) -> Result<Self, CatalogError> {
        let content = FsContentStore::open(base)?;
        let metadata = JsonMetadataStore::open(base)?;
        let worker = PipelineWorker::with_rust_backend(effective_threads(&settings.processing))?;
        Ok(Self::new(
            Arc::new(metadata),
            Arc::new(content),
            worker,
            settings,
        ))
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Run `job` against both stores on the blocking pool and await it.
    async fn with_stores<T, F>(&self, job: F) -> Result<T, CatalogError>
    where
        F: FnOnce(&dyn MetadataStore, &dyn ContentStore) -> Result<T, CatalogError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let metadata = Arc::clone(&self.metadata);
        let content = Arc::clone(&self.content);
        task::spawn_blocking(move || job(metadata.as_ref(), content.as_ref())).await?
    }

    // =========================================================================
    // Create / update
    // =========================================================================

    /// Create a stencil from raw image bytes printed `width_cm` wide.
    ///
    /// A blank or missing `name` becomes `"Stencil <date time>"`.
    pub async fn create_stencil(
        &self,
        source: Vec<u8>,
        width_cm: f64,
        name: Option<String>,
    ) -> Result<StencilRecord, CatalogError> {
        validate_width(width_cm)?;
        let source: Arc<[u8]> = source.into();

        let dims = self
            .worker
            .identify(Arc::clone(&source))
            .await
            .map_err(invalid_image)?;
        let height_cm = derive_height_cm(width_cm, dims.as_tuple());

        let params = TransformParams {
            contrast: self.settings.stencil.contrast(),
            brightness: self.settings.stencil.brightness(),
            ..TransformParams::default()
        };
        let (thumbnail, processed) = tokio::try_join!(
            self.worker
                .thumbnail(Arc::clone(&source), self.settings.thumbnail_params()),
            self.worker.transform(Arc::clone(&source), params),
        )
        .map_err(invalid_image)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name(now));
        let paper_size = self.settings.printer.paper_size;

        let record = self
            .with_stores(move |metadata, content| {
                persist_new(
                    metadata,
                    content,
                    &id,
                    &[
                        (AssetCategory::Original, &source[..]),
                        (AssetCategory::Processed, processed.as_slice()),
                        (AssetCategory::Thumbnail, thumbnail.as_slice()),
                    ],
                    |paths| StencilRecord {
                        id: id.clone(),
                        name,
                        created_at: now,
                        last_modified_at: now,
                        original_image_path: paths[0].clone(),
                        processed_image_path: paths[1].clone(),
                        thumbnail_path: Some(paths[2].clone()),
                        width_cm,
                        height_cm,
                        is_mirrored_h: false,
                        is_mirrored_v: false,
                        rotation_degrees: params.rotation,
                        contrast_level: params.contrast,
                        brightness_level: params.brightness,
                        paper_size,
                        last_exported_at: None,
                        client_note: None,
                        is_favorite: false,
                    },
                )
            })
            .await?;

        info!(
            id = %record.id,
            width = dims.width,
            height = dims.height,
            width_cm,
            height_cm,
            "Created stencil"
        );
        Ok(record)
    }

    /// Apply `patch` to stencil `id`.
    ///
    /// Everything is validated before anything is written. Transform fields
    /// re-run the pipeline from the original; the processed asset is
    /// overwritten before the record is stored, and restored if storing the
    /// record fails.
    pub async fn update_stencil(
        &self,
        id: &str,
        patch: StencilPatch,
    ) -> Result<StencilRecord, CatalogError> {
        let key = id.to_string();
        let current = self
            .with_stores(move |metadata, _| find_record(metadata, &key))
            .await?;
        let reprocess = patch.touches_pipeline();
        let mut next = current.clone();

        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CatalogError::InvalidParameter(
                    "name must not be blank".into(),
                ));
            }
            next.name = name.to_string();
        }
        if let Some(width_cm) = patch.width_cm {
            validate_width(width_cm)?;
            next.width_cm = width_cm;
            next.height_cm = rescale_height_cm(width_cm, current.width_cm, current.height_cm);
        }
        if let Some(degrees) = patch.rotation_degrees {
            next.rotation_degrees = Rotation::try_from(degrees)
                .map_err(|e| CatalogError::InvalidParameter(e.to_string()))?;
        }
        if let Some(mirror) = patch.is_mirrored_h {
            next.is_mirrored_h = mirror;
        }
        if let Some(mirror) = patch.is_mirrored_v {
            next.is_mirrored_v = mirror;
        }
        if let Some(level) = patch.contrast_level {
            next.contrast_level = level.into();
        }
        if let Some(level) = patch.brightness_level {
            next.brightness_level = level.into();
        }
        if let Some(paper) = patch.paper_size {
            next.paper_size = paper;
        }
        if let Some(note) = patch.client_note {
            next.client_note = note;
        }
        if let Some(favorite) = patch.is_favorite {
            next.is_favorite = favorite;
        }

        let rendered = if reprocess {
            let original_path = current.original_image_path.clone();
            let original = self
                .with_stores(move |_, content| Ok(content.read(&original_path)?))
                .await?;
            let processed = self
                .worker
                .transform(original.into(), next.transform_params())
                .await?;
            debug!(id, params = ?next.transform_params(), "Reprocessed stencil");
            Some(processed)
        } else {
            None
        };

        next.last_modified_at = Utc::now();
        let next = self
            .with_stores(move |metadata, content| {
                store_update(metadata, content, &current, next, rendered)
            })
            .await?;
        info!(id, "Updated stencil");
        Ok(next)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_stencil(&self, id: &str) -> Result<Option<StencilRecord>, CatalogError> {
        let key = id.to_string();
        self.with_stores(move |metadata, _| Ok(metadata.get(&key)?))
            .await
    }

    /// Every stencil, most recently modified first.
    pub async fn get_all_stencils(
        &self,
        favorites_first: bool,
    ) -> Result<Vec<StencilRecord>, CatalogError> {
        let mut records = self.with_stores(|metadata, _| Ok(metadata.all()?)).await?;
        records.sort_by(|a, b| compare_records(a, b, favorites_first));
        Ok(records)
    }

    /// Case-insensitive substring search over name and client note.
    pub async fn search_stencils(&self, query: &str) -> Result<Vec<StencilRecord>, CatalogError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.get_all_stencils(false).await;
        }
        let mut hits: Vec<_> = self
            .with_stores(|metadata, _| Ok(metadata.all()?))
            .await?
            .into_iter()
            .filter(|r| r.matches(&needle))
            .collect();
        hits.sort_by(|a, b| compare_records(a, b, false));
        Ok(hits)
    }

    pub async fn get_statistics(&self) -> Result<CatalogStats, CatalogError> {
        let (records, bytes) = self
            .with_stores(|metadata, content| Ok((metadata.all()?, content.size_by_category()?)))
            .await?;
        Ok(CatalogStats {
            total: records.len(),
            favorites: records.iter().filter(|r| r.is_favorite).count(),
            exported: records.iter().filter(|r| r.is_exported()).count(),
            bytes,
        })
    }

    // =========================================================================
    // Delete / duplicate
    // =========================================================================

    /// Remove a stencil and its assets. Unknown ids are a no-op.
    pub async fn delete_stencil(&self, id: &str) -> Result<(), CatalogError> {
        let key = id.to_string();
        let deleted = self
            .with_stores(move |metadata, content| {
                let Some(record) = metadata.get(&key)? else {
                    return Ok(false);
                };
                for path in record.asset_paths() {
                    content.delete(path)?;
                }
                metadata.remove(&key)?;
                Ok(true)
            })
            .await?;
        if deleted {
            info!(id, "Deleted stencil");
        } else {
            debug!(id, "Delete of unknown stencil ignored");
        }
        Ok(())
    }

    /// Copy a stencil and its assets under a new id.
    ///
    /// The copy is named `"<name> (Copy)"` and has never been exported.
    /// Every asset is a byte-for-byte copy, so the copied original keeps the
    /// extension sniffed from its bytes rather than a fixed one.
    pub async fn duplicate_stencil(&self, id: &str) -> Result<StencilRecord, CatalogError> {
        let key = id.to_string();
        let copy = self
            .with_stores(move |metadata, content| {
                let source = find_record(metadata, &key)?;
                let original = content.read(&source.original_image_path)?;
                let processed = content.read(&source.processed_image_path)?;
                let thumbnail = source
                    .thumbnail_path
                    .as_deref()
                    .map(|p| content.read(p))
                    .transpose()?;

                let new_id = Uuid::new_v4().to_string();
                let now = Utc::now();
                let mut assets: Vec<(AssetCategory, &[u8])> = vec![
                    (AssetCategory::Original, original.as_slice()),
                    (AssetCategory::Processed, processed.as_slice()),
                ];
                if let Some(thumb) = &thumbnail {
                    assets.push((AssetCategory::Thumbnail, thumb.as_slice()));
                }

                persist_new(metadata, content, &new_id, &assets, |paths| {
                    StencilRecord {
                        id: new_id.clone(),
                        name: format!("{} (Copy)", source.name),
                        created_at: now,
                        last_modified_at: now,
                        original_image_path: paths[0].clone(),
                        processed_image_path: paths[1].clone(),
                        thumbnail_path: paths.get(2).cloned(),
                        last_exported_at: None,
                        ..source.clone()
                    }
                })
            })
            .await?;

        info!(id, copy = %copy.id, "Duplicated stencil");
        Ok(copy)
    }

    // =========================================================================
    // Rendering and export
    // =========================================================================

    /// Record that stencil `id` was printed. `lastModifiedAt` is untouched.
    /// Unknown ids are a no-op.
    pub async fn mark_as_exported(&self, id: &str) -> Result<(), CatalogError> {
        let key = id.to_string();
        self.with_stores(move |metadata, _| mark_exported(metadata, &key))
            .await?;
        Ok(())
    }

    /// Render print-ready PNG bytes from the original with the stored
    /// parameters and the requested thermal mode.
    pub async fn render_stencil(&self, id: &str, thermal_mode: bool) -> Result<Vec<u8>, CatalogError> {
        let key = id.to_string();
        let (record, original) = self
            .with_stores(move |metadata, content| {
                let record = find_record(metadata, &key)?;
                let original = content.read(&record.original_image_path)?;
                Ok((record, original))
            })
            .await?;
        let params = record.transform_params().with_thermal(thermal_mode);
        Ok(self.worker.transform(original.into(), params).await?)
    }

    /// Render, store under `exports/` and mark the stencil exported.
    /// Returns the export's logical path.
    pub async fn export_stencil(&self, id: &str, thermal_mode: bool) -> Result<String, CatalogError> {
        let bytes = self.render_stencil(id, thermal_mode).await?;
        let key = id.to_string();
        let path = self
            .with_stores(move |metadata, content| {
                let path = content.save(AssetCategory::Export, &key, &bytes)?;
                mark_exported(metadata, &key)?;
                Ok(path)
            })
            .await?;
        info!(id, path = %path, thermal_mode, "Exported stencil");
        Ok(path)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Delete exports older than the retention window.
    pub async fn cleanup(&self) -> Result<usize, CatalogError> {
        let retention = self.settings.export_retention();
        let removed = self
            .with_stores(move |_, content| Ok(content.prune_expired(retention)?))
            .await?;
        if removed > 0 {
            info!(removed, "Removed expired exports");
        }
        Ok(removed)
    }

    /// Bring assets and records back in line after a crash.
    ///
    /// Deletes original, processed and thumbnail files that no record points
    /// at, and reports records whose assets are missing. Must not run while a
    /// create is in flight, whose assets would look orphaned.
    pub async fn reconcile(&self) -> Result<ReconcileReport, CatalogError> {
        self.with_stores(reconcile_stores).await
    }
}
