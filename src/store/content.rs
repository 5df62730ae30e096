//! Filesystem-backed content store for stencil assets.
//!
//! Every write lands in a hidden temp file beside its target and is renamed
//! into place, so a crash never leaves a half-written asset under its real
//! name. Listing and size accounting skip those temp files.

use super::StoreError;
use crate::imaging::sniff_extension;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Kind of asset, which decides the directory and file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Original,
    Processed,
    Thumbnail,
    Export,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 4] = [
        AssetCategory::Original,
        AssetCategory::Processed,
        AssetCategory::Thumbnail,
        AssetCategory::Export,
    ];

    /// Directory under the base dir holding this category.
    pub fn dir(self) -> &'static str {
        match self {
            AssetCategory::Original => "originals",
            AssetCategory::Processed => "processed",
            AssetCategory::Thumbnail => "cache",
            AssetCategory::Export => "exports",
        }
    }

    /// File name for an asset of this category belonging to `id`.
    ///
    /// Originals are stored byte for byte, including when a stencil is
    /// duplicated, so they keep the extension sniffed from their bytes. The
    /// other categories have a fixed encoding. Exports get a millisecond
    /// timestamp plus a random suffix, so every export gets its own file.
    pub fn file_name(self, id: &str, bytes: &[u8]) -> String {
        match self {
            AssetCategory::Original => format!("{id}.{}", sniff_extension(bytes)),
            AssetCategory::Processed => format!("{id}.png"),
            AssetCategory::Thumbnail => format!("{id}_thumb.jpg"),
            AssetCategory::Export => {
                let nonce = Uuid::new_v4().simple().to_string();
                format!(
                    "{id}_{}_{}.png",
                    Utc::now().timestamp_millis(),
                    &nonce[..8]
                )
            }
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetCategory::Original => "original",
            AssetCategory::Processed => "processed",
            AssetCategory::Thumbnail => "thumbnail",
            AssetCategory::Export => "export",
        };
        f.write_str(label)
    }
}

/// Binary asset storage addressed by logical paths.
pub trait ContentStore: Send + Sync {
    /// Store `bytes` as the `category` asset of stencil `id`, returning the
    /// logical path.
    fn save(&self, category: AssetCategory, id: &str, bytes: &[u8]) -> Result<String, StoreError>;

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove an asset. Missing files are not an error.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Logical paths of every asset in `category`, sorted.
    fn list(&self, category: AssetCategory) -> Result<Vec<String>, StoreError>;

    /// Total bytes per category. Every category is present, zero if empty.
    fn size_by_category(&self) -> Result<BTreeMap<AssetCategory, u64>, StoreError>;

    /// Delete exports older than `max_age`, returning how many went.
    fn prune_expired(&self, max_age: Duration) -> Result<usize, StoreError>;
}

/// [`ContentStore`] over a plain directory tree.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    base: PathBuf,
}

impl FsContentStore {
    /// Open (creating if needed) the asset directories under `base`.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        for category in AssetCategory::ALL {
            fs::create_dir_all(base.join(category.dir()))?;
        }
        debug!(base = %base.display(), "Content store ready");
        Ok(Self { base })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Map a logical path to a filesystem path under the base dir.
    ///
    /// Only plain relative components are accepted.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(logical);
        let plain = !logical.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StoreError::InvalidPath(logical.to_string()));
        }
        Ok(self.base.join(rel))
    }

    fn files_in(&self, category: AssetCategory) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(self.base.join(category.dir()))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable asset entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && !is_temp_file(entry.path()))
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Write via a hidden sibling temp file and rename into place.
fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;
    let tmp = target.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, target).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

impl ContentStore for FsContentStore {
    fn save(&self, category: AssetCategory, id: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let logical = format!("{}/{}", category.dir(), category.file_name(id, bytes));
        let target = self.resolve(&logical)?;
        write_atomic(&target, bytes)?;
        debug!(path = %logical, bytes = bytes.len(), "Saved asset");
        Ok(logical)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        fs::read(&full).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => StoreError::Io(e),
        })
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full) {
            Ok(()) => {
                debug!(path, "Deleted asset");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(path)?.is_file())
    }

    fn list(&self, category: AssetCategory) -> Result<Vec<String>, StoreError> {
        Ok(self
            .files_in(category)
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| format!("{}/{name}", category.dir()))
            })
            .collect())
    }

    fn size_by_category(&self) -> Result<BTreeMap<AssetCategory, u64>, StoreError> {
        let mut sizes = BTreeMap::new();
        for category in AssetCategory::ALL {
            let mut total = 0u64;
            for entry in self.files_in(category) {
                total += entry.metadata().map_err(io::Error::from)?.len();
            }
            sizes.insert(category, total);
        }
        Ok(sizes)
    }

    fn prune_expired(&self, max_age: Duration) -> Result<usize, StoreError> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in self.files_in(AssetCategory::Export) {
            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => modified,
                Ok(Err(e)) => {
                    warn!(path = %entry.path().display(), error = %e, "No modification time; keeping export");
                    continue;
                }
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Unreadable export; keeping it");
                    continue;
                }
            };
            // Files stamped in the future count as fresh.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Failed to delete expired export")
                }
            }
        }
        if removed > 0 {
            debug!(removed, "Pruned expired exports");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsContentStore) {
        let tmp = TempDir::new().unwrap();
        let store = FsContentStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn backdate(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    // =========================================================================
    // Layout and naming
    // =========================================================================

    #[test]
    fn open_creates_category_dirs_idempotently() {
        let tmp = TempDir::new().unwrap();
        FsContentStore::open(tmp.path()).unwrap();
        FsContentStore::open(tmp.path()).unwrap();
        for dir in ["originals", "processed", "exports", "cache"] {
            assert!(tmp.path().join(dir).is_dir(), "{dir} missing");
        }
    }

    #[test]
    fn save_names_files_per_category() {
        let (_tmp, store) = store();
        assert_eq!(
            store.save(AssetCategory::Original, "abc", b"o").unwrap(),
            "originals/abc.bin"
        );
        assert_eq!(
            store.save(AssetCategory::Processed, "abc", b"p").unwrap(),
            "processed/abc.png"
        );
        assert_eq!(
            store.save(AssetCategory::Thumbnail, "abc", b"t").unwrap(),
            "cache/abc_thumb.jpg"
        );
        let export = store.save(AssetCategory::Export, "abc", b"e").unwrap();
        assert!(export.starts_with("exports/abc_"));
        assert!(export.ends_with(".png"));
    }

    #[test]
    fn repeated_exports_get_distinct_files() {
        let (_tmp, store) = store();
        let paths: std::collections::HashSet<String> = (0..20)
            .map(|i| store.save(AssetCategory::Export, "abc", &[i]).unwrap())
            .collect();
        assert_eq!(paths.len(), 20);
        assert_eq!(store.list(AssetCategory::Export).unwrap().len(), 20);
        for path in &paths {
            let name = path.strip_prefix("exports/abc_").unwrap();
            let (millis, rest) = name.split_once('_').unwrap();
            assert!(millis.parse::<i64>().is_ok(), "{path}");
            assert_eq!(rest.len(), "0123abcd.png".len(), "{path}");
        }
    }

    // =========================================================================
    // Read / write / delete
    // =========================================================================

    #[test]
    fn original_keeps_sniffed_extension() {
        let (_tmp, store) = store();
        let png_magic = b"\x89PNG\r\n\x1a\n rest";
        assert_eq!(
            store.save(AssetCategory::Original, "abc", png_magic).unwrap(),
            "originals/abc.png"
        );
    }

    #[test]
    fn save_then_read_returns_bytes() {
        let (_tmp, store) = store();
        let path = store
            .save(AssetCategory::Original, "x", b"payload")
            .unwrap();
        assert_eq!(store.read(&path).unwrap(), b"payload");
    }

    #[test]
    fn save_overwrites_in_place() {
        let (_tmp, store) = store();
        store.save(AssetCategory::Processed, "x", b"one").unwrap();
        let path = store.save(AssetCategory::Processed, "x", b"two").unwrap();
        assert_eq!(store.read(&path).unwrap(), b"two");
        assert_eq!(store.list(AssetCategory::Processed).unwrap().len(), 1);
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_tmp, store) = store();
        assert!(matches!(
            store.read("processed/nope.png"),
            Err(StoreError::NotFound(p)) if p == "processed/nope.png"
        ));
    }

    #[test]
    fn traversal_and_absolute_paths_rejected() {
        let (_tmp, store) = store();
        for bad in ["../secret", "originals/../../x", "/etc/passwd", ""] {
            assert!(
                matches!(store.read(bad), Err(StoreError::InvalidPath(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn delete_is_idempotent() {
        let (_tmp, store) = store();
        let path = store.save(AssetCategory::Thumbnail, "x", b"t").unwrap();
        store.delete(&path).unwrap();
        store.delete(&path).unwrap();
        assert!(!store.exists(&path).unwrap());
    }

    #[test]
    fn list_skips_temp_files() {
        let (tmp, store) = store();
        store.save(AssetCategory::Original, "b", b"1").unwrap();
        store.save(AssetCategory::Original, "a", b"2").unwrap();
        fs::write(tmp.path().join("originals/.c.bin.tmp"), b"partial").unwrap();

        assert_eq!(
            store.list(AssetCategory::Original).unwrap(),
            vec!["originals/a.bin", "originals/b.bin"]
        );
    }

    // =========================================================================
    // Accounting and retention
    // =========================================================================

    #[test]
    fn size_by_category_sums_each_dir() {
        let (_tmp, store) = store();
        store.save(AssetCategory::Original, "a", &[0; 100]).unwrap();
        store.save(AssetCategory::Original, "b", &[0; 50]).unwrap();
        store.save(AssetCategory::Thumbnail, "a", &[0; 7]).unwrap();

        let sizes = store.size_by_category().unwrap();
        assert_eq!(sizes[&AssetCategory::Original], 150);
        assert_eq!(sizes[&AssetCategory::Thumbnail], 7);
        assert_eq!(sizes[&AssetCategory::Processed], 0);
        assert_eq!(sizes[&AssetCategory::Export], 0);
    }

    #[test]
    fn prune_expired_removes_only_old_exports() {
        let (tmp, store) = store();
        let old = store.save(AssetCategory::Export, "old", b"e").unwrap();
        let fresh = store.save(AssetCategory::Export, "fresh", b"e").unwrap();
        let original = store.save(AssetCategory::Original, "old", b"o").unwrap();

        let day = Duration::from_secs(24 * 3600);
        backdate(&tmp.path().join(&old), day * 10);
        backdate(&tmp.path().join(&original), day * 10);

        assert_eq!(store.prune_expired(day * 7).unwrap(), 1);
        assert!(!store.exists(&old).unwrap());
        assert!(store.exists(&fresh).unwrap());
        assert!(store.exists(&original).unwrap());
    }

    #[test]
    fn prune_expired_on_empty_store_is_zero() {
        let (_tmp, store) = store();
        assert_eq!(store.prune_expired(Duration::ZERO).unwrap(), 0);
    }
}
