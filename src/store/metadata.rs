//! Stencil metadata persisted as one versioned JSON document.
//!
//! The document lives at `<base>/stencils.json`:
//!
//! ```json
//! { "version": 1, "records": { "<id>": { ...StencilRecord... } } }
//! ```
//!
//! The whole map is held in memory behind a mutex and rewritten (temp file
//! + rename) after every mutation. A missing file is an empty catalog; an
//! unreadable or wrong-version file is an error rather than a silent reset,
//! since this file is the only copy of the metadata.

use super::StoreError;
use crate::types::StencilRecord;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const DOCUMENT_FILENAME: &str = "stencils.json";

/// Bump when the on-disk shape changes incompatibly.
const DOCUMENT_VERSION: u32 = 1;

/// Keyed record storage.
pub trait MetadataStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<StencilRecord>, StoreError>;

    /// Insert or replace the record with `record.id`.
    fn put(&self, record: StencilRecord) -> Result<(), StoreError>;

    /// Remove a record, returning whether it existed.
    fn remove(&self, id: &str) -> Result<bool, StoreError>;

    /// Every record, in no particular order.
    fn all(&self) -> Result<Vec<StencilRecord>, StoreError>;
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Document {
    version: u32,
    records: BTreeMap<String, StencilRecord>,
}

/// [`MetadataStore`] over a single JSON file.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, StencilRecord>>,
}

impl JsonMetadataStore {
    /// Load `<base>/stencils.json`, or start empty if it doesn't exist.
    pub fn open(base: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(base)?;
        let path = base.join(DOCUMENT_FILENAME);
        let records = match fs::read_to_string(&path) {
            Ok(content) => {
                let doc: Document = serde_json::from_str(&content)?;
                if doc.version != DOCUMENT_VERSION {
                    return Err(StoreError::UnsupportedVersion {
                        found: doc.version,
                        expected: DOCUMENT_VERSION,
                    });
                }
                doc.records
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = records.len(), "Metadata loaded");
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, StencilRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Persist `records`. Called with the lock held so writes are serialized.
    fn flush(&self, records: &BTreeMap<String, StencilRecord>) -> Result<(), StoreError> {
        #[derive(serde::Serialize)]
        struct DocumentRef<'a> {
            version: u32,
            records: &'a BTreeMap<String, StencilRecord>,
        }
        let json = serde_json::to_string_pretty(&DocumentRef {
            version: DOCUMENT_VERSION,
            records,
        })?;
        let tmp = self.path.with_file_name(format!(".{DOCUMENT_FILENAME}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn get(&self, id: &str) -> Result<Option<StencilRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn put(&self, record: StencilRecord) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        let id = record.id.clone();
        let previous = records.insert(id.clone(), record);
        if let Err(e) = self.flush(&records) {
            // Keep memory in step with disk.
            match previous {
                Some(prev) => records.insert(id, prev),
                None => records.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.lock()?;
        let Some(removed) = records.remove(id) else {
            return Ok(false);
        };
        if let Err(e) = self.flush(&records) {
            records.insert(removed.id.clone(), removed);
            return Err(e);
        }
        Ok(true)
    }

    fn all(&self) -> Result<Vec<StencilRecord>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::sample_record;
    use tempfile::TempDir;

    #[test]
    fn open_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(tmp.path()).unwrap();
        assert!(store.all().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn put_get_roundtrip_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let record = sample_record("a", "Rose");
        {
            let store = JsonMetadataStore::open(tmp.path()).unwrap();
            store.put(record.clone()).unwrap();
        }
        let reopened = JsonMetadataStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get("a").unwrap(), Some(record));
    }

    #[test]
    fn put_replaces_existing_record() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(tmp.path()).unwrap();
        store.put(sample_record("a", "Rose")).unwrap();
        store.put(sample_record("a", "Renamed")).unwrap();
        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Renamed");
    }

    #[test]
    fn remove_reports_existence() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(tmp.path()).unwrap();
        store.put(sample_record("a", "Rose")).unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn document_is_versioned_camel_case_json() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(tmp.path()).unwrap();
        store.put(sample_record("a", "Rose")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["records"]["a"]["widthCm"], 10.0);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(DOCUMENT_FILENAME), "{ not json").unwrap();
        assert!(matches!(
            JsonMetadataStore::open(tmp.path()),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(DOCUMENT_FILENAME),
            r#"{"version": 99, "records": {}}"#,
        )
        .unwrap();
        assert!(matches!(
            JsonMetadataStore::open(tmp.path()),
            Err(StoreError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = JsonMetadataStore::open(tmp.path()).unwrap();
        store.put(sample_record("a", "Rose")).unwrap();
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["stencils.json"]);
    }
}
