//! JSON-file backed cache.
//!
//! The whole file is loaded on open. Mutations only touch the in-memory
//! tables and mark them dirty; `flush` (called once per scan, and on drop)
//! rewrites the file via a temp file + rename, so a crash never leaves a
//! half-written cache behind. The in-memory tables stay authoritative for the
//! running scan even when a write fails.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, CacheKey, CacheResult, CacheTables, ClassificationCache, TagHistoryLog,
    TagObservation,
};
use crate::error::CacheError;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFileContents {
    format_version: u32,
    #[serde(flatten)]
    tables: CacheTables,
}

#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    tables: RwLock<CacheTables>,
    dirty: AtomicBool,
    max_observations: usize,
}

impl FileCache {
    /// Load `path`, or start empty if it does not exist yet. A file written
    /// by an incompatible format version is discarded.
    pub fn open(path: impl Into<PathBuf>, max_observations: usize) -> CacheResult<Self> {
        let path = path.into();
        let tables = match fs::read(&path) {
            Ok(bytes) => {
                let contents: CacheFileContents = serde_json::from_slice(&bytes)?;
                if contents.format_version == FORMAT_VERSION {
                    contents.tables
                } else {
                    debug!(path = %path.display(), found = contents.format_version, "discarding cache with old format");
                    CacheTables::default()
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheTables::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            tables: RwLock::new(tables),
            dirty: AtomicBool::new(false),
            max_observations,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the tables out if anything changed since the last flush.
    pub fn flush(&self) -> CacheResult<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let tables = match self.tables.read() {
            Ok(t) => t.clone(),
            Err(_) => return Err(CacheError::Poisoned),
        };
        self.persist(tables).inspect_err(|_| self.dirty.store(true, Ordering::Release))
    }

    fn persist(&self, tables: CacheTables) -> CacheResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let contents = CacheFileContents {
            format_version: FORMAT_VERSION,
            tables,
        };
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&contents)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ClassificationCache for FileCache {
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> CacheResult<Option<CacheEntry>> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.lookup(key, now))
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        tables.insert(entry, Utc::now());
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        FileCache::flush(self)
    }
}

impl TagHistoryLog for FileCache {
    fn observations(&self, key: &CacheKey) -> CacheResult<Vec<TagObservation>> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.observations(key))
    }

    fn record(&self, key: &CacheKey, commit: &str, at: DateTime<Utc>) -> CacheResult<()> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        tables.observe(key, commit, at, self.max_observations);
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    fn flush(&self) -> CacheResult<()> {
        FileCache::flush(self)
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        if let Err(e) = FileCache::flush(self) {
            warn!(path = %self.path.display(), "cache flush on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::model::{Classification, Reason};
    use chrono::TimeDelta;
    use tempfile::tempdir;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("cache.json"), 4).unwrap();
        let key = CacheKey::new("org", "action", "v1");
        assert!(cache.get(&key, Utc::now()).unwrap().is_none());
        assert!(cache.observations(&key).unwrap().is_empty());
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let key = CacheKey::new("org", "action", "v1");
        let now = Utc::now();

        {
            let cache = FileCache::open(&path, 4).unwrap();
            cache.record(&key, "def5678", now).unwrap();
            cache
                .put(CacheEntry::new(
                    key.clone(),
                    Classification::stable(Reason::IsStableTag, Some("def5678".into())),
                    TimeDelta::days(3),
                    now,
                ))
                .unwrap();
        }

        let reopened = FileCache::open(&path, 4).unwrap();
        assert_eq!(reopened.observations(&key).unwrap()[0].commit, "def5678");
        assert!(reopened.get(&key, now).unwrap().is_some());
    }

    #[test]
    fn mutations_reach_disk_only_on_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let key = CacheKey::new("org", "action", "v1");

        let cache = FileCache::open(&path, 4).unwrap();
        cache.record(&key, "abc1234", Utc::now()).unwrap();
        cache.record(&key, "def5678", Utc::now()).unwrap();
        assert!(!path.exists());

        cache.flush().unwrap();
        let on_disk = FileCache::open(&path, 4).unwrap();
        assert_eq!(on_disk.observations(&key).unwrap().len(), 2);

        // Clean tables are not rewritten.
        fs::remove_file(&path).unwrap();
        cache.flush().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(FileCache::open(&path, 4), Err(CacheError::Serialize(_))));
    }

    #[test]
    fn old_format_is_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            br#"{"format_version":0,"classifications":{},"tag_history":{"org/a@v1":[]}}"#,
        )
        .unwrap();
        let cache = FileCache::open(&path, 4).unwrap();
        assert!(cache.snapshot_is_empty());
    }

    impl FileCache {
        fn snapshot_is_empty(&self) -> bool {
            let t = self.tables.read().unwrap();
            t.classifications.is_empty() && t.tag_history.is_empty()
        }
    }
}
