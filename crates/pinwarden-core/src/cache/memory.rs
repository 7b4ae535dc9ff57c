use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::cache::{
    CacheEntry, CacheKey, CacheResult, CacheTables, ClassificationCache, TagHistoryLog,
    TagObservation,
};
use crate::error::CacheError;

/// Process-lifetime cache. Concurrent readers, one writer at a time.
#[derive(Debug)]
pub struct MemoryCache {
    tables: RwLock<CacheTables>,
    max_observations: usize,
}

impl MemoryCache {
    pub fn new(max_observations: usize) -> Self {
        Self::from_tables(CacheTables::default(), max_observations)
    }

    pub fn from_tables(tables: CacheTables, max_observations: usize) -> Self {
        Self {
            tables: RwLock::new(tables),
            max_observations,
        }
    }

    pub fn snapshot(&self) -> CacheResult<CacheTables> {
        Ok(self.tables.read().map_err(|_| CacheError::Poisoned)?.clone())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl ClassificationCache for MemoryCache {
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> CacheResult<Option<CacheEntry>> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.lookup(key, now))
    }

    fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        tables.insert(entry, Utc::now());
        Ok(())
    }
}

impl TagHistoryLog for MemoryCache {
    fn observations(&self, key: &CacheKey) -> CacheResult<Vec<TagObservation>> {
        let tables = self.tables.read().map_err(|_| CacheError::Poisoned)?;
        Ok(tables.observations(key))
    }

    fn record(&self, key: &CacheKey, commit: &str, at: DateTime<Utc>) -> CacheResult<()> {
        let mut tables = self.tables.write().map_err(|_| CacheError::Poisoned)?;
        tables.observe(key, commit, at, self.max_observations);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::model::{Classification, Reason};
    use chrono::TimeDelta;

    #[test]
    fn put_then_get() {
        let cache = MemoryCache::default();
        let key = CacheKey::new("org", "action", "abc1234");
        let now = Utc::now();
        cache
            .put(CacheEntry::new(
                key.clone(),
                Classification::stable(Reason::IsStableCommit, Some("abc1234".into())),
                TimeDelta::days(30),
                now,
            ))
            .unwrap();

        let hit = cache.get(&key, now).unwrap().expect("cached");
        assert_eq!(hit.classification.reason, Reason::IsStableCommit);
    }

    #[test]
    fn last_write_wins() {
        let cache = MemoryCache::default();
        let key = CacheKey::new("org", "action", "dev");
        let now = Utc::now();
        for reason in [Reason::IsBranch, Reason::TagNotFound] {
            cache
                .put(CacheEntry::new(
                    key.clone(),
                    Classification::mutable(reason, None),
                    TimeDelta::days(1),
                    now,
                ))
                .unwrap();
        }
        assert_eq!(
            cache.get(&key, now).unwrap().unwrap().classification.reason,
            Reason::TagNotFound
        );
    }

    #[test]
    fn record_tracks_distinct_targets() {
        let cache = MemoryCache::default();
        let key = CacheKey::new("org", "action", "v1");
        cache.record(&key, "def5678", Utc::now()).unwrap();
        cache.record(&key, "abc1234", Utc::now()).unwrap();
        assert_eq!(cache.observations(&key).unwrap().len(), 2);
    }
}
