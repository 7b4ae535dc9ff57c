//! Two-tier classification cache.
//!
//! Two separate key spaces with different lifecycles:
//! - `ClassificationCache`: current verdict per (owner, repo, version), with
//!   per-entry expiry. Expired entries are treated as absent.
//! - `TagHistoryLog`: every distinct target commit observed for a tag. Never
//!   expires; this is the only cross-run memory and is what lets a re-pointed
//!   tag be detected after the fact.
//!
//! Both are implemented over [`CacheTables`]; `memory::MemoryCache` keeps the
//! tables for one process, `file::FileCache` persists them as JSON.
//!
//! Failures surface as `CacheError` and are logged by callers, never
//! propagated out of a scan.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::model::Classification;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::reference::model::same_commit;

pub use file::FileCache;
pub use memory::MemoryCache;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// `(owner, repo, version)`; for the tag-history log `version` is the tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub owner: String,
    pub repo: String,
    pub version: String,
}

impl CacheKey {
    pub fn new(owner: &str, repo: &str, version: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            version: version.to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub classification: Classification,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: CacheKey, classification: Classification, ttl: TimeDelta, now: DateTime<Utc>) -> Self {
        Self {
            key,
            classification,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// One distinct target commit seen for a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObservation {
    pub commit: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// TTL selection: verdicts that went through a tag can be invalidated by the
/// tag moving, so they expire sooner.
#[derive(Debug, Clone)]
pub struct ExpiryPolicy {
    pub tag_ttl: TimeDelta,
    pub default_ttl: TimeDelta,
}

impl ExpiryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            tag_ttl: config.tag_ttl(),
            default_ttl: config.default_ttl(),
        }
    }

    pub fn ttl(&self, via_tag: bool) -> TimeDelta {
        if via_tag {
            self.tag_ttl
        } else {
            self.default_ttl
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

pub trait ClassificationCache: Send + Sync {
    /// Unexpired entry for `key`, if any.
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> CacheResult<Option<CacheEntry>>;

    /// Insert or overwrite; last write wins.
    fn put(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Persist pending writes. No-op for stores without a backing file.
    fn flush(&self) -> CacheResult<()> {
        Ok(())
    }
}

pub trait TagHistoryLog: Send + Sync {
    /// Distinct targets previously observed for the tag, oldest first.
    fn observations(&self, key: &CacheKey) -> CacheResult<Vec<TagObservation>>;

    fn record(&self, key: &CacheKey, commit: &str, at: DateTime<Utc>) -> CacheResult<()>;

    fn flush(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Storage-agnostic contents of both cache tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTables {
    pub classifications: BTreeMap<String, CacheEntry>,
    pub tag_history: BTreeMap<String, Vec<TagObservation>>,
}

impl CacheTables {
    pub fn lookup(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.classifications
            .get(&key.to_string())
            .filter(|e| e.key == *key && !e.is_expired(now))
            .cloned()
    }

    /// Insert `entry`, dropping every entry already expired at `now`.
    pub fn insert(&mut self, entry: CacheEntry, now: DateTime<Utc>) {
        self.classifications.retain(|_, e| !e.is_expired(now));
        self.classifications.insert(entry.key.to_string(), entry);
    }

    pub fn observations(&self, key: &CacheKey) -> Vec<TagObservation> {
        self.tag_history
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Record `commit` as seen for the tag at `at`. A commit already in the
    /// log is refreshed and moved to the end; at most `max` distinct commits
    /// are kept, oldest dropped first.
    pub fn observe(&mut self, key: &CacheKey, commit: &str, at: DateTime<Utc>, max: usize) {
        let log = self.tag_history.entry(key.to_string()).or_default();

        let first_seen = match log.iter().position(|o| same_commit(&o.commit, commit)) {
            Some(idx) => log.remove(idx).first_seen,
            None => at,
        };
        log.push(TagObservation {
            commit: commit.to_string(),
            first_seen,
            last_seen: at,
        });

        let excess = log.len().saturating_sub(max.max(1));
        log.drain(..excess);
    }
}
