//! Scan configuration.
//!
//! Defaults are read from the environment; the CLI overrides individual
//! fields from flags.

use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    /// Upper bound on any single wait, including provider-requested ones.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after `attempt` failed attempts.
    pub fn backoff(&self, attempt: u32, requested_secs: Option<u64>) -> Duration {
        let ms = match requested_secs {
            Some(secs) => secs.saturating_mul(1000),
            None => self.base_backoff_ms.saturating_mul(attempt as u64),
        };
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("PINWARDEN_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            user_agent: format!("pinwarden/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Expiry policy for the classification cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// JSON file backing both cache tables. `None` keeps the cache in memory
    /// for the lifetime of the process.
    pub path: Option<PathBuf>,
    /// TTL for verdicts resolved through a tag.
    pub tag_ttl_hours: i64,
    /// TTL for every other verdict.
    pub default_ttl_hours: i64,
    /// Distinct targets remembered per tag.
    pub max_tag_observations: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: std::env::var_os("PINWARDEN_CACHE").map(PathBuf::from),
            tag_ttl_hours: 24 * 3,
            default_ttl_hours: 24 * 30,
            max_tag_observations: 16,
        }
    }
}

impl CacheConfig {
    pub fn tag_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.tag_ttl_hours)
    }

    pub fn default_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.default_ttl_hours)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Max references classified concurrently within one check.
    pub concurrency: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_are_three_and_thirty_days() {
        let c = CacheConfig::default();
        assert_eq!(c.tag_ttl(), TimeDelta::days(3));
        assert_eq!(c.default_ttl(), TimeDelta::days(30));
    }

    #[test]
    fn backoff_grows_linearly_and_is_capped() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_backoff_ms: 100,
            max_backoff_ms: 250,
        };
        assert_eq!(p.backoff(1, None), Duration::from_millis(100));
        assert_eq!(p.backoff(2, None), Duration::from_millis(200));
        assert_eq!(p.backoff(3, None), Duration::from_millis(250));
        assert_eq!(p.backoff(1, Some(3600)), Duration::from_millis(250));
    }

    #[test]
    fn token_is_never_serialized() {
        let mut c = ProviderConfig::default();
        c.token = Some("secret".into());
        let json = serde_json::to_string(&c).unwrap();
        assert!(!json.contains("secret"));
    }
}
