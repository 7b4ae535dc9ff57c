//! Scan pipeline.
//!
//! For each enabled check, in priority order: re-parse the current text,
//! detect against the fresh parse, apply that check's remediations. Any
//! failure aborts the scan with the phase and check that failed.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::cache::{ClassificationCache, ExpiryPolicy, FileCache, MemoryCache, TagHistoryLog};
use crate::checks::{CheckContext, CheckId, CheckRegistry, Issue};
use crate::classify::Classifier;
use crate::config::{CacheConfig, ScanConfig};
use crate::error::ScanError;
use crate::fork::ForkResolver;
use crate::provider::github::GitHubClient;
use crate::provider::{HostingProvider, ProviderResult};
use crate::remediate;
use crate::workflow::WorkflowDocument;

/// Result of one scan pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub original: String,
    pub remediated: String,
    /// Issues from every check, in execution order.
    pub issues: Vec<Issue>,
}

impl ScanOutcome {
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn changed(&self) -> bool {
        self.original != self.remediated
    }
}

pub struct Scanner {
    registry: CheckRegistry,
    ctx: CheckContext,
    enabled: Vec<CheckId>,
}

impl Scanner {
    pub fn new(registry: CheckRegistry, ctx: CheckContext) -> Self {
        let enabled = registry.ids();
        Self {
            registry,
            ctx,
            enabled,
        }
    }

    /// GitHub-backed scanner with the configured cache.
    pub fn from_config(config: &ScanConfig) -> ProviderResult<Self> {
        let provider = Arc::new(GitHubClient::new(&config.provider)?);
        Ok(Self::with_provider(provider, config))
    }

    pub fn with_provider(provider: Arc<dyn HostingProvider>, config: &ScanConfig) -> Self {
        let (cache, tags) = open_cache(&config.cache);
        let classifier = Classifier::new(
            provider.clone(),
            cache,
            tags,
            ExpiryPolicy::from_config(&config.cache),
        );
        let ctx = CheckContext::new(
            Arc::new(classifier),
            ForkResolver::new(provider),
            config.detection.concurrency,
        );
        Self::new(CheckRegistry::default(), ctx)
    }

    /// Restrict the scan to the named checks. An empty list enables all.
    pub fn enable_checks<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ScanError> {
        if names.is_empty() {
            self.enabled = self.registry.ids();
            return Ok(());
        }

        let mut enabled = Vec::with_capacity(names.len());
        for name in names {
            let id: CheckId = name.as_ref().parse()?;
            if self.registry.get(id).is_none() {
                return Err(ScanError::UnknownCheck(name.as_ref().to_string()));
            }
            enabled.push(id);
        }
        enabled.sort();
        enabled.dedup();
        self.enabled = enabled;
        Ok(())
    }

    pub fn enabled(&self) -> &[CheckId] {
        &self.enabled
    }

    /// Run every enabled check over `text`. The cache is flushed once at the
    /// end, whether or not the scan succeeded.
    #[instrument(skip_all, fields(checks = self.enabled.len(), bytes = text.len()))]
    pub async fn scan(&self, text: &str) -> Result<ScanOutcome, ScanError> {
        let result = self.run_checks(text).await;
        self.ctx.classifier.flush_cache();
        result
    }

    async fn run_checks(&self, text: &str) -> Result<ScanOutcome, ScanError> {
        let mut current = text.to_string();
        let mut issues = Vec::new();

        for &id in &self.enabled {
            let Some(check) = self.registry.get(id) else {
                continue;
            };

            let doc = WorkflowDocument::parse(&current)
                .map_err(|source| ScanError::Parse { check: id, source })?;

            let found = check
                .detect(&doc, &self.ctx)
                .await
                .map_err(|source| ScanError::Detect { check: id, source })?;

            current = remediate::apply(check, &current, &found)
                .map_err(|source| ScanError::Remediate { check: id, source })?;

            info!(check = %id, issues = found.len(), "check complete");
            issues.extend(found);
        }

        Ok(ScanOutcome {
            original: text.to_string(),
            remediated: current,
            issues,
        })
    }
}

/// Both cache tables share one backing store. An unreadable cache file is
/// replaced by an in-memory cache for this run.
fn open_cache(config: &CacheConfig) -> (Arc<dyn ClassificationCache>, Arc<dyn TagHistoryLog>) {
    if let Some(path) = &config.path {
        match FileCache::open(path, config.max_tag_observations) {
            Ok(file) => {
                let file = Arc::new(file);
                return (file.clone(), file);
            }
            Err(e) => warn!(path = %path.display(), "cache unavailable, using memory: {e}"),
        }
    }
    let memory = Arc::new(MemoryCache::new(config.max_tag_observations));
    (memory.clone(), memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;

    fn config() -> ScanConfig {
        let mut config = ScanConfig::default();
        config.cache.path = None;
        config
    }

    fn scanner(fake: Arc<FakeProvider>) -> Scanner {
        Scanner::with_provider(fake, &config())
    }

    #[test]
    fn all_checks_enabled_by_default() {
        let s = scanner(Arc::new(FakeProvider::new()));
        assert_eq!(s.enabled(), CheckId::ALL.as_slice());
    }

    #[test]
    fn enabling_sorts_into_priority_order() {
        let mut s = scanner(Arc::new(FakeProvider::new()));
        s.enable_checks(&["outdated-action", "unfork-action", "outdated-action"])
            .unwrap();
        assert_eq!(s.enabled(), &[CheckId::UnforkAction, CheckId::OutdatedAction]);

        s.enable_checks::<&str>(&[]).unwrap();
        assert_eq!(s.enabled().len(), 4);
    }

    #[test]
    fn unknown_check_is_rejected() {
        let mut s = scanner(Arc::new(FakeProvider::new()));
        let err = s.enable_checks(&["unstable-everything"]).unwrap_err();
        assert!(matches!(err, ScanError::UnknownCheck(ref n) if n == "unstable-everything"));
    }

    #[tokio::test]
    async fn invalid_document_names_the_first_check() {
        let s = scanner(Arc::new(FakeProvider::new()));
        let err = s.scan("jobs: [").await.unwrap_err();
        assert!(matches!(err, ScanError::Parse { check: CheckId::UnforkAction, .. }));
    }

    #[tokio::test]
    async fn clean_document_is_unchanged() {
        let s = scanner(Arc::new(FakeProvider::new()));
        let text = "jobs:\n  a:\n    steps:\n      - uses: ./local\n      - uses: docker://node:20\n";
        let outcome = s.scan(text).await.unwrap();
        assert!(!outcome.has_issues());
        assert!(!outcome.changed());
    }

    #[test]
    fn unreadable_cache_file_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut cfg = config();
        cfg.cache.path = Some(path);
        let (cache, _) = open_cache(&cfg.cache);
        let key = crate::cache::CacheKey::new("o", "r", "v");
        assert!(cache.get(&key, chrono::Utc::now()).unwrap().is_none());
    }
}
