//! Reference classifier.
//!
//! State machine deciding whether an action reference is immutable:
//!
//!   local path                      → STABLE   (no provider calls)
//!   no version                      → MUTABLE  no_specified_version
//!   existing master / main branch   → MUTABLE  is_default_branch (never cached)
//!   unexpired cache entry           → cached verdict
//!   tag, target seen moving before  → MUTABLE  unstable_tag_history
//!   tag                             → STABLE   is_stable_tag
//!   repository's default branch     → MUTABLE  is_default_branch
//!   other branch                    → MUTABLE  is_branch
//!   commit                          → STABLE   is_stable_commit
//!   nothing                         → MUTABLE  tag_not_found
//!
//! Cache hits for STABLE verdicts cost zero provider calls. Cached MUTABLE
//! verdicts re-resolve their branch head / tag target so remediations always
//! pin to the current commit.
//!
//! Cache and tag-history failures are logged and never abort classification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheKey, ClassificationCache, ExpiryPolicy, TagHistoryLog};
use crate::classify::model::{Classification, Reason};
use crate::classify::resolve::{self, Resolution};
use crate::error::OptionalExt;
use crate::provider::{HostingProvider, ProviderResult};
use crate::reference::model::{ActionReference, Reference, same_commit};

/// Branch names treated as a repository's primary branch without looking up
/// its configured default, as long as the branch exists.
pub const DEFAULT_BRANCH_NAMES: [&str; 2] = ["master", "main"];

pub struct Classifier {
    provider: Arc<dyn HostingProvider>,
    cache: Arc<dyn ClassificationCache>,
    tags: Arc<dyn TagHistoryLog>,
    expiry: ExpiryPolicy,
}

impl Classifier {
    pub fn new(
        provider: Arc<dyn HostingProvider>,
        cache: Arc<dyn ClassificationCache>,
        tags: Arc<dyn TagHistoryLog>,
        expiry: ExpiryPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            tags,
            expiry,
        }
    }

    pub fn provider(&self) -> &dyn HostingProvider {
        self.provider.as_ref()
    }

    /// Classify any parsed reference. Container images are judged by their
    /// tag elsewhere and yield `None`.
    pub async fn classify_reference(
        &self,
        reference: &Reference,
    ) -> ProviderResult<Option<Classification>> {
        match reference {
            Reference::Local { .. } => Ok(Some(Classification::stable(Reason::LocalPath, None))),
            Reference::Action(action) => self.classify(action).await.map(Some),
            Reference::Container(_) => Ok(None),
        }
    }

    pub async fn classify(&self, action: &ActionReference) -> ProviderResult<Classification> {
        let (owner, repo, version) = (&action.owner, &action.repo, &action.version);

        if !action.has_version() {
            let head = self.default_branch_head(owner, repo).await?;
            return Ok(Classification::mutable(Reason::NoSpecifiedVersion, head));
        }

        if DEFAULT_BRANCH_NAMES.contains(&version.as_str()) {
            if let Some(head) = self
                .provider
                .get_branch_head(owner, repo, version)
                .await
                .found()?
            {
                return Ok(Classification::mutable(Reason::IsDefaultBranch, Some(head)));
            }
            debug!(owner, repo, version, "no branch by that name, resolving as a ref");
        }

        let key = CacheKey::new(owner, repo, version);
        let now = Utc::now();

        match self.cache.get(&key, now) {
            Ok(Some(entry)) => {
                debug!(%key, reason = ?entry.classification.reason, "classification cache hit");
                return self.refresh(action, entry.classification).await;
            }
            Ok(None) => debug!(%key, "classification cache miss"),
            Err(e) => warn!(%key, "classification cache read failed: {e}"),
        }

        let classification = self.classify_uncached(action, &key, now).await?;

        let ttl = self.expiry.ttl(classification.reason.via_tag());
        if let Err(e) = self
            .cache
            .put(CacheEntry::new(key.clone(), classification.clone(), ttl, now))
        {
            // Not fatal, but every later scan will pay the provider calls again.
            warn!(%key, "classification cache write failed: {e}");
        }

        Ok(classification)
    }

    /// Persist both cache tables. Failures are logged only.
    pub fn flush_cache(&self) {
        if let Err(e) = self.cache.flush() {
            warn!("classification cache flush failed: {e}");
        }
        if let Err(e) = self.tags.flush() {
            warn!("tag history flush failed: {e}");
        }
    }

    /// Resolve a version token without classifying it.
    pub async fn resolve(&self, owner: &str, repo: &str, token: &str) -> ProviderResult<Resolution> {
        resolve::resolve(self.provider.as_ref(), owner, repo, token).await
    }

    async fn classify_uncached(
        &self,
        action: &ActionReference,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> ProviderResult<Classification> {
        let resolution = self.resolve(&action.owner, &action.repo, &action.version).await?;

        Ok(match resolution {
            Resolution::Tag { commit } => {
                if self.tag_has_moved(key, &commit, now) {
                    Classification::mutable(Reason::UnstableTagHistory, Some(commit))
                } else {
                    Classification::stable(Reason::IsStableTag, Some(commit))
                }
            }
            Resolution::Branch { commit } => {
                let default = self
                    .provider
                    .get_default_branch(&action.owner, &action.repo)
                    .await
                    .found()?;
                let reason = if default.as_deref() == Some(action.version.as_str()) {
                    Reason::IsDefaultBranch
                } else {
                    Reason::IsBranch
                };
                Classification::mutable(reason, Some(commit))
            }
            Resolution::Commit { commit } => {
                Classification::stable(Reason::IsStableCommit, Some(commit))
            }
            Resolution::NotFound => Classification::mutable(Reason::TagNotFound, None),
        })
    }

    /// Compare `commit` with every target previously logged for the tag, then
    /// log it.
    fn tag_has_moved(&self, key: &CacheKey, commit: &str, now: DateTime<Utc>) -> bool {
        let moved = match self.tags.observations(key) {
            Ok(seen) => seen.iter().any(|o| !same_commit(&o.commit, commit)),
            Err(e) => {
                warn!(%key, "tag history read failed: {e}");
                false
            }
        };

        if let Err(e) = self.tags.record(key, commit, now) {
            warn!(%key, "tag history write failed: {e}");
        }

        if moved {
            debug!(%key, commit, "tag target differs from logged history");
        }
        moved
    }

    async fn refresh(
        &self,
        action: &ActionReference,
        cached: Classification,
    ) -> ProviderResult<Classification> {
        let current = match cached.reason {
            Reason::IsBranch | Reason::IsDefaultBranch => {
                self.provider
                    .get_branch_head(&action.owner, &action.repo, &action.version)
                    .await
                    .found()?
            }
            Reason::UnstableTagHistory => {
                resolve::resolve_tag(
                    self.provider.as_ref(),
                    &action.owner,
                    &action.repo,
                    &action.version,
                )
                .await?
            }
            _ => return Ok(cached),
        };

        let commit = current.or_else(|| cached.resolved_commit.clone());
        Ok(cached.with_resolved(commit))
    }

    async fn default_branch_head(&self, owner: &str, repo: &str) -> ProviderResult<Option<String>> {
        let Some(branch) = self.provider.get_default_branch(owner, repo).await.found()? else {
            return Ok(None);
        };
        self.provider
            .get_branch_head(owner, repo, &branch)
            .await
            .found()
    }
}

/// Pinned textual form of `action` for a classification, when it resolved.
pub fn immutable_form(action: &ActionReference, classification: &Classification) -> Option<String> {
    classification
        .resolved_commit
        .as_deref()
        .map(|commit| action.pinned_to(commit))
}
