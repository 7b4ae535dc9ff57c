//! Check pipeline.
//!
//! Checks are registered by `CheckId` and always run in the fixed order of
//! that enum, each against a fresh parse of the text produced by the
//! previous check's remediation.

pub mod issue;
pub mod outdated_action;
pub mod unfork_action;
pub mod unstable_docker_tag;
pub mod unstable_github_ref;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;
use crate::error::{RemediationError, ScanError};
use crate::fork::ForkResolver;
use crate::provider::{HostingProvider, ProviderResult};
use crate::remediate;
use crate::workflow::WorkflowDocument;

pub use issue::{Issue, Remediation};

/// Registered checks. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckId {
    UnforkAction,
    UnstableDockerTag,
    UnstableGithubRef,
    OutdatedAction,
}

impl CheckId {
    pub const ALL: [CheckId; 4] = [
        CheckId::UnforkAction,
        CheckId::UnstableDockerTag,
        CheckId::UnstableGithubRef,
        CheckId::OutdatedAction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckId::UnforkAction => "unfork-action",
            CheckId::UnstableDockerTag => "unstable-docker-tag",
            CheckId::UnstableGithubRef => "unstable-github-ref",
            CheckId::OutdatedAction => "outdated-action",
        }
    }
}

impl std::fmt::Display for CheckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckId {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ScanError::UnknownCheck(s.to_string()))
    }
}

/// Shared services handed to every check.
pub struct CheckContext {
    pub classifier: Arc<Classifier>,
    pub forks: ForkResolver,
    /// Max references examined concurrently within one check.
    pub concurrency: usize,
}

impl CheckContext {
    pub fn new(classifier: Arc<Classifier>, forks: ForkResolver, concurrency: usize) -> Self {
        Self {
            classifier,
            forks,
            concurrency: concurrency.max(1),
        }
    }

    pub fn provider(&self) -> &dyn HostingProvider {
        self.classifier.provider()
    }

    /// Drive per-site inspections with bounded concurrency. Issues come
    /// back in document order; the first error cancels the rest.
    pub async fn inspect_sites<'a>(
        &self,
        inspections: Vec<SiteInspection<'a>>,
    ) -> ProviderResult<Vec<Issue>> {
        let found: Vec<Option<Issue>> = stream::iter(inspections)
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(found.into_iter().flatten().collect())
    }
}

/// Boxed inspection of one `uses` site.
pub type SiteInspection<'a> = BoxFuture<'a, ProviderResult<Option<Issue>>>;

#[async_trait]
pub trait Check: Send + Sync {
    fn id(&self) -> CheckId;

    async fn detect(&self, doc: &WorkflowDocument, ctx: &CheckContext) -> ProviderResult<Vec<Issue>>;

    /// Apply one issue's substitution to `text`. Issues without a
    /// remediation leave the text untouched.
    fn remediate(&self, text: &str, issue: &Issue) -> Result<String, RemediationError> {
        match issue.remediable() {
            Some(r) => remediate::replace_on_line(text, issue.line_number, &r.original, &r.replacement),
            None => Ok(text.to_string()),
        }
    }
}

pub struct CheckRegistry {
    checks: BTreeMap<CheckId, Box<dyn Check>>,
}

impl CheckRegistry {
    pub fn empty() -> Self {
        Self {
            checks: BTreeMap::new(),
        }
    }

    /// Replaces any check already registered under the same id.
    pub fn register(&mut self, check: Box<dyn Check>) {
        self.checks.insert(check.id(), check);
    }

    pub fn get(&self, id: CheckId) -> Option<&dyn Check> {
        self.checks.get(&id).map(|c| c.as_ref())
    }

    pub fn ids(&self) -> Vec<CheckId> {
        self.checks.keys().copied().collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(unfork_action::UnforkAction));
        registry.register(Box::new(unstable_docker_tag::UnstableDockerTag));
        registry.register(Box::new(unstable_github_ref::UnstableGithubRef));
        registry.register(Box::new(outdated_action::OutdatedAction));
        registry
    }
}
