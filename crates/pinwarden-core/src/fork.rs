//! Fork resolution.
//!
//! A reference into a fork can only be repointed at the upstream repository
//! when the pinned commit provably exists upstream; otherwise the fork may
//! carry behavior the upstream never had.

use std::sync::Arc;

use tracing::debug;

use crate::error::OptionalExt;
use crate::provider::{HostingProvider, ProviderResult, RepoName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub is_fork: bool,
    /// Parent repository; `None` when not a fork.
    pub repo: Option<RepoName>,
}

impl Upstream {
    fn none() -> Self {
        Self {
            is_fork: false,
            repo: None,
        }
    }
}

pub struct ForkResolver {
    provider: Arc<dyn HostingProvider>,
}

impl ForkResolver {
    pub fn new(provider: Arc<dyn HostingProvider>) -> Self {
        Self { provider }
    }

    /// One metadata query. A repository the provider does not know is
    /// treated as not being a fork.
    pub async fn resolve_upstream(&self, owner: &str, repo: &str) -> ProviderResult<Upstream> {
        let Some(meta) = self.provider.get_repository(owner, repo).await.found()? else {
            return Ok(Upstream::none());
        };

        match (meta.fork, meta.parent) {
            (true, Some(parent)) => {
                debug!(owner, repo, upstream = %parent, "repository is a fork");
                Ok(Upstream {
                    is_fork: true,
                    repo: Some(parent),
                })
            }
            _ => Ok(Upstream::none()),
        }
    }

    /// Whether `commit` is reachable from the upstream's default branch.
    pub async fn is_commit_in_upstream(
        &self,
        upstream_owner: &str,
        upstream_repo: &str,
        commit: &str,
    ) -> ProviderResult<bool> {
        let Some(branch) = self
            .provider
            .get_default_branch(upstream_owner, upstream_repo)
            .await
            .found()?
        else {
            return Ok(false);
        };

        let contained = self
            .provider
            .is_ancestor(upstream_owner, upstream_repo, commit, &branch)
            .await
            .found()?
            .unwrap_or(false);
        debug!(upstream_owner, upstream_repo, commit, contained, "upstream containment");
        Ok(contained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;

    fn setup() -> (Arc<FakeProvider>, ForkResolver) {
        let fake = Arc::new(FakeProvider::new());
        fake.add_repo("org", "action", "main", "aaaaaaa1")
            .add_commit("org", "action", "abcdef1234")
            .add_repo("fork-owner", "action", "main", "bbbbbbb2")
            .set_fork("fork-owner", "action", "org", "action");
        (fake.clone(), ForkResolver::new(fake))
    }

    #[tokio::test]
    async fn fork_reports_parent() {
        let (_, forks) = setup();
        let up = forks.resolve_upstream("fork-owner", "action").await.unwrap();
        assert!(up.is_fork);
        assert_eq!(up.repo, Some(RepoName::new("org", "action")));
    }

    #[tokio::test]
    async fn non_fork_and_unknown_repos() {
        let (_, forks) = setup();
        assert!(!forks.resolve_upstream("org", "action").await.unwrap().is_fork);
        assert!(!forks.resolve_upstream("nobody", "nothing").await.unwrap().is_fork);
    }

    #[tokio::test]
    async fn containment_checks_upstream_history() {
        let (_, forks) = setup();
        assert!(forks.is_commit_in_upstream("org", "action", "abcdef1").await.unwrap());
        assert!(!forks.is_commit_in_upstream("org", "action", "bbbbbbb").await.unwrap());
    }

    #[tokio::test]
    async fn resolve_upstream_is_a_single_query() {
        let (fake, forks) = setup();
        fake.reset_calls();
        forks.resolve_upstream("fork-owner", "action").await.unwrap();
        assert_eq!(fake.call_count(), 1);
    }
}
