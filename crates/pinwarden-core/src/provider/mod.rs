//! Hosting provider abstraction.
//!
//! The classifier, fork resolver and checks all talk to the hosting provider
//! through one injected `Arc<dyn HostingProvider>`. Implementations:
//! - `github::GitHubClient`: GitHub REST v3 over reqwest
//! - `fake::FakeProvider`: in-memory, call-counting, for tests

pub mod fake;
pub mod github;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// `owner/name` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata needed by the classifier and fork resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub fork: bool,
    /// Direct parent when `fork` is true.
    pub parent: Option<RepoName>,
}

/// Kind of git object a ref or tag object points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitObjectKind {
    Commit,
    /// Annotated tag object; must be dereferenced to reach a commit.
    Tag,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitObject {
    pub sha: String,
    pub kind: GitObjectKind,
}

impl GitObject {
    pub fn commit(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            kind: GitObjectKind::Commit,
        }
    }

    pub fn tag(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            kind: GitObjectKind::Tag,
        }
    }
}

/// Capability surface consumed from the hosting provider.
///
/// Every method distinguishes `ProviderError::NotFound` (an answer) from the
/// retryable and unexpected failures (no answer).
#[async_trait]
pub trait HostingProvider: Send + Sync {
    async fn get_repository(&self, owner: &str, repo: &str) -> ProviderResult<Repository>;

    async fn get_default_branch(&self, owner: &str, repo: &str) -> ProviderResult<String> {
        Ok(self.get_repository(owner, repo).await?.default_branch)
    }

    /// Head commit of `branch`.
    async fn get_branch_head(&self, owner: &str, repo: &str, branch: &str)
    -> ProviderResult<String>;

    /// Object the tag ref points at: a commit for lightweight tags, a tag
    /// object for annotated ones.
    async fn get_tag(&self, owner: &str, repo: &str, tag: &str) -> ProviderResult<GitObject>;

    /// Target of an annotated tag object.
    async fn get_tag_target_commit(
        &self,
        owner: &str,
        repo: &str,
        tag_object_sha: &str,
    ) -> ProviderResult<GitObject>;

    /// Full sha of a commit given a full or abbreviated id.
    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> ProviderResult<String>;

    /// Whether `commit` is reachable from `branch` of `owner/repo`.
    async fn is_ancestor(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        branch: &str,
    ) -> ProviderResult<bool>;
}
