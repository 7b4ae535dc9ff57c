//! In-memory hosting provider (testing only)
//!
//! Models repositories, branches, lightweight and annotated tags, commits and
//! forks. Every trait call is logged so tests can assert on provider traffic.
//! All setters take `&self` so state can change between scans (e.g. a tag
//! being re-pointed).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::provider::{GitObject, GitObjectKind, HostingProvider, ProviderResult, RepoName, Repository};
use crate::reference::model::same_commit;

#[derive(Debug, Clone, Default)]
struct FakeRepo {
    default_branch: String,
    parent: Option<RepoName>,
    branches: HashMap<String, String>,
    tags: HashMap<String, GitObject>,
    tag_objects: HashMap<String, GitObject>,
    /// Commits reachable from the default branch.
    commits: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    repos: HashMap<(String, String), FakeRepo>,
    failure: Option<ProviderError>,
}

#[derive(Debug, Default)]
pub struct FakeProvider {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_repo<R>(&self, owner: &str, repo: &str, f: impl FnOnce(&mut FakeRepo) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .repos
            .entry((owner.to_string(), repo.to_string()))
            .or_insert_with(|| FakeRepo {
                default_branch: "main".to_string(),
                ..Default::default()
            });
        f(entry)
    }

    /// Register a repository with its default branch pointing at `head`.
    pub fn add_repo(&self, owner: &str, repo: &str, default_branch: &str, head: &str) -> &Self {
        self.with_repo(owner, repo, |r| {
            r.default_branch = default_branch.to_string();
            r.branches.insert(default_branch.to_string(), head.to_string());
            r.commits.push(head.to_string());
        });
        self
    }

    /// Create or move a branch.
    pub fn set_branch(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> &Self {
        self.with_repo(owner, repo, |r| {
            r.branches.insert(branch.to_string(), sha.to_string());
        });
        self
    }

    /// Create or move a lightweight tag.
    pub fn set_tag(&self, owner: &str, repo: &str, tag: &str, sha: &str) -> &Self {
        self.with_repo(owner, repo, |r| {
            r.tags.insert(tag.to_string(), GitObject::commit(sha));
        });
        self
    }

    /// Create or move an annotated tag whose tag object points at `sha`.
    pub fn set_annotated_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
        tag_object_sha: &str,
        sha: &str,
    ) -> &Self {
        self.with_repo(owner, repo, |r| {
            r.tags
                .insert(tag.to_string(), GitObject::tag(tag_object_sha));
            r.tag_objects
                .insert(tag_object_sha.to_string(), GitObject::commit(sha));
        });
        self
    }

    /// Add a commit reachable from the default branch.
    pub fn add_commit(&self, owner: &str, repo: &str, sha: &str) -> &Self {
        self.with_repo(owner, repo, |r| r.commits.push(sha.to_string()));
        self
    }

    pub fn set_fork(&self, owner: &str, repo: &str, parent_owner: &str, parent_repo: &str) -> &Self {
        self.with_repo(owner, repo, |r| {
            r.parent = Some(RepoName::new(parent_owner, parent_repo));
        });
        self
    }

    /// Make every subsequent call fail with `err`.
    pub fn fail_with(&self, err: ProviderError) {
        self.state.lock().unwrap().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().failure = None;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, call: String) -> ProviderResult<()> {
        self.calls.lock().unwrap().push(call);
        match &self.state.lock().unwrap().failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn repo(&self, owner: &str, repo: &str) -> ProviderResult<FakeRepo> {
        self.state
            .lock()
            .unwrap()
            .repos
            .get(&(owner.to_string(), repo.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("{owner}/{repo}")))
    }
}

#[async_trait]
impl HostingProvider for FakeProvider {
    async fn get_repository(&self, owner: &str, repo: &str) -> ProviderResult<Repository> {
        self.enter(format!("get_repository {owner}/{repo}"))?;
        let r = self.repo(owner, repo)?;
        Ok(Repository {
            owner: owner.to_string(),
            name: repo.to_string(),
            default_branch: r.default_branch,
            fork: r.parent.is_some(),
            parent: r.parent,
        })
    }

    async fn get_branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ProviderResult<String> {
        self.enter(format!("get_branch_head {owner}/{repo} {branch}"))?;
        self.repo(owner, repo)?
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("branch {branch}")))
    }

    async fn get_tag(&self, owner: &str, repo: &str, tag: &str) -> ProviderResult<GitObject> {
        self.enter(format!("get_tag {owner}/{repo} {tag}"))?;
        self.repo(owner, repo)?
            .tags
            .get(tag)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("tag {tag}")))
    }

    async fn get_tag_target_commit(
        &self,
        owner: &str,
        repo: &str,
        tag_object_sha: &str,
    ) -> ProviderResult<GitObject> {
        self.enter(format!("get_tag_target_commit {owner}/{repo} {tag_object_sha}"))?;
        self.repo(owner, repo)?
            .tag_objects
            .get(tag_object_sha)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("tag object {tag_object_sha}")))
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> ProviderResult<String> {
        self.enter(format!("get_commit {owner}/{repo} {sha}"))?;
        let r = self.repo(owner, repo)?;
        r.commits
            .iter()
            .chain(r.branches.values())
            .chain(r.tags.values().filter(|o| o.kind == GitObjectKind::Commit).map(|o| &o.sha))
            .chain(r.tag_objects.values().map(|o| &o.sha))
            .find(|full| sha.len() >= 4 && same_commit(full, sha))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("commit {sha}")))
    }

    async fn is_ancestor(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        branch: &str,
    ) -> ProviderResult<bool> {
        self.enter(format!("is_ancestor {owner}/{repo} {commit} {branch}"))?;
        let r = self.repo(owner, repo)?;
        let on_branch = r.branches.get(branch).is_some_and(|head| same_commit(head, commit));
        Ok(on_branch || r.commits.iter().any(|c| same_commit(c, commit)))
    }
}
