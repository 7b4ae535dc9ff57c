//! GitHub REST v3 implementation of [`HostingProvider`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ProviderConfig, RetryPolicy};
use crate::error::{OptionalExt, ProviderError};
use crate::provider::{
    GitObject, GitObjectKind, HostingProvider, ProviderResult, RepoName, Repository,
};

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiParent {
    name: String,
    owner: ApiOwner,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    owner: ApiOwner,
    default_branch: String,
    #[serde(default)]
    fork: bool,
    parent: Option<ApiParent>,
}

#[derive(Debug, Deserialize)]
struct ApiObject {
    sha: String,
    #[serde(rename = "type")]
    kind: GitObjectKind,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    object: ApiObject,
}

#[derive(Debug, Deserialize)]
struct ApiTag {
    object: ApiObject,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiComparison {
    status: String,
}

/// GitHub client shared by every component of a scan.
pub struct GitHubClient {
    api_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                ProviderError::Unexpected {
                    status: 0,
                    message: format!("invalid auth token: {e}"),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            http,
            retry: config.retry.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let url = format!("{}{}", self.api_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&url).await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let requested = match &err {
                        ProviderError::RateLimited { retry_after_secs } => *retry_after_secs,
                        _ => None,
                    };
                    let wait = self.retry.backoff(attempt, requested);
                    warn!(%url, attempt, wait_ms = wait.as_millis() as u64, "retrying provider call: {err}");
                    tokio::time::sleep(wait).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()));
        }

        let headers = resp.headers().clone();
        let body = resp.text().await.unwrap_or_default();
        Err(classify_failure(status, &headers, url, body))
    }
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, url: &str, body: String) -> ProviderError {
    match status {
        // 422 is what GitHub answers for syntactically invalid shas.
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::NotFound(url.to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            retry_after_secs: retry_after(headers),
        },
        StatusCode::FORBIDDEN if header_str(headers, "x-ratelimit-remaining") == Some("0") => {
            ProviderError::RateLimited {
                retry_after_secs: retry_after(headers),
            }
        }
        s if s.is_server_error() => ProviderError::Transient(format!("{s} from {url}")),
        s => ProviderError::Unexpected {
            status: s.as_u16(),
            message: body,
        },
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    if let Some(secs) = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
    {
        return Some(secs);
    }
    let reset: i64 = header_str(headers, "x-ratelimit-reset")?.parse().ok()?;
    Some((reset - chrono::Utc::now().timestamp()).max(0) as u64)
}

#[async_trait]
impl HostingProvider for GitHubClient {
    async fn get_repository(&self, owner: &str, repo: &str) -> ProviderResult<Repository> {
        let r: ApiRepository = self.get_json(&format!("/repos/{owner}/{repo}")).await?;
        Ok(Repository {
            owner: r.owner.login,
            name: r.name,
            default_branch: r.default_branch,
            fork: r.fork,
            parent: r.parent.map(|p| RepoName::new(p.owner.login, p.name)),
        })
    }

    async fn get_branch_head(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ProviderResult<String> {
        let r: ApiRef = self
            .get_json(&format!("/repos/{owner}/{repo}/git/ref/heads/{branch}"))
            .await?;
        Ok(r.object.sha)
    }

    async fn get_tag(&self, owner: &str, repo: &str, tag: &str) -> ProviderResult<GitObject> {
        let r: ApiRef = self
            .get_json(&format!("/repos/{owner}/{repo}/git/ref/tags/{tag}"))
            .await?;
        Ok(GitObject {
            sha: r.object.sha,
            kind: r.object.kind,
        })
    }

    async fn get_tag_target_commit(
        &self,
        owner: &str,
        repo: &str,
        tag_object_sha: &str,
    ) -> ProviderResult<GitObject> {
        let t: ApiTag = self
            .get_json(&format!("/repos/{owner}/{repo}/git/tags/{tag_object_sha}"))
            .await?;
        Ok(GitObject {
            sha: t.object.sha,
            kind: t.object.kind,
        })
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> ProviderResult<String> {
        let c: ApiCommit = self
            .get_json(&format!("/repos/{owner}/{repo}/commits/{sha}"))
            .await?;
        Ok(c.sha)
    }

    async fn is_ancestor(
        &self,
        owner: &str,
        repo: &str,
        commit: &str,
        branch: &str,
    ) -> ProviderResult<bool> {
        // base...head with head = commit: "behind" means the commit is
        // reachable from the branch.
        let cmp: Option<ApiComparison> = self
            .get_json(&format!("/repos/{owner}/{repo}/compare/{branch}...{commit}"))
            .await
            .found()?;
        Ok(cmp.is_some_and(|c| c.status == "behind" || c.status == "identical"))
    }
}
