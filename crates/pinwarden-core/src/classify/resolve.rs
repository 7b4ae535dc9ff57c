//! Version-token resolution against the hosting provider.
//!
//! Fixed order: tag ref, then branch ref, then literal commit. First match
//! wins. Shared by the classifier and the fork check.

use tracing::debug;

use crate::error::OptionalExt;
use crate::provider::{GitObjectKind, HostingProvider, ProviderResult};

/// Annotated tags may point at other tag objects; follow at most this many.
const MAX_TAG_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Tag { commit: String },
    Branch { commit: String },
    Commit { commit: String },
    NotFound,
}

impl Resolution {
    pub fn commit(&self) -> Option<&str> {
        match self {
            Resolution::Tag { commit }
            | Resolution::Branch { commit }
            | Resolution::Commit { commit } => Some(commit),
            Resolution::NotFound => None,
        }
    }
}

/// Only hex strings of plausible length are looked up as commits.
pub fn looks_like_commit(token: &str) -> bool {
    (4..=40).contains(&token.len()) && token.chars().all(|c| c.is_ascii_hexdigit())
}

pub async fn resolve(
    provider: &dyn HostingProvider,
    owner: &str,
    repo: &str,
    token: &str,
) -> ProviderResult<Resolution> {
    if let Some(commit) = resolve_tag(provider, owner, repo, token).await? {
        debug!(owner, repo, token, %commit, "resolved as tag");
        return Ok(Resolution::Tag { commit });
    }

    if let Some(commit) = provider
        .get_branch_head(owner, repo, token)
        .await
        .found()?
    {
        debug!(owner, repo, token, %commit, "resolved as branch");
        return Ok(Resolution::Branch { commit });
    }

    if looks_like_commit(token) {
        if let Some(commit) = provider.get_commit(owner, repo, token).await.found()? {
            debug!(owner, repo, token, %commit, "resolved as commit");
            return Ok(Resolution::Commit { commit });
        }
    }

    debug!(owner, repo, token, "unresolved");
    Ok(Resolution::NotFound)
}

/// Commit a tag currently points at, dereferencing annotated tag objects.
pub async fn resolve_tag(
    provider: &dyn HostingProvider,
    owner: &str,
    repo: &str,
    tag: &str,
) -> ProviderResult<Option<String>> {
    let Some(mut object) = provider.get_tag(owner, repo, tag).await.found()? else {
        return Ok(None);
    };

    for _ in 0..MAX_TAG_DEPTH {
        match object.kind {
            GitObjectKind::Commit => return Ok(Some(object.sha)),
            GitObjectKind::Tag => {
                match provider
                    .get_tag_target_commit(owner, repo, &object.sha)
                    .await
                    .found()?
                {
                    Some(next) => object = next,
                    None => return Ok(None),
                }
            }
            GitObjectKind::Other => return Ok(None),
        }
    }

    Ok(None)
}
