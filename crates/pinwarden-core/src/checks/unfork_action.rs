use async_trait::async_trait;
use futures::FutureExt;
use tracing::debug;

use crate::checks::{Check, CheckContext, CheckId, Issue};
use crate::provider::ProviderResult;
use crate::reference::{Reference, parse_reference};
use crate::workflow::{UsesSite, WorkflowDocument};

/// Actions referenced through a fork whose pinned commit also exists in the
/// upstream repository. Remediates to the upstream, pinned to that commit.
pub struct UnforkAction;

#[async_trait]
impl Check for UnforkAction {
    fn id(&self) -> CheckId {
        CheckId::UnforkAction
    }

    async fn detect(&self, doc: &WorkflowDocument, ctx: &CheckContext) -> ProviderResult<Vec<Issue>> {
        let workflow = doc.display_name();
        let inspections = doc
            .uses_sites()
            .into_iter()
            .map(|site| inspect(site, workflow, ctx).boxed())
            .collect();
        ctx.inspect_sites(inspections).await
    }
}

async fn inspect(
    site: UsesSite<'_>,
    workflow: &str,
    ctx: &CheckContext,
) -> ProviderResult<Option<Issue>> {
    let value = site.uses.value.as_str();
    let Ok(Reference::Action(action)) = parse_reference(value) else {
        return Ok(None);
    };
    if !action.has_version() {
        return Ok(None);
    }

    let upstream = ctx.forks.resolve_upstream(&action.owner, &action.repo).await?;
    let Some(parent) = upstream.repo.filter(|_| upstream.is_fork) else {
        return Ok(None);
    };

    let resolution = ctx
        .classifier
        .resolve(&action.owner, &action.repo, &action.version)
        .await?;
    let Some(commit) = resolution.commit() else {
        return Ok(None);
    };

    if !ctx
        .forks
        .is_commit_in_upstream(&parent.owner, &parent.name, commit)
        .await?
    {
        debug!(reference = value, upstream = %parent, commit, "commit not in upstream");
        return Ok(None);
    }

    let replacement = action
        .with_repository(&parent.owner, &parent.name)
        .pinned_to(commit);
    let message = format!(
        "The job named {:?} in the {:?} workflow is using {:?}, a fork of {:?}. The referenced commit exists in {:?}, so the upstream repository can be used instead.",
        site.job_name,
        workflow,
        value,
        parent.to_string(),
        parent.to_string()
    );

    Ok(Some(
        Issue::at(CheckId::UnforkAction, &site, message).with_remediation(value, replacement),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{ExpiryPolicy, MemoryCache};
    use crate::classify::Classifier;
    use crate::fork::ForkResolver;
    use crate::provider::fake::FakeProvider;

    fn context(fake: Arc<FakeProvider>) -> CheckContext {
        let cache = Arc::new(MemoryCache::default());
        let classifier = Classifier::new(fake.clone(), cache.clone(), cache, ExpiryPolicy::default());
        CheckContext::new(Arc::new(classifier), ForkResolver::new(fake), 4)
    }

    fn forked() -> Arc<FakeProvider> {
        let fake = Arc::new(FakeProvider::new());
        fake.add_repo("upstream", "action", "main", "9999999000")
            .add_commit("upstream", "action", "abcdef1234567")
            .add_repo("forker", "action", "main", "8888888000")
            .set_tag("forker", "action", "v1", "abcdef1234567")
            .set_tag("forker", "action", "v2", "0000000feed")
            .set_fork("forker", "action", "upstream", "action");
        fake
    }

    fn doc(uses: &str) -> WorkflowDocument {
        WorkflowDocument::parse(&format!("jobs:\n  build:\n    steps:\n      - uses: {uses}\n")).unwrap()
    }

    #[tokio::test]
    async fn fork_with_upstream_commit_is_remediated() {
        let ctx = context(forked());
        let issues = UnforkAction.detect(&doc("forker/action/sub@v1"), &ctx).await.unwrap();

        assert_eq!(issues.len(), 1);
        let r = issues[0].remediable().unwrap();
        assert_eq!(r.original, "forker/action/sub@v1");
        assert_eq!(r.replacement, "upstream/action/sub@abcdef1");
        assert_eq!(issues[0].line_number, 4);
    }

    #[tokio::test]
    async fn fork_only_commit_is_left_alone() {
        let ctx = context(forked());
        let issues = UnforkAction.detect(&doc("forker/action@v2"), &ctx).await.unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn non_fork_costs_one_metadata_call() {
        let fake = forked();
        let ctx = context(fake.clone());
        fake.reset_calls();

        let issues = UnforkAction.detect(&doc("upstream/action@v1"), &ctx).await.unwrap();
        assert!(issues.is_empty());
        assert_eq!(fake.call_count(), 1);
    }
}
