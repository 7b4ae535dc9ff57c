use async_trait::async_trait;
use futures::FutureExt;
use tracing::debug;

use crate::checks::{Check, CheckContext, CheckId, Issue};
use crate::classify::Reason;
use crate::error::OptionalExt;
use crate::provider::ProviderResult;
use crate::reference::model::same_commit;
use crate::reference::{Reference, parse_reference};
use crate::workflow::{UsesSite, WorkflowDocument};

/// References pinned to a commit that is no longer the head of the
/// repository's default branch. Remediates to the current head.
pub struct OutdatedAction;

#[async_trait]
impl Check for OutdatedAction {
    fn id(&self) -> CheckId {
        CheckId::OutdatedAction
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

    let classification = ctx.classifier.classify(&action).await?;
    if classification.reason != Reason::IsStableCommit {
        return Ok(None);
    }

    let provider = ctx.provider();
    let Some(branch) = provider
        .get_default_branch(&action.owner, &action.repo)
        .await
        .found()?
    else {
        return Ok(None);
    };
    let Some(latest) = provider
        .get_branch_head(&action.owner, &action.repo, &branch)
        .await
        .found()?
    else {
        return Ok(None);
    };

    if same_commit(&action.version, &latest) {
        return Ok(None);
    }
    debug!(reference = value, %latest, "pinned commit is behind default branch");

    let message = format!(
        "The job named {:?} in the {:?} workflow is referencing an outdated commit from {:?}.",
        site.job_name, workflow, value
    );
    Ok(Some(
        Issue::at(CheckId::OutdatedAction, &site, message)
            .with_reason(Reason::IsStableCommit)
            .with_remediation(value, action.pinned_to(&latest)),
    ))
}
