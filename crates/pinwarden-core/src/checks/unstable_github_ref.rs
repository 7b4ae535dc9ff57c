//! Flags action references whose content can change under the same text:
//! branches, missing versions, re-pointed tags, and refs that resolve to
//! nothing. Remediates by pinning to the commit the reference resolves to
//! right now.

use async_trait::async_trait;
use futures::FutureExt;
use tracing::debug;

use crate::checks::{Check, CheckContext, CheckId, Issue};
use crate::classify::{Classification, Reason, immutable_form};
use crate::provider::ProviderResult;
use crate::reference::{ActionReference, Reference, parse_reference};
use crate::workflow::{UsesSite, WorkflowDocument};

pub struct UnstableGithubRef;

#[async_trait]
impl Check for UnstableGithubRef {
    fn id(&self) -> CheckId {
        CheckId::UnstableGithubRef
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

    let action = match parse_reference(value) {
        Ok(Reference::Action(action)) => action,
        Ok(Reference::Local { .. } | Reference::Container(_)) => return Ok(None),
        Err(e) => {
            debug!(job = site.job_name, value, "unparseable reference: {e}");
            let message = format!(
                "The job named {:?} in the {:?} workflow is referencing {:?}, which is not a supported reference form.",
                site.job_name, workflow, value
            );
            return Ok(Some(
                Issue::at(CheckId::UnstableGithubRef, &site, message).with_reason(Reason::UnsupportedForm),
            ));
        }
    };

    let classification = ctx.classifier.classify(&action).await?;
    if classification.is_stable() {
        return Ok(None);
    }

    let message = message_for(site.job_name, workflow, value, &action, classification.reason);
    let issue = Issue::at(CheckId::UnstableGithubRef, &site, message).with_reason(classification.reason);

    Ok(Some(match remediation_for(&action, &classification) {
        Some(pinned) if pinned != value => issue.with_remediation(value, pinned),
        _ => issue,
    }))
}

fn remediation_for(action: &ActionReference, classification: &Classification) -> Option<String> {
    match classification.reason {
        Reason::TagNotFound | Reason::UnsupportedForm => None,
        _ => immutable_form(action, classification),
    }
}

fn message_for(job: &str, workflow: &str, value: &str, action: &ActionReference, reason: Reason) -> String {
    let repo = format!("{}/{}", action.owner, action.repo);
    match reason {
        Reason::IsDefaultBranch => format!(
            "The job named {job:?} in the {workflow:?} workflow is referencing an action on the {} branch of the {repo:?} repo. The {} branch of {repo:?} is likely to change.",
            action.version, action.version
        ),
        Reason::IsBranch => format!(
            "The job named {job:?} in the {workflow:?} workflow is using an action from {value:?}. This is unstable because {:?} is a branch, and the contents might change.",
            action.version
        ),
        Reason::NoSpecifiedVersion => format!(
            "The job named {job:?} in the {workflow:?} workflow is using an action from {value:?} without specifying a version. The contents will follow the default branch of {repo:?}."
        ),
        Reason::UnstableTagHistory => format!(
            "The job named {job:?} in the {workflow:?} workflow is using an action from {value:?}. The tag {:?} has pointed to different commits in the past, and might move again.",
            action.version
        ),
        Reason::TagNotFound => format!(
            "The job named {job:?} in the {workflow:?} workflow is referencing {value:?}, but {:?} is not a tag, branch, or commit in the {repo:?} repo.",
            action.version
        ),
        other => format!(
            "The job named {job:?} in the {workflow:?} workflow is referencing {value:?}, which is unstable ({other})."
        ),
    }
}
