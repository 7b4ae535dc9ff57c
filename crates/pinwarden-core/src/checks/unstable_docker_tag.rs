use async_trait::async_trait;

use crate::checks::{Check, CheckContext, CheckId, Issue};
use crate::provider::ProviderResult;
use crate::reference::{Reference, parse_reference};
use crate::workflow::WorkflowDocument;

/// Container images pulled through the floating `latest` tag, written
/// explicitly or implied by a missing tag. Never remediated: there is no
/// registry lookup to find a digest.
pub struct UnstableDockerTag;

#[async_trait]
impl Check for UnstableDockerTag {
    fn id(&self) -> CheckId {
        CheckId::UnstableDockerTag
    }

    async fn detect(&self, doc: &WorkflowDocument, _ctx: &CheckContext) -> ProviderResult<Vec<Issue>> {
        let workflow = doc.display_name();
        let issues = doc
            .uses_sites()
            .into_iter()
            .filter_map(|site| {
                let Ok(Reference::Container(image)) = parse_reference(&site.uses.value) else {
                    return None;
                };
                if image.is_digest_pinned() || image.effective_tag() != "latest" {
                    return None;
                }
                let message = format!(
                    "The job named {:?} in the {:?} workflow is referencing an action that uses the latest tag of the {:?} docker image. The latest tag is likely to change.",
                    site.job_name, workflow, image.image
                );
                Some(Issue::at(CheckId::UnstableDockerTag, &site, message))
            })
            .collect();
        Ok(issues)
    }
}
