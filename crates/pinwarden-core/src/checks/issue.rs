use serde::{Deserialize, Serialize};

use crate::checks::CheckId;
use crate::classify::Reason;
use crate::workflow::UsesSite;

/// Textual substitution for one `uses` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    pub original: String,
    pub replacement: String,
}

/// One finding against one document snapshot.
///
/// Line numbers refer to the text the issue was detected on; the issue is
/// consumed by the remediation pass for that same text and never reapplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub check: CheckId,
    pub job_name: String,
    /// `None` for a job-level reusable workflow call.
    pub step_index: Option<usize>,
    pub line_number: usize,
    pub message: String,
    pub remediation: Option<Remediation>,
    pub can_remediate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl Issue {
    pub fn at(check: CheckId, site: &UsesSite<'_>, message: impl Into<String>) -> Self {
        Self {
            check,
            job_name: site.job_name.to_string(),
            step_index: site.step_index,
            line_number: site.uses.line,
            message: message.into(),
            remediation: None,
            can_remediate: false,
            reason: None,
        }
    }

    pub fn with_remediation(mut self, original: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.remediation = Some(Remediation {
            original: original.into(),
            replacement: replacement.into(),
        });
        self.can_remediate = true;
        self
    }

    pub fn with_reason(mut self, reason: Reason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// The substitution to apply, if this issue is remediable at all.
    pub fn remediable(&self) -> Option<&Remediation> {
        self.remediation.as_ref().filter(|_| self.can_remediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::UsesRef;

    fn site(uses: &UsesRef) -> UsesSite<'_> {
        UsesSite {
            job_name: "build",
            step_index: Some(2),
            uses,
        }
    }

    #[test]
    fn issue_carries_site_position() {
        let uses = UsesRef {
            value: "org/a@main".into(),
            line: 12,
        };
        let issue = Issue::at(CheckId::UnstableGithubRef, &site(&uses), "msg");
        assert_eq!(issue.job_name, "build");
        assert_eq!(issue.step_index, Some(2));
        assert_eq!(issue.line_number, 12);
        assert!(issue.remediable().is_none());
    }

    #[test]
    fn remediation_marks_issue_remediable() {
        let uses = UsesRef {
            value: "org/a@main".into(),
            line: 1,
        };
        let issue = Issue::at(CheckId::UnstableGithubRef, &site(&uses), "msg")
            .with_remediation("org/a@main", "org/a@1234567")
            .with_reason(Reason::IsDefaultBranch);
        assert!(issue.can_remediate);
        assert_eq!(issue.remediable().map(|r| r.replacement.as_str()), Some("org/a@1234567"));
    }

    #[test]
    fn serializes_check_and_reason_as_identifiers() {
        let uses = UsesRef {
            value: "docker://x".into(),
            line: 3,
        };
        let issue = Issue::at(CheckId::UnstableDockerTag, &site(&uses), "msg");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["check"], "unstable-docker-tag");
        assert!(json.get("reason").is_none());

        let with_reason = issue.with_reason(Reason::IsBranch);
        let json = serde_json::to_value(&with_reason).unwrap();
        assert_eq!(json["reason"], "is_branch");
    }
}
