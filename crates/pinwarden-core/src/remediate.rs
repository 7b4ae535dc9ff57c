//! Remediation engine.
//!
//! Applies one check's issues to the snapshot they were detected on. Edits
//! are made on a copy; if any edit fails the caller gets the error and the
//! original text is untouched. Substitutions never add or remove line
//! breaks, so line numbers stay valid across a batch.

use tracing::debug;

use crate::checks::{Check, Issue};
use crate::error::RemediationError;

/// Apply every remediable issue in `issues` through `check`.
pub fn apply(check: &dyn Check, text: &str, issues: &[Issue]) -> Result<String, RemediationError> {
    let mut out = text.to_string();
    let mut applied = 0usize;

    for issue in issues.iter().filter(|i| i.remediable().is_some()) {
        out = check.remediate(&out, issue)?;
        applied += 1;
    }

    debug!(check = %check.id(), applied, "remediations applied");
    Ok(out)
}

/// Replace the first occurrence of `original` after the `uses:` key on
/// 1-based `line`. Everything else, line terminators included, is kept.
pub fn replace_on_line(
    text: &str,
    line: usize,
    original: &str,
    replacement: &str,
) -> Result<String, RemediationError> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let total = lines.len();

    let Some(target) = line.checked_sub(1).and_then(|i| lines.get(i)) else {
        return Err(RemediationError::LineOutOfRange { line, total });
    };

    let search_from = target.find("uses:").map_or(0, |pos| pos + "uses:".len());
    let Some(offset) = target[search_from..].find(original) else {
        return Err(RemediationError::SpanNotFound {
            line,
            original: original.to_string(),
        });
    };
    let start = search_from + offset;

    let mut out = String::with_capacity(text.len() + replacement.len());
    for (idx, l) in lines.iter().enumerate() {
        if idx + 1 == line {
            out.push_str(&l[..start]);
            out.push_str(replacement);
            out.push_str(&l[start + original.len()..]);
        } else {
            out.push_str(l);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::unstable_github_ref::UnstableGithubRef;
    use crate::checks::{CheckId, Remediation};

    fn issue(line: usize, original: &str, replacement: &str) -> Issue {
        Issue {
            check: CheckId::UnstableGithubRef,
            job_name: "build".into(),
            step_index: Some(0),
            line_number: line,
            message: String::new(),
            remediation: Some(Remediation {
                original: original.into(),
                replacement: replacement.into(),
            }),
            can_remediate: true,
            reason: None,
        }
    }

    #[test]
    fn replaces_value_after_uses_key() {
        let text = "steps:\n  - name: org/a@main\n    uses: org/a@main # keep\n";
        let out = replace_on_line(text, 3, "org/a@main", "org/a@1234567").unwrap();
        assert_eq!(out, "steps:\n  - name: org/a@main\n    uses: org/a@1234567 # keep\n");
    }

    #[test]
    fn preserves_crlf_and_missing_trailing_newline() {
        let text = "a\r\n  - uses: org/a@dev\r\nb";
        let out = replace_on_line(text, 2, "org/a@dev", "org/a@abcdef0").unwrap();
        assert_eq!(out, "a\r\n  - uses: org/a@abcdef0\r\nb");
    }

    #[test]
    fn out_of_range_and_missing_span() {
        let text = "one\ntwo\n";
        assert_eq!(
            replace_on_line(text, 3, "x", "y"),
            Err(RemediationError::LineOutOfRange { line: 3, total: 2 })
        );
        assert_eq!(
            replace_on_line(text, 0, "x", "y"),
            Err(RemediationError::LineOutOfRange { line: 0, total: 2 })
        );
        assert_eq!(
            replace_on_line(text, 2, "x", "y"),
            Err(RemediationError::SpanNotFound {
                line: 2,
                original: "x".into()
            })
        );
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let text = "- uses: org/a@dev\n- uses: org/b@dev\n";
        let issues = vec![
            issue(1, "org/a@dev", "org/a@1111111"),
            issue(2, "org/c@dev", "org/c@2222222"),
        ];
        let err = apply(&UnstableGithubRef, text, &issues).unwrap_err();
        assert!(matches!(err, RemediationError::SpanNotFound { line: 2, .. }));
    }

    #[test]
    fn batch_applies_every_remediable_issue() {
        let text = "- uses: org/a@dev\n- uses: org/b@dev\n- uses: org/c@v404\n";
        let mut not_fixable = issue(3, "org/c@v404", "unused");
        not_fixable.can_remediate = false;
        let issues = vec![
            issue(1, "org/a@dev", "org/a@1111111"),
            issue(2, "org/b@dev", "org/b@2222222"),
            not_fixable,
        ];
        let out = apply(&UnstableGithubRef, text, &issues).unwrap();
        assert_eq!(out, "- uses: org/a@1111111\n- uses: org/b@2222222\n- uses: org/c@v404\n");
    }
}
