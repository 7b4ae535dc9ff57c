use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION;
use crate::checks::{CheckId, Issue};
use crate::scanner::ScanOutcome;
use crate::workflow::fingerprint;

/// Exit status when the scan found nothing.
pub const EXIT_CLEAN: i32 = 0;
/// Exit status when at least one issue was reported.
pub const EXIT_ISSUES: i32 = 1;

/// Top-level scan report; the stable JSON contract of `--format json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub document: DocumentInfo,
    pub checks: Vec<CheckId>,
    pub issues: Vec<Issue>,
    pub summary: Summary,
    pub remediation: RemediationInfo,
}

impl ScanReport {
    pub fn new(tool: ToolInfo, document: DocumentInfo, checks: &[CheckId], outcome: &ScanOutcome) -> Self {
        let summary = Summary::of(&outcome.issues);
        let remediation = RemediationInfo {
            changed: outcome.changed(),
            hash: outcome.changed().then(|| DocumentHash {
                algorithm: document.hash.algorithm.clone(),
                value: fingerprint(&outcome.remediated),
            }),
        };

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            document,
            checks: checks.to_vec(),
            issues: outcome.issues.clone(),
            summary,
            remediation,
        }
    }
}

/// Tool metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub commit: Option<String>,
}

/// The workflow this report is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Local path or remote URL.
    pub origin: Option<String>,
    pub size_bytes: u64,
    pub hash: DocumentHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHash {
    pub algorithm: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub remediable: usize,
    pub by_check: BTreeMap<CheckId, usize>,
    pub exit_code: i32,
}

impl Summary {
    pub fn of(issues: &[Issue]) -> Self {
        let mut by_check = BTreeMap::new();
        for issue in issues {
            *by_check.entry(issue.check).or_insert(0) += 1;
        }
        Self {
            total: issues.len(),
            remediable: issues.iter().filter(|i| i.remediable().is_some()).count(),
            by_check,
            exit_code: if issues.is_empty() { EXIT_CLEAN } else { EXIT_ISSUES },
        }
    }
}

/// Whether the remediated text differs from the input, and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationInfo {
    pub changed: bool,
    pub hash: Option<DocumentHash>,
}
