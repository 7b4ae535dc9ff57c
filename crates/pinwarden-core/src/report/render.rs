use crate::TOOL_NAME;
use crate::report::model::ScanReport;

pub const NO_RECOMMENDATIONS: &str = "No recommendations found!";

pub fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", TOOL_NAME, report.tool.version));
    if let Some(origin) = &report.document.origin {
        out.push_str(&format!("Workflow: {origin}\n"));
    }
    out.push_str(&format!(
        "Document size: {} bytes\n",
        report.document.size_bytes
    ));

    if report.issues.is_empty() {
        out.push_str(NO_RECOMMENDATIONS);
        out.push('\n');
        return out;
    }

    out.push_str(&format!(
        "Issues: {} ({} remediable)\n",
        report.summary.total, report.summary.remediable
    ));
    for issue in &report.issues {
        out.push_str(&format!(
            "  - [{}] line {}: {}\n",
            issue.check, issue.line_number, issue.message
        ));
        if let Some(r) = issue.remediable() {
            out.push_str(&format!("      {} -> {}\n", r.original, r.replacement));
        }
    }
    out
}

/// Line diff between two texts with the same number of lines, which is
/// what remediation always produces.
pub fn render_diff(label: &str, original: &str, remediated: &str) -> String {
    let mut out = format!("--- {label}\n+++ {label}\n");
    for (idx, (before, after)) in original.lines().zip(remediated.lines()).enumerate() {
        if before != after {
            out.push_str(&format!("@@ line {} @@\n-{before}\n+{after}\n", idx + 1));
        }
    }
    out
}
