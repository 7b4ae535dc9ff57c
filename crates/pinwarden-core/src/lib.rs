pub mod cache;
pub mod checks;
pub mod classify;
pub mod config;
pub mod error;
pub mod fork;
pub mod provider;
pub mod reference;
pub mod remediate;
pub mod report;
pub mod scanner;
pub mod workflow;

use crate::error::ScanError;
use crate::report::{ScanReport, ToolInfo};
use crate::scanner::{ScanOutcome, Scanner};
use crate::workflow::DocumentSource;

pub const TOOL_NAME: &str = "pinwarden";

/// JSON schema version of pinwarden reports.
/// Bump only when the report shape changes semantically.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Scan one workflow and build its report.
pub async fn audit(
    scanner: &Scanner,
    source: &DocumentSource,
    tool: ToolInfo,
) -> Result<(ScanReport, ScanOutcome), ScanError> {
    let outcome = scanner.scan(&source.text).await?;
    let report = ScanReport::new(tool, source.info(), scanner.enabled(), &outcome);
    Ok((report, outcome))
}
