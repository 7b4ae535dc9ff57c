//! Workflows addressed by a `github.com/<owner>/<repo>/blob/<ref>/<path>` URL.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::debug;

use crate::workflow::DocumentSource;

pub const RAW_CONTENT_HOST: &str = "https://raw.githubusercontent.com";

static BLOB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/?#]+)/([^/?#]+)/blob/([^/?#]+)/([^?#]+)")
        .expect("valid blob url pattern")
});

pub fn is_remote(target: &str) -> bool {
    target.starts_with("https://") || target.starts_with("http://")
}

/// Raw-content URL for a GitHub blob URL, or `None` for any other URL.
pub fn raw_content_url(url: &str) -> Option<String> {
    let caps = BLOB_URL.captures(url)?;
    Some(format!(
        "{RAW_CONTENT_HOST}/{}/{}/{}/{}",
        &caps[1], &caps[2], &caps[3], &caps[4]
    ))
}

/// Download a workflow from its blob URL.
pub async fn fetch_document(url: &str, timeout: Duration) -> Result<DocumentSource> {
    let Some(raw) = raw_content_url(url) else {
        bail!("unsupported workflow url: {url} (expected https://github.com/<owner>/<repo>/blob/<ref>/<path>)");
    };
    debug!(url, raw = %raw, "fetching remote workflow");

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")?;
    let text = client
        .get(&raw)
        .send()
        .await
        .with_context(|| format!("failed to fetch {raw}"))?
        .error_for_status()
        .with_context(|| format!("failed to fetch {raw}"))?
        .text()
        .await
        .with_context(|| format!("failed to read body of {raw}"))?;

    Ok(DocumentSource::from_text(Some(url.to_string()), text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_urls_map_to_raw_content() {
        assert_eq!(
            raw_content_url("https://github.com/org/repo/blob/main/.github/workflows/ci.yml").as_deref(),
            Some("https://raw.githubusercontent.com/org/repo/main/.github/workflows/ci.yml")
        );
    }

    #[test]
    fn query_strings_are_dropped() {
        assert_eq!(
            raw_content_url("https://github.com/o/r/blob/v1/w.yml?plain=1").as_deref(),
            Some("https://raw.githubusercontent.com/o/r/v1/w.yml")
        );
    }

    #[test]
    fn other_urls_are_rejected() {
        assert_eq!(raw_content_url("https://github.com/o/r/tree/main/x"), None);
        assert_eq!(raw_content_url("https://example.com/o/r/blob/main/x.yml"), None);
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://github.com/o/r/blob/main/x.yml"));
        assert!(!is_remote(".github/workflows/ci.yml"));
    }
}
