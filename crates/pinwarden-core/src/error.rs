//! Error taxonomy for the scan pipeline.
//!
//! Each layer owns its own error type. `ScanError` wraps them with the
//! phase and check that failed so the CLI can print one readable line.

use thiserror::Error;

use crate::checks::CheckId;

/// Malformed reference strings or workflow documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Reference shape not recognized (e.g. `actions@v1`, empty string).
    #[error("unsupported reference form: {0:?}")]
    UnsupportedRefForm(String),

    /// The document is not valid YAML.
    #[error("invalid workflow yaml: {0}")]
    Yaml(String),

    /// Valid YAML, but not shaped like a workflow.
    #[error("invalid workflow structure: {0}")]
    Structure(String),

    /// Line scan and structural parse disagree on a `uses` value.
    #[error("job {job:?}: could not locate `uses: {value}` in source text")]
    UsesMismatch { job: String, value: String },
}

/// Hosting provider failures.
///
/// `NotFound` is not a failure from the classifier's point of view; it is
/// input to the classification state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by provider (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("unexpected provider response {status}: {message}")]
    Unexpected { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transient(err.to_string())
        }
    }
}

/// Turns a `NotFound` into `Ok(None)` so callers can branch on presence.
pub trait OptionalExt<T> {
    fn found(self) -> Result<Option<T>, ProviderError>;
}

impl<T> OptionalExt<T> for Result<T, ProviderError> {
    fn found(self) -> Result<Option<T>, ProviderError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Cache backing-store failures. Always non-fatal: logged, never propagated
/// out of a scan.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache lock poisoned")]
    Poisoned,
}

/// A remediation that cannot be applied to the snapshot it was computed from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemediationError {
    #[error("line {line} is outside the document ({total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("line {line} does not contain {original:?}")]
    SpanNotFound { line: usize, original: String },
}

/// Scan-level failure identifying the phase that failed.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to parse workflow before {check} check")]
    Parse {
        check: CheckId,
        #[source]
        source: ParseError,
    },

    #[error("failed to run {check} check")]
    Detect {
        check: CheckId,
        #[source]
        source: ProviderError,
    },

    #[error("failed to apply {check} remediation")]
    Remediate {
        check: CheckId,
        #[source]
        source: RemediationError,
    },

    #[error("unknown check {0:?}")]
    UnknownCheck(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_maps_not_found_to_none() {
        let r: Result<u8, ProviderError> = Err(ProviderError::NotFound("x".into()));
        assert_eq!(r.found(), Ok(None));

        let r: Result<u8, ProviderError> = Ok(3);
        assert_eq!(r.found(), Ok(Some(3)));
    }

    #[test]
    fn found_keeps_real_failures() {
        let r: Result<u8, ProviderError> = Err(ProviderError::Transient("reset".into()));
        assert!(r.found().is_err());
    }

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: None }.is_retryable());
        assert!(ProviderError::Transient("x".into()).is_retryable());
        assert!(!ProviderError::NotFound("x".into()).is_retryable());
        assert!(
            !ProviderError::Unexpected {
                status: 401,
                message: "bad creds".into()
            }
            .is_retryable()
        );
    }
}
