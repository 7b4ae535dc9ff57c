use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::{fs, path::Path};

use crate::report::model::{DocumentHash, DocumentInfo};

/// Workflow text together with the fingerprint of the exact bytes scanned.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Local path or remote URL (informational only).
    pub origin: Option<String>,

    pub text: String,

    pub size_bytes: u64,

    pub hash_alg: String,

    pub hash_hex: String,
}

impl DocumentSource {
    /// Wrap text that did not come from disk (e.g. fetched over HTTP).
    pub fn from_text(origin: Option<String>, text: String) -> Self {
        Self {
            origin,
            size_bytes: text.len() as u64,
            hash_alg: "sha256".to_string(),
            hash_hex: fingerprint(&text),
            text,
        }
    }

    /// Report-facing metadata. Drops the text.
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            origin: self.origin.clone(),
            size_bytes: self.size_bytes,
            hash: DocumentHash {
                algorithm: self.hash_alg.clone(),
                value: self.hash_hex.clone(),
            },
        }
    }
}

/// Read a workflow file as UTF-8 text.
pub fn read_document(path: &Path) -> Result<DocumentSource> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow: {}", path.display()))?;
    Ok(DocumentSource::from_text(Some(path.display().to_string()), text))
}

/// Hex-encoded sha256 of the text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
