//! Reference parser.
//!
//! Turns a raw `uses` string into a [`Reference`]. Pure; never touches the
//! network. Rules are applied in order:
//!
//!   1. leading `.`          → local action
//!   2. `docker://` prefix   → container image
//!   3. otherwise            → `owner/repo[/subpath][@version]`
//!
//! A missing `@version` is not an error; it yields an empty version that the
//! classifier reports as unpinned.

use crate::error::ParseError;
use crate::reference::model::{ActionReference, ContainerReference, Reference};

pub const DOCKER_PREFIX: &str = "docker://";

pub fn parse_reference(raw: &str) -> Result<Reference, ParseError> {
    let raw = raw.trim();

    if raw.starts_with('.') {
        return Ok(Reference::Local {
            path: raw.to_string(),
        });
    }

    if let Some(image) = raw.strip_prefix(DOCKER_PREFIX) {
        return parse_container(image)
            .map(Reference::Container)
            .ok_or_else(|| ParseError::UnsupportedRefForm(raw.to_string()));
    }

    parse_action(raw).map(Reference::Action)
}

/// Parse a `owner/repo[/subpath][@version]` string.
pub fn parse_action(raw: &str) -> Result<ActionReference, ParseError> {
    let unsupported = || ParseError::UnsupportedRefForm(raw.to_string());

    let (path, version) = match raw.split_once('@') {
        Some((path, version)) => (path, version),
        None => (raw, ""),
    };

    if version.contains('@') || version.chars().any(char::is_whitespace) {
        return Err(unsupported());
    }

    let mut segments = path.splitn(3, '/');
    let owner = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    let subpath = segments.next().map(|s| s.trim_end_matches('/'));

    if owner.is_empty() || repo.is_empty() || matches!(subpath, Some("")) {
        return Err(unsupported());
    }

    Ok(ActionReference {
        owner: owner.to_string(),
        repo: repo.to_string(),
        subpath: subpath.map(str::to_string),
        version: version.to_string(),
    })
}

fn parse_container(image: &str) -> Option<ContainerReference> {
    let (name, digest) = match image.split_once('@') {
        Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
        Some(_) => return None,
        None => (image, None),
    };

    // A ':' before the last '/' belongs to a registry port, not a tag.
    let tag_sep = name
        .rfind(':')
        .filter(|&colon| name.rfind('/').is_none_or(|slash| colon > slash));

    let (name, tag) = match tag_sep {
        Some(idx) => (&name[..idx], Some(name[idx + 1..].to_string())),
        None => (name, None),
    };

    if name.is_empty() || matches!(tag.as_deref(), Some("")) {
        return None;
    }

    Some(ContainerReference {
        image: name.to_string(),
        tag,
        digest,
    })
}
