use serde::{Deserialize, Serialize};

/// Whether a reference can change content without the workflow changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    Stable,
    Mutable,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Stable => write!(f, "STABLE"),
            Kind::Mutable => write!(f, "MUTABLE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    LocalPath,
    NoSpecifiedVersion,
    IsDefaultBranch,
    IsBranch,
    UnstableTagHistory,
    TagNotFound,
    UnsupportedForm,
    IsStableCommit,
    IsStableTag,
}

impl Reason {
    /// Reasons whose verdict was reached through a tag lookup.
    pub fn via_tag(self) -> bool {
        matches!(self, Reason::IsStableTag | Reason::UnstableTagHistory)
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Reason::LocalPath => "local path",
            Reason::NoSpecifiedVersion => "no specified version",
            Reason::IsDefaultBranch => "default branch",
            Reason::IsBranch => "branch",
            Reason::UnstableTagHistory => "tag has been re-pointed",
            Reason::TagNotFound => "ref not found",
            Reason::UnsupportedForm => "unsupported reference",
            Reason::IsStableCommit => "commit",
            Reason::IsStableTag => "tag",
        };
        f.write_str(s)
    }
}

/// Verdict for one (owner, repo, version). Never edited after creation; a
/// newer classification supersedes an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: Kind,
    pub reason: Reason,
    /// Full commit the reference currently resolves to, when known.
    pub resolved_commit: Option<String>,
}

impl Classification {
    pub fn stable(reason: Reason, resolved_commit: Option<String>) -> Self {
        Self {
            kind: Kind::Stable,
            reason,
            resolved_commit,
        }
    }

    pub fn mutable(reason: Reason, resolved_commit: Option<String>) -> Self {
        Self {
            kind: Kind::Mutable,
            reason,
            resolved_commit,
        }
    }

    pub fn is_stable(&self) -> bool {
        self.kind == Kind::Stable
    }

    /// Same verdict, current resolution.
    pub fn with_resolved(&self, commit: Option<String>) -> Self {
        Self {
            resolved_commit: commit,
            ..self.clone()
        }
    }
}
