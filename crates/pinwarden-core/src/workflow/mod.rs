pub mod document;
pub mod locate;
pub mod read;
pub mod remote;

pub use document::{Job, Step, UsesRef, UsesSite, WorkflowDocument};
pub use read::{DocumentSource, fingerprint, read_document};
