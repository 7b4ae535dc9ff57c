pub mod model;
pub mod parse;

pub use model::{ActionReference, ContainerReference, Reference, SHORT_SHA_LEN, short_sha};
pub use parse::parse_reference;
