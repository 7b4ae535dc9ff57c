pub mod classifier;
pub mod model;
pub mod resolve;

pub use classifier::{Classifier, DEFAULT_BRANCH_NAMES, immutable_form};
pub use model::{Classification, Kind, Reason};
pub use resolve::Resolution;
