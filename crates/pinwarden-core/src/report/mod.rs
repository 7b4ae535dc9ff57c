pub mod model;
pub mod render;

pub use model::{DocumentHash, DocumentInfo, ScanReport, Summary, ToolInfo};
