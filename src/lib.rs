pub mod config;
pub mod datafetch;
pub mod extract;
pub mod plan;
pub mod source;
pub mod storage;

pub use extract::{ExtractOptions, ExtractionEngine, RunReport};
pub use source::Source;
