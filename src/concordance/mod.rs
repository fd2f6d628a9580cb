mod engine;
mod lod;
mod protocol;
mod report;

pub use engine::{ConcordanceEngine, EngineConfig, InvocationState};
pub use lod::{LodScorer, DEFAULT_ERROR_RATE};
pub use protocol::{ComparisonMode, ConcordanceRequest, ConcordanceResponse, LodScore};
pub use report::{write_lod_matrix, write_lod_table};
