pub mod aggregator;
pub mod classifier;
pub mod expander;
pub mod fetcher;
pub mod fixtures;
pub mod llm;
pub mod pipeline;
pub mod queries;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use pipeline::stats::{RunReport, Stage, StageSummary, UnitFailure};
pub use pipeline::HazardPipeline;
