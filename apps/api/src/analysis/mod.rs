pub mod applicant;
pub mod compare;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod organization;
pub mod organizations;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod sources;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use error::{AnalysisFailure, PipelineError};
pub use pipeline::{AnalysisPipeline, PipelineSettings};
