use std::fmt;

use thiserror::Error;

use crate::llm_client::{DocumentState, LlmError};

/// Failure of one pipeline stage. Every variant is terminal for the run that
/// raised it; nothing here is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Unsupported organization. Supported organizations: {}", known.join(", "))]
    UnsupportedOrganization { known: Vec<String> },

    #[error("Document '{document}' is not usable (state: {state})")]
    DocumentProcessing {
        document: String,
        state: DocumentState,
    },

    #[error("Malformed provider output in {stage}: {message}")]
    MalformedOutput { stage: Stage, message: String },

    #[error("No stored {kind} record for '{subject}'")]
    MissingRecord { kind: String, subject: String },

    #[error("Provider call failed: {0}")]
    Provider(#[from] LlmError),

    #[error("Failed to load document '{key}': {message}")]
    DocumentStorage { key: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PipelineError {
    /// Stable machine-readable kind, surfaced as `error_type` over HTTP.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "fetch_error",
            PipelineError::UnsupportedOrganization { .. } => "unsupported_organization",
            PipelineError::DocumentProcessing { .. } => "document_processing_error",
            PipelineError::MalformedOutput { .. } => "malformed_output",
            PipelineError::MissingRecord { .. } => "missing_record",
            PipelineError::Provider(_) => "provider_error",
            PipelineError::DocumentStorage { .. } => "document_storage_error",
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::Persistence(_) => "persistence_error",
        }
    }
}

/// Which provider call produced a piece of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Score,
    Applicant,
    Compare,
    PageFetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Collect => "data collection",
            Stage::Score => "culture scoring",
            Stage::Applicant => "applicant analysis",
            Stage::Compare => "comparison",
            Stage::PageFetch => "page fetch",
        })
    }
}

/// What every orchestrator entry point returns on failure.
#[derive(Debug, Error)]
#[error("{error} (after {elapsed_seconds:.2}s)")]
pub struct AnalysisFailure {
    pub error: PipelineError,
    pub elapsed_seconds: f64,
}

impl AnalysisFailure {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}
