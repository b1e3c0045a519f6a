//! Applicant branch: inline text, or documents uploaded to the provider and
//! analysed together in a single generation call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};

use super::documents::{DocumentLease, DocumentUpload};
use super::error::{PipelineError, Stage};
use super::output::extract_as;
use super::prompts::{applicant_documents_prompt, applicant_text_prompt, APPLICANT_ROLE};
use crate::llm_client::prompts::system_message;
use crate::llm_client::{DocumentService, GenerationRequest, TextGenerator};
use crate::models::evaluation::{EvaluationRecord, SourceInfo};
use crate::storage::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// `{token}/{filename}.pdf` in the document bucket.
    ObjectKey(String),
    /// PDF on the local filesystem.
    LocalPath(PathBuf),
}

impl DocumentRef {
    pub fn file_name(&self) -> String {
        match self {
            DocumentRef::ObjectKey(key) => key.rsplit('/').next().unwrap_or(key).to_string(),
            DocumentRef::LocalPath(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    fn describe(&self) -> String {
        match self {
            DocumentRef::ObjectKey(key) => key.clone(),
            DocumentRef::LocalPath(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ApplicantSource {
    Text(String),
    Documents(Vec<DocumentRef>),
}

/// Role of an applicant document, guessed from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentRole {
    Resume,
    Portfolio,
    Statement,
    Other,
}

impl DocumentRole {
    pub fn infer(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if has(&["이력서", "resume", "résumé", "cv_", "_cv"]) {
            DocumentRole::Resume
        } else if has(&["포트폴리오", "portfolio"]) {
            DocumentRole::Portfolio
        } else if has(&["자기소개서", "자소서", "essay", "statement", "cover"]) {
            DocumentRole::Statement
        } else {
            DocumentRole::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentRole::Resume => "이력서 (Resume)",
            DocumentRole::Portfolio => "포트폴리오 (Portfolio)",
            DocumentRole::Statement => "자기소개서 (Personal Statement)",
            DocumentRole::Other => "기타 문서 (Other)",
        }
    }
}

/// Numbered `{i}. {file} - {role}` lines, in input order.
pub fn describe_documents<'a>(file_names: impl IntoIterator<Item = &'a str>) -> String {
    file_names
        .into_iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {} - {}", i + 1, name, DocumentRole::infer(name).label()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn validate_object_key(key: &str) -> Result<(), PipelineError> {
    let invalid = || {
        PipelineError::InvalidInput(format!(
            "Invalid document key '{key}': expected {{token}}/{{filename}}.pdf"
        ))
    };
    let (token, file) = key.split_once('/').ok_or_else(invalid)?;
    let stem_len = file.len().saturating_sub(".pdf".len());
    if token.trim().is_empty() || file.contains('/') || stem_len == 0 || !has_pdf_extension(file) {
        return Err(invalid());
    }
    Ok(())
}

fn has_pdf_extension(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Collaborators of the applicant branch.
pub struct ApplicantDeps<'a> {
    pub generator: &'a dyn TextGenerator,
    pub documents: &'a Arc<dyn DocumentService>,
    pub objects: &'a dyn ObjectStore,
    pub max_wait: Duration,
}

pub async fn analyze_applicant(
    deps: ApplicantDeps<'_>,
    source: ApplicantSource,
    applicant_name: Option<&str>,
) -> Result<EvaluationRecord, PipelineError> {
    let mut record = match source {
        ApplicantSource::Text(text) => analyze_text(deps.generator, &text).await?,
        ApplicantSource::Documents(refs) => analyze_documents(&deps, &refs).await?,
    };

    let corrected = record.enforce_evidence_policy();
    if corrected > 0 {
        warn!("Evidence policy reset {corrected} applicant axis score(s)");
    }
    if let Some(name) = applicant_name.map(str::trim).filter(|n| !n.is_empty()) {
        record.profile_meta.subject_name = Some(name.to_string());
    }
    Ok(record)
}

async fn analyze_text(generator: &dyn TextGenerator, text: &str) -> Result<EvaluationRecord, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::InvalidInput("Applicant text is empty".to_string()));
    }
    info!("Analyzing applicant text ({} chars)", text.len());

    let system = system_message(APPLICANT_ROLE);
    let prompt = applicant_text_prompt(text);
    let output = generator.generate(GenerationRequest::new(&system, &prompt)).await?;

    let mut record: EvaluationRecord = extract_as(output, Stage::Applicant)?;
    record.source = Some(SourceInfo::Text {
        characters: text.chars().count(),
    });
    Ok(record)
}

async fn analyze_documents(deps: &ApplicantDeps<'_>, refs: &[DocumentRef]) -> Result<EvaluationRecord, PipelineError> {
    if refs.is_empty() {
        return Err(PipelineError::InvalidInput(
            "At least one applicant document is required".to_string(),
        ));
    }
    for doc in refs {
        match doc {
            DocumentRef::ObjectKey(key) => validate_object_key(key)?,
            DocumentRef::LocalPath(path) if !has_pdf_extension(&path.to_string_lossy()) => {
                return Err(PipelineError::InvalidInput(format!(
                    "Only PDF documents are supported: {}",
                    path.display()
                )));
            }
            DocumentRef::LocalPath(_) => {}
        }
    }

    let mut uploads = Vec::with_capacity(refs.len());
    for doc in refs {
        uploads.push(DocumentUpload {
            display_name: doc.file_name(),
            bytes: load_document(deps.objects, doc).await?,
        });
    }
    let files: Vec<String> = uploads.iter().map(|u| u.display_name.clone()).collect();

    let lease = DocumentLease::acquire(Arc::clone(deps.documents), uploads, deps.max_wait).await?;

    let system = system_message(APPLICANT_ROLE);
    let prompt = applicant_documents_prompt(&describe_documents(files.iter().map(String::as_str)));
    info!("Analyzing {} applicant document(s) in one request", lease.handles().len());

    let generated = {
        let request = GenerationRequest::new(&system, &prompt).with_attachments(lease.handles());
        deps.generator.generate(request).await
    };
    let released = lease.release().await;
    if released < files.len() {
        warn!("Released {released} of {} remote document(s)", files.len());
    }

    let mut record: EvaluationRecord = extract_as(generated?, Stage::Applicant)?;
    record.profile_meta.source_document_ids = files.clone();
    record.source = Some(SourceInfo::Documents { files });
    Ok(record)
}

async fn load_document(objects: &dyn ObjectStore, doc: &DocumentRef) -> Result<Bytes, PipelineError> {
    let storage_error = |message: String| PipelineError::DocumentStorage {
        key: doc.describe(),
        message,
    };
    match doc {
        DocumentRef::ObjectKey(key) => objects.fetch(key).await.map_err(|e| storage_error(e.to_string())),
        DocumentRef::LocalPath(path) => read_local(path).await.map_err(storage_error),
    }
}

async fn read_local(path: &Path) -> Result<Bytes, String> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    info!("Loaded local document {} ({} bytes)", path.display(), data.len());
    Ok(Bytes::from(data))
}
