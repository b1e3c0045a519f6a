use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::applicant::{ApplicantSource, DocumentRef};
use super::pipeline::{PersistenceReport, RunMeta};
use crate::errors::AppError;
use crate::models::comparison::ComparisonRecord;
use crate::models::evaluation::EvaluationRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CultureFitRequest {
    pub company_url: String,
    pub applicant_s3_keys: Vec<String>,
    #[serde(default)]
    pub applicant_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompanyRequest {
    pub company_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplicantRequest {
    #[serde(default)]
    pub s3_keys: Option<Vec<String>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub applicant_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub company_name: String,
    pub applicant_name: String,
}

/// Failures never reach this shape; they render through `AppError::Analysis`.
#[derive(Debug, Serialize)]
pub struct RunStatus {
    pub success: bool,
    pub elapsed_seconds: f64,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RunStatus {
    fn succeeded(elapsed_seconds: f64) -> Self {
        Self {
            success: true,
            elapsed_seconds,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CultureFitResponse {
    pub organization: EvaluationRecord,
    pub applicant: EvaluationRecord,
    pub comparison: ComparisonRecord,
    pub status: RunStatus,
    pub meta: RunMeta,
}

#[derive(Debug, Serialize)]
pub struct CompanyResponse {
    pub organization: EvaluationRecord,
    pub status: RunStatus,
    pub persistence: PersistenceReport,
}

#[derive(Debug, Serialize)]
pub struct ApplicantResponse {
    pub applicant: EvaluationRecord,
    pub status: RunStatus,
    pub persistence: PersistenceReport,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub comparison: ComparisonRecord,
    pub status: RunStatus,
    pub persistence: PersistenceReport,
}

fn require_http_url(url: &str) -> Result<&str, AppError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(AppError::Validation(format!(
            "company_url must be an http(s) URL, got '{url}'"
        )))
    }
}

fn object_keys(keys: Vec<String>) -> Result<ApplicantSource, AppError> {
    if keys.is_empty() {
        return Err(AppError::Validation(
            "At least one applicant document key is required".to_string(),
        ));
    }
    Ok(ApplicantSource::Documents(
        keys.into_iter().map(DocumentRef::ObjectKey).collect(),
    ))
}

fn non_blank(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// POST /api/culture-fit/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<CultureFitRequest>,
) -> Result<Json<CultureFitResponse>, AppError> {
    let company_url = require_http_url(&req.company_url)?;
    let applicant = object_keys(req.applicant_s3_keys)?;
    let applicant_name = non_blank(req.applicant_name);
    info!("Culture-fit analysis requested for {company_url}");

    let result = state
        .pipeline
        .run_full_analysis(company_url, applicant, applicant_name.as_deref())
        .await?;

    Ok(Json(CultureFitResponse {
        organization: result.organization,
        applicant: result.applicant,
        comparison: result.comparison,
        status: RunStatus::succeeded(result.meta.elapsed_seconds),
        meta: result.meta,
    }))
}

/// POST /api/culture-fit/company
pub async fn handle_company(
    State(state): State<AppState>,
    Json(req): Json<CompanyRequest>,
) -> Result<Json<CompanyResponse>, AppError> {
    let company_url = require_http_url(&req.company_url)?;
    let result = state.pipeline.run_organization_analysis(company_url).await?;

    Ok(Json(CompanyResponse {
        organization: result.record,
        status: RunStatus::succeeded(result.elapsed_seconds),
        persistence: result.persistence,
    }))
}

/// POST /api/culture-fit/applicant
pub async fn handle_applicant(
    State(state): State<AppState>,
    Json(req): Json<ApplicantRequest>,
) -> Result<Json<ApplicantResponse>, AppError> {
    let source = match (req.s3_keys, req.text) {
        (Some(keys), None) => object_keys(keys)?,
        (None, Some(text)) => ApplicantSource::Text(text),
        _ => {
            return Err(AppError::Validation(
                "Provide exactly one of 's3_keys' or 'text'".to_string(),
            ))
        }
    };
    let applicant_name = non_blank(req.applicant_name);

    let result = state
        .pipeline
        .run_applicant_analysis(source, applicant_name.as_deref())
        .await?;

    Ok(Json(ApplicantResponse {
        applicant: result.record,
        status: RunStatus::succeeded(result.elapsed_seconds),
        persistence: result.persistence,
    }))
}

/// POST /api/culture-fit/compare
pub async fn handle_compare(
    State(state): State<AppState>,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    if state.pipeline.store.is_none() {
        return Err(AppError::Unavailable(
            "Comparing stored records requires DATABASE_URL".to_string(),
        ));
    }
    let company_name = req.company_name.trim();
    let applicant_name = req.applicant_name.trim();
    if company_name.is_empty() || applicant_name.is_empty() {
        return Err(AppError::Validation(
            "company_name and applicant_name must not be empty".to_string(),
        ));
    }

    let result = state
        .pipeline
        .compare_stored(company_name, applicant_name)
        .await?;

    Ok(Json(CompareResponse {
        comparison: result.record,
        status: RunStatus::succeeded(result.elapsed_seconds),
        persistence: result.persistence,
    }))
}
