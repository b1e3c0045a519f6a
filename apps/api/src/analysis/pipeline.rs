//! Stage orchestrator.
//!
//! `run_full_analysis` is the only fan-out point: the organization and
//! applicant branches run concurrently on the current task, both are allowed
//! to finish, and the comparison runs only when both succeeded. Nothing from
//! a failed run is persisted or returned.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::applicant::{analyze_applicant, ApplicantDeps, ApplicantSource};
use super::compare::compare_records;
use super::error::{AnalysisFailure, PipelineError};
use super::organization::analyze_organization;
use super::organizations::OrganizationCatalog;
use super::sources::FetcherFactory;
use super::store::{CollectionKind, RecordStore};
use crate::llm_client::{DocumentService, TextGenerator};
use crate::models::comparison::ComparisonRecord;
use crate::models::evaluation::EvaluationRecord;
use crate::storage::ObjectStore;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub document_max_wait: Duration,
    pub save_to_db: bool,
}

pub struct AnalysisPipeline {
    pub generator: Arc<dyn TextGenerator>,
    pub documents: Arc<dyn DocumentService>,
    pub objects: Arc<dyn ObjectStore>,
    pub fetchers: Arc<dyn FetcherFactory>,
    pub catalog: Arc<OrganizationCatalog>,
    pub store: Option<Arc<dyn RecordStore>>,
    pub settings: PipelineSettings,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PersistenceReport {
    pub enabled: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub elapsed_seconds: f64,
    pub parallel_execution: bool,
    pub company_url: String,
    pub applicant_documents: usize,
    pub persistence: PersistenceReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullAnalysis {
    pub organization: EvaluationRecord,
    pub applicant: EvaluationRecord,
    pub comparison: ComparisonRecord,
    pub meta: RunMeta,
}

/// Result of a single-stage entry point.
#[derive(Debug, Clone, Serialize)]
pub struct Analyzed<T> {
    pub record: T,
    pub elapsed_seconds: f64,
    pub persistence: PersistenceReport,
}

fn elapsed_seconds(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 100.0).round() / 100.0
}

impl AnalysisPipeline {
    pub async fn run_full_analysis(
        &self,
        company_url: &str,
        applicant: ApplicantSource,
        applicant_name: Option<&str>,
    ) -> Result<FullAnalysis, AnalysisFailure> {
        let started = Instant::now();
        let applicant_documents = match &applicant {
            ApplicantSource::Documents(refs) => refs.len(),
            ApplicantSource::Text(_) => 0,
        };
        info!("Starting full analysis for {company_url} ({applicant_documents} applicant document(s))");

        let (organization, applicant) = tokio::join!(
            self.organization_branch(company_url),
            self.applicant_branch(applicant, applicant_name),
        );
        info!("Both branches finished after {:.2}s", elapsed_seconds(started));

        let (mut organization, mut applicant) = match (organization, applicant) {
            (Ok(organization), Ok(applicant)) => (organization, applicant),
            (Err(e), applicant) => {
                match applicant {
                    Ok(_) => warn!("Discarding completed applicant analysis"),
                    Err(other) => warn!("Applicant branch also failed: {other}"),
                }
                return Err(failure(e, started));
            }
            (Ok(_), Err(e)) => {
                warn!("Discarding completed organization analysis");
                return Err(failure(e, started));
            }
        };

        let mut comparison = compare_records(self.generator.as_ref(), &organization, &applicant)
            .await
            .map_err(|e| failure(e, started))?;

        let mut persistence = self.persistence_report();
        if persistence.enabled {
            self.save_evaluation(CollectionKind::Organizations, &mut organization, &mut persistence)
                .await;
            self.save_evaluation(CollectionKind::Applicants, &mut applicant, &mut persistence)
                .await;
            self.save_comparison(&mut comparison, &mut persistence).await;
        }

        let meta = RunMeta {
            elapsed_seconds: elapsed_seconds(started),
            parallel_execution: true,
            company_url: company_url.to_string(),
            applicant_documents,
            persistence,
        };
        info!("Full analysis finished in {:.2}s", meta.elapsed_seconds);

        Ok(FullAnalysis {
            organization,
            applicant,
            comparison,
            meta,
        })
    }

    pub async fn run_organization_analysis(&self, company_url: &str) -> Result<Analyzed<EvaluationRecord>, AnalysisFailure> {
        let started = Instant::now();
        let mut record = self
            .organization_branch(company_url)
            .await
            .map_err(|error| failure(error, started))?;

        let mut persistence = self.persistence_report();
        if persistence.enabled {
            self.save_evaluation(CollectionKind::Organizations, &mut record, &mut persistence)
                .await;
        }
        Ok(Analyzed {
            record,
            elapsed_seconds: elapsed_seconds(started),
            persistence,
        })
    }

    pub async fn run_applicant_analysis(
        &self,
        source: ApplicantSource,
        applicant_name: Option<&str>,
    ) -> Result<Analyzed<EvaluationRecord>, AnalysisFailure> {
        let started = Instant::now();
        let mut record = self
            .applicant_branch(source, applicant_name)
            .await
            .map_err(|error| failure(error, started))?;

        let mut persistence = self.persistence_report();
        if persistence.enabled {
            self.save_evaluation(CollectionKind::Applicants, &mut record, &mut persistence)
                .await;
        }
        Ok(Analyzed {
            record,
            elapsed_seconds: elapsed_seconds(started),
            persistence,
        })
    }

    /// Compares two previously stored records.
    pub async fn compare_stored(
        &self,
        organization_name: &str,
        applicant_name: &str,
    ) -> Result<Analyzed<ComparisonRecord>, AnalysisFailure> {
        let started = Instant::now();
        let result = async {
            let store = self.store.as_ref().ok_or_else(|| {
                PipelineError::Persistence("Record store is not configured".to_string())
            })?;
            let organization = load_record(store.as_ref(), CollectionKind::Organizations, organization_name).await?;
            let applicant = load_record(store.as_ref(), CollectionKind::Applicants, applicant_name).await?;
            compare_records(self.generator.as_ref(), &organization, &applicant).await
        }
        .await;
        let mut record = result.map_err(|error| failure(error, started))?;

        let mut persistence = self.persistence_report();
        if persistence.enabled {
            self.save_comparison(&mut record, &mut persistence).await;
        }
        Ok(Analyzed {
            record,
            elapsed_seconds: elapsed_seconds(started),
            persistence,
        })
    }

    async fn organization_branch(&self, company_url: &str) -> Result<EvaluationRecord, PipelineError> {
        analyze_organization(
            self.fetchers.create(),
            &self.catalog,
            self.generator.as_ref(),
            company_url,
        )
        .await
    }

    async fn applicant_branch(
        &self,
        source: ApplicantSource,
        applicant_name: Option<&str>,
    ) -> Result<EvaluationRecord, PipelineError> {
        let deps = ApplicantDeps {
            generator: self.generator.as_ref(),
            documents: &self.documents,
            objects: self.objects.as_ref(),
            max_wait: self.settings.document_max_wait,
        };
        analyze_applicant(deps, source, applicant_name).await
    }

    fn persistence_report(&self) -> PersistenceReport {
        PersistenceReport {
            enabled: self.settings.save_to_db && self.store.is_some(),
            errors: Vec::new(),
        }
    }

    async fn save_evaluation(
        &self,
        kind: CollectionKind,
        record: &mut EvaluationRecord,
        report: &mut PersistenceReport,
    ) {
        let subject = record.subject_name().unwrap_or("unknown").to_string();
        if let Some(id) = self.save(kind, &subject, record.to_value(), report).await {
            record.storage_id = Some(id);
        }
    }

    async fn save_comparison(&self, record: &mut ComparisonRecord, report: &mut PersistenceReport) {
        let subject = format!(
            "{} / {}",
            record.meta.organization_name.as_deref().unwrap_or("unknown"),
            record.meta.applicant_name.as_deref().unwrap_or("unknown")
        );
        if let Some(id) = self
            .save(CollectionKind::Comparisons, &subject, record.to_value(), report)
            .await
        {
            record.storage_id = Some(id);
        }
    }

    /// Persistence failures are reported, never raised.
    async fn save(
        &self,
        kind: CollectionKind,
        subject: &str,
        value: Value,
        report: &mut PersistenceReport,
    ) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.save(kind, subject, &value).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to save {kind} record for '{subject}': {e}");
                report.errors.push(format!("{kind}: {e}"));
                None
            }
        }
    }
}

fn failure(error: PipelineError, started: Instant) -> AnalysisFailure {
    let failure = AnalysisFailure {
        error,
        elapsed_seconds: elapsed_seconds(started),
    };
    error!("Analysis failed [{}]: {}", failure.kind(), failure);
    failure
}

async fn load_record(
    store: &dyn RecordStore,
    kind: CollectionKind,
    subject: &str,
) -> Result<EvaluationRecord, PipelineError> {
    let value = store
        .find(kind, subject)
        .await?
        .ok_or_else(|| PipelineError::MissingRecord {
            kind: kind.to_string(),
            subject: subject.to_string(),
        })?;
    serde_json::from_value(value)
        .map_err(|e| PipelineError::Persistence(format!("Stored {kind} record for '{subject}' is unreadable: {e}")))
}
