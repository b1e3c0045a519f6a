//! Organization branch: fetch → match → fetch supplementary → collect → score.

use serde_json::Value;
use tracing::{info, warn};

use super::error::{PipelineError, Stage};
use super::organizations::{OrganizationCatalog, OrganizationMatch};
use super::output::{extract_as, extract_object};
use super::prompts::{collect_prompt, score_prompt, COLLECT_ROLE, SCORE_ROLE};
use super::sources::ContentFetcher;
use crate::llm_client::prompts::system_message;
use crate::llm_client::{GenerationRequest, TextGenerator};
use crate::models::evaluation::{EvaluationRecord, SourceInfo};

/// Fetched material for one organization, ready for the provider.
#[derive(Debug, Clone)]
pub struct CollectedSources {
    pub organization: String,
    pub primary_url: String,
    pub urls: Vec<String>,
    pub combined: String,
}

/// Fetches the primary page, identifies the organization and fetches its
/// supplementary pages.
///
/// An unknown organization fails before any supplementary fetch. Failed
/// supplementary pages are kept as `(failed)` sections instead of aborting.
pub async fn collect_sources(
    fetcher: &mut dyn ContentFetcher,
    catalog: &OrganizationCatalog,
    url: &str,
) -> Result<CollectedSources, PipelineError> {
    let url = url.trim();
    info!("Fetching primary source {url} ({})", fetcher.strategy());

    let primary = fetcher.fetch(url).await;
    if !primary.success {
        return Err(PipelineError::Fetch {
            url: url.to_string(),
            message: primary.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let organization = match catalog.match_text(&primary.content) {
        OrganizationMatch::Matched(org) => org,
        OrganizationMatch::Unmatched => {
            warn!("No known organization mentioned at {url}");
            return Err(PipelineError::UnsupportedOrganization {
                known: catalog.names(),
            });
        }
    };
    info!(
        "Matched organization '{}' ({} supplementary sources)",
        organization.name,
        organization.supplementary_urls.len()
    );

    let mut sections = vec![format!("=== Job posting: {url} ===\n{}", primary.content)];
    for result in fetcher.fetch_all(&organization.supplementary_urls).await {
        if result.success {
            sections.push(format!("=== {} ===\n{}", result.url, result.content));
        } else {
            let error = result.error.unwrap_or_default();
            warn!("Supplementary source {} failed: {error}", result.url);
            sections.push(format!("=== {} (failed) ===\n{error}", result.url));
        }
    }

    let mut urls = Vec::with_capacity(organization.supplementary_urls.len() + 1);
    urls.push(url.to_string());
    urls.extend(organization.supplementary_urls.iter().cloned());

    Ok(CollectedSources {
        organization: organization.name.clone(),
        primary_url: url.to_string(),
        urls,
        combined: sections.join("\n\n"),
    })
}

/// Runs the whole organization branch. The fetcher is closed once source
/// collection ends, whatever its outcome, and before any provider call.
pub async fn analyze_organization(
    mut fetcher: Box<dyn ContentFetcher>,
    catalog: &OrganizationCatalog,
    generator: &dyn TextGenerator,
    url: &str,
) -> Result<EvaluationRecord, PipelineError> {
    let collected = collect_sources(fetcher.as_mut(), catalog, url).await;
    fetcher.close().await;
    let sources = collected?;

    evaluate_sources(generator, sources).await
}

async fn evaluate_sources(
    generator: &dyn TextGenerator,
    sources: CollectedSources,
) -> Result<EvaluationRecord, PipelineError> {
    info!(
        "Collecting company data for '{}' ({} chars of source text)",
        sources.organization,
        sources.combined.len()
    );
    let system = system_message(COLLECT_ROLE);
    let prompt = collect_prompt(&sources.combined);
    let output = generator.generate(GenerationRequest::new(&system, &prompt)).await?;
    let collected = extract_object(output, Stage::Collect)?;

    info!("Scoring culture axes for '{}'", sources.organization);
    let system = system_message(SCORE_ROLE);
    let prompt = score_prompt(&Value::Object(collected));
    let output = generator.generate(GenerationRequest::new(&system, &prompt)).await?;
    let mut record: EvaluationRecord = extract_as(output, Stage::Score)?;

    let corrected = record.enforce_evidence_policy();
    if corrected > 0 {
        warn!(
            "Evidence policy reset {corrected} axis score(s) for '{}'",
            sources.organization
        );
    }

    record.profile_meta.subject_name = Some(sources.organization.clone());
    record.profile_meta.source_document_ids = sources.urls.clone();
    record.source = Some(SourceInfo::Web {
        organization: sources.organization,
        primary_url: sources.primary_url,
        urls: sources.urls,
    });
    Ok(record)
}
