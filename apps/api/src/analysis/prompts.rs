// Stage prompts for the culture-fit pipeline.
// Shared rule fragments (JSON-only output, evidence, no judgement) come from
// llm_client::prompts::system_message.

use serde_json::Value;

pub const COLLECT_ROLE: &str = "\
    You are an analytical extraction assistant performing FACT COLLECTION. \
    Given scraped company materials (job posting, careers site, company pages), \
    produce a raw factual company and role profile. Prefer the job posting, then \
    the careers site, then other official pages. Use null or [] for anything not \
    explicitly stated.";

pub const SCORE_ROLE: &str = "\
    You are an analytical extraction assistant. From the collected company data, \
    produce a company culture profile with the keys schema_version, profile_meta, \
    company_info_fields, scoring_axes and extraction_quality. Score the company-level \
    axes technical_fit_company, execution_style_company, collaboration_style_company, \
    ownership_company, growth_orientation_company and work_expectation_company on a \
    0-4 scale. Each axis has score, confidence (low|medium|high), summary and evidence.";

pub const APPLICANT_ROLE: &str = "\
    You are an analytical extraction assistant. From the candidate's materials \
    (resume, portfolio, personal statement), produce a developer profile with the keys \
    schema_version, profile_keywords, profile_meta, user_info_fields, scoring_axes and \
    extraction_quality. Score the axes technical_fit_user, execution_style_user, \
    collaboration_style_user, ownership_user, growth_orientation_user and \
    work_expectation_user on a 0-4 scale. Each axis has score, confidence \
    (low|medium|high), summary and evidence.";

pub const COMPARE_ROLE: &str = "\
    You are an analytical alignment assistant comparing a company culture profile \
    with a developer profile. Compare ONLY the shared axes you are given. Return one \
    JSON object with the keys axis_comparisons and overall. axis_comparisons maps each \
    shared axis name to an object with status (scored|unknown), axis_score (0, 25, \
    50, 75 or 100; omit when unknown), confidence (0-1), summary, company_evidence and developer_evidence. \
    overall is {match_score, confidence, score_band, overall_notes}. Narrative \
    fields are written in Korean; quotes keep their original language.";

pub fn collect_prompt(combined_sources: &str) -> String {
    format!(
        "Extract the company profile from the sources below. Each source starts \
         with a `=== ... ===` separator line; sources marked (failed) could not be \
         fetched and contain only the error.\n\n\
         ## Collected Sources\n{combined_sources}\n\n\
         Respond with the JSON object only."
    )
}

pub fn score_prompt(collected: &Value) -> String {
    format!(
        "Score the company culture axes using the collected company data.\n\n\
         ## Organization Data\n{collected:#}\n\n\
         Respond with the JSON object only."
    )
}

/// `listing` holds one `{i}. {file} - {role}` line per attached document.
pub fn applicant_documents_prompt(listing: &str) -> String {
    format!(
        "Analyze the attached PDF documents for this candidate.\n\n\
         ## Attached Documents\n{listing}\n\n\
         Instructions:\n\
         - Integrate information from ALL attached documents\n\
         - Use the file name as doc_id in evidence to show which document a quote is from\n\
         - Score each axis from the combined evidence of all documents\n\
         - Mark anything not explicitly stated in any document as \"unknown\"\n\n\
         Respond with the JSON object only."
    )
}

pub fn applicant_text_prompt(text: &str) -> String {
    format!(
        "Analyze the candidate materials below.\n\n\
         ## Candidate Materials\n{text}\n\n\
         Respond with the JSON object only."
    )
}

pub fn compare_prompt(organization: &Value, applicant: &Value, shared_axes: &[&str]) -> String {
    format!(
        "Compare the following company and developer profiles.\n\n\
         Shared axes: {}\n\n\
         ## Organization Profile\n{organization:#}\n\n\
         ## Applicant Profile\n{applicant:#}\n\n\
         Respond with the JSON object only.",
        shared_axes.join(", ")
    )
}
