// Shared prompt constants and prompt-building utilities.
// Each pipeline stage defines its own prompts alongside it (analysis/prompts.rs).
// This file contains cross-cutting prompt fragments.

/// Appended to every system instruction that expects a JSON answer.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Output MUST be ONE valid JSON object. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common evidence rule shared by the extraction, scoring and comparison stages.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Use ONLY what is explicitly present in the provided material. \
    Do NOT use external knowledge and do NOT infer missing details. \
    Never assign a score above zero without at least one evidence item \
    {doc_id, line_refs, quote}; quotes must be short verbatim excerpts. \
    If evidence is missing the score MUST be 0, the confidence MUST be \"low\" \
    and the summary MUST be \"unknown\".";

/// Descriptive, non-judgemental register for every narrative field.
pub const NO_JUDGEMENT_INSTRUCTION: &str = "\
    You are NOT a hiring decision-maker. Do NOT conclude good or bad fit and \
    do NOT use evaluative adjectives unless they appear verbatim in the input.";

/// Joins a stage-specific system message with the shared fragments.
pub fn system_message(role: &str) -> String {
    format!("{role}\n\n{NO_JUDGEMENT_INSTRUCTION}\n\n{EVIDENCE_INSTRUCTION}\n\n{JSON_ONLY_INSTRUCTION}")
}
