//! Prompts for vision-LLM résumé analysis.
//!
//! Callers can override the default via
//! [`crate::config::AnalysisConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default analysis prompt.
///
/// `{market}` is replaced with [`crate::config::AnalysisConfig::salary_market`]
/// by [`analysis_prompt`].
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"Analyse the attached résumé and return ONLY the JSON object below.
You MUST return pure JSON: NO markdown, NO code fences, NO explanations.

{
    "skills": [],
    "career": "",
    "recommendation": "",
    "career_meta": {
        "type": 0,
        "estimatedYears": 0,
        "averageSalary": 0,
        "jobGrowth": 0,
        "futureCareer": true
    }
}

Rules:
- skills: concrete skills found in the résumé, one short name each
- career: the single career path you recommend for this person
- recommendation: one or two sentences explaining the recommendation
- type: 0=Tech, 1=Business, 2=Health, 3=Creative, 4=Operational
- estimatedYears: whole years needed to get started in the career
- averageSalary: average monthly salary for the career in {market}
- jobGrowth: integer from 0 to 100 describing the growth outlook
- futureCareer: true if the career is expected to stay relevant"#;

/// Text sent alongside the attachment in the user turn.
pub const USER_INSTRUCTION: &str = "Here is the résumé.";

/// Render the default prompt for the given salary market.
pub fn analysis_prompt(market: &str) -> String {
    DEFAULT_ANALYSIS_PROMPT.replace("{market}", market)
}
