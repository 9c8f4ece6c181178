// Prompt text for immigration report generation.
// Cross-cutting output rules come from llm_client::prompts.

use serde::{Deserialize, Serialize};

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, MARKDOWN_OUTPUT_INSTRUCTION};

const NOT_SPECIFIED: &str = "Not specified";

/// System prompt template. `{grounding_instruction}` and
/// `{markdown_instruction}` are filled by [`system_prompt`].
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a senior Canadian immigration consultant (RCIC) with 15+ years of experience.
You write direct, actionable, expert-level reports. No generic praise, no filler, no repetition.

{grounding_instruction}

Structure the report exactly as follows:

# Immigration Eligibility & Guidance Report

## Profile Summary
Two or three factual sentences: age, education, experience, current CRS score if applicable, primary pathway.

## Eligibility Analysis
For Express Entry give the CRS breakdown (age, education, experience, language, additional factors) and the total.
For other pathways list each requirement as met or not met with the specific gap.

## Improvement Roadmap
A Markdown table with columns: Action | Current Status | Required Action | Impact | Timeline | Cost.
One row per line, every row starts and ends with a pipe, no empty cells (use N/A).

## Recommended Pathway
A phased, chronological plan with deadlines and the expected timeline to PR.
When several pathways are viable, compare them with specific pros, cons and timelines.

## Professional Recommendations
Immediate actions (this week), short-term (30 days), medium-term (3-6 months), and important notes.

Length: 400-800 words.

{markdown_instruction}"#;

/// User prompt template. Each `{field}` is replaced by [`build_user_prompt`].
const USER_PROMPT_TEMPLATE: &str = r#"# User Immigration Profile

**Goal Path:** {path}

## Personal Information

- **Age:** {age}
- **Marital Status:** {marital_status}
- **Citizenship:** {citizenship}
- **Current Country of Residence:** {residence_country}

## Education

- **Highest Degree:** {highest_degree}
- **Field of Study:** {field_of_study}
- **Canadian Credential:** {canadian_credential}
- **ECA Completed:** {eca_completed}

## Language Proficiency

- **English Test:** {english_test}
- **Scores (L/R/W/S):** {english_scores}
- **French Test:** {french_test}
- **Scores (if any):** {french_scores}

## Work Experience

- **Foreign Experience (years):** {foreign_experience_years}
- **Canadian Experience (years):** {canadian_experience_years}
- **Occupation / NOC Code:** {occupation_noc}

## Proof of Funds

- **Available Settlement Funds (CAD):** {funds}

## Family and Relatives

- **Spouse Accompanying:** {spouse}
- **Sibling in Canada:** {sibling_in_canada}
- **Other Relatives in Canada:** {relative_in_canada}

## Additional Notes

{user_notes}

# Task

Analyze the profile above according to IRCC's official rules for the selected pathway,
then produce a complete Markdown report in the format defined in your instructions."#;

/// Applicant profile submitted for a report. Everything but the goal path is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportProfile {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub path: String,
    pub age: Option<i32>,
    pub marital_status: Option<String>,
    pub citizenship: Option<String>,
    pub residence_country: Option<String>,
    pub highest_degree: Option<String>,
    pub field_of_study: Option<String>,
    pub canadian_credential: Option<String>,
    pub eca_completed: Option<String>,
    pub english_test: Option<String>,
    pub english_scores: Option<String>,
    pub french_test: Option<String>,
    pub french_scores: Option<String>,
    pub foreign_experience_years: Option<i32>,
    pub canadian_experience_years: Option<i32>,
    pub occupation_noc: Option<String>,
    pub funds: Option<String>,
    pub spouse: Option<String>,
    pub sibling_in_canada: Option<String>,
    pub relative_in_canada: Option<String>,
    pub user_notes: Option<String>,
}

pub fn system_prompt() -> String {
    SYSTEM_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{markdown_instruction}", MARKDOWN_OUTPUT_INSTRUCTION)
}

/// Blank text and zero counts read as "Not specified".
fn text(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_SPECIFIED)
        .to_string()
}

fn number(value: Option<i32>) -> String {
    value
        .filter(|v| *v != 0)
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

pub fn build_user_prompt(profile: &ReportProfile) -> String {
    let path = if profile.path.trim().is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        profile.path.trim().to_string()
    };
    let notes = profile
        .user_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("None");

    USER_PROMPT_TEMPLATE
        .replace("{path}", &path)
        .replace("{age}", &number(profile.age))
        .replace("{marital_status}", &text(&profile.marital_status))
        .replace("{citizenship}", &text(&profile.citizenship))
        .replace("{residence_country}", &text(&profile.residence_country))
        .replace("{highest_degree}", &text(&profile.highest_degree))
        .replace("{field_of_study}", &text(&profile.field_of_study))
        .replace("{canadian_credential}", &text(&profile.canadian_credential))
        .replace("{eca_completed}", &text(&profile.eca_completed))
        .replace("{english_test}", &text(&profile.english_test))
        .replace("{english_scores}", &text(&profile.english_scores))
        .replace("{french_test}", &text(&profile.french_test))
        .replace("{french_scores}", &text(&profile.french_scores))
        .replace("{foreign_experience_years}", &number(profile.foreign_experience_years))
        .replace("{canadian_experience_years}", &number(profile.canadian_experience_years))
        .replace("{occupation_noc}", &text(&profile.occupation_noc))
        .replace("{funds}", &text(&profile.funds))
        .replace("{spouse}", &text(&profile.spouse))
        .replace("{sibling_in_canada}", &text(&profile.sibling_in_canada))
        .replace("{relative_in_canada}", &text(&profile.relative_in_canada))
        // Notes go last so user text containing "{...}" is never substituted.
        .replace("{user_notes}", notes)
}
