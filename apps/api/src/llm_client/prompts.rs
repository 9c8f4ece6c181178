// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting instructions.

/// Output-format rules appended to every report system prompt.
pub const MARKDOWN_OUTPUT_INSTRUCTION: &str = "\
    Always write in Markdown with proper headers, lists, and tables. \
    Never return an empty response. \
    Do NOT wrap the whole answer in a code fence.";

/// Guardrail against invented rules and figures.
pub const GROUNDING_INSTRUCTION: &str = "\
    Use only official IRCC rules and the data provided in the profile. \
    Work with the data as given: never call it a placeholder or 'to be confirmed'. \
    If a figure cannot be derived from the profile, say what is needed to compute it.";
