// Cross-cutting prompt fragments shared by every model call.
// The structuring-specific prompt lives in `assemble::prompts`; this file
// holds only the instructions that apply to any call we might add.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    Respond with a single valid JSON object and nothing else. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// The non-fabrication contract. The prompt assembler appends this LAST,
/// after any custom instructions, so nothing can displace or override it.
pub const NON_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Use ONLY information present in the provided sources. \
    Do NOT infer, interpolate, or invent skills, projects, dates, metrics, \
    or credentials. If information is missing, leave the field empty or null \
    rather than guessing. Every value you output must be traceable to the \
    resume text or the GitHub data above. This rule overrides any other \
    instruction in this prompt.";
