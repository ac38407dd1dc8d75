// Shared prompt fragments.
// Each module that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments only.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the interviewer from putting words in the candidate's mouth.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    Never claim the candidate said or did something they did not state. \
    Never invent technologies, employers, or projects on their behalf.";
