// Interview LLM prompt templates.
// All prompts for the interview module are defined here.

use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};

const ANALYSIS_INSTRUCTIONS: &str = "\
You analyze a single answer given by a candidate in a technical interview. \
Judge how substantive the answer is, whether the candidate has run out of things to say \
on the topic, which new subtopics they opened up, and which domain terms they used. \
Only report topics and terms that literally appear in the answer.";

const ANALYSIS_OUTPUT_SCHEMA: &str = r#"OUTPUT SCHEMA (return exactly this structure, no other fields):
{
  "engagementLevel": "high" | "medium" | "low",
  "exhaustionSignals": ["string"],   // e.g. "dont_know", "vague", "short_answer", "repeating"; [] if none
  "newTopics": ["string"],           // subtopics the candidate introduced that are worth probing deeper
  "responseLength": "detailed" | "moderate" | "brief",
  "confidenceLevel": "confident" | "uncertain" | "struggling",
  "buzzwords": ["string"]            // technologies, tools, methods named in the answer
}"#;

const INTERVIEWER_ROLE: &str = "\
You are a thoughtful technical interviewer holding a free-form conversation. \
Ask exactly one question per reply and keep replies under 80 words. \
Follow the candidate's lead when they show depth; move on gracefully when they do not.";

const WRAP_UP_INSTRUCTION: &str = "\
The interview has covered everything it usefully can. Thank the candidate, \
briefly reflect one or two strengths they showed, and close the conversation \
without asking another question.";

pub fn analysis_system() -> String {
    format!("{JSON_ONLY_SYSTEM} {ANALYSIS_INSTRUCTIONS}")
}

/// Topic and answer are inserted verbatim in one pass; neither is re-scanned for placeholders.
pub fn build_analysis_prompt(topic: &str, utterance: &str) -> String {
    format!("CURRENT TOPIC: {topic}\n\nCANDIDATE ANSWER:\n{utterance}\n\n{ANALYSIS_OUTPUT_SCHEMA}")
}

/// What the interviewer needs to know about the tree to pick its next question.
#[derive(Debug, Clone, Default)]
pub struct InterviewerContext {
    pub current_topic: String,
    pub depth: u32,
    pub path: Vec<String>,
    pub exhausted_topics: Vec<String>,
    pub open_subtopics: Vec<String>,
    pub concluded: bool,
}

pub fn build_interviewer_system(ctx: &InterviewerContext) -> String {
    if ctx.concluded {
        return format!("{INTERVIEWER_ROLE}\n\n{WRAP_UP_INSTRUCTION}\n\n{NO_FABRICATION_INSTRUCTION}");
    }

    let mut system = format!(
        "{INTERVIEWER_ROLE}\n\nCURRENT TOPIC: {} (depth {})\nPATH: {}",
        ctx.current_topic,
        ctx.depth,
        ctx.path.join(" > ")
    );
    if !ctx.open_subtopics.is_empty() {
        system.push_str(&format!(
            "\nSUBTOPICS WORTH PROBING: {}",
            ctx.open_subtopics.join(", ")
        ));
    }
    if !ctx.exhausted_topics.is_empty() {
        system.push_str(&format!(
            "\nDO NOT RETURN TO (already exhausted): {}",
            ctx.exhausted_topics.join(", ")
        ));
    }
    system.push_str("\n\n");
    system.push_str(NO_FABRICATION_INSTRUCTION);
    system
}
