//! Response Analyzer: turns a raw answer into structured interview signals.
//!
//! Primary path: the LLM, bounded by a timeout, decoded strictly.
//! Any transport failure, timeout, or schema violation falls back to a deterministic
//! heuristic as a whole; a partially valid payload is never used. `analyze` never fails.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::interview::prompts::{analysis_system, build_analysis_prompt};
use crate::llm_client::{strip_json_fences, ChatMessage, ChatModel, LlmError};

pub const SIGNAL_SHORT_ANSWER: &str = "short_answer";
pub const SIGNAL_DONT_KNOW: &str = "dont_know";
pub const SIGNAL_VAGUE: &str = "vague";

const SHORT_ANSWER_WORDS: usize = 10;
const HIGH_ENGAGEMENT_WORDS: usize = 30;
const MEDIUM_ENGAGEMENT_WORDS: usize = 15;
const MAX_TOPIC_WORDS: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Signal types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
}

impl EngagementLevel {
    /// Integer scale used when averaging: low=1, medium=2, high=3.
    pub fn score(self) -> u8 {
        match self {
            EngagementLevel::Low => 1,
            EngagementLevel::Medium => 2,
            EngagementLevel::High => 3,
        }
    }

    /// Nearest category to an averaged score.
    pub fn from_score(score: f64) -> Self {
        match score.round() as i64 {
            i64::MIN..=1 => EngagementLevel::Low,
            2 => EngagementLevel::Medium,
            _ => EngagementLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngagementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(EngagementLevel::Low),
            "medium" => Ok(EngagementLevel::Medium),
            "high" => Ok(EngagementLevel::High),
            other => Err(format!("unknown engagement level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Detailed,
    Moderate,
    Brief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Confident,
    Uncertain,
    Struggling,
}

/// Structured signals for one answer. Field names match the JSON the model is asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseAnalysis {
    pub engagement_level: EngagementLevel,
    pub exhaustion_signals: BTreeSet<String>,
    pub new_topics: Vec<String>,
    pub response_length: ResponseLength,
    pub confidence_level: ConfidenceLevel,
    pub buzzwords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Model,
    Heuristic,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis: ResponseAnalysis,
    pub source: AnalysisSource,
}

#[derive(Debug, Error)]
enum AnalysisError {
    #[error("analysis unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("analysis timed out after {0:?}")]
    TimedOut(Duration),

    #[error("malformed analysis payload: {0}")]
    Malformed(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Adapter
// ────────────────────────────────────────────────────────────────────────────

pub struct ResponseAnalyzer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl ResponseAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Analyzes `utterance` given in answer to `topic`. Never fails: any problem with
    /// the model path yields the heuristic analysis instead.
    pub async fn analyze(&self, utterance: &str, topic: &str) -> AnalysisOutcome {
        match self.analyze_with_model(utterance, topic).await {
            Ok(analysis) => {
                debug!(
                    "Model analysis: engagement={}, new_topics={}",
                    analysis.engagement_level,
                    analysis.new_topics.len()
                );
                AnalysisOutcome {
                    analysis,
                    source: AnalysisSource::Model,
                }
            }
            Err(e) => {
                warn!("Falling back to heuristic analysis: {e}");
                AnalysisOutcome {
                    analysis: heuristic_analysis(utterance),
                    source: AnalysisSource::Heuristic,
                }
            }
        }
    }

    async fn analyze_with_model(
        &self,
        utterance: &str,
        topic: &str,
    ) -> Result<ResponseAnalysis, AnalysisError> {
        let system = analysis_system();
        let messages = [ChatMessage::user(build_analysis_prompt(topic, utterance))];

        let raw = tokio::time::timeout(self.timeout, self.model.complete(&system, &messages))
            .await
            .map_err(|_| AnalysisError::TimedOut(self.timeout))??;

        decode_analysis(&raw)
    }
}

/// Strict decode: every field present, no extras, valid enum values, no blank strings.
fn decode_analysis(raw: &str) -> Result<ResponseAnalysis, AnalysisError> {
    let analysis: ResponseAnalysis = serde_json::from_str(strip_json_fences(raw))
        .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

    let blank = analysis
        .exhaustion_signals
        .iter()
        .chain(&analysis.new_topics)
        .chain(&analysis.buzzwords)
        .any(|s| s.trim().is_empty());
    if blank {
        return Err(AnalysisError::Malformed(
            "payload contains blank strings".to_string(),
        ));
    }

    Ok(ResponseAnalysis {
        new_topics: analysis.new_topics.iter().map(|t| t.trim().to_string()).collect(),
        buzzwords: analysis.buzzwords.iter().map(|b| b.trim().to_string()).collect(),
        ..analysis
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Heuristic fallback
// ────────────────────────────────────────────────────────────────────────────

static TOPIC_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:working\s+on|worked\s+on|experience\s+(?:with|in)|speciali[sz](?:e|ed|ing)\s+in|focus(?:ed|ing)?\s+on|familiar\s+with|built)\s+",
    )
    .expect("Invalid regex")
});

/// Words that end a topic phrase.
const TOPIC_STOP_WORDS: &[&str] = &[
    "and", "or", "but", "for", "with", "at", "in", "on", "to", "from", "of", "since", "which",
    "that", "when", "where", "while", "because", "so", "as", "using", "like", "over", "under",
    "during", "into", "about", "is", "was", "are", "were",
];

const LEADING_FILLERS: &[&str] = &["a", "an", "the", "my", "our", "their", "some"];

/// A phrase opening with one of these refers back to something instead of naming it.
const VAGUE_REFERENTS: &[&str] = &[
    "it", "this", "that", "them", "these", "those", "something", "stuff", "things", "everything",
    "anything", "myself", "me", "us", "you",
];

/// Deterministic analysis used whenever the model path is unavailable.
/// Buzzwords stay empty: the heuristic never invents terms.
pub fn heuristic_analysis(utterance: &str) -> ResponseAnalysis {
    let word_count = utterance.split_whitespace().count();
    let lower = utterance.to_lowercase();

    let mut signals = BTreeSet::new();
    if word_count < SHORT_ANSWER_WORDS {
        signals.insert(SIGNAL_SHORT_ANSWER.to_string());
    }
    if lower.contains("don't know") || lower.contains("not sure") {
        signals.insert(SIGNAL_DONT_KNOW.to_string());
    }
    if lower.contains("i guess") || lower.contains("maybe") {
        signals.insert(SIGNAL_VAGUE.to_string());
    }

    let (engagement_level, response_length) = if word_count > HIGH_ENGAGEMENT_WORDS {
        (EngagementLevel::High, ResponseLength::Detailed)
    } else if word_count > MEDIUM_ENGAGEMENT_WORDS {
        (EngagementLevel::Medium, ResponseLength::Moderate)
    } else {
        (EngagementLevel::Low, ResponseLength::Brief)
    };

    let confidence_level = if signals.is_empty() {
        ConfidenceLevel::Confident
    } else {
        ConfidenceLevel::Uncertain
    };

    ResponseAnalysis {
        engagement_level,
        exhaustion_signals: signals,
        new_topics: extract_topics(utterance),
        response_length,
        confidence_level,
        buzzwords: Vec::new(),
    }
}

/// Pulls short noun phrases that follow phrases like "working on" or "experience with".
fn extract_topics(utterance: &str) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();

    for trigger in TOPIC_TRIGGER.find_iter(utterance) {
        let mut words: Vec<&str> = Vec::new();

        for raw in utterance[trigger.end()..].split_whitespace() {
            let word = raw.trim_end_matches(|c: char| ".,;:!?)\"'".contains(c));
            let lowered = word.to_lowercase();

            if words.is_empty() && LEADING_FILLERS.contains(&lowered.as_str()) {
                continue;
            }
            if words.is_empty() && VAGUE_REFERENTS.contains(&lowered.as_str()) {
                break;
            }
            if word.is_empty() || TOPIC_STOP_WORDS.contains(&lowered.as_str()) {
                break;
            }
            words.push(word);
            if word.len() != raw.len() || words.len() == MAX_TOPIC_WORDS {
                break;
            }
        }

        if words.is_empty() {
            continue;
        }
        let topic = words.join(" ");
        if !topics.iter().any(|t| t.eq_ignore_ascii_case(&topic)) {
            topics.push(topic);
        }
    }

    topics
}
