//! Skill Aggregator: turns analyzed answers into per-user proficiency records.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::analyzer::{ConfidenceLevel, ResponseAnalysis};
use crate::interview::session::TurnRecord;
use crate::retry::with_retry;
use crate::skills::proficiency::{
    apply_observation, clamp_confidence, normalize_skill_name, SkillMention, SkillObservation,
    SkillProficiencyRecord,
};
use crate::skills::repository::SkillRepository;

const MAX_EVIDENCE_CHARS: usize = 500;

/// Confidence attached to a skill detected in an answer of the given tone.
pub fn confidence_for(level: ConfidenceLevel) -> f64 {
    match level {
        ConfidenceLevel::Confident => 0.9,
        ConfidenceLevel::Uncertain => 0.6,
        ConfidenceLevel::Struggling => 0.3,
    }
}

/// Skill candidates from one answer: buzzwords then new topics, de-duplicated
/// case-insensitively in first-seen order.
pub fn extract_observations(
    user_id: &str,
    session_id: &str,
    utterance: &str,
    analysis: &ResponseAnalysis,
    turn: &TurnRecord,
) -> Vec<SkillObservation> {
    let mut seen: Vec<String> = Vec::new();
    let evidence: String = utterance.chars().take(MAX_EVIDENCE_CHARS).collect();

    analysis
        .buzzwords
        .iter()
        .chain(&analysis.new_topics)
        .filter(|name| {
            let key = normalize_skill_name(name);
            if key.is_empty() || seen.contains(&key) {
                return false;
            }
            seen.push(key);
            true
        })
        .map(|name| SkillObservation {
            user_id: user_id.to_string(),
            skill_name: name.trim().to_string(),
            confidence: confidence_for(analysis.confidence_level),
            engagement_level: analysis.engagement_level,
            topic_depth: turn.topic_depth,
            session_id: session_id.to_string(),
            turn_index: turn.turn_index,
            evidence: evidence.clone(),
            context_path: turn.context_path.clone(),
        })
        .collect()
}

pub struct SkillAggregator {
    repo: Arc<dyn SkillRepository>,
    /// Serializes read-modify-write per (user, skill) across worker shards.
    locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl SkillAggregator {
    pub fn new(repo: Arc<dyn SkillRepository>) -> Self {
        Self {
            repo,
            locks: DashMap::new(),
        }
    }

    /// Folds the observation into the user's record for that skill and appends an
    /// audit mention. Each write is retried on its own so a failed mention never
    /// re-applies the averaging.
    pub async fn upsert(
        &self,
        observation: &SkillObservation,
    ) -> Result<SkillProficiencyRecord, AppError> {
        let skill_name = normalize_skill_name(&observation.skill_name);
        if skill_name.is_empty() {
            return Err(AppError::Validation("skill name cannot be empty".to_string()));
        }

        let lock = self
            .locks
            .entry((observation.user_id.clone(), skill_name.clone()))
            .or_default()
            .clone();
        let _guard = lock.lock().await;

        let existing = with_retry("skill lookup", || {
            self.repo.find_skill(&observation.user_id, &skill_name)
        })
        .await?;

        let mut record = apply_observation(existing.as_ref(), observation, Utc::now());
        let stored_id = with_retry("skill upsert", || self.repo.upsert_skill(&record)).await?;
        record.id = stored_id;

        let mention = SkillMention {
            id: Uuid::new_v4(),
            skill_id: record.id,
            session_id: observation.session_id.clone(),
            turn_index: observation.turn_index,
            evidence: observation.evidence.clone(),
            confidence: clamp_confidence(observation.confidence),
            engagement_level: observation.engagement_level,
            topic_depth: observation.topic_depth,
            context_path: observation.context_path.clone(),
        };
        with_retry("skill mention", || self.repo.append_mention(&mention)).await?;

        debug!(
            "Skill '{}' for user {}: mentions={}, proficiency={}",
            record.skill_name, record.user_id, record.mention_count, record.proficiency_score
        );
        Ok(record)
    }
}
