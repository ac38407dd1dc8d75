//! Skill proficiency math: incremental averaging over every detection of a skill.
//!
//! proficiency = round(100 × (0.4·avg_confidence + 0.4·engagement/3 + 0.2·frequency))
//! where frequency = min(mention_count / 10, 1). The score is not monotonic: a weak
//! later mention pulls the averages, and so the score, down.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interview::analyzer::EngagementLevel;

const CONFIDENCE_WEIGHT: f64 = 0.4;
const ENGAGEMENT_WEIGHT: f64 = 0.4;
const FREQUENCY_WEIGHT: f64 = 0.2;
/// Mentions needed for full frequency credit.
const FULL_FREQUENCY_MENTIONS: f64 = 10.0;
const FIRST_MENTION_FREQUENCY: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProficiencyRecord {
    pub id: Uuid,
    pub user_id: String,
    /// Normalized name; with `user_id` forms the record's key.
    pub skill_name: String,
    /// Name as first mentioned.
    pub display_name: String,
    pub mention_count: u32,
    pub avg_confidence: f64,
    pub avg_engagement: EngagementLevel,
    pub avg_topic_depth: f64,
    pub proficiency_score: u8,
    pub first_mentioned: DateTime<Utc>,
    pub last_mentioned: DateTime<Utc>,
}

/// Immutable audit row written for every detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMention {
    pub id: Uuid,
    pub skill_id: Uuid,
    pub session_id: String,
    pub turn_index: u32,
    pub evidence: String,
    pub confidence: f64,
    pub engagement_level: EngagementLevel,
    pub topic_depth: u32,
    pub context_path: Vec<String>,
}

/// One detection of a skill in one answer.
#[derive(Debug, Clone)]
pub struct SkillObservation {
    pub user_id: String,
    pub skill_name: String,
    pub confidence: f64,
    pub engagement_level: EngagementLevel,
    pub topic_depth: u32,
    pub session_id: String,
    pub turn_index: u32,
    pub evidence: String,
    pub context_path: Vec<String>,
}

/// Lowercased, trimmed, inner whitespace collapsed.
pub fn normalize_skill_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Categorical running average: categories map to 1–3, are averaged with the
/// previous mean weighted by `previous_count`, and the result is rounded back to
/// the nearest category. Lossy; callers only go through this function.
pub fn average_engagement(
    previous: EngagementLevel,
    previous_count: u32,
    latest: EngagementLevel,
) -> EngagementLevel {
    let total = f64::from(previous.score()) * f64::from(previous_count) + f64::from(latest.score());
    EngagementLevel::from_score(total / f64::from(previous_count + 1))
}

pub fn proficiency_score(
    avg_confidence: f64,
    engagement: EngagementLevel,
    frequency_credit: f64,
) -> u8 {
    let raw = 100.0
        * (CONFIDENCE_WEIGHT * avg_confidence
            + ENGAGEMENT_WEIGHT * f64::from(engagement.score()) / 3.0
            + FREQUENCY_WEIGHT * frequency_credit);
    raw.round().clamp(0.0, 100.0) as u8
}

fn frequency_credit(mention_count: u32) -> f64 {
    (f64::from(mention_count) / FULL_FREQUENCY_MENTIONS).min(1.0)
}

pub(crate) fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Folds one observation into the existing record, or starts a new one.
pub fn apply_observation(
    existing: Option<&SkillProficiencyRecord>,
    observation: &SkillObservation,
    now: DateTime<Utc>,
) -> SkillProficiencyRecord {
    let confidence = clamp_confidence(observation.confidence);
    let depth = f64::from(observation.topic_depth);

    match existing {
        Some(record) => {
            let count = record.mention_count;
            let new_count = count + 1;
            let avg_confidence =
                (record.avg_confidence * f64::from(count) + confidence) / f64::from(new_count);
            let avg_topic_depth =
                (record.avg_topic_depth * f64::from(count) + depth) / f64::from(new_count);
            let avg_engagement =
                average_engagement(record.avg_engagement, count, observation.engagement_level);

            SkillProficiencyRecord {
                mention_count: new_count,
                avg_confidence,
                avg_engagement,
                avg_topic_depth,
                proficiency_score: proficiency_score(
                    avg_confidence,
                    avg_engagement,
                    frequency_credit(new_count),
                ),
                last_mentioned: now,
                ..record.clone()
            }
        }
        None => SkillProficiencyRecord {
            id: Uuid::new_v4(),
            user_id: observation.user_id.clone(),
            skill_name: normalize_skill_name(&observation.skill_name),
            display_name: observation.skill_name.trim().to_string(),
            mention_count: 1,
            avg_confidence: confidence,
            avg_engagement: observation.engagement_level,
            avg_topic_depth: depth,
            proficiency_score: proficiency_score(
                confidence,
                observation.engagement_level,
                FIRST_MENTION_FREQUENCY,
            ),
            first_mentioned: now,
            last_mentioned: now,
        },
    }
}
