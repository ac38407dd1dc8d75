use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::interview::analyzer::EngagementLevel;
use crate::skills::proficiency::SkillProficiencyRecord;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillProficiencyRow {
    pub id: Uuid,
    pub user_id: String,
    pub skill_name: String,
    pub display_name: String,
    pub mention_count: i32,
    pub avg_confidence: f64,
    pub avg_engagement: String,
    pub avg_topic_depth: f64,
    pub proficiency_score: i32,
    pub first_mentioned: DateTime<Utc>,
    pub last_mentioned: DateTime<Utc>,
}

impl TryFrom<SkillProficiencyRow> for SkillProficiencyRecord {
    type Error = anyhow::Error;

    fn try_from(row: SkillProficiencyRow) -> Result<Self, Self::Error> {
        Ok(SkillProficiencyRecord {
            id: row.id,
            user_id: row.user_id,
            skill_name: row.skill_name,
            display_name: row.display_name,
            mention_count: u32::try_from(row.mention_count)?,
            avg_confidence: row.avg_confidence,
            avg_engagement: row
                .avg_engagement
                .parse::<EngagementLevel>()
                .map_err(anyhow::Error::msg)?,
            avg_topic_depth: row.avg_topic_depth,
            proficiency_score: u8::try_from(row.proficiency_score.clamp(0, 100))?,
            first_mentioned: row.first_mentioned,
            last_mentioned: row.last_mentioned,
        })
    }
}
