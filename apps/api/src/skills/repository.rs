//! Skill persistence. Proficiency rows are upserted on `(user_id, skill_name)`;
//! mention rows are insert-only.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::skill::SkillProficiencyRow;
use crate::skills::proficiency::{SkillMention, SkillProficiencyRecord};

#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Looks up by user and normalized skill name.
    async fn find_skill(
        &self,
        user_id: &str,
        skill_name: &str,
    ) -> Result<Option<SkillProficiencyRecord>, AppError>;

    /// Writes the record and returns the id stored for its key.
    async fn upsert_skill(&self, record: &SkillProficiencyRecord) -> Result<Uuid, AppError>;

    async fn append_mention(&self, mention: &SkillMention) -> Result<Uuid, AppError>;
}

pub struct PgSkillRepository {
    pool: PgPool,
}

impl PgSkillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SkillRepository for PgSkillRepository {
    async fn find_skill(
        &self,
        user_id: &str,
        skill_name: &str,
    ) -> Result<Option<SkillProficiencyRecord>, AppError> {
        let row: Option<SkillProficiencyRow> = sqlx::query_as(
            "SELECT * FROM skill_proficiencies WHERE user_id = $1 AND skill_name = $2",
        )
        .bind(user_id)
        .bind(skill_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SkillProficiencyRecord::try_from)
            .transpose()
            .map_err(AppError::Internal)
    }

    async fn upsert_skill(&self, record: &SkillProficiencyRecord) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO skill_proficiencies
                (id, user_id, skill_name, display_name, mention_count, avg_confidence,
                 avg_engagement, avg_topic_depth, proficiency_score, first_mentioned, last_mentioned)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id, skill_name) DO UPDATE SET
                mention_count = EXCLUDED.mention_count,
                avg_confidence = EXCLUDED.avg_confidence,
                avg_engagement = EXCLUDED.avg_engagement,
                avg_topic_depth = EXCLUDED.avg_topic_depth,
                proficiency_score = EXCLUDED.proficiency_score,
                last_mentioned = EXCLUDED.last_mentioned
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.user_id)
        .bind(&record.skill_name)
        .bind(&record.display_name)
        .bind(record.mention_count as i32)
        .bind(record.avg_confidence)
        .bind(record.avg_engagement.as_str())
        .bind(record.avg_topic_depth)
        .bind(i32::from(record.proficiency_score))
        .bind(record.first_mentioned)
        .bind(record.last_mentioned)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn append_mention(&self, mention: &SkillMention) -> Result<Uuid, AppError> {
        sqlx::query(
            r#"
            INSERT INTO skill_mentions
                (id, skill_id, session_id, turn_index, evidence, confidence,
                 engagement_level, topic_depth, context_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(mention.id)
        .bind(mention.skill_id)
        .bind(&mention.session_id)
        .bind(mention.turn_index as i32)
        .bind(&mention.evidence)
        .bind(mention.confidence)
        .bind(mention.engagement_level.as_str())
        .bind(mention.topic_depth as i32)
        .bind(&mention.context_path)
        .execute(&self.pool)
        .await?;

        Ok(mention.id)
    }
}
