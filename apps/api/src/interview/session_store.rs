//! Durable session rows and periodic summary snapshots.
//!
//! Summary snapshots are append-only: each is uploaded to S3 as JSON under
//! `sessions/{session_id}/summary-t{turn}.json` and then recorded in
//! `session_summaries`.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::grading::SessionSummary;
use crate::models::session::InterviewSessionRow;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<InterviewSessionRow, AppError>;

    async fn update_metrics(
        &self,
        session_id: &str,
        turn_count: u32,
        avg_engagement: f64,
        avg_score: f64,
    ) -> Result<(), AppError>;

    /// Stores a snapshot and returns its storage key.
    async fn save_summary(
        &self,
        session_id: &str,
        turn_index: u32,
        summary: &SessionSummary,
    ) -> Result<String, AppError>;
}

pub fn summary_key(session_id: &str, turn_index: u32) -> String {
    format!("sessions/{session_id}/summary-t{turn_index}.json")
}

pub struct PgSessionRepository {
    pool: PgPool,
    s3: aws_sdk_s3::Client,
    s3_bucket: String,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool, s3: aws_sdk_s3::Client, s3_bucket: String) -> Self {
        Self {
            pool,
            s3,
            s3_bucket,
        }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn get_or_create(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<InterviewSessionRow, AppError> {
        sqlx::query(
            "INSERT INTO interview_sessions (id, user_id) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, InterviewSessionRow>(
            "SELECT * FROM interview_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_metrics(
        &self,
        session_id: &str,
        turn_count: u32,
        avg_engagement: f64,
        avg_score: f64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE interview_sessions
            SET turn_count = $2, avg_engagement = $3, avg_score = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .bind(turn_count as i32)
        .bind(avg_engagement)
        .bind(avg_score)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Interview session {session_id}")));
        }
        Ok(())
    }

    async fn save_summary(
        &self,
        session_id: &str,
        turn_index: u32,
        summary: &SessionSummary,
    ) -> Result<String, AppError> {
        let body = serde_json::to_vec_pretty(summary)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Summary serialization failed: {e}")))?;

        let s3_key = summary_key(session_id, turn_index);
        self.s3
            .put_object()
            .bucket(&self.s3_bucket)
            .key(&s3_key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(format!("S3 upload failed: {e}")))?;

        info!("Uploaded session summary to s3://{}/{}", self.s3_bucket, s3_key);

        let summary_json = serde_json::to_value(summary)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Summary serialization failed: {e}")))?;
        sqlx::query(
            "INSERT INTO session_summaries (id, session_id, turn_index, summary, s3_key) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(turn_index as i32)
        .bind(summary_json)
        .bind(&s3_key)
        .execute(&self.pool)
        .await?;

        Ok(s3_key)
    }
}
