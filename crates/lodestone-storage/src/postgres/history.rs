use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lodestone_core::{ClassificationHistory, HistoryStats, HistoryStore, Result};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct HistoryRow {
    content_id: String,
    content_url: String,
    source_name: String,
    content_type: String,
    content_subtype: Option<String>,
    quality_score: i32,
    topics: Vec<String>,
    source_reputation_score: i32,
    classifier_version: String,
    classification_method: String,
    model_version: Option<String>,
    confidence: f64,
    processing_time_ms: i64,
    classified_at: DateTime<Utc>,
}

impl From<HistoryRow> for ClassificationHistory {
    fn from(row: HistoryRow) -> Self {
        Self {
            content_id: row.content_id,
            content_url: row.content_url,
            source_name: row.source_name,
            content_type: row.content_type,
            content_subtype: row.content_subtype,
            quality_score: row.quality_score,
            topics: row.topics,
            source_reputation_score: row.source_reputation_score,
            classifier_version: row.classifier_version,
            classification_method: row.classification_method,
            model_version: row.model_version,
            confidence: row.confidence,
            processing_time_ms: row.processing_time_ms,
            classified_at: row.classified_at,
        }
    }
}

/// Audit rows in `classification_history`
#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn create(&self, history: &ClassificationHistory) -> Result<i64> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO classification_history (
                content_id, content_url, source_name, content_type, content_subtype,
                quality_score, topics, source_reputation_score,
                classifier_version, classification_method, model_version, confidence,
                processing_time_ms, classified_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(&history.content_id)
        .bind(&history.content_url)
        .bind(&history.source_name)
        .bind(&history.content_type)
        .bind(&history.content_subtype)
        .bind(history.quality_score)
        .bind(&history.topics)
        .bind(history.source_reputation_score)
        .bind(&history.classifier_version)
        .bind(&history.classification_method)
        .bind(&history.model_version)
        .bind(history.confidence)
        .bind(history.processing_time_ms)
        .bind(history.classified_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create classification history"))?;

        Ok(id)
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<ClassificationHistory>> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT content_id, content_url, source_name, content_type, content_subtype,
                   quality_score, topics, source_reputation_score,
                   classifier_version, classification_method, model_version, confidence,
                   processing_time_ms, classified_at
            FROM classification_history
            WHERE content_id = $1
            ORDER BY classified_at DESC
            LIMIT 1
            "#,
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("get classification history"))?;

        Ok(row.map(Into::into))
    }

    async fn stats(&self) -> Result<HistoryStats> {
        let (total, average_quality, average_processing_ms) =
            sqlx::query_as::<_, (i64, f64, f64)>(
                r#"
                SELECT COUNT(*),
                       COALESCE(AVG(quality_score), 0)::DOUBLE PRECISION,
                       COALESCE(AVG(processing_time_ms), 0)::DOUBLE PRECISION
                FROM classification_history
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("classification history stats"))?;

        Ok(HistoryStats {
            total,
            average_quality,
            average_processing_ms,
        })
    }
}
