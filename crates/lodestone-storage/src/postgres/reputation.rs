use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lodestone_core::{ReputationStore, Result, SourceReputation};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct ReputationRow {
    source_name: String,
    reputation_score: i32,
    total_articles: i64,
    average_quality_score: f64,
    spam_count: i64,
    last_classified_at: Option<DateTime<Utc>>,
}

impl From<ReputationRow> for SourceReputation {
    fn from(row: ReputationRow) -> Self {
        Self {
            source_name: row.source_name,
            reputation_score: row.reputation_score,
            total_articles: row.total_articles,
            average_quality_score: row.average_quality_score,
            spam_count: row.spam_count,
            last_classified_at: row.last_classified_at,
        }
    }
}

/// Per-source rows in `source_reputation`
#[derive(Clone)]
pub struct PgReputationStore {
    pool: PgPool,
}

impl PgReputationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReputationStore for PgReputationStore {
    async fn get_or_create(&self, source_name: &str, default_score: i32) -> Result<SourceReputation> {
        // The no-op update makes RETURNING yield the existing row on conflict
        let row = sqlx::query_as::<_, ReputationRow>(
            r#"
            INSERT INTO source_reputation (source_name, reputation_score)
            VALUES ($1, $2)
            ON CONFLICT (source_name) DO UPDATE SET source_name = EXCLUDED.source_name
            RETURNING source_name, reputation_score, total_articles, average_quality_score,
                      spam_count, last_classified_at
            "#,
        )
        .bind(source_name)
        .bind(default_score)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("get or create source reputation"))?;

        Ok(row.into())
    }

    async fn save(&self, reputation: &SourceReputation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_reputation
                (source_name, reputation_score, total_articles, average_quality_score,
                 spam_count, last_classified_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_name) DO UPDATE SET
                reputation_score = EXCLUDED.reputation_score,
                total_articles = EXCLUDED.total_articles,
                average_quality_score = EXCLUDED.average_quality_score,
                spam_count = EXCLUDED.spam_count,
                last_classified_at = EXCLUDED.last_classified_at,
                updated_at = NOW()
            "#,
        )
        .bind(&reputation.source_name)
        .bind(reputation.reputation_score)
        .bind(reputation.total_articles)
        .bind(reputation.average_quality_score)
        .bind(reputation.spam_count)
        .bind(reputation.last_classified_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("save source reputation"))?;

        Ok(())
    }
}
