use super::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lodestone_core::{
    DeadLetterEntry, DeadLetterStats, DeadLetterStore, Error, ErrorCode, GroupCount, Result,
};
use sqlx::PgPool;

/// How long a claimed entry stays invisible to other retry workers
const CLAIM_LEASE_SECS: f64 = 300.0;

const ENTRY_COLUMNS: &str = "id, content_id, source_name, index_name, error_message, error_code, \
     retry_count, max_retries, next_retry_at, created_at, last_attempt_at";

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    content_id: String,
    source_name: String,
    index_name: String,
    error_message: String,
    error_code: String,
    retry_count: i32,
    max_retries: i32,
    next_retry_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    last_attempt_at: Option<DateTime<Utc>>,
}

impl From<EntryRow> for DeadLetterEntry {
    fn from(row: EntryRow) -> Self {
        Self {
            id: row.id,
            content_id: row.content_id,
            source_name: row.source_name,
            index_name: row.index_name,
            error_message: row.error_message,
            error_code: ErrorCode::parse(&row.error_code),
            retry_count: row.retry_count,
            max_retries: row.max_retries,
            next_retry_at: row.next_retry_at,
            created_at: row.created_at,
            last_attempt_at: row.last_attempt_at,
        }
    }
}

/// Retry queue in `dead_letter_queue`
#[derive(Clone)]
pub struct PgDeadLetterStore {
    pool: PgPool,
}

impl PgDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn group_counts(&self, column: &'static str) -> Result<Vec<GroupCount>> {
        let query = format!(
            r#"
            SELECT COALESCE({column}, 'UNKNOWN'), COUNT(*)
            FROM dead_letter_queue
            WHERE retry_count < max_retries
            GROUP BY {column}
            ORDER BY COUNT(*) DESC
            "#
        );
        let rows = sqlx::query_as::<_, (String, i64)>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("count dead letters"))?;

        Ok(rows
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect())
    }
}

#[async_trait]
impl DeadLetterStore for PgDeadLetterStore {
    async fn enqueue(&self, entry: &DeadLetterEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dead_letter_queue
                (content_id, source_name, index_name, error_message, error_code,
                 retry_count, max_retries, next_retry_at, last_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_id) DO UPDATE SET
                retry_count = dead_letter_queue.retry_count + 1,
                error_message = EXCLUDED.error_message,
                error_code = EXCLUDED.error_code,
                last_attempt_at = NOW(),
                next_retry_at = NOW()
                    + (INTERVAL '1 second' * POWER(2, dead_letter_queue.retry_count + 1) * 60)
            WHERE dead_letter_queue.retry_count < dead_letter_queue.max_retries
            "#,
        )
        .bind(&entry.content_id)
        .bind(&entry.source_name)
        .bind(&entry.index_name)
        .bind(&entry.error_message)
        .bind(entry.error_code.as_str())
        .bind(entry.retry_count)
        .bind(entry.max_retries)
        .bind(entry.next_retry_at)
        .bind(entry.last_attempt_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("enqueue dead letter"))?;

        Ok(())
    }

    async fn fetch_retryable(&self, limit: usize) -> Result<Vec<DeadLetterEntry>> {
        // Claimed rows get a lease so a second sweep skips them after this
        // transaction commits; a retry outcome overwrites next_retry_at.
        let query = format!(
            r#"
            UPDATE dead_letter_queue
            SET next_retry_at = NOW() + (INTERVAL '1 second' * $2)
            WHERE id IN (
                SELECT id FROM dead_letter_queue
                WHERE next_retry_at <= NOW()
                  AND retry_count < max_retries
                ORDER BY next_retry_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let mut entries: Vec<DeadLetterEntry> = sqlx::query_as::<_, EntryRow>(&query)
            .bind(limit as i64)
            .bind(CLAIM_LEASE_SECS)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("fetch retryable dead letters"))?
            .into_iter()
            .map(Into::into)
            .collect();

        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn remove(&self, content_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM dead_letter_queue WHERE content_id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("remove dead letter"))?;

        if result.rows_affected() == 0 {
            return Err(Error::storage(format!("dead letter entry not found: {content_id}")));
        }
        Ok(())
    }

    async fn mark_exhausted(&self, content_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dead_letter_queue
            SET retry_count = max_retries,
                last_attempt_at = NOW()
            WHERE content_id = $1
            "#,
        )
        .bind(content_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark dead letter exhausted"))?;

        Ok(())
    }

    async fn update_retry_count(
        &self,
        content_id: &str,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE dead_letter_queue
            SET retry_count = $2,
                next_retry_at = $3,
                last_attempt_at = NOW()
            WHERE content_id = $1
            "#,
        )
        .bind(content_id)
        .bind(retry_count)
        .bind(next_retry_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("update dead letter retry count"))?;

        Ok(())
    }

    async fn get_by_content_id(&self, content_id: &str) -> Result<Option<DeadLetterEntry>> {
        let query = format!("SELECT {ENTRY_COLUMNS} FROM dead_letter_queue WHERE content_id = $1");
        let row = sqlx::query_as::<_, EntryRow>(&query)
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("get dead letter"))?;

        Ok(row.map(Into::into))
    }

    async fn stats(&self) -> Result<DeadLetterStats> {
        let (pending, exhausted, ready, avg_retries, oldest_entry) =
            sqlx::query_as::<_, (i64, i64, i64, f64, Option<DateTime<Utc>>)>(
                r#"
                SELECT
                    COUNT(*) FILTER (WHERE retry_count < max_retries),
                    COUNT(*) FILTER (WHERE retry_count >= max_retries),
                    COUNT(*) FILTER (WHERE next_retry_at <= NOW() AND retry_count < max_retries),
                    COALESCE(AVG(retry_count), 0)::DOUBLE PRECISION,
                    MIN(created_at)
                FROM dead_letter_queue
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("dead letter stats"))?;

        Ok(DeadLetterStats {
            pending,
            exhausted,
            ready,
            avg_retries,
            oldest_entry,
        })
    }

    async fn count_by_source(&self) -> Result<Vec<GroupCount>> {
        self.group_counts("source_name").await
    }

    async fn count_by_error_code(&self) -> Result<Vec<GroupCount>> {
        self.group_counts("error_code").await
    }

    async fn cleanup_exhausted(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM dead_letter_queue
            WHERE retry_count >= max_retries
              AND last_attempt_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(db_error("cleanup exhausted dead letters"))?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM dead_letter_queue")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count dead letters"))?;
        Ok(count)
    }
}
