use super::db_error;
use async_trait::async_trait;
use lodestone_core::{OutboxEntry, OutboxStore, Result};
use sqlx::{PgPool, Postgres};
use tracing::{debug, info};

const INSERT_OUTBOX: &str = r#"
    INSERT INTO classified_outbox (
        content_id, source_name, index_name, content_type, topics,
        quality_score, is_crime_related, crime_subcategory,
        title, body, url, published_date
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (content_id) DO NOTHING
"#;

fn insert(entry: &OutboxEntry) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(INSERT_OUTBOX)
        .bind(&entry.content_id)
        .bind(&entry.source_name)
        .bind(&entry.index_name)
        .bind(&entry.content_type)
        .bind(&entry.topics)
        .bind(entry.quality_score)
        .bind(entry.is_crime_related)
        .bind(&entry.crime_subcategory)
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(&entry.url)
        .bind(entry.published_date)
}

/// Staging rows in `classified_outbox`, drained by the downstream publisher
#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn write(&self, entry: &OutboxEntry) -> Result<()> {
        insert(entry)
            .execute(&self.pool)
            .await
            .map_err(db_error("write to outbox"))?;

        debug!(
            content_id = %entry.content_id,
            source_name = %entry.source_name,
            content_type = %entry.content_type,
            "Wrote to outbox"
        );
        Ok(())
    }

    async fn write_batch(&self, entries: &[OutboxEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await.map_err(db_error("begin outbox transaction"))?;
        for entry in entries {
            insert(entry)
                .execute(&mut *tx)
                .await
                .map_err(db_error("insert outbox row"))?;
        }
        tx.commit().await.map_err(db_error("commit outbox transaction"))?;

        info!(count = entries.len(), "Wrote batch to outbox");
        Ok(())
    }
}
