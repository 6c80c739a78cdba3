use super::db_error;
use async_trait::async_trait;
use lodestone_core::{ClassificationRule, Result, RuleStore};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    rule_name: String,
    topic_name: String,
    keywords: Vec<String>,
    priority: i32,
    enabled: bool,
    min_confidence: f64,
}

impl From<RuleRow> for ClassificationRule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            rule_name: row.rule_name,
            topic_name: row.topic_name,
            keywords: row.keywords,
            priority: row.priority,
            enabled: row.enabled,
            min_confidence: row.min_confidence,
        }
    }
}

/// Topic rules from `classification_rules`
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn list_enabled(&self) -> Result<Vec<ClassificationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(
            r#"
            SELECT id, rule_name, topic_name, keywords, priority, enabled, min_confidence
            FROM classification_rules
            WHERE enabled = TRUE
            ORDER BY priority DESC, created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list enabled rules"))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
