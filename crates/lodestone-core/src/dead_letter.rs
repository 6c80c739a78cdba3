//! Dead-letter entries and their retry state machine
//!
//! An entry moves through three states:
//! - `Waiting`: backoff has not elapsed yet
//! - `Retryable`: backoff elapsed and retries remain
//! - `Exhausted`: `retry_count` reached `max_retries`; kept for inspection until cleanup

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default retry budget per entry
pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// Largest retry budget; keeps every scheduled delay distinct
pub const MAX_RETRIES_LIMIT: i32 = 30;

/// Base backoff interval in seconds
pub const BACKOFF_BASE_SECS: i64 = 60;

/// Delay scheduled after a failed attempt: `60s * 2^(retry_count + 1)`
///
/// `retry_count` is the count before the failure is recorded.
pub fn retry_delay(retry_count: i32) -> Duration {
    let exponent = (retry_count.max(0) + 1).min(MAX_RETRIES_LIMIT) as u32;
    Duration::seconds(BACKOFF_BASE_SECS.saturating_mul(1_i64 << exponent))
}

/// Next retry time after a failure at `now`
pub fn next_retry_at(now: DateTime<Utc>, retry_count: i32) -> DateTime<Utc> {
    now + retry_delay(retry_count)
}

/// Categorized failure reason, used for filtering and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ES_TIMEOUT")]
    EsTimeout,
    #[serde(rename = "ES_UNAVAILABLE")]
    EsUnavailable,
    #[serde(rename = "ES_INDEX_NOT_FOUND")]
    EsIndexNotFound,
    #[serde(rename = "RULE_PANIC")]
    RulePanic,
    #[serde(rename = "QUALITY_ERROR")]
    QualityError,
    #[serde(rename = "CONTENT_TYPE_ERROR")]
    ContentTypeError,
    #[serde(rename = "INDEXING_FAILED")]
    IndexingFailed,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EsTimeout => "ES_TIMEOUT",
            Self::EsUnavailable => "ES_UNAVAILABLE",
            Self::EsIndexNotFound => "ES_INDEX_NOT_FOUND",
            Self::RulePanic => "RULE_PANIC",
            Self::QualityError => "QUALITY_ERROR",
            Self::ContentTypeError => "CONTENT_TYPE_ERROR",
            Self::IndexingFailed => "INDEXING_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(code: &str) -> Self {
        match code {
            "ES_TIMEOUT" => Self::EsTimeout,
            "ES_UNAVAILABLE" => Self::EsUnavailable,
            "ES_INDEX_NOT_FOUND" => Self::EsIndexNotFound,
            "RULE_PANIC" => Self::RulePanic,
            "QUALITY_ERROR" => Self::QualityError,
            "CONTENT_TYPE_ERROR" => Self::ContentTypeError,
            "INDEXING_FAILED" => Self::IndexingFailed,
            _ => Self::Unknown,
        }
    }

    /// Derive a code from an error message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_ascii_lowercase();
        if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
            Self::EsTimeout
        } else if msg.contains("connection refused")
            || msg.contains("unavailable")
            || msg.contains("no such host")
            || msg.contains("503")
        {
            Self::EsUnavailable
        } else if msg.contains("index_not_found") || msg.contains("no such index") {
            Self::EsIndexNotFound
        } else if msg.contains("panic") {
            Self::RulePanic
        } else if msg.contains("quality") {
            Self::QualityError
        } else if msg.contains("content type") || msg.contains("content_type") {
            Self::ContentTypeError
        } else if msg.contains("index") || msg.contains("bulk") {
            Self::IndexingFailed
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry state of a dead-letter entry at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlqState {
    Waiting,
    Retryable,
    Exhausted,
}

/// A document whose delivery failed, awaiting retry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    #[serde(default)]
    pub id: i64,
    pub content_id: String,
    pub source_name: String,
    /// Target index the document should have been written to
    pub index_name: String,
    pub error_message: String,
    pub error_code: ErrorCode,
    pub retry_count: i32,
    pub max_retries: i32,
    pub next_retry_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl DeadLetterEntry {
    /// Create a first-failure entry; the first retry is due after the base interval
    pub fn new(
        content_id: impl Into<String>,
        source_name: impl Into<String>,
        index_name: impl Into<String>,
        error_message: impl Into<String>,
    ) -> crate::Result<Self> {
        let content_id = content_id.into();
        let source_name = source_name.into();
        let index_name = index_name.into();
        if content_id.is_empty() {
            return Err(crate::Error::validation("dead letter entry requires content_id"));
        }
        if source_name.is_empty() {
            return Err(crate::Error::validation("dead letter entry requires source_name"));
        }
        if index_name.is_empty() {
            return Err(crate::Error::validation("dead letter entry requires index_name"));
        }

        let error_message = error_message.into();
        let now = Utc::now();
        Ok(Self {
            id: 0,
            error_code: ErrorCode::classify(&error_message),
            content_id,
            source_name,
            index_name,
            error_message,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            next_retry_at: now + Duration::seconds(BACKOFF_BASE_SECS),
            created_at: now,
            last_attempt_at: Some(now),
        })
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries.clamp(1, MAX_RETRIES_LIMIT);
        self
    }

    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.error_code = code;
        self
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    pub fn state(&self, now: DateTime<Utc>) -> DlqState {
        if self.is_exhausted() {
            DlqState::Exhausted
        } else if self.next_retry_at <= now {
            DlqState::Retryable
        } else {
            DlqState::Waiting
        }
    }

    /// Record another failed attempt. No-op once exhausted.
    pub fn record_failure(&mut self, error_message: impl Into<String>, now: DateTime<Utc>) {
        if self.is_exhausted() {
            return;
        }
        let error_message = error_message.into();
        self.next_retry_at = next_retry_at(now, self.retry_count);
        self.retry_count += 1;
        self.error_code = ErrorCode::classify(&error_message);
        self.error_message = error_message;
        self.last_attempt_at = Some(now);
    }

    /// Freeze the entry for operator inspection
    pub fn mark_exhausted(&mut self, now: DateTime<Utc>) {
        self.retry_count = self.max_retries;
        self.last_attempt_at = Some(now);
    }

    /// Whether the next failure uses up the last retry
    pub fn is_last_attempt(&self) -> bool {
        self.retry_count + 1 >= self.max_retries
    }
}

impl fmt::Display for DeadLetterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DLQ[{}] content={} source={} retries={}/{} next={} error={}",
            self.id,
            self.content_id,
            self.source_name,
            self.retry_count,
            self.max_retries,
            self.next_retry_at.to_rfc3339(),
            self.error_code
        )
    }
}

/// Queue-wide statistics for alerting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterStats {
    pub pending: i64,
    pub exhausted: i64,
    pub ready: i64,
    pub avg_retries: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_retry_delay_schedule() {
        assert_eq!(retry_delay(0), Duration::seconds(120));
        assert_eq!(retry_delay(1), Duration::seconds(240));
        assert_eq!(retry_delay(4), Duration::seconds(1920));
    }

    #[test]
    fn test_new_entry_validation() {
        assert!(DeadLetterEntry::new("", "src", "src_classified_content", "boom").is_err());
        assert!(DeadLetterEntry::new("id", "", "src_classified_content", "boom").is_err());
        assert!(DeadLetterEntry::new("id", "src", "", "boom").is_err());

        let entry = DeadLetterEntry::new("id", "src", "src_classified_content", "request timeout")
            .unwrap();
        assert_eq!(entry.retry_count, 0);
        assert_eq!(entry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(entry.error_code, ErrorCode::EsTimeout);
    }

    #[test]
    fn test_state_machine() {
        let now = Utc::now();
        let mut entry = DeadLetterEntry::new("id", "src", "idx", "boom")
            .unwrap()
            .with_max_retries(2);
        assert_eq!(entry.state(now), DlqState::Waiting);
        assert_eq!(entry.state(now + Duration::seconds(61)), DlqState::Retryable);

        entry.record_failure("connection refused", now);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.error_code, ErrorCode::EsUnavailable);
        assert_eq!(entry.next_retry_at, now + Duration::seconds(120));
        assert!(entry.is_last_attempt());

        entry.record_failure("connection refused", now);
        assert_eq!(entry.state(now), DlqState::Exhausted);

        entry.record_failure("ignored", now);
        assert_eq!(entry.retry_count, 2);
    }

    #[test]
    fn test_mark_exhausted() {
        let mut entry = DeadLetterEntry::new("id", "src", "idx", "boom").unwrap();
        entry.mark_exhausted(Utc::now());
        assert!(entry.is_exhausted());
        assert_eq!(entry.retry_count, entry.max_retries);
    }

    #[test]
    fn test_error_code_classification() {
        assert_eq!(ErrorCode::classify("context deadline exceeded"), ErrorCode::EsTimeout);
        assert_eq!(ErrorCode::classify("dial tcp: connection refused"), ErrorCode::EsUnavailable);
        assert_eq!(
            ErrorCode::classify("index_not_found_exception"),
            ErrorCode::EsIndexNotFound
        );
        assert_eq!(ErrorCode::classify("rule engine panic"), ErrorCode::RulePanic);
        assert_eq!(ErrorCode::classify("bulk request rejected"), ErrorCode::IndexingFailed);
        assert_eq!(ErrorCode::classify("something odd"), ErrorCode::Unknown);
        assert_eq!(ErrorCode::parse("QUALITY_ERROR"), ErrorCode::QualityError);
        assert_eq!(ErrorCode::parse("nope"), ErrorCode::Unknown);
    }

    proptest! {
        #[test]
        fn prop_backoff_strictly_increases(retry_count in 0i32..(MAX_RETRIES_LIMIT - 1)) {
            prop_assert!(retry_delay(retry_count + 1) > retry_delay(retry_count));
        }

        #[test]
        fn prop_retry_budget_is_bounded(max_retries in -5i32..100) {
            let entry = DeadLetterEntry::new("id", "src", "idx", "boom")
                .unwrap()
                .with_max_retries(max_retries);
            prop_assert!((1..=MAX_RETRIES_LIMIT).contains(&entry.max_retries));
        }
    }
}
