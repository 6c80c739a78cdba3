//! Core document and classification types

use crate::hybrid::{HybridResults, LocationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum URL length stored on a history row
pub const MAX_HISTORY_URL_LEN: usize = 2048;

/// Lifecycle of a raw document as seen by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    #[default]
    Pending,
    Processing,
    Classified,
    Failed,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Classified => "classified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crawled document awaiting classification
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawContent {
    /// Unique content identifier (falls back to the index document id)
    #[serde(default)]
    pub id: String,

    /// Canonical page URL
    pub url: String,

    /// Crawl source (also the index prefix)
    #[serde(default)]
    pub source_name: String,

    #[serde(default)]
    pub title: String,

    /// Extracted article text
    #[serde(default)]
    pub raw_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_keywords: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,

    /// When the crawler fetched the page
    pub crawled_at: DateTime<Utc>,

    /// Word count reported by the crawler (0 when unknown)
    #[serde(default)]
    pub word_count: usize,

    #[serde(default)]
    pub classification_status: ClassificationStatus,
}

impl RawContent {
    /// Create a pending document with the identity fields set
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            source_name: source_name.into(),
            crawled_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Crawler word count, or a whitespace count of the text when unknown
    pub fn effective_word_count(&self) -> usize {
        if self.word_count > 0 {
            self.word_count
        } else {
            self.raw_text.split_whitespace().count()
        }
    }

    /// Meta or Open Graph description
    pub fn description(&self) -> Option<&str> {
        non_empty(&self.meta_description).or_else(|| non_empty(&self.og_description))
    }

    /// Reject documents that can never be classified
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::validation("document has no id"));
        }
        if self.source_name.trim().is_empty() {
            return Err(crate::Error::validation(format!(
                "document {} has no source_name",
                self.id
            )));
        }
        Ok(())
    }
}

/// Returns the inner string when present and non-blank
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Stage 1 content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Article,
    Page,
    Video,
    Image,
    Job,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Page => "page",
            Self::Video => "video",
            Self::Image => "image",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Article subtype used by the routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSubtype {
    PressRelease,
    Event,
    Blotter,
    Report,
}

impl ContentSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PressRelease => "press_release",
            Self::Event => "event",
            Self::Blotter => "blotter",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for ContentSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic-matching rule, read from the relational store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub rule_name: String,

    /// Topic emitted when the rule matches
    pub topic_name: String,

    /// Ordered keyword list
    pub keywords: Vec<String>,

    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum score (0.0-1.0) for the rule to count as a match
    #[serde(default)]
    pub min_confidence: f64,
}

impl ClassificationRule {
    pub fn new(topic_name: impl Into<String>, keywords: Vec<String>, priority: i32) -> Self {
        let topic_name = topic_name.into();
        Self {
            id: 0,
            rule_name: topic_name.clone(),
            topic_name,
            keywords,
            priority,
            enabled: true,
            min_confidence: 0.0,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Per-source trust record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReputation {
    pub source_name: String,

    /// Trust score, always within 0..=100
    pub reputation_score: i32,

    pub total_articles: i64,

    pub average_quality_score: f64,

    pub spam_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_classified_at: Option<DateTime<Utc>>,
}

impl SourceReputation {
    /// Fresh record at the configured neutral score
    pub fn new(source_name: impl Into<String>, default_score: i32) -> Self {
        Self {
            source_name: source_name.into(),
            reputation_score: default_score.clamp(0, 100),
            total_articles: 0,
            average_quality_score: 0.0,
            spam_count: 0,
            last_classified_at: None,
        }
    }

    pub fn spam_ratio(&self) -> f64 {
        if self.total_articles == 0 {
            0.0
        } else {
            self.spam_count as f64 / self.total_articles as f64
        }
    }
}

/// Trust bucket derived from the reputation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationRank {
    Trusted,
    Moderate,
    Low,
    Spam,
}

/// Reputation as recorded on a classified document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    pub score: i32,
    pub rank: ReputationRank,
    pub total_articles: i64,
}

/// One quality factor's contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub score: u32,
    pub max: u32,

    /// Signals that contributed points
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<String>,
}

/// Stage 2 breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFactors {
    pub word_count: FactorScore,
    pub metadata_completeness: FactorScore,
    pub content_richness: FactorScore,
    pub readability: FactorScore,
}

impl QualityFactors {
    pub fn total(&self) -> u32 {
        self.word_count.score
            + self.metadata_completeness.score
            + self.content_richness.score
            + self.readability.score
    }
}

/// Output of the orchestrator for one document, before it is shaped for sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub content_id: String,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_subtype: Option<ContentSubtype>,
    pub type_confidence: f64,
    pub type_method: String,
    pub quality_score: u32,
    pub quality_factors: QualityFactors,
    pub is_spam: bool,
    pub topics: Vec<String>,
    pub topic_scores: BTreeMap<String, f64>,
    pub source_reputation: ReputationSnapshot,
    #[serde(flatten)]
    pub hybrid: HybridResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationResult>,
    pub classifier_version: String,
    pub classification_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub classified_at: DateTime<Utc>,
}

/// Enriched document written to the classified index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedContent {
    #[serde(flatten)]
    pub raw: RawContent,

    /// Alias of `raw_text` kept for downstream consumers
    pub body: String,

    /// Alias of `url` kept for downstream consumers
    pub source: String,

    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_subtype: Option<ContentSubtype>,
    pub type_confidence: f64,
    pub quality_score: u32,
    pub quality_factors: QualityFactors,
    pub is_spam: bool,
    pub topics: Vec<String>,
    pub topic_scores: BTreeMap<String, f64>,
    pub source_reputation: ReputationSnapshot,
    #[serde(flatten)]
    pub hybrid: HybridResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationResult>,
    pub classifier_version: String,
    pub confidence: f64,
    pub classified_at: DateTime<Utc>,
}

impl ClassifiedContent {
    /// Build the enriched record. `body` and `source` are copied here and nowhere else.
    pub fn new(raw: RawContent, result: &ClassificationResult) -> Self {
        let body = raw.raw_text.clone();
        let source = raw.url.clone();
        let mut raw = raw;
        raw.classification_status = ClassificationStatus::Classified;

        Self {
            raw,
            body,
            source,
            content_type: result.content_type,
            content_subtype: result.content_subtype,
            type_confidence: result.type_confidence,
            quality_score: result.quality_score,
            quality_factors: result.quality_factors.clone(),
            is_spam: result.is_spam,
            topics: result.topics.clone(),
            topic_scores: result.topic_scores.clone(),
            source_reputation: result.source_reputation.clone(),
            hybrid: result.hybrid.clone(),
            location: result.location.clone(),
            classifier_version: result.classifier_version.clone(),
            confidence: result.confidence,
            classified_at: result.classified_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.raw.id
    }
}

/// Write-once audit row per classification event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationHistory {
    pub content_id: String,
    pub content_url: String,
    pub source_name: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_subtype: Option<String>,
    pub quality_score: i32,
    pub topics: Vec<String>,
    pub source_reputation_score: i32,
    pub classifier_version: String,
    pub classification_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub confidence: f64,
    pub processing_time_ms: i64,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationHistory {
    pub fn from_result(raw: &RawContent, result: &ClassificationResult) -> Self {
        Self {
            content_id: raw.id.clone(),
            content_url: truncate_chars(&raw.url, MAX_HISTORY_URL_LEN).to_string(),
            source_name: raw.source_name.clone(),
            content_type: result.content_type.as_str().to_string(),
            content_subtype: result.content_subtype.map(|s| s.as_str().to_string()),
            quality_score: result.quality_score as i32,
            topics: result.topics.clone(),
            source_reputation_score: result.source_reputation.score,
            classifier_version: result.classifier_version.clone(),
            classification_method: result.classification_method.clone(),
            model_version: result.model_version.clone(),
            confidence: result.confidence,
            processing_time_ms: result.processing_time_ms as i64,
            classified_at: result.classified_at,
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Maximum URL length in log lines
pub const LOG_URL_MAX_CHARS: usize = 100;

/// URL shortened for log output, with a trailing `...` when cut
pub fn log_url(url: &str) -> String {
    let cut = truncate_chars(url, LOG_URL_MAX_CHARS);
    if cut.len() < url.len() {
        format!("{cut}...")
    } else {
        url.to_string()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::HybridResults;

    fn sample_result() -> ClassificationResult {
        let factor = |score| FactorScore {
            score,
            max: 25,
            signals: vec![],
        };
        ClassificationResult {
            content_id: "doc-1".to_string(),
            content_type: ContentType::Article,
            content_subtype: None,
            type_confidence: 1.0,
            type_method: "og_metadata".to_string(),
            quality_score: 80,
            quality_factors: QualityFactors {
                word_count: factor(25),
                metadata_completeness: factor(25),
                content_richness: factor(10),
                readability: factor(20),
            },
            is_spam: false,
            topics: vec!["crime".to_string()],
            topic_scores: BTreeMap::new(),
            source_reputation: ReputationSnapshot {
                score: 50,
                rank: ReputationRank::Moderate,
                total_articles: 1,
            },
            hybrid: HybridResults::default(),
            location: None,
            classifier_version: "1.0.0".to_string(),
            classification_method: "rule_based".to_string(),
            model_version: None,
            confidence: 0.8,
            processing_time_ms: 4,
            classified_at: Utc::now(),
        }
    }

    #[test]
    fn test_classified_content_copies_aliases() {
        let mut raw = RawContent::new("doc-1", "https://example.com/news/a", "example");
        raw.raw_text = "Body text".to_string();

        let content = ClassifiedContent::new(raw, &sample_result());
        assert_eq!(content.body, "Body text");
        assert_eq!(content.source, "https://example.com/news/a");
        assert_eq!(content.raw.classification_status, ClassificationStatus::Classified);
    }

    #[test]
    fn test_classified_content_omits_absent_hybrid_blocks() {
        let raw = RawContent::new("doc-1", "https://example.com/a", "example");
        let content = ClassifiedContent::new(raw, &sample_result());
        let json = serde_json::to_value(&content).unwrap();

        assert!(json.get("crime").is_none());
        assert!(json.get("mining").is_none());
        assert!(json.get("location").is_none());
        assert_eq!(json["body"], "");
        assert_eq!(json["source"], "https://example.com/a");
    }

    #[test]
    fn test_history_truncates_long_urls() {
        let long_url = format!("https://example.com/{}", "a".repeat(3000));
        let raw = RawContent::new("doc-1", long_url, "example");

        let history = ClassificationHistory::from_result(&raw, &sample_result());
        assert_eq!(history.content_url.chars().count(), MAX_HISTORY_URL_LEN);
        assert_eq!(history.quality_score, 80);
    }

    #[test]
    fn test_effective_word_count() {
        let mut raw = RawContent::new("doc-1", "https://example.com/a", "example");
        raw.raw_text = "one two three".to_string();
        assert_eq!(raw.effective_word_count(), 3);

        raw.word_count = 420;
        assert_eq!(raw.effective_word_count(), 420);
    }

    #[test]
    fn test_validate_rejects_missing_identity() {
        let raw = RawContent::new("", "https://example.com/a", "example");
        assert!(raw.validate().is_err());

        let raw = RawContent::new("doc-1", "https://example.com/a", " ");
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_log_url_truncation() {
        let short = "https://example.com/a";
        assert_eq!(log_url(short), short);

        let long = format!("https://example.com/{}", "x".repeat(200));
        let logged = log_url(&long);
        assert!(logged.ends_with("..."));
        assert_eq!(logged.chars().count(), LOG_URL_MAX_CHARS + 3);
    }
}
