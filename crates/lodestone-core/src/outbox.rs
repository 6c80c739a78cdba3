//! Staging rows for the downstream publisher

use crate::types::ClassifiedContent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topics that mark a row as crime related, in precedence order
pub const CRIME_SUBCATEGORIES: [&str; 5] = [
    "violent_crime",
    "property_crime",
    "drug_crime",
    "organized_crime",
    "criminal_justice",
];

/// One row of `classified_outbox`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub content_id: String,
    pub source_name: String,
    pub index_name: String,
    pub content_type: String,
    pub topics: Vec<String>,
    pub quality_score: i32,
    pub is_crime_related: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crime_subcategory: Option<String>,
    pub title: String,
    pub body: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn from_classified(content: &ClassifiedContent, classified_suffix: &str) -> Self {
        let crime_subcategory = crime_subcategory(&content.topics).map(str::to_string);
        Self {
            content_id: content.raw.id.clone(),
            source_name: content.raw.source_name.clone(),
            index_name: classified_index(&content.raw.source_name, classified_suffix),
            content_type: content.content_type.as_str().to_string(),
            topics: content.topics.clone(),
            quality_score: content.quality_score as i32,
            is_crime_related: crime_subcategory.is_some(),
            crime_subcategory,
            title: content.raw.title.clone(),
            body: content.raw.raw_text.clone(),
            url: content.raw.url.clone(),
            published_date: content.raw.published_date,
        }
    }
}

/// First topic that names a crime subcategory
pub fn crime_subcategory(topics: &[String]) -> Option<&str> {
    topics
        .iter()
        .map(String::as_str)
        .find(|t| CRIME_SUBCATEGORIES.contains(t))
}

/// `{source}{suffix}`, e.g. `example_com_classified_content`
pub fn classified_index(source_name: &str, suffix: &str) -> String {
    format!("{source_name}{suffix}")
}
