//! Elasticsearch document store over its REST API
//!
//! Raw documents live in `{source}{raw_suffix}` indexes and enriched ones are
//! written to `{source}{classified_suffix}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lodestone_core::outbox::classified_index;
use lodestone_core::{
    ClassificationStatus, ClassifiedContent, DocumentStore, Error, RawContent, Result,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest response body quoted in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Connection settings for the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_raw_suffix")]
    pub raw_suffix: String,

    #[serde(default = "default_classified_suffix")]
    pub classified_suffix: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            raw_suffix: default_raw_suffix(),
            classified_suffix: default_classified_suffix(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_raw_suffix() -> String {
    "_raw_content".to_string()
}

fn default_classified_suffix() -> String {
    "_classified_content".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source")]
    source: serde_json::Value,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<RawContent>,
}

#[derive(Deserialize)]
struct BulkResponse {
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// [`DocumentStore`] backed by Elasticsearch
#[derive(Clone)]
pub struct ElasticsearchStore {
    client: reqwest::Client,
    base_url: String,
    raw_suffix: String,
    classified_suffix: String,
}

impl ElasticsearchStore {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::document(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            raw_suffix: config.raw_suffix.clone(),
            classified_suffix: config.classified_suffix.clone(),
        })
    }

    pub fn raw_index(&self, source_name: &str) -> String {
        format!("{source_name}{}", self.raw_suffix)
    }

    pub fn classified_index(&self, source_name: &str) -> String {
        classified_index(source_name, &self.classified_suffix)
    }

    /// Check the cluster answers
    pub async fn ping(&self) -> Result<()> {
        let response = self.client.get(&self.base_url).send().await.map_err(request_error)?;
        ensure_success(response).await.map(|_| ())
    }

    /// Mark a hit that does not decode as failed so it leaves the pending set
    async fn reject_malformed(
        &self,
        index: &str,
        id: &str,
        source_name: Option<&str>,
        err: serde_json::Error,
    ) {
        warn!(index = %index, content_id = %id, error = %err, "Skipping malformed raw document");
        let Some(source_name) = source_name else {
            return;
        };
        if let Err(e) = self
            .update_status(source_name, id, ClassificationStatus::Failed, Utc::now())
            .await
        {
            warn!(content_id = %id, error = %e, "Failed to mark malformed document as failed");
        }
    }

    /// Source name from a raw index name, if it carries the raw suffix
    fn source_from_index<'a>(&self, index: &'a str) -> Option<&'a str> {
        index.strip_suffix(self.raw_suffix.as_str()).filter(|s| !s.is_empty())
    }
}

/// Transport failures, phrased so [`lodestone_core::ErrorCode::classify`] can categorize them
fn request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::document(format!("elasticsearch request timeout: {e}"))
    } else if e.is_connect() {
        Error::document(format!("elasticsearch unavailable (connection refused): {e}"))
    } else {
        Error::document(format!("elasticsearch request failed: {e}"))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    Err(Error::document(format!("elasticsearch returned {status}: {body}")))
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    async fn query_pending(
        &self,
        status: ClassificationStatus,
        limit: usize,
    ) -> Result<Vec<RawContent>> {
        let url = format!(
            "{}/*{}/_search?ignore_unavailable=true&allow_no_indices=true",
            self.base_url, self.raw_suffix
        );
        let query = json!({
            "query": { "term": { "classification_status": status.as_str() } },
            "size": limit,
            "sort": [{ "crawled_at": { "order": "asc" } }],
        });

        let response = self
            .client
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(request_error)?;
        let search: SearchResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::document(format!("invalid search response: {e}")))?;

        let mut documents = Vec::with_capacity(search.hits.hits.len());
        for hit in search.hits.hits {
            let source = self.source_from_index(&hit.index).map(str::to_string);
            match serde_json::from_value::<RawContent>(hit.source) {
                Ok(mut raw) => {
                    if raw.id.is_empty() {
                        raw.id = hit.id;
                    }
                    if raw.source_name.is_empty() {
                        if let Some(source) = source {
                            raw.source_name = source;
                        }
                    }
                    documents.push(raw);
                }
                Err(e) => self.reject_malformed(&hit.index, &hit.id, source.as_deref(), e).await,
            }
        }

        debug!(status = %status, count = documents.len(), "Queried documents");
        Ok(documents)
    }

    async fn get_raw(&self, source_name: &str, content_id: &str) -> Result<Option<RawContent>> {
        let url = format!("{}/{}/_doc/{}", self.base_url, self.raw_index(source_name), content_id);
        let response = self.client.get(&url).send().await.map_err(request_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let doc: GetResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::document(format!("invalid get response: {e}")))?;

        Ok(doc.found.then_some(doc.source).flatten().map(|mut raw| {
            if raw.id.is_empty() {
                raw.id = content_id.to_string();
            }
            if raw.source_name.is_empty() {
                raw.source_name = source_name.to_string();
            }
            raw
        }))
    }

    async fn write_classified(&self, content: &ClassifiedContent) -> Result<()> {
        let url = format!(
            "{}/{}/_doc/{}",
            self.base_url,
            self.classified_index(&content.raw.source_name),
            content.id()
        );
        let response = self
            .client
            .put(&url)
            .json(content)
            .send()
            .await
            .map_err(request_error)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn write_classified_batch(&self, contents: &[ClassifiedContent]) -> Result<()> {
        if contents.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for content in contents {
            let action = json!({
                "index": {
                    "_index": self.classified_index(&content.raw.source_name),
                    "_id": content.id(),
                }
            });
            body.push_str(&action.to_string());
            body.push('\n');
            body.push_str(&serde_json::to_string(content)?);
            body.push('\n');
        }

        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(request_error)?;
        let bulk: BulkResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::document(format!("invalid bulk response: {e}")))?;

        if bulk.errors {
            let failed: Vec<&serde_json::Value> = bulk
                .items
                .iter()
                .filter_map(|item| item.values().next())
                .filter_map(|result| result.get("error"))
                .collect();
            warn!(
                total = contents.len(),
                failed = failed.len(),
                "Bulk index reported item failures"
            );
            let first = failed.first().map(|e| e.to_string()).unwrap_or_default();
            return Err(Error::document(format!(
                "bulk index failed for {} of {} documents: {}",
                failed.len(),
                contents.len(),
                first
            )));
        }

        info!(count = contents.len(), "Bulk indexed classified documents");
        Ok(())
    }

    async fn update_status(
        &self,
        source_name: &str,
        content_id: &str,
        status: ClassificationStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let url = format!(
            "{}/{}/_update/{}",
            self.base_url,
            self.raw_index(source_name),
            content_id
        );
        let update = json!({
            "doc": {
                "classification_status": status.as_str(),
                "classified_at": at,
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&update)
            .send()
            .await
            .map_err(request_error)?;
        ensure_success(response).await?;
        Ok(())
    }
}
