//! HTTP client for domain model services (`POST {base}/classify`)

use crate::classifier::{ModelClient, ModelVerdict};
use async_trait::async_trait;
use lodestone_core::{Domain, Error, Result};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    body: &'a str,
}

/// Model service reached over HTTP with a bounded request timeout
pub struct HttpModelClient {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(domain: Domain, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::model(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("{}-model", domain.name()),
            endpoint: format!("{}/classify", base_url.trim_end_matches('/')),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn classify(&self, title: &str, body: &str) -> Result<ModelVerdict> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { title, body })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::model(format!("{}: request failed: {}", self.name, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::model(format!(
                "{}: unexpected status {}",
                self.name, status
            )));
        }

        response
            .json::<ModelVerdict>()
            .await
            .map_err(|e| Error::model(format!("{}: invalid response: {}", self.name, e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_core::Relevance;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_classify_posts_title_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/classify"))
            .and(body_partial_json(serde_json::json!({"title": "Gold find", "body": "Assays"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "relevance": "core_mining",
                "relevance_confidence": 0.92,
                "mining_stage": "exploration",
                "model_version": "mining-v3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpModelClient::new(Domain::Mining, &format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
        let verdict = client.classify("Gold find", "Assays").await.unwrap();

        assert_eq!(verdict.relevance(), Some(Relevance::Core));
        assert_eq!(verdict.model_version.as_deref(), Some("mining-v3"));
        assert_eq!(client.name(), "mining-model");
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpModelClient::new(Domain::Crime, &server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.classify("t", "b").await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"relevance": "not_crime", "confidence": 0.9})),
            )
            .mount(&server)
            .await;

        let client = HttpModelClient::new(Domain::Crime, &server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.classify("t", "b").await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }
}
