//! PageSpeed Insights client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{send_with_retry, MetricsProvider, PerformanceMetrics, ProviderError};

pub const DEFAULT_PAGESPEED_BASE_URL: &str = "https://www.googleapis.com";

const RUN_PAGESPEED_PATH: &str = "/pagespeedonline/v5/runPagespeed";

/// Fetches mobile lab metrics from the PageSpeed Insights v5 API.
#[derive(Clone)]
pub struct PageSpeedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl PageSpeedClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_PAGESPEED_BASE_URL.to_string(),
            api_key,
            max_retries: 1,
        }
    }

    /// Point the client at a different host (used against mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[async_trait]
impl MetricsProvider for PageSpeedClient {
    async fn fetch(&self, url: &str) -> Result<PerformanceMetrics, ProviderError> {
        let endpoint = format!("{}{}", self.base_url, RUN_PAGESPEED_PATH);
        let mut query = vec![
            ("url", url.to_string()),
            ("strategy", "mobile".to_string()),
            ("category", "performance".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        debug!("requesting PageSpeed metrics for {url}");
        let resp = send_with_retry(|| self.client.get(&endpoint).query(&query), self.max_retries).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        parse_lighthouse(&body)
    }
}

/// Extract metrics from a `runPagespeed` response body.
pub fn parse_lighthouse(body: &Value) -> Result<PerformanceMetrics, ProviderError> {
    let lighthouse = body
        .get("lighthouseResult")
        .ok_or_else(|| ProviderError::Malformed("missing lighthouseResult".to_string()))?;

    let audit = |name: &str| {
        lighthouse
            .get("audits")
            .and_then(|a| a.get(name))
            .and_then(|a| a.get("numericValue"))
            .and_then(Value::as_f64)
    };

    Ok(PerformanceMetrics {
        performance_score: lighthouse
            .pointer("/categories/performance/score")
            .and_then(Value::as_f64),
        first_contentful_paint_ms: audit("first-contentful-paint"),
        largest_contentful_paint_ms: audit("largest-contentful-paint"),
        total_blocking_time_ms: audit("total-blocking-time"),
        cumulative_layout_shift: audit("cumulative-layout-shift"),
        speed_index_ms: audit("speed-index"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> Value {
        json!({
            "lighthouseResult": {
                "categories": { "performance": { "score": 0.42 } },
                "audits": {
                    "first-contentful-paint": { "numericValue": 1800.0 },
                    "largest-contentful-paint": { "numericValue": 5200.5 },
                    "total-blocking-time": { "numericValue": 350.0 },
                    "cumulative-layout-shift": { "numericValue": 0.02 },
                    "speed-index": { "numericValue": 4100.0 }
                }
            }
        })
    }

    #[test]
    fn test_parse_lighthouse() {
        let m = parse_lighthouse(&sample_body()).unwrap();
        assert_eq!(m.performance_score, Some(0.42));
        assert_eq!(m.largest_contentful_paint_ms, Some(5200.5));
        assert_eq!(m.cumulative_layout_shift, Some(0.02));
    }

    #[test]
    fn test_parse_missing_lighthouse() {
        let err = parse_lighthouse(&json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fetch_from_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RUN_PAGESPEED_PATH))
            .and(query_param("url", "https://example.com"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .mount(&server)
            .await;

        let client = PageSpeedClient::new(Some("k".into()), Duration::from_secs(5))
            .with_base_url(server.uri())
            .with_max_retries(0);
        let m = client.fetch("https://example.com").await.unwrap();
        assert_eq!(m.total_blocking_time_ms, Some(350.0));
    }

    #[tokio::test]
    async fn test_fetch_maps_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = PageSpeedClient::new(None, Duration::from_secs(5))
            .with_base_url(server.uri())
            .with_max_retries(0);
        let err = client.fetch("https://example.com").await.unwrap_err();
        assert_eq!(err, ProviderError::Auth(403));
    }
}
