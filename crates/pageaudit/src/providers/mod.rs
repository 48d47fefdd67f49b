//! External providers: performance metrics and language-model completion.
//!
//! The engine only sees the [`MetricsProvider`] and [`LanguageModel`] traits;
//! the HTTP clients here are the default implementations and can be
//! replaced by anything else that satisfies them (tests use in-memory fakes).

pub mod completion;
pub mod pagespeed;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use completion::CompletionClient;
pub use pagespeed::PageSpeedClient;

/// Lab metrics for one URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Lighthouse performance score in [0, 1].
    pub performance_score: Option<f64>,
    pub first_contentful_paint_ms: Option<f64>,
    pub largest_contentful_paint_ms: Option<f64>,
    pub total_blocking_time_ms: Option<f64>,
    pub cumulative_layout_shift: Option<f64>,
    pub speed_index_ms: Option<f64>,
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Errors returned by provider clients.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider rejected credentials (HTTP {0})")]
    Auth(u16),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

/// Source of lab performance metrics.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PerformanceMetrics, ProviderError>;
}

/// Text completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Send a request, retrying on 5xx and transport errors and backing off on 429.
///
/// Auth failures and exhausted retries map onto [`ProviderError`].
pub(crate) async fn send_with_retry<F>(
    build: F,
    max_retries: u32,
) -> Result<reqwest::Response, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retries = 0u32;

    loop {
        match build().send().await {
            Ok(r) => {
                let status = r.status().as_u16();

                if status >= 500 && retries < max_retries {
                    retries += 1;
                    tokio::time::sleep(backoff(retries)).await;
                    continue;
                }

                if status == 429 {
                    if retries < max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }
                    return Err(ProviderError::RateLimited);
                }

                if status == 401 || status == 403 {
                    return Err(ProviderError::Auth(status));
                }

                if !r.status().is_success() {
                    return Err(ProviderError::Unavailable(format!("HTTP {status}")));
                }

                return Ok(r);
            }
            Err(e) => {
                if retries < max_retries {
                    retries += 1;
                    tokio::time::sleep(backoff(retries)).await;
                    continue;
                }
                return Err(e.into());
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(2000));
    }
}
