//! OpenAI-style `/completions` client (Together.ai by default).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{send_with_retry, CompletionRequest, LanguageModel, ProviderError};

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.together.xyz/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "meta-llama/Llama-3-70b-chat-hf";

/// Bearer-authenticated completion client.
#[derive(Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl CompletionClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            api_key: api_key.into(),
            max_retries: 1,
        }
    }

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
impl LanguageModel for CompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let endpoint = format!("{}/completions", self.base_url);
        let payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        debug!(
            "requesting completion from {} ({} prompt chars)",
            request.model,
            request.prompt.len()
        );
        let resp = send_with_retry(
            || {
                self.client
                    .post(&endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&payload)
            },
            self.max_retries,
        )
        .await?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        extract_completion_text(&body)
    }
}

/// Read `choices[0].text`, falling back to `choices[0].message.content`.
pub fn extract_completion_text(body: &Value) -> Result<String, ProviderError> {
    let choice = body
        .pointer("/choices/0")
        .ok_or_else(|| ProviderError::Malformed("response has no choices".to_string()))?;

    choice
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| choice.pointer("/message/content").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed("choice has no text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".into(),
            prompt: "hello".into(),
            max_tokens: 16,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_extract_text_variants() {
        let plain = json!({ "choices": [{ "text": "a" }] });
        assert_eq!(extract_completion_text(&plain).unwrap(), "a");

        let chat = json!({ "choices": [{ "message": { "content": "b" } }] });
        assert_eq!(extract_completion_text(&chat).unwrap(), "b");

        let empty = json!({ "choices": [] });
        assert!(matches!(
            extract_completion_text(&empty),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .and(bearer_token("secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "choices": [{ "text": "{}" }] })),
            )
            .mount(&server)
            .await;

        let client = CompletionClient::new("secret", Duration::from_secs(5))
            .with_base_url(server.uri())
            .with_max_retries(0);
        assert_eq!(client.complete(&request()).await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = CompletionClient::new("secret", Duration::from_secs(5))
            .with_base_url(server.uri())
            .with_max_retries(0);
        assert_eq!(
            client.complete(&request()).await.unwrap_err(),
            ProviderError::RateLimited
        );
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = CompletionClient::new("secret", Duration::from_secs(5))
            .with_base_url(server.uri())
            .with_max_retries(0);
        assert!(matches!(
            client.complete(&request()).await.unwrap_err(),
            ProviderError::Unavailable(_)
        ));
    }
}
