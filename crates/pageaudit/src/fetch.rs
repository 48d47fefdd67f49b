//! Fetches a page over HTTP and turns the response into a [`PageModel`].
//!
//! Not a browser: no script execution, just the markup and headers the
//! server returns.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::page::PageModel;
use crate::types::{AuditError, AuditResult};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP page fetcher.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries: 2,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET the page, retrying on 5xx and backing off on 429.
    ///
    /// Error statuses still produce a page. Only an invalid URL or a
    /// transport failure is an error. The recorded load time covers the
    /// attempt that produced the page, not earlier retries or backoff.
    pub async fn fetch(&self, url: &str) -> AuditResult<PageModel> {
        let parsed = validate_url(url)?;
        let mut retries = 0u32;

        loop {
            let started = Instant::now();
            let resp = self
                .client
                .get(parsed.clone())
                .send()
                .await
                .map_err(|e| AuditError::Fetch(format!("{url}: {e}")))?;
            let status = resp.status().as_u16();

            if status >= 500 && retries < self.max_retries {
                retries += 1;
                let delay = Duration::from_millis(500 * 2u64.pow(retries - 1));
                debug!(url, status, retries, "Retrying page fetch");
                tokio::time::sleep(delay).await;
                continue;
            }

            if status == 429 && retries < self.max_retries {
                retries += 1;
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(2);
                tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                continue;
            }

            let final_url = resp.url().to_string();
            let headers: Vec<(String, String)> = resp
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();
            let body = resp
                .text()
                .await
                .map_err(|e| AuditError::Fetch(format!("{url}: reading body: {e}")))?;

            let elapsed = started.elapsed();
            info!(
                url,
                final_url = %final_url,
                status,
                bytes = body.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Fetched page"
            );
            return Ok(PageModel::new(url, final_url, status, headers, body, elapsed));
        }
    }

    /// Like [`PageFetcher::fetch`], but gives up with
    /// [`AuditError::Cancelled`] as soon as `cancel` completes.
    pub async fn fetch_until<F>(&self, url: &str, cancel: F) -> AuditResult<PageModel>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                warn!(url, "Page fetch cancelled");
                Err(AuditError::Cancelled)
            }
            page = self.fetch(url) => page,
        }
    }
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

/// Accept absolute http(s) URLs only.
pub fn validate_url(url: &str) -> AuditResult<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| AuditError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        scheme => Err(AuditError::InvalidUrl(format!(
            "{url}: unsupported scheme {scheme:?}"
        ))),
    }
}
