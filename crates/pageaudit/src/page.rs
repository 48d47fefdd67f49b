//! The normalized page snapshot every analyzer reads.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dom::ElementTree;

/// Immutable snapshot of one fetch.
///
/// A page fetched with an error status is still a valid page; analyzers
/// report what they find in whatever markup came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageModel {
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Response headers, names lowercased.
    pub headers: Vec<(String, String)>,
    /// Raw markup as received.
    pub html: String,
    pub tree: ElementTree,
    pub fetched_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub fetch_duration: Duration,
}

impl PageModel {
    /// Build a page from response parts, parsing the markup once.
    pub fn new(
        url: impl Into<String>,
        final_url: impl Into<String>,
        status: u16,
        headers: Vec<(String, String)>,
        html: impl Into<String>,
        fetch_duration: Duration,
    ) -> Self {
        let html = html.into();
        let tree = ElementTree::parse(&html);
        Self {
            url: url.into(),
            final_url: final_url.into(),
            status,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            html,
            tree,
            fetched_at: Utc::now(),
            fetch_duration,
        }
    }

    /// A page built from markup alone: status 200, no headers, zero fetch time.
    pub fn from_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(url.clone(), url, 200, Vec::new(), html, Duration::ZERO)
    }

    /// Replace the response headers.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .collect();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_fetch_duration(mut self, duration: Duration) -> Self {
        self.fetch_duration = duration;
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the final URL is served over TLS.
    pub fn is_https(&self) -> bool {
        self.final_url
            .get(..8)
            .is_some_and(|s| s.eq_ignore_ascii_case("https://"))
    }

    /// Size of the raw markup in bytes.
    pub fn html_bytes(&self) -> usize {
        self.html.len()
    }

    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let page = PageModel::from_html("https://example.com", "<p>x</p>")
            .with_headers([("Content-Security-Policy", "default-src 'self'")]);
        assert_eq!(page.header("content-security-policy"), Some("default-src 'self'"));
        assert_eq!(page.header("CONTENT-SECURITY-POLICY"), Some("default-src 'self'"));
        assert!(page.header("x-frame-options").is_none());
    }

    #[test]
    fn test_https_detection() {
        assert!(PageModel::from_html("https://example.com", "").is_https());
        assert!(PageModel::from_html("HTTPS://EXAMPLE.COM", "").is_https());
        assert!(!PageModel::from_html("http://example.com", "").is_https());
    }

    #[test]
    fn test_error_status_still_has_tree() {
        let page = PageModel::from_html("https://example.com/missing", "<h1>Not Found</h1>")
            .with_status(404);
        assert!(page.is_error_status());
        assert_eq!(page.tree.headings(), vec![(1, "Not Found")]);
    }
}
