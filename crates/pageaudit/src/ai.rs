//! AI recommendation adapter.
//!
//! Wraps a [`LanguageModel`] behind the ordinary unit contract: a bounded
//! prompt goes out, a JSON object comes back, and each entry becomes an
//! AI-sourced finding with no score contribution.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::analyzer::{AnalysisContext, AnalyzerUnit, UnitError};
use crate::page::PageModel;
use crate::providers::{CompletionRequest, LanguageModel};
use crate::types::{Category, Finding, Severity, Source};

/// Version tag of the prompt templates below.
pub const PROMPT_VERSION: &str = "pageaudit-prompt/v1";
/// Upper bound on the rendered prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 6_000;
/// At most this many AI findings are kept per category.
pub const MAX_AI_FINDINGS: usize = 10;

const TEXT_EXCERPT_CHARS: usize = 2_000;
const MAX_HEADINGS: usize = 20;
const HEADING_CHARS: usize = 120;
/// Completion length requested when none is configured.
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// One AI unit per category.
pub struct AiRecommendationUnit {
    category: Category,
    name: String,
    client: Arc<dyn LanguageModel>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AiRecommendationUnit {
    pub fn new(category: Category, client: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            category,
            name: format!("ai-{}", category.as_str()),
            client,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl AnalyzerUnit for AiRecommendationUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn source(&self) -> Source {
        Source::Ai
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let prompt = build_prompt(self.category, page);
        debug!(
            unit = %self.name,
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "Requesting AI recommendations"
        );

        let request = CompletionRequest {
            model: self.model.clone(),
            prompt,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let completion = self.client.complete(&request).await?;
        parse_recommendations(self.category, &completion)
    }
}

fn focus(category: Category) -> &'static str {
    match category {
        Category::Seo => "titles, meta descriptions, heading structure, keyword use and internal linking",
        Category::Performance => "page weight, script and stylesheet loading, images and caching",
        Category::Content => "clarity, readability, structure, depth and calls to action",
        Category::Accessibility => "text alternatives, labels, keyboard use, landmarks and contrast risks",
        Category::Security => "transport security, response headers, forms and exposed data",
        Category::Design => "layout, navigation, visual hierarchy and mobile friendliness",
    }
}

/// Render the versioned prompt for one category.
///
/// Only excerpts of the page are included, never the full markup, and the
/// result never exceeds [`MAX_PROMPT_CHARS`].
pub fn build_prompt(category: Category, page: &PageModel) -> String {
    let header = format!(
        "[{PROMPT_VERSION}]\nYou are an expert website auditor reviewing a page for {} quality.\n\
         Focus on {}.\n\nPAGE EXCERPT\n",
        category.label(),
        focus(category),
    );
    let instructions = format!(
        "\nRespond with only a JSON object of this form:\n\
         {{\"recommendations\": [{{\"check\": \"short_snake_case_id\", \
         \"severity\": \"info|minor|major|critical\", \"message\": \"what is wrong\", \
         \"recommendation\": \"what to change\"}}]}}\n\
         Give at most {MAX_AI_FINDINGS} recommendations, most important first.\n"
    );

    let budget = MAX_PROMPT_CHARS
        .saturating_sub(header.chars().count())
        .saturating_sub(instructions.chars().count());
    let excerpt = truncate_chars(&page_excerpt(page), budget);

    format!("{header}{excerpt}{instructions}")
}

fn page_excerpt(page: &PageModel) -> String {
    let tree = &page.tree;
    let mut out = String::new();

    out.push_str(&format!("URL: {}\n", page.final_url));
    out.push_str(&format!("HTTP status: {}\n", page.status));
    out.push_str(&format!("Title: {}\n", tree.title().unwrap_or("(none)")));
    out.push_str(&format!(
        "Meta description: {}\n",
        tree.meta_content("description").unwrap_or("(none)")
    ));

    let headings = tree.headings();
    if !headings.is_empty() {
        out.push_str("Headings:\n");
        for (level, text) in headings.iter().take(MAX_HEADINGS) {
            out.push_str(&format!("  h{level}: {}\n", truncate_chars(text, HEADING_CHARS)));
        }
    }

    out.push_str(&format!(
        "Element counts: words {}, images {}, links {}, forms {}, scripts {}, stylesheets {}\n",
        tree.word_count(),
        tree.count("img"),
        tree.count("a"),
        tree.count("form"),
        tree.count("script"),
        tree.links_with_rel("stylesheet").count(),
    ));

    out.push_str("Visible text (truncated):\n");
    out.push_str(&truncate_chars(tree.visible_text(), TEXT_EXCERPT_CHARS));
    out.push('\n');
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Debug, Deserialize)]
struct AiResponse {
    recommendations: Vec<AiItem>,
}

#[derive(Debug, Deserialize)]
struct AiItem {
    #[serde(default)]
    check: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

/// Parse the JSON object embedded in a completion into AI findings.
///
/// Anything that does not contain a `{"recommendations": [...]}` object is
/// malformed; nothing is invented in its place.
pub fn parse_recommendations(category: Category, completion: &str) -> Result<Vec<Finding>, UnitError> {
    let start = completion.find('{');
    let end = completion.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &completion[s..=e],
        _ => {
            return Err(UnitError::MalformedResponse(
                "completion contains no JSON object".to_string(),
            ))
        }
    };

    let response: AiResponse = serde_json::from_str(json)
        .map_err(|e| UnitError::MalformedResponse(format!("unparseable recommendations: {e}")))?;

    let findings = response
        .recommendations
        .into_iter()
        .filter_map(|item| {
            let message = non_empty(item.message);
            let recommendation = non_empty(item.recommendation);
            let text = message.or_else(|| recommendation.clone())?;
            Some((item.check, item.severity, text, recommendation))
        })
        .take(MAX_AI_FINDINGS)
        .enumerate()
        .map(|(i, (check, severity, message, recommendation))| {
            let slug = check.as_deref().map(slugify).unwrap_or_default();
            let slug = if slug.is_empty() {
                format!("suggestion_{}", i + 1)
            } else {
                slug
            };
            let severity = severity
                .as_deref()
                .map(Severity::parse_lenient)
                .unwrap_or(Severity::Minor);

            let finding = Finding::observation(
                category,
                severity,
                format!("ai.{}.{slug}", category.as_str()),
                message,
            );
            let finding = match recommendation {
                Some(r) => finding.with_recommendation(r),
                None => finding,
            };
            finding.from_ai()
        })
        .collect();

    Ok(findings)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lowercase snake_case id from free-form model output.
fn slugify(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use crate::types::FailureKind;

    struct CannedModel(Result<String, ProviderError>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
            self.0.clone()
        }
    }

    fn ai_unit(response: Result<&str, ProviderError>) -> AiRecommendationUnit {
        let model = CannedModel(response.map(str::to_string));
        AiRecommendationUnit::new(Category::Seo, Arc::new(model), "test-model")
    }

    fn page() -> PageModel {
        PageModel::from_html(
            "https://example.com",
            "<title>Example</title><h1>Welcome</h1><p>Hello there.</p>",
        )
    }

    #[test]
    fn test_prompt_is_versioned_and_bounded() {
        let huge = format!("<h1>Big</h1><p>{}</p>", "lorem ipsum ".repeat(5_000));
        let page = PageModel::from_html("https://example.com", huge);
        let prompt = build_prompt(Category::Content, &page);
        assert!(prompt.starts_with(&format!("[{PROMPT_VERSION}]")));
        assert!(prompt.chars().count() <= MAX_PROMPT_CHARS);
        assert!(prompt.contains("h1: Big"));
        assert!(prompt.contains("\"recommendations\""));
        assert!(!prompt.contains("<p>"));
    }

    #[test]
    fn test_parse_json_inside_prose() {
        let text = r#"Sure! Here you go:
{"recommendations": [
  {"check": "Title Keywords", "severity": "high", "message": "Title lacks keywords.", "recommendation": "Add the main keyword."},
  {"severity": "low", "recommendation": "Link related pages."}
]}
Hope that helps."#;
        let findings = parse_recommendations(Category::Seo, text).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].check, "ai.seo.title_keywords");
        assert_eq!(findings[0].severity, Severity::Major);
        assert_eq!(findings[0].recommendation.as_deref(), Some("Add the main keyword."));
        assert_eq!(findings[1].check, "ai.seo.suggestion_2");
        assert_eq!(findings[1].message, "Link related pages.");
        assert!(findings.iter().all(|f| f.source == Source::Ai && f.contribution.is_none()));
    }

    #[test]
    fn test_parse_caps_findings() {
        let items: Vec<String> = (0..25)
            .map(|i| format!(r#"{{"check":"c{i}","message":"m{i}"}}"#))
            .collect();
        let text = format!(r#"{{"recommendations":[{}]}}"#, items.join(","));
        let findings = parse_recommendations(Category::Design, &text).unwrap();
        assert_eq!(findings.len(), MAX_AI_FINDINGS);
        assert_eq!(findings[0].check, "ai.design.c0");
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        for text in [
            "I think the page is fine.",
            "{not json}",
            r#"{"advice": "add a title"}"#,
        ] {
            let err = parse_recommendations(Category::Seo, text).unwrap_err();
            assert_eq!(err.kind(), FailureKind::MalformedUpstreamResponse, "{text}");
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Meta Description / Length! "), "meta_description_length");
        assert_eq!(slugify("***"), "");
    }

    #[tokio::test]
    async fn test_unit_returns_ai_findings() {
        let unit = ai_unit(Ok(r#"{"recommendations":[{"check":"h1","severity":"minor","message":"Shorten the H1."}]}"#));
        assert_eq!(unit.name(), "ai-seo");
        assert_eq!(unit.source(), Source::Ai);
        let findings = unit.analyze(&page(), &AnalysisContext::default()).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "ai.seo.h1");
    }

    #[tokio::test]
    async fn test_provider_errors_are_upstream_failures() {
        let unit = ai_unit(Err(ProviderError::RateLimited));
        let err = unit.analyze(&page(), &AnalysisContext::default()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::UpstreamUnavailable);

        let unit = ai_unit(Ok("no json here"));
        let err = unit.analyze(&page(), &AnalysisContext::default()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::MalformedUpstreamResponse);
    }
}
