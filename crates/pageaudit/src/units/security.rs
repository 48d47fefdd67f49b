//! Security: transport, response headers, and what the markup exposes.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::page::PageModel;
use crate::types::{Category, Finding, Severity};

const SECRET_PATTERN: &str = r#"(?i)(api[_-]?key|access[_-]?key|secret[_-]?key|auth[_-]?token|client[_-]?secret)["']?\s*[:=]\s*["']([A-Za-z0-9_\-\.]{16,})["']"#;

/// Attributes that pull subresources into the page.
const SUBRESOURCE_ATTRS: &[(&str, &str)] = &[
    ("script", "src"),
    ("img", "src"),
    ("iframe", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("source", "src"),
    ("embed", "src"),
    ("object", "data"),
];

pub const SECURITY_RUBRIC: Rubric = Rubric::new(Category::Security, SECURITY_RULES);

const SECURITY_RULES: &[RubricEntry] = &[
    rule("security.https.missing", Severity::Critical, 30.0),
    rule("security.hsts.missing", Severity::Major, 10.0),
    rule("security.csp.missing", Severity::Major, 10.0),
    rule("security.content_type_options.missing", Severity::Minor, 5.0),
    rule("security.frame_options.missing", Severity::Minor, 5.0),
    rule("security.referrer_policy.missing", Severity::Minor, 3.0),
    rule("security.server.version_disclosed", Severity::Minor, 5.0),
    rule("security.mixed_content", Severity::Major, 10.0),
    rule("security.forms.insecure", Severity::Critical, 20.0),
    rule("security.secrets.exposed", Severity::Critical, 20.0),
];

/// Transport and header hardening checks.
pub struct SecurityAnalyzer;

#[async_trait]
impl AnalyzerUnit for SecurityAnalyzer {
    fn name(&self) -> &str {
        "security"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &SECURITY_RUBRIC;
        let tree = &page.tree;
        let https = page.is_https();
        let mut out = Vec::new();

        if !https {
            out.push(
                r.finding("security.https.missing", "The page is not served over HTTPS.")?
                    .with_recommendation("Serve the site over HTTPS and redirect plain HTTP."),
            );
        } else if page.header("strict-transport-security").is_none() {
            out.push(
                r.finding(
                    "security.hsts.missing",
                    "No Strict-Transport-Security header is sent.",
                )?
                .with_recommendation("Send Strict-Transport-Security: max-age=31536000; includeSubDomains."),
            );
        }

        let csp = page.header("content-security-policy");
        if csp.is_none() {
            out.push(
                r.finding("security.csp.missing", "No Content-Security-Policy header is sent.")?
                    .with_recommendation("Define a Content-Security-Policy that restricts script sources."),
            );
        }

        let nosniff = page
            .header("x-content-type-options")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("nosniff"));
        if !nosniff {
            out.push(
                r.finding(
                    "security.content_type_options.missing",
                    "X-Content-Type-Options is not set to nosniff.",
                )?
                .with_recommendation("Send X-Content-Type-Options: nosniff."),
            );
        }

        let framing_guarded = page.header("x-frame-options").is_some()
            || csp.is_some_and(|v| v.to_ascii_lowercase().contains("frame-ancestors"));
        if !framing_guarded {
            out.push(
                r.finding(
                    "security.frame_options.missing",
                    "Neither X-Frame-Options nor CSP frame-ancestors is set.",
                )?
                .with_recommendation("Send X-Frame-Options: DENY or a frame-ancestors directive."),
            );
        }

        if page.header("referrer-policy").is_none() {
            out.push(
                r.finding("security.referrer_policy.missing", "No Referrer-Policy header is sent.")?
                    .with_recommendation("Send Referrer-Policy: strict-origin-when-cross-origin."),
            );
        }

        let disclosed: Vec<String> = ["server", "x-powered-by"]
            .iter()
            .filter_map(|h| page.header(h).map(|v| (h, v)))
            .filter(|(_, v)| v.chars().any(|c| c.is_ascii_digit()))
            .map(|(h, v)| format!("{h}: {v}"))
            .collect();
        if !disclosed.is_empty() {
            out.push(
                r.finding(
                    "security.server.version_disclosed",
                    format!("Response headers reveal software versions ({}).", disclosed.join("; ")),
                )?
                .with_recommendation("Strip version numbers from Server and X-Powered-By."),
            );
        }

        if https {
            let insecure = insecure_subresources(page);
            if insecure > 0 {
                out.push(
                    r.finding(
                        "security.mixed_content",
                        format!("{insecure} subresource(s) load over plain HTTP."),
                    )?
                    .with_recommendation("Load every script, image, and stylesheet over HTTPS."),
                );
            }
        }

        let insecure_forms = tree
            .elements("form")
            .filter(|(idx, form)| {
                let http_action = form
                    .attr("action")
                    .is_some_and(|a| a.trim().to_ascii_lowercase().starts_with("http://"));
                let password_over_http = !https
                    && tree.descendants(*idx).any(|d| {
                        d.tag == "input"
                            && d.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("password"))
                    });
                http_action || password_over_http
            })
            .count();
        if insecure_forms > 0 {
            out.push(
                r.finding(
                    "security.forms.insecure",
                    format!("{insecure_forms} form(s) submit data without encryption."),
                )?
                .with_recommendation("Submit forms to HTTPS endpoints only."),
            );
        }

        let secrets = secret_regex()
            .ok_or_else(|| UnitError::Internal("secret pattern failed to compile".to_string()))?;
        let exposed = secrets.captures_iter(&page.html).count();
        if exposed > 0 {
            out.push(
                r.finding(
                    "security.secrets.exposed",
                    format!("{exposed} credential-like value(s) appear in the page source."),
                )?
                .with_recommendation("Move keys server-side and rotate any that were published."),
            );
        }

        Ok(out)
    }
}

/// Compiled once per process; `None` if the pattern is invalid.
fn secret_regex() -> Option<&'static Regex> {
    static SECRET_RE: OnceLock<Option<Regex>> = OnceLock::new();
    SECRET_RE.get_or_init(|| Regex::new(SECRET_PATTERN).ok()).as_ref()
}

fn insecure_subresources(page: &PageModel) -> usize {
    let is_http = |v: &str| v.trim().to_ascii_lowercase().starts_with("http://");
    let tree = &page.tree;

    let media = tree
        .nodes()
        .iter()
        .filter(|n| {
            SUBRESOURCE_ATTRS
                .iter()
                .any(|(tag, attr)| n.tag == *tag && n.attr(attr).is_some_and(is_http))
        })
        .count();
    let styles = tree
        .links_with_rel("stylesheet")
        .filter(|l| l.attr("href").is_some_and(is_http))
        .count();

    media + styles
}
