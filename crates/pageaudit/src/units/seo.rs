//! SEO: titles, meta tags, headings, indexable content.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{alphabetic_words, first_skipped_level};
use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::page::PageModel;
use crate::types::{Category, Finding, Severity};

const TITLE_MIN_CHARS: usize = 10;
const TITLE_MAX_CHARS: usize = 70;
const DESCRIPTION_MIN_CHARS: usize = 50;
const DESCRIPTION_MAX_CHARS: usize = 160;
const THIN_CONTENT_WORDS: usize = 300;
/// Keyword density (percent) above which a term looks stuffed.
const STUFFING_DENSITY: f64 = 5.0;
/// Density is meaningless on very short pages.
const STUFFING_MIN_WORDS: usize = 100;
const URL_MAX_CHARS: usize = 100;

/// Link text that says nothing about the target.
const NON_DESCRIPTIVE_LINK_TEXT: &[&str] = &["click here", "read more", "link", "here", "this", "more"];
/// Hrefs that never lead to another document.
const NON_NAVIGATING_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "#"];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "are", "was", "not", "but", "from",
    "have", "has", "your", "our", "will", "can", "all", "its",
];

pub const SEO_RUBRIC: Rubric = Rubric::new(Category::Seo, SEO_RULES);

const SEO_RULES: &[RubricEntry] = &[
    rule("seo.http_status.error", Severity::Critical, 30.0),
    rule("seo.title.missing", Severity::Critical, 25.0),
    rule("seo.title.empty", Severity::Critical, 25.0),
    rule("seo.title.too_short", Severity::Minor, 5.0),
    rule("seo.title.too_long", Severity::Minor, 5.0),
    rule("seo.meta_description.missing", Severity::Major, 20.0),
    rule("seo.meta_description.empty", Severity::Major, 20.0),
    rule("seo.meta_description.too_short", Severity::Minor, 5.0),
    rule("seo.meta_description.too_long", Severity::Minor, 5.0),
    rule("seo.canonical.missing", Severity::Minor, 5.0),
    rule("seo.canonical.mismatch", Severity::Info, 0.0),
    rule("seo.h1.missing", Severity::Major, 15.0),
    rule("seo.h1.multiple", Severity::Minor, 5.0),
    rule("seo.headings.skipped_level", Severity::Minor, 5.0),
    rule("seo.content.thin", Severity::Minor, 10.0),
    rule("seo.images.missing_alt", Severity::Minor, 10.0),
    rule("seo.viewport.missing", Severity::Major, 10.0),
    rule("seo.links.none", Severity::Minor, 5.0),
    rule("seo.links.no_internal", Severity::Minor, 5.0),
    rule("seo.links.no_external", Severity::Info, 0.0),
    rule("seo.links.non_descriptive", Severity::Minor, 5.0),
    rule("seo.keywords.stuffing", Severity::Minor, 5.0),
    rule("seo.url.unfriendly", Severity::Info, 0.0),
];

/// Search-engine readiness checks.
pub struct SeoAnalyzer;

#[async_trait]
impl AnalyzerUnit for SeoAnalyzer {
    fn name(&self) -> &str {
        "seo"
    }

    fn category(&self) -> Category {
        Category::Seo
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &SEO_RUBRIC;
        let tree = &page.tree;
        let mut out = Vec::new();

        if page.is_error_status() {
            out.push(
                r.finding(
                    "seo.http_status.error",
                    format!("The page responded with HTTP {}.", page.status),
                )?
                .with_recommendation("Serve indexable pages with a 2xx status."),
            );
        }

        match tree.title() {
            None => out.push(
                r.finding("seo.title.missing", "The page has no <title> tag.")?
                    .with_recommendation("Add a unique, descriptive <title> of 50-60 characters."),
            ),
            Some("") => out.push(
                r.finding("seo.title.empty", "The <title> tag is empty.")?
                    .with_recommendation("Fill the <title> with a descriptive page name."),
            ),
            Some(title) => {
                let len = title.chars().count();
                if len < TITLE_MIN_CHARS {
                    out.push(
                        r.finding(
                            "seo.title.too_short",
                            format!("The title is only {len} characters long."),
                        )?
                        .with_recommendation("Lengthen the title to 50-60 characters."),
                    );
                } else if len > TITLE_MAX_CHARS {
                    out.push(
                        r.finding(
                            "seo.title.too_long",
                            format!("The title is {len} characters long and will be truncated."),
                        )?
                        .with_recommendation("Shorten the title to 50-60 characters."),
                    );
                }
            }
        }

        if !tree.has_meta("description") {
            out.push(
                r.finding("seo.meta_description.missing", "The page has no meta description.")?
                    .with_recommendation("Add a meta description of 120-160 characters."),
            );
        } else {
            let desc = tree.meta_content("description").map(str::trim).unwrap_or("");
            let len = desc.chars().count();
            if len == 0 {
                out.push(
                    r.finding("seo.meta_description.empty", "The meta description is empty.")?
                        .with_recommendation("Write a meta description of 120-160 characters."),
                );
            } else if len < DESCRIPTION_MIN_CHARS {
                out.push(
                    r.finding(
                        "seo.meta_description.too_short",
                        format!("The meta description is only {len} characters long."),
                    )?
                    .with_recommendation("Expand the meta description to 120-160 characters."),
                );
            } else if len > DESCRIPTION_MAX_CHARS {
                out.push(
                    r.finding(
                        "seo.meta_description.too_long",
                        format!("The meta description is {len} characters long and will be truncated."),
                    )?
                    .with_recommendation("Trim the meta description to at most 160 characters."),
                );
            }
        }

        let canonical = tree
            .links_with_rel("canonical")
            .find_map(|l| l.non_empty_attr("href"));
        match canonical {
            None => out.push(
                r.finding("seo.canonical.missing", "The page declares no canonical URL.")?
                    .with_recommendation("Add <link rel=\"canonical\"> pointing at the preferred URL."),
            ),
            Some(href) => {
                let resolved = resolve_href(&page.final_url, href).unwrap_or_else(|| href.to_string());
                let target = resolved.trim_end_matches('/');
                if target != page.final_url.trim_end_matches('/') && target != page.url.trim_end_matches('/') {
                    out.push(r.finding(
                        "seo.canonical.mismatch",
                        format!("The canonical URL points elsewhere: {resolved}"),
                    )?);
                }
            }
        }

        let h1_count = tree.count("h1");
        if h1_count == 0 {
            out.push(
                r.finding("seo.h1.missing", "The page has no H1 heading.")?
                    .with_recommendation("Add a single H1 that states the page topic."),
            );
        } else if h1_count > 1 {
            out.push(
                r.finding("seo.h1.multiple", format!("The page has {h1_count} H1 headings."))?
                    .with_recommendation("Keep one H1 and demote the others to H2."),
            );
        }

        if let Some((from, to)) = first_skipped_level(tree) {
            out.push(
                r.finding(
                    "seo.headings.skipped_level",
                    format!("Heading levels jump from h{from} to h{to}."),
                )?
                .with_recommendation("Nest headings one level at a time."),
            );
        }

        let words = tree.word_count();
        if words < THIN_CONTENT_WORDS {
            out.push(
                r.finding(
                    "seo.content.thin",
                    format!("The page has about {words} words of visible text."),
                )?
                .with_recommendation("Provide at least 300 words of substantive content."),
            );
        }

        let missing_alt = tree
            .elements("img")
            .filter(|(_, img)| !img.has_attr("alt"))
            .count();
        if missing_alt > 0 {
            out.push(
                r.finding(
                    "seo.images.missing_alt",
                    format!("{missing_alt} image(s) have no alt attribute."),
                )?
                .with_recommendation("Describe each meaningful image with alt text."),
            );
        }

        if !tree.has_meta("viewport") {
            out.push(
                r.finding("seo.viewport.missing", "The page has no viewport meta tag.")?
                    .with_recommendation(
                        "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">.",
                    ),
            );
        }

        let links = link_profile(page);
        if links.total == 0 {
            out.push(
                r.finding("seo.links.none", "The page has no links.")?
                    .with_recommendation("Link to related pages so crawlers and visitors can move on."),
            );
        } else {
            if links.internal == 0 {
                out.push(
                    r.finding("seo.links.no_internal", "The page links to no other page on this site.")?
                        .with_recommendation("Add internal links to related content."),
                );
            }
            if links.external == 0 {
                out.push(
                    r.finding("seo.links.no_external", "The page links to no other site.")?
                        .with_recommendation("Cite authoritative sources where they help the reader."),
                );
            }
        }
        if links.non_descriptive > 0 {
            out.push(
                r.finding(
                    "seo.links.non_descriptive",
                    format!(
                        "{} link(s) use non-descriptive text such as 'click here'.",
                        links.non_descriptive
                    ),
                )?
                .with_recommendation("Use link text that says where the link goes."),
            );
        }

        if let Some((word, density)) = top_keyword_density(tree.visible_text()) {
            if density > STUFFING_DENSITY {
                out.push(
                    r.finding(
                        "seo.keywords.stuffing",
                        format!("'{word}' makes up {density:.1}% of the text."),
                    )?
                    .with_recommendation("Use the term naturally and vary the wording."),
                );
            }
        }

        if let Some(reason) = unfriendly_url(&page.final_url) {
            out.push(r.finding("seo.url.unfriendly", reason)?);
        }

        Ok(out)
    }
}

/// Most frequent non-stop word and its share of all words, in percent.
/// Ties resolve alphabetically so the result is stable.
fn top_keyword_density(text: &str) -> Option<(String, f64)> {
    let words = alphabetic_words(text, 3);
    if words.len() < STUFFING_MIN_WORDS {
        return None;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        if !STOP_WORDS.contains(&w.as_str()) {
            *counts.entry(w.as_str()).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(w, c)| (w.to_string(), c as f64 * 100.0 / words.len() as f64))
}

/// Resolve `href` against the page URL.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    url::Url::parse(base)
        .ok()?
        .join(href.trim())
        .ok()
        .map(String::from)
}

#[derive(Debug, Default, PartialEq)]
struct LinkProfile {
    /// Anchors with an `href`.
    total: usize,
    internal: usize,
    external: usize,
    non_descriptive: usize,
}

/// Classify anchors as internal or external by host, and count the ones
/// whose text does not describe the target.
fn link_profile(page: &PageModel) -> LinkProfile {
    let base = url::Url::parse(&page.final_url).ok();
    let host = base.as_ref().and_then(|b| b.host_str().map(str::to_ascii_lowercase));
    let mut profile = LinkProfile::default();

    for (_, a) in page.tree.elements("a") {
        let Some(href) = a.attr("href") else {
            continue;
        };
        profile.total += 1;

        let text = if a.text.is_empty() {
            a.non_empty_attr("aria-label").unwrap_or("").to_lowercase()
        } else {
            a.text.to_lowercase()
        };
        if text.chars().count() < 3 || NON_DESCRIPTIVE_LINK_TEXT.contains(&text.as_str()) {
            profile.non_descriptive += 1;
        }

        let href = href.trim();
        let lower = href.to_ascii_lowercase();
        if href.is_empty() || NON_NAVIGATING_SCHEMES.iter().any(|p| lower.starts_with(p)) {
            continue;
        }
        let target = match &base {
            Some(b) => b.join(href).ok(),
            None => url::Url::parse(href).ok(),
        };
        let Some(target) = target else {
            continue;
        };
        let same_host = target
            .host_str()
            .zip(host.as_deref())
            .is_some_and(|(t, h)| t.eq_ignore_ascii_case(h));
        if same_host {
            profile.internal += 1;
        } else {
            profile.external += 1;
        }
    }

    profile
}

fn unfriendly_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let path = parsed.path();
    if url.len() > URL_MAX_CHARS {
        Some(format!("The URL is {} characters long.", url.len()))
    } else if path.contains('_') {
        Some("The URL path uses underscores instead of hyphens.".to_string())
    } else if path.chars().any(|c| c.is_ascii_uppercase()) {
        Some("The URL path contains uppercase characters.".to_string())
    } else {
        None
    }
}
