//! Design: responsive setup, page chrome, presentational markup, calls to
//! action, image handling and typography.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::dom::{ElementNode, ElementTree};
use crate::page::PageModel;
use crate::types::{Category, Finding, Severity};

const DEPRECATED_TAGS: &[&str] = &[
    "font", "center", "marquee", "blink", "big", "strike", "tt", "frame", "frameset",
];
const INLINE_STYLE_LIMIT: usize = 20;
const MAX_FONT_FAMILIES: usize = 3;
const MIN_FONT_PX: f64 = 12.0;
/// Below this many images lazy loading is not worth flagging.
const LAZY_LOADING_MIN_IMAGES: usize = 6;

const CTA_CLASS_HINTS: &[&str] = &["btn", "button", "cta"];
const CTA_TEXT: &[&str] = &[
    "sign up", "subscribe", "register", "get started", "learn more", "contact us", "try", "buy",
    "download", "shop",
];

const FONT_FAMILY_PATTERN: &str = r"(?i)font-family\s*:\s*([^;}]+)";
const FONT_SIZE_PATTERN: &str = r"(?i)font-size\s*:\s*(\d+(?:\.\d+)?)px";

pub const DESIGN_RUBRIC: Rubric = Rubric::new(Category::Design, DESIGN_RULES);

const DESIGN_RULES: &[RubricEntry] = &[
    rule("design.viewport.missing", Severity::Major, 15.0),
    rule("design.navigation.missing", Severity::Minor, 10.0),
    rule("design.footer.missing", Severity::Minor, 5.0),
    rule("design.deprecated_tags", Severity::Minor, 10.0),
    rule("design.inline_styles.heavy", Severity::Minor, 5.0),
    rule("design.favicon.missing", Severity::Minor, 5.0),
    rule("design.cta.missing", Severity::Minor, 5.0),
    rule("design.images.not_responsive", Severity::Info, 0.0),
    rule("design.images.no_lazy_loading", Severity::Info, 0.0),
    rule("design.typography.too_many_fonts", Severity::Minor, 5.0),
    rule("design.typography.small_text", Severity::Minor, 5.0),
];

pub struct DesignAnalyzer;

#[async_trait]
impl AnalyzerUnit for DesignAnalyzer {
    fn name(&self) -> &str {
        "design"
    }

    fn category(&self) -> Category {
        Category::Design
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &DESIGN_RUBRIC;
        let tree = &page.tree;
        let mut out = Vec::new();

        let responsive = tree
            .meta_content("viewport")
            .is_some_and(|c| c.to_ascii_lowercase().contains("width"));
        if !responsive {
            out.push(
                r.finding(
                    "design.viewport.missing",
                    "No responsive viewport is declared; mobile browsers will render a zoomed-out desktop layout.",
                )?
                .with_recommendation("Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">."),
            );
        }

        let has_nav = tree.count("nav") > 0
            || tree
                .nodes()
                .iter()
                .any(|n| n.attr("role").is_some_and(|v| v.eq_ignore_ascii_case("navigation")));
        if !has_nav {
            out.push(
                r.finding("design.navigation.missing", "The page has no navigation region.")?
                    .with_recommendation("Wrap site navigation in <nav>."),
            );
        }

        let has_footer = tree.count("footer") > 0
            || tree
                .nodes()
                .iter()
                .any(|n| n.attr("role").is_some_and(|v| v.eq_ignore_ascii_case("contentinfo")));
        if !has_footer {
            out.push(
                r.finding("design.footer.missing", "The page has no footer.")?
                    .with_recommendation("Add a <footer> with contact and legal links."),
            );
        }

        let deprecated: Vec<&str> = DEPRECATED_TAGS
            .iter()
            .copied()
            .filter(|t| tree.count(t) > 0)
            .collect();
        if !deprecated.is_empty() {
            out.push(
                r.finding(
                    "design.deprecated_tags",
                    format!("Deprecated presentational tags in use: {}.", deprecated.join(", ")),
                )?
                .with_recommendation("Replace presentational tags with CSS."),
            );
        }

        let inline = tree
            .nodes()
            .iter()
            .filter(|n| n.non_empty_attr("style").is_some())
            .count();
        if inline > INLINE_STYLE_LIMIT {
            out.push(
                r.finding(
                    "design.inline_styles.heavy",
                    format!("{inline} elements carry inline styles."),
                )?
                .with_recommendation("Move inline styles into a stylesheet."),
            );
        }

        let has_favicon = tree.nodes().iter().any(|n| {
            n.tag == "link"
                && n.attr("rel").is_some_and(|v| {
                    v.split_ascii_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("icon") || r.eq_ignore_ascii_case("apple-touch-icon"))
                })
        });
        if !has_favicon {
            out.push(
                r.finding("design.favicon.missing", "No favicon is declared.")?
                    .with_recommendation("Add <link rel=\"icon\" href=\"/favicon.ico\">."),
            );
        }

        if !has_call_to_action(tree) {
            out.push(
                r.finding("design.cta.missing", "No button or button-styled link invites the visitor to act.")?
                    .with_recommendation("Give the primary action a prominent button."),
            );
        }

        image_findings(tree, &mut out)?;
        typography_findings(tree, &mut out)?;

        Ok(out)
    }
}

fn has_call_to_action(tree: &ElementTree) -> bool {
    if tree.count("button") > 0 {
        return true;
    }
    let input_button = tree.elements("input").any(|(_, i)| {
        i.attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("submit") || t.eq_ignore_ascii_case("button"))
    });
    input_button
        || tree.elements("a").any(|(_, a)| {
            let class = a.attr("class").unwrap_or("").to_ascii_lowercase();
            let text = a.text.to_lowercase();
            CTA_CLASS_HINTS.iter().any(|h| class.contains(h))
                || CTA_TEXT.iter().any(|t| text.contains(t))
        })
}

fn image_findings(tree: &ElementTree, out: &mut Vec<Finding>) -> Result<(), UnitError> {
    let r = &DESIGN_RUBRIC;
    let images: Vec<(usize, &ElementNode)> = tree.elements("img").collect();
    if images.is_empty() {
        return Ok(());
    }

    let responsive = images
        .iter()
        .filter(|(idx, img)| {
            img.has_attr("srcset") || img.has_attr("sizes") || tree.has_ancestor(*idx, "picture")
        })
        .count();
    if responsive == 0 {
        out.push(
            r.finding(
                "design.images.not_responsive",
                format!("None of the {} image(s) offer responsive sources.", images.len()),
            )?
            .with_recommendation("Use srcset/sizes or <picture> so small screens get smaller images."),
        );
    }

    let lazy = images
        .iter()
        .filter(|(_, img)| {
            img.attr("loading").is_some_and(|v| v.eq_ignore_ascii_case("lazy"))
                || img.attr("class").is_some_and(|c| c.split_ascii_whitespace().any(|c| c == "lazyload"))
        })
        .count();
    if images.len() >= LAZY_LOADING_MIN_IMAGES && lazy == 0 {
        out.push(
            r.finding(
                "design.images.no_lazy_loading",
                format!("None of the {} images load lazily.", images.len()),
            )?
            .with_recommendation("Add loading=\"lazy\" to images below the fold."),
        );
    }

    Ok(())
}

fn typography_findings(tree: &ElementTree, out: &mut Vec<Finding>) -> Result<(), UnitError> {
    let r = &DESIGN_RUBRIC;
    let (family_re, size_re) = font_regexes()
        .ok_or_else(|| UnitError::Internal("font patterns failed to compile".to_string()))?;

    let inline_styles: Vec<&str> = tree.nodes().iter().filter_map(|n| n.non_empty_attr("style")).collect();
    let style_blocks = tree.elements("style").map(|(_, s)| s.text.as_str());

    let families: BTreeSet<String> = inline_styles
        .iter()
        .copied()
        .chain(style_blocks)
        .flat_map(|css| family_re.captures_iter(css))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_end_matches("!important").trim().to_ascii_lowercase())
        .filter(|f| !f.is_empty() && f != "inherit")
        .collect();
    if families.len() > MAX_FONT_FAMILIES {
        out.push(
            r.finding(
                "design.typography.too_many_fonts",
                format!("{} different font stacks are declared.", families.len()),
            )?
            .with_recommendation("Settle on two or three typefaces for a consistent look."),
        );
    }

    let small = inline_styles
        .iter()
        .filter(|css| {
            size_re
                .captures_iter(css)
                .filter_map(|c| c.get(1))
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .any(|px| px < MIN_FONT_PX)
        })
        .count();
    if small > 0 {
        out.push(
            r.finding(
                "design.typography.small_text",
                format!("{small} element(s) set text smaller than {MIN_FONT_PX}px."),
            )?
            .with_recommendation("Keep body text at 16px and nothing below 12px."),
        );
    }

    Ok(())
}

/// Font-family and font-size patterns, compiled once per process.
fn font_regexes() -> Option<(&'static Regex, &'static Regex)> {
    static FONT_RES: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    FONT_RES
        .get_or_init(|| Some((Regex::new(FONT_FAMILY_PATTERN).ok()?, Regex::new(FONT_SIZE_PATTERN).ok()?)))
        .as_ref()
        .map(|(family, size)| (family, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::{checks, run};

    #[tokio::test]
    async fn test_well_designed_page() {
        let html = r#"<html><head>
<meta name="viewport" content="width=device-width, initial-scale=1">
<link rel="shortcut icon" href="/favicon.ico">
</head><body><nav><a href="/">Home</a></nav><main><p style="color:red">Hi</p>
<a class="btn btn-primary" href="/shop">Order beans</a></main>
<footer>(c) Example</footer></body></html>"#;
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&DesignAnalyzer, &page).await;
        assert!(findings.is_empty(), "unexpected: {:?}", checks(&findings));
    }

    #[tokio::test]
    async fn test_dated_page() {
        let styled: String = (0..25).map(|i| format!("<span style=\"margin:{i}px\">x</span>")).collect();
        let html = format!("<body><center><font size=\"5\">Welcome</font></center>{styled}</body>");
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&DesignAnalyzer, &page).await;
        assert_eq!(
            checks(&findings),
            vec![
                "design.viewport.missing",
                "design.navigation.missing",
                "design.footer.missing",
                "design.deprecated_tags",
                "design.inline_styles.heavy",
                "design.favicon.missing",
                "design.cta.missing",
            ]
        );
        assert!(findings[3].message.contains("font, center"));
        assert!(findings[4].message.starts_with("25 elements"));
    }

    #[tokio::test]
    async fn test_role_landmarks_count() {
        let html = r#"<meta name="viewport" content="width=device-width"><link rel="icon" href="/i.png">
<div role="navigation"></div><div role="contentinfo"></div><button>Subscribe</button>"#;
        let page = PageModel::from_html("https://example.com", html);
        assert!(run(&DesignAnalyzer, &page).await.is_empty());
    }

    #[tokio::test]
    async fn test_image_and_typography_checks() {
        let images: String = (0..6).map(|i| format!(r#"<img src="p{i}.jpg" alt="Photo {i}">"#)).collect();
        let html = format!(
            r#"<html><head><meta name="viewport" content="width=device-width">
<link rel="icon" href="/i.png">
<style>body {{ font-family: Georgia, serif; }} h1 {{ font-family: "Playfair Display"; }}</style>
</head><body><nav></nav><button>Buy</button>
<p style="font-family: Arial">a</p><p style="font-family: Comic Sans MS; font-size: 10px">b</p>
<p style="font-size: 14px">c</p>{images}<footer></footer></body></html>"#
        );
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&DesignAnalyzer, &page).await;
        assert_eq!(
            checks(&findings),
            vec![
                "design.images.not_responsive",
                "design.images.no_lazy_loading",
                "design.typography.too_many_fonts",
                "design.typography.small_text",
            ]
        );
        assert!(findings[2].message.starts_with("4 different"));
        assert!(findings[3].message.starts_with("1 element"));
    }

    #[tokio::test]
    async fn test_responsive_lazy_images_pass() {
        let images: String = (0..6)
            .map(|i| format!(r#"<img src="p{i}.jpg" srcset="p{i}-2x.jpg 2x" loading="lazy" alt="">"#))
            .collect();
        let tree = ElementTree::parse(&images);
        let mut out = Vec::new();
        image_findings(&tree, &mut out).unwrap();
        assert!(out.is_empty());

        let picture = ElementTree::parse(r#"<picture><source srcset="a.webp"><img src="a.jpg"></picture>"#);
        image_findings(&picture, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
