//! Accessibility: text alternatives, labels, landmarks, focus order.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::first_skipped_level;
use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::dom::{ElementNode, ElementTree};
use crate::page::PageModel;
use crate::types::{Category, Finding, Severity};

/// Input types that need no visible label.
const UNLABELED_INPUT_TYPES: &[&str] = &["hidden", "submit", "button", "image", "reset"];

pub const ACCESSIBILITY_RUBRIC: Rubric = Rubric::new(Category::Accessibility, ACCESSIBILITY_RULES);

const ACCESSIBILITY_RULES: &[RubricEntry] = &[
    rule("accessibility.images.missing_alt", Severity::Major, 15.0),
    rule("accessibility.lang.missing", Severity::Major, 15.0),
    rule("accessibility.forms.unlabeled", Severity::Major, 10.0),
    rule("accessibility.links.empty", Severity::Minor, 10.0),
    rule("accessibility.buttons.empty", Severity::Minor, 5.0),
    rule("accessibility.landmarks.missing_main", Severity::Minor, 5.0),
    rule("accessibility.tabindex.positive", Severity::Minor, 5.0),
    rule("accessibility.ids.duplicate", Severity::Minor, 5.0),
    rule("accessibility.headings.skipped_level", Severity::Minor, 5.0),
];

/// WCAG-oriented markup checks.
pub struct AccessibilityAnalyzer;

#[async_trait]
impl AnalyzerUnit for AccessibilityAnalyzer {
    fn name(&self) -> &str {
        "accessibility"
    }

    fn category(&self) -> Category {
        Category::Accessibility
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &ACCESSIBILITY_RUBRIC;
        let tree = &page.tree;
        let mut out = Vec::new();

        let images = tree.count("img");
        let missing_alt = tree
            .elements("img")
            .filter(|(_, img)| !img.has_attr("alt") && !has_accessible_name(img))
            .count();
        if missing_alt > 0 {
            out.push(
                r.finding(
                    "accessibility.images.missing_alt",
                    format!("{missing_alt} of {images} image(s) have no text alternative."),
                )?
                .with_recommendation("Add alt text; use alt=\"\" for purely decorative images."),
            );
        }

        let has_lang = tree
            .first("html")
            .and_then(|h| h.non_empty_attr("lang"))
            .is_some();
        if !has_lang {
            out.push(
                r.finding("accessibility.lang.missing", "The <html> element has no lang attribute.")?
                    .with_recommendation("Declare the page language, e.g. <html lang=\"en\">."),
            );
        }

        let unlabeled = unlabeled_controls(tree);
        if unlabeled > 0 {
            out.push(
                r.finding(
                    "accessibility.forms.unlabeled",
                    format!("{unlabeled} form control(s) have no associated label."),
                )?
                .with_recommendation("Associate every control with a <label> or aria-label."),
            );
        }

        let empty_links = tree
            .elements("a")
            .filter(|(idx, a)| a.has_attr("href") && !has_content(tree, *idx, a))
            .count();
        if empty_links > 0 {
            out.push(
                r.finding(
                    "accessibility.links.empty",
                    format!("{empty_links} link(s) have no discernible text."),
                )?
                .with_recommendation("Give every link text or an aria-label describing its target."),
            );
        }

        let empty_buttons = tree
            .elements("button")
            .filter(|(idx, b)| !has_content(tree, *idx, b))
            .count();
        if empty_buttons > 0 {
            out.push(
                r.finding(
                    "accessibility.buttons.empty",
                    format!("{empty_buttons} button(s) have no discernible text."),
                )?
                .with_recommendation("Label icon-only buttons with aria-label."),
            );
        }

        let has_main = tree.count("main") > 0
            || tree
                .nodes()
                .iter()
                .any(|n| n.attr("role").is_some_and(|v| v.eq_ignore_ascii_case("main")));
        if !has_main {
            out.push(
                r.finding("accessibility.landmarks.missing_main", "The page has no main landmark.")?
                    .with_recommendation("Wrap the primary content in <main>."),
            );
        }

        let positive_tabindex = tree
            .nodes()
            .iter()
            .filter(|n| {
                n.attr("tabindex")
                    .and_then(|v| v.trim().parse::<i32>().ok())
                    .is_some_and(|v| v > 0)
            })
            .count();
        if positive_tabindex > 0 {
            out.push(
                r.finding(
                    "accessibility.tabindex.positive",
                    format!("{positive_tabindex} element(s) use a positive tabindex."),
                )?
                .with_recommendation("Use tabindex 0 or -1 and let DOM order define focus order."),
            );
        }

        let duplicates = duplicate_ids(tree);
        if !duplicates.is_empty() {
            out.push(
                r.finding(
                    "accessibility.ids.duplicate",
                    format!("Duplicate id values: {}.", duplicates.join(", ")),
                )?
                .with_recommendation("Make every id unique so labels and ARIA references resolve."),
            );
        }

        if let Some((from, to)) = first_skipped_level(tree) {
            out.push(
                r.finding(
                    "accessibility.headings.skipped_level",
                    format!("Heading levels jump from h{from} to h{to}."),
                )?
                .with_recommendation("Keep heading levels sequential for screen reader navigation."),
            );
        }

        Ok(out)
    }
}

fn has_accessible_name(node: &ElementNode) -> bool {
    node.non_empty_attr("aria-label").is_some()
        || node.non_empty_attr("aria-labelledby").is_some()
        || node.non_empty_attr("title").is_some()
}

/// Text, an accessible name, or an image with alt text inside.
fn has_content(tree: &ElementTree, idx: usize, node: &ElementNode) -> bool {
    !node.text.is_empty()
        || has_accessible_name(node)
        || tree
            .descendants(idx)
            .any(|d| d.tag == "img" && d.non_empty_attr("alt").is_some())
}

fn unlabeled_controls(tree: &ElementTree) -> usize {
    let label_targets: HashSet<&str> = tree
        .elements("label")
        .filter_map(|(_, l)| l.non_empty_attr("for"))
        .collect();

    tree.nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| match n.tag.as_str() {
            "input" => {
                let ty = n.attr("type").unwrap_or("text").to_ascii_lowercase();
                !UNLABELED_INPUT_TYPES.contains(&ty.as_str())
            }
            "select" | "textarea" => true,
            _ => false,
        })
        .filter(|(idx, n)| {
            let by_for = n.non_empty_attr("id").is_some_and(|id| label_targets.contains(id));
            !(by_for || has_accessible_name(n) || tree.has_ancestor(*idx, "label"))
        })
        .count()
}

/// Ids used more than once, sorted.
fn duplicate_ids(tree: &ElementTree) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for id in tree.nodes().iter().filter_map(|n| n.non_empty_attr("id")) {
        *seen.entry(id).or_insert(0) += 1;
    }
    let mut dups: Vec<String> = seen
        .into_iter()
        .filter(|(_, c)| *c > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    dups.sort();
    dups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::{checks, run};

    #[tokio::test]
    async fn test_accessible_page() {
        let html = r#"<html lang="en"><body><main>
<h1>Title</h1><h2>Sub</h2>
<img src="a.png" alt="A chart"><img src="b.png" alt="">
<label for="email">Email</label><input id="email" type="email">
<label>Name <input type="text"></label>
<input type="hidden" name="t"><input type="submit" value="Send">
<a href="/x">Read more</a><a href="/y"><img src="i.png" alt="Home"></a>
<button aria-label="Close"></button>
</main></body></html>"#;
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&AccessibilityAnalyzer, &page).await;
        assert!(findings.is_empty(), "unexpected: {:?}", checks(&findings));
    }

    #[tokio::test]
    async fn test_inaccessible_page() {
        let html = r#"<html><body>
<h1>T</h1><h3>Skip</h3>
<img src="a.png"><img src="b.png">
<input id="q" type="text"><select></select>
<a href="/x"></a><button></button>
<div id="dup" tabindex="3"></div><span id="dup"></span>
</body></html>"#;
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&AccessibilityAnalyzer, &page).await;
        assert_eq!(
            checks(&findings),
            vec![
                "accessibility.images.missing_alt",
                "accessibility.lang.missing",
                "accessibility.forms.unlabeled",
                "accessibility.links.empty",
                "accessibility.buttons.empty",
                "accessibility.landmarks.missing_main",
                "accessibility.tabindex.positive",
                "accessibility.ids.duplicate",
                "accessibility.headings.skipped_level",
            ]
        );
        assert!(findings[0].message.starts_with("2 of 2"));
        assert!(findings[2].message.starts_with("2 form"));
        assert!(findings[7].message.contains("dup"));
    }
}
