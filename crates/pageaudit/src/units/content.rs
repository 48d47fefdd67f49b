//! Content quality: depth, readability, structure, calls to action.

use async_trait::async_trait;

use super::alphabetic_words;
use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::page::PageModel;
use crate::types::{Category, Finding, Severity};

const THIN_WORDS: usize = 300;
const LONG_PARAGRAPH_WORDS: usize = 150;
/// Readability is unreliable on very short texts.
const READABILITY_MIN_WORDS: usize = 100;

const CTA_PHRASES: &[&str] = &[
    "contact", "buy", "shop", "order", "sign up", "signup", "subscribe", "get started",
    "learn more", "download", "book", "try", "register", "join", "request",
];

pub const CONTENT_RUBRIC: Rubric = Rubric::new(Category::Content, CONTENT_RULES);

const CONTENT_RULES: &[RubricEntry] = &[
    rule("content.thin", Severity::Major, 15.0),
    rule("content.readability.very_difficult", Severity::Major, 10.0),
    rule("content.readability.difficult", Severity::Minor, 5.0),
    rule("content.paragraphs.missing", Severity::Minor, 10.0),
    rule("content.paragraphs.too_long", Severity::Minor, 5.0),
    rule("content.subheadings.missing", Severity::Minor, 5.0),
    rule("content.lists.missing", Severity::Info, 0.0),
    rule("content.cta.missing", Severity::Info, 0.0),
];

/// Readability and structure of the body copy.
pub struct ContentAnalyzer;

#[async_trait]
impl AnalyzerUnit for ContentAnalyzer {
    fn name(&self) -> &str {
        "content"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    async fn analyze(
        &self,
        page: &PageModel,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &CONTENT_RUBRIC;
        let tree = &page.tree;
        let text = tree.visible_text();
        let words = tree.word_count();
        let mut out = Vec::new();

        if words < THIN_WORDS {
            out.push(
                r.finding("content.thin", format!("The page has only {words} words of content."))?
                    .with_recommendation("Expand the copy so it fully answers the visitor's question."),
            );
        }

        if words >= READABILITY_MIN_WORDS {
            let ease = flesch_reading_ease(text);
            if ease < 30.0 {
                out.push(
                    r.finding(
                        "content.readability.very_difficult",
                        format!("Flesch reading ease is {ease:.1} (very difficult)."),
                    )?
                    .with_recommendation("Use shorter sentences and plainer words."),
                );
            } else if ease < 50.0 {
                out.push(
                    r.finding(
                        "content.readability.difficult",
                        format!("Flesch reading ease is {ease:.1} (difficult)."),
                    )?
                    .with_recommendation("Break up long sentences."),
                );
            }
        }

        let paragraphs: Vec<usize> = tree
            .elements("p")
            .map(|(_, p)| p.text.split_whitespace().count())
            .filter(|&n| n > 0)
            .collect();
        if paragraphs.is_empty() && words > 0 {
            out.push(
                r.finding("content.paragraphs.missing", "Text is not organized into paragraphs.")?
                    .with_recommendation("Wrap body copy in <p> elements."),
            );
        }
        let long = paragraphs.iter().filter(|&&n| n > LONG_PARAGRAPH_WORDS).count();
        if long > 0 {
            out.push(
                r.finding(
                    "content.paragraphs.too_long",
                    format!("{long} paragraph(s) exceed {LONG_PARAGRAPH_WORDS} words."),
                )?
                .with_recommendation("Split long paragraphs into shorter ones."),
            );
        }

        if words > THIN_WORDS {
            let subheadings = tree.headings().iter().filter(|(l, _)| *l > 1).count();
            if subheadings == 0 {
                out.push(
                    r.finding("content.subheadings.missing", "Long copy has no subheadings.")?
                        .with_recommendation("Add H2/H3 subheadings to make the page scannable."),
                );
            }
            if tree.count("ul") + tree.count("ol") == 0 {
                out.push(
                    r.finding("content.lists.missing", "The page uses no lists.")?
                        .with_recommendation("Present steps or features as lists."),
                );
            }
        }

        if !has_call_to_action(page) {
            out.push(
                r.finding("content.cta.missing", "No clear call to action was found.")?
                    .with_recommendation("Add a visible button or link telling visitors what to do next."),
            );
        }

        Ok(out)
    }
}

fn has_call_to_action(page: &PageModel) -> bool {
    let tree = &page.tree;
    if tree.count("button") > 0 {
        return true;
    }
    let submit = tree.elements("input").any(|(_, i)| {
        i.attr("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("submit") || t.eq_ignore_ascii_case("button"))
    });
    submit
        || tree.elements("a").any(|(_, a)| {
            let text = a.text.to_lowercase();
            CTA_PHRASES.iter().any(|p| text.contains(p))
        })
}

/// Flesch reading ease: 206.835 − 1.015·(words/sentences) − 84.6·(syllables/words).
pub fn flesch_reading_ease(text: &str) -> f64 {
    let words = alphabetic_words(text, 1);
    if words.is_empty() {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.chars().any(char::is_alphabetic))
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    206.835
        - 1.015 * (words.len() as f64 / sentences as f64)
        - 84.6 * (syllables as f64 / words.len() as f64)
}

/// Vowel-group syllable estimate with a silent trailing `e`.
fn count_syllables(word: &str) -> usize {
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let v = is_vowel(c);
        if v && !prev_vowel {
            count += 1;
        }
        prev_vowel = v;
    }
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing::{checks, filler, run};

    #[test]
    fn test_syllables() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("garden"), 2);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("readability"), 5);
    }

    #[test]
    fn test_flesch_simple_text_is_easy() {
        let easy = "The cat sat. The dog ran. We had fun.";
        assert!(flesch_reading_ease(easy) > 90.0);
        assert_eq!(flesch_reading_ease(""), 0.0);
    }

    #[tokio::test]
    async fn test_thin_page_without_cta() {
        let page = PageModel::from_html("https://example.com", "<div>Just a few words</div>");
        let ids = checks(&run(&ContentAnalyzer, &page).await).join(",");
        assert!(ids.contains("content.thin"));
        assert!(ids.contains("content.paragraphs.missing"));
        assert!(ids.contains("content.cta.missing"));
    }

    #[tokio::test]
    async fn test_well_structured_page() {
        let sentences: String = (0..40)
            .map(|i| format!("<p>We roast fresh beans each day {i}. Come and see.</p>"))
            .collect();
        let html = format!(
            "<h1>Roastery</h1><h2>Visit</h2>{sentences}<p>{}</p><ul><li>one</li></ul>\
             <a href=\"/contact\">Contact us</a>",
            filler(40)
        );
        let page = PageModel::from_html("https://example.com", html);
        let findings = run(&ContentAnalyzer, &page).await;
        assert!(findings.is_empty(), "unexpected: {:?}", checks(&findings));
    }

    #[tokio::test]
    async fn test_long_copy_without_structure() {
        let html = format!("<p>{}</p><button>Go</button>", filler(400));
        let page = PageModel::from_html("https://example.com", html);
        let ids = checks(&run(&ContentAnalyzer, &page).await).join(",");
        assert!(ids.contains("content.paragraphs.too_long"));
        assert!(ids.contains("content.subheadings.missing"));
        assert!(ids.contains("content.lists.missing"));
        assert!(!ids.contains("content.cta.missing"));
    }
}
