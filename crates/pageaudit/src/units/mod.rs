//! Built-in rule-based analyzer units, one per category.
//!
//! Each unit owns its rubric table. Checks that fire become findings;
//! checks that pass produce nothing.

pub mod accessibility;
pub mod content;
pub mod design;
pub mod performance;
pub mod security;
pub mod seo;

pub use accessibility::AccessibilityAnalyzer;
pub use content::ContentAnalyzer;
pub use design::DesignAnalyzer;
pub use performance::PerformanceAnalyzer;
pub use security::SecurityAnalyzer;
pub use seo::SeoAnalyzer;

use crate::dom::ElementTree;

/// First place where the heading hierarchy jumps more than one level down.
pub(crate) fn first_skipped_level(tree: &ElementTree) -> Option<(u8, u8)> {
    let levels: Vec<u8> = tree.headings().iter().map(|(l, _)| *l).collect();
    levels
        .windows(2)
        .find(|w| w[1] > w[0] + 1)
        .map(|w| (w[0], w[1]))
}

/// Lowercase alphabetic words of at least `min_len` letters.
pub(crate) fn alphabetic_words(text: &str, min_len: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::analyzer::{AnalysisContext, AnalyzerUnit};
    use crate::page::PageModel;
    use crate::types::Finding;

    /// Run a unit against a page with an empty context.
    pub async fn run(unit: &dyn AnalyzerUnit, page: &PageModel) -> Vec<Finding> {
        unit.analyze(page, &AnalysisContext::default())
            .await
            .expect("unit should not fail")
    }

    pub fn checks(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.check.as_str()).collect()
    }

    /// `count` words of filler, cycling through a fixed vocabulary so no word
    /// dominates.
    pub fn filler(count: usize) -> String {
        const VOCAB: &[&str] = &[
            "river", "mountain", "coffee", "garden", "window", "silver", "harbor", "meadow",
            "lantern", "orchard", "compass", "thunder", "violet", "granite", "pepper",
            "saddle", "canyon", "falcon", "marble", "timber", "breeze", "copper", "willow",
            "anchor", "basket", "candle", "desert", "feather", "glacier", "hollow", "island",
            "jasmine", "kettle", "ladder", "mirror", "needle", "oyster", "pillow", "quartz",
            "ribbon", "shadow", "tunnel", "velvet", "wagon", "yonder", "zephyr", "almond",
            "bramble", "cobalt", "dynamo", "ember", "fiddle", "goblet", "hazel", "indigo",
            "juniper", "kelp", "lilac", "mosaic", "nectar",
        ];
        (0..count)
            .map(|i| VOCAB[i % VOCAB.len()])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_level_detection() {
        let tree = ElementTree::parse("<h1>a</h1><h2>b</h2><h4>c</h4>");
        assert_eq!(first_skipped_level(&tree), Some((2, 4)));
        let tree = ElementTree::parse("<h1>a</h1><h2>b</h2><h3>c</h3><h2>d</h2>");
        assert_eq!(first_skipped_level(&tree), None);
    }

    #[test]
    fn test_alphabetic_words() {
        assert_eq!(
            alphabetic_words("The cat's 42 hats, ok?", 3),
            vec!["the", "cat", "hats"]
        );
    }
}
