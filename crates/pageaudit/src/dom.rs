//! Owned element tree built from raw markup.
//!
//! `scraper::Html` is not thread-safe, so the markup is parsed once and
//! flattened into an arena of plain nodes that every analyzer can read
//! concurrently.

use std::collections::HashMap;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

/// Tags whose text never reaches the reader.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// One element in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes with lowercase names, in source order.
    pub attrs: Vec<(String, String)>,
    /// Whitespace-normalized text of the element and its descendants.
    pub text: String,
    /// Index of the parent element, `None` for the root.
    pub parent: Option<usize>,
    pub depth: u32,
}

impl ElementNode {
    /// Attribute value by (case-insensitive) name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Attribute value trimmed, treating empty values as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Heading level for `h1`..`h6`.
    pub fn heading_level(&self) -> Option<u8> {
        let bytes = self.tag.as_bytes();
        if bytes.len() == 2 && bytes[0] == b'h' && (b'1'..=b'6').contains(&bytes[1]) {
            Some(bytes[1] - b'0')
        } else {
            None
        }
    }
}

/// Flattened, immutable element tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementTree {
    nodes: Vec<ElementNode>,
    visible_text: String,
}

impl ElementTree {
    /// Parse markup into an element tree. Never fails; broken markup yields
    /// whatever the HTML5 parser recovers, empty markup an empty-bodied tree.
    pub fn parse(markup: &str) -> Self {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        let mut visible = Vec::new();

        for node in root.descendants() {
            if let Some(text) = node.value().as_text() {
                let hidden = node
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|el| INVISIBLE_TAGS.contains(&el.value().name()));
                if !hidden {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        visible.push(trimmed.to_string());
                    }
                }
                continue;
            }

            let Some(element) = ElementRef::wrap(node) else {
                continue;
            };

            let parent = element
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|p| index.get(&p.id()).copied());
            let depth = parent
                .map(|p: usize| nodes_depth(&nodes, p) + 1)
                .unwrap_or(0);

            let value = element.value();
            let attrs = value
                .attrs()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect();

            index.insert(element.id(), nodes.len());
            nodes.push(ElementNode {
                tag: value.name().to_ascii_lowercase(),
                attrs,
                text: normalize_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
                parent,
                depth,
            });
        }

        Self {
            nodes,
            visible_text: normalize_whitespace(&visible.join(" ")),
        }
    }

    /// All elements in document order.
    pub fn nodes(&self) -> &[ElementNode] {
        &self.nodes
    }

    pub fn get(&self, idx: usize) -> Option<&ElementNode> {
        self.nodes.get(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Elements with the given tag, with their arena index.
    pub fn elements<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (usize, &'a ElementNode)> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.tag == tag)
    }

    pub fn first(&self, tag: &str) -> Option<&ElementNode> {
        self.nodes.iter().find(|n| n.tag == tag)
    }

    pub fn count(&self, tag: &str) -> usize {
        self.nodes.iter().filter(|n| n.tag == tag).count()
    }

    /// Indices of the ancestors of `idx`, nearest first.
    pub fn ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.nodes.get(idx).and_then(|n| n.parent), move |&p| {
            self.nodes.get(p).and_then(|n| n.parent)
        })
    }

    pub fn has_ancestor(&self, idx: usize, tag: &str) -> bool {
        self.ancestors(idx).any(|a| self.nodes[a].tag == tag)
    }

    /// Descendants of `idx`. Document order keeps a subtree contiguous, so
    /// this is the run of deeper nodes right after it.
    pub fn descendants(&self, idx: usize) -> impl Iterator<Item = &ElementNode> + '_ {
        let depth = self.nodes.get(idx).map(|n| n.depth);
        self.nodes
            .iter()
            .skip(idx + 1)
            .take_while(move |n| depth.is_some_and(|d| n.depth > d))
    }

    /// Content of `<meta name=...>` (case-insensitive name).
    pub fn meta_content(&self, name: &str) -> Option<&str> {
        self.nodes
            .iter()
            .filter(|n| n.tag == "meta")
            .find(|n| n.attr("name").is_some_and(|v| v.eq_ignore_ascii_case(name)))
            .and_then(|n| n.attr("content"))
    }

    /// Whether a `<meta name=...>` tag exists at all.
    pub fn has_meta(&self, name: &str) -> bool {
        self.nodes
            .iter()
            .filter(|n| n.tag == "meta")
            .any(|n| n.attr("name").is_some_and(|v| v.eq_ignore_ascii_case(name)))
    }

    /// `<link rel=...>` elements whose rel list contains `rel`.
    pub fn links_with_rel<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a ElementNode> + 'a {
        self.nodes.iter().filter(move |n| {
            n.tag == "link"
                && n.attr("rel").is_some_and(|v| {
                    v.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case(rel))
                })
        })
    }

    /// Text of the first `<title>`, trimmed.
    pub fn title(&self) -> Option<&str> {
        self.first("title").map(|n| n.text.as_str())
    }

    /// Headings `(level, text)` in document order.
    pub fn headings(&self) -> Vec<(u8, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| n.heading_level().map(|l| (l, n.text.as_str())))
            .collect()
    }

    /// Text a reader would see, excluding scripts and styles.
    pub fn visible_text(&self) -> &str {
        &self.visible_text
    }

    pub fn word_count(&self) -> usize {
        self.visible_text.split_whitespace().count()
    }
}

fn nodes_depth(nodes: &[ElementNode], idx: usize) -> u32 {
    nodes.get(idx).map(|n| n.depth).unwrap_or(0)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <title>  Sample   Page </title>
  <meta name="Description" content="A sample page">
  <link rel="icon stylesheet" href="/a.css">
  <script>var hidden = "do not count";</script>
</head>
<body>
  <main>
    <h1>Main   Heading</h1>
    <p>First <a href="/x">link</a> here.</p>
    <h3>Skipped</h3>
  </main>
  <style>.x{}</style>
</body>
</html>"#;

    #[test]
    fn test_parse_basic_structure() {
        let tree = ElementTree::parse(SAMPLE);
        assert_eq!(tree.nodes()[0].tag, "html");
        assert_eq!(tree.nodes()[0].attr("LANG"), Some("en"));
        assert_eq!(tree.title(), Some("Sample Page"));
        assert_eq!(tree.meta_content("description"), Some("A sample page"));
        assert_eq!(tree.links_with_rel("stylesheet").count(), 1);
    }

    #[test]
    fn test_headings_in_order() {
        let tree = ElementTree::parse(SAMPLE);
        assert_eq!(tree.headings(), vec![(1, "Main Heading"), (3, "Skipped")]);
    }

    #[test]
    fn test_visible_text_excludes_scripts() {
        let tree = ElementTree::parse(SAMPLE);
        let text = tree.visible_text();
        assert!(text.contains("First link here."));
        assert!(!text.contains("do not count"));
        assert!(!text.contains(".x{}"));
        assert!(!text.contains("Sample Page"));
    }

    #[test]
    fn test_ancestors() {
        let tree = ElementTree::parse(SAMPLE);
        let (idx, _) = tree.elements("a").next().unwrap();
        assert!(tree.has_ancestor(idx, "main"));
        assert!(tree.has_ancestor(idx, "body"));
        assert!(!tree.has_ancestor(idx, "head"));
        let a = tree.get(idx).unwrap();
        let p = tree.get(a.parent.unwrap()).unwrap();
        assert_eq!(p.tag, "p");
        assert_eq!(a.depth, p.depth + 1);
    }

    #[test]
    fn test_descendants_are_contiguous() {
        let tree = ElementTree::parse(SAMPLE);
        let (main_idx, _) = tree.elements("main").next().unwrap();
        let tags: Vec<_> = tree.descendants(main_idx).map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["h1", "p", "a", "h3"]);
    }

    #[test]
    fn test_empty_markup() {
        let tree = ElementTree::parse("");
        assert_eq!(tree.word_count(), 0);
        assert!(tree.title().is_none());
        assert!(tree.first("body").is_some());
    }
}
