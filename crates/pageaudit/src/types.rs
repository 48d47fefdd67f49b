//! Core data types for findings, outcomes, and reports.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An analysis dimension. Variant order is the fixed report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Seo,
    Performance,
    Content,
    Accessibility,
    Security,
    Design,
}

impl Category {
    /// Every category, in report order.
    pub const ALL: [Category; 6] = [
        Category::Seo,
        Category::Performance,
        Category::Content,
        Category::Accessibility,
        Category::Security,
        Category::Design,
    ];

    /// Stable lowercase key used in check ids, config, and the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Seo => "seo",
            Category::Performance => "performance",
            Category::Content => "content",
            Category::Accessibility => "accessibility",
            Category::Security => "security",
            Category::Design => "design",
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Seo => "SEO",
            Category::Performance => "Performance",
            Category::Content => "Content",
            Category::Accessibility => "Accessibility",
            Category::Security => "Security",
            Category::Design => "Design",
        }
    }

    /// Weight in the overall score, in basis points. All weights sum to 10_000.
    pub fn weight_bps(self) -> u32 {
        match self {
            Category::Seo => 2_500,
            Category::Performance => 2_000,
            Category::Content => 1_500,
            Category::Accessibility => 1_500,
            Category::Security => 1_500,
            Category::Design => 1_000,
        }
    }

    /// Weight in the overall score as a fraction of 1.0.
    pub fn weight(self) -> f64 {
        self.weight_bps() as f64 / 10_000.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| AuditError::UnknownCategory(s.to_string()))
    }
}

/// How serious a finding is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }

    /// Lenient parse used for model output. Unknown labels map to `Minor`.
    pub fn parse_lenient(s: &str) -> Severity {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "low" | "note" => Severity::Info,
            "major" | "high" | "important" => Severity::Major,
            "critical" | "severe" | "urgent" => Severity::Critical,
            _ => Severity::Minor,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Rule,
    Ai,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Rule => "rule",
            Source::Ai => "ai",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrete observation about the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    /// Machine-readable id, e.g. `seo.meta_description.missing`.
    pub check: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Points deducted from the category score, in [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution: Option<f64>,
    pub source: Source,
}

impl Finding {
    /// A rule-based finding with no score contribution.
    pub fn observation(
        category: Category,
        severity: Severity,
        check: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            check: check.into(),
            message: message.into(),
            recommendation: None,
            contribution: None,
            source: Source::Rule,
        }
    }

    /// Attach recommendation text.
    pub fn with_recommendation(mut self, text: impl Into<String>) -> Self {
        self.recommendation = Some(text.into());
        self
    }

    /// Attach a score deduction, clamped to [0, 100].
    pub fn with_contribution(mut self, points: f64) -> Self {
        self.contribution = Some(points.clamp(0.0, 100.0));
        self
    }

    /// Mark as AI-derived. AI findings never carry a score contribution.
    pub fn from_ai(mut self) -> Self {
        self.source = Source::Ai;
        self.contribution = None;
        self
    }
}

/// Ordered findings produced by one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingSet {
    pub unit: String,
    pub category: Category,
    pub source: Source,
    pub duration_ms: u64,
    pub findings: Vec<Finding>,
}

/// Why a unit produced no findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Internal,
    UpstreamUnavailable,
    MalformedUpstreamResponse,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Internal => "internal",
            FailureKind::UpstreamUnavailable => "upstream_unavailable",
            FailureKind::MalformedUpstreamResponse => "malformed_upstream_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit that ran and failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub unit: String,
    pub category: Category,
    pub source: Source,
    pub kind: FailureKind,
    pub message: String,
    pub duration_ms: u64,
}

/// Result of running one unit for one (category, source) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Success(FindingSet),
    Failure(UnitFailure),
    Skipped { reason: String },
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Success(_))
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            UnitOutcome::Success(set) => &set.findings,
            _ => &[],
        }
    }

    /// Short human-readable reason for a non-success outcome.
    pub fn unavailable_reason(&self) -> Option<String> {
        match self {
            UnitOutcome::Success(_) => None,
            UnitOutcome::Failure(f) => Some(format!("{}: {}", f.kind, f.message)),
            UnitOutcome::Skipped { reason } => Some(format!("skipped: {reason}")),
        }
    }
}

/// Outcomes collected for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub rule: UnitOutcome,
    /// `None` when AI recommendations were not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<UnitOutcome>,
}

/// Count of findings per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub info: u32,
    pub minor: u32,
    pub major: u32,
    pub critical: u32,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Minor => self.minor += 1,
            Severity::Major => self.major += 1,
            Severity::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.info + self.minor + self.major + self.critical
    }
}

/// How complete a category's analysis was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Rule-based analysis and (if requested) AI suggestions succeeded.
    Complete,
    /// Rule-based analysis succeeded but AI suggestions did not.
    Partial,
    /// Rule-based analysis failed; the score is the unavailable sentinel.
    Unavailable,
}

/// One actionable suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    pub text: String,
}

impl Recommendation {
    pub(crate) fn note(source: Source, text: impl Into<String>) -> Self {
        Self {
            source,
            severity: None,
            check: None,
            text: text.into(),
        }
    }
}

/// Score and findings summary for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub score: u8,
    pub status: CategoryStatus,
    pub counts: SeverityCounts,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
}

/// Final report for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub url: String,
    pub overall_score: f64,
    pub categories: Vec<CategoryScore>,
    pub failures: Vec<UnitFailure>,
    pub skipped: Vec<SkippedSource>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Look up a category's score.
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report previously produced by [`Report::to_json`].
    pub fn from_json(json: &str) -> AuditResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A (category, source) pair that was not run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub category: Category,
    pub source: Source,
    pub reason: String,
}

/// Errors surfaced by the library.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("No categories requested")]
    NoCategories,

    #[error("No analyzer registered for category: {0}")]
    UnregisteredCategory(Category),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: u32 = Category::ALL.iter().map(|c| c.weight_bps()).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn test_category_order_is_fixed() {
        let mut sorted = Category::ALL;
        sorted.sort();
        assert_eq!(sorted, Category::ALL);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("SEO".parse::<Category>().unwrap(), Category::Seo);
        assert_eq!(" design ".parse::<Category>().unwrap(), Category::Design);
        assert!(matches!(
            "speed".parse::<Category>(),
            Err(AuditError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_severity_lenient() {
        assert_eq!(Severity::parse_lenient("HIGH"), Severity::Major);
        assert_eq!(Severity::parse_lenient("critical"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("whatever"), Severity::Minor);
    }

    #[test]
    fn test_ai_findings_drop_contribution() {
        let f = Finding::observation(Category::Seo, Severity::Major, "ai.seo.x", "m")
            .with_contribution(10.0)
            .from_ai();
        assert_eq!(f.source, Source::Ai);
        assert!(f.contribution.is_none());
    }

    #[test]
    fn test_contribution_clamped() {
        let f = Finding::observation(Category::Seo, Severity::Major, "x", "m").with_contribution(250.0);
        assert_eq!(f.contribution, Some(100.0));
    }
}
