//! The analyzer unit contract, rubric tables, and the category registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::page::PageModel;
use crate::providers::{MetricsProvider, ProviderError};
use crate::types::{Category, FailureKind, Finding, Severity, Source};
use crate::units;

/// Infrastructure failure inside a unit.
///
/// Expected page conditions (a missing tag, a slow page) are findings, never
/// errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl UnitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UnitError::Upstream(_) => FailureKind::UpstreamUnavailable,
            UnitError::MalformedResponse(_) => FailureKind::MalformedUpstreamResponse,
            UnitError::Internal(_) => FailureKind::Internal,
        }
    }

    /// The message without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            UnitError::Upstream(m) | UnitError::MalformedResponse(m) | UnitError::Internal(m) => m,
        }
    }
}

impl From<ProviderError> for UnitError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Malformed(m) => UnitError::MalformedResponse(m),
            other => UnitError::Upstream(other.to_string()),
        }
    }
}

/// Per-run inputs shared read-only with every unit.
#[derive(Clone, Default)]
pub struct AnalysisContext {
    /// Optional source of lab metrics for the Performance unit.
    pub metrics: Option<Arc<dyn MetricsProvider>>,
    /// Budget for a single metrics request; the unit degrades past it.
    pub metrics_timeout: Option<Duration>,
}

impl AnalysisContext {
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// One analysis capability for one category.
#[async_trait]
pub trait AnalyzerUnit: Send + Sync {
    /// Stable name used in failure records and logs.
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    fn source(&self) -> Source {
        Source::Rule
    }

    /// Inspect the page and return findings in reporting order.
    async fn analyze(
        &self,
        page: &PageModel,
        ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError>;
}

/// One row of a category rubric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RubricEntry {
    pub check: &'static str,
    pub severity: Severity,
    /// Points deducted from 100 when the check fires.
    pub deduction: f64,
}

/// Category-owned scoring table: check id → severity and deduction.
#[derive(Debug, Clone, Copy)]
pub struct Rubric {
    pub category: Category,
    pub entries: &'static [RubricEntry],
}

impl Rubric {
    pub const fn new(category: Category, entries: &'static [RubricEntry]) -> Self {
        Self { category, entries }
    }

    pub fn entry(&self, check: &str) -> Option<&RubricEntry> {
        self.entries.iter().find(|e| e.check == check)
    }

    /// Build a finding for a rubric check.
    ///
    /// Unknown ids are a unit bug, reported as an internal error.
    pub fn finding(&self, check: &str, message: impl Into<String>) -> Result<Finding, UnitError> {
        let entry = self
            .entry(check)
            .ok_or_else(|| UnitError::Internal(format!("check {check} missing from rubric")))?;
        let finding = Finding::observation(self.category, entry.severity, entry.check, message);
        Ok(if entry.deduction > 0.0 {
            finding.with_contribution(entry.deduction)
        } else {
            finding
        })
    }
}

/// Shorthand for rubric rows.
pub(crate) const fn rule(check: &'static str, severity: Severity, deduction: f64) -> RubricEntry {
    RubricEntry {
        check,
        severity,
        deduction,
    }
}

/// Rule-based units keyed by category.
#[derive(Clone, Default)]
pub struct UnitRegistry {
    units: BTreeMap<Category, Arc<dyn AnalyzerUnit>>,
}

impl UnitRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The six built-in analyzers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(units::SeoAnalyzer));
        registry.register(Arc::new(units::PerformanceAnalyzer));
        registry.register(Arc::new(units::ContentAnalyzer));
        registry.register(Arc::new(units::AccessibilityAnalyzer));
        registry.register(Arc::new(units::SecurityAnalyzer));
        registry.register(Arc::new(units::DesignAnalyzer));
        registry
    }

    /// Register a unit under its category, replacing any previous one.
    pub fn register(&mut self, unit: Arc<dyn AnalyzerUnit>) -> &mut Self {
        self.units.insert(unit.category(), unit);
        self
    }

    pub fn get(&self, category: Category) -> Option<Arc<dyn AnalyzerUnit>> {
        self.units.get(&category).cloned()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.units.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[RubricEntry] = &[
        rule("test.bad", Severity::Major, 20.0),
        rule("test.note", Severity::Info, 0.0),
    ];
    const RUBRIC: Rubric = Rubric::new(Category::Seo, TABLE);

    #[test]
    fn test_rubric_finding_carries_deduction() {
        let f = RUBRIC.finding("test.bad", "bad").unwrap();
        assert_eq!(f.severity, Severity::Major);
        assert_eq!(f.contribution, Some(20.0));
        assert_eq!(f.source, Source::Rule);
    }

    #[test]
    fn test_zero_deduction_has_no_contribution() {
        let f = RUBRIC.finding("test.note", "note").unwrap();
        assert!(f.contribution.is_none());
    }

    #[test]
    fn test_unknown_check_is_internal() {
        let err = RUBRIC.finding("test.unknown", "x").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Internal);
    }

    #[test]
    fn test_provider_error_mapping() {
        assert_eq!(
            UnitError::from(ProviderError::RateLimited).kind(),
            FailureKind::UpstreamUnavailable
        );
        assert_eq!(
            UnitError::from(ProviderError::Malformed("x".into())).kind(),
            FailureKind::MalformedUpstreamResponse
        );
    }

    #[test]
    fn test_default_registry_covers_all_categories() {
        let registry = UnitRegistry::with_defaults();
        let cats: Vec<_> = registry.categories().collect();
        assert_eq!(cats, Category::ALL.to_vec());
    }
}
