//! Concurrent fan-out of analyzer units for one page.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ai::{AiRecommendationUnit, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::analyzer::{AnalysisContext, AnalyzerUnit, UnitRegistry};
use crate::page::PageModel;
use crate::providers::{LanguageModel, MetricsProvider};
use crate::scorer;
use crate::types::{
    AuditError, AuditResult, Category, CategoryOutcome, FailureKind, FindingSet, Report, Source,
    UnitFailure, UnitOutcome,
};

pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(20);

const NO_LANGUAGE_MODEL: &str = "no language model configured";

/// Per-run knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Deadline for each rule-based unit.
    pub unit_timeout: Duration,
    /// Deadline for each AI unit.
    pub ai_timeout: Duration,
    /// Schedule an AI unit next to every rule unit.
    pub ai_recommendations: bool,
    /// Budget the Performance unit gives its metrics provider.
    pub metrics_timeout: Duration,
    /// Completion length for each AI request.
    pub ai_max_tokens: u32,
    /// Sampling temperature for each AI request.
    pub ai_temperature: f32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
            ai_timeout: DEFAULT_AI_TIMEOUT,
            ai_recommendations: false,
            metrics_timeout: DEFAULT_METRICS_TIMEOUT,
            ai_max_tokens: DEFAULT_MAX_TOKENS,
            ai_temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Outcomes for every requested category, in category order.
pub type RunOutcomes = BTreeMap<Category, CategoryOutcome>;

/// Runs the registered units for a page and hands the outcomes to the scorer.
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
#[derive(Clone)]
pub struct Orchestrator {
    registry: UnitRegistry,
    options: RunOptions,
    metrics: Option<Arc<dyn MetricsProvider>>,
    language_model: Option<(Arc<dyn LanguageModel>, String)>,
}

impl Orchestrator {
    pub fn new(registry: UnitRegistry, options: RunOptions) -> Self {
        Self {
            registry,
            options,
            metrics: None,
            language_model: None,
        }
    }

    /// Lab metrics source for the Performance unit.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Language model used by the AI units.
    pub fn with_language_model(
        mut self,
        client: Arc<dyn LanguageModel>,
        model: impl Into<String>,
    ) -> Self {
        self.language_model = Some((client, model.into()));
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every requested category concurrently.
    ///
    /// Unit failures, timeouts, and panics become outcomes; only an empty or
    /// unserviceable category list is an error. Dropping the returned future
    /// aborts all in-flight units.
    pub async fn run(&self, page: Arc<PageModel>, categories: &[Category]) -> AuditResult<RunOutcomes> {
        let units = self.resolve(categories)?;
        let started = Instant::now();
        info!(
            url = %page.url,
            categories = units.len(),
            ai = self.options.ai_recommendations,
            "Starting analysis run"
        );

        let ctx = Arc::new(AnalysisContext {
            metrics: self.metrics.clone(),
            metrics_timeout: Some(self.options.metrics_timeout),
        });

        let mut tasks = JoinSet::new();
        let mut ai_outcomes: BTreeMap<Category, UnitOutcome> = BTreeMap::new();

        for unit in &units {
            spawn_unit(&mut tasks, unit.clone(), page.clone(), ctx.clone(), self.options.unit_timeout);

            if !self.options.ai_recommendations {
                continue;
            }
            match &self.language_model {
                Some((client, model)) => {
                    let ai = AiRecommendationUnit::new(unit.category(), client.clone(), model.clone())
                        .with_max_tokens(self.options.ai_max_tokens)
                        .with_temperature(self.options.ai_temperature);
                    spawn_unit(&mut tasks, Arc::new(ai), page.clone(), ctx.clone(), self.options.ai_timeout);
                }
                None => {
                    ai_outcomes.insert(
                        unit.category(),
                        UnitOutcome::Skipped {
                            reason: NO_LANGUAGE_MODEL.to_string(),
                        },
                    );
                }
            }
        }

        let mut rule_outcomes: BTreeMap<Category, UnitOutcome> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((category, Source::Rule, outcome)) => {
                    rule_outcomes.insert(category, outcome);
                }
                Ok((category, Source::Ai, outcome)) => {
                    ai_outcomes.insert(category, outcome);
                }
                Err(e) => warn!(error = %e, "Analyzer task ended abnormally"),
            }
        }

        let mut outcomes = RunOutcomes::new();
        for unit in &units {
            let category = unit.category();
            let rule = rule_outcomes
                .remove(&category)
                .unwrap_or_else(|| lost_task(unit.name().to_string(), category, Source::Rule));
            let ai = if self.options.ai_recommendations {
                Some(
                    ai_outcomes
                        .remove(&category)
                        .unwrap_or_else(|| lost_task(format!("ai-{category}"), category, Source::Ai)),
                )
            } else {
                None
            };
            outcomes.insert(category, CategoryOutcome { rule, ai });
        }

        info!(
            url = %page.url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis run finished"
        );
        Ok(outcomes)
    }

    /// Run and score.
    pub async fn analyze(&self, page: Arc<PageModel>, categories: &[Category]) -> AuditResult<Report> {
        let outcomes = self.run(page.clone(), categories).await?;
        Ok(scorer::score(&page.url, &outcomes, Utc::now()))
    }

    /// Like [`Orchestrator::analyze`], but gives up as soon as `cancel`
    /// completes. In-flight units are aborted and no partial report is built.
    pub async fn analyze_until<F>(
        &self,
        page: Arc<PageModel>,
        categories: &[Category],
        cancel: F,
    ) -> AuditResult<Report>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                warn!(url = %page.url, "Analysis run cancelled");
                Err(AuditError::Cancelled)
            }
            report = self.analyze(page.clone(), categories) => report,
        }
    }

    fn resolve(&self, categories: &[Category]) -> AuditResult<Vec<Arc<dyn AnalyzerUnit>>> {
        if categories.is_empty() {
            return Err(AuditError::NoCategories);
        }
        let unique: BTreeSet<Category> = categories.iter().copied().collect();
        unique
            .into_iter()
            .map(|c| self.registry.get(c).ok_or(AuditError::UnregisteredCategory(c)))
            .collect()
    }
}

/// Parse category names, rejecting unknown ones.
pub fn parse_categories<S: AsRef<str>>(names: &[S]) -> AuditResult<Vec<Category>> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

fn spawn_unit(
    tasks: &mut JoinSet<(Category, Source, UnitOutcome)>,
    unit: Arc<dyn AnalyzerUnit>,
    page: Arc<PageModel>,
    ctx: Arc<AnalysisContext>,
    limit: Duration,
) {
    tasks.spawn(async move {
        let category = unit.category();
        let source = unit.source();
        let started = Instant::now();

        let guarded = AssertUnwindSafe(unit.analyze(&page, &ctx)).catch_unwind();
        let result = tokio::time::timeout(limit, guarded).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let failure = |kind: FailureKind, message: String| {
            warn!(unit = unit.name(), %category, %source, kind = %kind, %message, "Analyzer unit failed");
            UnitOutcome::Failure(UnitFailure {
                unit: unit.name().to_string(),
                category,
                source,
                kind,
                message,
                duration_ms,
            })
        };

        let outcome = match result {
            Ok(Ok(Ok(findings))) => {
                debug!(
                    unit = unit.name(),
                    findings = findings.len(),
                    duration_ms,
                    "Analyzer unit finished"
                );
                UnitOutcome::Success(FindingSet {
                    unit: unit.name().to_string(),
                    category,
                    source,
                    duration_ms,
                    findings,
                })
            }
            Ok(Ok(Err(e))) => failure(e.kind(), e.detail().to_string()),
            Ok(Err(panic)) => failure(FailureKind::Internal, panic_message(&*panic)),
            Err(_) => failure(
                FailureKind::Timeout,
                format!("no result within {} ms", limit.as_millis()),
            ),
        };

        (category, source, outcome)
    });
}

fn lost_task(unit: String, category: Category, source: Source) -> UnitOutcome {
    UnitOutcome::Failure(UnitFailure {
        unit,
        category,
        source,
        kind: FailureKind::Internal,
        message: "task ended without a result".to_string(),
        duration_ms: 0,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("unit panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("unit panicked: {s}")
    } else {
        "unit panicked".to_string()
    }
}
