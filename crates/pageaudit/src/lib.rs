//! pageaudit: concurrent web page analysis and scoring engine.
//!
//! A fetched page is handed to one analyzer unit per category (SEO,
//! performance, content, accessibility, security, design), optionally paired
//! with AI recommendation units. The orchestrator runs them concurrently with
//! per-unit timeouts and the scorer folds their findings into a report.

pub mod ai;
pub mod analyzer;
pub mod dom;
pub mod fetch;
pub mod orchestrator;
pub mod page;
pub mod providers;
pub mod scorer;
pub mod types;
pub mod units;

pub use ai::{
    AiRecommendationUnit, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MAX_AI_FINDINGS, MAX_PROMPT_CHARS,
    PROMPT_VERSION,
};
pub use analyzer::{AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError, UnitRegistry};
pub use dom::{ElementNode, ElementTree};
pub use fetch::PageFetcher;
pub use orchestrator::{parse_categories, Orchestrator, RunOptions, RunOutcomes};
pub use page::PageModel;
pub use providers::{
    CompletionClient, CompletionRequest, LanguageModel, MetricsProvider, PageSpeedClient,
    PerformanceMetrics, ProviderError,
};
pub use scorer::{score, UNAVAILABLE_SCORE};
pub use types::*;
