//! Performance: lab metrics when a provider is available, markup heuristics always.
//!
//! A missing or failing metrics provider degrades this unit to heuristics
//! and an informational finding; it never fails the unit.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::analyzer::{rule, AnalysisContext, AnalyzerUnit, Rubric, RubricEntry, UnitError};
use crate::page::PageModel;
use crate::providers::PerformanceMetrics;
use crate::types::{Category, Finding, Severity};

const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(20);

const HEAVY_PAGE_BYTES: usize = 500 * 1024;
const LARGE_PAGE_BYTES: usize = 100 * 1024;
const MAX_EXTERNAL_SCRIPTS: usize = 20;
const MAX_STYLESHEETS: usize = 10;
const SLOW_RESPONSE: Duration = Duration::from_secs(3);
const SLUGGISH_RESPONSE: Duration = Duration::from_secs(1);

pub const PERFORMANCE_RUBRIC: Rubric = Rubric::new(Category::Performance, PERFORMANCE_RULES);

const PERFORMANCE_RULES: &[RubricEntry] = &[
    rule("performance.metrics.unavailable", Severity::Info, 0.0),
    rule("performance.score.poor", Severity::Major, 25.0),
    rule("performance.score.needs_improvement", Severity::Minor, 10.0),
    rule("performance.lcp.poor", Severity::Major, 15.0),
    rule("performance.lcp.needs_improvement", Severity::Minor, 5.0),
    rule("performance.cls.poor", Severity::Major, 10.0),
    rule("performance.cls.needs_improvement", Severity::Minor, 5.0),
    rule("performance.tbt.poor", Severity::Major, 10.0),
    rule("performance.tbt.needs_improvement", Severity::Minor, 5.0),
    rule("performance.response.slow", Severity::Major, 15.0),
    rule("performance.response.sluggish", Severity::Minor, 5.0),
    rule("performance.page_weight.heavy", Severity::Major, 15.0),
    rule("performance.page_weight.large", Severity::Minor, 5.0),
    rule("performance.scripts.many", Severity::Minor, 10.0),
    rule("performance.scripts.render_blocking", Severity::Minor, 10.0),
    rule("performance.stylesheets.many", Severity::Minor, 5.0),
    rule("performance.images.unsized", Severity::Minor, 5.0),
    rule("performance.compression.missing", Severity::Minor, 5.0),
];

/// Loading-speed checks.
pub struct PerformanceAnalyzer;

#[async_trait]
impl AnalyzerUnit for PerformanceAnalyzer {
    fn name(&self) -> &str {
        "performance"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    async fn analyze(
        &self,
        page: &PageModel,
        ctx: &AnalysisContext,
    ) -> Result<Vec<Finding>, UnitError> {
        let r = &PERFORMANCE_RUBRIC;
        let mut out = Vec::new();

        match lab_metrics(page, ctx).await {
            Ok(metrics) => metric_findings(&metrics, &mut out)?,
            Err(reason) => {
                out.push(r.finding(
                    "performance.metrics.unavailable",
                    format!("Lab metrics unavailable ({reason}); using page heuristics."),
                )?);
                response_findings(page, &mut out)?;
            }
        }

        resource_findings(page, &mut out)?;
        Ok(out)
    }
}

/// Ask the provider for metrics within the unit's own budget.
async fn lab_metrics(page: &PageModel, ctx: &AnalysisContext) -> Result<PerformanceMetrics, String> {
    let provider = ctx
        .metrics
        .as_ref()
        .ok_or_else(|| "no metrics provider configured".to_string())?;
    let budget = ctx.metrics_timeout.unwrap_or(DEFAULT_METRICS_TIMEOUT);

    match tokio::time::timeout(budget, provider.fetch(&page.final_url)).await {
        Ok(Ok(metrics)) => Ok(metrics),
        Ok(Err(e)) => {
            warn!("metrics provider failed for {}: {e}", page.final_url);
            Err(e.to_string())
        }
        Err(_) => {
            warn!(
                "metrics provider timed out after {:.1}s for {}",
                budget.as_secs_f64(),
                page.final_url
            );
            Err(format!("timed out after {}s", budget.as_secs()))
        }
    }
}

fn metric_findings(m: &PerformanceMetrics, out: &mut Vec<Finding>) -> Result<(), UnitError> {
    let r = &PERFORMANCE_RUBRIC;

    if let Some(score) = m.performance_score {
        let pct = (score * 100.0).round();
        if score < 0.5 {
            out.push(
                r.finding("performance.score.poor", format!("Lighthouse performance score is {pct}."))?
                    .with_recommendation("Reduce main-thread work and defer non-critical resources."),
            );
        } else if score < 0.9 {
            out.push(
                r.finding(
                    "performance.score.needs_improvement",
                    format!("Lighthouse performance score is {pct}."),
                )?
                .with_recommendation("Address the slowest Lighthouse opportunities."),
            );
        }
    }

    if let Some(lcp) = m.largest_contentful_paint_ms {
        let secs = lcp / 1000.0;
        if lcp > 4000.0 {
            out.push(
                r.finding("performance.lcp.poor", format!("Largest Contentful Paint is {secs:.1}s."))?
                    .with_recommendation("Optimize the hero image and server response time."),
            );
        } else if lcp > 2500.0 {
            out.push(
                r.finding(
                    "performance.lcp.needs_improvement",
                    format!("Largest Contentful Paint is {secs:.1}s."),
                )?
                .with_recommendation("Preload the largest above-the-fold resource."),
            );
        }
    }

    if let Some(cls) = m.cumulative_layout_shift {
        if cls > 0.25 {
            out.push(
                r.finding("performance.cls.poor", format!("Cumulative Layout Shift is {cls:.2}."))?
                    .with_recommendation("Reserve space for images, ads, and embeds."),
            );
        } else if cls > 0.1 {
            out.push(
                r.finding(
                    "performance.cls.needs_improvement",
                    format!("Cumulative Layout Shift is {cls:.2}."),
                )?
                .with_recommendation("Set explicit dimensions on media elements."),
            );
        }
    }

    if let Some(tbt) = m.total_blocking_time_ms {
        if tbt > 600.0 {
            out.push(
                r.finding("performance.tbt.poor", format!("Total Blocking Time is {tbt:.0}ms."))?
                    .with_recommendation("Split long JavaScript tasks and remove unused code."),
            );
        } else if tbt > 200.0 {
            out.push(
                r.finding(
                    "performance.tbt.needs_improvement",
                    format!("Total Blocking Time is {tbt:.0}ms."),
                )?
                .with_recommendation("Defer third-party scripts."),
            );
        }
    }

    Ok(())
}

fn response_findings(page: &PageModel, out: &mut Vec<Finding>) -> Result<(), UnitError> {
    let r = &PERFORMANCE_RUBRIC;
    let secs = page.fetch_duration.as_secs_f64();

    if page.fetch_duration > SLOW_RESPONSE {
        out.push(
            r.finding("performance.response.slow", format!("The page took {secs:.1}s to load."))?
                .with_recommendation("Cache responses and reduce server processing time."),
        );
    } else if page.fetch_duration > SLUGGISH_RESPONSE {
        out.push(
            r.finding(
                "performance.response.sluggish",
                format!("The page took {secs:.1}s to load."),
            )?
            .with_recommendation("Aim for a server response under one second."),
        );
    }

    Ok(())
}

fn resource_findings(page: &PageModel, out: &mut Vec<Finding>) -> Result<(), UnitError> {
    let r = &PERFORMANCE_RUBRIC;
    let tree = &page.tree;

    let bytes = page.html_bytes();
    let kb = bytes / 1024;
    if bytes > HEAVY_PAGE_BYTES {
        out.push(
            r.finding("performance.page_weight.heavy", format!("The HTML document is {kb} KB."))?
                .with_recommendation("Move inline data and markup out of the initial document."),
        );
    } else if bytes > LARGE_PAGE_BYTES {
        out.push(
            r.finding("performance.page_weight.large", format!("The HTML document is {kb} KB."))?
                .with_recommendation("Trim inline scripts, styles, and unused markup."),
        );
    }

    let external_scripts = tree
        .elements("script")
        .filter(|(_, s)| s.non_empty_attr("src").is_some())
        .count();
    if external_scripts > MAX_EXTERNAL_SCRIPTS {
        out.push(
            r.finding(
                "performance.scripts.many",
                format!("The page loads {external_scripts} external scripts."),
            )?
            .with_recommendation("Bundle scripts and drop unused dependencies."),
        );
    }

    let blocking = tree
        .elements("script")
        .filter(|(idx, s)| {
            tree.has_ancestor(*idx, "head")
                && s.non_empty_attr("src").is_some()
                && !s.has_attr("async")
                && !s.has_attr("defer")
                && s.attr("type") != Some("module")
        })
        .count();
    if blocking > 0 {
        out.push(
            r.finding(
                "performance.scripts.render_blocking",
                format!("{blocking} script(s) in <head> block rendering."),
            )?
            .with_recommendation("Add async or defer to scripts in <head>."),
        );
    }

    let stylesheets = tree.links_with_rel("stylesheet").count();
    if stylesheets > MAX_STYLESHEETS {
        out.push(
            r.finding(
                "performance.stylesheets.many",
                format!("The page loads {stylesheets} stylesheets."),
            )?
            .with_recommendation("Combine stylesheets and inline critical CSS."),
        );
    }

    let unsized_images = tree
        .elements("img")
        .filter(|(_, img)| !(img.has_attr("width") && img.has_attr("height")))
        .count();
    if unsized_images > 0 {
        out.push(
            r.finding(
                "performance.images.unsized",
                format!("{unsized_images} image(s) have no explicit width and height."),
            )?
            .with_recommendation("Set width and height on images to avoid layout shifts."),
        );
    }

    // Only meaningful when response headers were captured.
    if !page.headers.is_empty() && page.header("content-encoding").is_none() {
        out.push(
            r.finding(
                "performance.compression.missing",
                "The response was not compressed.",
            )?
            .with_recommendation("Enable gzip or brotli compression for HTML."),
        );
    }

    Ok(())
}
