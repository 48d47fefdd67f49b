//! Report rendering for the terminal.

use std::fmt::Write;

use clap::ValueEnum;

use pageaudit::{CategoryStatus, Report};

use crate::error::CliResult;

/// Recommendations shown per category in the text summary.
const TOP_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub fn render(report: &Report, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::Text => Ok(render_text(report)),
    }
}

/// Human-readable summary: overall score, one block per category, failures.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Audit of {}", report.url);
    let _ = writeln!(out, "Overall score: {:.1}/100", report.overall_score);
    let _ = writeln!(out);

    for cat in &report.categories {
        let status = match cat.status {
            CategoryStatus::Complete => "",
            CategoryStatus::Partial => "  (partial)",
            CategoryStatus::Unavailable => "  (unavailable)",
        };
        let _ = writeln!(
            out,
            "{:<14} {:>3}{}  [{} critical, {} major, {} minor, {} info]",
            cat.category.label(),
            cat.score,
            status,
            cat.counts.critical,
            cat.counts.major,
            cat.counts.minor,
            cat.counts.info,
        );
        for rec in cat.recommendations.iter().take(TOP_RECOMMENDATIONS) {
            let tag = rec.severity.map(|s| s.as_str()).unwrap_or("note");
            let _ = writeln!(out, "    - [{tag}] {}", rec.text);
        }
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for f in &report.failures {
            let _ = writeln!(
                out,
                "    {} ({}/{}): {}: {}",
                f.unit, f.category, f.source, f.kind, f.message
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pageaudit::{
        Category, CategoryScore, FailureKind, Recommendation, Severity, SeverityCounts, Source,
        UnitFailure,
    };

    use super::*;

    fn report() -> Report {
        Report {
            url: "https://example.com".to_string(),
            overall_score: 44.4,
            categories: vec![
                CategoryScore {
                    category: Category::Seo,
                    score: 80,
                    status: CategoryStatus::Complete,
                    counts: SeverityCounts {
                        major: 1,
                        ..SeverityCounts::default()
                    },
                    findings: Vec::new(),
                    recommendations: vec![Recommendation {
                        source: Source::Rule,
                        severity: Some(Severity::Major),
                        check: Some("seo.meta_description.missing".to_string()),
                        text: "Add a meta description.".to_string(),
                    }],
                },
                CategoryScore {
                    category: Category::Performance,
                    score: 0,
                    status: CategoryStatus::Unavailable,
                    counts: SeverityCounts::default(),
                    findings: Vec::new(),
                    recommendations: Vec::new(),
                },
            ],
            failures: vec![UnitFailure {
                unit: "performance".to_string(),
                category: Category::Performance,
                source: Source::Rule,
                kind: FailureKind::Timeout,
                message: "no result within 30000 ms".to_string(),
                duration_ms: 30_000,
            }],
            skipped: Vec::new(),
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_text_summary() {
        let text = render_text(&report());
        assert!(text.contains("Overall score: 44.4/100"));
        assert!(text.contains("SEO"));
        assert!(text.contains("[major] Add a meta description."));
        assert!(text.contains("(unavailable)"));
        assert!(text.contains("performance (performance/rule): timeout"));
    }

    #[test]
    fn test_json_output_parses_back() {
        let json = render(&report(), OutputFormat::Json).unwrap();
        assert_eq!(Report::from_json(&json).unwrap(), report());
    }
}
