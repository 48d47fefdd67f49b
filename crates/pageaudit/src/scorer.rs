//! Folds unit outcomes into category scores and the final report.
//!
//! Scoring is a pure function of its inputs; the timestamp is passed in so
//! identical outcomes always produce identical reports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::types::{
    Category, CategoryOutcome, CategoryScore, CategoryStatus, Finding, Recommendation, Report,
    SeverityCounts, SkippedSource, Source, UnitFailure, UnitOutcome,
};

/// Score reported for a category whose rule-based analysis did not complete.
pub const UNAVAILABLE_SCORE: u8 = 0;

/// Build the report for one run.
pub fn score(
    url: &str,
    outcomes: &BTreeMap<Category, CategoryOutcome>,
    generated_at: DateTime<Utc>,
) -> Report {
    let categories: Vec<CategoryScore> = outcomes
        .iter()
        .map(|(category, outcome)| score_category(*category, outcome))
        .collect();

    let skipped = outcomes
        .iter()
        .flat_map(|(category, o)| {
            [(Source::Rule, Some(&o.rule)), (Source::Ai, o.ai.as_ref())]
                .into_iter()
                .filter_map(move |(source, unit)| match unit {
                    Some(UnitOutcome::Skipped { reason }) => Some(SkippedSource {
                        category: *category,
                        source,
                        reason: reason.clone(),
                    }),
                    _ => None,
                })
        })
        .collect();

    Report {
        url: url.to_string(),
        overall_score: overall(&categories),
        categories,
        failures: collect_failures(outcomes),
        skipped,
        generated_at,
    }
}

/// Score one category from its rule and AI outcomes.
pub fn score_category(category: Category, outcome: &CategoryOutcome) -> CategoryScore {
    let rule_findings = outcome.rule.findings();
    let ai_findings = outcome.ai.as_ref().map(UnitOutcome::findings).unwrap_or(&[]);

    let findings: Vec<Finding> = rule_findings.iter().chain(ai_findings).cloned().collect();
    let mut counts = SeverityCounts::default();
    for f in &findings {
        counts.record(f.severity);
    }

    if let Some(reason) = outcome.rule.unavailable_reason() {
        return CategoryScore {
            category,
            score: UNAVAILABLE_SCORE,
            status: CategoryStatus::Unavailable,
            counts,
            findings,
            recommendations: vec![Recommendation::note(
                Source::Rule,
                format!("analysis unavailable: {reason}"),
            )],
        };
    }

    let deducted: f64 = rule_findings.iter().filter_map(|f| f.contribution).sum();
    let score = (100.0 - deducted).clamp(0.0, 100.0).round() as u8;

    let mut ranked: Vec<&Finding> = rule_findings
        .iter()
        .filter(|f| f.recommendation.is_some())
        .collect();
    // sort_by is stable; ties keep reporting order
    ranked.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut recommendations: Vec<Recommendation> = ranked
        .into_iter()
        .map(|f| Recommendation {
            source: Source::Rule,
            severity: Some(f.severity),
            check: Some(f.check.clone()),
            text: f.recommendation.clone().unwrap_or_default(),
        })
        .collect();

    recommendations.extend(ai_findings.iter().map(|f| Recommendation {
        source: Source::Ai,
        severity: Some(f.severity),
        check: Some(f.check.clone()),
        text: f.recommendation.clone().unwrap_or_else(|| f.message.clone()),
    }));

    let ai_reason = outcome.ai.as_ref().and_then(UnitOutcome::unavailable_reason);
    let status = if ai_reason.is_some() {
        CategoryStatus::Partial
    } else {
        CategoryStatus::Complete
    };
    if let Some(reason) = ai_reason {
        recommendations.push(Recommendation::note(
            Source::Ai,
            format!("AI suggestions unavailable: {reason}"),
        ));
    }

    CategoryScore {
        category,
        score,
        status,
        counts,
        findings,
        recommendations,
    }
}

/// Weighted mean of category scores, rounded to one decimal.
pub fn overall(categories: &[CategoryScore]) -> f64 {
    let total_weight: u64 = categories.iter().map(|c| c.category.weight_bps() as u64).sum();
    if total_weight == 0 {
        return 0.0;
    }
    let weighted: u64 = categories
        .iter()
        .map(|c| c.category.weight_bps() as u64 * c.score as u64)
        .sum();
    let mean = weighted as f64 / total_weight as f64;
    (mean * 10.0).round() / 10.0
}

/// Every failure record in the outcomes, rule before AI within a category.
pub fn collect_failures(outcomes: &BTreeMap<Category, CategoryOutcome>) -> Vec<UnitFailure> {
    outcomes
        .values()
        .flat_map(|o| [Some(&o.rule), o.ai.as_ref()])
        .filter_map(|o| match o {
            Some(UnitOutcome::Failure(f)) => Some(f.clone()),
            _ => None,
        })
        .collect()
}
