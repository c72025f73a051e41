//! Markdown and JSON report generation.
//!
//! This module generates the compliance/risk report from a
//! [`ReportDocument`]. Status and risk badges always come from the shared
//! classifier.

use crate::analysis::{risks_at, risks_by_category, Aggregates, Recommendation};
use crate::classify::CLASSIFIER;
use crate::models::{Report, RiskLevel};
use crate::normalize::Coercion;
use crate::report::ReportDocument;
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(doc: &ReportDocument<'_>, show_coercions: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!("# RFP Analysis Report: {}\n\n", doc.report.display_title()));

    output.push_str(&generate_metadata_section(doc.report, &doc.aggregates));
    output.push_str(&generate_table_of_contents(doc, show_coercions));
    output.push_str(&generate_compliance_section(doc.report, &doc.aggregates));
    output.push_str(&generate_eligibility_section(doc.report, &doc.aggregates));
    output.push_str(&generate_submission_section(doc.report, &doc.aggregates));
    output.push_str(&generate_risk_section(doc.report, &doc.aggregates));
    output.push_str(&generate_recommendation_section(&doc.recommendation));

    if show_coercions {
        output.push_str(&generate_coercion_section(doc.coercions));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &Report, aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if !report.id.is_empty() {
        section.push_str(&format!("- **RFP ID:** {}\n", report.id));
    }
    if !report.agency.is_empty() {
        section.push_str(&format!("- **Agency:** {}\n", report.agency));
    }
    if let Some(date) = report.date {
        section.push_str(&format!("- **Issued:** {}\n", date.format("%Y-%m-%d")));
    }
    match report.submission_deadline {
        Some(deadline) => section.push_str(&format!(
            "- **Submission Deadline:** {}\n",
            deadline.format("%Y-%m-%d %H:%M")
        )),
        None => section.push_str("- **Submission Deadline:** not stated\n"),
    }
    section.push_str(&format!(
        "- **Evaluated:** {}\n",
        aggregates.as_of.format("%Y-%m-%d %H:%M UTC")
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(doc: &ReportDocument<'_>, show_coercions: bool) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Compliance](#compliance)\n");
    toc.push_str("- [Eligibility](#eligibility)\n");
    toc.push_str("- [Submission Checklist](#submission-checklist)\n");
    toc.push_str("- [Risk Assessment](#risk-assessment)\n");
    toc.push_str("- [Recommendation](#recommendation)\n");
    if show_coercions && !doc.coercions.is_empty() {
        toc.push_str("- [Normalization Notes](#normalization-notes)\n");
    }
    toc.push('\n');

    toc
}

/// Generate the compliance section.
fn generate_compliance_section(report: &Report, aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Compliance\n\n");

    let verdict = CLASSIFIER.verdict(aggregates.overall_compliance);
    section.push_str(&format!(
        "**Overall:** {} {}\n\n",
        verdict.marker(),
        if aggregates.overall_compliance {
            "Compliant"
        } else {
            "Not Compliant"
        }
    ));

    if report.compliance.checks.is_empty() {
        section.push_str("No compliance checks were extracted.\n\n");
        return section;
    }

    section.push_str("| Category | Requirement | Status | Evidence | Critical |\n");
    section.push_str("|:---|:---|:---:|:---|:---:|\n");
    for check in &report.compliance.checks {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cell(&check.category),
            cell(&check.requirement),
            CLASSIFIER.status_badge(check.status).text(),
            cell(&check.evidence),
            if check.critical { "Yes" } else { "No" }
        ));
    }
    section.push('\n');

    if !aggregates.deal_breakers.is_empty() {
        section.push_str("### Deal-breakers\n\n");
        for deal_breaker in &aggregates.deal_breakers {
            section.push_str(&format!("- ❌ {}\n", deal_breaker));
        }
        section.push('\n');
    }

    if !report.automated_checks.missing_requirements.is_empty() {
        section.push_str("### Missing Requirements\n\n");
        for missing in &report.automated_checks.missing_requirements {
            section.push_str(&format!("- {}\n", missing));
        }
        section.push('\n');
    }

    section
}

/// Generate the eligibility section.
fn generate_eligibility_section(report: &Report, aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Eligibility\n\n");

    let verdict = CLASSIFIER.verdict(aggregates.eligibility_proceed);
    section.push_str(&format!(
        "**Proceed:** {} {}\n\n",
        verdict.marker(),
        if aggregates.eligibility_proceed { "Yes" } else { "No" }
    ));

    if !report.eligibility.criteria.is_empty() {
        section.push_str("| Requirement | Status | Evidence | Critical |\n");
        section.push_str("|:---|:---:|:---|:---:|\n");
        for criterion in &report.eligibility.criteria {
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&criterion.requirement),
                CLASSIFIER.status_badge(criterion.status).text(),
                cell(&criterion.evidence),
                if criterion.critical { "Yes" } else { "No" }
            ));
        }
        section.push('\n');
    }

    if !report.automated_checks.certifications.is_empty() {
        section.push_str(&format!(
            "**Certifications:** {}\n\n",
            report.automated_checks.certifications.join(", ")
        ));
    }

    section
}

/// Generate the submission checklist section.
fn generate_submission_section(report: &Report, aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Submission Checklist\n\n");

    let progress = aggregates.checklist_progress;
    section.push_str(&format!(
        "**Progress:** {}/{} complete ({:.0}%)\n\n",
        progress.completed,
        progress.total,
        progress.percent()
    ));

    if report.checklist.items.is_empty() {
        section.push_str("No checklist items were extracted.\n\n");
        return section;
    }

    section.push_str("| Item | Type | Status | Deadline | Assigned |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---|\n");
    for item in &report.checklist.items {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cell(&item.title),
            item.requirement_type,
            CLASSIFIER.status_badge(item.status).text(),
            item.deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
            cell(&item.assignee)
        ));
    }
    section.push('\n');

    if !aggregates.upcoming_deadlines.is_empty() {
        section.push_str("### Upcoming Deadlines\n\n");
        for upcoming in &aggregates.upcoming_deadlines {
            section.push_str(&format!(
                "- **{}**: {} ({})",
                upcoming.deadline.format("%Y-%m-%d"),
                upcoming.title,
                CLASSIFIER.status_badge(upcoming.status).text()
            ));
            if !upcoming.assignee.is_empty() {
                section.push_str(&format!(", {}", upcoming.assignee));
            }
            section.push('\n');
        }
        section.push('\n');
    }

    section
}

/// Generate the risk section.
fn generate_risk_section(report: &Report, aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Risk Assessment\n\n");

    let dist = aggregates.risk_distribution;
    section.push_str("### Risk Level Breakdown\n\n");
    section.push_str(&format!(
        "| {} High | {} Medium | {} Low | **Total** |\n",
        CLASSIFIER.risk(RiskLevel::High).marker(),
        CLASSIFIER.risk(RiskLevel::Medium).marker(),
        CLASSIFIER.risk(RiskLevel::Low).marker(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        dist.high,
        dist.medium,
        dist.low,
        dist.total()
    ));

    let by_category = risks_by_category(report);
    if !by_category.is_empty() {
        section.push_str("### Risks by Category\n\n");
        section.push_str("| Category | Count |\n");
        section.push_str("|:---|:---:|\n");

        let mut categories: Vec<_> = by_category.iter().collect();
        categories.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

        for (category, count) in categories {
            section.push_str(&format!("| {} | {} |\n", category, count));
        }
        section.push('\n');
    }

    for level in RiskLevel::ALL {
        for risk in risks_at(report, level) {
            let badge = CLASSIFIER.risk_badge(risk.risk_level);
            section.push_str(&format!(
                "#### {} **{}** {} - {}\n\n",
                badge.class.marker(),
                badge.label.to_uppercase(),
                risk.category,
                risk.title
            ));
            if !risk.clause_reference.is_empty() {
                section.push_str(&format!("**Clause:** {}\n\n", risk.clause_reference));
            }
            if !risk.description.is_empty() {
                section.push_str(&format!("**Description:** {}\n\n", risk.description));
            }
            if !risk.mitigation.is_empty() {
                section.push_str(&format!("> **Mitigation:** {}\n\n", risk.mitigation));
            }
            section.push_str("---\n\n");
        }
    }

    section
}

/// Generate the recommendation section.
fn generate_recommendation_section(recommendation: &Recommendation<'_>) -> String {
    let mut section = String::new();

    section.push_str("## Recommendation\n\n");
    section.push_str(&format!(
        "### {} {}\n\n",
        recommendation.decision.presentation().marker(),
        recommendation.headline
    ));
    section.push_str(&format!("{}\n\n", recommendation.rationale));

    if !recommendation.evidence.strengths.is_empty() {
        section.push_str("**Strengths:**\n\n");
        for check in &recommendation.evidence.strengths {
            section.push_str(&format!("- {}: {}\n", check.requirement, check.evidence));
        }
        section.push('\n');
    }

    if !recommendation.evidence.attention_areas.is_empty() {
        section.push_str("**Areas Requiring Attention:**\n\n");
        for criterion in &recommendation.evidence.attention_areas {
            section.push_str(&format!("- {}: {}\n", criterion.requirement, criterion.evidence));
        }
        section.push('\n');
    }

    section.push_str("**Next Steps:**\n\n");
    for (i, step) in recommendation.next_steps.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, step));
    }
    section.push('\n');

    section
}

/// Generate the normalization notes appendix.
fn generate_coercion_section(coercions: &[Coercion]) -> String {
    if coercions.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Normalization Notes\n\n");
    section.push_str("Values in the extraction that had to be coerced:\n\n");
    section.push_str("| Field | Original | Used |\n");
    section.push_str("|:---|:---|:---|\n");
    for coercion in coercions {
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            coercion.path,
            cell(&coercion.original),
            cell(&coercion.applied)
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by RfpAudit v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Keep free text from breaking a Markdown table row.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Generate a JSON report.
pub fn generate_json_report(doc: &ReportDocument<'_>) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::{legacy, now, sample};

    #[test]
    fn test_generate_markdown_report() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());
        let markdown = generate_markdown_report(&doc, false);

        assert!(markdown.contains("# RFP Analysis Report: Temporary Staffing Services"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Compliance"));
        assert!(markdown.contains("❌ Not Met"));
        assert!(markdown.contains("Missing HUB cert"));
        assert!(markdown.contains("**Progress:** 2/4 complete (50%)"));
        assert!(markdown.contains("NOT RECOMMENDED: Do Not Proceed"));
        assert!(markdown.contains("Section 12.3"));
        assert!(!markdown.contains("## Normalization Notes"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());
        let section = generate_metadata_section(doc.report, &doc.aggregates);

        assert!(section.contains("RFP-2024-017"));
        assert!(section.contains("Dallas County"));
        assert!(section.contains("2024-06-30 14:00"));
        assert!(section.contains("2024-06-12 09:00 UTC"));
    }

    #[test]
    fn test_upcoming_deadlines_listed_in_order() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());
        let section = generate_submission_section(doc.report, &doc.aggregates);

        let sf33 = section.find("2024-06-20**: SF-33 Form").unwrap();
        let tech = section.find("2024-06-22**: Technical Proposal").unwrap();
        assert!(sf33 < tech);
    }

    #[test]
    fn test_risk_section_orders_high_first() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());
        let section = generate_risk_section(doc.report, &doc.aggregates);

        assert!(section.contains("| 1 | 1 | 1 | **3** |"));
        let high = section.find("Unlimited indemnification").unwrap();
        let low = section.find("Background checks").unwrap();
        assert!(high < low);
    }

    #[test]
    fn test_coercion_appendix() {
        let normalized = legacy();
        let doc = ReportDocument::build(&normalized, now());
        let markdown = generate_markdown_report(&doc, true);

        assert!(markdown.contains("## Normalization Notes"));
        assert!(markdown.contains("`compliance.checks[0].status`"));
    }

    #[test]
    fn test_cell_escapes_pipes() {
        assert_eq!(cell("a | b\nc"), "a \\| b c");
    }

    #[test]
    fn test_generate_json_report() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());
        let json = generate_json_report(&doc).unwrap();

        assert!(json.contains("\"decision\": \"DO_NOT_PROCEED\""));
        assert!(json.contains("\"risk_distribution\""));
        assert!(json.contains("\"status\": \"not-met\""));
    }
}
