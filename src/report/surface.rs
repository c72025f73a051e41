//! HTML report surface.
//!
//! The surface is the rendered form of a report that print and archival
//! export work from. It is a flat list of blocks; each block knows whether
//! it belongs on paper and whether a page break follows it.

use crate::analysis::{risks_at, Aggregates, Recommendation};
use crate::classify::{Badge, CLASSIFIER};
use crate::models::{Report, RiskLevel};
use crate::normalize::Coercion;
use crate::report::ReportDocument;
use serde::Serialize;

/// Styles shared by the screen view and the print-ready document.
pub const BASE_CSS: &str = "\
body { font-family: Helvetica, Arial, sans-serif; color: #1f2937; margin: 0; }
h1 { font-size: 22px; margin: 0 0 4px 0; }
h2 { font-size: 17px; border-bottom: 1px solid #e5e7eb; padding-bottom: 4px; }
table { width: 100%; border-collapse: collapse; font-size: 12px; }
th, td { border: 1px solid #e5e7eb; padding: 4px 6px; text-align: left; vertical-align: top; }
.block { padding: 12px 16px; }
.meta { color: #6b7280; font-size: 12px; }
.badge { display: inline-block; padding: 1px 6px; border-radius: 8px; font-size: 11px; }
.badge-positive { background: #dcfce7; color: #166534; }
.badge-negative { background: #fee2e2; color: #991b1b; }
.badge-caution { background: #fef9c3; color: #854d0e; }
.badge-neutral { background: #f3f4f6; color: #374151; }
.badge-info { background: #dbeafe; color: #1e40af; }
.decision { font-size: 16px; font-weight: bold; padding: 8px; }
.progress { background: #e5e7eb; height: 8px; border-radius: 4px; }
.progress > div { background: #2563eb; height: 8px; border-radius: 4px; }
@media print { .no-print { display: none; } }
";

/// One block of the rendered surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceBlock {
    pub id: String,
    pub html: String,
    /// Interactive-only blocks (actions, notes) are dropped from print.
    pub printable: bool,
    pub page_break_after: bool,
}

impl SurfaceBlock {
    fn new(id: &str, html: String) -> Self {
        Self {
            id: id.to_string(),
            html,
            printable: true,
            page_break_after: false,
        }
    }

    fn break_after(mut self) -> Self {
        self.page_break_after = true;
        self
    }

    fn screen_only(mut self) -> Self {
        self.printable = false;
        self
    }
}

/// A report rendered into blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSurface {
    pub report_id: String,
    pub title: String,
    pub blocks: Vec<SurfaceBlock>,
}

impl RenderedSurface {
    /// File stem for exported artifacts.
    pub fn artifact_stem(&self) -> String {
        crate::models::artifact_stem(&self.report_id)
    }

    /// Full HTML document for on-screen viewing, all blocks included.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape(&self.title)));
        html.push_str("<style>\n");
        html.push_str(BASE_CSS);
        html.push_str("</style>\n</head>\n<body>\n");
        for block in &self.blocks {
            let class = if block.printable { "block" } else { "block no-print" };
            html.push_str(&format!(
                "<section id=\"{}\" class=\"{}\">\n{}</section>\n",
                block.id, class, block.html
            ));
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

/// Render a report document into a surface.
pub fn render_surface(doc: &ReportDocument<'_>) -> RenderedSurface {
    let mut blocks = vec![
        SurfaceBlock::new("header", header_block(doc.report, &doc.aggregates)),
        SurfaceBlock::new("summary", summary_block(&doc.aggregates, &doc.recommendation)),
        SurfaceBlock::new("compliance", compliance_block(doc.report, &doc.aggregates)).break_after(),
        SurfaceBlock::new("eligibility", eligibility_block(doc.report)),
        SurfaceBlock::new("checklist", checklist_block(doc.report, &doc.aggregates)).break_after(),
        SurfaceBlock::new("risks", risk_block(doc.report, &doc.aggregates)),
        SurfaceBlock::new("recommendation", recommendation_block(&doc.recommendation)),
    ];

    if !doc.coercions.is_empty() {
        blocks.push(SurfaceBlock::new("normalization", coercion_block(doc.coercions)).screen_only());
    }
    blocks.push(SurfaceBlock::new("actions", actions_block()).screen_only());

    RenderedSurface {
        report_id: doc.report.id.clone(),
        title: doc.report.display_title().to_string(),
        blocks,
    }
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn badge(badge: &Badge) -> String {
    format!(
        "<span class=\"badge {}\">{}</span>",
        badge.class.css_class(),
        escape(&badge.label)
    )
}

fn header_block(report: &Report, aggregates: &Aggregates) -> String {
    let mut html = format!("<h1>{}</h1>\n", escape(report.display_title()));
    let mut meta = Vec::new();
    if !report.id.is_empty() {
        meta.push(format!("RFP {}", escape(&report.id)));
    }
    if !report.agency.is_empty() {
        meta.push(escape(&report.agency));
    }
    if let Some(deadline) = report.submission_deadline {
        meta.push(format!("Due {}", deadline.format("%Y-%m-%d %H:%M")));
    }
    meta.push(format!("Evaluated {}", aggregates.as_of.format("%Y-%m-%d")));
    html.push_str(&format!("<p class=\"meta\">{}</p>\n", meta.join(" &middot; ")));
    html
}

fn summary_block(aggregates: &Aggregates, recommendation: &Recommendation<'_>) -> String {
    let decision = recommendation.decision.presentation();
    let compliance = CLASSIFIER.verdict(aggregates.overall_compliance);
    let eligibility = CLASSIFIER.verdict(aggregates.eligibility_proceed);
    let progress = aggregates.checklist_progress;
    let dist = aggregates.risk_distribution;

    let mut html = format!(
        "<div class=\"decision {}\">{}</div>\n",
        decision.css_class(),
        escape(recommendation.headline)
    );
    html.push_str("<table>\n<tr><th>Compliance</th><th>Eligibility</th><th>Checklist</th><th>Risks</th></tr>\n");
    html.push_str(&format!(
        "<tr><td><span class=\"badge {}\">{}</span></td><td><span class=\"badge {}\">{}</span></td><td>{}/{} ({:.0}%)</td><td>{} high, {} medium, {} low</td></tr>\n",
        compliance.css_class(),
        if aggregates.overall_compliance { "Compliant" } else { "Not Compliant" },
        eligibility.css_class(),
        if aggregates.eligibility_proceed { "Eligible" } else { "Not Eligible" },
        progress.completed,
        progress.total,
        progress.percent(),
        dist.high,
        dist.medium,
        dist.low
    ));
    html.push_str("</table>\n");
    html
}

fn compliance_block(report: &Report, aggregates: &Aggregates) -> String {
    let mut html = String::from("<h2>Compliance</h2>\n");

    if report.compliance.checks.is_empty() {
        html.push_str("<p>No compliance checks were extracted.</p>\n");
    } else {
        html.push_str("<table>\n<tr><th>Category</th><th>Requirement</th><th>Status</th><th>Evidence</th><th>Critical</th></tr>\n");
        for check in &report.compliance.checks {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&check.category),
                escape(&check.requirement),
                badge(&CLASSIFIER.status_badge(check.status)),
                escape(&check.evidence),
                if check.critical { "Yes" } else { "No" }
            ));
        }
        html.push_str("</table>\n");
    }

    if !aggregates.deal_breakers.is_empty() {
        html.push_str("<h3>Deal-breakers</h3>\n<ul>\n");
        for deal_breaker in &aggregates.deal_breakers {
            html.push_str(&format!("<li>{}</li>\n", escape(deal_breaker)));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn eligibility_block(report: &Report) -> String {
    let mut html = String::from("<h2>Eligibility</h2>\n");
    if report.eligibility.criteria.is_empty() {
        html.push_str("<p>No eligibility criteria were extracted.</p>\n");
        return html;
    }

    html.push_str("<table>\n<tr><th>Requirement</th><th>Status</th><th>Evidence</th><th>Critical</th></tr>\n");
    for criterion in &report.eligibility.criteria {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&criterion.requirement),
            badge(&CLASSIFIER.status_badge(criterion.status)),
            escape(&criterion.evidence),
            if criterion.critical { "Yes" } else { "No" }
        ));
    }
    html.push_str("</table>\n");
    html
}

fn checklist_block(report: &Report, aggregates: &Aggregates) -> String {
    let progress = aggregates.checklist_progress;
    let mut html = String::from("<h2>Submission Checklist</h2>\n");
    html.push_str(&format!(
        "<div class=\"progress\"><div style=\"width: {:.0}%\"></div></div>\n<p class=\"meta\">{} of {} complete</p>\n",
        progress.percent(),
        progress.completed,
        progress.total
    ));

    if !report.checklist.items.is_empty() {
        html.push_str("<table>\n<tr><th>Item</th><th>Type</th><th>Status</th><th>Deadline</th><th>Assigned</th></tr>\n");
        for item in &report.checklist.items {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&item.title),
                item.requirement_type,
                badge(&CLASSIFIER.status_badge(item.status)),
                item.deadline
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "&ndash;".to_string()),
                escape(&item.assignee)
            ));
        }
        html.push_str("</table>\n");
    }

    if !aggregates.upcoming_deadlines.is_empty() {
        html.push_str("<h3>Upcoming Deadlines</h3>\n<ul>\n");
        for upcoming in &aggregates.upcoming_deadlines {
            html.push_str(&format!(
                "<li>{} {}</li>\n",
                upcoming.deadline.format("%Y-%m-%d"),
                escape(&upcoming.title)
            ));
        }
        html.push_str("</ul>\n");
    }
    html
}

fn risk_block(report: &Report, aggregates: &Aggregates) -> String {
    let dist = aggregates.risk_distribution;
    let mut html = String::from("<h2>Risk Assessment</h2>\n");
    html.push_str(&format!(
        "<p class=\"meta\">{} risks: {} high, {} medium, {} low</p>\n",
        dist.total(),
        dist.high,
        dist.medium,
        dist.low
    ));

    for level in RiskLevel::ALL {
        for risk in risks_at(report, level) {
            html.push_str(&format!(
                "<h3>{} {}</h3>\n<p class=\"meta\">{} &middot; {}</p>\n",
                badge(&CLASSIFIER.risk_badge(risk.risk_level)),
                escape(&risk.title),
                escape(&risk.category.to_string()),
                escape(&risk.clause_reference)
            ));
            if !risk.description.is_empty() {
                html.push_str(&format!("<p>{}</p>\n", escape(&risk.description)));
            }
            if !risk.mitigation.is_empty() {
                html.push_str(&format!(
                    "<p><strong>Mitigation:</strong> {}</p>\n",
                    escape(&risk.mitigation)
                ));
            }
        }
    }
    html
}

fn recommendation_block(recommendation: &Recommendation<'_>) -> String {
    let mut html = String::from("<h2>Recommendation</h2>\n");
    html.push_str(&format!(
        "<div class=\"decision {}\">{}</div>\n<p>{}</p>\n",
        recommendation.decision.presentation().css_class(),
        escape(recommendation.headline),
        escape(&recommendation.rationale)
    ));

    if !recommendation.evidence.strengths.is_empty() {
        html.push_str("<h3>Strengths</h3>\n<ul>\n");
        for check in &recommendation.evidence.strengths {
            html.push_str(&format!("<li>{}</li>\n", escape(&check.requirement)));
        }
        html.push_str("</ul>\n");
    }
    if !recommendation.evidence.attention_areas.is_empty() {
        html.push_str("<h3>Areas Requiring Attention</h3>\n<ul>\n");
        for criterion in &recommendation.evidence.attention_areas {
            html.push_str(&format!("<li>{}</li>\n", escape(&criterion.requirement)));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<h3>Next Steps</h3>\n<ol>\n");
    for step in &recommendation.next_steps {
        html.push_str(&format!("<li>{}</li>\n", escape(step)));
    }
    html.push_str("</ol>\n");
    html
}

fn coercion_block(coercions: &[Coercion]) -> String {
    let mut html = String::from("<h2>Normalization Notes</h2>\n<table>\n<tr><th>Field</th><th>Original</th><th>Used</th></tr>\n");
    for coercion in coercions {
        html.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{}</td><td>{}</td></tr>\n",
            escape(&coercion.path),
            escape(&coercion.original),
            escape(&coercion.applied)
        ));
    }
    html.push_str("</table>\n");
    html
}

fn actions_block() -> String {
    "<button onclick=\"window.print()\">Print</button>\n".to_string()
}
