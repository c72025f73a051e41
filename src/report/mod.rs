//! Report rendering.
//!
//! A [`ReportDocument`] bundles a normalized report with everything derived
//! from it; the generators turn it into Markdown, JSON or an HTML surface.

pub mod generator;
pub mod surface;

pub use generator::{generate_json_report, generate_markdown_report};
pub use surface::{render_surface, RenderedSurface};

use crate::analysis::{recommend, reported_flag_mismatches, Aggregates, Recommendation};
use crate::normalize::{Coercion, NormalizedReport};
use crate::models::Report;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// A report with its aggregates, recommendation and coercion log.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument<'a> {
    pub report: &'a Report,
    pub aggregates: Aggregates,
    pub recommendation: Recommendation<'a>,
    pub coercions: &'a [Coercion],
}

impl<'a> ReportDocument<'a> {
    /// Derive aggregates and the recommendation as of `now`.
    pub fn build(normalized: &'a NormalizedReport, now: DateTime<Utc>) -> Self {
        let report = &normalized.report;
        let aggregates = Aggregates::compute(report, now);

        for mismatch in reported_flag_mismatches(report, &aggregates) {
            warn!("{}", mismatch);
        }

        let recommendation = recommend(report, &aggregates);

        Self {
            report,
            aggregates,
            recommendation,
            coercions: &normalized.coercions,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::normalize::{normalize_text, NormalizedReport};
    use chrono::{DateTime, TimeZone, Utc};

    pub fn sample() -> NormalizedReport {
        normalize_text(include_str!("../../fixtures/extraction.json"))
            .expect("fixture normalizes")
    }

    pub fn legacy() -> NormalizedReport {
        normalize_text(include_str!("../../fixtures/legacy_extraction.json"))
            .expect("legacy fixture normalizes")
    }

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::analysis::Decision;

    #[test]
    fn test_build_sample_document() {
        let normalized = sample();
        let doc = ReportDocument::build(&normalized, now());

        assert_eq!(doc.report.id, "RFP-2024-017");
        assert!(!doc.aggregates.overall_compliance);
        assert_eq!(doc.recommendation.decision, Decision::DoNotProceed);
        assert_eq!(doc.aggregates.checklist_progress.completed, 2);
        assert_eq!(doc.aggregates.checklist_progress.total, 4);
        let upcoming: Vec<_> = doc
            .aggregates
            .upcoming_deadlines
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(upcoming, vec!["CL-2", "CL-3"]);
    }
}
