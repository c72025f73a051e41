//! Aggregate judgments over a report.
//!
//! This module provides the pure functions that turn the per-item
//! extraction into the report-level flags and counts every view shows.

use crate::models::{ChecklistItem, ComplianceCheck, Report, RiskItem, RiskLevel, Status};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// True when every critical compliance check is met or complete.
///
/// Non-critical failures never flip this flag.
pub fn overall_compliance(report: &Report) -> bool {
    report
        .compliance
        .checks
        .iter()
        .filter(|c| c.critical)
        .all(|c| c.status.is_satisfied())
}

/// True when every critical eligibility criterion is met or complete.
pub fn eligibility_proceed(report: &Report) -> bool {
    report
        .eligibility
        .criteria
        .iter()
        .filter(|c| c.critical)
        .all(|c| c.status.is_satisfied())
}

/// Explicit deal-breakers, passed through unchanged.
pub fn deal_breakers(report: &Report) -> &[String] {
    &report.automated_checks.deal_breakers
}

/// Critical compliance checks that are explicitly not met.
pub fn critical_failures(report: &Report) -> Vec<&ComplianceCheck> {
    report
        .compliance
        .checks
        .iter()
        .filter(|c| c.critical && c.status == Status::NotMet)
        .collect()
}

/// Non-critical compliance checks that are not met. Shown, never blocking.
pub fn non_critical_failures(report: &Report) -> Vec<&ComplianceCheck> {
    report
        .compliance
        .checks
        .iter()
        .filter(|c| !c.critical && c.status == Status::NotMet)
        .collect()
}

/// Number of risks at each level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl RiskDistribution {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }
}

/// Count risks by level. The counts always sum to `report.risks.len()`.
pub fn risk_distribution(report: &Report) -> RiskDistribution {
    let mut dist = RiskDistribution::default();
    for risk in &report.risks {
        match risk.risk_level {
            RiskLevel::High => dist.high += 1,
            RiskLevel::Medium => dist.medium += 1,
            RiskLevel::Low => dist.low += 1,
        }
    }
    dist
}

/// Risks at a given level, in report order.
pub fn risks_at(report: &Report, level: RiskLevel) -> Vec<&RiskItem> {
    report
        .risks
        .iter()
        .filter(|r| r.risk_level == level)
        .collect()
}

/// Count risks by category label.
pub fn risks_by_category(report: &Report) -> BTreeMap<String, usize> {
    let mut grouped = BTreeMap::new();
    for risk in &report.risks {
        *grouped.entry(risk.category.to_string()).or_insert(0) += 1;
    }
    grouped
}

/// Completed versus total checklist items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChecklistProgress {
    pub completed: usize,
    pub total: usize,
}

impl ChecklistProgress {
    /// Completion ratio in `[0, 1]`; `0` for an empty checklist.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }

    pub fn remaining(&self) -> usize {
        self.total - self.completed
    }
}

pub fn checklist_progress(report: &Report) -> ChecklistProgress {
    let items = &report.checklist.items;
    ChecklistProgress {
        completed: items.iter().filter(|i| i.status.is_satisfied()).count(),
        total: items.len(),
    }
}

/// Unfinished checklist items due after `now`, soonest first.
///
/// Ties on the deadline are ordered by identifier. Items without a
/// deadline are never upcoming.
pub fn upcoming_deadlines(report: &Report, now: DateTime<Utc>) -> Vec<&ChecklistItem> {
    let today = now.date_naive();
    let mut upcoming: Vec<&ChecklistItem> = report
        .checklist
        .items
        .iter()
        .filter(|i| !i.status.is_satisfied())
        .filter(|i| i.deadline.map_or(false, |d| d > today))
        .collect();

    upcoming.sort_by(|a, b| a.deadline.cmp(&b.deadline).then_with(|| a.id.cmp(&b.id)));
    upcoming
}

/// A checklist item due soon, as carried in [`Aggregates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingDeadline {
    pub id: String,
    pub title: String,
    pub deadline: NaiveDate,
    pub status: Status,
    pub assignee: String,
}

/// All report-level aggregates, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub overall_compliance: bool,
    pub eligibility_proceed: bool,
    pub deal_breakers: Vec<String>,
    /// Ids of critical compliance checks that are not met.
    pub critical_failures: Vec<String>,
    /// Ids of non-critical compliance checks that are not met.
    pub non_critical_failures: Vec<String>,
    pub risk_distribution: RiskDistribution,
    pub checklist_progress: ChecklistProgress,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
    pub as_of: DateTime<Utc>,
}

impl Aggregates {
    pub fn compute(report: &Report, now: DateTime<Utc>) -> Self {
        Self {
            overall_compliance: overall_compliance(report),
            eligibility_proceed: eligibility_proceed(report),
            deal_breakers: deal_breakers(report).to_vec(),
            critical_failures: critical_failures(report)
                .into_iter()
                .map(|c| c.id.clone())
                .collect(),
            non_critical_failures: non_critical_failures(report)
                .into_iter()
                .map(|c| c.id.clone())
                .collect(),
            risk_distribution: risk_distribution(report),
            checklist_progress: checklist_progress(report),
            upcoming_deadlines: upcoming_deadlines(report, now)
                .into_iter()
                .filter_map(|i| {
                    Some(UpcomingDeadline {
                        id: i.id.clone(),
                        title: i.title.clone(),
                        deadline: i.deadline?,
                        status: i.status,
                        assignee: i.assignee.clone(),
                    })
                })
                .collect(),
            as_of: now,
        }
    }

    pub fn has_deal_breakers(&self) -> bool {
        !self.deal_breakers.is_empty()
    }

    pub fn has_critical_failures(&self) -> bool {
        !self.critical_failures.is_empty()
    }
}

/// Describe where the extraction's own flags disagree with the recomputed
/// aggregates.
pub fn reported_flag_mismatches(report: &Report, aggregates: &Aggregates) -> Vec<String> {
    let mut mismatches = Vec::new();
    if report.compliance.overall_status != aggregates.overall_compliance {
        mismatches.push(format!(
            "compliance.overallStatus reported {} but critical checks give {}",
            report.compliance.overall_status, aggregates.overall_compliance
        ));
    }
    if report.eligibility.proceed != aggregates.eligibility_proceed {
        mismatches.push(format!(
            "eligibility.proceed reported {} but critical criteria give {}",
            report.eligibility.proceed, aggregates.eligibility_proceed
        ));
    }
    mismatches
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_critical_not_met_fails_compliance() {
        let statuses = [
            Status::Met,
            Status::NotMet,
            Status::Complete,
            Status::InProgress,
            Status::Pending,
        ];
        for other in statuses {
            let report = report(
                vec![
                    check("1", Status::NotMet, true),
                    check("2", other, false),
                    check("3", Status::Met, true),
                ],
                vec![],
                &[],
            );
            assert!(!overall_compliance(&report), "non-critical {:?}", other);
        }
    }

    #[test]
    fn test_non_critical_failure_does_not_flip() {
        let report = report(
            vec![check("1", Status::Met, true), check("2", Status::NotMet, false)],
            vec![],
            &[],
        );
        assert!(overall_compliance(&report));
        assert_eq!(non_critical_failures(&report).len(), 1);
        assert!(critical_failures(&report).is_empty());
    }

    #[test]
    fn test_pending_critical_fails_compliance_without_failure() {
        let report = report(vec![check("1", Status::Pending, true)], vec![], &[]);
        assert!(!overall_compliance(&report));
        assert!(critical_failures(&report).is_empty());
    }

    #[test]
    fn test_eligibility_proceed() {
        let ok = report(
            vec![],
            vec![criterion("1", Status::Complete, true), criterion("2", Status::NotMet, false)],
            &[],
        );
        assert!(eligibility_proceed(&ok));

        let blocked = report(vec![], vec![criterion("1", Status::InProgress, true)], &[]);
        assert!(!eligibility_proceed(&blocked));
    }

    #[test]
    fn test_risk_distribution_sums() {
        let mut r = report(vec![], vec![], &[]);
        r.risks = vec![
            risk("1", RiskLevel::High),
            risk("2", RiskLevel::Low),
            risk("3", RiskLevel::High),
            risk("4", RiskLevel::Medium),
        ];
        let dist = risk_distribution(&r);
        assert_eq!(dist.high, 2);
        assert_eq!(dist.medium, 1);
        assert_eq!(dist.low, 1);
        assert_eq!(dist.total(), r.risks.len());
        assert_eq!(risks_at(&r, RiskLevel::High).len(), 2);

        let empty = report(vec![], vec![], &[]);
        assert_eq!(risk_distribution(&empty).total(), 0);
    }

    #[test]
    fn test_checklist_progress_bounds() {
        let mut r = report(vec![], vec![], &[]);
        assert_eq!(checklist_progress(&r).ratio(), 0.0);

        r.checklist.items = vec![
            item("CL-1", Status::Complete, None),
            item("CL-2", Status::Pending, None),
            item("CL-3", Status::InProgress, None),
            item("CL-4", Status::Complete, None),
        ];
        let progress = checklist_progress(&r);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.remaining(), 2);
        assert!((progress.ratio() - 0.5).abs() < f64::EPSILON);
        assert!((0.0..=1.0).contains(&progress.ratio()));
    }

    #[test]
    fn test_empty_checklist() {
        let r = report(vec![], vec![], &[]);
        assert_eq!(checklist_progress(&r).ratio(), 0.0);
        assert!(upcoming_deadlines(&r, now()).is_empty());
    }

    #[test]
    fn test_upcoming_deadlines_order() {
        let mut r = report(vec![], vec![], &[]);
        r.checklist.items = vec![
            item("CL-4", Status::Pending, Some((2024, 6, 20))),
            item("CL-2", Status::InProgress, Some((2024, 6, 15))),
            item("CL-1", Status::Complete, Some((2024, 6, 14))),
            item("CL-3", Status::Pending, Some((2024, 6, 15))),
            item("CL-5", Status::Pending, Some((2024, 6, 12))),
            item("CL-6", Status::Pending, Some((2024, 6, 1))),
            item("CL-7", Status::Pending, None),
        ];

        let ids: Vec<_> = upcoming_deadlines(&r, now())
            .into_iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["CL-2", "CL-3", "CL-4"]);
    }

    #[test]
    fn test_aggregates_compute() {
        let mut r = report(
            vec![check("1", Status::Met, true), check("2", Status::NotMet, true)],
            vec![criterion("1", Status::Met, true)],
            &["Missing HUB cert"],
        );
        r.risks = vec![risk("1", RiskLevel::High)];
        r.checklist.items = vec![item("CL-1", Status::Pending, Some((2024, 7, 1)))];

        let agg = Aggregates::compute(&r, now());
        assert!(!agg.overall_compliance);
        assert!(agg.eligibility_proceed);
        assert!(agg.has_deal_breakers());
        assert_eq!(agg.critical_failures, vec!["2".to_string()]);
        assert_eq!(agg.risk_distribution.high, 1);
        assert_eq!(agg.upcoming_deadlines.len(), 1);
        assert_eq!(agg.upcoming_deadlines[0].id, "CL-1");

        let mismatches = reported_flag_mismatches(&r, &agg);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("overallStatus"));
    }

    #[test]
    fn test_risks_by_category() {
        let mut r = report(vec![], vec![], &[]);
        r.risks = vec![risk("1", RiskLevel::High), risk("2", RiskLevel::Low)];
        let grouped = risks_by_category(&r);
        assert_eq!(grouped.get("Contractual"), Some(&2));
    }
}
