//! Final proceed decision.
//!
//! The decision is a pure function of the report's aggregates: there is no
//! stored state, so evaluating the same report twice always gives the same
//! answer, and evidence is re-derived from the report on every call.

use crate::analysis::aggregator::{risks_at, Aggregates};
use crate::classify::Presentation;
use crate::models::{ComplianceCheck, EligibilityCriterion, Report, RiskLevel, Status};
use serde::Serialize;
use std::fmt;

/// Tri-state recommendation on whether to submit a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    DoNotProceed,
    Conditional,
    Proceed,
}

impl Decision {
    pub fn headline(&self) -> &'static str {
        match self {
            Decision::Proceed => "RECOMMENDED: Proceed with Submission",
            Decision::Conditional => "CONDITIONAL: Proceed with Caution",
            Decision::DoNotProceed => "NOT RECOMMENDED: Do Not Proceed",
        }
    }

    pub fn presentation(&self) -> Presentation {
        match self {
            Decision::Proceed => Presentation::Positive,
            Decision::Conditional => Presentation::Caution,
            Decision::DoNotProceed => Presentation::Negative,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Proceed => write!(f, "PROCEED"),
            Decision::Conditional => write!(f, "CONDITIONAL"),
            Decision::DoNotProceed => write!(f, "DO_NOT_PROCEED"),
        }
    }
}

/// Combine aggregates into a decision.
fn decide(aggregates: &Aggregates) -> Decision {
    if !aggregates.overall_compliance {
        if aggregates.has_deal_breakers() || aggregates.has_critical_failures() {
            Decision::DoNotProceed
        } else {
            Decision::Conditional
        }
    } else if aggregates.eligibility_proceed {
        Decision::Proceed
    } else {
        Decision::Conditional
    }
}

/// Items supporting the decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence<'a> {
    /// Critical compliance checks that are met or complete.
    pub strengths: Vec<&'a ComplianceCheck>,
    /// Eligibility criteria that are not met.
    pub attention_areas: Vec<&'a EligibilityCriterion>,
}

fn evidence(report: &Report) -> Evidence<'_> {
    Evidence {
        strengths: report
            .compliance
            .checks
            .iter()
            .filter(|c| c.critical && c.status.is_satisfied())
            .collect(),
        attention_areas: report
            .eligibility
            .criteria
            .iter()
            .filter(|c| c.status == Status::NotMet)
            .collect(),
    }
}

/// Decision plus everything needed to present it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation<'a> {
    pub decision: Decision,
    pub headline: &'static str,
    pub rationale: String,
    #[serde(flatten)]
    pub evidence: Evidence<'a>,
    pub next_steps: Vec<String>,
}

/// Build the final recommendation for a report.
pub fn recommend<'a>(report: &'a Report, aggregates: &Aggregates) -> Recommendation<'a> {
    let decision = decide(aggregates);

    Recommendation {
        decision,
        headline: decision.headline(),
        rationale: rationale(decision, aggregates),
        evidence: evidence(report),
        next_steps: next_steps(report),
    }
}

fn rationale(decision: Decision, aggregates: &Aggregates) -> String {
    match decision {
        Decision::Proceed => {
            "All critical compliance checks and eligibility criteria are satisfied.".to_string()
        }
        Decision::Conditional if aggregates.overall_compliance => {
            "Compliance is satisfied, but critical eligibility criteria are not. Proceed only if they can be addressed.".to_string()
        }
        Decision::Conditional => {
            "Critical compliance checks are still open but none has failed outright. Resolve them before submitting.".to_string()
        }
        Decision::DoNotProceed => {
            let mut reasons = Vec::new();
            if aggregates.has_critical_failures() {
                reasons.push(format!(
                    "{} critical compliance check(s) not met",
                    aggregates.critical_failures.len()
                ));
            }
            if aggregates.has_deal_breakers() {
                reasons.push(format!("deal-breakers: {}", aggregates.deal_breakers.join("; ")));
            }
            format!("Critical compliance issues found ({}).", reasons.join(", "))
        }
    }
}

fn next_steps(report: &Report) -> Vec<String> {
    let mut steps: Vec<String> = report.recommendations.clone();

    for risk in risks_at(report, RiskLevel::High) {
        if !risk.mitigation.is_empty() {
            steps.push(format!("Mitigate \"{}\": {}", risk.title, risk.mitigation));
        }
    }

    match report.submission_deadline {
        Some(deadline) => steps.push(format!(
            "Submit complete proposal package by {}",
            deadline.format("%Y-%m-%d %H:%M")
        )),
        None => steps.push("Submit complete proposal package before the deadline".to_string()),
    }

    steps
}
