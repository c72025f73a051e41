//! Data models for the report engine.
//!
//! This module contains the canonical report structure produced by the
//! normalizer. Everything downstream (aggregation, decision, rendering,
//! export) reads these types and never the raw extraction payload.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a compliance check, eligibility criterion or checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Requirement satisfied.
    Met,
    /// Requirement not satisfied.
    NotMet,
    /// Deliverable finished.
    Complete,
    /// Work underway but not finished.
    InProgress,
    /// Nothing known yet. Also the fallback for malformed values.
    Pending,
}

impl Status {
    /// All declared statuses, in display order.
    pub const ALL: [Status; 5] = [
        Status::Met,
        Status::NotMet,
        Status::Complete,
        Status::InProgress,
        Status::Pending,
    ];

    /// Parse a canonical wire value (`met`, `not-met`, ...).
    ///
    /// Only exact canonical spellings are accepted here; aliases and legacy
    /// markers are the normalizer's business.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "met" => Some(Status::Met),
            "not-met" => Some(Status::NotMet),
            "complete" => Some(Status::Complete),
            "in-progress" => Some(Status::InProgress),
            "pending" => Some(Status::Pending),
            _ => None,
        }
    }

    /// Wire value of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Met => "met",
            Status::NotMet => "not-met",
            Status::Complete => "complete",
            Status::InProgress => "in-progress",
            Status::Pending => "pending",
        }
    }

    /// Whether the status counts as passing (`met` or `complete`).
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Status::Met | Status::Complete)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Met => write!(f, "Met"),
            Status::NotMet => write!(f, "Not Met"),
            Status::Complete => write!(f, "Complete"),
            Status::InProgress => write!(f, "In Progress"),
            Status::Pending => write!(f, "Pending"),
        }
    }
}

/// Risk level of a contract clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(RiskLevel::High),
            "medium" => Some(RiskLevel::Medium),
            "low" => Some(RiskLevel::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Category of a contract risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskCategory {
    Contractual,
    Financial,
    Technical,
    Operational,
    Other(String),
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskCategory::Contractual => write!(f, "Contractual"),
            RiskCategory::Financial => write!(f, "Financial"),
            RiskCategory::Technical => write!(f, "Technical"),
            RiskCategory::Operational => write!(f, "Operational"),
            RiskCategory::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for RiskCategory {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "contractual" | "contract" | "legal" => RiskCategory::Contractual,
            "financial" | "finance" => RiskCategory::Financial,
            "technical" => RiskCategory::Technical,
            "operational" | "operations" => RiskCategory::Operational,
            _ => RiskCategory::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for RiskCategory {
    fn from(s: String) -> Self {
        RiskCategory::from(s.as_str())
    }
}

impl From<RiskCategory> for String {
    fn from(category: RiskCategory) -> Self {
        match category {
            RiskCategory::Other(s) => s,
            known => known.to_string().to_lowercase(),
        }
    }
}

/// What kind of deliverable a checklist item asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    Format,
    Content,
    Attachment,
}

impl RequirementType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "format" => Some(RequirementType::Format),
            "content" => Some(RequirementType::Content),
            "attachment" => Some(RequirementType::Attachment),
            _ => None,
        }
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementType::Format => write!(f, "format"),
            RequirementType::Content => write!(f, "content"),
            RequirementType::Attachment => write!(f, "attachment"),
        }
    }
}

/// A single compliance requirement and how the company stands against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheck {
    pub id: String,
    /// Category such as "Legal" or "Financial".
    pub category: String,
    pub requirement: String,
    pub status: Status,
    pub evidence: String,
    /// A failing critical check alone blocks proceeding.
    pub critical: bool,
}

/// A single eligibility criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCriterion {
    pub id: String,
    pub requirement: String,
    pub status: Status,
    pub evidence: String,
    pub critical: bool,
}

/// A deliverable in the submission checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    /// Identifier such as `CL-1`.
    pub id: String,
    pub title: String,
    pub status: Status,
    /// Due date; `None` when the extraction gave none or it did not parse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    /// Department or person responsible.
    #[serde(rename = "assigned")]
    pub assignee: String,
    pub requirement_type: RequirementType,
    pub details: String,
}

/// A risky contract clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskItem {
    pub id: String,
    pub category: RiskCategory,
    pub title: String,
    pub risk_level: RiskLevel,
    pub description: String,
    pub mitigation: String,
    pub clause_reference: String,
}

/// Compliance block of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceBlock {
    /// Overall status as reported by the extraction. Kept for audit only;
    /// the aggregator recomputes it from the checks.
    pub overall_status: bool,
    pub checks: Vec<ComplianceCheck>,
}

/// Eligibility block of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityBlock {
    /// Proceed flag as reported by the extraction. Kept for audit only.
    pub proceed: bool,
    pub criteria: Vec<EligibilityCriterion>,
}

/// Submission checklist block of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecklistBlock {
    pub items: Vec<ChecklistItem>,
}

/// Automated check summary produced by the extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedChecks {
    pub legal_eligibility: bool,
    pub certifications: Vec<String>,
    pub missing_requirements: Vec<String>,
    /// Explicit disqualifying conditions, independent of critical flags.
    pub deal_breakers: Vec<String>,
}

/// The complete analysed RFP report.
///
/// Built once per analysis response by the normalizer and never mutated
/// afterwards; re-analysis produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// RFP identifier.
    pub id: String,
    pub title: String,
    /// Requesting agency.
    pub agency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_deadline: Option<NaiveDateTime>,
    pub compliance: ComplianceBlock,
    pub eligibility: EligibilityBlock,
    pub checklist: ChecklistBlock,
    pub risks: Vec<RiskItem>,
    pub recommendations: Vec<String>,
    pub automated_checks: AutomatedChecks,
}

impl Report {
    /// Human readable label for the report.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled RFP"
        } else {
            &self.title
        }
    }
}

/// Export file stem for a report identifier.
///
/// Characters that are unsafe in file names are replaced with `_`.
pub fn artifact_stem(id: &str) -> String {
    let id = id.trim();
    let base = if id.is_empty() { "report" } else { id };
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-report", safe)
}
