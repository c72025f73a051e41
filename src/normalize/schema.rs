//! Coercion of an extraction payload into the canonical [`Report`].
//!
//! The payload is untrusted: fields may be missing, mistyped, or use the
//! legacy marker encoding (`"✅ PASS"`). Everything recoverable is coerced
//! to a safe value and recorded; only a payload that is not an object, or
//! that has no compliance checks array, is rejected.

use crate::error::SchemaError;
use crate::models::{
    AutomatedChecks, ChecklistBlock, ChecklistItem, ComplianceBlock, ComplianceCheck,
    EligibilityBlock, EligibilityCriterion, Report, RequirementType, RiskCategory, RiskItem,
    RiskLevel, Status,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// One value the normalizer had to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coercion {
    /// JSON path of the field, e.g. `compliance.checks[2].status`.
    pub path: String,
    /// Original value as JSON text, or `<missing>`.
    pub original: String,
    /// Value that was used instead.
    pub applied: String,
}

/// A report together with the coercions applied while building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReport {
    pub report: Report,
    pub coercions: Vec<Coercion>,
}

const MISSING: &str = "<missing>";

/// Normalize an extraction payload into a report.
///
/// The input is only borrowed; coercions are returned, never written back.
pub fn normalize(payload: &Value) -> Result<NormalizedReport, SchemaError> {
    let root = payload.as_object().ok_or(SchemaError::NotAnObject)?;

    let checks = root
        .get("compliance")
        .and_then(|c| c.get("checks"))
        .and_then(Value::as_array)
        .ok_or(SchemaError::MissingChecks)?;

    let mut n = Normalizer::default();
    let report = n.report(root, checks);

    info!(
        "Normalized report {} ({} checks, {} criteria, {} checklist items, {} risks, {} coercions)",
        if report.id.is_empty() { "<no id>" } else { &report.id },
        report.compliance.checks.len(),
        report.eligibility.criteria.len(),
        report.checklist.items.len(),
        report.risks.len(),
        n.coercions.len()
    );

    Ok(NormalizedReport {
        report,
        coercions: n.coercions,
    })
}

#[derive(Default)]
struct Normalizer {
    coercions: Vec<Coercion>,
}

impl Normalizer {
    fn record(&mut self, path: &str, original: Option<&Value>, applied: impl Into<String>) {
        let coercion = Coercion {
            path: path.to_string(),
            original: original
                .map(|v| v.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            applied: applied.into(),
        };
        debug!(
            "Coerced {}: {} -> {}",
            coercion.path, coercion.original, coercion.applied
        );
        self.coercions.push(coercion);
    }

    fn report(&mut self, root: &Map<String, Value>, checks: &[Value]) -> Report {
        let compliance = root.get("compliance");
        let eligibility = root.get("eligibility");
        let checklist = root.get("checklist");

        // Legacy payloads carry eligibility and checklist as bare arrays.
        let criteria_value = match eligibility {
            Some(Value::Array(_)) => eligibility,
            Some(e) => e.get("criteria"),
            None => None,
        };
        let items_value = match checklist {
            Some(Value::Array(_)) => checklist,
            Some(c) => c.get("items"),
            None => None,
        };
        let automated = root.get("automatedChecks");

        Report {
            id: self.string("id", root.get("id").or_else(|| root.get("rfp_number"))),
            title: self.string("title", root.get("title").or_else(|| root.get("rfp_title"))),
            agency: self.string("agency", root.get("agency").or_else(|| root.get("rfp_agency"))),
            date: self.date(
                "date",
                root.get("date").or_else(|| root.get("rfp_release_date")),
            ),
            submission_deadline: self.datetime("submissionDeadline", root.get("submissionDeadline")),
            compliance: ComplianceBlock {
                overall_status: self.boolean(
                    "compliance.overallStatus",
                    compliance.and_then(|c| c.get("overallStatus")),
                ),
                checks: self.objects("compliance.checks", checks, |n, path, idx, obj| {
                    n.compliance_check(path, idx, obj)
                }),
            },
            eligibility: EligibilityBlock {
                proceed: self.boolean(
                    "eligibility.proceed",
                    eligibility.and_then(|e| e.get("proceed")),
                ),
                criteria: self.array("eligibility.criteria", criteria_value, |n, path, idx, obj| {
                    n.criterion(path, idx, obj)
                }),
            },
            checklist: ChecklistBlock {
                items: self.array("checklist.items", items_value, |n, path, idx, obj| {
                    n.checklist_item(path, idx, obj)
                }),
            },
            risks: self.array("risks", root.get("risks"), |n, path, idx, obj| {
                n.risk(path, idx, obj)
            }),
            recommendations: self.strings("recommendations", root.get("recommendations")),
            automated_checks: AutomatedChecks {
                legal_eligibility: self.boolean(
                    "automatedChecks.legalEligibility",
                    automated.and_then(|a| a.get("legalEligibility")),
                ),
                certifications: self.strings(
                    "automatedChecks.certifications",
                    automated.and_then(|a| a.get("certifications")),
                ),
                missing_requirements: self.strings(
                    "automatedChecks.missingRequirements",
                    automated.and_then(|a| a.get("missingRequirements")),
                ),
                deal_breakers: self.strings(
                    "automatedChecks.dealBreakers",
                    automated.and_then(|a| a.get("dealBreakers")),
                ),
            },
        }
    }

    fn compliance_check(&mut self, path: &str, idx: usize, obj: &Map<String, Value>) -> ComplianceCheck {
        ComplianceCheck {
            id: self.id(path, obj, "CC", idx),
            category: self.string(&format!("{}.category", path), obj.get("category")),
            requirement: self.string(&format!("{}.requirement", path), obj.get("requirement")),
            status: self.status(&format!("{}.status", path), obj.get("status")),
            evidence: self.string(
                &format!("{}.evidence", path),
                obj.get("evidence").or_else(|| obj.get("detail")),
            ),
            critical: self.boolean(&format!("{}.critical", path), obj.get("critical")),
        }
    }

    fn criterion(&mut self, path: &str, idx: usize, obj: &Map<String, Value>) -> EligibilityCriterion {
        EligibilityCriterion {
            id: self.id(path, obj, "EC", idx),
            requirement: self.string(&format!("{}.requirement", path), obj.get("requirement")),
            status: self.status(&format!("{}.status", path), obj.get("status")),
            evidence: self.string(
                &format!("{}.evidence", path),
                obj.get("evidence").or_else(|| obj.get("detail")),
            ),
            critical: self.boolean(&format!("{}.critical", path), obj.get("critical")),
        }
    }

    fn checklist_item(&mut self, path: &str, idx: usize, obj: &Map<String, Value>) -> ChecklistItem {
        ChecklistItem {
            id: self.id(path, obj, "CL", idx),
            title: self.string(
                &format!("{}.title", path),
                obj.get("title").or_else(|| obj.get("item")),
            ),
            status: self.status(&format!("{}.status", path), obj.get("status")),
            deadline: self.date(
                &format!("{}.deadline", path),
                obj.get("deadline").or_else(|| obj.get("due_date")),
            ),
            assignee: self.string(
                &format!("{}.assigned", path),
                obj.get("assigned").or_else(|| obj.get("assigned_to")),
            ),
            requirement_type: self.requirement_type(
                &format!("{}.requirementType", path),
                obj.get("requirementType"),
            ),
            details: self.string(
                &format!("{}.details", path),
                obj.get("details").or_else(|| obj.get("detail")),
            ),
        }
    }

    fn risk(&mut self, path: &str, idx: usize, obj: &Map<String, Value>) -> RiskItem {
        let category_path = format!("{}.category", path);
        let category = match obj.get("category") {
            Some(Value::String(s)) if !s.trim().is_empty() => RiskCategory::from(s.as_str()),
            other => {
                self.record(&category_path, other, "operational");
                RiskCategory::Operational
            }
        };

        RiskItem {
            id: self.id(path, obj, "R", idx),
            category,
            title: self.string(
                &format!("{}.title", path),
                obj.get("title").or_else(|| obj.get("clause")),
            ),
            risk_level: self.risk_level(
                &format!("{}.riskLevel", path),
                obj.get("riskLevel").or_else(|| obj.get("risk")),
            ),
            description: self.string(
                &format!("{}.description", path),
                obj.get("description").or_else(|| obj.get("impact")),
            ),
            mitigation: self.string(
                &format!("{}.mitigation", path),
                obj.get("mitigation").or_else(|| obj.get("suggestion")),
            ),
            clause_reference: self.string(
                &format!("{}.clauseReference", path),
                obj.get("clauseReference"),
            ),
        }
    }

    /// Map an optional array of objects; a missing array is empty.
    fn array<T>(
        &mut self,
        path: &str,
        value: Option<&Value>,
        build: impl FnMut(&mut Self, &str, usize, &Map<String, Value>) -> T,
    ) -> Vec<T> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => self.objects(path, items, build),
            Some(other) => {
                self.record(path, Some(other), "[]");
                Vec::new()
            }
        }
    }

    /// Map every object element; non-object elements are dropped.
    fn objects<T>(
        &mut self,
        path: &str,
        items: &[Value],
        mut build: impl FnMut(&mut Self, &str, usize, &Map<String, Value>) -> T,
    ) -> Vec<T> {
        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, idx);
            match item.as_object() {
                Some(obj) => out.push(build(self, &item_path, idx, obj)),
                None => self.record(&item_path, Some(item), "<dropped>"),
            }
        }
        out
    }

    fn id(&mut self, path: &str, obj: &Map<String, Value>, prefix: &str, idx: usize) -> String {
        match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            other => {
                let generated = format!("{}-{}", prefix, idx + 1);
                self.record(&format!("{}.id", path), other, generated.clone());
                generated
            }
        }
    }

    fn string(&mut self, path: &str, value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => {
                let text = other.to_string();
                self.record(path, Some(other), text.clone());
                text
            }
        }
    }

    fn strings(&mut self, path: &str, value: Option<&Value>) -> Vec<String> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| {
                    let s = self.string(&format!("{}[{}]", path, idx), Some(item));
                    (!s.is_empty()).then_some(s)
                })
                .collect(),
            Some(Value::String(s)) => {
                self.record(path, value, "[string]");
                if s.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![s.trim().to_string()]
                }
            }
            Some(other) => {
                self.record(path, Some(other), "[]");
                Vec::new()
            }
        }
    }

    fn boolean(&mut self, path: &str, value: Option<&Value>) -> bool {
        match value {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                let parsed = matches!(
                    s.trim().to_ascii_lowercase().as_str(),
                    "true" | "yes" | "y" | "1"
                );
                self.record(path, value, parsed.to_string());
                parsed
            }
            Some(Value::Number(n)) => {
                let parsed = n.as_f64().map(|f| f != 0.0).unwrap_or(false);
                self.record(path, value, parsed.to_string());
                parsed
            }
            other => {
                self.record(path, other, "false");
                false
            }
        }
    }

    fn status(&mut self, path: &str, value: Option<&Value>) -> Status {
        if let Some(Value::String(s)) = value {
            if let Some(status) = Status::parse(s) {
                return status;
            }
            let applied = legacy_status(s).unwrap_or(Status::Pending);
            self.record(path, value, applied.as_str());
            return applied;
        }
        self.record(path, value, Status::Pending.as_str());
        Status::Pending
    }

    fn risk_level(&mut self, path: &str, value: Option<&Value>) -> RiskLevel {
        if let Some(level) = value.and_then(Value::as_str).and_then(RiskLevel::parse) {
            return level;
        }
        self.record(path, value, RiskLevel::Medium.as_str());
        RiskLevel::Medium
    }

    fn requirement_type(&mut self, path: &str, value: Option<&Value>) -> RequirementType {
        if let Some(kind) = value.and_then(Value::as_str).and_then(RequirementType::parse) {
            return kind;
        }
        self.record(path, value, "content");
        RequirementType::Content
    }

    fn date(&mut self, path: &str, value: Option<&Value>) -> Option<NaiveDate> {
        let raw = match value {
            None | Some(Value::Null) => return None,
            Some(Value::String(s)) if s.trim().is_empty() => return None,
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                self.record(path, Some(other), "null");
                return None;
            }
        };
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.record(path, value, "null");
        }
        parsed
    }

    fn datetime(&mut self, path: &str, value: Option<&Value>) -> Option<NaiveDateTime> {
        let raw = match value {
            None | Some(Value::Null) => return None,
            Some(Value::String(s)) if s.trim().is_empty() => return None,
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                self.record(path, Some(other), "null");
                return None;
            }
        };
        let parsed = parse_datetime(raw);
        if parsed.is_none() {
            self.record(path, value, "null");
        }
        parsed
    }
}

/// Map legacy markers and common spellings onto the canonical statuses.
fn legacy_status(raw: &str) -> Option<Status> {
    if raw.contains('✅') {
        let lower = raw.to_lowercase();
        return Some(if lower.contains("complete") {
            Status::Complete
        } else {
            Status::Met
        });
    }
    if raw.contains('❌') {
        return Some(Status::NotMet);
    }
    if raw.contains('🔄') {
        return Some(Status::InProgress);
    }

    let key: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect();

    match key.as_str() {
        "completed" | "done" | "finished" => Some(Status::Complete),
        "pass" | "passed" | "satisfied" | "yes" => Some(Status::Met),
        "not-met" | "notmet" | "fail" | "failed" | "missing" | "no" => Some(Status::NotMet),
        "in-progress" | "inprogress" | "partial" | "started" => Some(Status::InProgress),
        "not-started" | "todo" | "insufficient-data" => Some(Status::Pending),
        _ => None,
    }
}

/// Parse a date in `YYYY-MM-DD` form, also accepting a full timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(raw).map(|dt| dt.date()))
}

/// Parse an ISO timestamp; a bare date is taken as midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}
