//! Status and risk presentation classes.
//!
//! Every renderer asks [`CLASSIFIER`] how a status or risk level should look.
//! No other module maps statuses to colours, markers or labels.

use crate::models::{RiskLevel, Status};
use serde::Serialize;
use std::fmt;

/// Semantic presentation class of a status or risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Positive,
    Negative,
    Caution,
    Neutral,
    Informational,
}

impl Presentation {
    /// Marker shown next to the label in text output.
    pub fn marker(&self) -> &'static str {
        match self {
            Presentation::Positive => "✅",
            Presentation::Negative => "❌",
            Presentation::Caution => "⚠️",
            Presentation::Neutral => "⏳",
            Presentation::Informational => "ℹ️",
        }
    }

    /// CSS class used by the HTML surface.
    pub fn css_class(&self) -> &'static str {
        match self {
            Presentation::Positive => "badge-positive",
            Presentation::Negative => "badge-negative",
            Presentation::Caution => "badge-caution",
            Presentation::Neutral => "badge-neutral",
            Presentation::Informational => "badge-info",
        }
    }
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presentation::Positive => write!(f, "positive"),
            Presentation::Negative => write!(f, "negative"),
            Presentation::Caution => write!(f, "caution"),
            Presentation::Neutral => write!(f, "neutral"),
            Presentation::Informational => write!(f, "informational"),
        }
    }
}

/// A classified badge: class plus display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub class: Presentation,
    pub label: String,
}

impl Badge {
    /// `✅ Met` style text badge.
    pub fn text(&self) -> String {
        format!("{} {}", self.class.marker(), self.label)
    }
}

/// Maps statuses and risk levels to presentation classes.
#[derive(Debug)]
pub struct Classifier {
    _private: (),
}

/// The shared classifier instance.
pub static CLASSIFIER: Classifier = Classifier { _private: () };

impl Classifier {
    pub fn status(&self, status: Status) -> Presentation {
        match status {
            Status::Met | Status::Complete => Presentation::Positive,
            Status::NotMet => Presentation::Negative,
            Status::InProgress => Presentation::Caution,
            Status::Pending => Presentation::Neutral,
        }
    }

    pub fn risk(&self, level: RiskLevel) -> Presentation {
        match level {
            RiskLevel::High => Presentation::Negative,
            RiskLevel::Medium => Presentation::Caution,
            RiskLevel::Low => Presentation::Informational,
        }
    }

    /// Classify a raw wire value. Anything that is not a canonical status
    /// or risk level is neutral.
    pub fn raw(&self, value: &str) -> Presentation {
        if let Some(status) = Status::parse(value) {
            self.status(status)
        } else if let Some(level) = RiskLevel::parse(value) {
            self.risk(level)
        } else {
            Presentation::Neutral
        }
    }

    pub fn status_badge(&self, status: Status) -> Badge {
        Badge {
            class: self.status(status),
            label: status.to_string(),
        }
    }

    pub fn risk_badge(&self, level: RiskLevel) -> Badge {
        Badge {
            class: self.risk(level),
            label: level.to_string(),
        }
    }

    /// Presentation of a pass/fail aggregate.
    pub fn verdict(&self, passed: bool) -> Presentation {
        if passed {
            Presentation::Positive
        } else {
            Presentation::Negative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert_eq!(CLASSIFIER.status(Status::Met), Presentation::Positive);
        assert_eq!(CLASSIFIER.status(Status::Complete), Presentation::Positive);
        assert_eq!(CLASSIFIER.status(Status::NotMet), Presentation::Negative);
        assert_eq!(CLASSIFIER.status(Status::InProgress), Presentation::Caution);
        assert_eq!(CLASSIFIER.status(Status::Pending), Presentation::Neutral);
    }

    #[test]
    fn test_risk_classes() {
        assert_eq!(CLASSIFIER.risk(RiskLevel::High), Presentation::Negative);
        assert_eq!(CLASSIFIER.risk(RiskLevel::Medium), Presentation::Caution);
        assert_eq!(CLASSIFIER.risk(RiskLevel::Low), Presentation::Informational);
    }

    #[test]
    fn test_classifier_is_total() {
        for status in Status::ALL {
            let _ = CLASSIFIER.status(status);
            assert_eq!(CLASSIFIER.raw(status.as_str()), CLASSIFIER.status(status));
        }
        for level in RiskLevel::ALL {
            assert_eq!(CLASSIFIER.raw(level.as_str()), CLASSIFIER.risk(level));
        }
        assert_eq!(CLASSIFIER.raw("unknown-status"), Presentation::Neutral);
        assert_eq!(CLASSIFIER.raw(""), Presentation::Neutral);
    }

    #[test]
    fn test_badge_text() {
        let badge = CLASSIFIER.status_badge(Status::NotMet);
        assert_eq!(badge.text(), "❌ Not Met");
        assert_eq!(badge.class.css_class(), "badge-negative");

        let badge = CLASSIFIER.risk_badge(RiskLevel::Low);
        assert_eq!(badge.label, "Low");
        assert_eq!(badge.class, Presentation::Informational);
    }
}
