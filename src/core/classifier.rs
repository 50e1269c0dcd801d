//! Screening classification of an averaged heart rate.
//!
//! A fixed, ordered rule set over heart rate and age. Later rules may raise
//! the risk level set by earlier ones but never lower it.

use crate::collector::types::Gender;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of the normal resting range (bpm, inclusive).
pub const BRADYCARDIA_THRESHOLD: u32 = 60;

/// Upper bound of the normal resting range (bpm, inclusive).
pub const TACHYCARDIA_THRESHOLD: u32 = 100;

/// Patients older than this get the age-related rule.
pub const SENIOR_AGE_THRESHOLD: u32 = 65;

/// Heart rate above which the age-related rule fires.
pub const SENIOR_HEART_RATE_THRESHOLD: u32 = 90;

/// Clinical urgency of a recording, in increasing order.
///
/// `Critical` exists for manually escalated reports; [`classify`] never
/// produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Badge text shown on patient reports, e.g. "Medium Risk".
    pub fn badge(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
            RiskLevel::Critical => "Critical Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Abnormality {
    #[serde(rename = "Bradycardia")]
    Bradycardia,
    #[serde(rename = "Tachycardia")]
    Tachycardia,
    #[serde(rename = "Age-related tachycardia concern")]
    AgeRelatedTachycardia,
}

impl Abnormality {
    pub fn label(&self) -> &'static str {
        match self {
            Abnormality::Bradycardia => "Bradycardia",
            Abnormality::Tachycardia => "Tachycardia",
            Abnormality::AgeRelatedTachycardia => "Age-related tachycardia concern",
        }
    }
}

impl fmt::Display for Abnormality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Short characterisation of the heart rhythm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rhythm {
    #[serde(rename = "Normal sinus rhythm")]
    NormalSinus,
    #[serde(rename = "Slow heart rate detected")]
    Slow,
    #[serde(rename = "Fast heart rate detected")]
    Fast,
}

impl Rhythm {
    pub fn description(&self) -> &'static str {
        match self {
            Rhythm::NormalSinus => "Normal sinus rhythm",
            Rhythm::Slow => "Slow heart rate detected",
            Rhythm::Fast => "Fast heart rate detected",
        }
    }
}

impl fmt::Display for Rhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Where a heart rate sits relative to the normal resting range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartRateBand {
    Bradycardic,
    Normal,
    Tachycardic,
}

impl HeartRateBand {
    pub fn of(heart_rate: u32) -> Self {
        if heart_rate < BRADYCARDIA_THRESHOLD {
            HeartRateBand::Bradycardic
        } else if heart_rate > TACHYCARDIA_THRESHOLD {
            HeartRateBand::Tachycardic
        } else {
            HeartRateBand::Normal
        }
    }

    /// Caption used on clinician reports.
    pub fn clinical_caption(&self) -> &'static str {
        match self {
            HeartRateBand::Normal => "Normal range (60-100 bpm)",
            HeartRateBand::Bradycardic => "Bradycardic (<60 bpm)",
            HeartRateBand::Tachycardic => "Tachycardic (>100 bpm)",
        }
    }

    /// Caption used on patient reports.
    pub fn patient_caption(&self) -> &'static str {
        match self {
            HeartRateBand::Normal => "Normal resting heart rate",
            HeartRateBand::Bradycardic => "Below normal range",
            HeartRateBand::Tachycardic => "Above normal range",
        }
    }
}

/// Outcome of classifying one recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Averaged heart rate in bpm
    pub heart_rate: u32,
    /// Rhythm description
    pub rhythm: Rhythm,
    /// Findings in the order the rules produced them
    pub abnormalities: Vec<Abnormality>,
    /// Overall risk level
    pub risk_level: RiskLevel,
}

impl ClassificationResult {
    pub fn has_findings(&self) -> bool {
        !self.abnormalities.is_empty()
    }

    pub fn band(&self) -> HeartRateBand {
        HeartRateBand::of(self.heart_rate)
    }

    /// Abnormality labels as stored by the persistence layer.
    pub fn abnormality_labels(&self) -> Vec<String> {
        self.abnormalities
            .iter()
            .map(|a| a.label().to_string())
            .collect()
    }
}

/// Classify an averaged heart rate for a patient.
///
/// Gender is part of the signature but does not influence the result.
pub fn classify(heart_rate: u32, age: u32, _gender: Gender) -> ClassificationResult {
    let mut risk_level = RiskLevel::Low;
    let mut abnormalities = Vec::new();
    let mut rhythm = Rhythm::NormalSinus;

    if heart_rate < BRADYCARDIA_THRESHOLD {
        abnormalities.push(Abnormality::Bradycardia);
        risk_level = RiskLevel::Medium;
        rhythm = Rhythm::Slow;
    } else if heart_rate > TACHYCARDIA_THRESHOLD {
        abnormalities.push(Abnormality::Tachycardia);
        risk_level = RiskLevel::Medium;
        rhythm = Rhythm::Fast;
    }

    if age > SENIOR_AGE_THRESHOLD && heart_rate > SENIOR_HEART_RATE_THRESHOLD {
        risk_level = RiskLevel::High;
        abnormalities.push(Abnormality::AgeRelatedTachycardia);
    }

    ClassificationResult {
        heart_rate,
        rhythm,
        abnormalities,
        risk_level,
    }
}
