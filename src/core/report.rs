//! Report narratives.
//!
//! Turns a [`ClassificationResult`] into the two texts stored with every
//! report: structured clinician notes and a plain-language patient summary.
//! Both are pure functions of their inputs.

use crate::collector::types::{PatientContext, Sample};
use crate::core::aggregation::{aggregate_heart_rate, SampleStats};
use crate::core::classifier::{
    classify, Abnormality, ClassificationResult, HeartRateBand, RiskLevel, Rhythm,
    BRADYCARDIA_THRESHOLD, TACHYCARDIA_THRESHOLD,
};
use crate::store::EcgReport;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Label for the fixed recording length quoted in clinician notes.
pub const RECORDING_DURATION_LABEL: &str = "30 seconds";

/// Closing sentence of every patient summary.
pub const PATIENT_DISCLAIMER: &str = "Remember: This is an initial screening. Always consult with a healthcare professional for proper medical advice.";

/// Closing note of every set of clinician notes.
pub const RECORDING_LIMITATIONS_NOTE: &str = "Note: This analysis is based on a 30-second single-lead recording. Full 12-lead ECG recommended for comprehensive cardiac assessment.";

const ROUTINE_RECOMMENDATIONS: [&str; 3] = [
    "Normal ECG findings for age group",
    "Recommend routine follow-up as per guidelines",
    "Continue current cardiac health management",
];

const WORKUP_RECOMMENDATIONS: [&str; 3] = [
    "Consider 12-lead ECG for comprehensive evaluation",
    "Review patient medication list for potential causes",
    "Assess for symptoms: chest pain, palpitations, dyspnea",
];

const BRADYCARDIA_RECOMMENDATIONS: [&str; 2] = [
    "Consider evaluation for sick sinus syndrome or AV block",
    "Review medications that may cause bradycardia",
];

const TACHYCARDIA_RECOMMENDATIONS: [&str; 3] = [
    "Evaluate for underlying causes of tachycardia",
    "Consider thyroid function tests",
    "Assess hydration status and recent activities",
];

/// Full result of analysing one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgAnalysis {
    pub heart_rate: u32,
    pub rhythm_analysis: Rhythm,
    pub abnormalities: Vec<Abnormality>,
    pub risk_level: RiskLevel,
    pub doctor_notes: String,
    pub patient_summary: String,
    /// Descriptive statistics of the samples that were analysed
    #[serde(default)]
    pub stats: SampleStats,
}

impl EcgAnalysis {
    /// The classification this analysis was composed from.
    pub fn classification(&self) -> ClassificationResult {
        ClassificationResult {
            heart_rate: self.heart_rate,
            rhythm: self.rhythm_analysis,
            abnormalities: self.abnormalities.clone(),
            risk_level: self.risk_level,
        }
    }
}

/// Run the whole pipeline: aggregate, classify, compose.
pub fn analyze(samples: &[Sample], patient: PatientContext) -> EcgAnalysis {
    let heart_rate = aggregate_heart_rate(samples);
    let result = classify(heart_rate, patient.age, patient.gender);

    EcgAnalysis {
        heart_rate,
        rhythm_analysis: result.rhythm,
        abnormalities: result.abnormalities.clone(),
        risk_level: result.risk_level,
        doctor_notes: compose_doctor_notes(&result, patient, samples.len()),
        patient_summary: compose_patient_summary(&result),
        stats: SampleStats::from_samples(samples),
    }
}

/// Plain-language summary for the patient.
pub fn compose_patient_summary(result: &ClassificationResult) -> String {
    let mut summary = format!(
        "Your ECG recording shows an average heart rate of {} beats per minute. ",
        result.heart_rate
    );

    if result.abnormalities.is_empty() {
        summary.push_str("Your heart rhythm appears normal. This is a good sign for your heart health. ");
        summary.push_str(
            "Continue maintaining a healthy lifestyle with regular exercise and a balanced diet.",
        );
    } else {
        summary.push_str("Some irregularities were detected in your heart rhythm. ");
        summary.push_str(match result.risk_level {
            RiskLevel::Low => "These are typically minor and may not require immediate concern, but it's worth discussing with your doctor.",
            RiskLevel::Medium => "These findings warrant attention. Please schedule an appointment with your doctor to discuss these results.",
            // High and critical share the same guidance
            RiskLevel::High | RiskLevel::Critical => "These findings require medical attention. Please contact your doctor promptly to discuss these results.",
        });
    }

    summary.push_str("\n\n");
    summary.push_str(PATIENT_DISCLAIMER);
    summary
}

/// Itemised notes for the clinician.
pub fn compose_doctor_notes(
    result: &ClassificationResult,
    patient: PatientContext,
    sample_count: usize,
) -> String {
    let mut notes = String::from("ECG Analysis Summary:\n\n");
    let _ = writeln!(notes, "Patient: {}-year-old {}", patient.age, patient.gender);
    let _ = writeln!(notes, "Average Heart Rate: {} bpm", result.heart_rate);
    let _ = writeln!(notes, "Recording Duration: {RECORDING_DURATION_LABEL}");
    let _ = writeln!(notes, "Data Points: {sample_count}\n");

    if !result.abnormalities.is_empty() {
        notes.push_str("Abnormalities Detected:\n");
        for (index, abnormality) in result.abnormalities.iter().enumerate() {
            let _ = writeln!(notes, "{}. {}", index + 1, abnormality.label());
        }
        notes.push('\n');
    }

    notes.push_str("Clinical Recommendations:\n");
    if result.abnormalities.is_empty() {
        push_bullets(&mut notes, &ROUTINE_RECOMMENDATIONS);
    } else {
        push_bullets(&mut notes, &WORKUP_RECOMMENDATIONS);

        // No extra block when the only finding is the age-related rule
        if result.heart_rate < BRADYCARDIA_THRESHOLD {
            push_bullets(&mut notes, &BRADYCARDIA_RECOMMENDATIONS);
        } else if result.heart_rate > TACHYCARDIA_THRESHOLD {
            push_bullets(&mut notes, &TACHYCARDIA_RECOMMENDATIONS);
        }
    }

    notes.push('\n');
    notes.push_str(RECORDING_LIMITATIONS_NOTE);
    notes
}

fn push_bullets(notes: &mut String, lines: &[&str]) {
    for line in lines {
        let _ = writeln!(notes, "- {line}");
    }
}

/// Which report screen to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportView {
    Patient,
    Doctor,
}

/// Samples per second over the recording, rounded. Zero for a zero-length recording.
fn sampling_rate(points: usize, duration_secs: u32) -> u64 {
    if duration_secs == 0 {
        return 0;
    }
    (points as f64 / f64::from(duration_secs)).round() as u64
}

/// Render a stored report as plain text for the given audience.
///
/// Timestamps are shown in `tz`.
pub fn render_report(report: &EcgReport, view: ReportView, tz: Tz) -> String {
    let mut out = String::new();
    let title = match view {
        ReportView::Patient => "Your ECG Report",
        ReportView::Doctor => "Clinical ECG Report",
    };
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(title.len()));

    if let Some(ref patient) = report.patient {
        match view {
            ReportView::Patient => {
                let _ = writeln!(out, "Patient: {}", patient.name);
            }
            ReportView::Doctor => {
                let _ = writeln!(
                    out,
                    "Patient: {} ({}-year-old {})",
                    patient.name, patient.age, patient.gender
                );
            }
        }
    }
    let _ = writeln!(
        out,
        "Recorded: {}",
        report.created_at.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
    );
    if view == ReportView::Doctor {
        let id = report.id.to_string();
        let _ = writeln!(out, "Report ID: {}", &id[..8]);
        let _ = writeln!(out, "Status: {}", report.status);
        let _ = writeln!(out, "Duration: {}s", report.duration);
        let _ = writeln!(
            out,
            "Data Quality: {} Hz, {} data points",
            sampling_rate(report.raw_data.len(), report.duration),
            report.raw_data.len()
        );
    }
    out.push('\n');

    match report.heart_rate {
        Some(hr) => {
            let band = HeartRateBand::of(hr);
            let caption = match view {
                ReportView::Patient => band.patient_caption(),
                ReportView::Doctor => band.clinical_caption(),
            };
            let _ = writeln!(out, "Heart Rate: {hr} bpm ({caption})");
        }
        None => {
            let text = match view {
                ReportView::Patient => "Heart rate data not available",
                ReportView::Doctor => "N/A",
            };
            let _ = writeln!(out, "Heart Rate: {text}");
        }
    }

    if let Some(risk) = report.risk_level {
        match view {
            ReportView::Patient => {
                let _ = writeln!(out, "Risk: {}", risk.badge());
            }
            ReportView::Doctor => {
                let _ = writeln!(out, "Risk Level: {}", risk.as_str().to_uppercase());
            }
        }
    }

    if view == ReportView::Doctor {
        let rhythm = report
            .rhythm_analysis
            .as_deref()
            .unwrap_or("Analysis pending");
        let _ = writeln!(out, "Rhythm: {rhythm}");
        match report.abnormalities.as_deref() {
            Some(list) if !list.is_empty() => {
                let _ = writeln!(out, "Abnormalities: {}", list.join(", "));
            }
            _ => {
                let _ = writeln!(out, "Abnormalities: none detected");
            }
        }
    }

    let narrative = match view {
        ReportView::Patient => report.patient_summary.as_deref(),
        ReportView::Doctor => report.doctor_notes.as_deref(),
    };
    if let Some(text) = narrative {
        out.push('\n');
        out.push_str(text);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Gender;

    fn patient(age: u32) -> PatientContext {
        PatientContext::new(age, Gender::Male)
    }

    #[test]
    fn test_patient_summary_normal() {
        let result = classify(72, 40, Gender::Female);
        let summary = compose_patient_summary(&result);

        assert!(summary
            .starts_with("Your ECG recording shows an average heart rate of 72 beats per minute."));
        assert!(summary.contains("Your heart rhythm appears normal."));
        assert!(summary.ends_with(&format!("\n\n{PATIENT_DISCLAIMER}")));
    }

    #[test]
    fn test_patient_summary_guidance_by_risk() {
        let mut result = classify(110, 30, Gender::Male);
        assert!(compose_patient_summary(&result).contains("schedule an appointment"));

        result.risk_level = RiskLevel::Low;
        assert!(compose_patient_summary(&result).contains("worth discussing"));

        result.risk_level = RiskLevel::High;
        let high = compose_patient_summary(&result);
        assert!(high.contains("contact your doctor promptly"));

        result.risk_level = RiskLevel::Critical;
        assert_eq!(compose_patient_summary(&result), high);
    }

    #[test]
    fn test_doctor_notes_normal() {
        let result = classify(75, 40, Gender::Male);
        let notes = compose_doctor_notes(&result, patient(40), 299);

        assert!(notes.starts_with("ECG Analysis Summary:\n\n"));
        assert!(notes.contains("Patient: 40-year-old male\n"));
        assert!(notes.contains("Average Heart Rate: 75 bpm\n"));
        assert!(notes.contains("Recording Duration: 30 seconds\n"));
        assert!(notes.contains("Data Points: 299\n"));
        assert!(!notes.contains("Abnormalities Detected"));
        for line in ROUTINE_RECOMMENDATIONS {
            assert!(notes.contains(&format!("- {line}\n")));
        }
        assert!(notes.ends_with(&format!("\n{RECORDING_LIMITATIONS_NOTE}")));
    }

    #[test]
    fn test_doctor_notes_bradycardia() {
        let result = classify(56, 30, Gender::Male);
        let notes = compose_doctor_notes(&result, patient(30), 2);

        assert!(notes.contains("Abnormalities Detected:\n1. Bradycardia\n\n"));
        assert!(notes.contains("- Consider 12-lead ECG for comprehensive evaluation\n"));
        assert!(notes.contains("- Review medications that may cause bradycardia\n"));
        assert!(!notes.contains("thyroid"));
        assert!(!notes.contains("Normal ECG findings"));
    }

    #[test]
    fn test_doctor_notes_tachycardia_with_age_rule() {
        let result = classify(110, 70, Gender::Male);
        let notes = compose_doctor_notes(&result, patient(70), 1);

        assert!(notes.contains("1. Tachycardia\n2. Age-related tachycardia concern\n"));
        assert!(notes.contains("- Consider thyroid function tests\n"));
        assert!(notes.contains("- Assess hydration status and recent activities\n"));
    }

    #[test]
    fn test_doctor_notes_age_rule_only_has_no_extra_block() {
        let result = classify(95, 70, Gender::Male);
        let notes = compose_doctor_notes(&result, patient(70), 1);

        assert!(notes.contains("1. Age-related tachycardia concern\n"));
        assert!(notes.contains("- Assess for symptoms: chest pain, palpitations, dyspnea\n"));
        assert!(!notes.contains("thyroid"));
        assert!(!notes.contains("sick sinus"));
    }

    #[test]
    fn test_analyze_empty_recording() {
        let analysis = analyze(&[], patient(40));
        assert_eq!(analysis.heart_rate, 75);
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert!(analysis.doctor_notes.contains("Data Points: 0\n"));
        assert_eq!(analysis.stats.sample_count, 0);
    }

    #[test]
    fn test_analysis_json_field_names() {
        let samples = vec![Sample::new(0, 0, Some(55)), Sample::new(1, 0, Some(57))];
        let analysis = analyze(&samples, patient(30));
        let json = serde_json::to_value(&analysis).unwrap();

        assert_eq!(json["heart_rate"], 56);
        assert_eq!(json["rhythm_analysis"], "Slow heart rate detected");
        assert_eq!(json["abnormalities"][0], "Bradycardia");
        assert_eq!(json["risk_level"], "medium");
        assert_eq!(analysis.classification().heart_rate, 56);
    }

    fn stored_report(analysis: &EcgAnalysis) -> EcgReport {
        use crate::store::{PatientInfo, ReportStatus};
        use chrono::{TimeZone, Utc};

        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        EcgReport {
            id: uuid::Uuid::nil(),
            user_id: "user-1".to_string(),
            patient_id: uuid::Uuid::nil(),
            duration: 30,
            heart_rate: Some(analysis.heart_rate),
            rhythm_analysis: Some(analysis.rhythm_analysis.description().to_string()),
            abnormalities: Some(analysis.classification().abnormality_labels()),
            risk_level: Some(analysis.risk_level),
            raw_data: Vec::new(),
            doctor_notes: Some(analysis.doctor_notes.clone()),
            patient_summary: Some(analysis.patient_summary.clone()),
            status: ReportStatus::Completed,
            created_at: created,
            updated_at: created,
            patient: Some(PatientInfo {
                name: "Ada".to_string(),
                age: 70,
                gender: Gender::Female,
            }),
        }
    }

    #[test]
    fn test_render_report_views() {
        let samples = vec![Sample::new(0, 0, Some(110))];
        let analysis = analyze(&samples, PatientContext::new(70, Gender::Female));
        let report = stored_report(&analysis);

        let patient_view = render_report(&report, ReportView::Patient, chrono_tz::UTC);
        assert!(patient_view.starts_with("Your ECG Report\n"));
        assert!(patient_view.contains("Risk: High Risk"));
        assert!(patient_view.contains(&analysis.patient_summary));
        assert!(!patient_view.contains("Clinical Recommendations"));

        let doctor_view = render_report(&report, ReportView::Doctor, chrono_tz::UTC);
        assert!(doctor_view.contains("Patient: Ada (70-year-old female)"));
        assert!(doctor_view.contains("Risk Level: HIGH"));
        assert!(doctor_view.contains("Abnormalities: Tachycardia, Age-related tachycardia concern"));
        assert!(doctor_view.contains("Recorded: 2024-03-01 12:00 UTC"));
        assert!(doctor_view.contains("Report ID: 00000000\n"));
        assert!(doctor_view.contains("Rhythm: Fast heart rate detected"));
        assert!(doctor_view.contains(&analysis.doctor_notes));
    }

    #[test]
    fn test_render_doctor_data_quality() {
        let samples: Vec<Sample> = (0..3000).map(|i| Sample::new(i * 10, 0, Some(72))).collect();
        let mut report = stored_report(&analyze(&samples, PatientContext::new(40, Gender::Male)));
        report.id = uuid::Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        report.raw_data = samples;

        let text = render_report(&report, ReportView::Doctor, chrono_tz::UTC);
        assert!(text.contains("Report ID: 3f2a9c1e\n"));
        assert!(text.contains("Data Quality: 100 Hz, 3000 data points"));

        report.duration = 0;
        let text = render_report(&report, ReportView::Doctor, chrono_tz::UTC);
        assert!(text.contains("Data Quality: 0 Hz, 3000 data points"));
    }

    #[test]
    fn test_render_report_pending_analysis() {
        let mut report = stored_report(&analyze(&[], PatientContext::new(40, Gender::Male)));
        report.heart_rate = None;
        report.risk_level = None;
        report.patient_summary = None;

        report.rhythm_analysis = None;

        let text = render_report(&report, ReportView::Patient, chrono_tz::Europe::Berlin);
        assert!(text.contains("Heart rate data not available"));
        assert!(text.contains("Recorded: 2024-03-01 13:00 CET"));
        assert!(!text.contains("Risk:"));

        let text = render_report(&report, ReportView::Doctor, chrono_tz::UTC);
        assert!(text.contains("Heart Rate: N/A"));
        assert!(text.contains("Rhythm: Analysis pending"));
    }
}
