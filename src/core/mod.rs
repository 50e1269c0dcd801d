//! Core functionality for the ECG report agent.
//!
//! This module contains:
//! - Aggregation of raw samples into a single heart rate
//! - Rule-based classification of that heart rate
//! - Composition of the patient summary and clinician notes

pub mod aggregation;
pub mod classifier;
pub mod report;

// Re-export commonly used types
pub use aggregation::{aggregate_heart_rate, Recording, SampleStats, DEFAULT_HEART_RATE};
pub use classifier::{
    classify, Abnormality, ClassificationResult, HeartRateBand, Rhythm, RiskLevel,
};
pub use report::{
    analyze, compose_doctor_notes, compose_patient_summary, render_report, EcgAnalysis,
    ReportView,
};
