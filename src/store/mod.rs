//! Persistence of patients and ECG reports.
//!
//! The analysis core never talks to a backend directly. Whatever orchestrates
//! a recording is handed a repository implementing [`PatientRepository`] and
//! [`ReportRepository`]. Every call is scoped to the signed-in user, and the
//! store (not the core) assigns identifiers and timestamps.

pub mod file;
pub mod memory;
mod tables;

use crate::collector::types::{Gender, Sample};
use crate::core::classifier::RiskLevel;
use crate::core::report::EcgAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("User not authenticated")]
    NotAuthenticated,
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid record: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A patient record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
}

/// Partial patient update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
}

/// Lifecycle of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Recording,
    Completed,
    Failed,
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportStatus::Recording => "recording",
            ReportStatus::Completed => "completed",
            ReportStatus::Failed => "failed",
        })
    }
}

/// Patient fields joined onto a report when it is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
}

impl From<&Patient> for PatientInfo {
    fn from(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender,
        }
    }
}

/// A stored ECG report.
///
/// Analysis fields stay `None` until the recording has been analysed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcgReport {
    pub id: Uuid,
    pub user_id: String,
    pub patient_id: Uuid,
    /// Recording length in seconds
    pub duration: u32,
    pub heart_rate: Option<u32>,
    pub rhythm_analysis: Option<String>,
    pub abnormalities: Option<Vec<String>>,
    pub risk_level: Option<RiskLevel>,
    pub raw_data: Vec<Sample>,
    pub doctor_notes: Option<String>,
    pub patient_summary: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Joined patient data
    #[serde(rename = "patients", default, skip_serializing_if = "Option::is_none")]
    pub patient: Option<PatientInfo>,
}

/// Fields required to create a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEcgReport {
    pub patient_id: Uuid,
    pub duration: u32,
    #[serde(default)]
    pub heart_rate: Option<u32>,
    #[serde(default)]
    pub raw_data: Vec<Sample>,
    /// Defaults to `completed`
    #[serde(default)]
    pub status: Option<ReportStatus>,
}

/// Partial report update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportUpdate {
    pub heart_rate: Option<u32>,
    pub rhythm_analysis: Option<String>,
    pub abnormalities: Option<Vec<String>>,
    pub risk_level: Option<RiskLevel>,
    pub doctor_notes: Option<String>,
    pub patient_summary: Option<String>,
    pub raw_data: Option<Vec<Sample>>,
    pub status: Option<ReportStatus>,
}

impl ReportUpdate {
    /// Update carrying a finished analysis; marks the report completed.
    pub fn from_analysis(analysis: &EcgAnalysis) -> Self {
        Self {
            heart_rate: Some(analysis.heart_rate),
            rhythm_analysis: Some(analysis.rhythm_analysis.description().to_string()),
            abnormalities: Some(
                analysis
                    .abnormalities
                    .iter()
                    .map(|a| a.label().to_string())
                    .collect(),
            ),
            risk_level: Some(analysis.risk_level),
            doctor_notes: Some(analysis.doctor_notes.clone()),
            patient_summary: Some(analysis.patient_summary.clone()),
            raw_data: None,
            status: Some(ReportStatus::Completed),
        }
    }

    /// Update that only changes the status.
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_raw_data(mut self, samples: Vec<Sample>) -> Self {
        self.raw_data = Some(samples);
        self
    }
}

/// Patient persistence.
pub trait PatientRepository: Send + Sync {
    fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient>;

    /// Patients of the signed-in user, newest first.
    fn list_patients(&self) -> StoreResult<Vec<Patient>>;

    fn get_patient(&self, id: Uuid) -> StoreResult<Patient>;

    fn update_patient(&self, id: Uuid, update: PatientUpdate) -> StoreResult<Patient>;

    fn delete_patient(&self, id: Uuid) -> StoreResult<()>;
}

/// Report persistence.
pub trait ReportRepository: Send + Sync {
    fn create_report(&self, report: NewEcgReport) -> StoreResult<EcgReport>;

    /// Reports of the signed-in user, newest first.
    fn list_reports(&self) -> StoreResult<Vec<EcgReport>>;

    fn get_report(&self, id: Uuid) -> StoreResult<EcgReport>;

    fn update_report(&self, id: Uuid, update: ReportUpdate) -> StoreResult<EcgReport>;
}

/// A backend offering both repositories.
pub trait EcgStore: PatientRepository + ReportRepository {}

impl<T: PatientRepository + ReportRepository> EcgStore for T {}
