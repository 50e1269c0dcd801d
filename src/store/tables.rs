//! Row storage shared by the store implementations.

use super::{
    EcgReport, NewEcgReport, NewPatient, Patient, PatientInfo, PatientUpdate, ReportStatus,
    ReportUpdate, StoreError, StoreResult,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patients and reports of every user, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    pub patients: Vec<Patient>,
    #[serde(default)]
    pub reports: Vec<EcgReport>,
}

impl Tables {
    pub fn create_patient(&mut self, user_id: &str, new: NewPatient) -> StoreResult<Patient> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(StoreError::Invalid("patient name is required".to_string()));
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            age: new.age,
            gender: new.gender,
            created_at: now,
            updated_at: now,
        };
        self.patients.push(patient.clone());
        Ok(patient)
    }

    pub fn list_patients(&self, user_id: &str) -> Vec<Patient> {
        let mut patients: Vec<Patient> = self
            .patients
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        patients
    }

    pub fn get_patient(&self, user_id: &str, id: Uuid) -> StoreResult<Patient> {
        self.patients
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Patient".to_string()))
    }

    pub fn update_patient(
        &mut self,
        user_id: &str,
        id: Uuid,
        update: PatientUpdate,
    ) -> StoreResult<Patient> {
        let patient = self
            .patients
            .iter_mut()
            .find(|p| p.id == id && p.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound("Patient".to_string()))?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::Invalid("patient name is required".to_string()));
            }
            patient.name = name.to_string();
        }
        if let Some(age) = update.age {
            patient.age = age;
        }
        if let Some(gender) = update.gender {
            patient.gender = gender;
        }
        patient.updated_at = Utc::now();
        Ok(patient.clone())
    }

    pub fn delete_patient(&mut self, user_id: &str, id: Uuid) -> StoreResult<()> {
        let before = self.patients.len();
        self.patients.retain(|p| !(p.id == id && p.user_id == user_id));
        if self.patients.len() == before {
            return Err(StoreError::NotFound("Patient".to_string()));
        }
        Ok(())
    }

    pub fn create_report(&mut self, user_id: &str, new: NewEcgReport) -> StoreResult<EcgReport> {
        // The patient must belong to the same user
        self.get_patient(user_id, new.patient_id)?;

        let now = Utc::now();
        let report = EcgReport {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            patient_id: new.patient_id,
            duration: new.duration,
            heart_rate: new.heart_rate,
            rhythm_analysis: None,
            abnormalities: None,
            risk_level: None,
            raw_data: new.raw_data,
            doctor_notes: None,
            patient_summary: None,
            status: new.status.unwrap_or(ReportStatus::Completed),
            created_at: now,
            updated_at: now,
            patient: None,
        };
        self.reports.push(report.clone());
        Ok(self.join(report))
    }

    pub fn list_reports(&self, user_id: &str) -> Vec<EcgReport> {
        let mut reports: Vec<EcgReport> = self
            .reports
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .map(|r| self.join(r))
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reports
    }

    pub fn get_report(&self, user_id: &str, id: Uuid) -> StoreResult<EcgReport> {
        self.reports
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned()
            .map(|r| self.join(r))
            .ok_or_else(|| StoreError::NotFound("ECG report".to_string()))
    }

    pub fn update_report(
        &mut self,
        user_id: &str,
        id: Uuid,
        update: ReportUpdate,
    ) -> StoreResult<EcgReport> {
        let report = self
            .reports
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound("ECG report".to_string()))?;

        if update.heart_rate.is_some() {
            report.heart_rate = update.heart_rate;
        }
        if update.rhythm_analysis.is_some() {
            report.rhythm_analysis = update.rhythm_analysis;
        }
        if update.abnormalities.is_some() {
            report.abnormalities = update.abnormalities;
        }
        if update.risk_level.is_some() {
            report.risk_level = update.risk_level;
        }
        if update.doctor_notes.is_some() {
            report.doctor_notes = update.doctor_notes;
        }
        if update.patient_summary.is_some() {
            report.patient_summary = update.patient_summary;
        }
        if let Some(raw_data) = update.raw_data {
            report.raw_data = raw_data;
        }
        if let Some(status) = update.status {
            report.status = status;
        }
        report.updated_at = Utc::now();

        let updated = report.clone();
        Ok(self.join(updated))
    }

    /// Attach patient name, age and gender to a report.
    fn join(&self, mut report: EcgReport) -> EcgReport {
        report.patient = self
            .patients
            .iter()
            .find(|p| p.id == report.patient_id)
            .map(PatientInfo::from);
        report
    }
}
