//! In-memory store, used by tests and the HTTP server.

use super::tables::Tables;
use super::{
    EcgReport, NewEcgReport, NewPatient, Patient, PatientRepository, PatientUpdate,
    ReportRepository, ReportUpdate, StoreError, StoreResult,
};
use std::sync::RwLock;
use uuid::Uuid;

/// A thread-safe store holding all rows in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    user: RwLock<Option<String>>,
}

impl MemoryStore {
    /// Create an empty store with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with `user_id` signed in.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let store = Self::new();
        store.sign_in(user_id);
        store
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        if let Ok(mut user) = self.user.write() {
            *user = Some(user_id.into());
        }
    }

    pub fn sign_out(&self) {
        if let Ok(mut user) = self.user.write() {
            *user = None;
        }
    }

    pub fn current_user(&self) -> Option<String> {
        self.user.read().ok().and_then(|u| u.clone())
    }

    fn require_user(&self) -> StoreResult<String> {
        self.current_user().ok_or(StoreError::NotAuthenticated)
    }

    fn read<T>(&self, f: impl FnOnce(&Tables, &str) -> StoreResult<T>) -> StoreResult<T> {
        let user = self.require_user()?;
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        f(&tables, &user)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables, &str) -> StoreResult<T>) -> StoreResult<T> {
        let user = self.require_user()?;
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        f(&mut tables, &user)
    }
}

impl PatientRepository for MemoryStore {
    fn create_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        self.write(|t, user| t.create_patient(user, patient))
    }

    fn list_patients(&self) -> StoreResult<Vec<Patient>> {
        self.read(|t, user| Ok(t.list_patients(user)))
    }

    fn get_patient(&self, id: Uuid) -> StoreResult<Patient> {
        self.read(|t, user| t.get_patient(user, id))
    }

    fn update_patient(&self, id: Uuid, update: PatientUpdate) -> StoreResult<Patient> {
        self.write(|t, user| t.update_patient(user, id, update))
    }

    fn delete_patient(&self, id: Uuid) -> StoreResult<()> {
        self.write(|t, user| t.delete_patient(user, id))
    }
}

impl ReportRepository for MemoryStore {
    fn create_report(&self, report: NewEcgReport) -> StoreResult<EcgReport> {
        self.write(|t, user| t.create_report(user, report))
    }

    fn list_reports(&self) -> StoreResult<Vec<EcgReport>> {
        self.read(|t, user| Ok(t.list_reports(user)))
    }

    fn get_report(&self, id: Uuid) -> StoreResult<EcgReport> {
        self.read(|t, user| t.get_report(user, id))
    }

    fn update_report(&self, id: Uuid, update: ReportUpdate) -> StoreResult<EcgReport> {
        self.write(|t, user| t.update_report(user, id, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{Gender, Sample};
    use crate::core::classifier::RiskLevel;
    use crate::store::ReportStatus;

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            name: name.to_string(),
            age: 70,
            gender: Gender::Female,
        }
    }

    #[test]
    fn test_requires_signed_in_user() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.list_reports(),
            Err(StoreError::NotAuthenticated)
        ));
        assert!(matches!(
            store.create_patient(new_patient("Ada")),
            Err(StoreError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_patient_crud() {
        let store = MemoryStore::with_user("user-1");
        let patient = store.create_patient(new_patient("  Ada  ")).unwrap();
        assert_eq!(patient.name, "Ada");
        assert_eq!(patient.user_id, "user-1");

        let updated = store
            .update_patient(
                patient.id,
                PatientUpdate {
                    age: Some(71),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.age, 71);
        assert_eq!(updated.name, "Ada");

        assert_eq!(store.list_patients().unwrap().len(), 1);
        store.delete_patient(patient.id).unwrap();
        assert!(matches!(
            store.get_patient(patient.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_patient_name_rejected() {
        let store = MemoryStore::with_user("user-1");
        assert!(matches!(
            store.create_patient(new_patient("   ")),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_report_lifecycle_and_join() {
        let store = MemoryStore::with_user("user-1");
        let patient = store.create_patient(new_patient("Ada")).unwrap();

        let report = store
            .create_report(NewEcgReport {
                patient_id: patient.id,
                duration: 30,
                heart_rate: None,
                raw_data: vec![Sample::new(0, 1, Some(95))],
                status: Some(ReportStatus::Recording),
            })
            .unwrap();
        assert_eq!(report.status, ReportStatus::Recording);
        assert_eq!(report.patient.as_ref().unwrap().name, "Ada");

        let updated = store
            .update_report(
                report.id,
                ReportUpdate {
                    risk_level: Some(RiskLevel::High),
                    status: Some(ReportStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.risk_level, Some(RiskLevel::High));
        assert_eq!(updated.status, ReportStatus::Completed);
        assert_eq!(updated.raw_data.len(), 1);
    }

    #[test]
    fn test_report_defaults_to_completed() {
        let store = MemoryStore::with_user("user-1");
        let patient = store.create_patient(new_patient("Ada")).unwrap();
        let report = store
            .create_report(NewEcgReport {
                patient_id: patient.id,
                duration: 30,
                heart_rate: Some(70),
                raw_data: Vec::new(),
                status: None,
            })
            .unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        assert_eq!(report.heart_rate, Some(70));
    }

    #[test]
    fn test_reports_are_scoped_to_user() {
        let store = MemoryStore::with_user("user-1");
        let patient = store.create_patient(new_patient("Ada")).unwrap();
        let report = store
            .create_report(NewEcgReport {
                patient_id: patient.id,
                duration: 30,
                heart_rate: None,
                raw_data: Vec::new(),
                status: None,
            })
            .unwrap();

        store.sign_in("user-2");
        assert!(store.list_reports().unwrap().is_empty());
        assert!(matches!(
            store.get_report(report.id),
            Err(StoreError::NotFound(_))
        ));
        // Cannot attach a report to another user's patient
        assert!(store
            .create_report(NewEcgReport {
                patient_id: patient.id,
                duration: 30,
                heart_rate: None,
                raw_data: Vec::new(),
                status: None,
            })
            .is_err());
    }

    #[test]
    fn test_reports_newest_first() {
        let store = MemoryStore::with_user("user-1");
        let patient = store.create_patient(new_patient("Ada")).unwrap();
        let ids: Vec<Uuid> = (0..3)
            .map(|_| {
                store
                    .create_report(NewEcgReport {
                        patient_id: patient.id,
                        duration: 30,
                        heart_rate: None,
                        raw_data: Vec::new(),
                        status: None,
                    })
                    .unwrap()
                    .id
            })
            .collect();

        let listed: Vec<Uuid> = store.list_reports().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, ids.into_iter().rev().collect::<Vec<_>>());
    }
}
