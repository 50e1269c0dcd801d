//! JSON file store used by the CLI.
//!
//! All rows live in a single JSON document. Every write replaces the file
//! through a temporary sibling and a rename, so a crash never leaves a
//! half-written store behind.

use super::tables::Tables;
use super::{
    EcgReport, NewEcgReport, NewPatient, Patient, PatientRepository, PatientUpdate,
    ReportRepository, ReportUpdate, StoreError, StoreResult,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// A store persisted to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    user: Option<String>,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path` on behalf of `user_id`.
    pub fn open(path: impl Into<PathBuf>, user_id: Option<String>) -> Self {
        Self {
            path: path.into(),
            user: user_id,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn require_user(&self) -> StoreResult<&str> {
        self.user.as_deref().ok_or(StoreError::NotAuthenticated)
    }

    fn load(&self) -> StoreResult<Tables> {
        if !self.path.exists() {
            return Ok(Tables::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Tables::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Joined patient data is derived on read and never stored
        let mut stored = tables.clone();
        for report in &mut stored.reports {
            report.patient = None;
        }

        let json = serde_json::to_string_pretty(&stored)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables, &str) -> StoreResult<T>) -> StoreResult<T> {
        let user = self.require_user()?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        let tables = self.load()?;
        f(&tables, user)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables, &str) -> StoreResult<T>) -> StoreResult<T> {
        let user = self.require_user()?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))?;
        let mut tables = self.load()?;
        let result = f(&mut tables, user)?;
        self.persist(&tables)?;
        tracing::debug!("Store written to {:?}", self.path);
        Ok(result)
    }
}

impl PatientRepository for JsonFileStore {
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

impl ReportRepository for JsonFileStore {
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
