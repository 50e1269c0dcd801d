//! Recording orchestration.
//!
//! A [`RecordingSession`] ties one recording to the store: it registers the
//! patient, opens a report in the `recording` state, drains the sample
//! stream, analyses it and writes the result back.

use crate::audit::AuditLog;
use crate::collector::{drain_recording, PatientContext, Sample};
use crate::core::aggregation::Recording;
use crate::core::report::{analyze, EcgAnalysis};
use crate::store::{
    EcgReport, EcgStore, NewEcgReport, NewPatient, Patient, PatientRepository, ReportRepository,
    ReportStatus, ReportUpdate, StoreError,
};
use chrono::Utc;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Errors raised while running a recording.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("recording was cancelled")]
    Cancelled,
}

/// Outcome of a completed recording.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub patient: Patient,
    pub report: EcgReport,
    pub analysis: EcgAnalysis,
}

/// Runs recordings against an injected store and audit log.
pub struct RecordingSession<'a, S: EcgStore + ?Sized> {
    store: &'a S,
    audit: &'a AuditLog,
    duration_secs: u32,
}

impl<'a, S: EcgStore + ?Sized> RecordingSession<'a, S> {
    pub fn new(store: &'a S, audit: &'a AuditLog, duration_secs: u32) -> Self {
        Self {
            store,
            audit,
            duration_secs,
        }
    }

    /// Record one ECG for a new patient.
    ///
    /// Samples are drained from `samples` until the stream closes or
    /// `timeout` elapses. Setting `cancel` aborts the recording and marks its
    /// report failed.
    pub fn run(
        &self,
        patient: NewPatient,
        samples: &Receiver<Sample>,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<SessionOutcome, SessionError> {
        let context = PatientContext::new(patient.age, patient.gender);
        let patient = self.store.create_patient(patient)?;
        tracing::info!("Registered patient {}", patient.id);

        let report = self.store.create_report(NewEcgReport {
            patient_id: patient.id,
            duration: self.duration_secs,
            heart_rate: None,
            raw_data: Vec::new(),
            status: Some(ReportStatus::Recording),
        })?;
        self.audit.record_report_saved();
        tracing::info!("Recording into report {}", report.id);

        let mut recording = Recording::new(
            Utc::now(),
            chrono::Duration::seconds(i64::from(self.duration_secs)),
        );
        let (drained, cancelled) =
            drain_recording(samples, timeout, || !cancel.load(Ordering::SeqCst));
        recording.extend(drained);
        if recording.out_of_window > 0 {
            tracing::debug!(
                "{} of {} samples fall outside the recording window",
                recording.out_of_window,
                recording.sample_count()
            );
        }

        let recorded = recording.samples;
        let without_hr = recorded.iter().filter(|s| s.reading().is_none()).count();
        self.audit
            .record_samples(recorded.len() as u64, without_hr as u64);

        if cancelled {
            tracing::warn!(
                "Recording {} cancelled after {} samples",
                report.id,
                recorded.len()
            );
            self.fail(&report)?;
            return Err(SessionError::Cancelled);
        }

        if recorded.is_empty() {
            tracing::warn!("No samples received; analysing with the default heart rate");
        }

        let analysis = analyze(&recorded, context);
        let update = ReportUpdate::from_analysis(&analysis).with_raw_data(recorded);
        let report = match self.store.update_report(report.id, update) {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Failed to save analysis for report {}: {e}", report.id);
                self.audit.record_recording_failed();
                if let Err(mark) = self
                    .store
                    .update_report(report.id, ReportUpdate::status(ReportStatus::Failed))
                {
                    tracing::warn!("Could not mark report {} failed: {mark}", report.id);
                }
                return Err(e.into());
            }
        };
        self.audit.record_report_saved();
        self.audit.record_recording_completed();

        tracing::info!(
            "Report {} completed: {} bpm, {} risk",
            report.id,
            analysis.heart_rate,
            analysis.risk_level
        );

        Ok(SessionOutcome {
            patient,
            report,
            analysis,
        })
    }

    fn fail(&self, report: &EcgReport) -> Result<(), SessionError> {
        self.audit.record_recording_failed();
        self.store
            .update_report(report.id, ReportUpdate::status(ReportStatus::Failed))?;
        self.audit.record_report_saved();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Gender;
    use crate::core::classifier::RiskLevel;
    use crate::store::{MemoryStore, PatientUpdate};
    use crossbeam_channel::unbounded;
    use uuid::Uuid;

    /// Memory store that refuses to complete reports.
    struct RejectingStore(MemoryStore);

    impl PatientRepository for RejectingStore {
        fn create_patient(&self, patient: NewPatient) -> Result<Patient, StoreError> {
            self.0.create_patient(patient)
        }
        fn list_patients(&self) -> Result<Vec<Patient>, StoreError> {
            self.0.list_patients()
        }
        fn get_patient(&self, id: Uuid) -> Result<Patient, StoreError> {
            self.0.get_patient(id)
        }
        fn update_patient(&self, id: Uuid, update: PatientUpdate) -> Result<Patient, StoreError> {
            self.0.update_patient(id, update)
        }
        fn delete_patient(&self, id: Uuid) -> Result<(), StoreError> {
            self.0.delete_patient(id)
        }
    }

    impl ReportRepository for RejectingStore {
        fn create_report(&self, report: NewEcgReport) -> Result<EcgReport, StoreError> {
            self.0.create_report(report)
        }
        fn list_reports(&self) -> Result<Vec<EcgReport>, StoreError> {
            self.0.list_reports()
        }
        fn get_report(&self, id: Uuid) -> Result<EcgReport, StoreError> {
            self.0.get_report(id)
        }
        fn update_report(&self, id: Uuid, update: ReportUpdate) -> Result<EcgReport, StoreError> {
            if update.status == Some(ReportStatus::Completed) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.0.update_report(id, update)
        }
    }

    fn new_patient(age: u32) -> NewPatient {
        NewPatient {
            name: "Ada".to_string(),
            age,
            gender: Gender::Female,
        }
    }

    #[test]
    fn test_session_completes_report() {
        let store = MemoryStore::with_user("user-1");
        let audit = AuditLog::new();
        let session = RecordingSession::new(&store, &audit, 30);

        let (tx, rx) = unbounded();
        for i in 0..10 {
            tx.send(Sample::new(i * 100, 0, Some(110))).unwrap();
        }
        drop(tx);

        let outcome = session
            .run(new_patient(70), &rx, Duration::from_secs(5), &AtomicBool::new(false))
            .unwrap();

        assert_eq!(outcome.analysis.heart_rate, 110);
        assert_eq!(outcome.report.status, ReportStatus::Completed);
        assert_eq!(outcome.report.risk_level, Some(RiskLevel::High));
        assert_eq!(outcome.report.raw_data.len(), 10);
        assert_eq!(outcome.report.patient_id, outcome.patient.id);

        let stats = audit.stats();
        assert_eq!(stats.samples_received, 10);
        assert_eq!(stats.recordings_completed, 1);
        assert_eq!(stats.reports_saved, 2);
    }

    #[test]
    fn test_session_empty_stream_uses_default() {
        let store = MemoryStore::with_user("user-1");
        let audit = AuditLog::new();
        let session = RecordingSession::new(&store, &audit, 30);

        let (tx, rx) = unbounded::<Sample>();
        drop(tx);

        let outcome = session
            .run(new_patient(40), &rx, Duration::from_secs(1), &AtomicBool::new(false))
            .unwrap();
        assert_eq!(outcome.analysis.heart_rate, 75);
        assert_eq!(outcome.report.heart_rate, Some(75));
        assert_eq!(outcome.report.risk_level, Some(RiskLevel::Low));
    }

    #[test]
    fn test_session_cancel_marks_failed() {
        let store = MemoryStore::with_user("user-1");
        let audit = AuditLog::new();
        let session = RecordingSession::new(&store, &audit, 30);

        let (_tx, rx) = unbounded::<Sample>();
        let result = session.run(
            new_patient(40),
            &rx,
            Duration::from_secs(5),
            &AtomicBool::new(true),
        );
        assert!(matches!(result, Err(SessionError::Cancelled)));

        let reports = store.list_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ReportStatus::Failed);
        assert_eq!(reports[0].heart_rate, None);
        assert_eq!(audit.stats().recordings_failed, 1);
    }

    #[test]
    fn test_session_save_failure_marks_failed() {
        let store = RejectingStore(MemoryStore::with_user("user-1"));
        let audit = AuditLog::new();
        let session = RecordingSession::new(&store, &audit, 30);

        let (tx, rx) = unbounded();
        tx.send(Sample::new(0, 0, Some(72))).unwrap();
        drop(tx);

        let result = session.run(
            new_patient(40),
            &rx,
            Duration::from_secs(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(
            result,
            Err(SessionError::Store(StoreError::Backend(_)))
        ));

        let reports = store.list_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ReportStatus::Failed);
        assert_eq!(audit.stats().recordings_failed, 1);
        assert_eq!(audit.stats().recordings_completed, 0);
    }

    #[test]
    fn test_session_requires_user() {
        let store = MemoryStore::new();
        let audit = AuditLog::new();
        let session = RecordingSession::new(&store, &audit, 30);

        let (_tx, rx) = unbounded::<Sample>();
        let result = session.run(
            new_patient(40),
            &rx,
            Duration::from_secs(1),
            &AtomicBool::new(false),
        );
        assert!(matches!(
            result,
            Err(SessionError::Store(StoreError::NotAuthenticated))
        ));
    }
}
