//! Audit log of recording activity.
//!
//! Counts what the agent handled (samples, recordings, saved reports) without
//! holding any patient data, so it can be shown and persisted freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::SCREENING_DISCLAIMER;

/// Activity counters for the current process.
#[derive(Debug)]
pub struct AuditLog {
    /// Number of samples received from recording sources
    samples_received: AtomicU64,
    /// Number of received samples that carried no heart rate
    samples_without_heart_rate: AtomicU64,
    /// Number of recordings analysed
    recordings_completed: AtomicU64,
    /// Number of recordings that were cancelled or failed
    recordings_failed: AtomicU64,
    /// Number of reports written to the store
    reports_saved: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    /// Create a new audit log.
    pub fn new() -> Self {
        Self {
            samples_received: AtomicU64::new(0),
            samples_without_heart_rate: AtomicU64::new(0),
            recordings_completed: AtomicU64::new(0),
            recordings_failed: AtomicU64::new(0),
            reports_saved: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that resumes from and saves to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous audit stats: {e}");
        }

        log
    }

    /// Record received samples.
    pub fn record_samples(&self, count: u64, without_heart_rate: u64) {
        self.samples_received.fetch_add(count, Ordering::Relaxed);
        self.samples_without_heart_rate
            .fetch_add(without_heart_rate, Ordering::Relaxed);
    }

    /// Record an analysed recording.
    pub fn record_recording_completed(&self) {
        self.recordings_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled or failed recording.
    pub fn record_recording_failed(&self) {
        self.recordings_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a report write.
    pub fn record_report_saved(&self) {
        self.reports_saved.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_without_heart_rate: self.samples_without_heart_rate.load(Ordering::Relaxed),
            recordings_completed: self.recordings_completed.load(Ordering::Relaxed),
            recordings_failed: self.recordings_failed.load(Ordering::Relaxed),
            reports_saved: self.reports_saved.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Samples received: {}\n\
             - Samples without heart rate: {}\n\
             - Recordings completed: {}\n\
             - Recordings failed: {}\n\
             - Reports saved: {}\n\
             - Session duration: {} seconds\n\
             \n\
             {}",
            stats.samples_received,
            stats.samples_without_heart_rate,
            stats.recordings_completed,
            stats.recordings_failed,
            stats.reports_saved,
            stats.session_duration_secs,
            SCREENING_DISCLAIMER.trim()
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_received: stats.samples_received,
                samples_without_heart_rate: stats.samples_without_heart_rate,
                recordings_completed: stats.recordings_completed,
                recordings_failed: stats.recordings_failed,
                reports_saved: stats.reports_saved,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_received
                    .store(persisted.samples_received, Ordering::Relaxed);
                self.samples_without_heart_rate
                    .store(persisted.samples_without_heart_rate, Ordering::Relaxed);
                self.recordings_completed
                    .store(persisted.recordings_completed, Ordering::Relaxed);
                self.recordings_failed
                    .store(persisted.recordings_failed, Ordering::Relaxed);
                self.reports_saved
                    .store(persisted.reports_saved, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.samples_received.store(0, Ordering::Relaxed);
        self.samples_without_heart_rate.store(0, Ordering::Relaxed);
        self.recordings_completed.store(0, Ordering::Relaxed);
        self.recordings_failed.store(0, Ordering::Relaxed);
        self.reports_saved.store(0, Ordering::Relaxed);
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub samples_received: u64,
    pub samples_without_heart_rate: u64,
    pub recordings_completed: u64,
    pub recordings_failed: u64,
    pub reports_saved: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_received: u64,
    #[serde(default)]
    samples_without_heart_rate: u64,
    recordings_completed: u64,
    #[serde(default)]
    recordings_failed: u64,
    reports_saved: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

/// Create a new shared audit log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();

        log.record_samples(300, 2);
        log.record_recording_completed();
        log.record_report_saved();
        log.record_report_saved();

        let stats = log.stats();
        assert_eq!(stats.samples_received, 300);
        assert_eq!(stats.samples_without_heart_rate, 2);
        assert_eq!(stats.recordings_completed, 1);
        assert_eq!(stats.reports_saved, 2);
    }

    #[test]
    fn test_audit_log_reset() {
        let log = AuditLog::new();

        log.record_samples(100, 0);
        log.record_recording_failed();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.samples_received, 0);
        assert_eq!(stats.recordings_failed, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = AuditLog::new();
        let summary = log.summary();

        assert!(summary.contains("Samples received"));
        assert!(summary.contains("Recordings completed"));
        assert!(summary.contains("initial screening"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");

        let log = AuditLog::with_persistence(path.clone());
        log.record_samples(10, 1);
        log.record_recording_completed();
        log.save().unwrap();

        let resumed = AuditLog::with_persistence(path);
        let stats = resumed.stats();
        assert_eq!(stats.samples_received, 10);
        assert_eq!(stats.recordings_completed, 1);
    }
}
