//! ECG Report Agent - single-lead ECG screening and report generation.
//!
//! This library turns a stream of raw ECG samples into an average heart rate,
//! a rule-based screening classification and two narrative reports: one in
//! plain language for the patient and one structured for a clinician.
//!
//! # Screening, not diagnosis
//!
//! - **Heart rate only**: Classification looks at the averaged heart rate and
//!   the patient's age, nothing else
//! - **Fixed rules**: Thresholds are constants, not learned
//! - **Single lead**: Every clinician report recommends a full 12-lead ECG
//!   for comprehensive assessment
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ECG Report Agent                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│ Aggregation │──▶│ Classifier  │       │
//! │  │ (sim/frame) │   │ (avg bpm)   │   │  (rules)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Audit     │◀──│  Session    │◀──│   Report    │       │
//! │  │    Log      │   │ (store I/O) │   │  Composer   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use ecg_report_agent::{analyze, Gender, PatientContext, RiskLevel, Sample};
//!
//! let samples = vec![
//!     Sample::new(0, 812, Some(108)),
//!     Sample::new(100, -240, Some(112)),
//! ];
//! let analysis = analyze(&samples, PatientContext::new(70, Gender::Female));
//!
//! assert_eq!(analysis.heart_rate, 110);
//! assert_eq!(analysis.risk_level, RiskLevel::High);
//! ```

pub mod audit;
pub mod collector;
pub mod config;
pub mod core;
pub mod session;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use audit::{AuditLog, AuditStats, SharedAuditLog};
pub use collector::{
    CollectorConfig, CollectorError, FrameCollector, Gender, PatientContext, Sample,
    SampleSource, SimulatedCollector,
};
pub use config::{Config, ConfigError};
pub use core::{
    analyze, classify, render_report, Abnormality, ClassificationResult, EcgAnalysis,
    ReportView, Rhythm, RiskLevel,
};
pub use session::{RecordingSession, SessionError, SessionOutcome};
pub use store::{
    EcgReport, EcgStore, JsonFileStore, MemoryStore, PatientRepository, ReportRepository,
    StoreError,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Screening disclaimer that can be displayed to users.
pub const SCREENING_DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              ECG REPORT AGENT - SCREENING DISCLAIMER             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This tool provides an initial screening from a 30-second        ║
║  single-lead ECG recording.                                      ║
║                                                                  ║
║  ✓ WHAT IT REPORTS:                                              ║
║    • Average heart rate over the recording                       ║
║    • Slow (below 60 bpm) or fast (above 100 bpm) heart rate      ║
║    • An age-related concern for patients over 65                 ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT DO:                                          ║
║    • Diagnose any heart condition                                ║
║    • Detect arrhythmias beyond heart rate                        ║
║    • Replace a full 12-lead ECG                                  ║
║                                                                  ║
║  Always consult a healthcare professional for medical advice.    ║
║                                                                  ║
║  You can view recording statistics anytime with:                 ║
║    ecg-report status                                             ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screening_disclaimer_contents() {
        assert!(SCREENING_DISCLAIMER.contains("DISCLAIMER"));
        assert!(SCREENING_DISCLAIMER.contains("initial screening"));
        assert!(SCREENING_DISCLAIMER.contains("12-lead"));
    }
}
