//! Audit module for the ECG agent.
//!
//! Tracks how much recording activity the agent has handled, for display
//! with `ecg-report status` and for persistence across runs.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, AuditLog, AuditStats, SharedAuditLog,
};
