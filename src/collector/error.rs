//! Errors raised by recording sources.

/// Errors that can occur while collecting samples.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    #[error("Collector has already been started")]
    AlreadyRunning,
    #[error("Sample stream is closed")]
    Disconnected,
    #[error("Malformed notification frame ({0} bytes, need at least 2)")]
    MalformedFrame(usize),
    #[error("Invalid hex in notification frame: {0}")]
    InvalidHex(String),
}
