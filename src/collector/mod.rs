//! Recording sources for the ECG agent.
//!
//! Sources push [`Sample`]s into a channel; the analysis side only ever sees
//! the receiving end, never the transport.

pub mod error;
pub mod frames;
pub mod simulated;
pub mod types;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

// Re-export commonly used types
pub use error::CollectorError;
pub use frames::{
    decode_frame, is_compatible_device, parse_hex_frame, FrameCollector, ECG_CHARACTERISTIC_UUID,
    ECG_SERVICE_UUID,
};
pub use simulated::{simulate_samples, CollectorConfig, SimulatedCollector};
pub use types::{Gender, ParseGenderError, PatientContext, Sample};

/// A producer of ECG samples.
pub trait SampleSource {
    /// Begin producing samples.
    fn start(&mut self) -> Result<(), CollectorError>;

    /// Stop producing samples and close the stream.
    fn stop(&mut self);

    /// Check if the source is currently producing.
    fn is_running(&self) -> bool;

    /// Get the receiver for produced samples.
    fn receiver(&self) -> &Receiver<Sample>;
}

/// Collect samples until the stream closes or `timeout` elapses.
///
/// `should_continue` is polled between samples; returning false stops the
/// drain early and reports it via the second tuple field.
pub fn drain_recording<F>(
    receiver: &Receiver<Sample>,
    timeout: Duration,
    mut should_continue: F,
) -> (Vec<Sample>, bool)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut samples = Vec::new();

    loop {
        if !should_continue() {
            return (samples, true);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::warn!(
                "Recording timed out after {:?} with {} samples",
                timeout,
                samples.len()
            );
            break;
        }

        match receiver.recv_timeout(remaining.min(Duration::from_millis(100))) {
            Ok(sample) => samples.push(sample),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    (samples, false)
}
