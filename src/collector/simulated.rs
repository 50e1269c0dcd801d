//! Simulated ECG source.
//!
//! Used when no device is connected. Emits a synthetic waveform with a slowly
//! drifting heart rate at a fixed sampling interval, then closes the stream.

use crate::collector::error::CollectorError;
use crate::collector::types::Sample;
use crate::collector::SampleSource;
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the simulated waveform.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Total length of the recording
    pub duration: Duration,
    /// Time between consecutive samples
    pub sample_interval: Duration,
    /// Heart rate the simulation oscillates around
    pub base_heart_rate: f64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            sample_interval: Duration::from_millis(100),
            base_heart_rate: 75.0,
        }
    }
}

impl CollectorConfig {
    /// Number of samples a full recording produces.
    ///
    /// The first sample is emitted one interval after the start and the
    /// stream ends once the elapsed time reaches the duration.
    pub fn expected_samples(&self) -> usize {
        let interval = self.sample_interval.as_millis().max(1);
        let total = self.duration.as_millis();
        if total == 0 {
            return 0;
        }
        ((total - 1) / interval) as usize
    }
}

/// Incremental waveform generator.
#[derive(Debug, Clone)]
struct Waveform {
    base: f64,
    heart_rate: f64,
}

impl Waveform {
    fn new(base: f64) -> Self {
        Self {
            base,
            heart_rate: base,
        }
    }

    /// Produce the sample for `elapsed_ms` into the recording.
    fn next(&mut self, timestamp: i64, elapsed_ms: u128) -> Sample {
        let t = elapsed_ms as f64 / 1000.0;
        let hr = self.heart_rate;
        let value =
            (t * 2.0 * PI * hr / 60.0).sin() * 1000.0 + (t * 6.0 * PI * hr / 60.0).sin() * 200.0;

        self.heart_rate = self.base + (t * 0.1).sin() * 5.0;

        Sample::new(
            timestamp,
            value.round() as i32,
            Some(self.heart_rate.round().max(0.0) as u32),
        )
    }
}

/// Generate a complete simulated recording without spawning a thread.
///
/// Timestamps start at `start_ms` and advance by the sampling interval.
pub fn simulate_samples(config: &CollectorConfig, start_ms: i64) -> Vec<Sample> {
    let interval = config.sample_interval.as_millis().max(1);
    let mut waveform = Waveform::new(config.base_heart_rate);

    (1..=config.expected_samples())
        .map(|i| {
            let elapsed = i as u128 * interval;
            waveform.next(start_ms + elapsed as i64, elapsed)
        })
        .collect()
}

/// A collector that streams a simulated waveform from a background thread.
pub struct SimulatedCollector {
    config: CollectorConfig,
    sender: Option<Sender<Sample>>,
    receiver: Receiver<Sample>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedCollector {
    /// Create a new simulated collector.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Try to receive a sample without blocking.
    pub fn try_recv(&self) -> Option<Sample> {
        self.receiver.try_recv().ok()
    }
}

impl SampleSource for SimulatedCollector {
    /// Start streaming samples.
    ///
    /// A collector produces a single recording; starting it twice fails.
    fn start(&mut self) -> Result<(), CollectorError> {
        let sender = self.sender.take().ok_or(CollectorError::AlreadyRunning)?;
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let config = self.config.clone();
        let handle = thread::spawn(move || {
            let interval = config.sample_interval.max(Duration::from_millis(1));
            let mut waveform = Waveform::new(config.base_heart_rate);
            let started = std::time::Instant::now();
            let start_ms = Utc::now().timestamp_millis();

            for i in 1..=config.expected_samples() {
                let due = interval * i as u32;
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    thread::sleep(wait);
                }
                if !running.load(Ordering::SeqCst) {
                    tracing::debug!("Simulated collector stopped after {} samples", i - 1);
                    break;
                }

                let elapsed = due.as_millis();
                let sample = waveform.next(start_ms + elapsed as i64, elapsed);
                if sender.send(sample).is_err() {
                    break;
                }
            }

            running.store(false, Ordering::SeqCst);
            // Dropping the sender closes the stream for the consumer.
        });

        self.handle = Some(handle);
        tracing::debug!(
            "Simulated collector started ({}s at {}ms intervals)",
            self.config.duration.as_secs(),
            self.config.sample_interval.as_millis()
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<Sample> {
        &self.receiver
    }
}

impl Drop for SimulatedCollector {
    fn drop(&mut self) {
        self.stop();
    }
}
