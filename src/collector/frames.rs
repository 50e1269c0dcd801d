//! Device notification frames.
//!
//! ECG devices push characteristic-value notifications. Each frame carries a
//! little-endian 16-bit amplitude and, optionally, a one-byte heart rate.
//! [`FrameCollector`] turns those callbacks into a sample stream.

use crate::collector::error::CollectorError;
use crate::collector::types::Sample;
use crate::collector::SampleSource;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Heart Rate GATT service.
pub const ECG_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);

/// Heart Rate Measurement characteristic.
pub const ECG_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);

/// Advertised name prefixes accepted during device discovery.
pub const DEVICE_NAME_PREFIXES: [&str; 3] = ["ECG", "Heart", "Cardio"];

/// Check whether an advertised device name looks like a supported ECG device.
pub fn is_compatible_device(name: &str) -> bool {
    DEVICE_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Decode one notification frame received at `timestamp` (ms since epoch).
pub fn decode_frame(bytes: &[u8], timestamp: i64) -> Result<Sample, CollectorError> {
    if bytes.len() < 2 {
        return Err(CollectorError::MalformedFrame(bytes.len()));
    }

    let value = i16::from_le_bytes([bytes[0], bytes[1]]) as i32;
    let heart_rate = bytes.get(2).filter(|&&hr| hr > 0).map(|&hr| hr as u32);

    Ok(Sample::new(timestamp, value, heart_rate))
}

/// Parse a hex-encoded frame such as `"18fc48"` or `"18 fc 48"`.
pub fn parse_hex_frame(line: &str) -> Result<Vec<u8>, CollectorError> {
    let digits: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(CollectorError::InvalidHex(line.to_string()));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CollectorError::InvalidHex(line.to_string()))
        })
        .collect()
}

/// A collector fed by device notification callbacks.
///
/// The transport calls [`FrameCollector::push_frame`] for every notification;
/// consumers read decoded samples from [`SampleSource::receiver`].
pub struct FrameCollector {
    sender: Mutex<Option<Sender<Sample>>>,
    receiver: Receiver<Sample>,
    running: Arc<AtomicBool>,
    started: bool,
}

impl FrameCollector {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }

    /// Decode a notification and forward it to the sample stream.
    ///
    /// Frames pushed while the collector is not running are dropped.
    pub fn push_frame(&self, bytes: &[u8], timestamp: i64) -> Result<(), CollectorError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let sample = decode_frame(bytes, timestamp)?;
        let guard = self.sender.lock().map_err(|_| CollectorError::Disconnected)?;
        match guard.as_ref() {
            Some(sender) => sender.send(sample).map_err(|_| CollectorError::Disconnected),
            None => Err(CollectorError::Disconnected),
        }
    }

    /// End the stream. Consumers see the channel close once drained.
    pub fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

impl Default for FrameCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for FrameCollector {
    fn start(&mut self) -> Result<(), CollectorError> {
        if self.started {
            return Err(CollectorError::AlreadyRunning);
        }
        self.started = true;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop accepting notifications and close the stream.
    fn stop(&mut self) {
        self.close();
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<Sample> {
        &self.receiver
    }
}
