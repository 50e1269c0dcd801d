//! Reduction of a recording to a single heart rate.
//!
//! Samples are gathered into a [`Recording`] for the length of a session and
//! then reduced by [`aggregate_heart_rate`]. Order does not matter.

use crate::collector::types::Sample;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Heart rate reported when no sample carries a reading.
///
/// This is a fallback policy, not a measurement or an error signal.
pub const DEFAULT_HEART_RATE: u32 = 75;

/// Average the heart-rate readings of a recording.
///
/// Samples without a reading (or with a zero reading) are skipped. The mean is rounded half-up using
/// integer arithmetic so ties resolve the same way on every call.
pub fn aggregate_heart_rate(samples: &[Sample]) -> u32 {
    let (sum, count) = samples
        .iter()
        .filter_map(Sample::reading)
        .fold((0u64, 0u64), |(sum, count), hr| (sum + hr as u64, count + 1));

    if count == 0 {
        return DEFAULT_HEART_RATE;
    }

    ((2 * sum + count) / (2 * count)) as u32
}

/// Descriptive statistics of a recording, kept alongside a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Number of samples in the recording
    pub sample_count: usize,
    /// Number of samples carrying a heart-rate reading
    pub heart_rate_count: usize,
    /// Lowest heart-rate reading
    pub min_heart_rate: Option<u32>,
    /// Highest heart-rate reading
    pub max_heart_rate: Option<u32>,
    /// Population standard deviation of heart-rate readings
    pub heart_rate_std_dev: Option<f64>,
    /// Smallest and largest raw amplitude
    pub amplitude_range: Option<(i32, i32)>,
}

impl SampleStats {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let rates: Vec<f64> = samples
            .iter()
            .filter_map(Sample::reading)
            .map(|hr| hr as f64)
            .collect();

        let heart_rate_std_dev = if rates.is_empty() {
            None
        } else {
            Some(rates.iter().population_std_dev())
        };

        let amplitude_range = samples
            .iter()
            .map(|s| s.value)
            .fold(None, |range: Option<(i32, i32)>, v| match range {
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                None => Some((v, v)),
            });

        Self {
            sample_count: samples.len(),
            heart_rate_count: rates.len(),
            min_heart_rate: samples.iter().filter_map(Sample::reading).min(),
            max_heart_rate: samples.iter().filter_map(Sample::reading).max(),
            heart_rate_std_dev,
            amplitude_range,
        }
    }
}

/// The samples of one recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Start time of the recording
    pub start: DateTime<Utc>,
    /// Planned end time of the recording
    pub end: DateTime<Utc>,
    /// Samples received so far
    pub samples: Vec<Sample>,
    /// Samples whose timestamp fell outside the planned window
    pub out_of_window: usize,
}

impl Recording {
    /// Create an empty recording starting at `start`.
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start,
            end: start + duration,
            samples: Vec::new(),
            out_of_window: 0,
        }
    }

    /// Check if a sample timestamp (ms since epoch) falls within this recording.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        match Utc.timestamp_millis_opt(timestamp_ms).single() {
            Some(ts) => ts >= self.start && ts < self.end,
            None => false,
        }
    }

    /// Add a sample. Samples outside the window are kept but counted.
    pub fn add_sample(&mut self, sample: Sample) {
        if !self.contains(sample.timestamp) {
            self.out_of_window += 1;
        }
        self.samples.push(sample);
    }

    pub fn extend<I: IntoIterator<Item = Sample>>(&mut self, samples: I) {
        for sample in samples {
            self.add_sample(sample);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Get the planned duration of this recording in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    /// Average heart rate of the samples collected so far.
    pub fn heart_rate(&self) -> u32 {
        aggregate_heart_rate(&self.samples)
    }

    pub fn stats(&self) -> SampleStats {
        SampleStats::from_samples(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hr(values: &[u32]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &hr)| Sample::new(i as i64, 0, Some(hr)))
            .collect()
    }

    #[test]
    fn test_empty_recording_uses_default() {
        assert_eq!(aggregate_heart_rate(&[]), DEFAULT_HEART_RATE);
    }

    #[test]
    fn test_waveform_only_uses_default() {
        let samples = vec![Sample::waveform(0, 100), Sample::waveform(1, -100)];
        assert_eq!(aggregate_heart_rate(&samples), 75);
    }

    #[test]
    fn test_mean_of_readings() {
        assert_eq!(aggregate_heart_rate(&hr(&[55, 57])), 56);
        assert_eq!(aggregate_heart_rate(&hr(&[110])), 110);
    }

    #[test]
    fn test_rounding_half_up() {
        assert_eq!(aggregate_heart_rate(&hr(&[55, 56])), 56);
        assert_eq!(aggregate_heart_rate(&hr(&[60, 60, 61])), 60);
        assert_eq!(aggregate_heart_rate(&hr(&[60, 61, 61])), 61);
    }

    #[test]
    fn test_samples_without_reading_are_excluded() {
        let mut samples = hr(&[80, 90]);
        samples.push(Sample::waveform(10, 5));
        assert_eq!(aggregate_heart_rate(&samples), 85);
    }

    #[test]
    fn test_zero_readings_are_excluded() {
        let samples = vec![Sample::new(0, 16, Some(80)), Sample::new(1, 16, Some(0))];
        assert_eq!(aggregate_heart_rate(&samples), 80);

        let stats = SampleStats::from_samples(&samples);
        assert_eq!(stats.heart_rate_count, 1);
        assert_eq!(stats.min_heart_rate, Some(80));

        let only_zero = vec![Sample::new(0, 0, Some(0))];
        assert_eq!(aggregate_heart_rate(&only_zero), DEFAULT_HEART_RATE);
    }

    #[test]
    fn test_order_does_not_matter() {
        let forward = hr(&[61, 70, 99, 100]);
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(aggregate_heart_rate(&forward), aggregate_heart_rate(&reversed));
    }

    #[test]
    fn test_sample_stats() {
        let mut samples = hr(&[70, 80]);
        samples.push(Sample::waveform(5, -300));
        let stats = SampleStats::from_samples(&samples);

        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.heart_rate_count, 2);
        assert_eq!(stats.min_heart_rate, Some(70));
        assert_eq!(stats.max_heart_rate, Some(80));
        assert!((stats.heart_rate_std_dev.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(stats.amplitude_range, Some((-300, 0)));
    }

    #[test]
    fn test_sample_stats_empty() {
        let stats = SampleStats::from_samples(&[]);
        assert_eq!(stats, SampleStats::default());
    }

    #[test]
    fn test_recording_window() {
        let start = Utc.timestamp_millis_opt(1_000_000).unwrap();
        let mut recording = Recording::new(start, Duration::seconds(30));

        recording.add_sample(Sample::new(1_000_100, 0, Some(70)));
        recording.add_sample(Sample::new(1_031_000, 0, Some(90)));

        assert_eq!(recording.sample_count(), 2);
        assert_eq!(recording.out_of_window, 1);
        assert_eq!(recording.heart_rate(), 80);
        assert_eq!(recording.duration_secs(), 30.0);
    }
}
