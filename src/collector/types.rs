//! Sample and patient types shared by every recording source.
//!
//! A recording is a sequence of [`Sample`]s. Only the heart-rate readings feed
//! the analysis; the raw amplitude is kept as the waveform of the report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One observed data point from an ECG device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Raw signal amplitude
    pub value: i32,
    /// Instantaneous heart rate in bpm, if the device reported one
    #[serde(
        default,
        rename = "heartRate",
        alias = "heart_rate",
        skip_serializing_if = "Option::is_none"
    )]
    pub heart_rate: Option<u32>,
}

impl Sample {
    pub fn new(timestamp: i64, value: i32, heart_rate: Option<u32>) -> Self {
        Self {
            timestamp,
            value,
            heart_rate,
        }
    }

    /// A waveform point without a heart-rate reading.
    pub fn waveform(timestamp: i64, value: i32) -> Self {
        Self::new(timestamp, value, None)
    }

    /// The heart-rate reading, if the device reported a usable one.
    ///
    /// A reading of 0 means the device had no lock and counts as absent.
    pub fn reading(&self) -> Option<u32> {
        self.heart_rate.filter(|&hr| hr > 0)
    }
}

/// Patient gender as captured on the patient information step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a gender string is not one of male/female/other.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gender '{0}' (expected male, female or other)")]
pub struct ParseGenderError(pub String);

impl FromStr for Gender {
    type Err = ParseGenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(ParseGenderError(s.to_string())),
        }
    }
}

/// Demographics supplied alongside a recording. Never derived from samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientContext {
    pub age: u32,
    pub gender: Gender,
}

impl PatientContext {
    pub fn new(age: u32, gender: Gender) -> Self {
        Self { age, gender }
    }
}
