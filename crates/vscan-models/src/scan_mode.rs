//! Scan mode definitions for video analysis.
//!
//! Modes trade thoroughness for time budget:
//!
//! - `QuickCheck`: three frames (start, middle, end)
//! - `Sampled`: fixed interval, every sample analyzed
//! - `FullShortCircuit`: fixed interval, stops at the first sensitive frame
//! - `Thorough`: human-presence pre-filter, then full detection on hits
//! - `BinarySearch`: frontier expansion outward from the midpoint

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Video scanning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Start, middle and end frames only.
    QuickCheck,

    /// Every `sample_interval` seconds, no early exit.
    #[default]
    Sampled,

    /// Same timestamps as `Sampled`, stops after the first sensitive frame.
    FullShortCircuit,

    /// Human-presence pass, then full detection on frames with people.
    Thorough,

    /// Outward search from the midpoint, expanding only around hits.
    BinarySearch,
}

impl ScanMode {
    /// All available scan modes.
    pub const ALL: &'static [ScanMode] = &[
        ScanMode::QuickCheck,
        ScanMode::Sampled,
        ScanMode::FullShortCircuit,
        ScanMode::Thorough,
        ScanMode::BinarySearch,
    ];

    /// Returns the mode name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::QuickCheck => "quick_check",
            ScanMode::Sampled => "sampled",
            ScanMode::FullShortCircuit => "full_short_circuit",
            ScanMode::Thorough => "thorough",
            ScanMode::BinarySearch => "binary_search",
        }
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ScanMode::QuickCheck => "Three frames: start, middle, end",
            ScanMode::Sampled => "Fixed-interval sampling of the whole video",
            ScanMode::FullShortCircuit => "Fixed-interval sampling, stop at first hit",
            ScanMode::Thorough => "Human pre-filter, then full detection",
            ScanMode::BinarySearch => "Expand outward from the midpoint around hits",
        }
    }

    /// Returns true if the scan stops at the first sensitive frame.
    pub fn short_circuits(&self) -> bool {
        matches!(self, ScanMode::FullShortCircuit)
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = ScanModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "quick_check" | "quick" => Ok(ScanMode::QuickCheck),
            "sampled" => Ok(ScanMode::Sampled),
            "full_short_circuit" | "full" => Ok(ScanMode::FullShortCircuit),
            "thorough" => Ok(ScanMode::Thorough),
            "binary_search" | "binary" => Ok(ScanMode::BinarySearch),
            _ => Err(ScanModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown scan mode: {0}")]
pub struct ScanModeParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&ScanMode::FullShortCircuit).unwrap(),
            "\"full_short_circuit\""
        );
        assert_eq!(
            serde_json::to_string(&ScanMode::BinarySearch).unwrap(),
            "\"binary_search\""
        );
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("quick_check".parse::<ScanMode>().unwrap(), ScanMode::QuickCheck);
        assert_eq!("binary-search".parse::<ScanMode>().unwrap(), ScanMode::BinarySearch);
        assert_eq!("THOROUGH".parse::<ScanMode>().unwrap(), ScanMode::Thorough);
        assert!("exhaustive".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_round_trip_names() {
        for mode in ScanMode::ALL {
            assert_eq!(mode.as_str().parse::<ScanMode>().unwrap(), *mode);
        }
    }

    #[test]
    fn test_short_circuit_flag() {
        assert!(ScanMode::FullShortCircuit.short_circuits());
        assert!(!ScanMode::Sampled.short_circuits());
    }
}
