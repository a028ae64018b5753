//! Scan progress reporting.

use serde::{Deserialize, Serialize};

/// Which part of a scan is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Thorough mode phase 1, cheap human-presence check
    HumanPrefilter,
    /// Full detection on sampled frames
    Detection,
}

/// Progress information for one analyze-video call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Overall completion in [0, 1]
    pub fraction: f64,
    pub phase: ScanPhase,
    /// Frames processed so far in this phase
    pub frames_done: usize,
}

impl ScanProgress {
    /// Progress through `done` of `total` items, mapped into `[start, end]`.
    pub fn within(phase: ScanPhase, done: usize, total: usize, start: f64, end: f64) -> Self {
        let local = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).min(1.0)
        };
        Self {
            fraction: start + (end - start) * local,
            phase,
            frames_done: done,
        }
    }

    /// Percentage, for log lines.
    pub fn percentage(&self) -> f64 {
        (self.fraction * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + 'static>;
