//! Aggregate result of a video scan.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::frame::FrameResult;
use crate::scan_mode::ScanMode;

/// Aggregate over all frames analyzed in one scan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct VideoResult {
    pub is_sensitive: bool,
    pub sensitive_frame_count: usize,
    pub total_frames_analyzed: usize,
    /// Earliest sensitive timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_sensitive_timestamp: Option<f64>,
    /// Sensitive timestamps, ascending
    pub sensitive_timestamps: Vec<f64>,
    /// Max confidence over all analyzed frames
    pub highest_confidence: f32,
    pub scan_mode: ScanMode,
    /// Frames flagged by the thorough-mode pre-filter, 0 in other modes
    pub human_frames_detected: usize,
    /// Cancellation was observed before the scan completed
    pub stopped_early: bool,
    pub video_duration_secs: f64,
}

impl VideoResult {
    /// Aggregate frame results.
    ///
    /// Every scan mode funnels through this routine.
    pub fn aggregate(
        frames: &[FrameResult],
        scan_mode: ScanMode,
        human_frames_detected: usize,
        stopped_early: bool,
        video_duration_secs: f64,
    ) -> Self {
        let mut sensitive_timestamps: Vec<f64> = frames
            .iter()
            .filter(|f| f.is_sensitive)
            .map(|f| f.timestamp_secs)
            .collect();
        sensitive_timestamps.sort_by(|a, b| a.total_cmp(b));

        let highest_confidence = frames
            .iter()
            .map(|f| f.confidence)
            .fold(0.0f32, f32::max);

        Self {
            is_sensitive: !sensitive_timestamps.is_empty(),
            sensitive_frame_count: sensitive_timestamps.len(),
            total_frames_analyzed: frames.len(),
            first_sensitive_timestamp: sensitive_timestamps.first().copied(),
            sensitive_timestamps,
            highest_confidence,
            scan_mode,
            human_frames_detected,
            stopped_early,
            video_duration_secs,
        }
    }
}
