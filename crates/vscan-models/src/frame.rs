//! Per-frame scan result.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Detection outcome for one sampled video frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FrameResult {
    pub timestamp_secs: f64,
    /// True iff at least one detection belongs to a sensitive class
    pub is_sensitive: bool,
    /// Highest sensitive score, 0 for non-sensitive frames
    pub confidence: f32,
    pub detections: Vec<Detection>,
    pub processing_time_ms: f64,
}

impl FrameResult {
    /// Build a frame result, deriving sensitivity from `sensitive_classes`.
    pub fn from_detections(
        timestamp_secs: f64,
        detections: Vec<Detection>,
        sensitive_classes: &[usize],
        processing_time_ms: f64,
    ) -> Self {
        let confidence = detections
            .iter()
            .filter(|d| sensitive_classes.contains(&d.class_index))
            .map(|d| d.score)
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));

        Self {
            timestamp_secs,
            is_sensitive: confidence.is_some(),
            confidence: confidence.unwrap_or(0.0),
            detections,
            processing_time_ms,
        }
    }
}
