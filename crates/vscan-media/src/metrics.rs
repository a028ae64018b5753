//! Scanner metrics.
//!
//! Recorded through the `metrics` facade; the binary decides whether an
//! exporter is installed.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Images run through detect-image, by outcome.
    pub const IMAGES_TOTAL: &str = "vscan_images_total";

    /// Video frames analyzed, by scan mode.
    pub const FRAMES_ANALYZED_TOTAL: &str = "vscan_frames_analyzed_total";

    /// Video frames skipped after a frame-local failure, by scan mode.
    pub const FRAMES_SKIPPED_TOTAL: &str = "vscan_frames_skipped_total";

    /// Completed video scans, by scan mode and verdict.
    pub const SCANS_TOTAL: &str = "vscan_scans_total";

    /// Single detection latency in seconds, by stage.
    pub const DETECT_LATENCY_SECONDS: &str = "vscan_detect_latency_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a detect-image call.
pub fn record_image(ok: bool) {
    counter!(
        names::IMAGES_TOTAL,
        "outcome" => if ok { "ok" } else { "error" }
    )
    .increment(1);
}

/// Record stage latencies of one detection.
pub fn record_detect_latency(preprocess_ms: f64, inference_ms: f64, postprocess_ms: f64) {
    for (stage, ms) in [
        ("preprocess", preprocess_ms),
        ("inference", inference_ms),
        ("postprocess", postprocess_ms),
    ] {
        histogram!(names::DETECT_LATENCY_SECONDS, "stage" => stage).record(ms / 1000.0);
    }
}

/// Record one analyzed frame.
pub fn record_frame_analyzed(mode: &str) {
    counter!(names::FRAMES_ANALYZED_TOTAL, "mode" => mode.to_string()).increment(1);
}

/// Record one skipped frame.
pub fn record_frame_skipped(mode: &str) {
    counter!(names::FRAMES_SKIPPED_TOTAL, "mode" => mode.to_string()).increment(1);
}

/// Record a finished scan.
pub fn record_scan(mode: &str, is_sensitive: bool) {
    counter!(
        names::SCANS_TOTAL,
        "mode" => mode.to_string(),
        "sensitive" => is_sensitive.to_string()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::FRAMES_ANALYZED_TOTAL.starts_with("vscan_"));
        assert!(names::FRAMES_SKIPPED_TOTAL.contains("skipped"));
        assert!(names::DETECT_LATENCY_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_image(true);
        record_detect_latency(1.0, 2.0, 3.0);
        record_frame_analyzed("sampled");
        record_frame_skipped("sampled");
        record_scan("sampled", false);
    }
}
