//! Shared data models for the vscan sensitive content scanner.
//!
//! This crate provides Serde-serializable types for:
//! - Per-image detections and timings
//! - Per-frame and per-video scan results
//! - Scan modes for video analysis
//! - Detector identifiers and model metadata

pub mod detection;
pub mod detector;
pub mod frame;
pub mod scan_mode;
pub mod video;

// Re-export common types
pub use detection::{BoundingBox, Detection, DetectionTimings, ImageDetections};
pub use detector::{DetectorId, ModelInfo};
pub use frame::FrameResult;
pub use scan_mode::{ScanMode, ScanModeParseError};
pub use video::VideoResult;
