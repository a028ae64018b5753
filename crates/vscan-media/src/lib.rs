#![deny(unreachable_patterns)]
//! On-device sensitive content detection.
//!
//! This crate provides:
//! - Letterbox preprocessing with EXIF orientation
//! - Dual-pass decoding of `[4 + C, N]` detector output
//! - Class-agnostic NMS with class-matched merging of recovered boxes
//! - A detector registry with per-handle inference locking
//! - A video scan engine with five sampling strategies

pub mod asset;
pub mod classes;
pub mod decode;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod nms;
pub mod preprocess;
pub mod presence;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod runtime;
pub mod scan;

pub use asset::{FfmpegVideo, VideoAsset};
pub use detector::{DetectorConfig, DetectorHandle, DetectorSpec, SensitiveClasses};
pub use error::{MediaError, MediaResult};
pub use preprocess::ImageSource;
pub use presence::{AssumeHuman, HumanPresence, SkinToneCheck};
pub use probe::{probe_video, VideoInfo};
pub use progress::{ProgressCallback, ScanPhase, ScanProgress};
pub use registry::DetectorRegistry;
#[cfg(feature = "onnx")]
pub use runtime::OrtRuntime;
pub use runtime::ModelRuntime;
pub use scan::{analyze_video, CancellationToken, FrameAnalyzer, ScanConfig, ScanEngine};
