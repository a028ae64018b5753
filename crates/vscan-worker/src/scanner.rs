//! Image and video jobs against a loaded detector.

use std::path::Path;

use tracing::{debug, info};
use vscan_media::{
    CancellationToken, DetectorHandle, DetectorRegistry, ImageSource, ScanConfig, ScanEngine, ScanProgress,
    VideoAsset,
};
use vscan_models::{DetectorId, ImageDetections, ModelInfo, VideoResult};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Owns the registry and the id of the detector jobs run against.
pub struct Scanner {
    registry: DetectorRegistry,
    detector: DetectorId,
    confidence: f32,
    iou: f32,
}

impl Scanner {
    /// Load the configured ONNX model.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        config.validate()?;
        let registry = DetectorRegistry::new();
        let detector = registry.load(&config.detector_spec())?;
        Ok(Self {
            registry,
            detector,
            confidence: config.detector.confidence_threshold,
            iou: config.detector.iou_threshold,
        })
    }

    /// Use an already-built handle.
    pub fn with_handle(handle: DetectorHandle) -> WorkerResult<Self> {
        let confidence = handle.config().confidence_threshold;
        let iou = handle.config().iou_threshold;
        let registry = DetectorRegistry::new();
        let detector = registry.insert(handle)?;
        Ok(Self {
            registry,
            detector,
            confidence,
            iou,
        })
    }

    pub fn model_info(&self) -> WorkerResult<ModelInfo> {
        Ok(self.registry.model_info(&self.detector)?)
    }

    /// detect-image on a file, falling back to configured thresholds.
    pub fn scan_image(&self, path: &Path, confidence: Option<f32>, iou: Option<f32>) -> WorkerResult<ImageDetections> {
        let result = self.registry.detect_image(
            &self.detector,
            ImageSource::from_path(path),
            confidence.unwrap_or(self.confidence),
            iou.unwrap_or(self.iou),
        )?;

        info!(
            path = %path.display(),
            detections = result.detections.len(),
            total_ms = result.timings.total_ms,
            "Image scanned"
        );
        Ok(result)
    }

    /// analyze-video with cooperative cancellation and progress logging.
    pub fn scan_video(
        &self,
        asset: &dyn VideoAsset,
        scan: ScanConfig,
        cancel: CancellationToken,
    ) -> WorkerResult<VideoResult> {
        let handle = self.registry.get(&self.detector)?;
        info!(
            mode = %scan.mode,
            strategy = scan.mode.description(),
            duration_secs = asset.duration_secs(),
            "Scanning video"
        );
        let engine = ScanEngine::new(handle.as_ref(), scan)
            .with_cancellation(cancel)
            .with_progress(Box::new(|p: ScanProgress| {
                debug!(
                    phase = ?p.phase,
                    progress = format!("{:.0}%", p.percentage()),
                    frames = p.frames_done,
                    "Scan progress"
                );
            }));

        Ok(engine.run(asset)?)
    }
}
