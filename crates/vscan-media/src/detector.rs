//! Detector handles and the detect-image pipeline.
//!
//! A [`DetectorHandle`] owns one model runtime plus the class metadata
//! needed to decode its output. The runtime sits behind a handle-scoped
//! mutex so distinct handles run in parallel while calls on one handle are
//! serialized.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use image::RgbImage;
use tracing::debug;
use vscan_models::{DetectionTimings, DetectorId, FrameResult, ImageDetections, ModelInfo};

use crate::classes::{default_class_labels, resolve_sensitive, validate_sensitive, DEFAULT_SENSITIVE_LABELS};
use crate::decode::{decode_primary, decode_sensitive, OutputGeometry};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::nms::{merge_recovered, non_maximum_suppression};
use crate::preprocess::{letterbox, ImageSource};
use crate::runtime::ModelRuntime;
use crate::scan::FrameAnalyzer;

/// Detection thresholds and model geometry.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Model input edge length `S`
    pub input_size: u32,
    /// Default confidence threshold for callers that do not pass one
    pub confidence_threshold: f32,
    /// Default IoU threshold for NMS
    pub iou_threshold: f32,
    /// Cap on detections returned per image, applied after merging
    pub max_detections: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 320,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            input_size: std::env::var("VSCAN_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.input_size),
            confidence_threshold: std::env::var("VSCAN_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: std::env::var("VSCAN_IOU")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.iou_threshold),
            max_detections: std::env::var("VSCAN_MAX_DETECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_detections),
        }
    }

    pub fn validate(&self) -> MediaResult<()> {
        if self.input_size == 0 {
            return Err(MediaError::invalid_config("input_size must be positive"));
        }
        if self.max_detections == 0 {
            return Err(MediaError::invalid_config("max_detections must be positive"));
        }
        check_thresholds(self.confidence_threshold, self.iou_threshold)
    }
}

fn check_thresholds(confidence: f32, iou: f32) -> MediaResult<()> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(MediaError::invalid_config(format!(
            "confidence threshold {} outside [0, 1]",
            confidence
        )));
    }
    if !(0.0..=1.0).contains(&iou) {
        return Err(MediaError::invalid_config(format!("IoU threshold {} outside [0, 1]", iou)));
    }
    Ok(())
}

/// Which classes count as sensitive.
#[derive(Debug, Clone, Default)]
pub enum SensitiveClasses {
    /// Exposed-anatomy labels of the default class set
    #[default]
    Defaults,
    /// Label names, resolved case-insensitively
    Names(Vec<String>),
    /// Raw class indices
    Indices(Vec<usize>),
}

impl SensitiveClasses {
    /// Resolve to sorted, de-duplicated indices into `labels`.
    pub fn resolve(&self, labels: &[String]) -> MediaResult<Vec<usize>> {
        match self {
            SensitiveClasses::Defaults => resolve_sensitive(labels, DEFAULT_SENSITIVE_LABELS),
            SensitiveClasses::Names(names) => resolve_sensitive(labels, names),
            SensitiveClasses::Indices(indices) => validate_sensitive(labels.len(), indices),
        }
    }
}

/// Everything needed to load a detector from disk.
#[derive(Debug, Clone)]
pub struct DetectorSpec {
    pub model_path: PathBuf,
    /// Class labels in model output order; defaults to the built-in set
    pub class_labels: Option<Vec<String>>,
    pub sensitive: SensitiveClasses,
    pub config: DetectorConfig,
}

impl DetectorSpec {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            class_labels: None,
            sensitive: SensitiveClasses::Defaults,
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.class_labels = Some(labels);
        self
    }

    pub fn with_sensitive(mut self, sensitive: SensitiveClasses) -> Self {
        self.sensitive = sensitive;
        self
    }
}

/// A loaded detection model.
pub struct DetectorHandle {
    id: DetectorId,
    runtime: Mutex<Box<dyn ModelRuntime>>,
    runtime_name: &'static str,
    class_labels: Vec<String>,
    sensitive_classes: Vec<usize>,
    config: DetectorConfig,
}

impl std::fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("id", &self.id)
            .field("runtime", &self.runtime_name)
            .field("num_classes", &self.class_labels.len())
            .field("input_size", &self.config.input_size)
            .finish()
    }
}

impl DetectorHandle {
    /// Wrap an already-constructed runtime.
    pub fn new(
        runtime: Box<dyn ModelRuntime>,
        class_labels: Vec<String>,
        sensitive: &SensitiveClasses,
        config: DetectorConfig,
    ) -> MediaResult<Self> {
        config.validate()?;
        if class_labels.is_empty() {
            return Err(MediaError::invalid_config("class label list is empty"));
        }
        let sensitive_classes = sensitive.resolve(&class_labels)?;
        let runtime_name = runtime.name();

        Ok(Self {
            id: DetectorId::new(),
            runtime: Mutex::new(runtime),
            runtime_name,
            class_labels,
            sensitive_classes,
            config,
        })
    }

    /// Load an ONNX model described by `spec`.
    #[cfg(feature = "onnx")]
    pub fn load(spec: &DetectorSpec) -> MediaResult<Self> {
        let runtime = crate::runtime::OrtRuntime::load(&spec.model_path)?;
        let labels = spec.class_labels.clone().unwrap_or_else(default_class_labels);
        let handle = Self::new(Box::new(runtime), labels, &spec.sensitive, spec.config.clone())?;

        tracing::info!(
            detector_id = %handle.id,
            model_path = %spec.model_path.display(),
            input_size = handle.config.input_size,
            num_classes = handle.class_labels.len(),
            sensitive = ?handle.sensitive_classes,
            "Detector loaded"
        );
        Ok(handle)
    }

    /// Built-in label set with the given runtime.
    pub fn with_default_classes(runtime: Box<dyn ModelRuntime>, config: DetectorConfig) -> MediaResult<Self> {
        Self::new(runtime, default_class_labels(), &SensitiveClasses::Defaults, config)
    }

    pub fn id(&self) -> &DetectorId {
        &self.id
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn sensitive_classes(&self) -> &[usize] {
        &self.sensitive_classes
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            input_size: self.config.input_size,
            class_labels: self.class_labels.clone(),
            sensitive_classes: self.sensitive_classes.clone(),
            runtime: self.runtime_name.to_string(),
        }
    }

    /// Run detect-image on any supported source.
    pub fn detect_image(&self, source: ImageSource, confidence: f32, iou: f32) -> MediaResult<ImageDetections> {
        let start = Instant::now();
        let result = source
            .load()
            .and_then(|image| self.detect_pixels_from(&image, confidence, iou, start));
        metrics::record_image(result.is_ok());
        result
    }

    /// Run detect-image on decoded, oriented pixels.
    pub fn detect_pixels(&self, image: &RgbImage, confidence: f32, iou: f32) -> MediaResult<ImageDetections> {
        self.detect_pixels_from(image, confidence, iou, Instant::now())
    }

    fn detect_pixels_from(
        &self,
        image: &RgbImage,
        confidence: f32,
        iou: f32,
        start: Instant,
    ) -> MediaResult<ImageDetections> {
        check_thresholds(confidence, iou)?;
        let input_size = self.config.input_size;

        let letterboxed = letterbox(image, input_size)?;
        let geometry = OutputGeometry {
            num_classes: self.class_labels.len(),
            input_size,
            orig_width: letterboxed.orig_width,
            orig_height: letterboxed.orig_height,
        };
        let chw = letterboxed.to_chw();
        drop(letterboxed);
        let preprocess_done = Instant::now();

        let output = {
            let mut runtime = self
                .runtime
                .lock()
                .map_err(|_| MediaError::model_not_loaded(self.id.to_string()))?;
            runtime.run(chw, input_size)?
        };
        let inference_done = Instant::now();

        let mut primary = decode_primary(&output, &geometry, &self.class_labels)?;
        primary.retain(|d| d.score > confidence);
        let recovered = decode_sensitive(&output, &geometry, &self.class_labels, confidence, &self.sensitive_classes)?;
        drop(output);

        let kept = non_maximum_suppression(primary, iou);
        let recovered = non_maximum_suppression(recovered, iou);
        let mut detections = merge_recovered(kept, recovered);
        detections.truncate(self.config.max_detections);
        let done = Instant::now();

        let timings = DetectionTimings {
            preprocess_ms: ms_between(start, preprocess_done),
            inference_ms: ms_between(preprocess_done, inference_done),
            postprocess_ms: ms_between(inference_done, done),
            total_ms: ms_between(start, done),
        };
        metrics::record_detect_latency(timings.preprocess_ms, timings.inference_ms, timings.postprocess_ms);

        debug!(
            detector_id = %self.id,
            detections = detections.len(),
            total_ms = timings.total_ms,
            "Detection complete"
        );

        Ok(ImageDetections {
            detections,
            timings,
            image_width: geometry.orig_width,
            image_height: geometry.orig_height,
        })
    }
}

impl FrameAnalyzer for DetectorHandle {
    fn analyze_frame(
        &self,
        frame: &RgbImage,
        timestamp_secs: f64,
        confidence: f32,
        iou: f32,
    ) -> MediaResult<FrameResult> {
        let result = self.detect_pixels(frame, confidence, iou)?;
        Ok(FrameResult::from_detections(
            timestamp_secs,
            result.detections,
            &self.sensitive_classes,
            result.timings.total_ms,
        ))
    }
}

fn ms_between(from: Instant, to: Instant) -> f64 {
    to.duration_since(from).as_secs_f64() * 1000.0
}
