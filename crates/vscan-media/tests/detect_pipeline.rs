//! End-to-end detect-image and analyze-video through real detector handles
//! backed by a deterministic fake model.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use tempfile::TempDir;
use vscan_media::classes::DEFAULT_CLASS_LABELS;
use vscan_media::{
    DetectorConfig, DetectorHandle, DetectorRegistry, ImageSource, MediaError, MediaResult, ModelRuntime,
    ScanConfig, VideoAsset,
};
use vscan_models::ScanMode;

const INPUT_SIZE: u32 = 64;
const NUM_CLASSES: usize = 18;
const FACE_FEMALE: usize = 1;
const BREAST_EXPOSED: usize = 3;

/// Emits a face box with a weaker exposed-anatomy score on the same anchor
/// whenever the input is bright, nothing otherwise.
struct BrightnessModel;

impl ModelRuntime for BrightnessModel {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn run(&mut self, chw: Vec<f32>, input_size: u32) -> MediaResult<Vec<f32>> {
        assert_eq!(chw.len(), 3 * (input_size * input_size) as usize);
        let mean = chw.iter().sum::<f32>() / chw.len() as f32;

        let anchors = 2;
        let mut out = vec![0.0f32; (4 + NUM_CLASSES) * anchors];
        if mean > 0.25 {
            let mut set = |row: usize, v: f32| out[row * anchors] = v;
            set(0, 16.0);
            set(1, 16.0);
            set(2, 16.0);
            set(3, 16.0);
            set(4 + FACE_FEMALE, 0.95);
            set(4 + BREAST_EXPOSED, 0.7);
        }
        Ok(out)
    }
}

/// Four anchors; the only confident one sits far outside the image.
struct OffImageModel;

impl ModelRuntime for OffImageModel {
    fn name(&self) -> &'static str {
        "off-image"
    }

    fn run(&mut self, _chw: Vec<f32>, _input_size: u32) -> MediaResult<Vec<f32>> {
        let anchors = 4;
        let mut out = vec![0.0f32; (4 + NUM_CLASSES) * anchors];
        for a in 0..anchors {
            out[2 * anchors + a] = 4.0;
            out[3 * anchors + a] = 4.0;
        }
        // anchor 3 at (63, 63) in model space maps past a 128x32 image's bottom edge
        out[3] = 63.0;
        out[anchors + 3] = 63.0;
        out[(4 + BREAST_EXPOSED) * anchors + 3] = 0.9;
        Ok(out)
    }
}

fn config() -> DetectorConfig {
    DetectorConfig {
        input_size: INPUT_SIZE,
        ..DetectorConfig::default()
    }
}

fn bright_handle() -> DetectorHandle {
    DetectorHandle::with_default_classes(Box::new(BrightnessModel), config()).unwrap()
}

fn write_png(dir: &TempDir, name: &str, image: &RgbImage) -> std::path::PathBuf {
    let path = dir.path().join(name);
    image.save(&path).unwrap();
    path
}

#[test]
fn test_detect_image_from_path() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "white.png", &RgbImage::from_pixel(128, 64, Rgb([255, 255, 255])));

    let registry = DetectorRegistry::new();
    let id = registry.insert(bright_handle()).unwrap();
    let result = registry
        .detect_image(&id, ImageSource::from_path(&path), 0.25, 0.45)
        .unwrap();

    assert_eq!(result.image_width, 128);
    assert_eq!(result.image_height, 64);
    assert_eq!(result.detections.len(), 2);

    // Primary arg-max keeps the face; recovery adds the hidden sensitive class
    let face = &result.detections[0];
    assert_eq!(face.class_index, FACE_FEMALE);
    assert_eq!(face.class_name, DEFAULT_CLASS_LABELS[FACE_FEMALE]);
    // (8, 8)-(24, 24) in model space, scale 128 / 64
    assert_eq!((face.bbox.x1, face.bbox.y1, face.bbox.x2, face.bbox.y2), (16.0, 16.0, 48.0, 48.0));

    let exposed = &result.detections[1];
    assert_eq!(exposed.class_index, BREAST_EXPOSED);
    assert!((exposed.score - 0.7).abs() < 1e-6);

    for d in &result.detections {
        assert!(0.0 <= d.bbox.x1 && d.bbox.x1 < d.bbox.x2 && d.bbox.x2 <= 128.0);
        assert!(0.0 <= d.bbox.y1 && d.bbox.y1 < d.bbox.y2 && d.bbox.y2 <= 64.0);
    }
}

#[test]
fn test_detect_image_from_file_uri() {
    let dir = TempDir::new().unwrap();
    let path = write_png(&dir, "white.png", &RgbImage::from_pixel(128, 64, Rgb([255, 255, 255])));
    let uri = url::Url::from_file_path(&path).unwrap().to_string();

    let handle = bright_handle();
    let result = handle.detect_image(ImageSource::Uri(uri), 0.25, 0.45).unwrap();
    assert_eq!(result.detections.len(), 2);
}

#[test]
fn test_dark_image_has_no_detections() {
    let handle = bright_handle();
    let result = handle
        .detect_image(ImageSource::Pixels(RgbImage::new(128, 64)), 0.25, 0.45)
        .unwrap();
    assert!(result.detections.is_empty());
}

#[test]
fn test_missing_file_and_garbage_bytes() {
    let handle = bright_handle();

    let err = handle
        .detect_image(ImageSource::from_path("/no/such/image.jpg"), 0.25, 0.45)
        .unwrap_err();
    assert!(matches!(err, MediaError::FileNotFound(_)));

    let err = handle
        .detect_image(ImageSource::Bytes(b"not an image".to_vec()), 0.25, 0.45)
        .unwrap_err();
    assert!(matches!(err, MediaError::DecodeFailure(_)));
}

#[test]
fn test_anchor_clipped_off_image_yields_nothing() {
    let handle = DetectorHandle::with_default_classes(Box::new(OffImageModel), config()).unwrap();
    // scale = 128 / 64 = 2, so the anchor spans y in [122, 130], below a 32 px tall image
    let result = handle.detect_pixels(&RgbImage::new(128, 32), 0.25, 0.45).unwrap();
    assert!(result.detections.is_empty());
}

#[test]
fn test_handles_run_concurrently() {
    let registry = Arc::new(DetectorRegistry::new());
    let a = registry.insert(bright_handle()).unwrap();
    let b = registry.insert(bright_handle()).unwrap();
    let white = RgbImage::from_pixel(128, 64, Rgb([255, 255, 255]));

    std::thread::scope(|scope| {
        for id in [&a, &b, &a, &b] {
            let registry = registry.clone();
            let image = white.clone();
            scope.spawn(move || {
                let result = registry
                    .detect_image(id, ImageSource::Pixels(image), 0.25, 0.45)
                    .unwrap();
                assert_eq!(result.detections.len(), 2);
            });
        }
    });
}

/// 20 s clip that is bright only within 0.25 s of `flash_at`.
struct FlashVideo {
    flash_at: f64,
}

impl VideoAsset for FlashVideo {
    fn duration_secs(&self) -> f64 {
        20.0
    }

    fn frame_at(&self, timestamp_secs: f64) -> MediaResult<Option<RgbImage>> {
        let level = if (timestamp_secs - self.flash_at).abs() < 0.25 { 255 } else { 0 };
        Ok(Some(RgbImage::from_pixel(128, 64, Rgb([level, level, level]))))
    }
}

#[test]
fn test_analyze_video_binary_search_end_to_end() {
    let registry = DetectorRegistry::new();
    let id = registry.insert(bright_handle()).unwrap();
    let video = FlashVideo { flash_at: 10.0 };

    let result = registry
        .analyze_video(&id, &video, ScanConfig::default().with_mode(ScanMode::BinarySearch))
        .unwrap();

    assert!(result.is_sensitive);
    assert_eq!(result.sensitive_timestamps, vec![10.0]);
    assert!((result.highest_confidence - 0.7).abs() < 1e-6);
    assert_eq!(result.video_duration_secs, 20.0);
}

#[test]
fn test_analyze_video_quick_check_hits_midpoint_flash() {
    let registry = DetectorRegistry::new();
    let id = registry.insert(bright_handle()).unwrap();
    let video = FlashVideo { flash_at: 10.0 };

    let result = registry
        .analyze_video(&id, &video, ScanConfig::default().with_mode(ScanMode::QuickCheck))
        .unwrap();

    // samples 0, 10 and 19.8
    assert!(result.is_sensitive);
    assert_eq!(result.sensitive_timestamps, vec![10.0]);
    assert_eq!(result.total_frames_analyzed, 3);
}

#[test]
fn test_analyze_video_quick_check_misses_offset_flash() {
    let registry = DetectorRegistry::new();
    let id = registry.insert(bright_handle()).unwrap();
    let video = FlashVideo { flash_at: 7.0 };

    let result = registry
        .analyze_video(&id, &video, ScanConfig::default().with_mode(ScanMode::QuickCheck))
        .unwrap();

    assert!(!result.is_sensitive);
    assert!(result.sensitive_timestamps.is_empty());
    assert_eq!(result.total_frames_analyzed, 3);
}
