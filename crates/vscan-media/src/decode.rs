//! Raw output decoding.
//!
//! The detector emits one flat `f32` buffer shaped `[4 + C, N]`, row-major:
//! rows 0-3 hold `cx, cy, w, h` for every anchor, row `4 + c` holds the
//! score of class `c`. There is no objectness row; the class score is the
//! confidence.
//!
//! Two independent passes read the same buffer:
//! - [`decode_primary`]: one label per anchor (arg-max), noise-floor filtered
//! - [`decode_sensitive`]: every (anchor, class) pair above the caller's
//!   threshold, restricted to sensitive classes
//!
//! The primary pass is exclusive, so a sensitive class that loses the
//! arg-max to a co-located face at the same anchor is only visible to the
//! recovery pass.

use ndarray::ArrayView2;
use vscan_models::{BoundingBox, Detection};

use crate::error::{MediaError, MediaResult};
use crate::preprocess::letterbox_scale;

/// Anchors whose best score is below this are dropped by the primary pass.
pub const NOISE_FLOOR: f32 = 0.01;

/// Boxes smaller than this on both axes (original pixels) are dropped.
pub const MIN_BOX_SIZE: f32 = 10.0;

/// Everything the decoder needs besides the buffer itself.
#[derive(Debug, Clone, Copy)]
pub struct OutputGeometry {
    pub num_classes: usize,
    /// Model input edge length `S`
    pub input_size: u32,
    pub orig_width: u32,
    pub orig_height: u32,
}

impl OutputGeometry {
    /// Rows per anchor (`4 + C`).
    pub fn rows(&self) -> usize {
        4 + self.num_classes
    }

    /// `max(W, H) / S`.
    pub fn scale(&self) -> f32 {
        letterbox_scale(self.orig_width, self.orig_height, self.input_size)
    }

    /// Map a model-space center box to a clipped original-space box.
    ///
    /// Returns `None` for boxes under the size floor on both axes, and for
    /// boxes that collapse when clipped to the image.
    fn map_box(&self, cx: f32, cy: f32, w: f32, h: f32) -> Option<BoundingBox> {
        let bbox = BoundingBox::from_center(cx, cy, w, h)
            .scaled(self.scale())
            .clipped(self.orig_width as f32, self.orig_height as f32);

        if bbox.width() < MIN_BOX_SIZE && bbox.height() < MIN_BOX_SIZE {
            return None;
        }
        bbox.is_proper().then_some(bbox)
    }
}

/// View a raw output buffer as `[4 + C, N]`.
pub fn output_view<'a>(buffer: &'a [f32], geometry: &OutputGeometry) -> MediaResult<ArrayView2<'a, f32>> {
    let rows = geometry.rows();
    if buffer.len() % rows != 0 {
        return Err(MediaError::invalid_output(format!(
            "buffer of {} floats is not divisible by {} rows (4 + {} classes)",
            buffer.len(),
            rows,
            geometry.num_classes
        )));
    }
    let num_predictions = buffer.len() / rows;
    ArrayView2::from_shape((rows, num_predictions), buffer)
        .map_err(|e| MediaError::invalid_output(e.to_string()))
}

fn class_name(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", index))
}

/// Best-class-per-anchor pass.
///
/// The caller's confidence threshold is not applied here; only the fixed
/// [`NOISE_FLOOR`] bounds the output size.
pub fn decode_primary(
    buffer: &[f32],
    geometry: &OutputGeometry,
    labels: &[String],
) -> MediaResult<Vec<Detection>> {
    let view = output_view(buffer, geometry)?;
    let num_predictions = view.ncols();
    let mut detections = Vec::new();

    for i in 0..num_predictions {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for c in 0..geometry.num_classes {
            let score = view[[4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score.is_nan() || best_score < NOISE_FLOOR {
            continue;
        }

        let Some(bbox) = geometry.map_box(view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]) else {
            continue;
        };

        detections.push(Detection::new(
            bbox,
            best_score,
            best_class,
            class_name(labels, best_class),
        ));
    }

    Ok(detections)
}

/// Sensitive-class recovery pass.
///
/// Scans every class at every anchor, keeps scores above
/// `confidence_threshold`, then restricts to `sensitive_classes`.
pub fn decode_sensitive(
    buffer: &[f32],
    geometry: &OutputGeometry,
    labels: &[String],
    confidence_threshold: f32,
    sensitive_classes: &[usize],
) -> MediaResult<Vec<Detection>> {
    let view = output_view(buffer, geometry)?;
    let num_predictions = view.ncols();

    let mut recovered: Vec<Detection> = Vec::new();
    for i in 0..num_predictions {
        for c in 0..geometry.num_classes {
            let score = view[[4 + c, i]];
            if score.is_nan() || score <= confidence_threshold {
                continue;
            }
            let Some(bbox) = geometry.map_box(view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]) else {
                continue;
            };
            recovered.push(Detection::new(bbox, score, c, class_name(labels, c)));
        }
    }

    recovered.retain(|d| sensitive_classes.contains(&d.class_index));
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[4 + C, N]` buffer from per-anchor `(cx, cy, w, h, scores)`.
    fn buffer(num_classes: usize, anchors: &[([f32; 4], Vec<f32>)]) -> Vec<f32> {
        let n = anchors.len();
        let mut buf = vec![0.0; (4 + num_classes) * n];
        for (i, (b, scores)) in anchors.iter().enumerate() {
            for r in 0..4 {
                buf[r * n + i] = b[r];
            }
            for (c, s) in scores.iter().enumerate() {
                buf[(4 + c) * n + i] = *s;
            }
        }
        buf
    }

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("L{}", i)).collect()
    }

    fn geometry(num_classes: usize, w: u32, h: u32) -> OutputGeometry {
        OutputGeometry {
            num_classes,
            input_size: 100,
            orig_width: w,
            orig_height: h,
        }
    }

    #[test]
    fn test_rejects_indivisible_buffer() {
        let geo = geometry(2, 100, 100);
        let result = decode_primary(&[0.0; 13], &geo, &labels(2));
        assert!(matches!(result, Err(MediaError::InvalidOutput(_))));
    }

    #[test]
    fn test_primary_scales_without_offset() {
        // 200x100 image into 100x100 model: scale = 2
        let buf = buffer(2, &[([20.0, 20.0, 20.0, 20.0], vec![0.1, 0.8])]);
        let dets = decode_primary(&buf, &geometry(2, 200, 100), &labels(2)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(20.0, 20.0, 60.0, 60.0));
        assert_eq!(dets[0].class_index, 1);
        assert_eq!(dets[0].class_name, "L1");
        assert!((dets[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_primary_applies_noise_floor_not_threshold() {
        let buf = buffer(
            1,
            &[
                ([50.0, 50.0, 40.0, 40.0], vec![0.005]),
                ([50.0, 50.0, 40.0, 40.0], vec![0.02]),
            ],
        );
        let dets = decode_primary(&buf, &geometry(1, 100, 100), &labels(1)).unwrap();
        assert_eq!(dets.len(), 1);
        assert!((dets[0].score - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_min_size_is_an_and_rule() {
        let buf = buffer(
            1,
            &[
                // 4x4: both below the floor, dropped
                ([50.0, 50.0, 4.0, 4.0], vec![0.9]),
                // 4x60: thin but long, kept
                ([50.0, 50.0, 4.0, 60.0], vec![0.9]),
            ],
        );
        let dets = decode_primary(&buf, &geometry(1, 100, 100), &labels(1)).unwrap();
        assert_eq!(dets.len(), 1);
        assert!((dets[0].bbox.height() - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_anchor_fully_outside_image_is_dropped() {
        // 4 valid anchors; the only one scoring 0.9 clips away entirely
        let buf = buffer(
            1,
            &[
                ([350.0, 350.0, 20.0, 20.0], vec![0.9]),
                ([10.0, 10.0, 20.0, 20.0], vec![0.0]),
                ([30.0, 30.0, 20.0, 20.0], vec![0.0]),
                ([60.0, 60.0, 20.0, 20.0], vec![0.0]),
            ],
        );
        let geo = OutputGeometry {
            num_classes: 1,
            input_size: 200,
            orig_width: 100,
            orig_height: 100,
        };
        assert!(decode_primary(&buf, &geo, &labels(1)).unwrap().is_empty());
        assert!(decode_sensitive(&buf, &geo, &labels(1), 0.5, &[0]).unwrap().is_empty());
    }

    #[test]
    fn test_boxes_stay_inside_image() {
        let buf = buffer(
            2,
            &[
                ([0.0, 0.0, 80.0, 80.0], vec![0.9, 0.1]),
                ([100.0, 100.0, 80.0, 80.0], vec![0.2, 0.7]),
                ([50.0, 10.0, 300.0, 30.0], vec![0.5, 0.5]),
            ],
        );
        let (w, h) = (640u32, 480u32);
        let geo = geometry(2, w, h);
        let dets = decode_primary(&buf, &geo, &labels(2)).unwrap();
        assert_eq!(dets.len(), 3);
        for d in &dets {
            assert!(0.0 <= d.bbox.x1 && d.bbox.x1 < d.bbox.x2 && d.bbox.x2 <= w as f32);
            assert!(0.0 <= d.bbox.y1 && d.bbox.y1 < d.bbox.y2 && d.bbox.y2 <= h as f32);
        }
    }

    #[test]
    fn test_recovery_finds_class_hidden_by_argmax() {
        // Face (class 0) wins the arg-max, sensitive class 1 is still above threshold
        let buf = buffer(2, &[([50.0, 50.0, 40.0, 40.0], vec![0.95, 0.6])]);
        let geo = geometry(2, 100, 100);

        let primary = decode_primary(&buf, &geo, &labels(2)).unwrap();
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].class_index, 0);

        let recovered = decode_sensitive(&buf, &geo, &labels(2), 0.5, &[1]).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].class_index, 1);
        assert!((recovered[0].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_recovery_respects_threshold_and_subset() {
        let buf = buffer(3, &[([50.0, 50.0, 40.0, 40.0], vec![0.9, 0.4, 0.8])]);
        let geo = geometry(3, 100, 100);

        let recovered = decode_sensitive(&buf, &geo, &labels(3), 0.5, &[1, 2]).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].class_index, 2);
    }

    #[test]
    fn test_recovery_drops_nan_scores() {
        let buf = buffer(2, &[([50.0, 50.0, 40.0, 40.0], vec![0.1, f32::NAN])]);
        let recovered = decode_sensitive(&buf, &geometry(2, 100, 100), &labels(2), 0.5, &[1]).unwrap();
        assert!(recovered.is_empty());
    }

    #[test]
    fn test_unknown_label_gets_placeholder_name() {
        let buf = buffer(2, &[([50.0, 50.0, 40.0, 40.0], vec![0.1, 0.9])]);
        let dets = decode_primary(&buf, &geometry(2, 100, 100), &labels(1)).unwrap();
        assert_eq!(dets[0].class_name, "class_1");
    }
}
