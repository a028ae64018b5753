//! Non-maximum suppression and pass merging.
//!
//! Suppression is class-agnostic: boxes of different classes that overlap
//! above the threshold suppress each other. Merging recovered boxes into
//! the primary list is class-matched.

use vscan_models::{BoundingBox, Detection};

/// Max top-left corner distance (per axis, pixels) for a recovered box to
/// count as a duplicate of a kept box of the same class.
pub const MERGE_CORNER_TOLERANCE: f32 = 10.0;

/// Intersection over union, 0 when the union is empty.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy NMS, highest score first.
///
/// Output is sorted by score descending and is a subset of the input.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut suppressed = vec![false; detections.len()];
    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i].bbox, &detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    detections
        .into_iter()
        .zip(suppressed)
        .filter_map(|(d, s)| (!s).then_some(d))
        .collect()
}

/// Append recovered detections that do not duplicate a kept one.
///
/// A recovered box is a duplicate when a kept box of the same class has
/// its top-left corner within [`MERGE_CORNER_TOLERANCE`] on both axes.
pub fn merge_recovered(mut kept: Vec<Detection>, recovered: Vec<Detection>) -> Vec<Detection> {
    for candidate in recovered {
        let duplicate = kept.iter().any(|k| {
            k.class_index == candidate.class_index
                && (k.bbox.x1 - candidate.bbox.x1).abs() < MERGE_CORNER_TOLERANCE
                && (k.bbox.y1 - candidate.bbox.y1).abs() < MERGE_CORNER_TOLERANCE
        });
        if !duplicate {
            kept.push(candidate);
        }
    }
    kept
}
