//! Class labels and the sensitive-class subset.
//!
//! Labels are index-addressed in the order the model emits score rows.
//! The defaults match the 18-class nudity detector export.

use crate::error::{MediaError, MediaResult};

/// Default class labels, in model output order.
pub const DEFAULT_CLASS_LABELS: &[&str] = &[
    "FEMALE_GENITALIA_COVERED",
    "FACE_FEMALE",
    "BUTTOCKS_EXPOSED",
    "FEMALE_BREAST_EXPOSED",
    "FEMALE_GENITALIA_EXPOSED",
    "MALE_BREAST_EXPOSED",
    "ANUS_EXPOSED",
    "FEET_EXPOSED",
    "BELLY_COVERED",
    "FEET_COVERED",
    "ARMPITS_COVERED",
    "ARMPITS_EXPOSED",
    "FACE_MALE",
    "BELLY_EXPOSED",
    "MALE_GENITALIA_EXPOSED",
    "ANUS_COVERED",
    "FEMALE_BREAST_COVERED",
    "BUTTOCKS_COVERED",
];

/// Labels treated as sensitive by default.
pub const DEFAULT_SENSITIVE_LABELS: &[&str] = &[
    "BUTTOCKS_EXPOSED",
    "FEMALE_BREAST_EXPOSED",
    "FEMALE_GENITALIA_EXPOSED",
    "ANUS_EXPOSED",
    "MALE_GENITALIA_EXPOSED",
];

/// Owned copy of [`DEFAULT_CLASS_LABELS`].
pub fn default_class_labels() -> Vec<String> {
    DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Resolve sensitive label names to indices in `labels`.
///
/// Names missing from `labels` are an error so a mismatched label list
/// cannot silently disable the recovery pass.
pub fn resolve_sensitive<S: AsRef<str>>(labels: &[String], names: &[S]) -> MediaResult<Vec<usize>> {
    let mut indices = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let index = labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(name))
            .ok_or_else(|| MediaError::invalid_config(format!("unknown sensitive class '{}'", name)))?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices)
}

/// Validate explicit sensitive indices against the label count.
pub fn validate_sensitive(num_classes: usize, indices: &[usize]) -> MediaResult<Vec<usize>> {
    if let Some(bad) = indices.iter().find(|&&i| i >= num_classes) {
        return Err(MediaError::invalid_config(format!(
            "sensitive class index {} out of range for {} classes",
            bad, num_classes
        )));
    }
    let mut indices = indices.to_vec();
    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}
