//! Detector identity and model metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a loaded detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DetectorId(pub String);

impl DetectorId {
    /// Generate a new random detector ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DetectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DetectorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Static description of a loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelInfo {
    /// Square input edge length `S`
    pub input_size: u32,
    /// Class labels, index-addressed
    pub class_labels: Vec<String>,
    /// Indices treated as sensitive
    pub sensitive_classes: Vec<usize>,
    /// Runtime backend name (e.g. "onnxruntime")
    pub runtime: String,
}

impl ModelInfo {
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }
}
