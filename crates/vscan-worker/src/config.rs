//! Worker configuration.

use std::path::PathBuf;

use vscan_media::{DetectorConfig, DetectorSpec, ScanConfig, SensitiveClasses};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// ONNX model file
    pub model_path: PathBuf,
    /// Class labels in model output order; built-in set when unset
    pub class_labels: Option<Vec<String>>,
    /// Sensitive label names; built-in subset when unset
    pub sensitive_labels: Option<Vec<String>>,
    pub detector: DetectorConfig,
    pub scan: ScanConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/detector.onnx"),
            class_labels: None,
            sensitive_labels: None,
            detector: DetectorConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            model_path: std::env::var("VSCAN_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/detector.onnx")),
            class_labels: std::env::var("VSCAN_CLASS_LABELS").ok().map(|s| parse_list(&s)),
            sensitive_labels: std::env::var("VSCAN_SENSITIVE_LABELS").ok().map(|s| parse_list(&s)),
            detector: DetectorConfig::from_env(),
            scan: ScanConfig::from_env(),
        }
    }

    /// Reject label lists that were set but came out empty.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.class_labels.as_ref().is_some_and(|labels| labels.is_empty()) {
            return Err(WorkerError::config_error("VSCAN_CLASS_LABELS is set but lists no labels"));
        }
        if self.sensitive_labels.as_ref().is_some_and(|labels| labels.is_empty()) {
            return Err(WorkerError::config_error(
                "VSCAN_SENSITIVE_LABELS is set but lists no labels",
            ));
        }
        Ok(())
    }

    /// Detector load parameters derived from this config.
    pub fn detector_spec(&self) -> DetectorSpec {
        let mut spec = DetectorSpec::new(&self.model_path).with_config(self.detector.clone());
        if let Some(labels) = &self.class_labels {
            spec = spec.with_labels(labels.clone());
        }
        if let Some(names) = &self.sensitive_labels {
            spec = spec.with_sensitive(SensitiveClasses::Names(names.clone()));
        }
        spec
    }
}

/// Split a comma-separated list, dropping empty entries.
fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("A, B,,C "), vec!["A", "B", "C"]);
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn test_default_spec_uses_builtin_classes() {
        let config = WorkerConfig::default();
        let spec = config.detector_spec();
        assert_eq!(spec.model_path, PathBuf::from("models/detector.onnx"));
        assert!(spec.class_labels.is_none());
        assert!(matches!(spec.sensitive, SensitiveClasses::Defaults));
        assert_eq!(spec.config.max_detections, 300);
    }

    #[test]
    fn test_validate_rejects_empty_label_lists() {
        assert!(WorkerConfig::default().validate().is_ok());

        let config = WorkerConfig {
            class_labels: Some(parse_list(" , ")),
            ..WorkerConfig::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));

        let config = WorkerConfig {
            sensitive_labels: Some(Vec::new()),
            ..WorkerConfig::default()
        };
        assert!(matches!(config.validate(), Err(WorkerError::ConfigError(_))));
    }

    #[test]
    fn test_spec_overrides() {
        let config = WorkerConfig {
            class_labels: Some(vec!["a".into(), "b".into()]),
            sensitive_labels: Some(vec!["b".into()]),
            ..WorkerConfig::default()
        };
        let spec = config.detector_spec();
        assert_eq!(spec.class_labels.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(matches!(spec.sensitive, SensitiveClasses::Names(ref n) if n == &["b".to_string()]));
    }
}
