//! Thread-safe table of loaded detectors.
//!
//! Handles are shared as `Arc<DetectorHandle>`. The table lock is only held
//! for lookups and inserts; inference serializes on each handle's own
//! runtime lock, so different detectors never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;
use vscan_models::{DetectorId, ImageDetections, ModelInfo, VideoResult};

use crate::asset::VideoAsset;
use crate::detector::DetectorHandle;
#[cfg(feature = "onnx")]
use crate::detector::DetectorSpec;
use crate::error::{MediaError, MediaResult};
use crate::preprocess::ImageSource;
use crate::scan::{ScanConfig, ScanEngine};

#[derive(Default)]
pub struct DetectorRegistry {
    handles: RwLock<HashMap<DetectorId, Arc<DetectorHandle>>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an ONNX detector and register it.
    #[cfg(feature = "onnx")]
    pub fn load(&self, spec: &DetectorSpec) -> MediaResult<DetectorId> {
        let handle = DetectorHandle::load(spec)?;
        self.insert(handle)
    }

    /// Register an already-built handle.
    pub fn insert(&self, handle: DetectorHandle) -> MediaResult<DetectorId> {
        let id = handle.id().clone();
        let mut handles = self.write()?;
        handles.insert(id.clone(), Arc::new(handle));
        info!(detector_id = %id, total = handles.len(), "Detector registered");
        Ok(id)
    }

    /// Look up a handle. Unknown or released ids are `ModelNotLoaded`.
    pub fn get(&self, id: &DetectorId) -> MediaResult<Arc<DetectorHandle>> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| MediaError::model_not_loaded(id.to_string()))
    }

    /// Drop the registry's reference. In-flight calls holding the `Arc`
    /// finish normally.
    pub fn release(&self, id: &DetectorId) -> MediaResult<()> {
        let removed = self.write()?.remove(id);
        match removed {
            Some(_) => {
                info!(detector_id = %id, "Detector released");
                Ok(())
            }
            None => Err(MediaError::model_not_loaded(id.to_string())),
        }
    }

    pub fn is_loaded(&self, id: &DetectorId) -> bool {
        self.read().map(|h| h.contains_key(id)).unwrap_or(false)
    }

    /// Ids of all loaded detectors.
    pub fn list(&self) -> MediaResult<Vec<DetectorId>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    pub fn model_info(&self, id: &DetectorId) -> MediaResult<ModelInfo> {
        Ok(self.get(id)?.model_info())
    }

    /// detect-image against a registered handle.
    pub fn detect_image(
        &self,
        id: &DetectorId,
        source: ImageSource,
        confidence: f32,
        iou: f32,
    ) -> MediaResult<ImageDetections> {
        let handle = self.get(id)?;
        handle.detect_image(source, confidence, iou)
    }

    /// analyze-video against a registered handle.
    pub fn analyze_video(&self, id: &DetectorId, asset: &dyn VideoAsset, config: ScanConfig) -> MediaResult<VideoResult> {
        let handle = self.get(id)?;
        let result = ScanEngine::new(handle.as_ref(), config).run(asset);
        result
    }

    fn read(&self) -> MediaResult<std::sync::RwLockReadGuard<'_, HashMap<DetectorId, Arc<DetectorHandle>>>> {
        self.handles
            .read()
            .map_err(|_| MediaError::model_not_loaded("detector registry lock poisoned"))
    }

    fn write(&self) -> MediaResult<std::sync::RwLockWriteGuard<'_, HashMap<DetectorId, Arc<DetectorHandle>>>> {
        self.handles
            .write()
            .map_err(|_| MediaError::model_not_loaded("detector registry lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorConfig;
    use crate::runtime::ModelRuntime;

    struct Empty;

    impl ModelRuntime for Empty {
        fn name(&self) -> &'static str {
            "empty"
        }

        fn run(&mut self, _chw: Vec<f32>, _input_size: u32) -> MediaResult<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    fn handle() -> DetectorHandle {
        DetectorHandle::with_default_classes(
            Box::new(Empty),
            DetectorConfig {
                input_size: 16,
                ..DetectorConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_insert_get_release() {
        let registry = DetectorRegistry::new();
        let id = registry.insert(handle()).unwrap();

        assert!(registry.is_loaded(&id));
        assert_eq!(registry.list().unwrap(), vec![id.clone()]);
        assert_eq!(registry.model_info(&id).unwrap().input_size, 16);

        registry.release(&id).unwrap();
        assert!(!registry.is_loaded(&id));
        assert!(matches!(registry.get(&id), Err(MediaError::ModelNotLoaded(_))));
        assert!(matches!(registry.release(&id), Err(MediaError::ModelNotLoaded(_))));
    }

    #[test]
    fn test_released_id_rejected_for_detection() {
        let registry = DetectorRegistry::new();
        let id = registry.insert(handle()).unwrap();
        registry.release(&id).unwrap();

        let err = registry
            .detect_image(&id, ImageSource::Pixels(image::RgbImage::new(8, 8)), 0.25, 0.45)
            .unwrap_err();
        assert!(matches!(err, MediaError::ModelNotLoaded(_)));
    }

    #[test]
    fn test_handles_are_independent() {
        let registry = DetectorRegistry::new();
        let a = registry.insert(handle()).unwrap();
        let b = registry.insert(handle()).unwrap();
        assert_ne!(a, b);

        let held = registry.get(&a).unwrap();
        registry.release(&a).unwrap();
        // Outstanding Arc still usable; other handle unaffected
        assert_eq!(held.model_info().runtime, "empty");
        assert!(registry.get(&b).is_ok());
    }

    #[test]
    fn test_empty_output_yields_no_detections() {
        let registry = DetectorRegistry::new();
        let id = registry.insert(handle()).unwrap();
        let result = registry
            .detect_image(&id, ImageSource::Pixels(image::RgbImage::new(8, 8)), 0.25, 0.45)
            .unwrap();
        assert!(result.detections.is_empty());
    }
}
