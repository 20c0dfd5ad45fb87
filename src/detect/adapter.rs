use anyhow::Result;
use image::RgbImage;
use std::sync::{Arc, Mutex};

use super::backend::{BoundingBox, Detection, DetectorBackend, RawDetection};
use crate::PipelineError;

/// Label used when a backend reports a class index outside its table.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Normalizes backend output into `Detection` records.
///
/// Order is preserved. Boxes are truncated to whole pixels, clamped to the
/// frame and dropped when they collapse to zero width or height.
#[derive(Clone)]
pub struct DetectionAdapter {
    backend: Arc<Mutex<dyn DetectorBackend>>,
}

impl DetectionAdapter {
    pub fn new(backend: Arc<Mutex<dyn DetectorBackend>>) -> Self {
        Self { backend }
    }

    /// Wrap an owned backend.
    pub fn from_backend<B: DetectorBackend + 'static>(backend: B) -> Self {
        Self::new(Arc::new(Mutex::new(backend)))
    }

    pub fn backend(&self) -> Arc<Mutex<dyn DetectorBackend>> {
        self.backend.clone()
    }

    /// Detect objects in `image`.
    ///
    /// Any backend failure is reported as `PipelineError::DetectionUnavailable`.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut guard = self
            .backend
            .lock()
            .map_err(|_| PipelineError::DetectionUnavailable("backend lock poisoned".into()))?;
        let raw = guard.infer(image).map_err(|err| {
            PipelineError::DetectionUnavailable(format!("{}: {:#}", guard.name(), err))
        })?;
        let labels = guard.class_names();
        Ok(raw
            .iter()
            .filter_map(|det| normalize(det, labels, image.width(), image.height()))
            .collect())
    }
}

fn normalize(
    raw: &RawDetection,
    labels: &[String],
    width: u32,
    height: u32,
) -> Option<Detection> {
    let coords = [raw.x1, raw.y1, raw.x2, raw.y2];
    if coords.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let x1 = clamp_coord(raw.x1.min(raw.x2), width);
    let x2 = clamp_coord(raw.x1.max(raw.x2), width);
    let y1 = clamp_coord(raw.y1.min(raw.y2), height);
    let y2 = clamp_coord(raw.y1.max(raw.y2), height);
    if x1 >= x2 || y1 >= y2 {
        return None;
    }
    let label = labels
        .get(raw.class_index)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_LABEL);
    Some(Detection::new(
        label,
        BoundingBox::new(x1, y1, x2, y2),
        raw.confidence,
    ))
}

fn clamp_coord(value: f32, limit: u32) -> u32 {
    (value.trunc().max(0.0) as u32).min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;

    fn labels() -> Vec<String> {
        vec!["person".to_string(), "dog".to_string()]
    }

    #[test]
    fn maps_class_index_to_label_and_keeps_order() -> Result<()> {
        let backend = ScriptedBackend::new(labels()).with_result(vec![
            RawDetection::new(1, [10.0, 10.0, 20.0, 20.0], 0.9),
            RawDetection::new(0, [30.7, 5.2, 60.9, 40.0], 0.8),
            RawDetection::new(7, [1.0, 1.0, 2.0, 2.0], 0.5),
        ]);
        let adapter = DetectionAdapter::from_backend(backend);
        let dets = adapter.detect(&RgbImage::new(100, 50))?;
        assert_eq!(dets.len(), 3);
        assert_eq!(dets[0].label, "dog");
        assert_eq!(dets[1].label, "person");
        assert_eq!(dets[1].bbox, BoundingBox::new(30, 5, 60, 40));
        assert_eq!(dets[2].label, UNKNOWN_LABEL);
        Ok(())
    }

    #[test]
    fn boxes_are_clamped_and_degenerate_ones_dropped() -> Result<()> {
        let backend = ScriptedBackend::new(labels()).with_result(vec![
            RawDetection::new(0, [-5.0, -5.0, 150.0, 80.0], 0.9),
            RawDetection::new(0, [120.0, 0.0, 130.0, 10.0], 0.9),
            RawDetection::new(0, [f32::NAN, 0.0, 10.0, 10.0], 0.9),
        ]);
        let adapter = DetectionAdapter::from_backend(backend);
        let dets = adapter.detect(&RgbImage::new(100, 50))?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(0, 0, 100, 50));
        Ok(())
    }

    #[test]
    fn backend_failure_is_detection_unavailable() {
        let backend = ScriptedBackend::new(labels()).with_failure("malformed input");
        let adapter = DetectionAdapter::from_backend(backend);
        let err = adapter.detect(&RgbImage::new(10, 10)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DetectionUnavailable(_))
        ));
    }
}
