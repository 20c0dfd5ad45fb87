//! Detection capability boundary.
//!
//! `DetectorBackend` wraps a model that returns raw, model-specific detections
//! (class index, absolute pixel box, confidence). `DetectionAdapter` turns those
//! into `Detection` records with a resolved label and a box validated against
//! the frame.

mod adapter;
mod backend;
mod backends;

pub use adapter::DetectionAdapter;
pub use backend::{BoundingBox, Detection, DetectorBackend, RawDetection};
pub use backends::{BlobBackend, ScriptedBackend, COCO_CLASSES};

#[cfg(feature = "backend-tract")]
pub use backends::{TractConfig, TractYoloBackend};
