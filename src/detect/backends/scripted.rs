use anyhow::{anyhow, Result};
use image::RgbImage;
use std::collections::VecDeque;

use crate::detect::backend::{DetectorBackend, RawDetection};

enum Step {
    Detections(Vec<RawDetection>),
    Failure(String),
}

/// Backend that replays queued results, one per call.
///
/// Once the script is exhausted every call returns no detections.
pub struct ScriptedBackend {
    labels: Vec<String>,
    steps: VecDeque<Step>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            steps: VecDeque::new(),
            calls: 0,
        }
    }

    /// Backend using the COCO label table.
    pub fn coco() -> Self {
        Self::new(
            super::COCO_CLASSES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }

    pub fn with_result(mut self, detections: Vec<RawDetection>) -> Self {
        self.steps.push_back(Step::Detections(detections));
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.steps.push_back(Step::Failure(message.to_string()));
        self
    }

    /// Number of `infer` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn class_names(&self) -> &[String] {
        &self.labels
    }

    fn infer(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>> {
        self.calls += 1;
        match self.steps.pop_front() {
            Some(Step::Detections(detections)) => Ok(detections),
            Some(Step::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}
