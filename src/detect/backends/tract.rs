#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, RawDetection};

const LETTERBOX_FILL: u8 = 114;
const BOX_OFFSET: usize = 4;

/// Settings for the YOLOv8 ONNX backend.
#[derive(Clone, Debug)]
pub struct TractConfig {
    pub model_path: PathBuf,
    /// Optional newline separated class names; COCO-80 otherwise.
    pub labels_path: Option<PathBuf>,
    /// Square model input size.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

/// YOLOv8 detection model run through tract.
///
/// Expects the exported `[1, 4 + classes, anchors]` head. Frames are
/// letterboxed into the square input (top-left aligned) and boxes scaled back
/// into frame pixels.
pub struct TractYoloBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractYoloBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load(config: &TractConfig) -> Result<Self> {
        let model_path = config.model_path.as_path();
        let size = config.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = match &config.labels_path {
            Some(path) => read_labels(path)?,
            None => super::COCO_CLASSES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        };

        log::info!(
            "TractYoloBackend: loaded {} ({} classes, input {}px)",
            model_path.display(),
            labels.len(),
            config.input_size
        );

        Ok(Self {
            model,
            labels,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    /// Letterbox `image` into the model input; returns the tensor and scale.
    fn build_input(&self, image: &RgbImage) -> Result<(Tensor, f32)> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("empty frame"));
        }
        let size = self.input_size;
        let ratio = (size as f32 / image.width() as f32).min(size as f32 / image.height() as f32);
        let resized_w = ((image.width() as f32 * ratio).round() as u32).clamp(1, size);
        let resized_h = ((image.height() as f32 * ratio).round() as u32).clamp(1, size);
        let resized = imageops::resize(image, resized_w, resized_h, imageops::FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(size, size, Rgb([LETTERBOX_FILL; 3]));
        imageops::replace(&mut canvas, &resized, 0, 0);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );
        Ok((input.into_tensor(), ratio))
    }

    fn decode(&self, output: &Tensor, ratio: f32) -> Result<Vec<RawDetection>> {
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, features, anchors]")?;
        let (features, anchors) = (view.shape()[1], view.shape()[2]);
        if features <= BOX_OFFSET {
            return Err(anyhow!("model output has {} features per anchor", features));
        }
        let classes = features - BOX_OFFSET;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_index, confidence) = (0..classes)
                .map(|c| (c, view[[0, BOX_OFFSET + c, i]]))
                .fold((0, f32::NEG_INFINITY), |best, x| if x.1 > best.1 { x } else { best });
            if confidence < self.confidence_threshold {
                continue;
            }
            let cx = view[[0, 0, i]] / ratio;
            let cy = view[[0, 1, i]] / ratio;
            let w = view[[0, 2, i]] / ratio;
            let h = view[[0, 3, i]] / ratio;
            candidates.push(RawDetection::new(
                class_index,
                [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                confidence,
            ));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractYoloBackend {
    fn name(&self) -> &'static str {
        "tract-yolov8"
    }

    fn class_names(&self) -> &[String] {
        &self.labels
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>> {
        let (input, ratio) = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        self.decode(output, ratio)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.infer(&blank).map(|_| ())
    }
}

/// Per-class non-maximum suppression. Output is ordered by descending confidence.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_index == candidate.class_index && iou(k, &candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = w * h;
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(anyhow!("labels file {} is empty", path.display()));
    }
    Ok(labels)
}
