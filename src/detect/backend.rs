use anyhow::Result;
use image::RgbImage;

/// Axis-aligned box in pixel coordinates with `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer horizontal midpoint.
    pub fn center_x(&self) -> u32 {
        (self.x1 + self.x2) / 2
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// A labelled detection, valid for one detection pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}

/// Detection as emitted by a backend, before label lookup and clamping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_index: usize,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(class_index: usize, xyxy: [f32; 4], confidence: f32) -> Self {
        Self {
            class_index,
            x1: xyxy[0],
            y1: xyxy[1],
            x2: xyxy[2],
            y2: xyxy[3],
            confidence,
        }
    }
}

/// Object detector backend.
///
/// Backends are loaded once per process and shared across sessions behind a
/// `Mutex`, because `infer` takes `&mut self`. Only one capture worker runs at a
/// time, so the lock is uncontended in practice.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Label table indexed by `RawDetection::class_index`.
    fn class_names(&self) -> &[String];

    /// Run inference on an RGB frame. Boxes are in the frame's pixel space.
    fn infer(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
