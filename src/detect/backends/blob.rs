use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::{DetectorBackend, RawDetection};

const DEFAULT_BRIGHTNESS: u8 = 200;
const DEFAULT_MIN_ROWS: u32 = 4;

/// CPU backend that reports bright upright regions as people.
///
/// Columns are projected onto the x axis; each contiguous run of columns
/// holding at least `min_rows` bright pixels becomes one detection. Pairs with
/// the `stub://walker` camera for runs without a model.
pub struct BlobBackend {
    labels: Vec<String>,
    brightness: u8,
    min_rows: u32,
}

impl BlobBackend {
    pub fn new() -> Self {
        Self {
            labels: vec!["person".to_string()],
            brightness: DEFAULT_BRIGHTNESS,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    fn is_bright(&self, px: &image::Rgb<u8>) -> bool {
        px.0.iter().all(|&c| c >= self.brightness)
    }

    /// Bright pixel count and vertical extent for column `x`.
    fn column_profile(&self, image: &RgbImage, x: u32) -> (u32, u32, u32) {
        let mut count = 0;
        let mut top = u32::MAX;
        let mut bottom = 0;
        for y in 0..image.height() {
            if self.is_bright(image.get_pixel(x, y)) {
                count += 1;
                top = top.min(y);
                bottom = bottom.max(y + 1);
            }
        }
        (count, top, bottom)
    }
}

impl Default for BlobBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for BlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn class_names(&self) -> &[String] {
        &self.labels
    }

    fn infer(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>> {
        let mut detections = Vec::new();
        // (x1, y1, y2, bright pixels)
        let mut run: Option<(u32, u32, u32, u32)> = None;

        for x in 0..=image.width() {
            let profile = if x < image.width() {
                Some(self.column_profile(image, x))
            } else {
                None
            };
            match (profile, run) {
                (Some((count, top, bottom)), current) if count >= self.min_rows => {
                    run = Some(match current {
                        Some((x1, y1, y2, total)) => (x1, y1.min(top), y2.max(bottom), total + count),
                        None => (x, top, bottom, count),
                    });
                }
                (_, Some((x1, y1, y2, total))) => {
                    let area = ((x - x1) * (y2 - y1)).max(1);
                    let fill = total as f32 / area as f32;
                    detections.push(RawDetection::new(
                        0,
                        [x1 as f32, y1 as f32, x as f32, y2 as f32],
                        fill.min(1.0),
                    ));
                    run = None;
                }
                _ => {}
            }
        }

        Ok(detections)
    }
}
