//! Detection overlays drawn on the presented frame.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;

use crate::cue::Annotation;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 18.0;
const LABEL_OFFSET: i32 = 20;

/// DejaVu Sans, see assets/DejaVuSans-LICENSE.txt.
static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Draws boxes and, when a font is loaded, labels.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Boxes and labels, using the bundled font.
    pub fn new() -> Self {
        let font = match FontArc::try_from_slice(DEFAULT_FONT) {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("bundled label font unusable, drawing boxes only: {}", err);
                None
            }
        };
        Self { font }
    }

    /// Boxes without labels.
    pub fn boxes_only() -> Self {
        Self { font: None }
    }

    /// Boxes plus labels rendered with a TrueType/OpenType font file.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&self, image: &mut RgbImage, annotations: &[Annotation]) {
        for annotation in annotations {
            let bbox = annotation.bbox;
            let (x, y) = (bbox.x1 as i32, bbox.y1 as i32);
            let (w, h) = (bbox.width(), bbox.height());
            draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), BOX_COLOR);
            if w > 2 && h > 2 {
                draw_hollow_rect_mut(image, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), BOX_COLOR);
            }

            if let Some(font) = &self.font {
                // Above the box when there is room, inside it otherwise.
                let text_y = if y >= LABEL_OFFSET { y - LABEL_OFFSET } else { y + 2 };
                draw_text_mut(
                    image,
                    LABEL_COLOR,
                    x,
                    text_y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &annotation.label,
                );
            }
        }
    }
}
