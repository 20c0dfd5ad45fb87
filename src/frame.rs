//! Captured frames and the session clock.
//!
//! - `Frame`: one raster image pulled from a capture device. Owned by the
//!   capture worker for the whole detection pass.
//! - `PixelFormat`: byte layout reported by the device.
//! - `SessionClock`: monotonic time since the session started, used as the
//!   timestamp for frames and cooldown decisions.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::{Duration, Instant};

use crate::ingest::normalize_to_rgb;

/// Byte layout of a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Nv12,
}

/// One captured frame.
///
/// Pixels are not mutated during the detection pass; annotation happens on the
/// RGB copy produced by `to_rgb_image`.
#[derive(Clone, Debug)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Time since session start at capture.
    pub captured_at: Duration,
    /// Capture order within the session, starting at 1.
    pub sequence: u64,
}

impl Frame {
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        captured_at: Duration,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            captured_at,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Convert into an RGB image for detection and presentation.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let rgb = normalize_to_rgb(&self.pixels, self.width, self.height, self.format)?;
        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

/// Monotonic session clock.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the session started.
    pub fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}
