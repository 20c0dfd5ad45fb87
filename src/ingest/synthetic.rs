//! Synthetic `stub://` cameras.
//!
//! URI forms:
//! - `stub://walker`: a bright upright figure sweeps left to right
//! - `stub://empty`: background only
//! - `stub://offline`: open always fails
//!
//! Query options: `frames=N` ends the stream after N frames, `format=bgr`
//! emits BGR24 instead of RGB24.

use anyhow::{anyhow, Result};
use std::thread;
use std::time::{Duration, Instant};

use super::{CameraConfig, CaptureDevice};
use crate::frame::{Frame, PixelFormat, SessionClock};
use crate::PipelineError;

const BACKGROUND: u8 = 40;
const FIGURE: u8 = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scene {
    Walker,
    Empty,
}

pub struct SyntheticCamera {
    uri: String,
    scene: Scene,
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_limit: Option<u64>,
    frame_interval: Option<Duration>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    released: bool,
}

impl SyntheticCamera {
    pub fn open(uri: &str, config: &CameraConfig) -> Result<Self> {
        let rest = uri
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("not a synthetic camera uri: {}", uri))?;
        let (scene_name, query) = match rest.split_once('?') {
            Some((scene, query)) => (scene, Some(query)),
            None => (rest, None),
        };

        let scene = match scene_name {
            "walker" | "" => Scene::Walker,
            "empty" => Scene::Empty,
            "offline" => {
                return Err(PipelineError::DeviceOpen(format!("{} is offline", uri)).into());
            }
            other => return Err(anyhow!("unknown synthetic scene '{}'", other)),
        };

        let mut frame_limit = None;
        let mut format = PixelFormat::Rgb24;
        for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("frames", value)) => {
                    let limit: u64 = value
                        .parse()
                        .map_err(|_| anyhow!("frames must be an integer, got '{}'", value))?;
                    frame_limit = Some(limit);
                }
                Some(("format", "bgr")) => format = PixelFormat::Bgr24,
                Some(("format", "rgb")) => format = PixelFormat::Rgb24,
                _ => return Err(anyhow!("unsupported synthetic camera option '{}'", pair)),
            }
        }

        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("synthetic camera needs a non-zero frame size"));
        }

        let frame_interval = if config.target_fps == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / config.target_fps as f64))
        };

        log::info!(
            "SyntheticCamera: connected to {} ({}x{})",
            uri,
            config.width,
            config.height
        );

        Ok(Self {
            uri: uri.to_string(),
            scene,
            width: config.width,
            height: config.height,
            format,
            frame_limit,
            frame_interval,
            frame_count: 0,
            last_frame_at: None,
            released: false,
        })
    }

    /// Horizontal span of the figure in frame `n`, as `(x1, x2)`.
    pub fn figure_span(&self, n: u64) -> (u32, u32) {
        let figure_w = (self.width / 10).max(1);
        let travel = self.width.saturating_sub(figure_w).max(1) as u64;
        let step = (self.width as u64 / 60).max(1);
        let x1 = ((n.saturating_sub(1) * step) % travel) as u32;
        (x1, x1 + figure_w)
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }

    fn render(&self, n: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![BACKGROUND; w * h * 3];
        if self.scene == Scene::Empty {
            return pixels;
        }

        let (x1, x2) = self.figure_span(n);
        let y1 = h / 4;
        let y2 = (h * 3 / 4).max(y1 + 1);
        for y in y1..y2 {
            let row = y * w * 3;
            for x in x1 as usize..x2 as usize {
                let offset = row + x * 3;
                pixels[offset..offset + 3].fill(FIGURE);
            }
        }
        pixels
    }
}

impl CaptureDevice for SyntheticCamera {
    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn read_frame(&mut self, clock: &SessionClock) -> Result<Option<Frame>> {
        if self.released {
            return Err(PipelineError::FrameRead(format!("{} already released", self.uri)).into());
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }

        self.pace();
        self.frame_count += 1;

        // The figure is symmetric in every channel, so BGR and RGB share bytes.
        let pixels = self.render(self.frame_count);
        Ok(Some(Frame::new(
            pixels,
            self.width,
            self.height,
            self.format,
            clock.now(),
            self.frame_count,
        )))
    }

    fn release(&mut self) {
        if !self.released {
            log::info!(
                "SyntheticCamera: released {} after {} frames",
                self.uri,
                self.frame_count
            );
        }
        self.released = true;
    }
}
