//! Capture device boundary.
//!
//! Sources available:
//! - `stub://...` synthetic cameras (always compiled, used by tests and demos)
//! - V4L2 devices such as `/dev/video0` (feature: ingest-v4l2)
//!
//! A device is opened by index, read frame by frame on the capture worker's
//! thread and released when the session leaves RUNNING. Reads block; no
//! timeout is imposed.

use anyhow::Result;

use crate::frame::{Frame, SessionClock};

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub(crate) use normalize::normalize_to_rgb;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

/// Camera selection and preferred capture geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device index, mapped to `/dev/video{index}` unless `device` is set.
    pub index: u32,
    /// Explicit device (`stub://walker`, `/dev/video2`, ...).
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Target frame rate. Zero means "as fast as the device delivers".
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            device: None,
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

impl CameraConfig {
    /// Device string used for camera `index`.
    pub fn device_for(&self, index: u32) -> String {
        match &self.device {
            Some(device) => device.clone(),
            None => format!("/dev/video{}", index),
        }
    }
}

/// An open capture device handle.
pub trait CaptureDevice: Send {
    /// Human readable device identifier for logs.
    fn describe(&self) -> String;

    /// Read the next frame. `Ok(None)` means end of stream.
    fn read_frame(&mut self, clock: &SessionClock) -> Result<Option<Frame>>;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);
}

/// Opens capture devices by index.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>>;
}

/// Capture backend that dispatches on the configured device string.
#[derive(Clone, Debug, Default)]
pub struct CameraBackend {
    config: CameraConfig,
}

impl CameraBackend {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

impl CaptureBackend for CameraBackend {
    fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>> {
        open_camera(&self.config, index)
    }
}

/// Open the camera described by `config` at `index`.
pub fn open_camera(config: &CameraConfig, index: u32) -> Result<Box<dyn CaptureDevice>> {
    let device = config.device_for(index);
    if device.starts_with("stub://") {
        let camera = SyntheticCamera::open(&device, config)?;
        return Ok(Box::new(camera));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        let camera = V4l2Camera::open(&device, config)?;
        Ok(Box::new(camera))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow::anyhow!(
            "device {} requires the ingest-v4l2 feature",
            device
        ))
    }
}
