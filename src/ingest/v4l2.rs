//! V4L2 camera source.
//!
//! Opens a local device node (e.g. /dev/video0), asks for RGB24 at the
//! configured size and falls back to whatever the driver negotiates as long as
//! it is a layout the pipeline can convert.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::{CameraConfig, CaptureDevice};
use crate::frame::{Frame, PixelFormat, SessionClock};
use crate::PipelineError;

pub struct V4l2Camera {
    device_path: String,
    state: Option<V4l2State>,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub fn open(device_path: &str, config: &CameraConfig) -> Result<Self> {
        Self::connect(device_path, config)
            .map_err(|err| PipelineError::DeviceOpen(format!("{}: {:#}", device_path, err)).into())
    }

    fn connect(device_path: &str, config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(device_path)
            .with_context(|| format!("open v4l2 device {}", device_path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    device_path,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = match &format.fourcc.repr {
            b"RGB3" => PixelFormat::Rgb24,
            b"BGR3" => PixelFormat::Bgr24,
            b"NV12" => PixelFormat::Nv12,
            other => {
                return Err(anyhow::anyhow!(
                    "unsupported pixel format {}",
                    String::from_utf8_lossy(other)
                ))
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Camera: failed to set fps on {}: {}", device_path, err);
            }
        }

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: connected to {} ({}x{} {:?})",
            device_path,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            device_path: device_path.to_string(),
            state: Some(state),
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }
}

impl CaptureDevice for V4l2Camera {
    fn describe(&self) -> String {
        self.device_path.clone()
    }

    fn read_frame(&mut self, clock: &SessionClock) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or_else(|| {
            PipelineError::FrameRead(format!("{} not connected", self.device_path))
        })?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| PipelineError::FrameRead(format!("{}: {}", self.device_path, err)))?;

        self.frame_count += 1;
        Ok(Some(Frame::new(
            buf.to_vec(),
            self.width,
            self.height,
            self.format,
            clock.now(),
            self.frame_count,
        )))
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Camera: released {} after {} frames",
                self.device_path,
                self.frame_count
            );
        }
    }
}
