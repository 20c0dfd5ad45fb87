//! Spatial cue pipeline.
//!
//! Samples a camera, detects people in each frame and plays a directional
//! audio cue (left / center / right) for where a person stands, rate limited
//! by a cooldown window.
//!
//! Data flow for one detection pass:
//!
//! ```text
//! CaptureDevice -> Frame -> DetectionAdapter -> CueDispatcher -> annotate -> Presenter
//!                                                  |
//!                                                  +-> CuePlayer (audio thread)
//! ```
//!
//! `SessionController` owns the lifecycle; `CaptureWorker` runs the loop on its
//! own thread and checks a shared running flag between frames.

use std::fmt;

pub mod annotate;
pub mod audio;
pub mod config;
pub mod cue;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod session;
pub mod ui;

pub use audio::{AudioSystem, CueBank, CueClip, CueOutput, CuePlayer, LogOutput};
pub use config::AppConfig;
pub use cue::{zone_for, CooldownGate, CueDispatcher, DispatchOutcome, Zone};
pub use detect::{
    BlobBackend, BoundingBox, Detection, DetectionAdapter, DetectorBackend, RawDetection,
    ScriptedBackend,
};
pub use frame::{Frame, PixelFormat, SessionClock};
pub use ingest::{open_camera, CameraConfig, CaptureBackend, CaptureDevice, SyntheticCamera};
pub use session::{
    Controls, LatestFrame, Presenter, PublishedFrame, SessionCommand, SessionController,
    SessionParts, SessionState, WorkerState,
};

/// Status line shown while no session is running.
pub const STATUS_STOPPED: &str = "Status: Stopped";

/// Status line shown right after a session starts.
pub const STATUS_DETECTING: &str = "Status: Detecting...";

/// Failure kinds with distinct propagation policies.
///
/// Carried inside `anyhow::Error`; callers that need the policy use
/// `err.downcast_ref::<PipelineError>()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// The capture device could not be opened. Fatal to `start()` only.
    DeviceOpen(String),
    /// A frame read failed or the stream ended. Fatal to the session.
    FrameRead(String),
    /// The detector could not process one frame. Transient.
    DetectionUnavailable(String),
}

impl PipelineError {
    /// True when the failure ends the running session.
    pub fn halts_session(&self) -> bool {
        matches!(self, PipelineError::DeviceOpen(_) | PipelineError::FrameRead(_))
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DeviceOpen(msg) => write!(f, "capture device open failed: {}", msg),
            PipelineError::FrameRead(msg) => write!(f, "frame read failed: {}", msg),
            PipelineError::DetectionUnavailable(msg) => {
                write!(f, "detection unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_device_failures_halt_the_session() {
        assert!(PipelineError::DeviceOpen("x".into()).halts_session());
        assert!(PipelineError::FrameRead("x".into()).halts_session());
        assert!(!PipelineError::DetectionUnavailable("x".into()).halts_session());
    }

    #[test]
    fn pipeline_error_survives_anyhow_round_trip() {
        let err = anyhow::Error::new(PipelineError::FrameRead("eof".into()));
        let err = err.context("capture loop");
        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::FrameRead("eof".into()))
        );
    }
}
