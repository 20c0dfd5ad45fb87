use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::annotate::Annotator;
use crate::cue::{CueDispatcher, DispatchOutcome};
use crate::detect::DetectionAdapter;
use crate::frame::SessionClock;
use crate::ingest::CaptureDevice;
use crate::session::presenter::{Controls, Presenter, PublishedFrame};
use crate::{PipelineError, STATUS_DETECTING, STATUS_STOPPED};

/// Capture worker lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// No device held, loop not running.
    Idle,
    /// Device open, loop running.
    Running,
    /// Loop exited or is exiting; device being released.
    Stopping,
}

/// Worker state readable from other threads.
#[derive(Debug)]
pub struct WorkerStatus(AtomicU8);

impl WorkerStatus {
    pub fn new(state: WorkerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Idle,
        }
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Why the capture loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The running flag was cleared.
    Stopped,
    /// The device failed or ran out of frames.
    CaptureFailed(PipelineError),
}

/// Summary returned when the worker thread finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerReport {
    pub exit: WorkerExit,
    pub frames: u64,
    pub cues: u64,
    /// Frames published without fresh detections.
    pub detection_failures: u64,
    /// Frames read but not publishable (malformed pixel data).
    pub dropped_frames: u64,
}

/// Owns the capture device and runs the per-frame loop.
pub struct CaptureWorker {
    device: Box<dyn CaptureDevice>,
    detector: DetectionAdapter,
    dispatcher: CueDispatcher,
    annotator: Arc<Annotator>,
    presenter: Arc<dyn Presenter>,
    running: Arc<AtomicBool>,
    status: Arc<WorkerStatus>,
    clock: SessionClock,
    frames: u64,
    cues: u64,
    detection_failures: u64,
    dropped_frames: u64,
}

impl CaptureWorker {
    /// A worker for an already opened device. Marks the status RUNNING.
    pub fn new(
        device: Box<dyn CaptureDevice>,
        detector: DetectionAdapter,
        dispatcher: CueDispatcher,
        annotator: Arc<Annotator>,
        presenter: Arc<dyn Presenter>,
        running: Arc<AtomicBool>,
        status: Arc<WorkerStatus>,
    ) -> Self {
        status.set(WorkerState::Running);
        Self {
            device,
            detector,
            dispatcher,
            annotator,
            presenter,
            running,
            status,
            clock: SessionClock::start(),
            frames: 0,
            cues: 0,
            detection_failures: 0,
            dropped_frames: 0,
        }
    }

    /// Run until the running flag clears or capture fails, then clean up.
    pub fn run(mut self) -> WorkerReport {
        log::info!("capture worker started on {}", self.device.describe());

        let exit = loop {
            // Cancellation point.
            if !self.running.load(Ordering::Acquire) {
                break WorkerExit::Stopped;
            }
            if let Err(err) = self.process_next() {
                log::warn!("capture stopped: {}", err);
                break WorkerExit::CaptureFailed(err);
            }
        };

        self.shutdown();

        let report = WorkerReport {
            exit,
            frames: self.frames,
            cues: self.cues,
            detection_failures: self.detection_failures,
            dropped_frames: self.dropped_frames,
        };
        log::info!(
            "capture worker finished: {} frames, {} cues, {} detection failures, {} dropped",
            report.frames,
            report.cues,
            report.detection_failures,
            report.dropped_frames
        );
        report
    }

    /// One detection pass. Only capture failures are returned.
    fn process_next(&mut self) -> Result<(), PipelineError> {
        let frame = match self.device.read_frame(&self.clock) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Err(PipelineError::FrameRead("end of stream".to_string())),
            Err(err) => {
                return Err(match err.downcast_ref::<PipelineError>() {
                    Some(kind) => kind.clone(),
                    None => PipelineError::FrameRead(format!("{:#}", err)),
                })
            }
        };
        self.frames += 1;

        let mut image = match frame.to_rgb_image() {
            Ok(image) => image,
            Err(err) => {
                self.dropped_frames += 1;
                log::warn!("dropping malformed frame #{}: {:#}", frame.sequence, err);
                return Ok(());
            }
        };

        let outcome = match self.detector.detect(&image) {
            Ok(detections) => {
                let now = self.clock.now();
                Some(self.dispatcher.dispatch(&detections, frame.width, now))
            }
            Err(err) => {
                self.detection_failures += 1;
                log::warn!("frame #{}: {:#}", frame.sequence, err);
                None
            }
        };

        let (status, targets, cue) = match &outcome {
            Some(outcome) => {
                if outcome.emitted {
                    self.cues += 1;
                }
                self.annotator.draw(&mut image, &outcome.annotations);
                (
                    status_line(self.dispatcher.target_label(), outcome),
                    outcome.annotations.len(),
                    outcome.zone,
                )
            }
            None => (STATUS_DETECTING.to_string(), 0, None),
        };

        self.presenter.publish(PublishedFrame {
            image,
            status,
            sequence: frame.sequence,
            targets,
            cue,
        });
        Ok(())
    }

    /// Release the device and reset the display. Safe to repeat.
    fn shutdown(&mut self) {
        self.status.set(WorkerState::Stopping);
        self.running.store(false, Ordering::Release);
        self.device.release();
        self.presenter.clear();
        // Idle before the controls flip, so observers of the controls see it.
        self.status.set(WorkerState::Idle);
        self.presenter.set_status(STATUS_STOPPED);
        self.presenter.set_controls(Controls::STOPPED);
    }
}

fn status_line(label: &str, outcome: &DispatchOutcome) -> String {
    let mut status = format!(
        "{} {} {}(s)",
        STATUS_DETECTING,
        outcome.annotations.len(),
        label
    );
    if let Some(zone) = outcome.zone {
        status.push_str(&format!(", cue {}", zone));
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CuePlayer;
    use crate::cue::Zone;
    use crate::detect::{RawDetection, ScriptedBackend};
    use crate::frame::{Frame, PixelFormat};
    use crate::ingest::{CameraConfig, SyntheticCamera};
    use crate::session::LatestFrame;
    use std::time::Duration;

    fn camera(uri: &str) -> Box<dyn CaptureDevice> {
        let config = CameraConfig {
            width: 90,
            height: 30,
            target_fps: 0,
            ..CameraConfig::default()
        };
        Box::new(SyntheticCamera::open(uri, &config).expect("synthetic camera"))
    }

    fn worker(
        uri: &str,
        backend: ScriptedBackend,
    ) -> (CaptureWorker, Arc<LatestFrame>, crossbeam_channel::Receiver<Zone>) {
        worker_on(camera(uri), backend)
    }

    fn worker_on(
        device: Box<dyn CaptureDevice>,
        backend: ScriptedBackend,
    ) -> (CaptureWorker, Arc<LatestFrame>, crossbeam_channel::Receiver<Zone>) {
        let (player, cues) = CuePlayer::channel(16);
        let presenter = Arc::new(LatestFrame::new());
        let worker = CaptureWorker::new(
            device,
            DetectionAdapter::from_backend(backend),
            CueDispatcher::new("person", Duration::from_secs(60), player),
            Arc::new(Annotator::new()),
            presenter.clone(),
            Arc::new(AtomicBool::new(true)),
            Arc::new(WorkerStatus::new(WorkerState::Idle)),
        );
        (worker, presenter, cues)
    }

    #[test]
    fn end_of_stream_stops_and_cleans_up() {
        let backend = ScriptedBackend::coco()
            .with_result(vec![RawDetection::new(0, [0.0, 0.0, 10.0, 10.0], 0.9)]);
        let (worker, presenter, cues) = worker("stub://walker?frames=3", backend);
        let status = worker.status.clone();

        let report = worker.run();
        assert_eq!(report.frames, 3);
        assert_eq!(report.cues, 1);
        assert!(matches!(
            report.exit,
            WorkerExit::CaptureFailed(PipelineError::FrameRead(_))
        ));
        assert_eq!(cues.try_iter().collect::<Vec<_>>(), vec![Zone::Left]);
        assert_eq!(presenter.published_count(), 3);
        assert!(presenter.latest().is_none());
        assert_eq!(presenter.status(), STATUS_STOPPED);
        assert_eq!(presenter.controls(), Controls::STOPPED);
        assert_eq!(status.get(), WorkerState::Idle);
    }

    #[test]
    fn detection_failure_still_publishes_the_frame() {
        let backend = ScriptedBackend::coco().with_failure("malformed input");
        let (worker, presenter, _cues) = worker("stub://walker?frames=2", backend);
        let report = worker.run();
        assert_eq!(report.frames, 2);
        assert_eq!(report.detection_failures, 1);
        assert_eq!(presenter.published_count(), 2);
    }

    /// Yields one short buffer, then one valid frame, then ends.
    struct TruncatedCamera {
        reads: u64,
    }

    impl CaptureDevice for TruncatedCamera {
        fn describe(&self) -> String {
            "truncated".to_string()
        }

        fn read_frame(&mut self, clock: &SessionClock) -> anyhow::Result<Option<Frame>> {
            self.reads += 1;
            let pixels = match self.reads {
                1 => vec![0u8; 3],
                2 => vec![0u8; 4 * 4 * 3],
                _ => return Ok(None),
            };
            Ok(Some(Frame::new(
                pixels,
                4,
                4,
                PixelFormat::Rgb24,
                clock.now(),
                self.reads,
            )))
        }

        fn release(&mut self) {}
    }

    #[test]
    fn malformed_frame_is_counted_as_dropped() {
        let (worker, presenter, _cues) =
            worker_on(Box::new(TruncatedCamera { reads: 0 }), ScriptedBackend::coco());
        let report = worker.run();
        assert_eq!(report.frames, 2);
        assert_eq!(report.dropped_frames, 1);
        assert_eq!(presenter.published_count(), 1);
    }

    #[test]
    fn cleared_flag_stops_before_reading() {
        let (worker, presenter, _cues) = worker("stub://walker", ScriptedBackend::coco());
        worker.running.store(false, Ordering::Release);
        let report = worker.run();
        assert_eq!(report.exit, WorkerExit::Stopped);
        assert_eq!(report.frames, 0);
        assert_eq!(presenter.published_count(), 0);
    }

    #[test]
    fn status_line_mentions_cue() {
        let outcome = DispatchOutcome {
            emitted: true,
            zone: Some(Zone::Right),
            annotations: Vec::new(),
        };
        assert_eq!(
            status_line("person", &outcome),
            "Status: Detecting... 0 person(s), cue RIGHT"
        );
    }
}
