use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use spatial_cue::annotate::Annotator;
use spatial_cue::ingest::CameraBackend;
use spatial_cue::session::{WorkerExit, OPEN_ERROR_MESSAGE, OPEN_ERROR_TITLE};
use spatial_cue::{
    AudioSystem, BlobBackend, CameraConfig, Controls, CueOutput, DetectionAdapter, LatestFrame,
    PipelineError, Presenter, PublishedFrame, SessionCommand, SessionController, SessionParts, SessionState, WorkerState,
    Zone, STATUS_STOPPED,
};

const WAIT: Duration = Duration::from_secs(5);

struct ForwardOutput(Sender<Zone>);

impl CueOutput for ForwardOutput {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn play(&mut self, zone: Zone) -> Result<()> {
        self.0.send(zone).map_err(|_| anyhow!("test receiver gone"))
    }
}

struct Harness {
    session: SessionController,
    presenter: Arc<LatestFrame>,
    cues: Receiver<Zone>,
}

/// Keeps the sequence of every published frame, in arrival order.
#[derive(Default)]
struct RecordingPresenter {
    latest: LatestFrame,
    sequences: Mutex<Vec<u64>>,
}

impl Presenter for RecordingPresenter {
    fn publish(&self, frame: PublishedFrame) {
        self.sequences.lock().unwrap().push(frame.sequence);
        self.latest.publish(frame);
    }

    fn clear(&self) {
        self.latest.clear();
    }

    fn set_status(&self, status: &str) {
        self.latest.set_status(status);
    }

    fn set_controls(&self, controls: Controls) {
        self.latest.set_controls(controls);
    }

    fn notify_error(&self, title: &str, message: &str) {
        self.latest.notify_error(title, message);
    }
}

fn harness(device: &str, cooldown: Duration) -> Harness {
    let presenter = Arc::new(LatestFrame::new());
    let (session, cues) = controller(device, cooldown, presenter.clone());
    Harness {
        session,
        presenter,
        cues,
    }
}

fn controller(
    device: &str,
    cooldown: Duration,
    presenter: Arc<dyn Presenter>,
) -> (SessionController, Receiver<Zone>) {
    let (tx, cues) = crossbeam_channel::unbounded();
    let audio = AudioSystem::spawn(move || Ok(Box::new(ForwardOutput(tx)) as Box<dyn CueOutput>))
        .expect("audio");
    let capture = CameraBackend::new(CameraConfig {
        device: Some(device.to_string()),
        width: 120,
        height: 40,
        target_fps: 100,
        ..CameraConfig::default()
    });
    let session = SessionController::new(SessionParts {
        capture: Arc::new(capture),
        detector: DetectionAdapter::from_backend(BlobBackend::new()),
        audio,
        presenter,
        annotator: Arc::new(Annotator::new()),
        camera_index: 0,
        target_label: "person".to_string(),
        cooldown,
    });
    (session, cues)
}

fn reap_within(session: &mut SessionController, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if session.reap() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn assert_stopped_and_cleared(h: &Harness) {
    assert_eq!(h.session.state(), SessionState::Stopped);
    assert_eq!(h.session.worker_state(), WorkerState::Idle);
    assert!(h.presenter.latest().is_none());
    assert_eq!(h.presenter.status(), STATUS_STOPPED);
    assert_eq!(h.presenter.controls(), Controls::STOPPED);
}

#[test]
fn double_start_runs_one_worker() -> Result<()> {
    let mut h = harness("stub://walker", Duration::from_secs(1));
    h.session.start()?;
    h.session.start()?;
    assert_eq!(h.session.state(), SessionState::Running);
    assert_eq!(h.session.sessions_started(), 1);
    assert_eq!(h.presenter.controls(), Controls::RUNNING);

    assert!(h.presenter.wait_for_published(3, WAIT));
    let frame = h.presenter.latest().expect("published frame");
    assert!(frame.status.starts_with("Status: Detecting..."));

    h.session.stop()?;
    assert_stopped_and_cleared(&h);
    assert_eq!(
        h.session.last_report().map(|r| r.exit.clone()),
        Some(WorkerExit::Stopped)
    );
    Ok(())
}

#[test]
fn stop_when_stopped_is_a_noop() -> Result<()> {
    let mut h = harness("stub://walker", Duration::from_secs(1));
    h.session.handle(SessionCommand::Stop)?;
    h.session.handle(SessionCommand::Stop)?;
    assert_stopped_and_cleared(&h);
    assert_eq!(h.session.sessions_started(), 0);
    Ok(())
}

#[test]
fn open_failure_reports_once_and_launches_nothing() {
    let mut h = harness("stub://offline", Duration::from_secs(1));
    let err = h.session.start().expect_err("offline camera");
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::DeviceOpen(_))
    ));
    assert_stopped_and_cleared(&h);
    assert_eq!(h.session.sessions_started(), 0);
    assert_eq!(
        h.presenter.errors(),
        vec![(OPEN_ERROR_TITLE.to_string(), OPEN_ERROR_MESSAGE.to_string())]
    );
    assert_eq!(h.presenter.published_count(), 0);
}

#[test]
fn end_of_stream_ends_the_session_and_clears_display() -> Result<()> {
    let mut h = harness("stub://walker?frames=5", Duration::from_secs(1));
    h.session.start()?;
    assert!(reap_within(&mut h.session, WAIT));
    assert_stopped_and_cleared(&h);

    let report = h.session.last_report().expect("worker report");
    assert_eq!(report.frames, 5);
    assert!(matches!(
        report.exit,
        WorkerExit::CaptureFailed(PipelineError::FrameRead(_))
    ));
    assert_eq!(h.presenter.published_count(), 5);
    // No user-facing error for a session that ran and ended.
    assert!(h.presenter.errors().is_empty());
    Ok(())
}

#[test]
fn self_ended_session_reads_stopped_before_reap() -> Result<()> {
    let mut h = harness("stub://walker?frames=2", Duration::from_secs(1));
    h.session.start()?;
    assert!(h.presenter.wait_for_controls(Controls::STOPPED, WAIT));
    // No reap yet: the released device must already show as STOPPED.
    assert_eq!(h.session.state(), SessionState::Stopped);
    assert_eq!(h.session.worker_state(), WorkerState::Idle);
    assert!(h.presenter.latest().is_none());

    // A new start joins the finished worker and runs a fresh one.
    h.session.start()?;
    assert_eq!(h.session.sessions_started(), 2);
    assert!(h.presenter.wait_for_controls(Controls::STOPPED, WAIT));
    assert!(reap_within(&mut h.session, WAIT));
    Ok(())
}

#[test]
fn frames_are_published_in_capture_order() -> Result<()> {
    let presenter = Arc::new(RecordingPresenter::default());
    let (mut session, _cues) =
        controller("stub://walker?frames=12", Duration::from_secs(1), presenter.clone());
    session.start()?;
    assert!(reap_within(&mut session, WAIT));

    let sequences = presenter.sequences.lock().unwrap().clone();
    assert_eq!(sequences, (1..=12).collect::<Vec<u64>>());
    assert_eq!(session.last_report().map(|r| r.dropped_frames), Some(0));
    Ok(())
}

#[test]
fn walker_triggers_left_cue_first() -> Result<()> {
    let mut h = harness("stub://walker?frames=3", Duration::from_secs(60));
    h.session.start()?;
    assert!(reap_within(&mut h.session, WAIT));

    assert_eq!(h.cues.recv_timeout(WAIT)?, Zone::Left);
    // Cooldown outlasts the session; only one cue.
    assert!(h.cues.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(h.session.last_report().map(|r| r.cues), Some(1));
    Ok(())
}

#[test]
fn restart_gets_a_fresh_cooldown() -> Result<()> {
    let mut h = harness("stub://walker", Duration::from_secs(60));
    h.session.start()?;
    assert_eq!(h.cues.recv_timeout(WAIT)?, Zone::Left);
    h.session.stop()?;

    h.session.start()?;
    assert_eq!(h.session.sessions_started(), 2);
    assert_eq!(h.cues.recv_timeout(WAIT)?, Zone::Left);
    h.session.stop()?;
    Ok(())
}

#[test]
fn close_stops_the_session_and_audio() -> Result<()> {
    let mut h = harness("stub://walker", Duration::from_secs(1));
    h.session.start()?;
    assert!(h.presenter.wait_for_published(1, WAIT));
    h.session.handle(SessionCommand::Close)?;
    assert_stopped_and_cleared(&h);
    assert!(h.session.is_closed());
    assert!(h.session.start().is_err());
    Ok(())
}
