use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::presenter::{Controls, Presenter};
use super::worker::{CaptureWorker, WorkerReport, WorkerState, WorkerStatus};
use crate::annotate::Annotator;
use crate::audio::{AudioSystem, CuePlayer};
use crate::cue::CueDispatcher;
use crate::detect::DetectionAdapter;
use crate::ingest::CaptureBackend;
use crate::{PipelineError, STATUS_DETECTING, STATUS_STOPPED};

/// Title and message shown when the camera cannot be opened.
pub const OPEN_ERROR_TITLE: &str = "Error";
pub const OPEN_ERROR_MESSAGE: &str = "Could not open webcam";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

/// Commands from the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    /// Window close: stop, then tear down audio.
    Close,
}

/// Long-lived collaborators injected into the controller.
pub struct SessionParts {
    pub capture: Arc<dyn CaptureBackend>,
    pub detector: DetectionAdapter,
    pub audio: AudioSystem,
    pub presenter: Arc<dyn Presenter>,
    pub annotator: Arc<Annotator>,
    pub camera_index: u32,
    pub target_label: String,
    pub cooldown: Duration,
}

struct ActiveWorker {
    running: Arc<AtomicBool>,
    status: Arc<WorkerStatus>,
    join: JoinHandle<WorkerReport>,
}

/// Start/stop state machine for capture sessions.
///
/// Owns at most one capture worker. State is RUNNING exactly while a worker
/// holds an open device; a worker that ended on its own reads as STOPPED at
/// once and is joined by the next `reap`, `start` or `stop`.
pub struct SessionController {
    capture: Arc<dyn CaptureBackend>,
    detector: DetectionAdapter,
    audio: Option<AudioSystem>,
    player: CuePlayer,
    presenter: Arc<dyn Presenter>,
    annotator: Arc<Annotator>,
    camera_index: u32,
    target_label: String,
    cooldown: Duration,
    worker: Option<ActiveWorker>,
    sessions_started: u64,
    last_report: Option<WorkerReport>,
}

impl SessionController {
    pub fn new(parts: SessionParts) -> Self {
        let player = parts.audio.player();
        parts.presenter.set_status(STATUS_STOPPED);
        parts.presenter.set_controls(Controls::STOPPED);
        Self {
            capture: parts.capture,
            detector: parts.detector,
            audio: Some(parts.audio),
            player,
            presenter: parts.presenter,
            annotator: parts.annotator,
            camera_index: parts.camera_index,
            target_label: parts.target_label,
            cooldown: parts.cooldown,
            worker: None,
            sessions_started: 0,
            last_report: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker)
                if !worker.join.is_finished() && worker.status.get() != WorkerState::Idle =>
            {
                SessionState::Running
            }
            _ => SessionState::Stopped,
        }
    }

    /// Lifecycle state of the current worker, IDLE when there is none.
    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .as_ref()
            .map(|worker| worker.status.get())
            .unwrap_or(WorkerState::Idle)
    }

    /// Number of workers launched since creation.
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Report of the most recently finished worker.
    pub fn last_report(&self) -> Option<&WorkerReport> {
        self.last_report.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.audio.is_none()
    }

    /// Open the camera and launch a worker. No-op while RUNNING.
    ///
    /// An open failure is reported to the presenter once and returned as
    /// `PipelineError::DeviceOpen`; the state stays STOPPED.
    pub fn start(&mut self) -> Result<()> {
        if self.state() == SessionState::Running {
            log::debug!("start ignored: session already running");
            return Ok(());
        }
        // A worker that already released its device may still be unwinding.
        if let Some(worker) = self.worker.take() {
            self.finish(worker)?;
        }
        if self.is_closed() {
            return Err(anyhow!("session controller is closed"));
        }

        let device = match self.capture.open(self.camera_index) {
            Ok(device) => device,
            Err(err) => {
                let kind = match err.downcast_ref::<PipelineError>() {
                    Some(PipelineError::DeviceOpen(msg)) => PipelineError::DeviceOpen(msg.clone()),
                    _ => PipelineError::DeviceOpen(format!(
                        "camera {}: {:#}",
                        self.camera_index, err
                    )),
                };
                log::error!("{}", kind);
                self.presenter
                    .notify_error(OPEN_ERROR_TITLE, OPEN_ERROR_MESSAGE);
                return Err(kind.into());
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let status = Arc::new(WorkerStatus::new(WorkerState::Idle));
        // Fresh dispatcher per session so the cooldown starts open.
        let dispatcher = CueDispatcher::new(
            self.target_label.clone(),
            self.cooldown,
            self.player.clone(),
        );
        let worker = CaptureWorker::new(
            device,
            self.detector.clone(),
            dispatcher,
            self.annotator.clone(),
            self.presenter.clone(),
            running.clone(),
            status.clone(),
        );

        // Before the spawn, so a worker that ends at once has the last word.
        self.presenter.set_status(STATUS_DETECTING);
        self.presenter.set_controls(Controls::RUNNING);
        let join = match std::thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || worker.run())
        {
            Ok(join) => join,
            Err(err) => {
                self.presenter.set_status(STATUS_STOPPED);
                self.presenter.set_controls(Controls::STOPPED);
                return Err(anyhow!("failed to spawn capture worker: {}", err));
            }
        };

        self.worker = Some(ActiveWorker {
            running,
            status,
            join,
        });
        self.sessions_started += 1;
        log::info!("session #{} started", self.sessions_started);
        Ok(())
    }

    /// Ask the worker to stop and wait for its cleanup. No-op while STOPPED.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.running.store(false, Ordering::Release);
        let joined = self.finish(worker);
        log::info!("session stopped");
        joined
    }

    /// Collect a worker that ended on its own. Returns true when one was collected.
    pub fn reap(&mut self) -> bool {
        let finished = self
            .worker
            .as_ref()
            .map(|worker| worker.join.is_finished())
            .unwrap_or(false);
        if !finished {
            return false;
        }
        if let Some(worker) = self.worker.take() {
            if let Err(err) = self.finish(worker) {
                log::error!("{:#}", err);
            }
        }
        true
    }

    /// Stop the session and tear down audio. Later starts fail.
    pub fn close(&mut self) -> Result<()> {
        let stopped = self.stop();
        if let Some(audio) = self.audio.take() {
            audio.shutdown()?;
        }
        stopped
    }

    pub fn handle(&mut self, command: SessionCommand) -> Result<()> {
        match command {
            SessionCommand::Start => self.start(),
            SessionCommand::Stop => self.stop(),
            SessionCommand::Close => self.close(),
        }
    }

    fn finish(&mut self, worker: ActiveWorker) -> Result<()> {
        let joined = worker.join.join();
        self.presenter.clear();
        self.presenter.set_status(STATUS_STOPPED);
        self.presenter.set_controls(Controls::STOPPED);
        match joined {
            Ok(report) => {
                log::debug!("worker exited: {:?}", report.exit);
                self.last_report = Some(report);
                Ok(())
            }
            Err(_) => Err(anyhow!("capture worker panicked")),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("session teardown failed: {:#}", err);
        }
    }
}
