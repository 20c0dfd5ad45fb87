//! spatial-cue - directional audio cues for people seen by a camera
//!
//! Opens the configured camera, runs person detection on every frame and
//! plays a left / center / right cue for where a person stands. Commands are
//! read from stdin (`start`, `stop`, `quit`); Ctrl-C closes the session.

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use spatial_cue::annotate::Annotator;
use spatial_cue::ingest::CameraBackend;
use spatial_cue::ui::Ui;
use spatial_cue::{
    AppConfig, AudioSystem, BlobBackend, DetectionAdapter, LatestFrame, SessionCommand,
    SessionController, SessionParts,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(
    name = "spatial-cue",
    version,
    about = "Play directional audio cues for people detected on a camera"
)]
struct Args {
    /// JSON config file (overrides SPATIAL_CUE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Capture device, e.g. /dev/video2 or stub://walker
    #[arg(long)]
    device: Option<String>,

    /// Camera index mapped to /dev/video{N}
    #[arg(long, value_name = "N")]
    camera_index: Option<u32>,

    /// Minimum time between two cues, in milliseconds
    #[arg(long, value_name = "MS")]
    cooldown_ms: Option<u64>,

    /// ONNX detection model (requires the backend-tract feature)
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Wait for a `start` command instead of starting immediately
    #[arg(long)]
    no_autostart: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = match &args.config {
            Some(path) => AppConfig::load_from(Some(path.as_path()))?,
            None => AppConfig::load()?,
        };
        apply_args(&mut cfg, &args);
        cfg.validate()?;
        cfg
    };

    let detector = {
        let _stage = ui.stage("Load detector");
        build_detector(&cfg)?
    };

    let audio = {
        let _stage = ui.stage("Start audio");
        build_audio(&cfg)?
    };

    let annotator = match &cfg.font_path {
        Some(path) => Annotator::with_font_file(path)?,
        None => Annotator::new(),
    };

    let presenter = Arc::new(LatestFrame::new());
    let mut session = SessionController::new(SessionParts {
        capture: Arc::new(CameraBackend::new(cfg.camera.clone())),
        detector,
        audio,
        presenter: presenter.clone(),
        annotator: Arc::new(annotator),
        camera_index: cfg.camera.index,
        target_label: cfg.cue.target_label.clone(),
        cooldown: cfg.cue.cooldown,
    });

    let (tx, rx) = unbounded();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(SessionCommand::Close);
    })?;
    spawn_stdin_reader(tx)?;

    log::info!(
        "spatial-cue ready: camera {}, target {:?}, cooldown {} ms",
        cfg.camera.device_for(cfg.camera.index),
        cfg.cue.target_label,
        cfg.cue.cooldown.as_millis()
    );
    if !args.no_autostart {
        // Keep running after a failed start; the user can retry with `start`.
        if let Err(err) = session.handle(SessionCommand::Start) {
            log::warn!("autostart failed: {:#}", err);
        }
    }

    let mut status = ui.status_view();
    status.update(&presenter.status());
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(SessionCommand::Close) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                if let Err(err) = session.handle(command) {
                    log::warn!("{:?} failed: {:#}", command, err);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        if session.reap() {
            log::info!("session ended by the capture device");
        }
        status.update(&presenter.status());
    }

    session.close()?;
    status.update(&presenter.status());
    status.finish();
    Ok(())
}

fn apply_args(cfg: &mut AppConfig, args: &Args) {
    if let Some(device) = &args.device {
        cfg.camera.device = Some(device.clone());
    }
    if let Some(index) = args.camera_index {
        cfg.camera.index = index;
    }
    if let Some(millis) = args.cooldown_ms {
        cfg.cue.cooldown = Duration::from_millis(millis);
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
}

fn build_detector(cfg: &AppConfig) -> Result<DetectionAdapter> {
    #[cfg(feature = "backend-tract")]
    {
        use spatial_cue::detect::{TractConfig, TractYoloBackend};
        use spatial_cue::DetectorBackend;

        if let Some(model_path) = &cfg.detector.model_path {
            let mut backend = TractYoloBackend::load(&TractConfig {
                model_path: model_path.clone(),
                labels_path: cfg.detector.labels_path.clone(),
                input_size: cfg.detector.input_size,
                confidence_threshold: cfg.detector.confidence_threshold,
                iou_threshold: cfg.detector.iou_threshold,
            })?;
            backend.warm_up()?;
            return Ok(DetectionAdapter::from_backend(backend));
        }
    }

    #[cfg(not(feature = "backend-tract"))]
    {
        if let Some(model_path) = &cfg.detector.model_path {
            log::warn!(
                "model {} ignored: built without the backend-tract feature",
                model_path.display()
            );
        }
    }

    log::info!("using the built-in blob detector");
    Ok(DetectionAdapter::from_backend(BlobBackend::new()))
}

fn build_audio(cfg: &AppConfig) -> Result<AudioSystem> {
    if !cfg.audio.enabled {
        return AudioSystem::logging();
    }

    #[cfg(feature = "audio-cpal")]
    {
        use spatial_cue::audio::CpalOutput;
        use spatial_cue::{CueBank, CueOutput};

        let bank = match &cfg.audio.sounds_dir {
            Some(dir) => CueBank::load_dir(dir)?,
            None => CueBank::synthesized(),
        };
        AudioSystem::spawn(move || Ok(Box::new(CpalOutput::open(bank)?) as Box<dyn CueOutput>))
    }

    #[cfg(not(feature = "audio-cpal"))]
    {
        if let Some(dir) = &cfg.audio.sounds_dir {
            log::warn!(
                "sounds in {} ignored: built without the audio-cpal feature",
                dir.display()
            );
        }
        AudioSystem::logging()
    }
}

fn spawn_stdin_reader(tx: Sender<SessionCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let command = match line.trim() {
                    "start" => SessionCommand::Start,
                    "stop" => SessionCommand::Stop,
                    "quit" | "q" | "exit" => SessionCommand::Close,
                    "" => continue,
                    other => {
                        eprintln!("unknown command {:?} (start|stop|quit)", other);
                        continue;
                    }
                };
                if tx.send(command).is_err() {
                    break;
                }
            }
        })?;
    Ok(())
}
