use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::CameraConfig;

const DEFAULT_TARGET_LABEL: &str = "person";
const DEFAULT_COOLDOWN_MS: u64 = 1000;
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    cue: Option<CueConfigFile>,
    audio: Option<AudioConfigFile>,
    annotate: Option<AnnotateConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    index: Option<u32>,
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CueConfigFile {
    target_label: Option<String>,
    cooldown_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AudioConfigFile {
    sounds_dir: Option<PathBuf>,
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub detector: DetectorSettings,
    pub cue: CueSettings,
    pub audio: AudioSettings,
    /// Font for box labels; the bundled DejaVu Sans is used when unset.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model. The built-in blob detector is used when unset.
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct CueSettings {
    pub target_label: String,
    pub cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Directory holding left.wav, center.wav and right.wav.
    pub sounds_dir: Option<PathBuf>,
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Defaults never fail to build.
        Self::from_file(AppConfigFile::default())
    }
}

impl AppConfig {
    /// Load from `SPATIAL_CUE_CONFIG` (if set) and environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SPATIAL_CUE_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit JSON file, then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let defaults = CameraConfig::default();
        let camera = CameraConfig {
            index: camera_file.index.unwrap_or(defaults.index),
            device: camera_file.device.filter(|device| !device.trim().is_empty()),
            width: camera_file.width.unwrap_or(defaults.width),
            height: camera_file.height.unwrap_or(defaults.height),
            target_fps: camera_file.target_fps.unwrap_or(defaults.target_fps),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            model_path: detector_file.model_path,
            labels_path: detector_file.labels_path,
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };

        let cue_file = file.cue.unwrap_or_default();
        let cue = CueSettings {
            target_label: cue_file
                .target_label
                .unwrap_or_else(|| DEFAULT_TARGET_LABEL.to_string()),
            cooldown: Duration::from_millis(cue_file.cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS)),
        };

        let audio_file = file.audio.unwrap_or_default();
        let audio = AudioSettings {
            sounds_dir: audio_file.sounds_dir,
            enabled: audio_file.enabled.unwrap_or(true),
        };

        Self {
            camera,
            detector,
            cue,
            audio,
            font_path: file.annotate.and_then(|annotate| annotate.font_path),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(index) = std::env::var("SPATIAL_CUE_CAMERA_INDEX") {
            self.camera.index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("SPATIAL_CUE_CAMERA_INDEX must be a non-negative integer"))?;
        }
        if let Ok(device) = std::env::var("SPATIAL_CUE_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = Some(device);
            }
        }
        if let Ok(cooldown) = std::env::var("SPATIAL_CUE_COOLDOWN_MS") {
            let millis: u64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("SPATIAL_CUE_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.cue.cooldown = Duration::from_millis(millis);
        }
        if let Ok(label) = std::env::var("SPATIAL_CUE_TARGET_LABEL") {
            if !label.trim().is_empty() {
                self.cue.target_label = label;
            }
        }
        if let Ok(model) = std::env::var("SPATIAL_CUE_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(dir) = std::env::var("SPATIAL_CUE_SOUNDS_DIR") {
            if !dir.trim().is_empty() {
                self.audio.sounds_dir = Some(PathBuf::from(dir));
            }
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        self.cue.target_label = self.cue.target_label.trim().to_string();
        if self.cue.target_label.is_empty() {
            return Err(anyhow!("cue target label must not be empty"));
        }
        for (name, value) in [
            ("confidence threshold", self.detector.confidence_threshold),
            ("iou threshold", self.detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
