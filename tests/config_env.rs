use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use spatial_cue::config::AppConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SPATIAL_CUE_CONFIG",
        "SPATIAL_CUE_CAMERA_INDEX",
        "SPATIAL_CUE_DEVICE",
        "SPATIAL_CUE_COOLDOWN_MS",
        "SPATIAL_CUE_TARGET_LABEL",
        "SPATIAL_CUE_MODEL",
        "SPATIAL_CUE_SOUNDS_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": {
            "index": 1,
            "width": 1280,
            "height": 720,
            "target_fps": 15
        },
        "detector": {
            "model_path": "models/yolov8n.onnx",
            "confidence_threshold": 0.4
        },
        "cue": {
            "target_label": "person",
            "cooldown_ms": 500
        },
        "audio": {
            "sounds_dir": "sounds",
            "enabled": false
        },
        "annotate": {
            "font_path": "fonts/DejaVuSans.ttf"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SPATIAL_CUE_CONFIG", file.path());
    std::env::set_var("SPATIAL_CUE_DEVICE", "stub://walker");
    std::env::set_var("SPATIAL_CUE_COOLDOWN_MS", "1500");
    std::env::set_var("SPATIAL_CUE_TARGET_LABEL", "dog");

    let cfg = AppConfig::load().expect("load config");

    assert_eq!(cfg.camera.index, 1);
    assert_eq!(cfg.camera.device.as_deref(), Some("stub://walker"));
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.camera.height, 720);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(
        cfg.detector.model_path.as_deref(),
        Some(std::path::Path::new("models/yolov8n.onnx"))
    );
    assert_eq!(cfg.detector.confidence_threshold, 0.4);
    assert_eq!(cfg.detector.iou_threshold, 0.45);
    assert_eq!(cfg.cue.cooldown, Duration::from_millis(1500));
    assert_eq!(cfg.cue.target_label, "dog");
    assert!(!cfg.audio.enabled);
    assert!(cfg.font_path.is_some());

    clear_env();
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.camera.index, 0);
    assert!(cfg.camera.device.is_none());
    assert_eq!(cfg.cue.target_label, "person");
    assert_eq!(cfg.cue.cooldown, Duration::from_secs(1));
    assert!(cfg.audio.sounds_dir.is_none());
}

#[test]
fn rejects_non_numeric_cooldown() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPATIAL_CUE_COOLDOWN_MS", "soon");
    let err = AppConfig::load().expect_err("invalid cooldown");
    assert!(err.to_string().contains("SPATIAL_CUE_COOLDOWN_MS"));

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("SPATIAL_CUE_CONFIG", file.path());

    let err = AppConfig::load().expect_err("malformed config");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
