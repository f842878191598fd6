use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use firewatch::config::FirewatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FIREWATCH_CONFIG",
        "FIREWATCH_SOURCE",
        "FIREWATCH_MODEL",
        "FIREWATCH_CONF_THRESH",
        "FIREWATCH_CONSECUTIVE",
        "FIREWATCH_COOLDOWN_SECS",
        "FIREWATCH_TARGET_CLASSES",
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
        "source": "stub://front_yard",
        "target_fps": 8,
        "conf_threshold": 0.4,
        "detector": {
            "model_path": "models/fire.onnx",
            "input_width": 416,
            "input_height": 416
        },
        "alert": {
            "target_classes": [0, 1],
            "consecutive": 4,
            "cooldown_secs": 60,
            "class_labels": {"0": "fire", "1": "smoke"}
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FIREWATCH_CONFIG", file.path());
    std::env::set_var("FIREWATCH_SOURCE", "stub://rear_gate");
    std::env::set_var("FIREWATCH_COOLDOWN_SECS", "120");
    std::env::set_var("FIREWATCH_TARGET_CLASSES", "0");

    let cfg = FirewatchConfig::load().expect("load config");

    assert_eq!(cfg.source, "stub://rear_gate");
    assert_eq!(cfg.target_fps, 8);
    assert_eq!(cfg.conf_threshold, 0.4);
    assert_eq!(cfg.detector.model_path.as_deref(), Some("models/fire.onnx"));
    assert_eq!(cfg.detector.input_width, 416);
    assert_eq!(cfg.alert.consecutive, 4);
    assert_eq!(cfg.alert.cooldown, Duration::from_secs(120));
    assert_eq!(cfg.alert.target_classes, vec![0]);
    assert_eq!(cfg.class_label(1), "smoke");

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FirewatchConfig::load().expect("load config");

    assert_eq!(cfg.source, "stub://demo");
    assert_eq!(cfg.alert.consecutive, 3);
    assert_eq!(cfg.alert.cooldown, Duration::from_secs(30));
    assert_eq!(cfg.alert.target_classes, vec![0, 1]);
    assert!(cfg.detector.model_path.is_none());
    assert!(cfg.telegram.is_none());
}

#[test]
fn invalid_env_value_fails_fast() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FIREWATCH_CONSECUTIVE", "lots");
    assert!(FirewatchConfig::load().is_err());

    clear_env();
}
