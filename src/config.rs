use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_SOURCE: &str = "stub://demo";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_CONF_THRESHOLD: f32 = 0.25;
const DEFAULT_CONSECUTIVE: u32 = 3;
const DEFAULT_COOLDOWN_SECS: u64 = 30;
const DEFAULT_MODEL_WIDTH: u32 = 640;
const DEFAULT_MODEL_HEIGHT: u32 = 640;

#[derive(Debug, Deserialize, Default)]
struct FirewatchConfigFile {
    source: Option<String>,
    target_fps: Option<u32>,
    conf_threshold: Option<f32>,
    detector: Option<DetectorConfigFile>,
    alert: Option<AlertConfigFile>,
    telegram: Option<TelegramConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    target_classes: Option<Vec<u32>>,
    consecutive: Option<u32>,
    cooldown_secs: Option<u64>,
    class_labels: Option<HashMap<u32, String>>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FirewatchConfig {
    pub source: String,
    pub target_fps: u32,
    /// Detections below this confidence are treated as absent.
    pub conf_threshold: f32,
    pub detector: DetectorSettings,
    pub alert: AlertSettings,
    pub telegram: Option<TelegramSettings>,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model path. `None` selects the stub backend.
    pub model_path: Option<String>,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub target_classes: Vec<u32>,
    /// Consecutive positive frames required to confirm a class.
    pub consecutive: u32,
    pub cooldown: Duration,
    pub class_labels: HashMap<u32, String>,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl FirewatchConfig {
    /// Load configuration: optional JSON file named by `FIREWATCH_CONFIG`,
    /// then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FIREWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a specific config file, without environment
    /// overrides. Used by the CLI `--config` flag and tests.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FirewatchConfigFile) -> Self {
        let source = file.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string());
        let target_fps = file.target_fps.unwrap_or(DEFAULT_TARGET_FPS);
        let conf_threshold = file.conf_threshold.unwrap_or(DEFAULT_CONF_THRESHOLD);
        let detector = DetectorSettings {
            model_path: file.detector.as_ref().and_then(|d| d.model_path.clone()),
            input_width: file
                .detector
                .as_ref()
                .and_then(|d| d.input_width)
                .unwrap_or(DEFAULT_MODEL_WIDTH),
            input_height: file
                .detector
                .as_ref()
                .and_then(|d| d.input_height)
                .unwrap_or(DEFAULT_MODEL_HEIGHT),
        };
        let alert = AlertSettings {
            target_classes: file
                .alert
                .as_ref()
                .and_then(|a| a.target_classes.clone())
                .unwrap_or_else(default_target_classes),
            consecutive: file
                .alert
                .as_ref()
                .and_then(|a| a.consecutive)
                .unwrap_or(DEFAULT_CONSECUTIVE),
            cooldown: Duration::from_secs(
                file.alert
                    .as_ref()
                    .and_then(|a| a.cooldown_secs)
                    .unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
            class_labels: file
                .alert
                .and_then(|a| a.class_labels)
                .unwrap_or_else(default_class_labels),
        };
        let telegram = file.telegram.and_then(|t| match (t.bot_token, t.chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        });
        Self {
            source,
            target_fps,
            conf_threshold,
            detector,
            alert,
            telegram,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("FIREWATCH_SOURCE") {
            if !source.trim().is_empty() {
                self.source = source;
            }
        }
        if let Ok(model) = std::env::var("FIREWATCH_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = Some(model);
            }
        }
        if let Ok(conf) = std::env::var("FIREWATCH_CONF_THRESH") {
            self.conf_threshold = conf
                .parse()
                .map_err(|_| anyhow!("FIREWATCH_CONF_THRESH must be a number"))?;
        }
        if let Ok(consecutive) = std::env::var("FIREWATCH_CONSECUTIVE") {
            self.alert.consecutive = consecutive
                .parse()
                .map_err(|_| anyhow!("FIREWATCH_CONSECUTIVE must be an integer"))?;
        }
        if let Ok(cooldown) = std::env::var("FIREWATCH_COOLDOWN_SECS") {
            let seconds: u64 = cooldown
                .parse()
                .map_err(|_| anyhow!("FIREWATCH_COOLDOWN_SECS must be an integer number of seconds"))?;
            self.alert.cooldown = Duration::from_secs(seconds);
        }
        if let Ok(classes) = std::env::var("FIREWATCH_TARGET_CLASSES") {
            let parsed = parse_class_csv(&classes)?;
            if !parsed.is_empty() {
                self.alert.target_classes = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(anyhow!(
                "conf_threshold must be within [0, 1], got {}",
                self.conf_threshold
            ));
        }
        if self.alert.consecutive < 1 {
            return Err(anyhow!("alert.consecutive must be at least 1"));
        }
        if self.alert.target_classes.is_empty() {
            return Err(anyhow!("alert.target_classes must not be empty"));
        }
        self.alert.target_classes.sort_unstable();
        self.alert.target_classes.dedup();
        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.trim().is_empty() || telegram.chat_id.trim().is_empty() {
                return Err(anyhow!("telegram settings must not be empty when present"));
            }
        }
        Ok(())
    }

    /// Resolved label for a class id, falling back to `class<N>`.
    pub fn class_label(&self, class_id: u32) -> String {
        self.alert
            .class_labels
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }
}

fn default_target_classes() -> Vec<u32> {
    vec![0, 1]
}

fn default_class_labels() -> HashMap<u32, String> {
    HashMap::from([(0, "fire".to_string()), (1, "smoke".to_string())])
}

fn read_config_file(path: &Path) -> Result<FirewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_class_csv(value: &str) -> Result<Vec<u32>> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse()
                .map_err(|_| anyhow!("invalid class id '{}' in FIREWATCH_TARGET_CLASSES", entry))
        })
        .collect()
}
