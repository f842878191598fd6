//! firewatchd - fire/smoke detection alert daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured source (file, HTTP camera, stub)
//! 2. Runs the detection backend on each frame
//! 3. Applies consecutive-confirmation and cooldown debouncing per class
//! 4. Dispatches confirmed alerts to Telegram (or the log) off the frame loop
//! 5. Runs until the stream ends or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use firewatch::config::TelegramSettings;
use firewatch::notify::TelegramConfig;
use firewatch::{
    open_source, FirewatchConfig, LogNotifier, Notifier, NullRenderer, Pipeline, StubBackend,
    TelegramNotifier,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fire/smoke detection alert daemon")]
struct Args {
    /// Path to a JSON config file (otherwise FIREWATCH_CONFIG is honored).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Video source: file path, http(s):// stream, or stub://.
    #[arg(long)]
    source: Option<String>,

    /// ONNX model path (requires the backend-tract feature).
    #[arg(long)]
    model: Option<String>,

    /// Confidence threshold in [0, 1].
    #[arg(long)]
    conf: Option<f32>,

    /// Consecutive positive frames required to confirm an alert.
    #[arg(long)]
    consecutive: Option<u32>,

    /// Cooldown between alerts for the same class, in seconds.
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Target class ids as a comma-separated list (e.g. "0,1").
    #[arg(long)]
    target_classes: Option<String>,

    /// Telegram bot token for alert delivery.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_bot_token: Option<String>,

    /// Telegram chat id to deliver alerts to.
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    telegram_chat_id: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = load_config(&args)?;

    let source = open_source(&config.source, config.target_fps)?;
    let detector = build_detector(&config)?;
    let notifier = build_notifier(config.telegram.as_ref())?;
    let renderer = Box::new(NullRenderer::new());

    log::info!("firewatchd starting on {}", config.source);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })?;

    let pipeline = Pipeline::new(&config, source, detector, notifier, renderer)?;
    let summary = pipeline.run(&stop)?;

    println!("run summary:");
    println!("  frames processed: {}", summary.frames_processed);
    println!("  detections seen: {}", summary.detections_seen);
    println!("  alerts fired: {}", summary.alerts_fired);
    println!("  alerts delivered: {}", summary.alerts_delivered);
    Ok(())
}

fn load_config(args: &Args) -> Result<FirewatchConfig> {
    let mut config = match &args.config {
        Some(path) => FirewatchConfig::load_from_path(path)?,
        None => FirewatchConfig::load()?,
    };

    // CLI flags win over file and environment.
    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(model) = &args.model {
        config.detector.model_path = Some(model.clone());
    }
    if let Some(conf) = args.conf {
        if !(0.0..=1.0).contains(&conf) {
            return Err(anyhow!("--conf must be within [0, 1]"));
        }
        config.conf_threshold = conf;
    }
    if let Some(consecutive) = args.consecutive {
        if consecutive < 1 {
            return Err(anyhow!("--consecutive must be at least 1"));
        }
        config.alert.consecutive = consecutive;
    }
    if let Some(cooldown) = args.cooldown_secs {
        config.alert.cooldown = std::time::Duration::from_secs(cooldown);
    }
    if let Some(classes) = &args.target_classes {
        let parsed: Result<Vec<u32>> = classes
            .split(',')
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse()
                    .map_err(|_| anyhow!("invalid class id '{}' in --target-classes", entry))
            })
            .collect();
        let parsed = parsed?;
        if parsed.is_empty() {
            return Err(anyhow!("--target-classes must name at least one class"));
        }
        config.alert.target_classes = parsed;
    }
    if let (Some(bot_token), Some(chat_id)) = (&args.telegram_bot_token, &args.telegram_chat_id) {
        config.telegram = Some(TelegramSettings {
            bot_token: bot_token.clone(),
            chat_id: chat_id.clone(),
        });
    }
    Ok(config)
}

fn build_detector(config: &FirewatchConfig) -> Result<Box<dyn firewatch::DetectorBackend>> {
    match &config.detector.model_path {
        Some(model_path) => {
            #[cfg(feature = "backend-tract")]
            {
                let num_classes = model_class_count(config);
                let backend = firewatch::detect::TractBackend::new(
                    model_path,
                    config.detector.input_width,
                    config.detector.input_height,
                    num_classes,
                )?;
                Ok(Box::new(backend))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!(
                    "model '{}' configured but firewatch was built without the backend-tract feature",
                    model_path
                ))
            }
        }
        None => {
            log::warn!("no model configured; using the stub detector");
            let class_id = config.alert.target_classes.first().copied().unwrap_or(0);
            Ok(Box::new(StubBackend::new(class_id)))
        }
    }
}

#[cfg(feature = "backend-tract")]
fn model_class_count(config: &FirewatchConfig) -> usize {
    let max_target = config
        .alert
        .target_classes
        .iter()
        .max()
        .copied()
        .unwrap_or(0);
    let max_label = config
        .alert
        .class_labels
        .keys()
        .max()
        .copied()
        .unwrap_or(0);
    (max_target.max(max_label) + 1) as usize
}

fn build_notifier(telegram: Option<&TelegramSettings>) -> Result<Box<dyn Notifier>> {
    match telegram {
        Some(settings) => {
            let notifier = TelegramNotifier::new(TelegramConfig {
                bot_token: settings.bot_token.clone(),
                chat_id: settings.chat_id.clone(),
            })?;
            log::info!("alerts will be delivered to telegram chat {}", settings.chat_id);
            Ok(Box::new(notifier))
        }
        None => {
            log::info!("no telegram settings; alerts will be logged only");
            Ok(Box::new(LogNotifier::new()))
        }
    }
}
