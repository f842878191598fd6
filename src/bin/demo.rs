//! demo - end-to-end synthetic run of the firewatch pipeline
//!
//! Feeds a scripted detection pattern through the real pipeline (synthetic
//! frames, scripted detector, log delivery) to show the debounce behavior:
//! a flickering detection never alerts, a persistent one alerts once per
//! cooldown window.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use firewatch::config::{AlertSettings, DetectorSettings};
use firewatch::detect::{BoundingBox, Detection};
use firewatch::ingest::SourceStats;
use firewatch::{
    AlertPolicy, AlertStateMachine, DetectorBackend, FirewatchConfig, Frame, FrameSource,
    LogNotifier, NullRenderer, Pipeline,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration in seconds of synthetic footage.
    #[arg(long, default_value_t = 6)]
    seconds: u64,
    /// Frames per second for the synthetic source.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Consecutive positive frames required to confirm.
    #[arg(long, default_value_t = 5)]
    consecutive: u32,
    /// Cooldown between alerts in seconds.
    #[arg(long, default_value_t = 2)]
    cooldown_secs: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let total_frames = (args.seconds * args.fps as u64) as usize;
    let script = build_script(total_frames, args.consecutive as usize);

    stage("walk the alert decisions");
    let expected = walk_decisions(&script, args.consecutive, args.cooldown_secs, args.fps)?;

    stage("run the full pipeline over the same script");
    let config = demo_config(&args);
    let pipeline = Pipeline::new(
        &config,
        Box::new(DemoSource::new(total_frames as u64, args.fps)),
        Box::new(ScriptedDetector::new(script)),
        Box::new(LogNotifier::new()),
        Box::new(NullRenderer::new()),
    )?;

    let stop = AtomicBool::new(false);
    let summary = pipeline.run(&stop)?;

    println!("demo summary:");
    println!("  frames processed: {}", summary.frames_processed);
    println!("  alerts fired: {}", summary.alerts_fired);
    println!("  alerts delivered: {}", summary.alerts_delivered);
    println!("  alert frames (state machine walk): {:?}", expected);
    println!(
        "  agreement: {}",
        if summary.alerts_fired == expected.len() as u64 {
            "OK"
        } else {
            "MISMATCH"
        }
    );
    println!("next steps:");
    println!("  cargo run --bin firewatchd -- --source stub://demo");
    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}

/// Presence script: an early one-frame flicker that must not alert, then a
/// persistent burst with a single dropout right after the first
/// confirmation, forcing a full re-accumulation.
fn build_script(total_frames: usize, consecutive: usize) -> Vec<bool> {
    let mut script = vec![false; total_frames];
    if total_frames > 2 {
        script[2] = true;
    }
    let burst_start = 5;
    for (i, slot) in script.iter_mut().enumerate().skip(burst_start) {
        *slot = i != burst_start + consecutive + 1;
    }
    script
}

/// Run the state machine alone over the script and report which frame
/// indices alert.
fn walk_decisions(
    script: &[bool],
    consecutive: u32,
    cooldown_secs: u64,
    fps: u32,
) -> Result<Vec<usize>> {
    let policy = AlertPolicy::new(consecutive, Duration::from_secs(cooldown_secs))?;
    let mut machine = AlertStateMachine::new(policy, [0u32])?;
    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);

    let detection = Detection {
        class_id: 0,
        confidence: 0.9,
        bbox: BoundingBox::default(),
    };

    let mut fired = Vec::new();
    for (i, &present) in script.iter().enumerate() {
        let now = frame_interval * i as u32;
        let observed = present.then_some(&detection);
        if let Some(event) = machine.observe(0, observed, now) {
            eprintln!(
                "demo:   frame {:>3} t={:.1}s -> ALERT (conf {:.2})",
                i,
                event.timestamp.as_secs_f64(),
                event.confidence
            );
            fired.push(i);
        }
    }
    Ok(fired)
}

fn demo_config(args: &Args) -> FirewatchConfig {
    FirewatchConfig {
        source: "stub://demo".to_string(),
        target_fps: args.fps,
        conf_threshold: 0.25,
        detector: DetectorSettings {
            model_path: None,
            input_width: 640,
            input_height: 640,
        },
        alert: AlertSettings {
            target_classes: vec![0],
            consecutive: args.consecutive,
            cooldown: Duration::from_secs(args.cooldown_secs),
            class_labels: HashMap::from([(0, "fire".to_string())]),
        },
        telegram: None,
    }
}

/// Bounded synthetic frame source for the demo.
struct DemoSource {
    total_frames: u64,
    fps: u32,
    produced: u64,
}

impl DemoSource {
    fn new(total_frames: u64, fps: u32) -> Self {
        Self {
            total_frames,
            fps,
            produced: 0,
        }
    }
}

impl FrameSource for DemoSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.produced >= self.total_frames {
            return Ok(None);
        }
        self.produced += 1;
        let timestamp = Duration::from_secs_f64((self.produced - 1) as f64 / self.fps as f64);
        let pixels = vec![(self.produced % 256) as u8; 64 * 48 * 3];
        Ok(Some(Frame::new(pixels, 64, 48, timestamp, self.produced)?))
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.produced,
            source: "stub://demo".to_string(),
        }
    }
}

/// Detector that follows a fixed per-frame presence script.
struct ScriptedDetector {
    script: Vec<bool>,
    cursor: usize,
}

impl ScriptedDetector {
    fn new(script: Vec<bool>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl DetectorBackend for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let present = self.script.get(self.cursor).copied().unwrap_or(false);
        self.cursor += 1;
        if !present {
            return Ok(Vec::new());
        }
        Ok(vec![Detection {
            class_id: 0,
            confidence: 0.9,
            bbox: BoundingBox {
                x: width as f32 / 4.0,
                y: height as f32 / 4.0,
                w: width as f32 / 2.0,
                h: height as f32 / 2.0,
            },
        }])
    }
}
