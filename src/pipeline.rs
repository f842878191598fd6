//! Pipeline orchestration.
//!
//! Drives the frame loop: pull a frame, run detection, filter to target
//! classes at or above the confidence threshold, feed every tracked class
//! through the alert state machine, dispatch fired alerts, and forward the
//! frame to the renderer. One frame is fully processed before the next is
//! pulled; frames are never buffered or replayed.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::alert::{AlertEvent, AlertPolicy, AlertStateMachine};
use crate::config::FirewatchConfig;
use crate::detect::{Detection, DetectorBackend};
use crate::ingest::FrameSource;
use crate::notify::{AlertDispatcher, AlertMessage, Notifier};
use crate::render::{snapshot, Renderer};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
const PROGRESS_LOG_FRAMES: u64 = 100;

/// Counters for one pipeline run.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineSummary {
    pub frames_processed: u64,
    pub detections_seen: u64,
    pub alerts_fired: u64,
    pub alerts_delivered: u64,
}

pub struct Pipeline {
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    dispatcher: AlertDispatcher,
    renderer: Box<dyn Renderer>,
    machine: AlertStateMachine,
    conf_threshold: f32,
    class_labels: HashMap<u32, String>,
    source_id: String,
    summary: PipelineSummary,
}

impl Pipeline {
    pub fn new(
        config: &FirewatchConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        notifier: Box<dyn Notifier>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        let policy = AlertPolicy::new(config.alert.consecutive, config.alert.cooldown)?;
        let machine = AlertStateMachine::new(policy, config.alert.target_classes.iter().copied())?;
        Ok(Self {
            source,
            detector,
            dispatcher: AlertDispatcher::new(notifier),
            renderer,
            machine,
            conf_threshold: config.conf_threshold,
            class_labels: config.alert.class_labels.clone(),
            source_id: config.source.clone(),
            summary: PipelineSummary::default(),
        })
    }

    /// Apply one frame's detections to the alert state.
    ///
    /// Filters once, before the state machine: a detection of a target class
    /// below the confidence threshold is identical to the class being absent
    /// and resets its accumulation. Every tracked class is observed exactly
    /// once per tick, the strongest detection of a class supplying the
    /// event details when it fires.
    pub fn process_frame(
        &mut self,
        timestamp: Duration,
        detections: &[Detection],
    ) -> Vec<AlertEvent> {
        let mut present: BTreeMap<u32, &Detection> = BTreeMap::new();
        for detection in detections {
            if detection.confidence < self.conf_threshold {
                continue;
            }
            match present.get(&detection.class_id) {
                Some(best) if best.confidence >= detection.confidence => {}
                _ => {
                    present.insert(detection.class_id, detection);
                }
            }
        }

        let tracked: Vec<u32> = self.machine.tracked_classes().collect();
        let mut events = Vec::new();
        for class_id in tracked {
            let observed = present.get(&class_id).copied();
            if let Some(event) = self.machine.observe(class_id, observed, timestamp) {
                events.push(event);
            }
        }
        events
    }

    /// Run until the source is exhausted or the stop flag is set. The stop
    /// flag is checked between ticks only; a tick always completes its
    /// state updates.
    pub fn run(mut self, stop: &AtomicBool) -> Result<PipelineSummary> {
        self.source.connect()?;
        self.detector.warm_up()?;

        log::info!(
            "pipeline running: source={} detector={} threshold={} cooldown={:?} targets={:?}",
            self.source_id,
            self.detector.name(),
            self.machine.policy().threshold,
            self.machine.policy().cooldown,
            self.machine.tracked_classes().collect::<Vec<_>>()
        );

        let mut last_health_log = Instant::now();

        loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop signal received");
                break;
            }

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream");
                    break;
                }
                Err(e) => {
                    log::error!("frame source failed: {}", e);
                    break;
                }
            };

            // A detector failure is not fatal: the frame counts as having no
            // detections, which resets accumulation like true absence.
            let detections = match self
                .detector
                .detect(&frame.pixels, frame.width, frame.height)
            {
                Ok(detections) => detections,
                Err(e) => {
                    log::warn!("detector failed on frame {}: {}", frame.index, e);
                    Vec::new()
                }
            };

            self.summary.frames_processed += 1;
            self.summary.detections_seen += detections.len() as u64;

            let events = self.process_frame(frame.timestamp, &detections);
            if !events.is_empty() {
                let snapshot_jpeg = match snapshot::encode_annotated_jpeg(
                    &frame,
                    &detections,
                    |class_id| self.class_label(class_id),
                ) {
                    Ok(jpeg) => Some(jpeg),
                    Err(e) => {
                        log::warn!("alert snapshot encoding failed: {}", e);
                        None
                    }
                };
                for event in events {
                    self.summary.alerts_fired += 1;
                    log::warn!(
                        "alert #{}: {} conf={:.2} t={:.1}s",
                        self.summary.alerts_fired,
                        self.class_label(event.class_id),
                        event.confidence,
                        event.timestamp.as_secs_f64()
                    );
                    let label = self.class_label(event.class_id);
                    self.dispatcher.dispatch(AlertMessage {
                        event,
                        label,
                        source: self.source_id.clone(),
                        snapshot_jpeg: snapshot_jpeg.clone(),
                    });
                }
            }

            if let Err(e) = self.renderer.render(&frame, &detections) {
                log::warn!("renderer failed on frame {}: {}", frame.index, e);
            }

            if self.summary.frames_processed % PROGRESS_LOG_FRAMES == 0 {
                log::debug!("processed {} frames", self.summary.frames_processed);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.source.stats();
                log::info!(
                    "source health={} frames={} source={}",
                    self.source.is_healthy(),
                    stats.frames_captured,
                    stats.source
                );
                last_health_log = Instant::now();
            }
        }

        let mut summary = self.summary;
        summary.alerts_delivered = self.dispatcher.shutdown()?;
        log::info!(
            "pipeline finished: {} frames, {} detections, {} alerts fired, {} delivered",
            summary.frames_processed,
            summary.detections_seen,
            summary.alerts_fired,
            summary.alerts_delivered
        );
        Ok(summary)
    }

    fn class_label(&self, class_id: u32) -> String {
        self.class_labels
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use crate::frame::Frame;
    use crate::ingest::SourceStats;
    use crate::notify::LogNotifier;
    use crate::render::NullRenderer;
    use std::collections::VecDeque;

    fn test_config(consecutive: u32, cooldown_secs: u64, targets: &[u32]) -> FirewatchConfig {
        let file = format!(
            r#"{{
                "conf_threshold": 0.5,
                "alert": {{
                    "target_classes": {:?},
                    "consecutive": {},
                    "cooldown_secs": {}
                }}
            }}"#,
            targets, consecutive, cooldown_secs
        );
        let mut path = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut path, file.as_bytes()).unwrap();
        FirewatchConfig::load_from_path(path.path()).unwrap()
    }

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                x: 1.0,
                y: 1.0,
                w: 4.0,
                h: 4.0,
            },
        }
    }

    fn t(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn pipeline(config: &FirewatchConfig) -> Pipeline {
        Pipeline::new(
            config,
            Box::new(
                crate::ingest::FileSource::new(crate::ingest::FileConfig {
                    path: "stub://test".to_string(),
                    target_fps: 10,
                })
                .unwrap(),
            ),
            Box::new(crate::detect::StubBackend::default()),
            Box::new(LogNotifier::new()),
            Box::new(NullRenderer::new()),
        )
        .unwrap()
    }

    #[test]
    fn low_confidence_resets_like_absence() {
        let config = test_config(3, 30, &[0]);
        let mut p = pipeline(&config);

        assert!(p.process_frame(t(0), &[det(0, 0.9)]).is_empty());
        assert!(p.process_frame(t(1), &[det(0, 0.9)]).is_empty());
        // Present but below the 0.5 threshold: equivalent to absent.
        assert!(p.process_frame(t(2), &[det(0, 0.3)]).is_empty());
        assert!(p.process_frame(t(3), &[det(0, 0.9)]).is_empty());
        assert!(p.process_frame(t(4), &[det(0, 0.9)]).is_empty());
        let events = p.process_frame(t(5), &[det(0, 0.9)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, t(5));
    }

    #[test]
    fn strongest_detection_supplies_event_details() {
        let config = test_config(1, 0, &[0]);
        let mut p = pipeline(&config);

        let events = p.process_frame(t(0), &[det(0, 0.6), det(0, 0.95), det(0, 0.7)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].confidence, 0.95);
    }

    #[test]
    fn non_target_classes_are_ignored() {
        let config = test_config(1, 0, &[0]);
        let mut p = pipeline(&config);

        assert!(p.process_frame(t(0), &[det(5, 0.99)]).is_empty());
    }

    #[test]
    fn classes_alert_independently_through_ticks() {
        let config = test_config(2, 60, &[0, 1]);
        let mut p = pipeline(&config);

        assert!(p.process_frame(t(0), &[det(0, 0.9), det(1, 0.9)]).is_empty());
        // Class 1 flickers out; class 0 confirms alone.
        let events = p.process_frame(t(1), &[det(0, 0.9)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class_id, 0);
        // Class 1 needs a fresh run of 2.
        assert!(p.process_frame(t(2), &[det(1, 0.9)]).is_empty());
        let events = p.process_frame(t(3), &[det(1, 0.9)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class_id, 1);
    }

    // ------------------------------------------------------------------------
    // run() termination and degradation
    // ------------------------------------------------------------------------

    struct ScriptedSource {
        frames: VecDeque<Frame>,
        captured: u64,
    }

    impl ScriptedSource {
        fn new(count: u64) -> Self {
            let frames = (0..count)
                .map(|i| {
                    Frame::new(
                        vec![(i % 256) as u8; 8 * 8 * 3],
                        8,
                        8,
                        Duration::from_millis(i * 100),
                        i + 1,
                    )
                    .unwrap()
                })
                .collect();
            Self { frames, captured: 0 }
        }
    }

    impl FrameSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            match self.frames.pop_front() {
                Some(frame) => {
                    self.captured += 1;
                    Ok(Some(frame))
                }
                None => Ok(None),
            }
        }

        fn is_healthy(&self) -> bool {
            true
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.captured,
                source: "scripted".to_string(),
            }
        }
    }

    struct AlwaysDetects {
        class_id: u32,
    }

    impl DetectorBackend for AlwaysDetects {
        fn name(&self) -> &'static str {
            "always"
        }

        fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
            Ok(vec![det(self.class_id, 0.9)])
        }
    }

    struct AlwaysFails;

    impl DetectorBackend for AlwaysFails {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
            Err(anyhow::anyhow!("inference blew up"))
        }
    }

    #[test]
    fn run_terminates_on_exhaustion_and_counts_alerts() {
        let config = test_config(3, 3600, &[0]);
        let p = Pipeline::new(
            &config,
            Box::new(ScriptedSource::new(10)),
            Box::new(AlwaysDetects { class_id: 0 }),
            Box::new(LogNotifier::new()),
            Box::new(NullRenderer::new()),
        )
        .unwrap();

        let stop = AtomicBool::new(false);
        let summary = p.run(&stop).unwrap();
        assert_eq!(summary.frames_processed, 10);
        // Confirms on the 3rd frame, then cools down for the rest.
        assert_eq!(summary.alerts_fired, 1);
        assert_eq!(summary.alerts_delivered, 1);
    }

    #[test]
    fn detector_failures_degrade_to_no_detections() {
        let config = test_config(1, 0, &[0]);
        let p = Pipeline::new(
            &config,
            Box::new(ScriptedSource::new(5)),
            Box::new(AlwaysFails),
            Box::new(LogNotifier::new()),
            Box::new(NullRenderer::new()),
        )
        .unwrap();

        let stop = AtomicBool::new(false);
        let summary = p.run(&stop).unwrap();
        assert_eq!(summary.frames_processed, 5);
        assert_eq!(summary.alerts_fired, 0);
    }

    #[test]
    fn preset_stop_flag_processes_nothing() {
        let config = test_config(1, 0, &[0]);
        let p = Pipeline::new(
            &config,
            Box::new(ScriptedSource::new(5)),
            Box::new(AlwaysDetects { class_id: 0 }),
            Box::new(LogNotifier::new()),
            Box::new(NullRenderer::new()),
        )
        .unwrap();

        let stop = AtomicBool::new(true);
        let summary = p.run(&stop).unwrap();
        assert_eq!(summary.frames_processed, 0);
    }
}
