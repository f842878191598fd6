//! firewatch
//!
//! This crate implements a debounced fire/smoke detection alert pipeline for
//! video streams.
//!
//! # Architecture
//!
//! Frames flow through five stages, one frame at a time:
//!
//! 1. **Ingest** (`ingest`): pull a decoded RGB frame from a file, HTTP
//!    camera stream, or synthetic source.
//! 2. **Detect** (`detect`): run an object detection backend over the frame.
//! 3. **Decide** (`alert`): per target class, require a configured number of
//!    consecutive positive frames before confirming, and suppress re-fires
//!    within a cooldown window. A single frame without the class resets its
//!    accumulation; flicker never alerts.
//! 4. **Dispatch** (`notify`): hand fired alerts to a notifier through a
//!    bounded queue-and-forget worker, so delivery latency never stalls
//!    frame intake.
//! 5. **Render** (`render`): draw detection overlays and encode alert
//!    snapshots. Purely observational.
//!
//! The `pipeline` module owns the loop and the per-class alert state; the
//! `config` module is the single configuration surface, validated at
//! startup.

pub mod alert;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod render;

pub use alert::{AlertEvent, AlertPolicy, AlertStateMachine};
pub use config::FirewatchConfig;
pub use detect::{BoundingBox, Detection, DetectorBackend, StubBackend};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource};
pub use notify::{AlertDispatcher, AlertMessage, LogNotifier, Notifier, TelegramNotifier};
pub use pipeline::{Pipeline, PipelineSummary};
pub use render::{NullRenderer, Renderer};
