//! Alert delivery.
//!
//! The pipeline hands fired alerts to a `Notifier` through the
//! `AlertDispatcher`, which queues them onto a worker thread so a slow
//! delivery path can never stall frame intake. Delivery failures are logged
//! and never fed back into the alert state: an alert counts as fired the
//! moment the state machine commits it.

mod dispatch;
mod log_notifier;
mod telegram;

pub use dispatch::AlertDispatcher;
pub use log_notifier::LogNotifier;
pub use telegram::{TelegramConfig, TelegramNotifier};

use anyhow::Result;

use crate::alert::AlertEvent;

/// A fired alert plus the context a human-facing channel needs.
#[derive(Clone, Debug)]
pub struct AlertMessage {
    pub event: AlertEvent,
    /// Human-readable class label (e.g. "fire").
    pub label: String,
    /// Identifier of the video source the alert came from.
    pub source: String,
    /// Annotated JPEG snapshot of the firing frame, when available.
    pub snapshot_jpeg: Option<Vec<u8>>,
}

/// Alert delivery contract.
///
/// `notify` is called from the dispatcher worker thread, one message at a
/// time. Implementations own their transport details (endpoints, timeouts,
/// formatting); the pipeline only requires that failures are returned, not
/// panicked.
pub trait Notifier: Send {
    fn name(&self) -> &'static str;

    fn notify(&mut self, message: &AlertMessage) -> Result<()>;
}
