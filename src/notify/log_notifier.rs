use anyhow::Result;

use super::{AlertMessage, Notifier};

/// Log-only notifier. The default delivery channel when no external one is
/// configured, and the one tests and demos use.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&mut self, message: &AlertMessage) -> Result<()> {
        log::warn!(
            "ALERT {} conf={:.2} t={:.1}s source={}",
            message.label,
            message.event.confidence,
            message.event.timestamp.as_secs_f64(),
            message.source
        );
        if let Ok(payload) = serde_json::to_string(&message.event) {
            log::debug!("alert payload: {}", payload);
        }
        Ok(())
    }
}
