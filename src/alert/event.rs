use serde::Serialize;
use std::time::Duration;

use crate::detect::BoundingBox;

/// A confirmed detection that cleared the cooldown gate.
///
/// Emitted at most once per class per cooldown window, handed to the
/// notifier, and then discarded; the state machine keeps no history of past
/// events beyond the last alert time.
#[derive(Clone, Debug, Serialize)]
pub struct AlertEvent {
    pub class_id: u32,
    /// Confidence of the strongest detection of this class in the firing frame.
    pub confidence: f32,
    /// Timestamp of the frame that confirmed the alert.
    pub timestamp: Duration,
    pub bbox: BoundingBox,
}
