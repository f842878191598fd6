//! Debounced alert decisions.
//!
//! This module decides when a per-frame detection stream becomes an alert.
//! A target class must be present for a configured number of consecutive
//! frames before it confirms, and a confirmed class re-fires only after a
//! cooldown window. A single frame without the class clears all accumulated
//! confirmation; flickering detections never alert.

mod event;
mod machine;

pub use event::AlertEvent;
pub use machine::{
    AlertPolicy, AlertStateMachine, ClassAlertState, ClassStatus, ConfirmationPhase, CooldownPhase,
};
