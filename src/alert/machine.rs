use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::alert::AlertEvent;
use crate::detect::Detection;

/// Confirmation and cooldown settings, shared by all tracked classes.
#[derive(Clone, Copy, Debug)]
pub struct AlertPolicy {
    /// Consecutive positive frames required before a class confirms.
    pub threshold: u32,
    /// Minimum time between alerts for the same class. Zero means every
    /// confirmed positive frame fires.
    pub cooldown: Duration,
}

impl AlertPolicy {
    pub fn new(threshold: u32, cooldown: Duration) -> Result<Self> {
        let policy = Self {
            threshold,
            cooldown,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold < 1 {
            return Err(anyhow!("alert threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Where a class sits in the confirmation ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmationPhase {
    /// No current run of positive frames.
    Idle,
    /// Positive run in progress, below the threshold.
    Accumulating,
    /// Run has reached the threshold.
    Confirmed,
}

/// Whether a class may fire, independent of its confirmation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CooldownPhase {
    Ready,
    CoolingDown,
}

/// Snapshot of both axes for one class at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassStatus {
    pub confirmation: ConfirmationPhase,
    pub cooldown: CooldownPhase,
}

/// Per-class alert bookkeeping. Owned exclusively by the state machine and
/// mutated once per frame tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClassAlertState {
    consecutive: u32,
    last_alert: Option<Duration>,
}

impl ClassAlertState {
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn last_alert(&self) -> Option<Duration> {
        self.last_alert
    }

    fn status(&self, policy: &AlertPolicy, now: Duration) -> ClassStatus {
        let confirmation = if self.consecutive == 0 {
            ConfirmationPhase::Idle
        } else if self.consecutive < policy.threshold {
            ConfirmationPhase::Accumulating
        } else {
            ConfirmationPhase::Confirmed
        };
        let cooldown = match self.last_alert {
            Some(last) if now.saturating_sub(last) < policy.cooldown => CooldownPhase::CoolingDown,
            _ => CooldownPhase::Ready,
        };
        ClassStatus {
            confirmation,
            cooldown,
        }
    }
}

/// Tracks one `ClassAlertState` per target class and decides, per frame,
/// whether an observation becomes an alert.
///
/// Transition rules per observed frame:
/// - class absent: the consecutive count resets to zero. One missed frame
///   clears all accumulated confirmation.
/// - class present: the count increments. At or above the threshold the
///   class fires unless it is still within the cooldown window of its last
///   alert. Firing does NOT reset the count; only absence does, so the
///   cooldown is the sole re-fire suppressor while detection persists.
pub struct AlertStateMachine {
    policy: AlertPolicy,
    states: BTreeMap<u32, ClassAlertState>,
}

impl AlertStateMachine {
    /// Create a machine tracking exactly the given target classes.
    pub fn new(policy: AlertPolicy, targets: impl IntoIterator<Item = u32>) -> Result<Self> {
        policy.validate()?;
        let states = targets
            .into_iter()
            .map(|class_id| (class_id, ClassAlertState::default()))
            .collect();
        Ok(Self { policy, states })
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Class ids this machine tracks.
    pub fn tracked_classes(&self) -> impl Iterator<Item = u32> + '_ {
        self.states.keys().copied()
    }

    /// Current status of one tracked class. `None` for untracked classes.
    pub fn status(&self, class_id: u32, now: Duration) -> Option<ClassStatus> {
        self.states
            .get(&class_id)
            .map(|state| state.status(&self.policy, now))
    }

    /// Raw bookkeeping for one tracked class.
    pub fn state(&self, class_id: u32) -> Option<ClassAlertState> {
        self.states.get(&class_id).copied()
    }

    /// Record one frame's observation for one class.
    ///
    /// `observed` carries the strongest detection of the class in the frame,
    /// or `None` when the class was absent (or below the confidence
    /// threshold, which the orchestrator treats identically). Returns the
    /// alert event when this frame confirms the class and it is not cooling
    /// down. Observations for untracked classes are ignored.
    pub fn observe(
        &mut self,
        class_id: u32,
        observed: Option<&Detection>,
        now: Duration,
    ) -> Option<AlertEvent> {
        let Some(state) = self.states.get_mut(&class_id) else {
            log::debug!("observe for untracked class {}", class_id);
            return None;
        };

        let Some(detection) = observed else {
            state.consecutive = 0;
            return None;
        };

        state.consecutive = state.consecutive.saturating_add(1);
        if state.consecutive < self.policy.threshold {
            return None;
        }

        if let Some(last) = state.last_alert {
            if now.saturating_sub(last) < self.policy.cooldown {
                return None;
            }
        }

        state.last_alert = Some(now);
        Some(AlertEvent {
            class_id,
            confidence: detection.confidence,
            timestamp: now,
            bbox: detection.bbox,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox {
                x: 10.0,
                y: 10.0,
                w: 50.0,
                h: 40.0,
            },
        }
    }

    fn machine(threshold: u32, cooldown_secs: u64, targets: &[u32]) -> AlertStateMachine {
        AlertStateMachine::new(
            AlertPolicy::new(threshold, Duration::from_secs(cooldown_secs)).unwrap(),
            targets.iter().copied(),
        )
        .unwrap()
    }

    fn t(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    #[test]
    fn threshold_zero_is_rejected() {
        assert!(AlertPolicy::new(0, Duration::ZERO).is_err());
    }

    #[test]
    fn fires_exactly_on_threshold_frame() {
        let mut m = machine(3, 30, &[0]);
        assert!(m.observe(0, Some(&det(0, 0.9)), t(0)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(1)).is_none());
        let event = m.observe(0, Some(&det(0, 0.92)), t(2)).unwrap();
        assert_eq!(event.class_id, 0);
        assert_eq!(event.timestamp, t(2));
        assert_eq!(event.confidence, 0.92);
    }

    #[test]
    fn cooldown_suppresses_while_detection_persists() {
        // threshold=3, cooldown=30s, positives at t=0..5: one alert at t=2.
        let mut m = machine(3, 30, &[0]);
        let mut fired = Vec::new();
        for s in 0..6 {
            if let Some(ev) = m.observe(0, Some(&det(0, 0.9)), t(s)) {
                fired.push(ev.timestamp);
            }
        }
        assert_eq!(fired, vec![t(2)]);

        let status = m.status(0, t(5)).unwrap();
        assert_eq!(status.confirmation, ConfirmationPhase::Confirmed);
        assert_eq!(status.cooldown, CooldownPhase::CoolingDown);
    }

    #[test]
    fn refires_after_cooldown_without_reaccumulation() {
        // The count keeps climbing while positive; only the cooldown gates
        // re-fire.
        let mut m = machine(3, 10, &[0]);
        for s in 0..3 {
            m.observe(0, Some(&det(0, 0.9)), t(s));
        }
        assert!(m.observe(0, Some(&det(0, 0.9)), t(5)).is_none());
        let state = m.state(0).unwrap();
        assert_eq!(state.consecutive(), 4);
        assert_eq!(state.last_alert(), Some(t(2)));

        assert!(m.observe(0, Some(&det(0, 0.9)), t(12)).is_some());
        assert_eq!(m.state(0).unwrap().consecutive(), 5);
    }

    #[test]
    fn single_absence_resets_accumulation() {
        // threshold=3; positive t=0,1, absent t=2, positive t=3,4,5: fires at t=5.
        let mut m = machine(3, 30, &[0]);
        assert!(m.observe(0, Some(&det(0, 0.9)), t(0)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(1)).is_none());
        assert!(m.observe(0, None, t(2)).is_none());
        assert_eq!(
            m.status(0, t(2)).unwrap().confirmation,
            ConfirmationPhase::Idle
        );
        assert!(m.observe(0, Some(&det(0, 0.9)), t(3)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(4)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(5)).is_some());
    }

    #[test]
    fn no_two_events_within_cooldown() {
        let mut m = machine(1, 30, &[0]);
        let mut fire_times = Vec::new();
        for s in 0..100 {
            if let Some(ev) = m.observe(0, Some(&det(0, 0.9)), t(s)) {
                fire_times.push(ev.timestamp);
            }
        }
        for pair in fire_times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(30));
        }
        assert_eq!(fire_times, vec![t(0), t(30), t(60), t(90)]);
    }

    #[test]
    fn threshold_one_fires_on_first_positive() {
        let mut m = machine(1, 30, &[0]);
        assert!(m.observe(0, Some(&det(0, 0.9)), t(0)).is_some());
        // Second positive frame is inside the cooldown.
        assert!(m.observe(0, Some(&det(0, 0.9)), t(1)).is_none());
    }

    #[test]
    fn zero_cooldown_fires_every_confirmed_frame() {
        let mut m = machine(3, 0, &[0]);
        assert!(m.observe(0, Some(&det(0, 0.9)), t(0)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(1)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(2)).is_some());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(3)).is_some());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(4)).is_some());

        // A gap forces full re-accumulation.
        assert!(m.observe(0, None, t(5)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(6)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(7)).is_none());
        assert!(m.observe(0, Some(&det(0, 0.9)), t(8)).is_some());
    }

    #[test]
    fn classes_are_tracked_independently() {
        let mut m = machine(3, 30, &[0, 1]);
        let mut fired = Vec::new();
        for s in 0..6 {
            for class_id in [0u32, 1] {
                if let Some(ev) = m.observe(class_id, Some(&det(class_id, 0.9)), t(s)) {
                    fired.push((ev.class_id, ev.timestamp));
                }
            }
        }
        assert_eq!(fired, vec![(0, t(2)), (1, t(2))]);
    }

    #[test]
    fn absence_of_one_class_does_not_touch_the_other() {
        let mut m = machine(2, 30, &[0, 1]);
        m.observe(0, Some(&det(0, 0.9)), t(0));
        m.observe(1, Some(&det(1, 0.9)), t(0));
        // Class 1 disappears; class 0 confirms on schedule.
        m.observe(1, None, t(1));
        assert!(m.observe(0, Some(&det(0, 0.9)), t(1)).is_some());
        assert_eq!(
            m.status(1, t(1)).unwrap().confirmation,
            ConfirmationPhase::Idle
        );
    }

    #[test]
    fn untracked_class_is_ignored() {
        let mut m = machine(1, 0, &[0]);
        assert!(m.observe(7, Some(&det(7, 0.9)), t(0)).is_none());
        assert!(m.status(7, t(0)).is_none());
    }
}
