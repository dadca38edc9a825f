use std::time::{Duration, Instant};

use crate::types::GestureLabel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureEvent {
    Detect(GestureLabel),
    Hold(GestureLabel),
    Cancel(GestureLabel),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GestureState {
    pub active: Option<GestureLabel>,
    pub started_at: Option<Instant>,
    pub last_confirmed_at: Option<Instant>,
}

/// Turns per-frame classifier output into DETECT/HOLD/CANCEL events.
///
/// A gesture stays active as long as it is re-detected within
/// `cancel_cooldown` of its last confirmation. Frames with no gesture, or a
/// different one, only end it once that window has passed, which absorbs
/// single-frame dropouts from the landmark detector.
#[derive(Clone, Debug)]
pub struct GestureTracker {
    cancel_cooldown: Duration,
    state: GestureState,
}

impl GestureTracker {
    pub fn new(cancel_cooldown: Duration) -> Self {
        Self {
            cancel_cooldown,
            state: GestureState::default(),
        }
    }

    pub fn active(&self) -> Option<GestureLabel> {
        self.state.active
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = GestureState::default();
    }

    pub fn update(&mut self, detected: Option<GestureLabel>, now: Instant) -> Vec<GestureEvent> {
        let Some(active) = self.state.active else {
            return match detected {
                Some(label) => {
                    self.start(label, now);
                    vec![GestureEvent::Detect(label)]
                }
                None => Vec::new(),
            };
        };

        if detected == Some(active) {
            self.state.last_confirmed_at = Some(now);
            return vec![GestureEvent::Hold(active)];
        }

        if !self.expired(now) {
            return Vec::new();
        }

        match detected {
            Some(other) => {
                self.start(other, now);
                vec![GestureEvent::Cancel(active), GestureEvent::Detect(other)]
            }
            None => {
                self.reset();
                vec![GestureEvent::Cancel(active)]
            }
        }
    }

    fn start(&mut self, label: GestureLabel, now: Instant) {
        self.state = GestureState {
            active: Some(label),
            started_at: Some(now),
            last_confirmed_at: Some(now),
        };
    }

    fn expired(&self, now: Instant) -> bool {
        self.state
            .last_confirmed_at
            .is_none_or(|seen| now.saturating_duration_since(seen) > self.cancel_cooldown)
    }
}
