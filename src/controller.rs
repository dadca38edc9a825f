use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::{
    actions::ActionSink,
    config::{AppConfig, Bindings, GestureRole},
    geometry::palm_width,
    gesture::GestureClassifier,
    lifecycle::{GestureEvent, GestureTracker},
    ring::{RingDirection, RingNavigator, RingSizeProvider},
    trajectory::{SwipeDetector, TrajectorySample, TrajectoryWindow},
    types::{GestureLabel, HandLandmarks, HandObservation, SwipeDirection, joint},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Detected(GestureLabel),
    Cancelled(GestureLabel),
    Swipe {
        label: GestureLabel,
        direction: SwipeDirection,
    },
    RingOpened {
        size: usize,
    },
    RingMoved {
        index: usize,
        presses: usize,
    },
    RingClosed,
}

/// Per-frame orchestration: classification, lifecycle, swipe and ring
/// decisions, and the key events they trigger. Owned by the control thread.
pub struct TouchpadController<S, P> {
    classifier: GestureClassifier,
    tracker: GestureTracker,
    window: TrajectoryWindow,
    swipe: SwipeDetector,
    ring: RingNavigator,
    bindings: Bindings,
    provider: P,
    sink: S,
    started_at: Option<Instant>,
    last_finger_x: Option<f32>,
}

impl<S, P> TouchpadController<S, P>
where
    S: ActionSink,
    P: RingSizeProvider,
{
    pub fn new(config: &AppConfig, provider: P, sink: S) -> Self {
        Self {
            classifier: GestureClassifier::new(config.classifier.clone()),
            tracker: GestureTracker::new(config.lifecycle.cancel_cooldown()),
            window: TrajectoryWindow::new(config.swipe.window()),
            swipe: SwipeDetector::new(&config.swipe),
            ring: RingNavigator::new(&config.ring),
            bindings: config.bindings.clone(),
            provider,
            sink,
            started_at: None,
            last_finger_x: None,
        }
    }

    pub fn step(&mut self, observation: &HandObservation) -> Vec<ControlEvent> {
        let now = observation.timestamp;
        let elapsed = now
            .saturating_duration_since(*self.started_at.get_or_insert(now))
            .as_secs_f32();

        let detected = observation
            .hand
            .as_ref()
            .and_then(|hand| self.classifier.classify(hand));
        let sample = observation.hand.as_ref().map(|hand| {
            track_sample(
                hand,
                observation.frame_width as f32,
                observation.frame_height as f32,
                now,
            )
        });

        let mut out = Vec::new();
        for event in self.tracker.update(detected, now) {
            match event {
                GestureEvent::Detect(label) => {
                    log::info!("DETECT({label}, {elapsed:.2}s)");
                    out.push(ControlEvent::Detected(label));
                    self.on_detect(label, sample, observation.frame_width as f32, &mut out);
                }
                GestureEvent::Hold(label) => self.on_hold(label, sample, elapsed, &mut out),
                GestureEvent::Cancel(label) => {
                    log::info!("CANCEL({label}, {elapsed:.2}s)");
                    out.push(ControlEvent::Cancelled(label));
                    self.window.clear();
                    self.last_finger_x = None;
                    self.close_ring(&mut out);
                }
            }
        }
        out
    }

    /// Drains observations until every sender is gone, then releases any
    /// switcher still held open.
    pub fn run(mut self, observations: Receiver<HandObservation>) {
        for observation in observations.iter() {
            self.step(&observation);
        }
        log::info!("observation stream closed, stopping control loop");
        self.shutdown();
    }

    pub fn shutdown(&mut self) {
        if self.ring.is_open() {
            log::info!("releasing switcher held open at shutdown");
        }
        self.tracker.reset();
        self.window.clear();
        let mut out = Vec::new();
        self.close_ring(&mut out);
    }

    fn on_detect(
        &mut self,
        label: GestureLabel,
        sample: Option<TrajectorySample>,
        frame_width: f32,
        out: &mut Vec<ControlEvent>,
    ) {
        self.window.clear();
        let Some(sample) = sample else {
            return;
        };
        self.window.push(sample);
        self.last_finger_x = Some(sample.position.x);

        match self.bindings.role(label) {
            GestureRole::Ring => {
                if self
                    .ring
                    .open(&mut self.provider, &mut self.sink, sample.position, frame_width)
                {
                    out.push(ControlEvent::RingOpened {
                        size: self.ring.state().ring_size,
                    });
                }
            }
            GestureRole::Swipe { .. } | GestureRole::Ignore => {}
        }
    }

    fn on_hold(
        &mut self,
        label: GestureLabel,
        sample: Option<TrajectorySample>,
        elapsed: f32,
        out: &mut Vec<ControlEvent>,
    ) {
        let Some(sample) = sample else {
            return;
        };
        self.window.push(sample);

        match self.bindings.role(label) {
            GestureRole::Swipe { left, right } => {
                let Some(direction) = self.swipe.detect(&self.window, sample.at) else {
                    return;
                };
                let chord = match direction {
                    SwipeDirection::Left => left,
                    SwipeDirection::Right => right,
                };
                log::info!("SWIPE({}, {elapsed:.2}s) -> {chord}", direction.label());
                if let Err(err) = chord.send(&mut self.sink) {
                    log::warn!("failed to send {chord}: {err}");
                }
                self.window.clear();
                out.push(ControlEvent::Swipe { label, direction });
            }
            GestureRole::Ring => {
                let x = sample.position.x;
                let hint = self.last_finger_x.and_then(|last| {
                    if x > last {
                        Some(RingDirection::Forward)
                    } else if x < last {
                        Some(RingDirection::Backward)
                    } else {
                        None
                    }
                });
                self.last_finger_x = Some(x);

                let presses = self.ring.update(&mut self.sink, x, hint);
                if presses > 0 {
                    out.push(ControlEvent::RingMoved {
                        index: self.ring.state().current_index,
                        presses,
                    });
                }
            }
            GestureRole::Ignore => {}
        }
    }

    fn close_ring(&mut self, out: &mut Vec<ControlEvent>) {
        if self.ring.close(&mut self.sink, true) {
            out.push(ControlEvent::RingClosed);
        }
    }
}

#[cfg(test)]
impl<S, P> TouchpadController<S, P> {
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn window(&self) -> &TrajectoryWindow {
        &self.window
    }
}

/// Index fingertip, wrist and palm width in pixels.
fn track_sample(hand: &HandLandmarks, width: f32, height: f32, at: Instant) -> TrajectorySample {
    let pixels = HandLandmarks::new(hand.points().map(|p| p.scaled(width, height)));
    TrajectorySample {
        at,
        position: pixels.point(joint::INDEX_TIP),
        reference_x: pixels.point(joint::WRIST).x,
        scale_reference: palm_width(&pixels),
    }
}
