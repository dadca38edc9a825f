use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    config::SwipeConfig,
    types::{Point2D, SwipeDirection},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySample {
    pub at: Instant,
    /// Tracked fingertip, in pixels.
    pub position: Point2D,
    /// Wrist x in pixels; the fingertip crossing it marks a deliberate stroke.
    pub reference_x: f32,
    /// Palm width in pixels, so speed reads the same near and far from the camera.
    pub scale_reference: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
    pub dx: f32,
    pub dy: f32,
}

/// Recent fingertip samples no older than `window` relative to the newest.
#[derive(Clone, Debug)]
pub struct TrajectoryWindow {
    window: Duration,
    samples: VecDeque<TrajectorySample>,
}

impl TrajectoryWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sample: TrajectorySample) {
        if let Some(last) = self.samples.back() {
            if sample.at < last.at {
                log::debug!("dropping out-of-order trajectory sample");
                return;
            }
        }

        self.samples.push_back(sample);

        while let Some(front) = self.samples.front() {
            if sample.at.duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&TrajectorySample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&TrajectorySample> {
        self.samples.back()
    }

    /// Endpoint velocity between the oldest and newest sample.
    pub fn velocity(&self) -> Velocity {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return Velocity::default();
        };

        let dt = last.at.duration_since(first.at).as_secs_f32();
        if self.samples.len() < 2 || dt <= 0.0 {
            return Velocity::default();
        }

        let dx = last.position.x - first.position.x;
        let dy = last.position.y - first.position.y;
        Velocity {
            vx: dx / dt,
            vy: dy / dt,
            dx,
            dy,
        }
    }

    pub fn mean_scale(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.scale_reference).sum::<f32>() / self.samples.len() as f32
    }
}

/// Decides whether the window holds a fast, mostly horizontal stroke.
#[derive(Clone, Debug)]
pub struct SwipeDetector {
    speed_threshold: f32,
    horizontal_ratio: f32,
    trigger_cooldown: Duration,
    require_crossing: bool,
    last_fired: Option<Instant>,
}

impl SwipeDetector {
    pub fn new(config: &SwipeConfig) -> Self {
        Self {
            speed_threshold: config.speed_threshold,
            horizontal_ratio: config.horizontal_ratio,
            trigger_cooldown: config.trigger_cooldown(),
            require_crossing: config.require_crossing,
            last_fired: None,
        }
    }

    pub fn detect(&mut self, window: &TrajectoryWindow, now: Instant) -> Option<SwipeDirection> {
        let (first, last) = (window.first()?, window.last()?);
        if window.len() < 2 {
            return None;
        }

        let velocity = window.velocity();
        let scale = window.mean_scale().max(1.0);
        let speed = velocity.vx.abs() / scale;

        if speed < self.speed_threshold {
            return None;
        }
        if velocity.dy.abs() > self.horizontal_ratio * velocity.dx.abs() {
            return None;
        }
        if self.require_crossing && !crosses_reference(first, last) {
            return None;
        }
        if let Some(fired) = self.last_fired {
            if now.saturating_duration_since(fired) < self.trigger_cooldown {
                return None;
            }
        }

        self.last_fired = Some(now);
        let direction = if velocity.vx > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        };
        log::debug!(
            "swipe {} at {speed:.1} palm widths/s (dx {:.0}px, dy {:.0}px)",
            direction.label(),
            velocity.dx,
            velocity.dy
        );
        Some(direction)
    }
}

fn crosses_reference(first: &TrajectorySample, last: &TrajectorySample) -> bool {
    let before = first.position.x - first.reference_x;
    let after = last.position.x - last.reference_x;
    (before < 0.0 && after > 0.0) || (before > 0.0 && after < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALM: f32 = 100.0;

    fn config() -> SwipeConfig {
        SwipeConfig {
            window_ms: 500,
            speed_threshold: 5.0,
            horizontal_ratio: 0.6,
            trigger_cooldown_ms: 1_000,
            require_crossing: true,
        }
    }

    fn sample(start: Instant, ms: u64, x: f32, y: f32) -> TrajectorySample {
        TrajectorySample {
            at: start + Duration::from_millis(ms),
            position: Point2D::new(x, y),
            reference_x: 300.0,
            scale_reference: PALM,
        }
    }

    /// Five evenly spaced samples moving 400px right and 20px down over `duration_ms`.
    fn stroke(start: Instant, duration_ms: u64) -> TrajectoryWindow {
        let mut window = TrajectoryWindow::new(config().window());
        for i in 0..5u64 {
            let t = i as f32 / 4.0;
            window.push(sample(start, i * duration_ms / 4, 100.0 + 400.0 * t, 200.0 + 20.0 * t));
        }
        window
    }

    #[test]
    fn velocity_needs_two_samples() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(Duration::from_millis(500));
        assert_eq!(window.velocity(), Velocity::default());
        window.push(sample(start, 0, 10.0, 10.0));
        assert_eq!(window.velocity(), Velocity::default());
        window.push(sample(start, 250, 60.0, 0.0));
        let v = window.velocity();
        assert!((v.vx - 200.0).abs() < 1e-3);
        assert!((v.vy + 40.0).abs() < 1e-3);
        assert_eq!((v.dx, v.dy), (50.0, -10.0));
    }

    #[test]
    fn window_drops_stale_samples() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(Duration::from_millis(500));
        for i in 0..10u64 {
            window.push(sample(start, i * 100, i as f32, 0.0));
        }
        assert_eq!(window.len(), 6);
        assert_eq!(window.first().map(|s| s.position.x), Some(4.0));
        window.clear();
        assert!(window.is_empty());
    }

    #[test]
    fn out_of_order_samples_are_ignored() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(Duration::from_millis(500));
        window.push(sample(start, 200, 1.0, 0.0));
        window.push(sample(start, 100, 2.0, 0.0));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn fast_stroke_fires_once() {
        let start = Instant::now();
        let window = stroke(start, 300);
        let mut detector = SwipeDetector::new(&config());
        let now = window.last().unwrap().at;
        assert_eq!(detector.detect(&window, now), Some(SwipeDirection::Right));
        assert_eq!(detector.detect(&window, now + Duration::from_millis(30)), None);
    }

    #[test]
    fn slow_stroke_does_not_fire() {
        let start = Instant::now();
        let window = stroke(start, 2_000);
        let mut detector = SwipeDetector::new(&config());
        assert_eq!(detector.detect(&window, window.last().unwrap().at), None);
    }

    #[test]
    fn leftward_stroke_reports_left() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(config().window());
        window.push(sample(start, 0, 500.0, 200.0));
        window.push(sample(start, 200, 100.0, 210.0));
        let mut detector = SwipeDetector::new(&config());
        assert_eq!(detector.detect(&window, start), Some(SwipeDirection::Left));
    }

    #[test]
    fn diagonal_stroke_does_not_fire() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(config().window());
        window.push(sample(start, 0, 100.0, 100.0));
        window.push(sample(start, 200, 500.0, 400.0));
        let mut detector = SwipeDetector::new(&config());
        assert_eq!(detector.detect(&window, start), None);
    }

    #[test]
    fn stroke_that_stays_on_one_side_does_not_fire() {
        let start = Instant::now();
        let mut window = TrajectoryWindow::new(config().window());
        window.push(sample(start, 0, 400.0, 200.0));
        window.push(sample(start, 200, 800.0, 200.0));
        let mut detector = SwipeDetector::new(&config());
        assert_eq!(detector.detect(&window, start), None);

        let mut lenient = SwipeDetector::new(&SwipeConfig {
            require_crossing: false,
            ..config()
        });
        assert_eq!(lenient.detect(&window, start), Some(SwipeDirection::Right));
    }

    #[test]
    fn cooldown_expires() {
        let start = Instant::now();
        let window = stroke(start, 300);
        let mut detector = SwipeDetector::new(&config());
        let now = window.last().unwrap().at;
        assert!(detector.detect(&window, now).is_some());
        assert!(detector.detect(&window, now + Duration::from_millis(999)).is_none());
        assert!(detector.detect(&window, now + Duration::from_millis(1_000)).is_some());
    }
}
