use crate::{
    actions::{ActionSink, KeyChord, KeyName},
    config::RingConfig,
    types::Point2D,
};

const SWITCHER_MODIFIER: KeyName = KeyName::Alt;
const SWITCHER_KEY: KeyName = KeyName::Tab;
const REVERSE_MODIFIER: KeyName = KeyName::Shift;

/// Reports how many windows the OS switcher cycles through.
pub trait RingSizeProvider {
    fn eligible_windows(&mut self) -> anyhow::Result<usize>;
}

impl<P: RingSizeProvider + ?Sized> RingSizeProvider for Box<P> {
    fn eligible_windows(&mut self) -> anyhow::Result<usize> {
        (**self).eligible_windows()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingDirection {
    Forward,
    Backward,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingNavigationState {
    pub is_open: bool,
    pub ring_size: usize,
    /// 1-based; 1 is the entry right after the current window.
    pub current_index: usize,
    pub origin: Option<Point2D>,
    pub unit_pixels: f32,
}

impl Default for RingNavigationState {
    fn default() -> Self {
        Self {
            is_open: false,
            ring_size: 1,
            current_index: 1,
            origin: None,
            unit_pixels: 1.0,
        }
    }
}

/// Drives the OS window switcher as a ring: holds the switcher open while
/// the gesture lasts and moves the highlight to follow the finger.
#[derive(Clone, Debug)]
pub struct RingNavigator {
    spread: f32,
    min_unit_pixels: f32,
    state: RingNavigationState,
}

impl RingNavigator {
    pub fn new(config: &RingConfig) -> Self {
        Self {
            spread: config.spread,
            min_unit_pixels: config.min_unit_pixels,
            state: RingNavigationState::default(),
        }
    }

    pub fn state(&self) -> &RingNavigationState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open
    }

    /// Opens the switcher with the finger at `origin`. `travel_width` is the
    /// pixel width the finger can move across, split evenly over the ring.
    /// Returns false if a session is already open.
    pub fn open<P, S>(
        &mut self,
        provider: &mut P,
        sink: &mut S,
        origin: Point2D,
        travel_width: f32,
    ) -> bool
    where
        P: RingSizeProvider + ?Sized,
        S: ActionSink + ?Sized,
    {
        if self.state.is_open {
            return false;
        }

        let ring_size = match provider.eligible_windows() {
            Ok(count) => count.max(1),
            Err(err) => {
                log::warn!("window enumeration failed, assuming a single window: {err:?}");
                1
            }
        };
        let unit_pixels = (travel_width / (ring_size as f32 * self.spread)).max(self.min_unit_pixels);

        if let Err(err) = sink.press_modifier(SWITCHER_MODIFIER) {
            log::warn!("failed to hold switcher modifier: {err}");
        }
        if let Err(err) = sink.press_key(SWITCHER_KEY) {
            log::warn!("failed to open switcher: {err}");
        }

        self.state = RingNavigationState {
            is_open: true,
            ring_size,
            current_index: 1,
            origin: Some(origin),
            unit_pixels,
        };
        log::info!("switcher opened with {ring_size} windows ({unit_pixels:.0}px per step)");
        true
    }

    /// Moves the highlight to the ring slot under `finger_x`. Returns the
    /// number of key presses sent.
    pub fn update<S>(&mut self, sink: &mut S, finger_x: f32, hint: Option<RingDirection>) -> usize
    where
        S: ActionSink + ?Sized,
    {
        let Some(origin) = self.state.origin.filter(|_| self.state.is_open) else {
            return 0;
        };

        let target = target_index(
            finger_x - origin.x,
            self.state.unit_pixels,
            self.state.ring_size,
        );
        if target == self.state.current_index {
            return 0;
        }

        let (direction, presses) =
            plan_moves(self.state.current_index, target, self.state.ring_size, hint);
        let chord = match direction {
            RingDirection::Forward => KeyChord::new(&[], SWITCHER_KEY),
            RingDirection::Backward => KeyChord::new(&[REVERSE_MODIFIER], SWITCHER_KEY),
        };
        for _ in 0..presses {
            if let Err(err) = chord.send(sink) {
                log::warn!("switcher step {chord} failed: {err}");
            }
        }

        log::debug!(
            "switcher {} -> {target} ({presses} x {direction:?})",
            self.state.current_index
        );
        self.state.current_index = target;
        presses
    }

    /// Releases the switcher. With `confirm` the highlighted window is
    /// activated, otherwise the switcher is dismissed first. Calling this on
    /// a closed navigator does nothing and returns false.
    pub fn close<S>(&mut self, sink: &mut S, confirm: bool) -> bool
    where
        S: ActionSink + ?Sized,
    {
        if !self.state.is_open {
            return false;
        }

        if !confirm {
            if let Err(err) = sink.press_key(KeyName::Escape) {
                log::warn!("failed to dismiss switcher: {err}");
            }
        }
        if let Err(err) = sink.release_modifier(SWITCHER_MODIFIER) {
            log::warn!("failed to release switcher modifier: {err}");
        }

        log::info!(
            "switcher closed on {} of {} ({})",
            self.state.current_index,
            self.state.ring_size,
            if confirm { "confirmed" } else { "dismissed" }
        );
        self.state = RingNavigationState {
            ring_size: self.state.ring_size,
            ..RingNavigationState::default()
        };
        true
    }
}

/// Ring slot for a horizontal offset from the origin, wrapping both ways.
pub fn target_index(offset: f32, unit_pixels: f32, ring_size: usize) -> usize {
    let n = ring_size.max(1) as i64;
    let steps = (offset / unit_pixels.max(f32::EPSILON)).round() as i64;
    steps.rem_euclid(n) as usize + 1
}

/// Shorter way around the ring from `current` to `target`. Ties go to the
/// hint, or forward without one.
pub fn plan_moves(
    current: usize,
    target: usize,
    ring_size: usize,
    hint: Option<RingDirection>,
) -> (RingDirection, usize) {
    let n = ring_size.max(1) as i64;
    let (current, target) = (current as i64, target as i64);
    let forward = (target - current).rem_euclid(n) as usize;
    let backward = (current - target).rem_euclid(n) as usize;

    if forward < backward {
        (RingDirection::Forward, forward)
    } else if backward < forward {
        (RingDirection::Backward, backward)
    } else {
        match hint.unwrap_or(RingDirection::Forward) {
            RingDirection::Forward => (RingDirection::Forward, forward),
            RingDirection::Backward => (RingDirection::Backward, backward),
        }
    }
}
