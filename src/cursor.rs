//! Cursor tracking for the feedback loop.
//!
//! Converts raw pointer/touch input into a normalized cursor position and a
//! stream of discrete stop events. Continuous movement only moves the easing
//! target; a discrete activation snaps the cursor and latches a stop event
//! that the frame scheduler consumes exactly once.

use glam::Vec2;

/// Default easing factor applied per frame.
pub const DEFAULT_EASE: f32 = 0.02;

/// A viewport location in `[0,1]²`, origin top-left, independent of pixel size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NormalizedPoint(Vec2);

impl NormalizedPoint {
    /// Create a point, clamping both components into `[0,1]`.
    pub fn new(x: f32, y: f32) -> Self {
        Self(Vec2::new(x, y).clamp(Vec2::ZERO, Vec2::ONE))
    }

    /// Normalize a pixel position against a viewport size.
    ///
    /// Degenerate sizes map to the viewport centre.
    pub fn from_pixels(px: f32, py: f32, width: f32, height: f32) -> Self {
        if width <= 0.0 || height <= 0.0 {
            return Self::center();
        }
        Self::new(px / width, py / height)
    }

    pub fn center() -> Self {
        Self(Vec2::splat(0.5))
    }

    pub fn x(&self) -> f32 {
        self.0.x
    }

    pub fn y(&self) -> f32 {
        self.0.y
    }

    pub fn as_vec2(&self) -> Vec2 {
        self.0
    }

    pub fn to_array(&self) -> [f32; 2] {
        self.0.to_array()
    }
}

impl From<(f32, f32)> for NormalizedPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Smoothed cursor position.
///
/// `current` eases toward `target` every frame unless `pinned`; a discrete
/// activation pins the cursor at the activation point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorState {
    pub current: NormalizedPoint,
    pub target: NormalizedPoint,
    pub pinned: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            current: NormalizedPoint::center(),
            target: NormalizedPoint::center(),
            pinned: false,
        }
    }
}

/// Converts pointer input into a [`CursorState`] and edge-triggered stop events.
#[derive(Clone, Debug)]
pub struct CursorTracker {
    state: CursorState,
    ease: f32,
    /// Set once touch input is seen; continuous updates are ignored afterwards.
    touch_locked: bool,
    pending_stop: bool,
}

impl CursorTracker {
    /// Create a tracker. `ease` is clamped into `(0,1]`.
    pub fn new(ease: f32, touch_platform: bool) -> Self {
        Self {
            state: CursorState::default(),
            ease: clamp_ease(ease),
            touch_locked: touch_platform,
            pending_stop: false,
        }
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn ease(&self) -> f32 {
        self.ease
    }

    /// Whether continuous updates are currently being suppressed.
    pub fn is_touch_locked(&self) -> bool {
        self.touch_locked
    }

    /// Ambient pointer movement: moves the easing target and releases a pin.
    /// Never fires a stop event.
    pub fn observe_continuous(&mut self, point: NormalizedPoint) {
        if self.touch_locked {
            return;
        }
        self.state.target = point;
        self.state.pinned = false;
    }

    /// Click/tap: snaps the cursor to `point`, pins it and latches a stop event.
    pub fn observe_discrete(&mut self, point: NormalizedPoint) {
        self.state.current = point;
        self.state.target = point;
        self.state.pinned = true;
        self.pending_stop = true;
        log::debug!("Stop event at ({:.3}, {:.3})", point.x(), point.y());
    }

    /// Touch activation. Behaves like [`observe_discrete`](Self::observe_discrete)
    /// and suppresses continuous updates for the rest of the session, since
    /// browsers synthesize mouse events from touches.
    pub fn observe_touch(&mut self, point: NormalizedPoint) {
        if !self.touch_locked {
            log::info!("Touch input detected; ignoring continuous pointer movement from now on");
        }
        self.touch_locked = true;
        self.observe_discrete(point);
    }

    /// Advance the easing by one frame.
    pub fn step(&mut self) {
        if self.state.pinned {
            return;
        }
        if self.ease >= 1.0 {
            // `c + (t - c)` need not round to `t`.
            self.state.current = self.state.target;
            return;
        }
        let current = self.state.current.as_vec2();
        let target = self.state.target.as_vec2();
        self.state.current = NormalizedPoint(current + (target - current) * self.ease);
    }

    /// Consume the latched stop event, if any.
    pub fn take_stop_event(&mut self) -> bool {
        std::mem::take(&mut self.pending_stop)
    }
}

impl Default for CursorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EASE, false)
    }
}

fn clamp_ease(ease: f32) -> f32 {
    if ease.is_finite() && ease > 0.0 {
        ease.min(1.0)
    } else {
        log::warn!("Invalid ease {}, falling back to {}", ease, DEFAULT_EASE);
        DEFAULT_EASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_at(current: (f32, f32), target: (f32, f32)) -> CursorTracker {
        let mut tracker = CursorTracker::default();
        tracker.state.current = current.into();
        tracker.state.target = target.into();
        tracker
    }

    #[test]
    fn test_point_clamps_into_unit_square() {
        let p = NormalizedPoint::new(-0.5, 1.5);
        assert_eq!(p.to_array(), [0.0, 1.0]);
    }

    #[test]
    fn test_from_pixels() {
        let p = NormalizedPoint::from_pixels(200.0, 150.0, 800.0, 600.0);
        assert_eq!(p.to_array(), [0.25, 0.25]);
        assert_eq!(NormalizedPoint::from_pixels(1.0, 1.0, 0.0, 600.0), NormalizedPoint::center());
    }

    #[test]
    fn test_easing_follows_geometric_law() {
        let mut tracker = tracker_at((0.66, 0.3), (0.75, 0.5));
        let e = tracker.ease();
        let initial = (0.75f32 - 0.66, 0.5f32 - 0.3);

        for k in 1..=20 {
            tracker.step();
            let factor = (1.0 - e).powi(k);
            let cur = tracker.state().current;
            assert!(((0.75 - cur.x()) - initial.0 * factor).abs() < 1e-5);
            assert!(((0.5 - cur.y()) - initial.1 * factor).abs() < 1e-5);
        }
    }

    #[test]
    fn test_easing_is_monotonic_without_overshoot() {
        let mut tracker = tracker_at((0.1, 0.9), (0.8, 0.2));
        let mut prev = tracker.state().current;
        for _ in 0..500 {
            tracker.step();
            let cur = tracker.state().current;
            assert!(cur.x() >= prev.x() && cur.x() <= 0.8);
            assert!(cur.y() <= prev.y() && cur.y() >= 0.2);
            prev = cur;
        }
    }

    #[test]
    fn test_easing_scenario_300_frames() {
        let mut tracker = tracker_at((0.66, 0.3), (0.75, 0.5));
        for _ in 0..300 {
            tracker.step();
        }
        let cur = tracker.state().current;
        assert!((cur.x() - 0.75).abs() < 1e-3);
        assert!((cur.y() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_ease_of_one_snaps() {
        let mut tracker = CursorTracker::new(1.0, false);
        tracker.observe_continuous(NormalizedPoint::new(0.9, 0.1));
        tracker.step();
        assert_eq!(tracker.state().current.to_array(), [0.9, 0.1]);

        tracker.observe_continuous(NormalizedPoint::new(0.3, 0.7));
        tracker.step();
        assert_eq!(tracker.state().current, tracker.state().target);
    }

    #[test]
    fn test_invalid_ease_falls_back() {
        assert_eq!(CursorTracker::new(0.0, false).ease(), DEFAULT_EASE);
        assert_eq!(CursorTracker::new(f32::NAN, false).ease(), DEFAULT_EASE);
        assert_eq!(CursorTracker::new(3.0, false).ease(), 1.0);
    }

    #[test]
    fn test_continuous_never_fires_stop_event() {
        let mut tracker = CursorTracker::default();
        for i in 0..10 {
            tracker.observe_continuous(NormalizedPoint::new(i as f32 / 10.0, 0.5));
            tracker.step();
        }
        assert!(!tracker.take_stop_event());
    }

    #[test]
    fn test_discrete_snaps_pins_and_latches_once() {
        let mut tracker = CursorTracker::default();
        tracker.observe_discrete(NormalizedPoint::new(0.2, 0.8));

        let state = tracker.state();
        assert_eq!(state.current, state.target);
        assert_eq!(state.current.to_array(), [0.2, 0.8]);
        assert!(state.pinned);

        assert!(tracker.take_stop_event());
        assert!(!tracker.take_stop_event());
    }

    #[test]
    fn test_pinned_cursor_does_not_ease() {
        let mut tracker = CursorTracker::default();
        tracker.observe_discrete(NormalizedPoint::new(0.2, 0.8));
        tracker.step();
        assert_eq!(tracker.state().current.to_array(), [0.2, 0.8]);

        tracker.observe_continuous(NormalizedPoint::new(0.4, 0.8));
        assert!(!tracker.state().pinned);
        tracker.step();
        assert!(tracker.state().current.x() > 0.2);
    }

    #[test]
    fn test_touch_suppresses_continuous_updates() {
        let mut tracker = CursorTracker::default();
        tracker.observe_touch(NormalizedPoint::new(0.3, 0.3));
        assert!(tracker.is_touch_locked());
        assert!(tracker.take_stop_event());

        tracker.observe_continuous(NormalizedPoint::new(0.9, 0.9));
        assert_eq!(tracker.state().target.to_array(), [0.3, 0.3]);

        // Discrete input still works after touch lock
        tracker.observe_discrete(NormalizedPoint::new(0.6, 0.6));
        assert_eq!(tracker.state().current.to_array(), [0.6, 0.6]);
    }

    #[test]
    fn test_touch_platform_starts_locked() {
        let mut tracker = CursorTracker::new(DEFAULT_EASE, true);
        tracker.observe_continuous(NormalizedPoint::new(0.9, 0.9));
        assert_eq!(tracker.state().target, NormalizedPoint::center());
    }
}
