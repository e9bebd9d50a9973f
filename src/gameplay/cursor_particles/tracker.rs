use bevy::math::Vec2;

// Anchor velocity in units per millisecond, held between sampling windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityTracker {
    window_ms: f64,
    last_position: Option<Vec2>,
    accumulated_displacement: Vec2,
    accumulated_ms: f64,
    estimate: Vec2,
}

impl VelocityTracker {
    pub fn new(window_ms: f64) -> Self {
        Self {
            window_ms,
            last_position: None,
            accumulated_displacement: Vec2::ZERO,
            accumulated_ms: 0.0,
            estimate: Vec2::ZERO,
        }
    }

    pub fn update(&mut self, anchor_position: Vec2, elapsed_ms: f64) {
        let Some(last_position) = self.last_position.replace(anchor_position) else {
            return;
        };

        self.accumulated_displacement += anchor_position - last_position;
        self.accumulated_ms += elapsed_ms;

        if self.accumulated_ms > self.window_ms {
            self.estimate = self.accumulated_displacement / self.accumulated_ms as f32;
            self.accumulated_displacement = Vec2::ZERO;
            self.accumulated_ms = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.accumulated_displacement = Vec2::ZERO;
        self.accumulated_ms = 0.0;
        self.last_position = None;
    }

    pub fn set_window_ms(&mut self, window_ms: f64) {
        self.window_ms = window_ms;
    }

    pub fn estimate(&self) -> Vec2 {
        self.estimate
    }

    #[cfg(test)]
    fn accumulators(&self) -> (Vec2, f64, Option<Vec2>) {
        (
            self.accumulated_displacement,
            self.accumulated_ms,
            self.last_position,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW_MS: f64 = 15.0;

    #[test]
    fn first_update_only_records_the_position() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        tracker.update(Vec2::new(40.0, -12.0), 100.0);

        assert_eq!(tracker.estimate(), Vec2::ZERO);
        assert_eq!(
            tracker.accumulators(),
            (Vec2::ZERO, 0.0, Some(Vec2::new(40.0, -12.0)))
        );
    }

    #[test]
    fn stationary_anchor_settles_at_zero() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        let anchor = Vec2::new(320.0, 240.0);
        for _ in 0..200 {
            tracker.update(anchor, 4.0);
            assert_eq!(tracker.estimate(), Vec2::ZERO);
        }
    }

    #[test]
    fn constant_motion_yields_displacement_over_window() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        let step = Vec2::new(3.0, -1.5);
        let mut position = Vec2::ZERO;
        tracker.update(position, 4.0);

        // 4 ms steps: 4, 8, 12, 16 -> the fourth step crosses the window.
        for _ in 0..3 {
            position += step;
            tracker.update(position, 4.0);
            assert_eq!(tracker.estimate(), Vec2::ZERO);
        }

        position += step;
        tracker.update(position, 4.0);

        let expected = (step * 4.0) / 16.0;
        assert!((tracker.estimate() - expected).length() < 1e-6);
        assert_eq!(tracker.accumulators(), (Vec2::ZERO, 0.0, Some(position)));
    }

    #[test]
    fn estimate_is_held_between_windows() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        tracker.update(Vec2::ZERO, 0.0);
        tracker.update(Vec2::new(32.0, 0.0), 16.0);
        let held = tracker.estimate();
        assert_eq!(held, Vec2::new(2.0, 0.0));

        // A fast flick inside the next window does not leak out early.
        tracker.update(Vec2::new(500.0, 0.0), 5.0);
        assert_eq!(tracker.estimate(), held);
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        tracker.update(Vec2::ZERO, 0.0);
        tracker.update(Vec2::new(15.0, 0.0), 15.0);
        assert_eq!(tracker.estimate(), Vec2::ZERO);

        tracker.update(Vec2::new(16.0, 0.0), 1.0);
        assert_eq!(tracker.estimate(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        tracker.update(Vec2::ZERO, 0.0);
        tracker.update(Vec2::new(5.0, 5.0), 6.0);

        tracker.reset();
        let once = tracker;
        tracker.reset();

        assert_eq!(tracker, once);
        assert_eq!(tracker.accumulators(), (Vec2::ZERO, 0.0, None));
    }

    #[test]
    fn reset_discards_motion_across_the_gap() {
        let mut tracker = VelocityTracker::new(WINDOW_MS);
        tracker.update(Vec2::ZERO, 0.0);
        tracker.reset();

        // After a reset the next position is a fresh warm-up, so the jump
        // from the old position is never counted.
        tracker.update(Vec2::new(1_000.0, 0.0), 8.0);
        tracker.update(Vec2::new(1_000.0, 0.0), 8.0);
        tracker.update(Vec2::new(1_000.0, 0.0), 8.0);
        assert_eq!(tracker.estimate(), Vec2::ZERO);
    }
}
