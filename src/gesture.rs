use std::time::Instant;

/// Swipe decision thresholds. These encode a UX tuning choice, not part of
/// the navigation algorithm: a fast short flick must outrank a slow long
/// drag, so the velocity threshold is checked first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum drag distance, in points.
    pub distance: f32,
    /// Minimum flick velocity, in points per second.
    pub velocity: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            distance: 50.0,
            velocity: 500.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Next,
    Previous,
}

/// One completed drag, already collapsed to its end state. Negative y points
/// up (towards the next item), matching screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSample {
    pub offset_y: f32,
    pub velocity_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct GestureNavigator {
    thresholds: Thresholds,
}

impl GestureNavigator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Collapse a finished drag into at most one discrete transition,
    /// regardless of overshoot.
    pub fn on_drag_end(&self, sample: GestureSample) -> Option<Swipe> {
        if sample.velocity_y < -self.thresholds.velocity {
            return Some(Swipe::Next);
        }
        if sample.velocity_y > self.thresholds.velocity {
            return Some(Swipe::Previous);
        }
        if sample.offset_y < -self.thresholds.distance {
            return Some(Swipe::Next);
        }
        if sample.offset_y > self.thresholds.distance {
            return Some(Swipe::Previous);
        }
        None
    }
}

/// Accumulates a single terminal mouse drag into a `GestureSample`. Cell rows
/// are scaled to points so the thresholds keep their touch-screen meaning.
#[derive(Debug)]
pub struct DragTracker {
    points_per_cell: f32,
    drag: Option<DragState>,
}

#[derive(Debug)]
struct DragState {
    origin_row: u16,
    started: Instant,
}

impl DragTracker {
    pub fn new(points_per_cell: f32) -> Self {
        Self {
            points_per_cell: points_per_cell.max(1.0),
            drag: None,
        }
    }

    pub fn begin(&mut self, row: u16) {
        self.drag = Some(DragState {
            origin_row: row,
            started: Instant::now(),
        });
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Ends the drag and returns the sample to feed `on_drag_end`, or `None`
    /// when no drag was in progress.
    pub fn finish(&mut self, row: u16) -> Option<GestureSample> {
        let drag = self.drag.take()?;
        let cells = f32::from(row) - f32::from(drag.origin_row);
        let offset_y = cells * self.points_per_cell;
        let elapsed = drag.started.elapsed().as_secs_f32().max(0.001);
        Some(GestureSample {
            offset_y,
            velocity_y: offset_y / elapsed,
        })
    }

    pub fn cancel(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigator() -> GestureNavigator {
        GestureNavigator::new(Thresholds::default())
    }

    #[test]
    fn long_upward_drag_advances() {
        let sample = GestureSample {
            offset_y: -60.0,
            velocity_y: -100.0,
        };
        assert_eq!(navigator().on_drag_end(sample), Some(Swipe::Next));
    }

    #[test]
    fn short_slow_drag_is_ignored() {
        let sample = GestureSample {
            offset_y: -30.0,
            velocity_y: -100.0,
        };
        assert_eq!(navigator().on_drag_end(sample), None);
    }

    #[test]
    fn fast_flick_wins_over_short_distance() {
        let sample = GestureSample {
            offset_y: -10.0,
            velocity_y: -900.0,
        };
        assert_eq!(navigator().on_drag_end(sample), Some(Swipe::Next));
    }

    #[test]
    fn downward_motion_goes_back() {
        let sample = GestureSample {
            offset_y: 72.0,
            velocity_y: 120.0,
        };
        assert_eq!(navigator().on_drag_end(sample), Some(Swipe::Previous));
        let flick = GestureSample {
            offset_y: 8.0,
            velocity_y: 640.0,
        };
        assert_eq!(navigator().on_drag_end(flick), Some(Swipe::Previous));
    }

    #[test]
    fn exact_threshold_values_do_not_fire() {
        let sample = GestureSample {
            offset_y: -50.0,
            velocity_y: -500.0,
        };
        assert_eq!(navigator().on_drag_end(sample), None);
    }

    #[test]
    fn tracker_scales_cells_to_points() {
        let mut tracker = DragTracker::new(18.0);
        tracker.begin(20);
        let sample = tracker.finish(16).expect("sample");
        assert!((sample.offset_y - -72.0).abs() < f32::EPSILON);
        assert!(sample.velocity_y < 0.0);
        assert!(!tracker.is_dragging());
    }

    #[test]
    fn tracker_finish_without_begin_is_none() {
        let mut tracker = DragTracker::new(18.0);
        assert!(tracker.finish(4).is_none());
        tracker.begin(4);
        tracker.cancel();
        assert!(tracker.finish(4).is_none());
    }
}
