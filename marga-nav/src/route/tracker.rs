//! Route progress tracking along a polyline.
//!
//! Two independent notions of "where the vehicle is" are kept:
//!
//! - **Current segment**: advanced monotonically by [`RouteTracker::advance`]
//!   and used to build instructions from the remaining points
//! - **Progress**: closest point on the whole polyline, recomputed from
//!   scratch on every call
//!
//! They can disagree near sharp corners; neither is derived from the other.

use marga_map::WorldPoint;
use serde::Deserialize;
use tracing::debug;

use super::maneuver::{Instruction, RouteDirection, generate_instructions};
use super::speed::estimate_speed;

/// Route tracking parameters
#[derive(Clone, Debug, Deserialize)]
pub struct TrackerConfig {
    /// Distance to a segment end (world units) that counts as reaching it
    /// (default: 50)
    #[serde(default = "default_advance_threshold")]
    pub advance_threshold: f32,

    /// World units per metre, for instruction distances (default: 50)
    #[serde(default = "default_units_per_meter")]
    pub units_per_meter: f32,

    /// Minimum heading change in degrees reported as a turn (default: 45)
    #[serde(default = "default_turn_threshold")]
    pub turn_threshold_deg: f32,
}

fn default_advance_threshold() -> f32 {
    50.0
}
fn default_units_per_meter() -> f32 {
    50.0
}
fn default_turn_threshold() -> f32 {
    45.0
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            advance_threshold: default_advance_threshold(),
            units_per_meter: default_units_per_meter(),
            turn_threshold_deg: default_turn_threshold(),
        }
    }
}

/// Active route and the vehicle's place on it.
///
/// Invariant: while a route is active, `segment <= points.len() - 2`.
#[derive(Clone, Debug)]
pub struct RouteTracker {
    config: TrackerConfig,
    points: Vec<WorldPoint>,
    direction: RouteDirection,
    segment: usize,
    arrived: bool,
}

impl RouteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
            direction: RouteDirection::Outbound,
            segment: 0,
            arrived: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Replace the active route; tracking restarts at the first segment.
    pub fn set_route(&mut self, points: Vec<WorldPoint>, direction: RouteDirection) {
        debug!(
            points = points.len(),
            ?direction,
            "route replaced"
        );
        self.points = points;
        self.direction = direction;
        self.segment = 0;
        self.arrived = false;
    }

    /// Drop the active route.
    pub fn clear(&mut self) {
        self.set_route(Vec::new(), RouteDirection::Outbound);
    }

    /// A route needs at least two points to be tracked
    pub fn has_route(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn points(&self) -> &[WorldPoint] {
        &self.points
    }

    pub fn direction(&self) -> RouteDirection {
        self.direction
    }

    /// Index of the segment being driven, if a route is active
    pub fn current_segment(&self) -> Option<usize> {
        self.has_route().then_some(self.segment)
    }

    pub fn is_arrived(&self) -> bool {
        self.arrived
    }

    /// Total polyline length in world units
    pub fn total_length(&self) -> f32 {
        self.points.windows(2).map(|s| s[0].distance(&s[1])).sum()
    }

    /// Move the current segment forward past every segment end the vehicle
    /// has reached or overshot.
    ///
    /// A segment end counts as reached when the vehicle is closer than
    /// `advance_threshold` to it, or when its projection onto the segment lies
    /// beyond the end. Reaching the end of the last segment marks arrival;
    /// the index itself never moves past the last segment.
    pub fn advance(&mut self, position: WorldPoint) -> Option<usize> {
        if !self.has_route() || self.arrived {
            return self.current_segment();
        }

        let last = self.points.len() - 2;
        for _ in 0..=last {
            if !self.segment_end_reached(self.segment, position) {
                break;
            }
            if self.segment < last {
                self.segment += 1;
            } else {
                self.arrived = true;
                debug!(direction = ?self.direction, "route end reached");
                break;
            }
        }

        Some(self.segment)
    }

    fn segment_end_reached(&self, index: usize, position: WorldPoint) -> bool {
        let start = self.points[index];
        let end = self.points[index + 1];

        if position.distance(&end) < self.config.advance_threshold {
            return true;
        }

        let seg = end - start;
        let len_sq = seg.dot(&seg);
        if len_sq <= 0.0 {
            return false;
        }
        (position - start).dot(&seg) / len_sq > 1.0
    }

    /// Percentage of the route length covered, from the closest point on the
    /// whole polyline.
    ///
    /// `None` without an active route, 100 after arrival, 0 for a route of
    /// zero length.
    pub fn progress(&self, position: WorldPoint) -> Option<f32> {
        if !self.has_route() {
            return None;
        }
        if self.arrived {
            return Some(100.0);
        }

        let total = self.total_length();
        if total <= 0.0 {
            return Some(0.0);
        }

        let mut best_dist = f32::INFINITY;
        let mut traveled = 0.0;
        let mut along = 0.0;

        for seg in self.points.windows(2) {
            let v = seg[1] - seg[0];
            let len_sq = v.dot(&v);
            let len = len_sq.sqrt();
            if len_sq > 0.0 {
                let t = ((position - seg[0]).dot(&v) / len_sq).clamp(0.0, 1.0);
                let dist = position.distance(&seg[0].lerp(&seg[1], t));
                if dist < best_dist {
                    best_dist = dist;
                    traveled = along + len * t;
                }
            }
            along += len;
        }

        Some((traveled / total * 100.0).clamp(0.0, 100.0))
    }

    /// Upcoming instructions from `position` through the remaining points.
    ///
    /// After arrival this is a single arrival entry at distance 0.
    pub fn instructions(&self, position: WorldPoint) -> Option<Vec<Instruction>> {
        if !self.has_route() {
            return None;
        }
        if self.arrived {
            return Some(vec![Instruction::new(self.direction.arrival(), 0.0)]);
        }

        let mut path = Vec::with_capacity(self.points.len() - self.segment);
        path.push(position);
        path.extend_from_slice(&self.points[self.segment + 1..]);

        Some(generate_instructions(
            &path,
            self.direction,
            self.config.units_per_meter,
            self.config.turn_threshold_deg,
        ))
    }

    /// Display speed for the given instructions; 0 after arrival.
    pub fn estimate_speed(&self, instructions: &[Instruction], progress: f32) -> u32 {
        if self.arrived {
            return 0;
        }
        estimate_speed(instructions, progress, self.direction)
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Maneuver;
    use approx::assert_relative_eq;

    fn p(x: f32, y: f32) -> WorldPoint {
        WorldPoint::new(x, y)
    }

    fn tracker_with(points: &[[f32; 2]]) -> RouteTracker {
        let mut tracker = RouteTracker::default();
        tracker.set_route(
            points.iter().map(|&p| p.into()).collect(),
            RouteDirection::Outbound,
        );
        tracker
    }

    #[test]
    fn test_no_route_is_reported_not_raised() {
        let mut tracker = RouteTracker::default();
        assert_eq!(tracker.advance(p(1.0, 1.0)), None);
        assert!(tracker.progress(p(1.0, 1.0)).is_none());
        assert!(tracker.instructions(p(1.0, 1.0)).is_none());

        tracker.set_route(vec![p(5.0, 5.0)], RouteDirection::Outbound);
        assert!(!tracker.has_route());
        assert!(tracker.instructions(p(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_corner_instructions_at_corner() {
        // Metres equal world units here
        let mut tracker = RouteTracker::new(TrackerConfig {
            units_per_meter: 1.0,
            ..TrackerConfig::default()
        });
        tracker.set_route(
            vec![p(0.0, 0.0), p(100.0, 0.0), p(100.0, 100.0)],
            RouteDirection::Outbound,
        );

        let instructions = tracker.instructions(p(100.0, 0.0)).unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].maneuver, Maneuver::TurnLeft);
        assert_relative_eq!(instructions[0].distance_m, 0.0);
        assert_eq!(instructions[1].maneuver, Maneuver::Arrived);
        assert_relative_eq!(instructions[1].distance_m, 100.0);
    }

    #[test]
    fn test_advance_by_proximity() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [500.0, 0.0], [500.0, 500.0]]);
        assert_eq!(tracker.advance(p(200.0, 0.0)), Some(0));
        assert_eq!(tracker.advance(p(460.0, 10.0)), Some(1));
        assert!(!tracker.is_arrived());
    }

    #[test]
    fn test_advance_by_overshoot() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [500.0, 0.0], [500.0, 500.0]]);
        // Far from the corner, but projected past it
        assert_eq!(tracker.advance(p(600.0, 200.0)), Some(1));
    }

    #[test]
    fn test_advance_skips_several_segments() {
        let mut tracker = tracker_with(&[
            [0.0, 0.0],
            [100.0, 0.0],
            [200.0, 0.0],
            [300.0, 0.0],
            [300.0, 400.0],
        ]);
        assert_eq!(tracker.advance(p(290.0, 0.0)), Some(3));
    }

    #[test]
    fn test_advance_idempotent_at_end() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [100.0, 0.0], [200.0, 0.0]]);
        let end = p(200.0, 0.0);
        assert_eq!(tracker.advance(end), Some(1));
        assert!(tracker.is_arrived());
        for _ in 0..5 {
            assert_eq!(tracker.advance(end), Some(1));
        }

        assert_relative_eq!(tracker.progress(p(0.0, 0.0)).unwrap(), 100.0);
        let instructions = tracker.instructions(end).unwrap();
        assert_eq!(instructions, vec![Instruction::new(Maneuver::Arrived, 0.0)]);
        assert_eq!(tracker.estimate_speed(&instructions, 100.0), 0);
    }

    #[test]
    fn test_progress_closest_projection() {
        let tracker = tracker_with(&[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0]]);
        assert_relative_eq!(tracker.progress(p(0.0, 0.0)).unwrap(), 0.0);
        assert_relative_eq!(tracker.progress(p(50.0, 10.0)).unwrap(), 25.0);
        assert_relative_eq!(tracker.progress(p(110.0, 50.0)).unwrap(), 75.0);
        assert_relative_eq!(tracker.progress(p(100.0, 150.0)).unwrap(), 100.0);
        // Behind the start clamps to zero
        assert_relative_eq!(tracker.progress(p(-40.0, 0.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_progress_ignores_segment_index() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [100.0, 0.0], [100.0, 100.0]]);
        tracker.advance(p(90.0, 0.0));
        assert_eq!(tracker.current_segment(), Some(1));
        assert_relative_eq!(tracker.progress(p(90.0, 0.0)).unwrap(), 45.0);
    }

    #[test]
    fn test_zero_length_route() {
        let tracker = tracker_with(&[[10.0, 10.0], [10.0, 10.0]]);
        assert_relative_eq!(tracker.progress(p(0.0, 0.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_instructions_follow_current_segment() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [500.0, 0.0], [500.0, 500.0], [0.0, 500.0]]);
        let before = tracker.instructions(p(0.0, 0.0)).unwrap();
        assert_eq!(before.len(), 3);

        tracker.advance(p(500.0, 10.0));
        let after = tracker.instructions(p(500.0, 10.0)).unwrap();
        assert_eq!(
            after.iter().map(|i| i.maneuver).collect::<Vec<_>>(),
            vec![Maneuver::TurnLeft, Maneuver::Arrived]
        );
        assert_relative_eq!(after[0].distance_m, 9.8);
        assert_relative_eq!(after[1].distance_m, 10.0);
    }

    #[test]
    fn test_set_route_resets_tracking() {
        let mut tracker = tracker_with(&[[0.0, 0.0], [100.0, 0.0]]);
        tracker.advance(p(100.0, 0.0));
        assert!(tracker.is_arrived());

        tracker.set_route(vec![p(0.0, 0.0), p(0.0, 300.0)], RouteDirection::Inbound);
        assert!(!tracker.is_arrived());
        assert_eq!(tracker.current_segment(), Some(0));
        assert_eq!(tracker.direction(), RouteDirection::Inbound);
        let instructions = tracker.instructions(p(0.0, 0.0)).unwrap();
        assert_eq!(instructions[0].maneuver, Maneuver::ExitComplete);

        tracker.clear();
        assert!(!tracker.has_route());
    }
}
