//! Axis-aligned rectangles used for facility geometry.

use serde::{Deserialize, Serialize};

use super::WorldPoint;

/// Axis-aligned rectangle anchored at its minimum corner
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    /// Grow all four sides by `margin`
    pub fn inflate(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Point containment, edges inclusive
    pub fn contains(&self, p: WorldPoint) -> bool {
        p.x >= self.x && p.x <= self.max_x() && p.y >= self.y && p.y <= self.max_y()
    }

    pub fn center(&self) -> WorldPoint {
        WorldPoint::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// True when the rectangle covers no area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_and_contains() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0).inflate(5.0);
        assert_eq!(r, Rect::new(5.0, 15.0, 40.0, 50.0));
        assert!(r.contains(WorldPoint::new(5.0, 15.0)));
        assert!(r.contains(WorldPoint::new(45.0, 65.0)));
        assert!(!r.contains(WorldPoint::new(45.1, 30.0)));
    }

    #[test]
    fn test_empty() {
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
