//! Point and coordinate types for the facility grid.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Grid cell coordinates (integer column/row indices)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Column index
    pub x: i32,
    /// Row index
    pub y: i32,
}

impl Cell {
    /// Create a new cell coordinate
    #[inline]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell
    #[inline]
    pub fn manhattan_distance(&self, other: &Cell) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Chebyshev distance (max of x and y distance)
    #[inline]
    pub fn chebyshev_distance(&self, other: &Cell) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// The 4 cardinal neighbors in search order (E, W, N, S)
    #[inline]
    pub fn neighbors_4(&self) -> [Cell; 4] {
        [
            Cell::new(self.x + 1, self.y),
            Cell::new(self.x - 1, self.y),
            Cell::new(self.x, self.y + 1),
            Cell::new(self.x, self.y - 1),
        ]
    }

    /// Unit step direction towards another cell (each component in -1..=1)
    #[inline]
    pub fn step_towards(&self, other: &Cell) -> Cell {
        Cell::new((other.x - self.x).signum(), (other.y - self.y).signum())
    }
}

impl Add for Cell {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Cell::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Cell {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Cell::new(self.x - other.x, self.y - other.y)
    }
}

/// World coordinates in facility units (y axis up)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    /// Create a new world point
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero point (origin)
    pub const ZERO: WorldPoint = WorldPoint { x: 0.0, y: 0.0 };

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &WorldPoint) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance (avoids sqrt)
    #[inline]
    pub fn distance_squared(&self, other: &WorldPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Heading from this point to another (radians, CCW from +X).
    ///
    /// Coincident points yield 0.
    #[inline]
    pub fn angle_to(&self, other: &WorldPoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dy.atan2(dx)
    }

    /// Length of this point as a vector from origin
    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Dot product with another point (as vectors)
    #[inline]
    pub fn dot(&self, other: &WorldPoint) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Linear interpolation towards `other` (t = 0 gives self, t = 1 gives other)
    #[inline]
    pub fn lerp(&self, other: &WorldPoint, t: f32) -> WorldPoint {
        *self + (*other - *self) * t
    }

    /// True when both components are finite
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f32; 2]> for WorldPoint {
    fn from(p: [f32; 2]) -> Self {
        WorldPoint::new(p[0], p[1])
    }
}

impl Add for WorldPoint {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        WorldPoint::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for WorldPoint {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        WorldPoint::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for WorldPoint {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        WorldPoint::new(self.x * scalar, self.y * scalar)
    }
}
