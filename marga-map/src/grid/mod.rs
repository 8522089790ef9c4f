//! Occupancy grid built from static facility geometry.

mod occupancy;

pub use occupancy::{GridConfig, OccupancyGrid};
