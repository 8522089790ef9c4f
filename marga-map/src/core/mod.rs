//! Core geometric types shared by the grid, the pathfinder and the facility layout.

mod point;
mod rect;

pub use point::{Cell, WorldPoint};
pub use rect::Rect;
