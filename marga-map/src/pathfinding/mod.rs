//! Path planning on the occupancy grid.
//!
//! - **A* Search**: shortest 4-connected paths with deterministic tie-breaking
//! - **Relocation**: ring search for the nearest free cell around a blocked endpoint
//! - **Simplification**: collapse cell paths to turn points (and expand them back)
//!
//! ```rust,ignore
//! use marga_map::pathfinding::GridPathfinder;
//!
//! let planner = GridPathfinder::with_defaults(&grid);
//! match planner.plan(start, goal) {
//!     Ok(path) => println!("{} turn points, {:.0} units", path.waypoints.len(), path.length),
//!     Err(e) => println!("planning failed: {}", e),
//! }
//! ```

pub mod astar;
pub mod simplify;

pub use astar::{GridPathfinder, PathError, PathfinderConfig, PlannedPath};
pub use simplify::{expand, simplify};
