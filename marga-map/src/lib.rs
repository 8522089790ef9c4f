//! # Marga-Map: Parking Structure Geometry and Path Planning
//!
//! Static map side of the navigation engine: facility layout, occupancy
//! grid and grid pathfinding. No I/O and no threads; everything here is a
//! pure function of its inputs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use marga_map::{FacilityLayout, GridConfig, GridPathfinder};
//!
//! let layout = FacilityLayout::standard();
//! let grid = layout.occupancy_grid(&GridConfig::default()).unwrap();
//! let planner = GridPathfinder::with_defaults(&grid);
//!
//! let bay = layout.bay(9).unwrap();
//! let path = planner.plan(layout.entrance, bay.anchor).unwrap();
//! println!("{} turn points, {:.0} units", path.waypoints.len(), path.length);
//! ```
//!
//! ## Coordinate Frame
//!
//! World units with the origin at the bottom-left corner of the facility,
//! X to the right and Y up. Cell `(i, j)` covers
//! `[i * cell_size, (i + 1) * cell_size) x [j * cell_size, (j + 1) * cell_size)`.
//!
//! ## Modules
//!
//! - [`core`]: cells, world points, rectangles
//! - [`grid`]: occupancy grid rasterized from rectangles
//! - [`pathfinding`]: A*, free-cell relocation, path simplification
//! - [`facility`]: zones, parking bays, exit routes

pub mod core;
pub mod error;
pub mod facility;
pub mod grid;
pub mod pathfinding;

pub use crate::core::{Cell, Rect, WorldPoint};
pub use error::{MapError, Result};
pub use facility::{BayKind, FacilityLayout, ParkingBay, Zone, ZoneKind};
pub use grid::{GridConfig, OccupancyGrid};
pub use pathfinding::{GridPathfinder, PathError, PathfinderConfig, PlannedPath};
