//! Route tracking and driver guidance.
//!
//! - [`RouteTracker`]: active route, current segment, progress
//! - [`generate_instructions`]: turn-by-turn list from a polyline
//! - [`estimate_speed`]: display speed heuristic
//! - [`Guidance`]: what the driver display shows right now

mod guidance;
mod maneuver;
mod speed;
mod tracker;

pub use guidance::Guidance;
pub use maneuver::{Instruction, Maneuver, RouteDirection, generate_instructions, turn_angle};
pub use speed::{MAX_SPEED_KMH, estimate_speed};
pub use tracker::{RouteTracker, TrackerConfig};
