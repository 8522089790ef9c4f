//! MargaNav - turn-by-turn guidance for a parking structure.
//!
//! A controller pushes waypoint lists and live vehicle positions over TCP as
//! back-to-back JSON objects. MargaNav turns each waypoint list into a route
//! through the facility (see [`marga_map`]), tracks the vehicle along it and
//! derives the driver display: upcoming maneuvers, distances, progress and a
//! suggested speed.
//!
//! ```text
//! TCP client --> ingest thread --(IngestEvent)--> navigation thread --> Navigator
//!                     |                                                    |
//!                  ack per object                             NavigationUpdate --> display
//! ```
//!
//! ## Modules
//!
//! - [`ingest`]: framing, message decoding and the TCP server
//! - [`route`]: segment tracking, instructions, guidance and speed
//! - [`navigator`]: the facade tying layout, routing and tracking together
//! - [`threads`]: worker thread wiring
//! - [`config`]: TOML configuration

pub mod config;
pub mod error;
pub mod ingest;
pub mod navigator;
pub mod route;
pub mod threads;

pub use config::{MargaConfig, RoutingConfig, RoutingMode, ServerConfig};
pub use error::{NavError, Result};
pub use ingest::{Acknowledgment, IngestEvent, IngestorHandle, WaypointIngestor};
pub use navigator::{NavigationSnapshot, NavigationUpdate, Navigator};
pub use route::{Guidance, Instruction, Maneuver, RouteDirection, RouteTracker, TrackerConfig};
pub use threads::{ThreadHandles, spawn_threads};
