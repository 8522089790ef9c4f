//! Waypoint ingestion over TCP.
//!
//! - [`framing`]: JSON object recovery from an undelimited byte stream
//! - [`messages`]: protocol messages, classification, acknowledgments
//! - [`server`]: single-client accept loop feeding an event channel

pub mod framing;
pub mod messages;
pub mod server;

pub use framing::{FrameDecoder, FrameError};
pub use messages::{Acknowledgment, IngestEvent, classify};
pub use server::{ConnectionState, IngestStats, IngestorHandle, WaypointIngestor};
