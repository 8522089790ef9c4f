//! Wire messages of the waypoint protocol.
//!
//! | `type`                | Payload                              | Event                      |
//! |-----------------------|--------------------------------------|----------------------------|
//! | `waypoint_assignment` | `waypoints: [[x, y], ...]`           | [`IngestEvent::Waypoints`] |
//! | `real_time_position`  | `x`, `y`, optional `tag_id`          | [`IngestEvent::Position`]  |
//! | anything else         | ignored                              | none                       |
//!
//! Every object that parses as JSON is answered with an [`Acknowledgment`].

use marga_map::WorldPoint;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::error::{NavError, Result};

pub const WAYPOINT_ASSIGNMENT: &str = "waypoint_assignment";
pub const REAL_TIME_POSITION: &str = "real_time_position";

/// Decoded protocol message handed to the navigation side
#[derive(Clone, Debug, PartialEq)]
pub enum IngestEvent {
    /// New destination list, in driving order
    Waypoints(Vec<WorldPoint>),
    /// Live vehicle position
    Position {
        point: WorldPoint,
        tag_id: Option<String>,
    },
}

#[derive(Deserialize)]
struct WaypointAssignment {
    waypoints: Vec<[f32; 2]>,
}

#[derive(Deserialize)]
struct RealTimePosition {
    #[serde(deserialize_with = "lenient_coordinate")]
    x: f32,
    #[serde(deserialize_with = "lenient_coordinate")]
    y: f32,
    #[serde(default)]
    tag_id: Option<Value>,
}

/// Position senders may quote their coordinates
#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f32),
    Text(String),
}

/// A JSON number, or a string holding one (surrounding whitespace allowed)
fn lenient_coordinate<'de, D>(deserializer: D) -> std::result::Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    match Coordinate::deserialize(deserializer)? {
        Coordinate::Number(v) => Ok(v),
        Coordinate::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid coordinate {:?}", text))),
    }
}

/// Turn a parsed JSON object into an event.
///
/// `Ok(None)` for a missing or unknown `type`. A known type with a payload of
/// the wrong shape is a protocol error.
pub fn classify(value: Value) -> Result<Option<IngestEvent>> {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

    match kind {
        WAYPOINT_ASSIGNMENT => {
            let msg: WaypointAssignment = serde_json::from_value(value)
                .map_err(|e| NavError::Protocol(format!("{}: {}", WAYPOINT_ASSIGNMENT, e)))?;
            Ok(Some(IngestEvent::Waypoints(
                msg.waypoints.into_iter().map(WorldPoint::from).collect(),
            )))
        }
        REAL_TIME_POSITION => {
            let msg: RealTimePosition = serde_json::from_value(value)
                .map_err(|e| NavError::Protocol(format!("{}: {}", REAL_TIME_POSITION, e)))?;
            let tag_id = msg.tag_id.and_then(|tag| match tag {
                Value::Null => None,
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            });
            Ok(Some(IngestEvent::Position {
                point: WorldPoint::new(msg.x, msg.y),
                tag_id,
            }))
        }
        _ => Ok(None),
    }
}

/// Reply written after every parsed object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub status: String,
    /// Local time, ISO-8601 with microseconds
    pub timestamp: String,
}

impl Acknowledgment {
    pub fn received() -> Self {
        Self {
            status: "received".to_string(),
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
