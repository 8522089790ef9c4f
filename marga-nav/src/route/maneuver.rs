//! Turn-by-turn instruction generation.

use marga_map::WorldPoint;
use serde::Serialize;
use std::fmt;

/// Closed set of maneuvers shown to the driver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Maneuver {
    Straight,
    TurnLeft,
    TurnRight,
    Arrived,
    ExitComplete,
    ExitTurnLeft,
    ExitTurnRight,
}

impl Maneuver {
    /// Wire/display label
    pub fn label(self) -> &'static str {
        match self {
            Maneuver::Straight => "straight",
            Maneuver::TurnLeft => "turn-left",
            Maneuver::TurnRight => "turn-right",
            Maneuver::Arrived => "arrived",
            Maneuver::ExitComplete => "exit-complete",
            Maneuver::ExitTurnLeft => "exit-turn-left",
            Maneuver::ExitTurnRight => "exit-turn-right",
        }
    }

    pub fn is_turn(self) -> bool {
        matches!(
            self,
            Maneuver::TurnLeft
                | Maneuver::TurnRight
                | Maneuver::ExitTurnLeft
                | Maneuver::ExitTurnRight
        )
    }

    /// Terminal maneuver of either route direction
    pub fn is_arrival(self) -> bool {
        matches!(self, Maneuver::Arrived | Maneuver::ExitComplete)
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which way the active route runs through the facility
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDirection {
    /// Entrance towards a parking bay
    #[default]
    Outbound,
    /// Parking bay back to the entrance
    Inbound,
}

impl RouteDirection {
    pub fn turn_left(self) -> Maneuver {
        match self {
            RouteDirection::Outbound => Maneuver::TurnLeft,
            RouteDirection::Inbound => Maneuver::ExitTurnLeft,
        }
    }

    pub fn turn_right(self) -> Maneuver {
        match self {
            RouteDirection::Outbound => Maneuver::TurnRight,
            RouteDirection::Inbound => Maneuver::ExitTurnRight,
        }
    }

    pub fn arrival(self) -> Maneuver {
        match self {
            RouteDirection::Outbound => Maneuver::Arrived,
            RouteDirection::Inbound => Maneuver::ExitComplete,
        }
    }
}

/// A maneuver and the distance (metres) left until it is due
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Instruction {
    pub maneuver: Maneuver,
    pub distance_m: f32,
}

impl Instruction {
    pub fn new(maneuver: Maneuver, distance_m: f32) -> Self {
        Self {
            maneuver,
            distance_m,
        }
    }
}

/// Signed heading change at `b` in degrees, folded to [-180, 180).
///
/// Counter-clockwise (left, with y up) is positive. A zero-length leg has
/// heading 0.
pub fn turn_angle(a: WorldPoint, b: WorldPoint, c: WorldPoint) -> f32 {
    let heading_in = a.angle_to(&b).to_degrees();
    let heading_out = b.angle_to(&c).to_degrees();
    (heading_out - heading_in + 180.0).rem_euclid(360.0) - 180.0
}

/// Instructions along a polyline.
///
/// Every interior vertex turning more than `turn_threshold_deg` emits a turn
/// carrying the distance accumulated since the previous turn; the last entry
/// is always the arrival for `direction`. Returns an empty list for fewer
/// than two points.
pub fn generate_instructions(
    path: &[WorldPoint],
    direction: RouteDirection,
    units_per_meter: f32,
    turn_threshold_deg: f32,
) -> Vec<Instruction> {
    if path.len() < 2 {
        return Vec::new();
    }

    let mut instructions = Vec::new();
    let mut distance_m = 0.0;

    for (i, leg) in path.windows(2).enumerate() {
        distance_m += leg[0].distance(&leg[1]) / units_per_meter;

        let Some(&after) = path.get(i + 2) else {
            continue;
        };
        let angle = turn_angle(leg[0], leg[1], after);
        let maneuver = if angle > turn_threshold_deg {
            Some(direction.turn_left())
        } else if angle < -turn_threshold_deg {
            Some(direction.turn_right())
        } else {
            None
        };

        if let Some(maneuver) = maneuver {
            instructions.push(Instruction::new(maneuver, distance_m));
            distance_m = 0.0;
        }
    }

    instructions.push(Instruction::new(direction.arrival(), distance_m));
    instructions
}
