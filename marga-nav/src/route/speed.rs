//! Presentational speed estimate (km/h) for the HUD.
//!
//! Not a control signal: nothing here looks at vehicle dynamics.

use super::maneuver::{Instruction, Maneuver, RouteDirection};

/// Upper bound of the displayed speed
pub const MAX_SPEED_KMH: u32 = 30;

/// Speed suggestion from the distance to the next instruction, its kind,
/// route progress (percent) and direction.
///
/// Near instructions slow the estimate down, turns and arrival cap it at 15,
/// finishing an exit caps it at 20. The first and last fifth of the route and
/// exit routes are scaled down further. Result is truncated to whole km/h.
pub fn estimate_speed(
    instructions: &[Instruction],
    progress: f32,
    direction: RouteDirection,
) -> u32 {
    let Some(first) = instructions.first() else {
        return 0;
    };

    let d = first.distance_m;
    let mut speed = if d <= 5.0 {
        5.0 + d / 5.0 * 10.0
    } else if d <= 20.0 {
        15.0 + d / 20.0 * 10.0
    } else {
        20.0 + ((d - 20.0) / 50.0 * 10.0).min(10.0)
    };

    speed = match first.maneuver {
        m if m.is_turn() => speed.min(15.0),
        Maneuver::Arrived => speed.min(15.0),
        Maneuver::ExitComplete => speed.min(20.0),
        _ => speed,
    };

    if progress < 20.0 {
        speed *= 0.8;
    } else if progress > 80.0 {
        speed *= 0.7;
    }

    if direction == RouteDirection::Inbound {
        speed *= 0.75;
    }

    speed.trunc().clamp(0.0, MAX_SPEED_KMH as f32) as u32
}
