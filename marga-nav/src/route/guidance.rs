//! Choosing what the driver display shows from an instruction list.

use serde::Serialize;

use super::maneuver::{Instruction, Maneuver};

/// A turn this close (metres) counts as taken
const TURN_COMPLETE_M: f32 = 1.0;
/// Maneuvers farther away than this (metres) are shown as "straight" first
const ANNOUNCE_M: f32 = 5.0;

/// Current maneuver with its distance, plus a hint of what follows
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Guidance {
    pub current: Maneuver,
    pub distance_m: f32,
    pub next: Option<Maneuver>,
}

impl Guidance {
    /// Pick the displayed guidance from the first instructions.
    ///
    /// A turn within 1 m is treated as done and the following instruction is
    /// promoted. Anything more than 5 m away is shown as "straight" with the
    /// real maneuver as the hint. Only the parking arrival is announced early;
    /// exit-complete is shown as it comes. `None` when there is nothing to
    /// show.
    pub fn select(instructions: &[Instruction]) -> Option<Self> {
        let (first, rest) = instructions.split_first()?;

        if first.maneuver.is_turn()
            && first.distance_m <= TURN_COMPLETE_M
            && let Some(second) = rest.first()
        {
            if second.maneuver == Maneuver::Arrived && second.distance_m > ANNOUNCE_M {
                return Some(Self {
                    current: Maneuver::Straight,
                    distance_m: second.distance_m,
                    next: Some(second.maneuver),
                });
            }
            return Some(Self {
                current: second.maneuver,
                distance_m: second.distance_m,
                next: rest.get(1).map(|i| i.maneuver),
            });
        }

        if first.distance_m > ANNOUNCE_M {
            return Some(Self {
                current: Maneuver::Straight,
                distance_m: first.distance_m,
                next: Some(first.maneuver),
            });
        }

        let next = rest.first().map(|second| {
            if second.maneuver == Maneuver::Arrived && second.distance_m <= ANNOUNCE_M {
                second.maneuver
            } else {
                Maneuver::Straight
            }
        });

        Some(Self {
            current: first.maneuver,
            distance_m: first.distance_m,
            next,
        })
    }
}
