//! Static facility description: zones, parking bays and exit routing.
//!
//! One `FacilityLayout` feeds both the occupancy grid (through
//! [`FacilityLayout::blocking_rects`]) and exit-route generation, so the two
//! can never disagree about where a bay is.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::{Rect, WorldPoint};
use crate::error::{MapError, Result};
use crate::grid::{GridConfig, OccupancyGrid};

/// Semantic tag of a non-bay zone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// Physical obstacle
    Obstacle,
    /// No-entry area
    Restricted,
    /// Vehicle entry/exit area around the entrance
    EntryExit,
    /// Building entrance (a destination, not drivable)
    Destination,
}

/// A tagged rectangle of the facility
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    #[serde(default)]
    pub label: String,
    pub rect: Rect,
}

/// Parking bay category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BayKind {
    Accessible,
    General,
    Electric,
}

/// A numbered parking bay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParkingBay {
    pub number: u8,
    pub kind: BayKind,
    pub rect: Rect,
    /// Drivable pin-point in front of the bay; the bay's waypoint
    pub anchor: WorldPoint,
    /// Points driven through after leaving the anchor, before the exit junction
    #[serde(default)]
    pub exit_via: Vec<WorldPoint>,
}

/// Complete facility geometry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityLayout {
    /// Max per-axis distance for matching a waypoint to a bay anchor
    #[serde(default = "default_anchor_tolerance")]
    pub anchor_tolerance: f32,
    /// World size (x = width, y = height)
    pub extent: WorldPoint,
    /// Where every outbound route starts and every exit route ends
    pub entrance: WorldPoint,
    /// Mandatory junction every exit route passes before the entrance
    pub exit_junction: WorldPoint,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub bays: Vec<ParkingBay>,
}

fn default_anchor_tolerance() -> f32 {
    50.0
}

impl FacilityLayout {
    /// The built-in parking structure: a 2000x2000 floor with eleven bays
    /// along the top, right and bottom aisles.
    pub fn standard() -> Self {
        let zone = |kind, x, y, w, h, label: &str| Zone {
            kind,
            label: label.to_string(),
            rect: Rect::new(x, y, w, h),
        };
        let bay = |number, kind, x, y, w, h, anchor: [f32; 2], via: &[[f32; 2]]| ParkingBay {
            number,
            kind,
            rect: Rect::new(x, y, w, h),
            anchor: anchor.into(),
            exit_via: via.iter().map(|&p| p.into()).collect(),
        };

        // Bays on the top aisle leave through bay 1's anchor
        let top_aisle: &[[f32; 2]] = &[[200.0, 1475.0]];

        Self {
            anchor_tolerance: default_anchor_tolerance(),
            extent: WorldPoint::new(2000.0, 2000.0),
            entrance: WorldPoint::new(200.0, 200.0),
            exit_junction: WorldPoint::new(200.0, 925.0),
            zones: vec![
                zone(ZoneKind::Obstacle, 550.0, 1050.0, 800.0, 300.0, "obstacle"),
                zone(ZoneKind::Restricted, 400.0, 0.0, 1600.0, 400.0, "no entry"),
                zone(ZoneKind::Destination, 1600.0, 400.0, 400.0, 400.0, "cultural facility entrance"),
                zone(ZoneKind::Destination, 1600.0, 1600.0, 400.0, 400.0, "cinema entrance"),
                zone(ZoneKind::Destination, -400.0, 1600.0, 400.0, 400.0, "department store entrance"),
                zone(ZoneKind::EntryExit, 0.0, 0.0, 400.0, 400.0, "entry / exit"),
            ],
            bays: vec![
                bay(1, BayKind::Accessible, 0.0, 1600.0, 400.0, 400.0, [200.0, 1475.0], &[]),
                bay(2, BayKind::General, 400.0, 1600.0, 300.0, 400.0, [550.0, 1475.0], top_aisle),
                bay(3, BayKind::General, 700.0, 1600.0, 300.0, 400.0, [850.0, 1475.0], top_aisle),
                bay(4, BayKind::Electric, 1000.0, 1600.0, 300.0, 400.0, [1150.0, 1475.0], top_aisle),
                bay(5, BayKind::Electric, 1300.0, 1600.0, 300.0, 400.0, [1450.0, 1475.0], top_aisle),
                bay(
                    6,
                    BayKind::Accessible,
                    1600.0,
                    1200.0,
                    400.0,
                    400.0,
                    [1475.0, 1400.0],
                    &[[1475.0, 1475.0], [200.0, 1475.0]],
                ),
                bay(
                    7,
                    BayKind::Accessible,
                    1600.0,
                    800.0,
                    400.0,
                    400.0,
                    [1475.0, 1000.0],
                    &[[1475.0, 925.0]],
                ),
                bay(8, BayKind::General, 1300.0, 400.0, 300.0, 400.0, [1475.0, 925.0], &[]),
                bay(9, BayKind::General, 1000.0, 400.0, 300.0, 400.0, [1150.0, 925.0], &[]),
                bay(10, BayKind::Electric, 700.0, 400.0, 300.0, 400.0, [850.0, 925.0], &[]),
                bay(11, BayKind::Electric, 400.0, 400.0, 300.0, 400.0, [550.0, 925.0], &[]),
            ],
        }
    }

    /// Reject layouts the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.extent.is_finite() || self.extent.x <= 0.0 || self.extent.y <= 0.0 {
            return Err(MapError::InvalidLayout(format!(
                "extent must be positive, got ({}, {})",
                self.extent.x, self.extent.y
            )));
        }
        if !self.entrance.is_finite() || !self.exit_junction.is_finite() {
            return Err(MapError::InvalidLayout(
                "entrance and exit junction must be finite".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for bay in &self.bays {
            if !seen.insert(bay.number) {
                return Err(MapError::InvalidLayout(format!(
                    "duplicate bay number {}",
                    bay.number
                )));
            }
            if bay.rect.is_empty() {
                return Err(MapError::InvalidLayout(format!(
                    "bay {} has an empty rectangle",
                    bay.number
                )));
            }
        }
        Ok(())
    }

    /// Every rectangle that blocks driving: all zones plus all bays.
    pub fn blocking_rects(&self) -> Vec<Rect> {
        self.zones
            .iter()
            .map(|z| z.rect)
            .chain(self.bays.iter().map(|b| b.rect))
            .collect()
    }

    /// Rasterize the layout into an occupancy grid.
    pub fn occupancy_grid(&self, config: &GridConfig) -> Result<OccupancyGrid> {
        self.validate()?;
        OccupancyGrid::build(self.extent, &self.blocking_rects(), config)
    }

    /// Bay by number
    pub fn bay(&self, number: u8) -> Option<&ParkingBay> {
        self.bays.iter().find(|b| b.number == number)
    }

    /// Bay whose rectangle contains the point (edges inclusive, first match)
    pub fn bay_at(&self, p: WorldPoint) -> Option<&ParkingBay> {
        self.bays.iter().find(|b| b.rect.contains(p))
    }

    /// Bay whose anchor is within `anchor_tolerance` of the waypoint on both axes
    pub fn bay_for_waypoint(&self, p: WorldPoint) -> Option<&ParkingBay> {
        let tol = self.anchor_tolerance;
        self.bays
            .iter()
            .find(|b| (p.x - b.anchor.x).abs() <= tol && (p.y - b.anchor.y).abs() <= tol)
    }

    /// Exit route for a bay: anchor, bay-specific via points, junction, entrance.
    pub fn exit_route(&self, number: u8) -> Option<Vec<WorldPoint>> {
        let bay = self.bay(number)?;

        let mut route = Vec::with_capacity(bay.exit_via.len() + 3);
        route.push(bay.anchor);
        route.extend(bay.exit_via.iter().copied());
        route.push(self.exit_junction);
        route.push(self.entrance);

        debug!(
            "[Facility] exit route for bay {}: {} points",
            number,
            route.len()
        );
        Some(route)
    }
}

impl Default for FacilityLayout {
    fn default() -> Self {
        Self::standard()
    }
}
