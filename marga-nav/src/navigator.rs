//! Navigation facade: turns ingested events into route and guidance state.
//!
//! All mutable state sits behind one mutex, so waypoint assignments,
//! position updates and presentation reads never interleave. Every change is
//! also pushed to an optional update channel, in the order it happened.

use crossbeam_channel::Sender;
use marga_map::{
    FacilityLayout, GridPathfinder, OccupancyGrid, PathfinderConfig, PlannedPath, WorldPoint,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{MargaConfig, RoutingMode};
use crate::error::{NavError, Result};
use crate::ingest::IngestEvent;
use crate::route::{Guidance, Instruction, RouteDirection, RouteTracker, TrackerConfig};

/// Read-only view of the navigation state after an update
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NavigationSnapshot {
    /// Active route polyline; empty without a route
    pub route: Vec<WorldPoint>,
    pub direction: RouteDirection,
    /// Segment being driven
    pub segment: Option<usize>,
    pub instructions: Vec<Instruction>,
    pub guidance: Option<Guidance>,
    /// Percent of the route covered
    pub progress: Option<f32>,
    /// Display speed, km/h
    pub speed_kmh: u32,
    pub position: Option<WorldPoint>,
    /// Tag of the vehicle that reported `position`
    pub tag_id: Option<String>,
    /// Bay the outbound route ends at, when its last waypoint matches one
    pub destination_bay: Option<u8>,
    pub arrived: bool,
}

/// Change notification for the presentation side
#[derive(Clone, Debug, PartialEq)]
pub enum NavigationUpdate {
    /// A new route replaced the previous one
    RouteChanged(NavigationSnapshot),
    /// The vehicle moved along the current route (or without one)
    PositionUpdated(NavigationSnapshot),
}

impl NavigationUpdate {
    pub fn snapshot(&self) -> &NavigationSnapshot {
        match self {
            NavigationUpdate::RouteChanged(s) | NavigationUpdate::PositionUpdated(s) => s,
        }
    }
}

#[derive(Debug)]
struct NavState {
    tracker: RouteTracker,
    position: Option<WorldPoint>,
    tag_id: Option<String>,
    destination_bay: Option<u8>,
    latest: NavigationSnapshot,
}

/// Orchestrates route building, tracking and publication
pub struct Navigator {
    layout: Arc<FacilityLayout>,
    grid: Arc<OccupancyGrid>,
    pathfinder: PathfinderConfig,
    routing: RoutingMode,
    state: Mutex<NavState>,
    updates: Option<Sender<NavigationUpdate>>,
}

impl Navigator {
    pub fn new(
        layout: Arc<FacilityLayout>,
        grid: Arc<OccupancyGrid>,
        pathfinder: PathfinderConfig,
        tracker: TrackerConfig,
        routing: RoutingMode,
    ) -> Self {
        Self {
            layout,
            grid,
            pathfinder,
            routing,
            state: Mutex::new(NavState {
                tracker: RouteTracker::new(tracker),
                position: None,
                tag_id: None,
                destination_bay: None,
                latest: NavigationSnapshot::default(),
            }),
            updates: None,
        }
    }

    /// Build the occupancy grid for `layout` and wire everything from config.
    pub fn from_config(config: &MargaConfig, layout: FacilityLayout) -> Result<Self> {
        let grid = layout.occupancy_grid(&config.grid)?;
        info!(
            "Occupancy grid {}x{} ({} blocked cells), {} bays",
            grid.width(),
            grid.height(),
            grid.blocked_count(),
            layout.bays.len()
        );

        Ok(Self::new(
            Arc::new(layout),
            Arc::new(grid),
            config.pathfinder.clone(),
            config.tracker.clone(),
            config.routing.mode,
        ))
    }

    /// Send every future update to `updates`, replacing any earlier channel.
    pub fn with_updates(mut self, updates: Sender<NavigationUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn layout(&self) -> &FacilityLayout {
        &self.layout
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.routing
    }

    /// Apply one ingested event.
    pub fn handle(&self, event: IngestEvent) -> Result<NavigationSnapshot> {
        match event {
            IngestEvent::Waypoints(waypoints) => self.assign_waypoints(&waypoints),
            IngestEvent::Position { point, tag_id } => self.report_position(point, tag_id),
        }
    }

    /// Replace the route with entrance + `waypoints` and restart tracking.
    ///
    /// An empty or non-finite list is rejected and leaves the current route
    /// untouched. Without a known position the vehicle is placed at the
    /// entrance.
    pub fn assign_waypoints(&self, waypoints: &[WorldPoint]) -> Result<NavigationSnapshot> {
        let Some(&destination) = waypoints.last() else {
            return Err(NavError::InvalidWaypoints("waypoint list is empty".into()));
        };
        if let Some(bad) = waypoints.iter().find(|p| !p.is_finite()) {
            return Err(NavError::InvalidWaypoints(format!(
                "non-finite waypoint ({}, {})",
                bad.x, bad.y
            )));
        }

        let route = self.build_route(self.layout.entrance, waypoints);
        let destination_bay = self.layout.bay_for_waypoint(destination).map(|b| b.number);
        info!(
            waypoints = waypoints.len(),
            route_points = route.len(),
            ?destination_bay,
            "New route assigned"
        );

        let mut state = self.state.lock();
        state.tracker.set_route(route, RouteDirection::Outbound);
        state.destination_bay = destination_bay;
        if state.position.is_none() {
            state.position = Some(self.layout.entrance);
        }
        let snapshot = Self::refresh(&mut state);
        self.publish(NavigationUpdate::RouteChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Record a live position and recompute guidance.
    pub fn update_position(&self, position: WorldPoint) -> Result<NavigationSnapshot> {
        self.report_position(position, None)
    }

    fn report_position(
        &self,
        position: WorldPoint,
        tag_id: Option<String>,
    ) -> Result<NavigationSnapshot> {
        if !position.is_finite() {
            return Err(NavError::Protocol(format!(
                "non-finite position ({}, {})",
                position.x, position.y
            )));
        }

        let mut state = self.state.lock();
        state.position = Some(position);
        if tag_id.is_some() {
            state.tag_id = tag_id;
        }
        let snapshot = Self::refresh(&mut state);
        self.publish(NavigationUpdate::PositionUpdated(snapshot.clone()));
        Ok(snapshot)
    }

    /// Route the vehicle out of the bay it is parked in.
    ///
    /// Requires a known position inside a bay rectangle. The exit route runs
    /// from the bay's anchor through its via points and the exit junction to
    /// the entrance.
    pub fn start_exit(&self) -> Result<NavigationSnapshot> {
        let mut state = self.state.lock();
        let position = state.position.ok_or(NavError::NoPosition)?;

        let not_in_bay = NavError::NotInBay {
            x: position.x,
            y: position.y,
        };
        let Some(bay) = self.layout.bay_at(position) else {
            return Err(not_in_bay);
        };
        let Some(route) = self.layout.exit_route(bay.number) else {
            return Err(not_in_bay);
        };

        info!(bay = bay.number, points = route.len(), "Exit route started");
        state.tracker.set_route(route, RouteDirection::Inbound);
        state.destination_bay = None;
        let snapshot = Self::refresh(&mut state);
        self.publish(NavigationUpdate::RouteChanged(snapshot.clone()));
        Ok(snapshot)
    }

    /// Latest published state
    pub fn snapshot(&self) -> NavigationSnapshot {
        self.state.lock().latest.clone()
    }

    /// Grid search between two world points, independent of the active route.
    pub fn plan_grid_route(&self, from: WorldPoint, to: WorldPoint) -> Result<PlannedPath> {
        let planner = GridPathfinder::new(&self.grid, self.pathfinder.clone());
        Ok(planner.plan(from, to)?)
    }

    fn build_route(&self, start: WorldPoint, waypoints: &[WorldPoint]) -> Vec<WorldPoint> {
        match self.routing {
            RoutingMode::Direct => std::iter::once(start)
                .chain(waypoints.iter().copied())
                .collect(),
            RoutingMode::Grid => self.build_grid_route(start, waypoints),
        }
    }

    /// Grid-planned legs joined end to end, starting at `start` itself; a leg
    /// that cannot be planned is driven as a straight line.
    fn build_grid_route(&self, start: WorldPoint, waypoints: &[WorldPoint]) -> Vec<WorldPoint> {
        let planner = GridPathfinder::new(&self.grid, self.pathfinder.clone());
        let mut route = vec![start];
        let mut from = start;

        for &to in waypoints {
            let leg = match planner.plan(from, to) {
                Ok(path) => {
                    debug!(
                        expansions = path.expansions,
                        turn_points = path.waypoints.len(),
                        "Planned leg"
                    );
                    path.waypoints
                }
                Err(e) => {
                    warn!(
                        "Grid planning ({:.0}, {:.0}) -> ({:.0}, {:.0}) failed, using direct leg: {}",
                        from.x, from.y, to.x, to.y, e
                    );
                    vec![from, to]
                }
            };

            for point in leg {
                if route.last() != Some(&point) {
                    route.push(point);
                }
            }
            from = to;
        }

        // Every leg collapsed into the start cell
        if route.len() < 2 {
            debug!("Grid route degenerate, using direct legs");
            return std::iter::once(start)
                .chain(waypoints.iter().copied())
                .collect();
        }
        route
    }

    /// Advance tracking for the current position and rebuild the snapshot.
    fn refresh(state: &mut NavState) -> NavigationSnapshot {
        let mut snapshot = NavigationSnapshot {
            route: state.tracker.points().to_vec(),
            direction: state.tracker.direction(),
            position: state.position,
            tag_id: state.tag_id.clone(),
            destination_bay: state.destination_bay,
            ..NavigationSnapshot::default()
        };

        if let Some(position) = state.position
            && state.tracker.has_route()
        {
            state.tracker.advance(position);
            let instructions = state.tracker.instructions(position).unwrap_or_default();
            let progress = state.tracker.progress(position);

            snapshot.speed_kmh = state
                .tracker
                .estimate_speed(&instructions, progress.unwrap_or(0.0));
            snapshot.guidance = Guidance::select(&instructions);
            snapshot.instructions = instructions;
            snapshot.progress = progress;
        }
        snapshot.segment = state.tracker.current_segment();
        snapshot.arrived = state.tracker.is_arrived();

        state.latest = snapshot.clone();
        snapshot
    }

    fn publish(&self, update: NavigationUpdate) {
        if let Some(tx) = &self.updates
            && tx.send(update).is_err()
        {
            debug!("Update receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Maneuver;
    use approx::assert_relative_eq;
    use marga_map::GridConfig;

    fn p(x: f32, y: f32) -> WorldPoint {
        WorldPoint::new(x, y)
    }

    fn navigator(routing: RoutingMode) -> Navigator {
        let config = MargaConfig {
            routing: crate::config::RoutingConfig { mode: routing },
            ..MargaConfig::default()
        };
        Navigator::from_config(&config, FacilityLayout::standard()).unwrap()
    }

    #[test]
    fn test_empty_waypoints_rejected_without_route_change() {
        let nav = navigator(RoutingMode::Direct);
        nav.assign_waypoints(&[p(1150.0, 925.0)]).unwrap();
        let before = nav.snapshot();

        assert!(matches!(
            nav.assign_waypoints(&[]),
            Err(NavError::InvalidWaypoints(_))
        ));
        assert!(nav.assign_waypoints(&[p(f32::NAN, 1.0)]).is_err());
        assert_eq!(nav.snapshot(), before);
    }

    #[test]
    fn test_direct_route_from_entrance() {
        let nav = navigator(RoutingMode::Direct);
        let snapshot = nav
            .assign_waypoints(&[p(200.0, 925.0), p(1150.0, 925.0)])
            .unwrap();

        assert_eq!(
            snapshot.route,
            vec![p(200.0, 200.0), p(200.0, 925.0), p(1150.0, 925.0)]
        );
        assert_eq!(snapshot.direction, RouteDirection::Outbound);
        assert_eq!(snapshot.position, Some(p(200.0, 200.0)));
        assert_eq!(snapshot.destination_bay, Some(9));
        assert_eq!(snapshot.segment, Some(0));

        // Straight 14.5 m, then a right turn and 19 m to the bay
        assert_eq!(snapshot.instructions.len(), 2);
        assert_eq!(snapshot.instructions[0].maneuver, Maneuver::TurnRight);
        assert_relative_eq!(snapshot.instructions[0].distance_m, 14.5);
        let guidance = snapshot.guidance.unwrap();
        assert_eq!(guidance.current, Maneuver::Straight);
        assert_eq!(guidance.next, Some(Maneuver::TurnRight));
        assert_relative_eq!(snapshot.progress.unwrap(), 0.0);
        // 15 + 7.25 capped at 15 for the turn, * 0.8 at the start
        assert_eq!(snapshot.speed_kmh, 12);
    }

    #[test]
    fn test_position_updates_advance_to_arrival() {
        let nav = navigator(RoutingMode::Direct);
        nav.assign_waypoints(&[p(200.0, 925.0), p(1150.0, 925.0)]).unwrap();

        let mid = nav.update_position(p(200.0, 600.0)).unwrap();
        assert_eq!(mid.segment, Some(0));
        assert!(!mid.arrived);

        let corner = nav.update_position(p(210.0, 900.0)).unwrap();
        assert_eq!(corner.segment, Some(1));
        assert_eq!(corner.instructions.len(), 1);
        assert_eq!(corner.instructions[0].maneuver, Maneuver::Arrived);

        let done = nav.update_position(p(1140.0, 925.0)).unwrap();
        assert!(done.arrived);
        assert_eq!(done.segment, Some(1));
        assert_eq!(done.progress, Some(100.0));
        assert_eq!(done.speed_kmh, 0);
        assert_eq!(
            done.instructions,
            vec![Instruction::new(Maneuver::Arrived, 0.0)]
        );
    }

    #[test]
    fn test_position_without_route() {
        let nav = navigator(RoutingMode::Direct);
        let snapshot = nav.update_position(p(500.0, 500.0)).unwrap();
        assert_eq!(snapshot.position, Some(p(500.0, 500.0)));
        assert!(snapshot.route.is_empty());
        assert!(snapshot.instructions.is_empty());
        assert!(snapshot.progress.is_none());
        assert!(snapshot.segment.is_none());
    }

    #[test]
    fn test_exit_requires_position_in_bay() {
        let nav = navigator(RoutingMode::Direct);
        assert!(matches!(nav.start_exit(), Err(NavError::NoPosition)));

        nav.update_position(p(1000.0, 925.0)).unwrap();
        assert!(matches!(nav.start_exit(), Err(NavError::NotInBay { .. })));
    }

    #[test]
    fn test_exit_route_from_bay() {
        let nav = navigator(RoutingMode::Direct);
        nav.update_position(p(850.0, 1800.0)).unwrap();

        let snapshot = nav.start_exit().unwrap();
        assert_eq!(snapshot.direction, RouteDirection::Inbound);
        assert_eq!(
            snapshot.route,
            vec![p(850.0, 1475.0), p(200.0, 1475.0), p(200.0, 925.0), p(200.0, 200.0)]
        );
        let last = snapshot.instructions.last().unwrap();
        assert_eq!(last.maneuver, Maneuver::ExitComplete);
        assert!(
            snapshot
                .instructions
                .iter()
                .all(|i| i.maneuver.is_arrival() || i.maneuver == Maneuver::ExitTurnLeft)
        );
    }

    #[test]
    fn test_grid_route_avoids_blocked_cells() {
        let nav = navigator(RoutingMode::Grid);
        let snapshot = nav.assign_waypoints(&[p(1150.0, 925.0)]).unwrap();

        assert!(snapshot.route.len() >= 3);
        // Entrance first, then the free cell it relocates to, ending at the
        // anchor's cell
        assert_eq!(snapshot.route[0], p(200.0, 200.0));
        assert_eq!(snapshot.route[1], p(15.0, 435.0));
        assert_eq!(*snapshot.route.last().unwrap(), p(1155.0, 915.0));
        for point in &snapshot.route[1..] {
            assert!(nav.grid().is_free(nav.grid().world_to_cell(*point)));
        }
        assert_eq!(snapshot.destination_bay, Some(9));
    }

    #[test]
    fn test_grid_route_within_start_cell_uses_direct_leg() {
        let mut layout = FacilityLayout::standard();
        layout.entrance = p(1155.0, 915.0);
        let config = MargaConfig {
            routing: crate::config::RoutingConfig {
                mode: RoutingMode::Grid,
            },
            ..MargaConfig::default()
        };
        let nav = Navigator::from_config(&config, layout).unwrap();

        let snapshot = nav.assign_waypoints(&[p(1150.0, 925.0)]).unwrap();
        assert_eq!(snapshot.route, vec![p(1155.0, 915.0), p(1150.0, 925.0)]);
        assert!(snapshot.segment.is_some());
    }

    #[test]
    fn test_grid_route_falls_back_to_direct_leg() {
        let layout = FacilityLayout::standard();
        let grid = layout.occupancy_grid(&GridConfig::default()).unwrap();
        let nav = Navigator::new(
            Arc::new(layout),
            Arc::new(grid),
            PathfinderConfig {
                max_expansions: 1,
                ..PathfinderConfig::default()
            },
            TrackerConfig::default(),
            RoutingMode::Grid,
        );

        let snapshot = nav.assign_waypoints(&[p(1150.0, 925.0)]).unwrap();
        assert_eq!(snapshot.route, vec![p(200.0, 200.0), p(1150.0, 925.0)]);
    }

    #[test]
    fn test_plan_grid_route_errors_are_distinct() {
        let nav = navigator(RoutingMode::Direct);
        assert!(nav.plan_grid_route(p(200.0, 200.0), p(550.0, 925.0)).is_ok());
        assert!(matches!(
            nav.plan_grid_route(p(-500.0, 200.0), p(550.0, 925.0)),
            Err(NavError::Path(marga_map::PathError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_updates_are_published_in_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let layout = FacilityLayout::standard();
        let nav = Navigator::from_config(&MargaConfig::default(), layout)
            .unwrap()
            .with_updates(tx);

        nav.handle(IngestEvent::Position {
            point: p(100.0, 50.0),
            tag_id: Some("car1".into()),
        })
        .unwrap();
        nav.handle(IngestEvent::Waypoints(vec![p(100.0, 200.0)])).unwrap();

        let updates: Vec<_> = rx.try_iter().collect();
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[0], NavigationUpdate::PositionUpdated(_)));
        assert!(matches!(updates[1], NavigationUpdate::RouteChanged(_)));
        assert_eq!(updates[1].snapshot().tag_id.as_deref(), Some("car1"));
        // Position was already known, so it is kept
        assert_eq!(updates[1].snapshot().position, Some(p(100.0, 50.0)));
    }
}
