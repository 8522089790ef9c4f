//! A* pathfinding on the static occupancy grid.
//!
//! 4-connected moves with unit cost and a Manhattan heuristic, which is
//! admissible and consistent here, so returned paths are shortest in cell
//! count. Open-set ties on `f` are broken by insertion order (FIFO), making
//! the result a pure function of grid, start and goal.

use log::{debug, trace};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use thiserror::Error;

use super::simplify::simplify;
use crate::core::{Cell, WorldPoint};
use crate::grid::OccupancyGrid;

/// Pathfinder configuration
#[derive(Clone, Debug, Deserialize)]
pub struct PathfinderConfig {
    /// Maximum number of node expansions before giving up (default: 10000)
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Ring radius, in cells, searched when relocating a blocked start or goal
    /// (default: 100)
    #[serde(default = "default_relocation_radius")]
    pub relocation_radius: i32,
}

fn default_max_expansions() -> usize {
    10_000
}
fn default_relocation_radius() -> i32 {
    100
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            max_expansions: default_max_expansions(),
            relocation_radius: default_relocation_radius(),
        }
    }
}

/// Reason a search produced no path
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathError {
    /// Start or goal lies outside the grid
    #[error("start ({}, {}) or goal ({}, {}) is outside the grid", start.x, start.y, goal.x, goal.y)]
    OutOfBounds { start: Cell, goal: Cell },

    /// Endpoints still blocked after relocation, or the open set ran dry
    #[error("no path found")]
    NoPathFound,

    /// Expansion budget spent before reaching the goal
    #[error("search exhausted after {expansions} expansions")]
    SearchExhausted { expansions: usize },
}

/// A planned route through the grid
#[derive(Clone, Debug)]
pub struct PlannedPath {
    /// Every cell visited, start to goal
    pub cells: Vec<Cell>,
    /// Turn points (simplified cells) as cell centres
    pub waypoints: Vec<WorldPoint>,
    /// Polyline length of `waypoints` in world units
    pub length: f32,
    /// Nodes expanded during the search
    pub expansions: usize,
}

/// Open-set entry
#[derive(Clone, Copy, Debug)]
struct OpenNode {
    cell: Cell,
    f_cost: u32,
    /// Insertion sequence, breaks ties on `f_cost`
    seq: u64,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.f_cost == other.f_cost && self.seq == other.seq
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior: lowest f first, then oldest
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const NO_PARENT: usize = usize::MAX;

/// Grid A* planner borrowing an immutable occupancy grid
pub struct GridPathfinder<'a> {
    grid: &'a OccupancyGrid,
    config: PathfinderConfig,
}

impl<'a> GridPathfinder<'a> {
    /// Create a new planner
    pub fn new(grid: &'a OccupancyGrid, config: PathfinderConfig) -> Self {
        Self { grid, config }
    }

    /// Create with default configuration
    pub fn with_defaults(grid: &'a OccupancyGrid) -> Self {
        Self::new(grid, PathfinderConfig::default())
    }

    /// The grid searched by this planner
    pub fn grid(&self) -> &OccupancyGrid {
        self.grid
    }

    /// Nearest free cell to a world point, by expanding Chebyshev rings.
    ///
    /// Best effort: returns the (clamped) seed cell when nothing free lies
    /// within `max_radius`, so callers must re-check the result.
    pub fn nearest_free_cell(&self, point: WorldPoint, max_radius: i32) -> Cell {
        let seed = self.grid.clamp(self.grid.world_to_cell(point));
        self.nearest_free_to(seed, max_radius)
    }

    /// Ring search around a cell.
    ///
    /// Per ring the top and bottom rows are scanned left to right (top before
    /// bottom at each column), then the left and right columns excluding the
    /// corners already visited.
    pub fn nearest_free_to(&self, seed: Cell, max_radius: i32) -> Cell {
        if self.grid.is_free(seed) {
            return seed;
        }

        for r in 1..=max_radius {
            for dx in -r..=r {
                for dy in [-r, r] {
                    let candidate = Cell::new(seed.x + dx, seed.y + dy);
                    if self.grid.is_free(candidate) {
                        trace!(
                            "[AStar] relocated ({}, {}) -> ({}, {}) at radius {}",
                            seed.x, seed.y, candidate.x, candidate.y, r
                        );
                        return candidate;
                    }
                }
            }
            for dy in (-r + 1)..r {
                for dx in [-r, r] {
                    let candidate = Cell::new(seed.x + dx, seed.y + dy);
                    if self.grid.is_free(candidate) {
                        trace!(
                            "[AStar] relocated ({}, {}) -> ({}, {}) at radius {}",
                            seed.x, seed.y, candidate.x, candidate.y, r
                        );
                        return candidate;
                    }
                }
            }
        }

        debug!(
            "[AStar] no free cell within {} of ({}, {})",
            max_radius, seed.x, seed.y
        );
        seed
    }

    /// Find a shortest 4-connected path between two cells.
    ///
    /// Blocked endpoints are first moved to the nearest free cell.
    pub fn find_path(&self, start: Cell, goal: Cell) -> Result<Vec<Cell>, PathError> {
        self.search(start, goal).map(|(cells, _)| cells)
    }

    /// Plan between two world points and simplify the result to turn points.
    pub fn plan(&self, start: WorldPoint, goal: WorldPoint) -> Result<PlannedPath, PathError> {
        let start_cell = self.grid.world_to_cell(start);
        let goal_cell = self.grid.world_to_cell(goal);
        let (cells, expansions) = self.search(start_cell, goal_cell)?;

        let waypoints: Vec<WorldPoint> = simplify(&cells)
            .into_iter()
            .map(|c| self.grid.cell_center(c))
            .collect();
        let length = waypoints.windows(2).map(|w| w[0].distance(&w[1])).sum();

        Ok(PlannedPath {
            cells,
            waypoints,
            length,
            expansions,
        })
    }

    fn search(&self, start: Cell, goal: Cell) -> Result<(Vec<Cell>, usize), PathError> {
        trace!(
            "[AStar] find_path: start=({},{}) goal=({},{})",
            start.x, start.y, goal.x, goal.y
        );

        if !self.grid.contains(start) || !self.grid.contains(goal) {
            debug!("[AStar] FAILED: OutOfBounds - start or goal outside grid");
            return Err(PathError::OutOfBounds { start, goal });
        }

        let radius = self.config.relocation_radius;
        let start = self.nearest_free_to(start, radius);
        let goal = self.nearest_free_to(goal, radius);

        let (Some(start_idx), Some(goal_idx)) = (self.free_index(start), self.free_index(goal))
        else {
            debug!("[AStar] FAILED: start or goal still blocked after relocation");
            return Err(PathError::NoPathFound);
        };

        let cells = self.grid.len();
        let mut g_cost = vec![u32::MAX; cells];
        let mut came_from = vec![NO_PARENT; cells];
        let mut closed = vec![false; cells];
        let mut open_set = BinaryHeap::new();
        let mut seq: u64 = 0;

        g_cost[start_idx] = 0;
        open_set.push(OpenNode {
            cell: start,
            f_cost: start.manhattan_distance(&goal) as u32,
            seq,
        });

        let mut expansions = 0;

        while let Some(current) = open_set.pop() {
            let Some(current_idx) = self.grid.index(current.cell) else {
                continue;
            };
            if closed[current_idx] {
                continue;
            }

            if current_idx == goal_idx {
                let path = Self::reconstruct_path(self.grid, &came_from, goal_idx);
                trace!(
                    "[AStar] SUCCESS: path length={} cells, expansions={}",
                    path.len(),
                    expansions
                );
                return Ok((path, expansions));
            }

            if expansions >= self.config.max_expansions {
                debug!("[AStar] FAILED: SearchExhausted ({} nodes)", expansions);
                return Err(PathError::SearchExhausted { expansions });
            }
            expansions += 1;
            closed[current_idx] = true;

            let tentative_g = g_cost[current_idx] + 1;
            for neighbor in current.cell.neighbors_4() {
                let Some(neighbor_idx) = self.free_index(neighbor) else {
                    continue;
                };
                if closed[neighbor_idx] || tentative_g >= g_cost[neighbor_idx] {
                    continue;
                }

                g_cost[neighbor_idx] = tentative_g;
                came_from[neighbor_idx] = current_idx;
                seq += 1;
                open_set.push(OpenNode {
                    cell: neighbor,
                    f_cost: tentative_g + neighbor.manhattan_distance(&goal) as u32,
                    seq,
                });
            }
        }

        debug!("[AStar] FAILED: NoPath after expanding {} nodes", expansions);
        Err(PathError::NoPathFound)
    }

    /// Index of a cell that is in bounds and free
    #[inline]
    fn free_index(&self, cell: Cell) -> Option<usize> {
        self.grid.index(cell).filter(|_| self.grid.is_free(cell))
    }

    fn reconstruct_path(grid: &OccupancyGrid, came_from: &[usize], goal_idx: usize) -> Vec<Cell> {
        let width = grid.width();
        let to_cell = |idx: usize| Cell::new((idx % width) as i32, (idx / width) as i32);

        let mut path = vec![to_cell(goal_idx)];
        let mut current = goal_idx;
        while came_from[current] != NO_PARENT {
            current = came_from[current];
            path.push(to_cell(current));
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;
    use crate::grid::GridConfig;

    /// 10x10 grid with 10-unit cells
    fn grid_10x10(rects: &[Rect]) -> OccupancyGrid {
        OccupancyGrid::build(
            WorldPoint::new(100.0, 100.0),
            rects,
            &GridConfig {
                cell_size: 10.0,
                margin: 0.0,
            },
        )
        .unwrap()
    }

    fn assert_contiguous(path: &[Cell]) {
        for w in path.windows(2) {
            assert_eq!(w[0].manhattan_distance(&w[1]), 1, "gap between {:?}", w);
        }
    }

    #[test]
    fn test_straight_path() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::with_defaults(&grid);

        let path = planner.find_path(Cell::new(0, 5), Cell::new(9, 5)).unwrap();
        assert_eq!(path.len(), 10);
        assert_eq!(path[0], Cell::new(0, 5));
        assert_eq!(*path.last().unwrap(), Cell::new(9, 5));
        assert!(path.iter().all(|c| c.y == 5));
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::with_defaults(&grid);
        let path = planner.find_path(Cell::new(4, 4), Cell::new(4, 4)).unwrap();
        assert_eq!(path, vec![Cell::new(4, 4)]);
    }

    #[test]
    fn test_optimal_length_on_free_grid() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::with_defaults(&grid);

        for sx in 0..10 {
            for sy in 0..10 {
                for gx in 0..10 {
                    for gy in 0..10 {
                        let start = Cell::new(sx, sy);
                        let goal = Cell::new(gx, gy);
                        let path = planner.find_path(start, goal).unwrap();
                        assert_eq!(
                            path.len() as i32 - 1,
                            start.manhattan_distance(&goal),
                            "{:?} -> {:?}",
                            start,
                            goal
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let grid = grid_10x10(&[Rect::new(20.0, 30.0, 50.0, 10.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        let first = planner.find_path(Cell::new(0, 0), Cell::new(9, 9)).unwrap();
        for _ in 0..10 {
            let again = planner.find_path(Cell::new(0, 0), Cell::new(9, 9)).unwrap();
            assert_eq!(first, again);
        }

        let other_planner = GridPathfinder::with_defaults(&grid);
        assert_eq!(
            first,
            other_planner.find_path(Cell::new(0, 0), Cell::new(9, 9)).unwrap()
        );
    }

    #[test]
    fn test_detour_around_block() {
        // 2x2 block covering cells (3,3)-(4,4)
        let grid = grid_10x10(&[Rect::new(30.0, 30.0, 20.0, 20.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        let path = planner.find_path(Cell::new(0, 0), Cell::new(9, 9)).unwrap();

        assert_contiguous(&path);
        assert!(path.iter().all(|c| grid.is_free(*c)));
        for blocked in [(3, 3), (3, 4), (4, 3), (4, 4)] {
            assert!(!path.contains(&Cell::new(blocked.0, blocked.1)));
        }
        // Manhattan-optimal detour still exists around a 2x2 block
        assert!(path.len() - 1 >= 18);
        assert_eq!(path.len() - 1, 18);
    }

    #[test]
    fn test_wall_forces_longer_path() {
        // Vertical wall at column 5, rows 0..=8, gap at row 9
        let grid = grid_10x10(&[Rect::new(50.0, 0.0, 10.0, 90.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        let path = planner.find_path(Cell::new(0, 0), Cell::new(9, 0)).unwrap();
        assert_contiguous(&path);
        assert!(path.contains(&Cell::new(5, 9)));
        assert_eq!(path.len() - 1, 9 + 9 + 9);
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::with_defaults(&grid);

        let err = planner
            .find_path(Cell::new(-1, 0), Cell::new(5, 5))
            .unwrap_err();
        assert_eq!(
            err,
            PathError::OutOfBounds {
                start: Cell::new(-1, 0),
                goal: Cell::new(5, 5)
            }
        );
        assert!(matches!(
            planner.find_path(Cell::new(0, 0), Cell::new(10, 5)),
            Err(PathError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_unreachable_goal() {
        // Column 5 fully blocked splits the grid
        let grid = grid_10x10(&[Rect::new(50.0, 0.0, 10.0, 100.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        assert_eq!(
            planner.find_path(Cell::new(0, 0), Cell::new(9, 9)),
            Err(PathError::NoPathFound)
        );
    }

    #[test]
    fn test_fully_blocked_grid() {
        let grid = grid_10x10(&[Rect::new(0.0, 0.0, 100.0, 100.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        assert_eq!(
            planner.find_path(Cell::new(0, 0), Cell::new(9, 9)),
            Err(PathError::NoPathFound)
        );
    }

    #[test]
    fn test_search_exhausted() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::new(
            &grid,
            PathfinderConfig {
                max_expansions: 3,
                ..Default::default()
            },
        );

        assert_eq!(
            planner.find_path(Cell::new(0, 0), Cell::new(9, 9)),
            Err(PathError::SearchExhausted { expansions: 3 })
        );
    }

    #[test]
    fn test_blocked_endpoints_relocated() {
        let grid = grid_10x10(&[Rect::new(0.0, 0.0, 20.0, 20.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        // (0,0) is blocked; ring 2 first hits (-2,-2)..., first free is (0,2)
        let path = planner.find_path(Cell::new(0, 0), Cell::new(9, 9)).unwrap();
        assert_eq!(path[0], Cell::new(0, 2));
        assert!(grid.is_free(path[0]));
        assert_eq!(*path.last().unwrap(), Cell::new(9, 9));
    }

    #[test]
    fn test_nearest_free_ring_order() {
        // Block a 3x3 square around (5,5); ring 2 scan order starts at dx=-2:
        // (3,3) then (3,7)
        let grid = grid_10x10(&[Rect::new(40.0, 40.0, 30.0, 30.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        let cell = planner.nearest_free_cell(WorldPoint::new(55.0, 55.0), 10);
        assert_eq!(cell, Cell::new(3, 3));
    }

    #[test]
    fn test_nearest_free_returns_seed_when_exhausted() {
        let grid = grid_10x10(&[Rect::new(0.0, 0.0, 100.0, 100.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        let cell = planner.nearest_free_cell(WorldPoint::new(55.0, 55.0), 3);
        assert_eq!(cell, Cell::new(5, 5));
        assert!(!grid.is_free(cell));
    }

    #[test]
    fn test_nearest_free_stays_in_bounds() {
        let grid = grid_10x10(&[Rect::new(0.0, 0.0, 30.0, 100.0)]);
        let planner = GridPathfinder::with_defaults(&grid);

        for (x, y) in [(-500.0, 50.0), (5.0, 5.0), (25.0, 95.0), (5.0, 500.0)] {
            let cell = planner.nearest_free_cell(WorldPoint::new(x, y), 20);
            assert!(grid.contains(cell), "{:?} out of bounds", cell);
            assert!(grid.is_free(cell), "{:?} is blocked", cell);
        }
    }

    #[test]
    fn test_plan_world_simplifies() {
        let grid = grid_10x10(&[]);
        let planner = GridPathfinder::with_defaults(&grid);

        let planned = planner
            .plan(WorldPoint::new(5.0, 5.0), WorldPoint::new(95.0, 95.0))
            .unwrap();
        assert_eq!(planned.cells.len(), 19);
        assert_eq!(planned.waypoints.first(), Some(&WorldPoint::new(5.0, 5.0)));
        assert_eq!(planned.waypoints.last(), Some(&WorldPoint::new(95.0, 95.0)));
        assert!(planned.waypoints.len() >= 3);
        approx::assert_relative_eq!(planned.length, 180.0);
    }
}
