//! Static occupancy grid rasterized from facility rectangles.
//!
//! The grid is built once at startup and never mutated afterwards, so it can
//! be shared between threads behind an `Arc` without locking.

use log::debug;
use serde::Deserialize;

use crate::core::{Cell, Rect, WorldPoint};
use crate::error::{MapError, Result};

/// Rasterization parameters
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Cell edge length in world units (default: 30)
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,

    /// Inflation applied to every side of each rectangle (default: 10)
    #[serde(default = "default_margin")]
    pub margin: f32,
}

fn default_cell_size() -> f32 {
    30.0
}
fn default_margin() -> f32 {
    10.0
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size: default_cell_size(),
            margin: default_margin(),
        }
    }
}

/// Dense boolean occupancy grid.
///
/// Cell `(x, y)` covers world `[x * cell_size, (x + 1) * cell_size)` along each
/// axis. Anything outside `0..width` / `0..height` is treated as blocked.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    cell_size: f32,
    /// World extent the rectangles are clipped against
    extent: WorldPoint,
    /// Row-major, `true` = blocked
    blocked: Vec<bool>,
}

impl OccupancyGrid {
    /// Rasterize `rects` (each inflated by `config.margin`) over a world of
    /// size `extent`.
    ///
    /// Fails only when the cell size is not a positive finite number.
    pub fn build(extent: WorldPoint, rects: &[Rect], config: &GridConfig) -> Result<Self> {
        let cell_size = config.cell_size;
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(MapError::InvalidConfig(format!(
                "cell size must be positive, got {}",
                cell_size
            )));
        }

        let extent = WorldPoint::new(extent.x.max(0.0), extent.y.max(0.0));
        let width = (extent.x / cell_size).ceil() as usize;
        let height = (extent.y / cell_size).ceil() as usize;

        let mut grid = Self {
            width,
            height,
            cell_size,
            extent,
            blocked: vec![false; width * height],
        };

        for rect in rects {
            grid.block_rect(&rect.inflate(config.margin));
        }

        debug!(
            "[Grid] built {}x{} cells ({} blocked) from {} rectangles",
            width,
            height,
            grid.blocked_count(),
            rects.len()
        );

        Ok(grid)
    }

    /// Mark every cell overlapped by `rect` (clipped to the world extent).
    fn block_rect(&mut self, rect: &Rect) {
        let x0 = rect.x.max(0.0);
        let y0 = rect.y.max(0.0);
        let x1 = rect.max_x().min(self.extent.x);
        let y1 = rect.max_y().min(self.extent.y);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        // Half-open coverage: a rectangle ending exactly on a cell boundary
        // does not touch the next cell.
        let cx0 = (x0 / self.cell_size).floor() as i32;
        let cy0 = (y0 / self.cell_size).floor() as i32;
        let cx1 = (x1 / self.cell_size).ceil() as i32 - 1;
        let cy1 = (y1 / self.cell_size).ceil() as i32 - 1;

        for cy in cy0..=cy1 {
            for cx in cx0..=cx1 {
                if let Some(idx) = self.index(Cell::new(cx, cy)) {
                    self.blocked[idx] = true;
                }
            }
        }
    }

    /// Grid width in cells
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell edge length in world units
    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Row-major index of an in-bounds cell
    #[inline]
    pub fn index(&self, cell: Cell) -> Option<usize> {
        if self.contains(cell) {
            Some(cell.y as usize * self.width + cell.x as usize)
        } else {
            None
        }
    }

    /// Whether the cell lies inside the grid
    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    /// Whether the cell is inside the grid and not blocked
    #[inline]
    pub fn is_free(&self, cell: Cell) -> bool {
        self.index(cell).is_some_and(|idx| !self.blocked[idx])
    }

    /// Cell containing a world point (floor division, may be out of bounds)
    #[inline]
    pub fn world_to_cell(&self, p: WorldPoint) -> Cell {
        Cell::new(
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    /// World coordinate of a cell's centre
    #[inline]
    pub fn cell_center(&self, cell: Cell) -> WorldPoint {
        WorldPoint::new(
            (cell.x as f32 + 0.5) * self.cell_size,
            (cell.y as f32 + 0.5) * self.cell_size,
        )
    }

    /// Nearest in-bounds cell. Meaningless for an empty grid.
    pub fn clamp(&self, cell: Cell) -> Cell {
        let max_x = self.width.saturating_sub(1) as i32;
        let max_y = self.height.saturating_sub(1) as i32;
        Cell::new(cell.x.clamp(0, max_x), cell.y.clamp(0, max_y))
    }

    /// Number of blocked cells
    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|&&b| b).count()
    }

    /// Total number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cell_size: f32, margin: f32) -> GridConfig {
        GridConfig { cell_size, margin }
    }

    #[test]
    fn test_dimensions_round_up() {
        let grid = OccupancyGrid::build(WorldPoint::new(2000.0, 2000.0), &[], &config(30.0, 10.0))
            .unwrap();
        assert_eq!(grid.width(), 67);
        assert_eq!(grid.height(), 67);
        assert_eq!(grid.blocked_count(), 0);
    }

    #[test]
    fn test_rejects_non_positive_cell_size() {
        let extent = WorldPoint::new(100.0, 100.0);
        assert!(matches!(
            OccupancyGrid::build(extent, &[], &config(0.0, 0.0)),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(OccupancyGrid::build(extent, &[], &config(-1.0, 0.0)).is_err());
        assert!(OccupancyGrid::build(extent, &[], &config(f32::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_out_of_bounds_is_not_free() {
        let grid =
            OccupancyGrid::build(WorldPoint::new(100.0, 100.0), &[], &config(10.0, 0.0)).unwrap();
        assert!(grid.is_free(Cell::new(0, 0)));
        assert!(grid.is_free(Cell::new(9, 9)));
        assert!(!grid.is_free(Cell::new(-1, 0)));
        assert!(!grid.is_free(Cell::new(10, 0)));
        assert!(!grid.is_free(Cell::new(0, 10)));
    }

    #[test]
    fn test_exact_rect_coverage() {
        let rect = Rect::new(30.0, 30.0, 20.0, 20.0);
        let grid =
            OccupancyGrid::build(WorldPoint::new(100.0, 100.0), &[rect], &config(10.0, 0.0))
                .unwrap();

        assert_eq!(grid.blocked_count(), 4);
        for (x, y) in [(3, 3), (3, 4), (4, 3), (4, 4)] {
            assert!(!grid.is_free(Cell::new(x, y)));
        }
        assert!(grid.is_free(Cell::new(5, 4)));
        assert!(grid.is_free(Cell::new(2, 3)));
    }

    #[test]
    fn test_margin_inflates_all_sides() {
        let rect = Rect::new(40.0, 40.0, 10.0, 10.0);
        let grid =
            OccupancyGrid::build(WorldPoint::new(100.0, 100.0), &[rect], &config(10.0, 5.0))
                .unwrap();

        // Inflated to [35, 55) on both axes -> cells 3..=5
        assert_eq!(grid.blocked_count(), 9);
        assert!(!grid.is_free(Cell::new(3, 3)));
        assert!(!grid.is_free(Cell::new(5, 5)));
        assert!(grid.is_free(Cell::new(6, 5)));
    }

    #[test]
    fn test_every_cell_inside_inflated_rect_is_blocked() {
        let extent = WorldPoint::new(300.0, 200.0);
        let rects = [
            Rect::new(12.0, 7.0, 33.0, 51.0),
            Rect::new(-20.0, 150.0, 60.0, 80.0),
            Rect::new(100.0, 100.0, 0.5, 0.5),
            Rect::new(250.0, 10.0, 100.0, 30.0),
        ];

        for margin in [0.0, 3.0, 10.0, 17.5] {
            let cfg = config(10.0, margin);
            let grid = OccupancyGrid::build(extent, &rects, &cfg).unwrap();

            for rect in &rects {
                let inflated = rect.inflate(margin);
                for cy in 0..grid.height() as i32 {
                    for cx in 0..grid.width() as i32 {
                        let x0 = cx as f32 * 10.0;
                        let y0 = cy as f32 * 10.0;
                        let fully_inside = x0 >= inflated.x
                            && x0 + 10.0 <= inflated.max_x()
                            && y0 >= inflated.y
                            && y0 + 10.0 <= inflated.max_y();
                        if fully_inside {
                            assert!(
                                !grid.is_free(Cell::new(cx, cy)),
                                "cell ({}, {}) inside {:?} with margin {} should be blocked",
                                cx,
                                cy,
                                rect,
                                margin
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_rect_outside_extent_is_ignored() {
        let rect = Rect::new(-500.0, -500.0, 100.0, 100.0);
        let grid =
            OccupancyGrid::build(WorldPoint::new(100.0, 100.0), &[rect], &config(10.0, 10.0))
                .unwrap();
        assert_eq!(grid.blocked_count(), 0);
    }

    #[test]
    fn test_world_cell_conversion() {
        let grid =
            OccupancyGrid::build(WorldPoint::new(2000.0, 2000.0), &[], &config(30.0, 10.0))
                .unwrap();
        assert_eq!(grid.world_to_cell(WorldPoint::new(200.0, 200.0)), Cell::new(6, 6));
        assert_eq!(grid.world_to_cell(WorldPoint::new(-1.0, 0.0)), Cell::new(-1, 0));
        assert_eq!(grid.cell_center(Cell::new(6, 6)), WorldPoint::new(195.0, 195.0));
        assert_eq!(grid.clamp(Cell::new(-4, 90)), Cell::new(0, 66));
    }
}
