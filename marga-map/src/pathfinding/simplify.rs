//! Collapse cell paths into polyline vertices and back.

use crate::core::Cell;

/// Keep only the endpoints and the cells where the direction of travel changes.
///
/// Single pass comparing the incoming and outgoing unit step at every
/// interior cell.
pub fn simplify(cells: &[Cell]) -> Vec<Cell> {
    let Some(&first) = cells.first() else {
        return Vec::new();
    };

    let mut vertices = vec![first];
    for i in 1..cells.len().saturating_sub(1) {
        let incoming = cells[i - 1].step_towards(&cells[i]);
        let outgoing = cells[i].step_towards(&cells[i + 1]);
        if incoming != outgoing {
            vertices.push(cells[i]);
        }
    }

    if let Some(&last) = cells.last()
        && cells.len() > 1
    {
        vertices.push(last);
    }
    vertices
}

/// Rasterize axis-aligned polyline vertices back into a contiguous cell path.
///
/// Diagonal legs are walked x-first so the output stays 4-connected.
pub fn expand(vertices: &[Cell]) -> Vec<Cell> {
    let Some(&first) = vertices.first() else {
        return Vec::new();
    };

    let mut cells = vec![first];
    let mut current = first;
    for &target in &vertices[1..] {
        while current.x != target.x {
            current.x += (target.x - current.x).signum();
            cells.push(current);
        }
        while current.y != target.y {
            current.y += (target.y - current.y).signum();
            cells.push(current);
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: i32, y: i32) -> Cell {
        Cell::new(x, y)
    }

    #[test]
    fn test_simplify_trivial() {
        assert!(simplify(&[]).is_empty());
        assert_eq!(simplify(&[c(1, 1)]), vec![c(1, 1)]);
        assert_eq!(simplify(&[c(1, 1), c(2, 1)]), vec![c(1, 1), c(2, 1)]);
    }

    #[test]
    fn test_simplify_keeps_turns() {
        let path = vec![c(0, 0), c(1, 0), c(2, 0), c(2, 1), c(2, 2), c(3, 2)];
        assert_eq!(simplify(&path), vec![c(0, 0), c(2, 0), c(2, 2), c(3, 2)]);
    }

    #[test]
    fn test_simplify_staircase() {
        let path = vec![c(0, 0), c(1, 0), c(1, 1), c(2, 1), c(2, 2)];
        assert_eq!(simplify(&path), path);
    }

    #[test]
    fn test_round_trip() {
        let path = vec![
            c(0, 0),
            c(0, 1),
            c(0, 2),
            c(1, 2),
            c(2, 2),
            c(3, 2),
            c(3, 1),
            c(3, 0),
            c(4, 0),
        ];
        let vertices = simplify(&path);
        assert_eq!(vertices, vec![c(0, 0), c(0, 2), c(3, 2), c(3, 0), c(4, 0)]);
        assert_eq!(expand(&vertices), path);
        assert_eq!(simplify(&expand(&vertices)), vertices);
    }
}
