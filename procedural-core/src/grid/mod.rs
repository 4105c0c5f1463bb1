//! Integer grid coordinates.
//!
//! Levels are sparse and unbounded, so every grid in the crate is a
//! `HashMap<GridPos, _>` rather than a raster. `z` is a flat level index:
//! adjacency never crosses it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orthogonal offsets, in the order neighbors are enumerated.
pub const CARDINALS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// All eight surrounding offsets.
pub const COMPASS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// A cell address on one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Same level, shifted in the plane.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }

    /// `(other.x - self.x, other.y - self.y)`
    pub fn delta_to(self, other: GridPos) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn sq_distance(self, other: GridPos) -> i32 {
        let (dx, dy) = self.delta_to(other);
        dx * dx + dy * dy
    }

    pub fn distance(self, other: GridPos) -> f32 {
        (self.sq_distance(other) as f32).sqrt()
    }

    pub fn manhattan(self, other: GridPos) -> i32 {
        let (dx, dy) = self.delta_to(other);
        dx.abs() + dy.abs()
    }

    pub fn cardinal_neighbors(self) -> impl Iterator<Item = GridPos> {
        CARDINALS.into_iter().map(move |(dx, dy)| self.offset(dx, dy))
    }

    pub fn compass_neighbors(self) -> impl Iterator<Item = GridPos> {
        COMPASS.into_iter().map(move |(dx, dy)| self.offset(dx, dy))
    }

    pub fn is_orthogonally_adjacent(self, other: GridPos) -> bool {
        self.z == other.z && self.manhattan(other) == 1
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_keeps_level() {
        let p = GridPos::new(3, 4, 2).offset(-1, 5);
        assert_eq!(p, GridPos::new(2, 9, 2));
    }

    #[test]
    fn test_distances() {
        let a = GridPos::new(0, 0, 0);
        let b = GridPos::new(3, 4, 0);
        assert_eq!(a.sq_distance(b), 25);
        assert!((a.distance(b) - 5.0).abs() < f32::EPSILON);
        assert_eq!(a.manhattan(b), 7);
    }

    #[test]
    fn test_neighbor_counts() {
        let p = GridPos::new(0, 0, 1);
        assert_eq!(p.cardinal_neighbors().count(), 4);
        assert_eq!(p.compass_neighbors().count(), 8);
        assert!(p.cardinal_neighbors().all(|n| p.is_orthogonally_adjacent(n)));
        assert!(p.compass_neighbors().all(|n| n.z == 1));
    }

    #[test]
    fn test_display_matches_composite_key() {
        assert_eq!(GridPos::new(-2, 7, 1).to_string(), "-2,7,1");
    }
}
