// Core value types shared across the graph and engine crates.
//
// Positions use `Int3`, a fixed-point 3D vector with 1000 sub-units per
// world unit. All traversal costs are unsigned integers derived from these
// coordinates, so cost arithmetic is exact and identical on every platform.
//
// See also: `graph.rs` for the node arena indexed by `NodeIndex`,
// `waymark_engine`'s search module which consumes `Heuristic::estimate`.
//
// **Critical constraint: determinism.** Heuristic and cost computation must
// produce the same integers everywhere. Floating point appears only in
// scaling factors and is rounded back to integers immediately.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Index of a node in the `GraphStore` arena.
///
/// Indices are dense and reassigned when graphs are removed, so they must
/// not be persisted across structural changes. The store's
/// `structure_version` tells holders when their indices went stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ---------------------------------------------------------------------------
// Fixed-point positions
// ---------------------------------------------------------------------------

/// A 3D position in fixed-point world coordinates.
///
/// One world unit is `PRECISION` sub-units, so the resolution is 1 mm at the
/// default scale. Connection costs are distances in these sub-units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Int3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Int3 {
    /// Sub-units per world unit.
    pub const PRECISION: i32 = 1000;

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert from floating-point world coordinates, rounding to the
    /// nearest sub-unit.
    pub fn from_world(x: f32, y: f32, z: f32) -> Self {
        let p = Self::PRECISION as f32;
        Self {
            x: (x * p).round() as i32,
            y: (y * p).round() as i32,
            z: (z * p).round() as i32,
        }
    }

    /// Convert back to floating-point world coordinates.
    pub fn to_world(self) -> (f32, f32, f32) {
        let p = Self::PRECISION as f32;
        (self.x as f32 / p, self.y as f32 / p, self.z as f32 / p)
    }

    /// Squared euclidean magnitude in sub-units, exact.
    pub fn sq_magnitude(self) -> i64 {
        let x = i64::from(self.x);
        let y = i64::from(self.y);
        let z = i64::from(self.z);
        x * x + y * y + z * z
    }

    /// Euclidean magnitude in sub-units.
    pub fn magnitude(self) -> f64 {
        (self.sq_magnitude() as f64).sqrt()
    }

    /// Magnitude rounded to the nearest integer, used for connection costs.
    pub fn cost_magnitude(self) -> u32 {
        let m = self.magnitude().round();
        if m >= u32::MAX as f64 { u32::MAX } else { m as u32 }
    }

    /// Manhattan distance to `other` in sub-units.
    pub fn manhattan_distance(self, other: Int3) -> i64 {
        i64::from((self.x - other.x).abs())
            + i64::from((self.y - other.y).abs())
            + i64::from((self.z - other.z).abs())
    }
}

impl Add for Int3 {
    type Output = Int3;

    fn add(self, rhs: Int3) -> Int3 {
        Int3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Int3 {
    type Output = Int3;

    fn sub(self, rhs: Int3) -> Int3 {
        Int3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// Distance estimate used to order the open list.
///
/// All variants are admissible for graphs whose connection costs are
/// `cost_magnitude` distances, so the search finds cost-optimal paths.
/// `None` degenerates to Dijkstra's algorithm, as does any variant with a
/// scale of zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Heuristic {
    /// No estimate; expands nodes in pure cost order.
    None,
    /// Straight-line distance.
    #[default]
    Euclidean,
    /// Sum of per-axis distances.
    Manhattan,
    /// Eight-directional movement estimate over the x/z plane: diagonal
    /// steps cost 14/10 of a straight step, the y axis is added straight.
    DiagonalManhattan,
}

impl Heuristic {
    /// Estimate the remaining cost from `from` to `to`, scaled by `scale`
    /// and rounded down to an integer.
    pub fn estimate(self, from: Int3, to: Int3, scale: f32) -> u32 {
        let d = to - from;
        let raw: i64 = match self {
            Heuristic::None => 0,
            Heuristic::Euclidean => d.magnitude() as i64,
            Heuristic::Manhattan => d.manhattan_distance(Int3::default()),
            Heuristic::DiagonalManhattan => {
                let dx = i64::from(d.x.abs());
                let dy = i64::from(d.y.abs());
                let dz = i64::from(d.z.abs());
                let diag = dx.min(dz);
                let straight = dx.max(dz) - diag;
                (14 * diag) / 10 + straight + dy
            }
        };
        let scaled = (raw as f64 * f64::from(scale)).max(0.0);
        if scaled >= u32::MAX as f64 {
            u32::MAX
        } else {
            scaled as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_world_rounds_to_sub_units() {
        let p = Int3::from_world(1.0, -0.5, 0.0015);
        assert_eq!(p, Int3::new(1000, -500, 2));
    }

    #[test]
    fn cost_magnitude_matches_euclidean() {
        // 3-4-5 triangle scaled to sub-units.
        let d = Int3::new(3000, 0, 4000);
        assert_eq!(d.cost_magnitude(), 5000);
    }

    #[test]
    fn heuristic_zero_scale_is_dijkstra() {
        let a = Int3::new(0, 0, 0);
        let b = Int3::new(5000, 2000, -3000);
        for h in [
            Heuristic::Euclidean,
            Heuristic::Manhattan,
            Heuristic::DiagonalManhattan,
        ] {
            assert_eq!(h.estimate(a, b, 0.0), 0);
        }
    }

    #[test]
    fn heuristic_none_is_zero() {
        let a = Int3::new(0, 0, 0);
        let b = Int3::new(5000, 0, 0);
        assert_eq!(Heuristic::None.estimate(a, b, 1.0), 0);
    }

    #[test]
    fn euclidean_never_exceeds_manhattan() {
        let a = Int3::new(0, 0, 0);
        let cases = [
            Int3::new(1000, 0, 0),
            Int3::new(1000, 1000, 0),
            Int3::new(-3000, 2000, 7000),
            Int3::new(500, -500, 500),
        ];
        for b in cases {
            let e = Heuristic::Euclidean.estimate(a, b, 1.0);
            let m = Heuristic::Manhattan.estimate(a, b, 1.0);
            assert!(e <= m, "euclidean {e} > manhattan {m} for {b:?}");
        }
    }

    #[test]
    fn diagonal_manhattan_on_pure_diagonal() {
        let a = Int3::new(0, 0, 0);
        let b = Int3::new(1000, 0, 1000);
        // 14/10 of one straight step.
        assert_eq!(Heuristic::DiagonalManhattan.estimate(a, b, 1.0), 1400);
    }

    #[test]
    fn position_and_heuristic_serialize() {
        let p = Int3::new(1000, -500, 2);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(serde_json::from_str::<Int3>(&json).unwrap(), p);

        let h: Heuristic = serde_json::from_str("\"DiagonalManhattan\"").unwrap();
        assert_eq!(h, Heuristic::DiagonalManhattan);
    }

    #[test]
    fn heuristic_is_symmetric() {
        let a = Int3::new(1000, 2000, 3000);
        let b = Int3::new(-4000, 0, 500);
        for h in [
            Heuristic::Euclidean,
            Heuristic::Manhattan,
            Heuristic::DiagonalManhattan,
        ] {
            assert_eq!(h.estimate(a, b, 1.0), h.estimate(b, a, 1.0));
        }
    }
}
