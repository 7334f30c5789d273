use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer grid location inside a confidence volume.
///
/// Voxels are the identity of every point the walker places and every node of
/// the trace graph. They are totally ordered (x, then y, then z) so that any
/// collection keyed by voxels iterates deterministically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Voxel {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Voxel {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the voxel displaced by the given integer offsets.
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Euclidean distance between two voxel centers, in voxel units.
    pub fn distance(&self, other: &Voxel) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Voxel) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        let dz = (self.z - other.z) as f64;
        dx * dx + dy * dy + dz * dz
    }

    /// The voxel center as a point in grid space (no origin applied).
    pub fn to_point(&self) -> Point3<f64> {
        Point3::new(self.x as f64, self.y as f64, self.z as f64)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x as f64, self.y as f64, self.z as f64]
    }

    /// Physical position of the voxel for a volume whose grid starts at `origin`.
    pub fn to_physical(&self, origin: &Vector3<f64>) -> Point3<f64> {
        self.to_point() + origin
    }

    /// Maps a physical position back onto the grid.
    ///
    /// Coordinates are rounded rather than truncated so that positions which went
    /// through a fixed-precision text representation land on the voxel they came from.
    pub fn from_physical(point: &Point3<f64>, origin: &Vector3<f64>) -> Self {
        let grid = point - origin;
        Self::new(
            grid.x.round() as i32,
            grid.y.round() as i32,
            grid.z.round() as i32,
        )
    }

    /// The six face-adjacent neighbors.
    pub fn face_neighbors(&self) -> [Voxel; 6] {
        [
            self.offset(0, 0, -1),
            self.offset(0, 0, 1),
            self.offset(0, -1, 0),
            self.offset(0, 1, 0),
            self.offset(-1, 0, 0),
            self.offset(1, 0, 0),
        ]
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<[i32; 3]> for Voxel {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}
