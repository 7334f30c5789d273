use crate::core::models::voxel::Voxel;
use nalgebra::{Point3, Vector3};

/// Returns `v` scaled to unit length, or the zero vector if `v` has no length.
pub fn normalize_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Angle between two vectors in degrees.
///
/// A zero-length input yields 0°.
pub fn angle_between(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let (u1, u2) = match (v1.try_normalize(f64::EPSILON), v2.try_normalize(f64::EPSILON)) {
        (Some(u1), Some(u2)) => (u1, u2),
        _ => return 0.0,
    };
    u1.dot(&u2).clamp(-1.0, 1.0).acos().to_degrees()
}

/// The angle `a`-`vertex`-`c` in degrees.
pub fn bend_angle(a: &Point3<f64>, vertex: &Point3<f64>, c: &Point3<f64>) -> f64 {
    angle_between(&(a - vertex), &(c - vertex))
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// `count` evenly spaced points from `a` to `b`, both ends included.
pub fn segment_samples(a: &Point3<f64>, b: &Point3<f64>, count: usize) -> Vec<Point3<f64>> {
    match count {
        0 => Vec::new(),
        1 => vec![*a],
        _ => {
            let steps = (count - 1) as f64;
            (0..count)
                .map(|i| a + (b - a) * (i as f64 / steps))
                .collect()
        }
    }
}

/// Every voxel whose center lies within `radius` of at least one of `samples`
/// evenly spaced points on the segment `a`-`b`.
///
/// The result is in x-major order and contains each voxel once. Bounds are not
/// checked; callers filter against the volume they read from.
pub fn voxels_near_segment(
    a: &Point3<f64>,
    b: &Point3<f64>,
    radius: f64,
    samples: usize,
) -> Vec<Voxel> {
    let points = segment_samples(a, b, samples);
    if points.is_empty() || radius < 0.0 {
        return Vec::new();
    }
    let radius_sq = radius * radius;
    let lo = a.inf(b);
    let hi = a.sup(b);
    let lower = |v: f64| (v - radius).floor() as i32;
    let upper = |v: f64| (v + radius).ceil() as i32;

    let mut voxels = Vec::new();
    for x in lower(lo.x)..=upper(hi.x) {
        for y in lower(lo.y)..=upper(hi.y) {
            for z in lower(lo.z)..=upper(hi.z) {
                let voxel = Voxel::new(x, y, z);
                let center = voxel.to_point();
                if points
                    .iter()
                    .any(|p| (p - center).norm_squared() <= radius_sq)
                {
                    voxels.push(voxel);
                }
            }
        }
    }
    voxels
}

/// Integer offsets of every voxel within `radius` of the origin.
pub fn sphere_offsets(radius: f64, inclusive: bool) -> Vec<Voxel> {
    let reach = radius.floor() as i32;
    let radius_sq = radius * radius;
    let mut offsets = Vec::new();
    for x in -reach..=reach {
        for y in -reach..=reach {
            for z in -reach..=reach {
                let d = (x * x + y * y + z * z) as f64;
                if d < radius_sq || (inclusive && d == radius_sq) {
                    offsets.push(Voxel::new(x, y, z));
                }
            }
        }
    }
    offsets
}
