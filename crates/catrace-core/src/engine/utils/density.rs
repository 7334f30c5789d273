use crate::core::models::volume::Volume;
use crate::core::utils::geometry::voxels_near_segment;
use itertools::Itertools;
use nalgebra::Point3;

/// Running sum of volume values over a set of voxels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DensityTally {
    pub total: f64,
    pub count: usize,
}

impl DensityTally {
    /// Adds every in-bounds voxel within `radius` of `samples` points on `a`-`b`.
    pub fn add_segment(
        &mut self,
        volume: &Volume,
        a: &Point3<f64>,
        b: &Point3<f64>,
        radius: f64,
        samples: usize,
    ) {
        for voxel in voxels_near_segment(a, b, radius, samples) {
            if let Some(value) = volume.get(&voxel) {
                self.total += value as f64;
                self.count += 1;
            }
        }
    }

    /// Mean value, or 0 when nothing was sampled.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Mean value of `volume` in a cylinder around the segment `a`-`b`.
pub fn segment_density(
    volume: &Volume,
    a: &Point3<f64>,
    b: &Point3<f64>,
    radius: f64,
    samples: usize,
) -> f64 {
    let mut tally = DensityTally::default();
    tally.add_segment(volume, a, b, radius, samples);
    tally.mean()
}

/// Mean value of `volume` around a polyline.
///
/// Each segment contributes its own voxels; a voxel near two segments counts twice.
pub fn path_density(volume: &Volume, points: &[Point3<f64>], radius: f64, samples: usize) -> f64 {
    let mut tally = DensityTally::default();
    for (a, b) in points.iter().tuple_windows() {
        tally.add_segment(volume, a, b, radius, samples);
    }
    tally.mean()
}
