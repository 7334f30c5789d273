use super::geometry::angle_between;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};

/// A piecewise-linear curve parameterized by arc length.
///
/// Used as the screw axis of a helix: the vertices are a thinned sequence of
/// window centroids, and positions along the axis are addressed by the
/// distance travelled from the first vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    nodes: Vec<Point3<f64>>,
}

impl Curve {
    pub fn new(nodes: Vec<Point3<f64>>) -> Self {
        Self { nodes }
    }

    /// Keeps every `flatten`-th point, always retaining the first and last.
    pub fn flattened(points: &[Point3<f64>], flatten: usize) -> Self {
        let Some((last, rest)) = points.split_last() else {
            return Self::new(Vec::new());
        };
        let mut nodes: Vec<_> = rest.iter().step_by(flatten.max(1)).copied().collect();
        nodes.push(*last);
        Self::new(nodes)
    }

    pub fn nodes(&self) -> &[Point3<f64>] {
        &self.nodes
    }

    pub fn length(&self) -> f64 {
        self.nodes
            .iter()
            .tuple_windows()
            .map(|(a, b)| (b - a).norm())
            .sum()
    }

    fn segment_at(&self, mut t: f64) -> Option<(usize, f64, Vector3<f64>)> {
        for (i, pair) in self.nodes.windows(2).enumerate() {
            let segment = pair[1] - pair[0];
            let length = segment.norm();
            if length <= f64::EPSILON {
                continue;
            }
            if length > t {
                return Some((i, t / length, segment));
            }
            t -= length;
        }
        None
    }

    /// The point at arc length `t`, or `None` past the end of the curve.
    ///
    /// Negative `t` extrapolates backwards along the first segment.
    pub fn point_at(&self, t: f64) -> Option<Point3<f64>> {
        self.segment_at(t)
            .map(|(i, fraction, segment)| self.nodes[i] + segment * fraction)
    }

    /// The (unnormalized) direction of the segment containing arc length `t`.
    pub fn direction_at(&self, t: f64) -> Option<Vector3<f64>> {
        self.segment_at(t).map(|(_, _, segment)| segment)
    }

    /// Finds the first place where the curve turns by more than `max_angle`
    /// degrees within `window` consecutive vertices.
    ///
    /// Returns the vertex half a window behind the offending one.
    pub fn first_excessive_bend(&self, max_angle: f64, window: usize) -> Option<Point3<f64>> {
        let window = window.max(1);
        let mut recent = vec![0.0; window];
        for i in 1..self.nodes.len().saturating_sub(1) {
            let incoming = self.nodes[i] - self.nodes[i - 1];
            let outgoing = self.nodes[i + 1] - self.nodes[i];
            recent[i % window] = angle_between(&incoming, &outgoing);
            if recent.iter().sum::<f64>() > max_angle {
                return Some(self.nodes[i.saturating_sub(window / 2)]);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn flattened_keeps_every_nth_and_the_last_point() {
        let points: Vec<_> = (0..10).map(|i| p(i as f64, 0.0, 0.0)).collect();
        let curve = Curve::flattened(&points, 4);
        assert_eq!(
            curve.nodes(),
            &[p(0.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(8.0, 0.0, 0.0), p(9.0, 0.0, 0.0)]
        );
    }

    #[test]
    fn point_at_walks_across_segments() {
        let curve = Curve::new(vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 3.0, 0.0)]);
        assert_eq!(curve.point_at(1.0), Some(p(1.0, 0.0, 0.0)));
        assert_eq!(curve.point_at(3.0), Some(p(2.0, 1.0, 0.0)));
        assert_eq!(curve.point_at(5.0), None);
        assert_eq!(curve.length(), 5.0);
    }

    #[test]
    fn negative_arc_length_extrapolates_first_segment() {
        let curve = Curve::new(vec![p(0.0, 0.0, 0.0), p(0.0, 0.0, 4.0)]);
        assert_eq!(curve.point_at(-1.5), Some(p(0.0, 0.0, -1.5)));
        assert_eq!(curve.direction_at(-1.5), Some(Vector3::new(0.0, 0.0, 4.0)));
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let curve = Curve::new(vec![
            p(0.0, 0.0, 0.0),
            p(0.0, 0.0, 0.0),
            p(0.0, 2.0, 0.0),
        ]);
        assert_eq!(curve.point_at(-1.0), Some(p(0.0, -1.0, 0.0)));
        assert_eq!(curve.point_at(1.0), Some(p(0.0, 1.0, 0.0)));
        assert_eq!(curve.first_excessive_bend(80.0, 3), None);
    }

    #[test]
    fn right_angle_turns_accumulate_over_the_window() {
        // Two 45 degree turns in a row exceed 80 degrees together.
        let curve = Curve::new(vec![
            p(0.0, 0.0, 0.0),
            p(4.0, 0.0, 0.0),
            p(8.0, 4.0, 0.0),
            p(8.0, 8.0, 0.0),
            p(8.0, 12.0, 0.0),
        ]);
        assert_eq!(curve.first_excessive_bend(80.0, 3), Some(p(4.0, 0.0, 0.0)));
        assert_eq!(curve.first_excessive_bend(95.0, 3), None);
    }

    #[test]
    fn straight_curve_has_no_excessive_bend() {
        let points: Vec<_> = (0..20).map(|i| p(0.0, 0.0, i as f64)).collect();
        assert_eq!(Curve::flattened(&points, 4).first_excessive_bend(80.0, 3), None);
    }
}
