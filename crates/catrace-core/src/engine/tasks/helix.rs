use crate::core::models::chain::{Span, TraceChain};
use crate::core::utils::curve::Curve;
use crate::core::utils::geometry::centroid;
use crate::core::utils::minimize::nelder_mead;
use crate::engine::config::HelixConfig;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;
use std::f64::consts::TAU;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// The screw axis of a span turns too sharply to carry one helix.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Screw axis bends too sharply near {at}")]
pub struct CurvatureViolation {
    /// Axis vertex at which the span should be split.
    pub at: Point3<f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("Helix spans were split more than {limit} times in one chain")]
    SplitLimit { limit: usize },
}

/// An idealized helix wound around a piecewise-linear screw axis.
///
/// Model point `k` sits at arc length `t = shift + k * gap` on the axis,
/// displaced by `radius` in the plane orthogonal to the local axis direction
/// at phase `pitch * t - shift + rotation`.
#[derive(Debug, Clone, PartialEq)]
pub struct HelixModel {
    pub axis: Curve,
    pub radius: f64,
    pub pitch: f64,
    pub gap: f64,
    pub shift: f64,
    pub rotation: f64,
}

/// Orthonormal in-plane axes for a screw axis running along `direction`.
fn frame(direction: &Vector3<f64>) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let z = -direction.try_normalize(f64::EPSILON)?;
    let y = -z
        .cross(&Vector3::x())
        .try_normalize(1e-9)
        .or_else(|| z.cross(&Vector3::y()).try_normalize(1e-9))?;
    let x = -z.cross(&y);
    Some((x, y))
}

impl HelixModel {
    pub fn new(axis: Curve, config: &HelixConfig) -> Self {
        Self {
            axis,
            radius: config.radius,
            pitch: config.pitch,
            gap: config.gap,
            shift: 0.0,
            rotation: 0.0,
        }
    }

    pub fn with_phase(mut self, shift: f64, rotation: f64) -> Self {
        self.shift = shift;
        self.rotation = rotation;
        self
    }

    pub fn points(&self) -> Vec<Point3<f64>> {
        self.points_with(self.shift, self.rotation)
    }

    fn points_with(&self, shift: f64, rotation: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        if !shift.is_finite() || !rotation.is_finite() || shift < -self.axis.length() {
            return points;
        }
        let mut t = shift;
        while let (Some(center), Some(direction)) = (self.axis.point_at(t), self.axis.direction_at(t)) {
            if let Some((x, y)) = frame(&direction) {
                let phase = self.pitch * t - shift + rotation;
                points.push(center + x * (self.radius * phase.sin()) + y * (self.radius * phase.cos()));
            }
            t += self.gap;
        }
        points
    }

    /// Mean distance from each of `originals` to its nearest model point.
    pub fn offset_to(&self, originals: &[Point3<f64>]) -> f64 {
        mean_offset(originals, &self.points())
    }

    /// Searches shift and rotation from three starting phases and returns the
    /// best model with its offset.
    pub fn optimize(self, originals: &[Point3<f64>], config: &HelixConfig) -> (Self, f64) {
        let options = config.optimizer_options();
        let starts = [[-self.gap, -TAU], [0.0, 0.0], [self.gap, TAU]];
        let best = starts
            .into_iter()
            .map(|start| {
                nelder_mead(
                    |x: &[f64; 2]| mean_offset(originals, &self.points_with(x[0], x[1])),
                    start,
                    &options,
                )
            })
            .min_by(|a, b| a.value.total_cmp(&b.value));

        match best {
            Some(minimum) => {
                let model = self.with_phase(minimum.x[0], minimum.x[1]);
                let offset = model.offset_to(originals);
                (model, offset)
            }
            None => {
                let offset = self.offset_to(originals);
                (self, offset)
            }
        }
    }
}

fn mean_offset(originals: &[Point3<f64>], model: &[Point3<f64>]) -> f64 {
    if originals.is_empty() || model.is_empty() {
        return f64::INFINITY;
    }
    let entries: Vec<[f64; 3]> = model.iter().map(|p| [p.x, p.y, p.z]).collect();
    let tree: KdTree<f64, 3> = (&entries).into();
    let total: f64 = originals
        .iter()
        .map(|p| {
            tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z])
                .distance
                .sqrt()
        })
        .sum();
    total / originals.len() as f64
}

/// Estimates the screw axis of `points` from sliding-window centroids.
///
/// Windows grow up to `interval_size` points along the span and then shrink
/// at its tail, always holding at least `min_interval_size` points. Every
/// `flatten`-th centroid becomes an axis vertex.
///
/// The tail stops at `min_interval_size` points rather than one below it: a
/// two-point centroid sits about `radius · cos(50°)` off the axis of an ideal
/// helix and would bend the final axis segment.
pub fn screw_axis(points: &[Point3<f64>], config: &HelixConfig) -> Curve {
    let mut centroids = Vec::new();
    let mut window: VecDeque<Point3<f64>> = VecDeque::with_capacity(config.interval_size + 1);
    for &point in points {
        window.push_back(point);
        if window.len() > config.interval_size {
            window.pop_front();
        }
        if window.len() >= config.min_interval_size {
            centroids.extend(centroid(window.make_contiguous()));
        }
    }
    while window.len() > config.min_interval_size {
        window.pop_front();
        centroids.extend(centroid(window.make_contiguous()));
    }
    Curve::flattened(&centroids, config.flatten)
}

/// Result of fitting one span.
#[derive(Debug, Clone)]
pub struct HelixFit {
    pub model: HelixModel,
    pub offset: f64,
    /// Whether the model fell inside the acceptance window.
    pub accepted: bool,
    /// The points that should stand in for the span.
    pub points: Vec<Point3<f64>>,
}

/// Fits an idealized helix to `points`.
///
/// # Errors
///
/// Returns [`CurvatureViolation`] when the estimated screw axis bends by more
/// than `max_bend_angle` within `bend_window` vertices.
pub fn fit(points: &[Point3<f64>], config: &HelixConfig) -> Result<HelixFit, CurvatureViolation> {
    let axis = screw_axis(points, config);
    if let Some(at) = axis.first_excessive_bend(config.max_bend_angle, config.bend_window) {
        return Err(CurvatureViolation { at });
    }

    let (model, offset) = HelixModel::new(axis, config).optimize(points, config);
    let accepted = offset > config.min_offset && offset <= config.max_offset;
    let replacement = if accepted {
        let edge = config.kept_edge_points().min(points.len() / 2);
        let mut replaced = points[..edge].to_vec();
        replaced.extend(model.points());
        replaced.extend_from_slice(&points[points.len() - edge..]);
        replaced
    } else {
        points.to_vec()
    };
    trace!(
        "Helix fit over {} points: offset {:.3}, accepted {}.",
        points.len(),
        offset,
        accepted
    );

    Ok(HelixFit {
        model,
        offset,
        accepted,
        points: replacement,
    })
}

/// Counts of what [`fit_chain`] did to one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FitSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub splits: usize,
}

/// Splits `chain.helices[index]` at the point closest to `at`.
///
/// Both halves share the split point.
fn split_span(chain: &mut TraceChain, index: usize, at: &Point3<f64>) {
    let span = chain.helices[index];
    let mut closest = span.start;
    let mut best = f64::INFINITY;
    for j in span.start..span.end {
        let distance = (chain.points[j] - at).norm();
        if distance < best {
            best = distance;
            closest = j;
        }
    }
    if closest == span.start {
        closest += 1;
    }
    chain.helices.splice(
        index..=index,
        [Span::new(span.start, closest), Span::new(closest, span.end)],
    );
}

/// Fits every helix span of `chain` and substitutes accepted models.
///
/// Spans whose screw axis is too curved are split and retried; later
/// annotations shift with every change in chain length.
pub fn fit_chain(chain: &mut TraceChain, config: &HelixConfig) -> Result<FitSummary, FitError> {
    let mut summary = FitSummary::default();
    let mut i = 0;
    while i < chain.helices.len() {
        let span = chain.helices[i];
        if span.len() < config.min_helix_length {
            summary.skipped += 1;
            i += 1;
            continue;
        }
        if span.end >= chain.len() || span.is_empty() {
            warn!(
                "Helix span {:?} does not fit a chain of {} points; skipping.",
                span,
                chain.len()
            );
            summary.skipped += 1;
            i += 1;
            continue;
        }

        match fit(&chain.points[span.start..=span.end], config) {
            Ok(result) => {
                if result.accepted {
                    let delta = chain.splice(span, result.points);
                    trace!("Replaced helix {:?} (length change {}).", span, delta);
                    summary.accepted += 1;
                } else {
                    summary.rejected += 1;
                }
                i += 1;
            }
            Err(violation) => {
                summary.splits += 1;
                if summary.splits > config.max_splits {
                    return Err(FitError::SplitLimit {
                        limit: config.max_splits,
                    });
                }
                trace!("Splitting helix {:?}: {}", span, violation);
                split_span(chain, i, &violation.at);
            }
        }
    }
    debug!("Helix fitting finished: {:?}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a helix around the z axis, `step` radians and `rise` Å per point.
    fn ideal_helix(n: usize, radius: f64, step: f64, rise: f64, phase: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|k| {
                let angle = step * k as f64 + phase;
                Point3::new(radius * angle.cos(), radius * angle.sin(), rise * k as f64)
            })
            .collect()
    }

    fn model_step(config: &HelixConfig) -> f64 {
        config.pitch * config.gap
    }

    #[test]
    fn screw_axis_of_a_short_run_has_shrinking_tail_windows() {
        let points: Vec<_> = (0..5).map(|i| Point3::new(0.0, 0.0, i as f64)).collect();
        let config = HelixConfig {
            flatten: 1,
            ..HelixConfig::default()
        };
        let axis = screw_axis(&points, &config);
        // Front windows end at points 2, 3, 4; tail windows stop at three points.
        let z: Vec<f64> = axis.nodes().iter().map(|p| p.z).collect();
        assert_eq!(z, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn known_axis_and_phase_give_zero_offset() {
        let config = HelixConfig::default();
        let axis = Curve::new(vec![Point3::origin(), Point3::new(0.0, 0.0, 30.0)]);
        let truth = HelixModel::new(axis.clone(), &config).with_phase(0.3, 0.5);
        let points = truth.points();
        assert!(points.len() > 15);
        assert!(truth.offset_to(&points) < 1e-6);

        let (recovered, offset) = HelixModel::new(axis, &config).optimize(&points, &config);
        assert!(offset < 1e-4, "offset {offset}, model {recovered:?}");
    }

    #[test]
    fn model_points_sit_at_the_configured_radius() {
        let config = HelixConfig::default();
        let axis = Curve::new(vec![Point3::origin(), Point3::new(0.0, 0.0, 20.0)]);
        let points = HelixModel::new(axis, &config).points();
        for p in &points {
            assert!(((p.x * p.x + p.y * p.y).sqrt() - config.radius).abs() < 1e-9);
        }
        assert_eq!(points.len(), 14);
    }

    #[test]
    fn axis_parallel_to_x_still_has_a_frame() {
        let config = HelixConfig::default();
        let axis = Curve::new(vec![Point3::origin(), Point3::new(12.0, 0.0, 0.0)]);
        let points = HelixModel::new(axis, &config).points();
        assert!(!points.is_empty());
        for p in &points {
            assert!(((p.y * p.y + p.z * p.z).sqrt() - config.radius).abs() < 1e-9);
        }
    }

    #[test]
    fn ideal_helix_fits_without_splitting() {
        let config = HelixConfig::default();
        let points = ideal_helix(37, 2.3, 100f64.to_radians(), 1.5, 0.0);
        let mut chain = TraceChain::new(points);
        chain.helices = vec![Span::new(0, 36)];

        let summary = fit_chain(&mut chain, &config).unwrap();

        assert_eq!(summary.splits, 0);
        assert_eq!(summary.accepted + summary.rejected, 1);
        assert_eq!(chain.helices.len(), 1);
        assert_eq!(chain.helices[0].end, chain.len() - 1);
    }

    #[test]
    fn accepted_fit_shifts_later_annotations() {
        let config = HelixConfig::default();
        let step = model_step(&config);
        let helix = ideal_helix(37, 3.0, step, config.gap, -step);
        let mut points = vec![Point3::new(9.0, 0.0, -6.0), Point3::new(6.0, 0.0, -3.0)];
        points.extend(helix);
        points.extend((0..6).map(|i| Point3::new(6.0 + 3.0 * i as f64, 0.0, 60.0)));
        let mut chain = TraceChain::new(points);
        chain.helices = vec![Span::new(2, 38)];
        chain.sheets = vec![Span::new(40, 43)];

        let summary = fit_chain(&mut chain, &config).unwrap();

        assert_eq!(summary.accepted, 1, "{summary:?}");
        let delta = chain.len() as isize - 45;
        let shifted = |i: usize| (i as isize + delta) as usize;
        assert_eq!(chain.helices, vec![Span::new(2, shifted(38))]);
        assert_eq!(chain.sheets, vec![Span::new(shifted(40), shifted(43))]);
        assert_eq!(chain.points[0], Point3::new(9.0, 0.0, -6.0));
    }

    fn hairpin() -> TraceChain {
        let config = HelixConfig::default();
        let step = model_step(&config);
        let mut points = ideal_helix(20, 2.3, step, config.gap, 0.0);
        let down = ideal_helix(20, 2.3, step, -config.gap, 0.0)
            .into_iter()
            .map(|p| Point3::new(p.x + 12.0, p.y, p.z + 19.0 * config.gap));
        points.extend(down);
        let mut chain = TraceChain::new(points);
        chain.helices = vec![Span::new(0, 39)];
        chain
    }

    #[test]
    fn hairpin_is_split_into_separate_helices() {
        let mut chain = hairpin();
        let summary = fit_chain(&mut chain, &HelixConfig::default()).unwrap();

        assert!(summary.splits >= 1);
        assert!(chain.helices.len() >= 2);
        for pair in chain.helices.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn exceeding_the_split_limit_is_an_error() {
        let mut chain = hairpin();
        let config = HelixConfig {
            max_splits: 0,
            ..HelixConfig::default()
        };
        assert_eq!(
            fit_chain(&mut chain, &config),
            Err(FitError::SplitLimit { limit: 0 })
        );
    }

    #[test]
    fn short_spans_are_left_alone() {
        let points = ideal_helix(12, 2.3, 1.7, 1.5, 0.0);
        let mut chain = TraceChain::new(points.clone());
        chain.helices = vec![Span::new(0, 8)];
        let summary = fit_chain(&mut chain, &HelixConfig::default()).unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(chain.points, points);
    }

    #[test]
    fn split_moves_off_the_span_start() {
        let points: Vec<_> = (0..12).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let mut chain = TraceChain::new(points);
        chain.helices = vec![Span::new(0, 11)];
        split_span(&mut chain, 0, &Point3::new(-5.0, 0.0, 0.0));
        assert_eq!(chain.helices, vec![Span::new(0, 1), Span::new(1, 11)]);
    }
}
