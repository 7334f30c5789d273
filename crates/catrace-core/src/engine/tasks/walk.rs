use crate::core::models::trace::{Trace, TraceEnd};
use crate::core::models::volume::Volume;
use crate::core::models::voxel::Voxel;
use crate::core::utils::geometry::{bend_angle, sphere_offsets};
use crate::engine::config::WalkConfig;
use crate::engine::utils::connectivity::reachable_within;
use crate::engine::utils::density::segment_density;
use kiddo::{KdTree, SquaredEuclidean};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Walks the Ca confidence field and cleans up the resulting traces.
///
/// `working` is consumed as the walk proceeds; `snapshot` must hold the
/// untouched Ca values and is used for candidate filtering and scoring.
pub fn walk(
    working: &mut Volume,
    snapshot: &Volume,
    backbone: &Volume,
    config: &WalkConfig,
) -> Vec<Trace> {
    let mut traces = walk_traces(working, snapshot, backbone, config);
    cleanup(&mut traces, config);
    traces
}

/// Runs the greedy walk without the endpoint and overlay cleanup.
pub fn walk_traces(
    working: &mut Volume,
    snapshot: &Volume,
    backbone: &Volume,
    config: &WalkConfig,
) -> Vec<Trace> {
    let mut walker = Walker::new(working, snapshot, backbone, config);
    walker.run();
    walker.traces
}

struct Walker<'a> {
    working: &'a mut Volume,
    snapshot: &'a Volume,
    backbone: &'a Volume,
    config: &'a WalkConfig,
    traces: Vec<Trace>,
    placements: HashMap<Voxel, usize>,
    zero_offsets: Vec<Voxel>,
}

impl<'a> Walker<'a> {
    fn new(
        working: &'a mut Volume,
        snapshot: &'a Volume,
        backbone: &'a Volume,
        config: &'a WalkConfig,
    ) -> Self {
        Self {
            working,
            snapshot,
            backbone,
            config,
            traces: Vec::new(),
            placements: HashMap::new(),
            zero_offsets: sphere_offsets(config.zero_radius, false),
        }
    }

    fn run(&mut self) {
        let mut iterations = 0;
        while let Some(seed) = self.next_seed() {
            if iterations >= self.config.max_iterations {
                warn!(
                    "Walk stopped after reaching the iteration cap of {}.",
                    self.config.max_iterations
                );
                break;
            }
            iterations += 1;

            self.consume(seed);
            match self.best_candidate(seed) {
                Some(next) => {
                    self.consume(next);
                    self.place(seed, next);
                }
                None => trace!("Seed {} has no admissible neighbor.", seed),
            }
        }
        debug!(
            "Walk finished after {} iterations with {} traces.",
            iterations,
            self.traces.len()
        );
    }

    /// Picks the trace endpoint with the highest remaining value, falling back
    /// to the global maximum of the working copy.
    fn next_seed(&self) -> Option<Voxel> {
        let mut best: Option<(Voxel, f32)> = None;
        for trace in &self.traces {
            for end in [trace.first(), trace.last()].into_iter().flatten() {
                let value = self.working.value(end);
                if value > 0.0 && best.is_none_or(|(_, current)| value > current) {
                    best = Some((*end, value));
                }
            }
        }
        if let Some((seed, _)) = best {
            return Some(seed);
        }

        let (seed, value) = self.working.argmax()?;
        (value > self.config.min_start_confidence).then_some(seed)
    }

    /// Marks a voxel as placed and clears the working copy around it.
    fn consume(&mut self, voxel: Voxel) {
        let count = self.placements.entry(voxel).or_insert(0);
        *count += 1;
        let clear_center = *count >= 2;
        for offset in &self.zero_offsets {
            let is_center = offset.x == 0 && offset.y == 0 && offset.z == 0;
            if is_center && !clear_center {
                continue;
            }
            self.working
                .set(&voxel.offset(offset.x, offset.y, offset.z), 0.0);
        }
    }

    fn best_candidate(&self, seed: Voxel) -> Option<Voxel> {
        let cfg = self.config;
        let own_traces: Vec<&Trace> = self.traces.iter().filter(|t| t.contains(&seed)).collect();
        let nearby: Vec<Voxel> = own_traces
            .iter()
            .flat_map(|t| t.neighborhood(&seed, cfg.exclusion_span))
            .collect();
        let direction = self
            .extension_target(seed)
            .map(|(index, _)| &self.traces[index])
            .or(own_traces.first().copied())
            .and_then(|t| t.direction_neighbor(&seed));

        let exclusion_sq = cfg.exclusion_radius * cfg.exclusion_radius;
        let (min_sq, max_sq) = (
            cfg.min_distance * cfg.min_distance,
            cfg.max_distance * cfg.max_distance,
        );
        let mut reachable: Option<HashMap<Voxel, usize>> = None;
        let mut best: Option<(Voxel, f64)> = None;

        let r = cfg.search_radius;
        for dx in -r..=r {
            for dy in -r..=r {
                for dz in -r..=r {
                    let candidate = seed.offset(dx, dy, dz);
                    let d_sq = seed.distance_squared(&candidate);
                    if d_sq < min_sq || d_sq > max_sq {
                        continue;
                    }
                    if !self.snapshot.is_positive(&candidate)
                        || !self.backbone.is_positive(&candidate)
                    {
                        continue;
                    }
                    if own_traces.iter().any(|t| t.contains(&candidate)) {
                        continue;
                    }
                    if nearby
                        .iter()
                        .any(|p| p.distance_squared(&candidate) < exclusion_sq)
                    {
                        continue;
                    }
                    let reached = reachable.get_or_insert_with(|| {
                        reachable_within(self.backbone, seed, cfg.max_bfs_steps)
                    });
                    if !reached.contains_key(&candidate) {
                        continue;
                    }
                    if let Some(previous) = direction {
                        let angle = bend_angle(
                            &previous.to_point(),
                            &seed.to_point(),
                            &candidate.to_point(),
                        );
                        if angle <= cfg.min_bend_angle {
                            continue;
                        }
                    }

                    let score = segment_density(
                        self.snapshot,
                        &seed.to_point(),
                        &candidate.to_point(),
                        cfg.cylinder_radius,
                        cfg.cylinder_samples,
                    );
                    if best.is_none_or(|(_, current)| score > current) {
                        best = Some((candidate, score));
                    }
                }
            }
        }

        best.filter(|(_, score)| *score > 0.0)
            .map(|(candidate, _)| candidate)
    }

    /// The first trace that has `seed` as an endpoint.
    fn extension_target(&self, seed: Voxel) -> Option<(usize, TraceEnd)> {
        self.traces
            .iter()
            .enumerate()
            .find_map(|(i, t)| t.end_of(&seed).map(|end| (i, end)))
    }

    fn place(&mut self, seed: Voxel, next: Voxel) {
        match self.extension_target(seed) {
            Some((index, end)) => {
                trace!("Extending trace {} at {:?} with {}.", index, end, next);
                self.traces[index].extend_at(end, next);
            }
            None => {
                trace!("Starting trace {} with {} -> {}.", self.traces.len(), seed, next);
                self.traces.push(Trace::from_pair(seed, next));
            }
        }
    }
}

/// Snaps trace endpoints onto nearby traces, then overlays coincident points.
pub fn cleanup(traces: &mut [Trace], config: &WalkConfig) {
    let snapped = snap_endpoints(traces, config.snap_distance);
    let overlaid = overlay_points(traces, config.snap_distance);
    debug!(
        "Trace cleanup snapped {} endpoints and overlaid {} points.",
        snapped, overlaid
    );
}

struct PointIndex {
    tree: KdTree<f64, 3>,
    entries: Vec<(usize, usize, Voxel)>,
}

impl PointIndex {
    fn new() -> Self {
        Self {
            tree: KdTree::new(),
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, trace: usize, index: usize, voxel: Voxel) {
        self.tree.add(&voxel.to_array(), self.entries.len() as u64);
        self.entries.push((trace, index, voxel));
    }
}

/// Replaces each endpoint with the nearest point of another trace closer than
/// `distance`. Returns the number of replaced endpoints.
fn snap_endpoints(traces: &mut [Trace], distance: f64) -> usize {
    let mut index = PointIndex::new();
    for (t, trace) in traces.iter().enumerate() {
        for (i, voxel) in trace.iter().enumerate() {
            index.insert(t, i, *voxel);
        }
    }
    let limit_sq = distance * distance;

    let mut snapped = 0;
    for t in 0..traces.len() {
        let len = traces[t].len();
        if len == 0 {
            continue;
        }
        let ends = if len == 1 { vec![0] } else { vec![0, len - 1] };
        for position in ends {
            let Some(&end) = traces[t].get(position) else {
                continue;
            };
            let mut hits =
                index.tree.within_unsorted::<SquaredEuclidean>(&end.to_array(), limit_sq);
            hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.item.cmp(&b.item)));

            let target = hits.iter().find_map(|hit| {
                let (other, other_index, location) = index.entries[hit.item as usize];
                // Entries of endpoints that already moved are stale.
                let current = traces.get(other)?.get(other_index).copied()?;
                (other != t && current == location && location.distance_squared(&end) < limit_sq)
                    .then_some(location)
            });
            if let Some(location) = target
                && !traces[t].contains(&location)
            {
                trace!("Snapping end {} of trace {} onto {}.", end, t, location);
                traces[t].replace(position, location);
                snapped += 1;
            }
        }
    }
    snapped
}

/// Replaces every point that lies closer than `distance` to a point of an
/// earlier trace with that point. Returns the number of replaced points.
fn overlay_points(traces: &mut [Trace], distance: f64) -> usize {
    let mut index = PointIndex::new();
    let limit_sq = distance * distance;
    let mut overlaid = 0;

    for t in 0..traces.len() {
        if !index.entries.is_empty() {
            for position in 0..traces[t].len() {
                let Some(&point) = traces[t].get(position) else {
                    continue;
                };
                let nearest = index
                    .tree
                    .nearest_one::<SquaredEuclidean>(&point.to_array());
                if nearest.distance >= limit_sq {
                    continue;
                }
                let (_, _, location) = index.entries[nearest.item as usize];
                if location == point || traces[t].contains(&location) {
                    continue;
                }
                traces[t].replace(position, location);
                overlaid += 1;
            }
        }
        for (i, voxel) in traces[t].iter().enumerate() {
            index.insert(t, i, *voxel);
        }
    }
    overlaid
}
