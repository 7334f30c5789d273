use crate::core::models::volume::Volume;
use crate::core::models::voxel::Voxel;
use std::collections::{HashMap, VecDeque};

/// Breadth-first search from `start` across face-adjacent voxels with positive
/// value in `volume`.
///
/// Returns every reached voxel with its step count, up to and including
/// `max_steps` steps. The start voxel is always included at step 0.
pub fn reachable_within(volume: &Volume, start: Voxel, max_steps: usize) -> HashMap<Voxel, usize> {
    let mut visited = HashMap::from([(start, 0)]);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        let steps = visited[&current];
        if steps >= max_steps {
            continue;
        }
        for next in current.face_neighbors() {
            if visited.contains_key(&next) || !volume.is_positive(&next) {
                continue;
            }
            visited.insert(next, steps + 1);
            queue.push_back(next);
        }
    }
    visited
}
