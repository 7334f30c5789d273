use super::voxel::Voxel;
use std::collections::VecDeque;

/// Which end of a trace a point sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEnd {
    Front,
    Back,
}

/// An ordered run of voxels placed by the confidence walker.
///
/// Traces grow at either end while the walk is running and are treated as
/// immutable once handed to the graph builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    points: VecDeque<Voxel>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a trace with a single placed edge.
    pub fn from_pair(first: Voxel, second: Voxel) -> Self {
        Self {
            points: VecDeque::from([first, second]),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Voxel>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Voxel> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&Voxel> {
        self.points.back()
    }

    pub fn get(&self, index: usize) -> Option<&Voxel> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Voxel> + ExactSizeIterator {
        self.points.iter()
    }

    pub fn contains(&self, voxel: &Voxel) -> bool {
        self.points.contains(voxel)
    }

    pub fn position(&self, voxel: &Voxel) -> Option<usize> {
        self.points.iter().position(|p| p == voxel)
    }

    /// The end of the trace `voxel` occupies, if it is an endpoint.
    ///
    /// A single-point trace reports [`TraceEnd::Back`].
    pub fn end_of(&self, voxel: &Voxel) -> Option<TraceEnd> {
        if self.last() == Some(voxel) {
            Some(TraceEnd::Back)
        } else if self.first() == Some(voxel) {
            Some(TraceEnd::Front)
        } else {
            None
        }
    }

    pub fn extend_at(&mut self, end: TraceEnd, voxel: Voxel) {
        match end {
            TraceEnd::Front => self.points.push_front(voxel),
            TraceEnd::Back => self.points.push_back(voxel),
        }
    }

    /// Replaces the point at `index`, returning the previous value.
    pub fn replace(&mut self, index: usize, voxel: Voxel) -> Option<Voxel> {
        self.points
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, voxel))
    }

    /// Up to `span` points on either side of every occurrence of `voxel`.
    pub fn neighborhood(&self, voxel: &Voxel, span: usize) -> Vec<Voxel> {
        let mut result = Vec::new();
        for (index, point) in self.points.iter().enumerate() {
            if point != voxel {
                continue;
            }
            let after = (index + 1)..(index + 1 + span).min(self.points.len());
            result.extend(after.map(|i| self.points[i]));
            let before = index.saturating_sub(span)..index;
            result.extend(before.rev().map(|i| self.points[i]));
        }
        result
    }

    /// The point adjacent to `voxel` that establishes the walking direction.
    ///
    /// Prefers the following point, falling back to the preceding one; `None`
    /// when `voxel` is absent or the trace has a single point.
    pub fn direction_neighbor(&self, voxel: &Voxel) -> Option<Voxel> {
        let index = self.position(voxel)?;
        self.points
            .get(index + 1)
            .or_else(|| index.checked_sub(1).and_then(|i| self.points.get(i)))
            .copied()
    }

    pub fn to_vec(&self) -> Vec<Voxel> {
        self.points.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: i32) -> Trace {
        Trace::from_points((0..n).map(|i| Voxel::new(i * 4, 0, 0)))
    }

    #[test]
    fn extend_at_front_and_back() {
        let mut trace = Trace::from_pair(Voxel::new(0, 0, 0), Voxel::new(4, 0, 0));
        trace.extend_at(TraceEnd::Front, Voxel::new(-4, 0, 0));
        trace.extend_at(TraceEnd::Back, Voxel::new(8, 0, 0));
        assert_eq!(trace.first(), Some(&Voxel::new(-4, 0, 0)));
        assert_eq!(trace.last(), Some(&Voxel::new(8, 0, 0)));
        assert_eq!(trace.len(), 4);
    }

    #[test]
    fn neighborhood_is_capped_by_span_and_trace_bounds() {
        let trace = line(12);
        let around = trace.neighborhood(&Voxel::new(8, 0, 0), 5);
        assert_eq!(around.len(), 2 + 5);
        assert!(around.contains(&Voxel::new(0, 0, 0)));
        assert!(around.contains(&Voxel::new(28, 0, 0)));
        assert!(!around.contains(&Voxel::new(32, 0, 0)));
    }

    #[test]
    fn direction_neighbor_prefers_following_point() {
        let trace = line(3);
        assert_eq!(
            trace.direction_neighbor(&Voxel::new(0, 0, 0)),
            Some(Voxel::new(4, 0, 0))
        );
        assert_eq!(
            trace.direction_neighbor(&Voxel::new(8, 0, 0)),
            Some(Voxel::new(4, 0, 0))
        );
        assert_eq!(trace.direction_neighbor(&Voxel::new(1, 1, 1)), None);
    }

    #[test]
    fn end_of_identifies_endpoints_only() {
        let trace = line(3);
        assert_eq!(trace.end_of(&Voxel::new(0, 0, 0)), Some(TraceEnd::Front));
        assert_eq!(trace.end_of(&Voxel::new(8, 0, 0)), Some(TraceEnd::Back));
        assert_eq!(trace.end_of(&Voxel::new(4, 0, 0)), None);
    }
}
