use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::ids::NodeId;
use crate::core::models::volume::Volume;
use crate::engine::config::RefineConfig;
use crate::engine::utils::density::path_density;
use nalgebra::Point3;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Which of the two refinement passes of the workflow is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinePass {
    /// Runs on the first walk, before the backbone mask is built.
    First,
    /// Runs on the second walk and additionally removes short tail loops.
    Second,
}

/// Number of changes each operator made during one refinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineReport {
    pub self_edges: usize,
    pub side_chains: usize,
    pub loops: usize,
    pub single_ends: usize,
    pub tail_loops: usize,
    pub empty_nodes: usize,
}

/// Runs the topology repair sequence of `pass` on `graph`.
pub fn refine(
    graph: &mut Graph,
    ca: &Volume,
    pass: RefinePass,
    config: &RefineConfig,
) -> RefineReport {
    let mut report = RefineReport::default();
    for round in 0..config.rounds {
        report.self_edges += edge_check(graph);
        report.side_chains += remove_side_chains(graph, config);
        report.loops += remove_loops(graph, ca, config);
        report.single_ends += remove_single_ends(graph);
        if pass == RefinePass::Second && round + 1 == config.rounds {
            report.tail_loops += remove_tail_loops(graph, config);
        }
        report.empty_nodes += remove_empty_nodes(graph);
    }
    debug!(
        "Refinement {:?} finished with {} nodes and {} edges: {:?}",
        pass,
        graph.len(),
        graph.edge_count(),
        report
    );
    report
}

/// Drops self-referencing edges.
pub fn edge_check(graph: &mut Graph) -> usize {
    graph.remove_self_edges()
}

/// Removes the edge `from`-`to`, then keeps removing edges along the far side
/// while the node reached there is left with a single edge.
///
/// Returns the number of removed edges.
pub fn sever(graph: &mut Graph, from: NodeId, to: NodeId) -> Result<usize, GraphError> {
    if !graph.disconnect(from, to)? {
        return Ok(0);
    }
    let mut removed = 1;
    let mut current = to;
    while graph.degree(current)? == 1 {
        let next = graph.neighbors(current)?[0];
        graph.disconnect(current, next)?;
        removed += 1;
        current = next;
    }
    Ok(removed)
}

/// Follows the edge `branch`-`first` through degree-2 nodes.
///
/// The returned walk starts with `branch` and ends at the first node that does
/// not have degree 2, or at the node whose only continuation was already
/// visited. The branch node is never revisited.
pub fn walk_branch(graph: &Graph, branch: NodeId, first: NodeId) -> Result<Vec<NodeId>, GraphError> {
    let mut walk = vec![branch, first];
    let mut visited = HashSet::from([branch, first]);
    let mut current = first;
    while graph.degree(current)? == 2 {
        let next = graph
            .neighbors(current)?
            .iter()
            .copied()
            .find(|n| !visited.contains(n));
        let Some(next) = next else {
            break;
        };
        visited.insert(next);
        walk.push(next);
        current = next;
    }
    Ok(walk)
}

fn branch_walks(graph: &Graph, branch: NodeId) -> Result<Vec<Vec<NodeId>>, GraphError> {
    graph
        .neighbors(branch)?
        .iter()
        .map(|&first| walk_branch(graph, branch, first))
        .collect()
}

/// Applies `op` to every branch node present when the operator starts.
///
/// A node that can no longer be resolved is logged and skipped.
fn for_each_branch<F>(graph: &mut Graph, name: &str, mut op: F) -> usize
where
    F: FnMut(&mut Graph, NodeId) -> Result<bool, GraphError>,
{
    let mut changed = 0;
    for branch in graph.branch_nodes() {
        match op(graph, branch) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => warn!("{}: skipping branch node: {}", name, e),
        }
    }
    changed
}

/// Severs short branches that leave a branch node next to much longer ones.
pub fn remove_side_chains(graph: &mut Graph, config: &RefineConfig) -> usize {
    for_each_branch(graph, "remove_side_chains", |graph, branch| {
        prune_side_chain(graph, branch, config)
    })
}

fn prune_side_chain(
    graph: &mut Graph,
    branch: NodeId,
    config: &RefineConfig,
) -> Result<bool, GraphError> {
    if graph.degree(branch)? < 3 {
        return Ok(false);
    }
    let mut shortest = (usize::MAX, None);
    let mut second = usize::MAX;
    for walk in branch_walks(graph, branch)? {
        let length = walk.len() - 1;
        if length < shortest.0 {
            second = shortest.0;
            shortest = (length, Some(walk[1]));
        } else if length < second {
            second = length;
        }
    }
    let (length, Some(first)) = shortest else {
        return Ok(false);
    };
    if length <= config.max_side_chain_length
        && second.saturating_sub(length) >= config.min_side_chain_margin
    {
        let removed = sever(graph, branch, first)?;
        trace!("Removed side chain of {} edges at {:?}.", removed, branch);
        return Ok(true);
    }
    Ok(false)
}

/// Opens cycles between two branch nodes by cutting the side with less Ca
/// density, provided that side is short.
pub fn remove_loops(graph: &mut Graph, ca: &Volume, config: &RefineConfig) -> usize {
    for_each_branch(graph, "remove_loops", |graph, branch| {
        prune_loop(graph, ca, branch, config)
    })
}

fn walk_density(
    graph: &Graph,
    ca: &Volume,
    walk: &[NodeId],
    config: &RefineConfig,
) -> Result<f64, GraphError> {
    let points: Vec<Point3<f64>> = walk
        .iter()
        .map(|&id| graph.location(id).map(|v| v.to_point()))
        .collect::<Result<_, _>>()?;
    Ok(path_density(
        ca,
        &points,
        config.density_radius,
        config.density_samples,
    ))
}

fn prune_loop(
    graph: &mut Graph,
    ca: &Volume,
    branch: NodeId,
    config: &RefineConfig,
) -> Result<bool, GraphError> {
    if graph.degree(branch)? < 3 {
        return Ok(false);
    }
    let walks = branch_walks(graph, branch)?;
    for (i, first) in walks.iter().enumerate() {
        for second in &walks[i + 1..] {
            if first.last() != second.last() {
                continue;
            }
            let d1 = walk_density(graph, ca, first, config)?;
            let d2 = walk_density(graph, ca, second, config)?;
            let weaker = if d1 < d2 {
                first
            } else if d2 < d1 {
                second
            } else {
                return Ok(false);
            };
            if weaker.len() > config.max_loop_side {
                return Ok(false);
            }
            sever(graph, weaker[0], weaker[1])?;
            trace!(
                "Cut loop side of {} nodes at {:?} (densities {:.3} / {:.3}).",
                weaker.len(),
                branch,
                d1,
                d2
            );
            return Ok(true);
        }
    }
    Ok(false)
}

/// Detaches dangling ends hanging directly (or through one degree-2 node)
/// off a branch node, and isolated pairs.
pub fn remove_single_ends(graph: &mut Graph) -> usize {
    let mut detached = 0;
    for id in graph.node_ids() {
        match detach_single_end(graph, id) {
            Ok(true) => detached += 1,
            Ok(false) => {}
            Err(e) => warn!("remove_single_ends: skipping node: {}", e),
        }
    }
    detached
}

fn detach_single_end(graph: &mut Graph, id: NodeId) -> Result<bool, GraphError> {
    if graph.degree(id)? != 1 {
        return Ok(false);
    }
    let neighbor = graph.neighbors(id)?[0];
    match graph.degree(neighbor)? {
        1 | 3.. => {
            graph.disconnect(id, neighbor)?;
            Ok(true)
        }
        2 => {
            let Some(&beyond) = graph.neighbors(neighbor)?.iter().find(|&&n| n != id) else {
                return Ok(false);
            };
            if graph.degree(beyond)? < 3 {
                return Ok(false);
            }
            graph.disconnect(neighbor, beyond)?;
            graph.disconnect(id, neighbor)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Removes every node without edges.
pub fn remove_empty_nodes(graph: &mut Graph) -> usize {
    let mut removed = 0;
    for id in graph.node_ids() {
        if graph.degree(id).is_ok_and(|d| d == 0) && graph.remove_node(id).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Removes short cycles that leave a branch node and return to it.
pub fn remove_tail_loops(graph: &mut Graph, config: &RefineConfig) -> usize {
    for_each_branch(graph, "remove_tail_loops", |graph, branch| {
        prune_tail_loop(graph, branch, config)
    })
}

fn prune_tail_loop(
    graph: &mut Graph,
    branch: NodeId,
    config: &RefineConfig,
) -> Result<bool, GraphError> {
    if graph.degree(branch)? < 3 {
        return Ok(false);
    }
    let walks = branch_walks(graph, branch)?;
    for (i, cycle) in walks.iter().enumerate() {
        if cycle.len() > config.max_tail_loop {
            continue;
        }
        let Some(&last) = cycle.last() else {
            continue;
        };
        let returns = walks
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.get(1) == Some(&last));
        // Only a run of degree-2 nodes is a cycle that can be cut out whole.
        if !returns || graph.degree(last)? != 2 {
            continue;
        }
        for &id in &cycle[1..] {
            graph.remove_node(id)?;
        }
        trace!(
            "Removed tail loop of {} nodes at {:?}.",
            cycle.len() - 1,
            branch
        );
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::voxel::Voxel;
    use crate::engine::tasks::graph_build::build;

    fn v(x: i32, y: i32) -> Voxel {
        Voxel::new(x, y, 5)
    }

    fn line(from: i32, to: i32, y: i32) -> Vec<Voxel> {
        (from..=to).map(|x| v(x * 3, y)).collect()
    }

    fn degree_at(graph: &Graph, voxel: Voxel) -> usize {
        graph
            .node_at(&voxel)
            .map(|id| graph.degree(id).unwrap())
            .unwrap_or(0)
    }

    /// Two six-node arms meeting at (18, 0) with a three-node spur going up.
    fn bridge_with_spur() -> Graph {
        let spur = vec![v(18, 0), v(18, 3), v(18, 6), v(18, 9)];
        build(&[line(0, 12, 0), spur]).unwrap()
    }

    /// A ring A-l1-B / A-h1-h2-h3-B with three-node tails on A and B.
    fn ring() -> (Graph, Vec<Voxel>, Vec<Voxel>) {
        let a = v(4, 8);
        let b = v(12, 8);
        let low = vec![a, v(8, 4), b];
        let high = vec![a, v(6, 12), v(8, 13), v(10, 12), b];
        let tail_a = vec![a, v(2, 8), v(1, 9), v(0, 10)];
        let tail_b = vec![b, v(14, 8), v(15, 9), v(16, 10)];
        let graph = build(&[tail_a, low.clone(), high.clone(), tail_b]).unwrap();
        (graph, low, high)
    }

    fn volume_with(hot: &[Voxel]) -> Volume {
        let mut volume = Volume::from_array(ndarray::Array3::from_elem((20, 20, 10), 1.0));
        for voxel in hot {
            volume.set(voxel, 9.0);
        }
        volume
    }

    #[test]
    fn sever_cascades_through_dangling_nodes() {
        let mut graph = bridge_with_spur();
        let hub = graph.node_at(&v(18, 0)).unwrap();
        let spur = graph.node_at(&v(18, 3)).unwrap();

        let removed = sever(&mut graph, hub, spur).unwrap();

        assert_eq!(removed, 3);
        assert_eq!(degree_at(&graph, v(18, 9)), 0);
        assert_eq!(degree_at(&graph, v(18, 0)), 2);
        assert!(graph.is_symmetric());
    }

    #[test]
    fn walk_branch_stops_at_dead_ends_and_branch_nodes() {
        let graph = bridge_with_spur();
        let hub = graph.node_at(&v(18, 0)).unwrap();
        let up = graph.node_at(&v(18, 3)).unwrap();
        let walk = walk_branch(&graph, hub, up).unwrap();
        assert_eq!(walk.len(), 4);
        assert_eq!(graph.location(walk[3]).unwrap(), v(18, 9));

        let left = graph.node_at(&v(15, 0)).unwrap();
        assert_eq!(walk_branch(&graph, hub, left).unwrap().len(), 7);
    }

    #[test]
    fn side_chain_next_to_long_arms_is_removed() {
        let mut graph = bridge_with_spur();
        let removed = remove_side_chains(&mut graph, &RefineConfig::default());
        assert_eq!(removed, 1);
        assert_eq!(degree_at(&graph, v(18, 3)), 0);
        assert!(graph.branch_nodes().is_empty());
        assert!(graph.is_symmetric());
    }

    #[test]
    fn side_chain_removal_ignores_simple_paths_and_cycles() {
        let mut path = build(&[line(0, 8, 0)]).unwrap();
        assert_eq!(remove_side_chains(&mut path, &RefineConfig::default()), 0);

        let mut cycle_points = line(0, 4, 0);
        cycle_points.extend([v(9, 4), v(0, 4), v(0, 0)]);
        let mut cycle = build(&[cycle_points]).unwrap();
        let edges = cycle.edge_count();
        assert_eq!(remove_side_chains(&mut cycle, &RefineConfig::default()), 0);
        assert_eq!(cycle.edge_count(), edges);
    }

    #[test]
    fn balanced_branches_are_kept() {
        let spur = vec![v(18, 0), v(18, 3), v(18, 6), v(18, 9), v(18, 12), v(18, 15)];
        let mut graph = build(&[line(0, 12, 0), spur]).unwrap();
        assert_eq!(remove_side_chains(&mut graph, &RefineConfig::default()), 0);
        assert_eq!(graph.branch_nodes().len(), 1);
    }

    #[test]
    fn low_density_short_loop_side_is_cut() {
        let (mut graph, low, high) = ring();
        let ca = volume_with(&high);

        assert_eq!(remove_loops(&mut graph, &ca, &RefineConfig::default()), 1);
        remove_empty_nodes(&mut graph);

        assert!(graph.node_at(&low[1]).is_none());
        assert!(graph.branch_nodes().is_empty());
        assert_eq!(graph.edge_count(), graph.len() - 1);
        assert!(graph.is_symmetric());
    }

    #[test]
    fn long_loop_side_is_never_cut() {
        let (mut graph, low, _) = ring();
        let ca = volume_with(&low);
        let edges = graph.edge_count();

        assert_eq!(remove_loops(&mut graph, &ca, &RefineConfig::default()), 0);
        assert_eq!(graph.edge_count(), edges);
    }

    #[test]
    fn equal_loop_densities_leave_the_graph_unchanged() {
        let (mut graph, _, _) = ring();
        let ca = Volume::zeros([20, 20, 10]);
        let edges = graph.edge_count();
        assert_eq!(remove_loops(&mut graph, &ca, &RefineConfig::default()), 0);
        assert_eq!(graph.edge_count(), edges);
    }

    #[test]
    fn single_ends_next_to_branch_nodes_are_detached() {
        // A two-hop pendant, a leaf directly on the hub and two long arms.
        let hub = v(10, 10);
        let mut graph = build(&[
            vec![hub, v(13, 10), v(16, 10)],
            vec![hub, v(10, 13)],
            vec![hub, v(7, 10), v(4, 10), v(1, 10), v(1, 13)],
            vec![hub, v(10, 7), v(10, 4), v(10, 1), v(13, 1)],
        ])
        .unwrap();

        assert_eq!(remove_single_ends(&mut graph), 2);
        assert_eq!(degree_at(&graph, v(10, 13)), 0);
        assert_eq!(degree_at(&graph, v(13, 10)), 0);
        assert_eq!(degree_at(&graph, v(16, 10)), 0);
        assert_eq!(degree_at(&graph, hub), 2);
        assert!(graph.is_symmetric());
    }

    #[test]
    fn isolated_pairs_are_detached() {
        let mut graph = build(&[vec![v(0, 0), v(3, 0)]]).unwrap();
        assert_eq!(remove_single_ends(&mut graph), 1);
        assert_eq!(remove_empty_nodes(&mut graph), 2);
        assert!(graph.is_empty());
    }

    #[test]
    fn short_cycle_returning_to_its_branch_is_removed() {
        let b = v(10, 10);
        let tail = vec![b, v(7, 10), v(4, 10), v(1, 10), v(1, 13)];
        let cycle = vec![b, v(13, 10), v(13, 13), v(10, 13), b];
        let mut graph = build(&[tail, cycle]).unwrap();

        assert_eq!(remove_tail_loops(&mut graph, &RefineConfig::default()), 1);
        assert!(graph.node_at(&v(13, 13)).is_none());
        assert!(graph.node_at(&v(10, 13)).is_none());
        assert_eq!(degree_at(&graph, b), 1);
        assert!(graph.is_symmetric());
    }

    #[test]
    fn long_cycles_are_not_tail_loops() {
        let b = v(10, 10);
        let tail = vec![b, v(7, 10), v(4, 10), v(1, 10)];
        let cycle = vec![b, v(13, 10), v(16, 10), v(16, 13), v(13, 13), b];
        let mut graph = build(&[tail, cycle]).unwrap();
        assert_eq!(remove_tail_loops(&mut graph, &RefineConfig::default()), 0);
    }

    #[test]
    fn full_refinement_leaves_no_empty_nodes() {
        let (mut graph, _, high) = ring();
        let ca = volume_with(&high);
        refine(&mut graph, &ca, RefinePass::Second, &RefineConfig::default());

        assert!(graph.iter().all(|(_, node)| node.degree() > 0));
        assert!(graph.is_symmetric());
        assert!(graph.branch_nodes().is_empty());
    }

    #[test]
    fn bridge_with_spur_refines_to_a_single_path() {
        let mut graph = bridge_with_spur();
        let ca = Volume::zeros([40, 20, 10]);
        let report = refine(&mut graph, &ca, RefinePass::First, &RefineConfig::default());

        assert_eq!(report.side_chains, 1);
        assert_eq!(report.empty_nodes, 3);
        assert_eq!(graph.len(), 13);
        assert_eq!(graph.edge_count(), 12);
    }

    #[test]
    fn missing_branch_node_is_reported() {
        let mut graph = bridge_with_spur();
        let hub = graph.node_at(&v(18, 0)).unwrap();
        graph.remove_node(hub).unwrap();
        let result = prune_side_chain(&mut graph, hub, &RefineConfig::default());
        assert!(matches!(result, Err(GraphError::MissingNode(_))));
    }
}
