use crate::core::models::chain::{Span, TraceChain};
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::ids::NodeId;
use crate::core::models::volume::Volume;
use crate::core::models::voxel::Voxel;
use nalgebra::Vector3;
use std::collections::HashSet;
use tracing::debug;

/// Endpoint pair of a run; a run and its reverse share one entry.
type RunKey = (NodeId, NodeId);

fn run_key(run: &[NodeId]) -> RunKey {
    (run[0], run[run.len() - 1])
}

fn reversed_key(run: &[NodeId]) -> RunKey {
    (run[run.len() - 1], run[0])
}

/// Follows `start`-`first` through degree-2 nodes up to the next node of any
/// other degree.
fn follow_run(graph: &Graph, start: NodeId, first: NodeId) -> Result<Vec<NodeId>, GraphError> {
    let mut run = vec![start, first];
    let (mut previous, mut current) = (start, first);
    while graph.degree(current)? == 2 && run.len() <= graph.len() {
        let edges = graph.neighbors(current)?;
        let next = if edges[0] == previous { edges[1] } else { edges[0] };
        run.push(next);
        previous = current;
        current = next;
    }
    Ok(run)
}

/// Maximal runs of indices where `flags` is set.
fn spans_of(flags: &[bool]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, &flag) in flags.iter().enumerate() {
        match (flag, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                spans.push(Span::new(s, i - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push(Span::new(s, flags.len() - 1));
    }
    spans
}

/// Emits every unbranched run of the graph as an ordered chain of physical
/// points, annotated with the helix and sheet spans read from the volumes.
///
/// Runs start and end at nodes whose degree is not 2. Only the first run found
/// between a pair of end nodes is emitted, regardless of direction; closed
/// rings without such a node are skipped.
pub fn extract(
    graph: &Graph,
    helix: &Volume,
    sheet: &Volume,
    origin: &Vector3<f64>,
) -> Result<Vec<TraceChain>, GraphError> {
    let mut seen: HashSet<RunKey> = HashSet::new();
    let mut chains = Vec::new();

    for (id, node) in graph.iter() {
        if node.degree() == 2 {
            continue;
        }
        for &first in node.edges() {
            let run = follow_run(graph, id, first)?;
            if !seen.insert(run_key(&run)) {
                continue;
            }
            seen.insert(reversed_key(&run));

            let voxels: Vec<Voxel> = run
                .iter()
                .map(|&n| graph.location(n))
                .collect::<Result<_, _>>()?;
            let helix_flags: Vec<bool> = voxels.iter().map(|v| helix.is_positive(v)).collect();
            let sheet_flags: Vec<bool> = voxels.iter().map(|v| sheet.is_positive(v)).collect();

            let mut chain = TraceChain::new(voxels.iter().map(|v| v.to_physical(origin)).collect());
            chain.helices = spans_of(&helix_flags);
            chain.sheets = spans_of(&sheet_flags);
            chains.push(chain);
        }
    }
    debug!("Extracted {} chains from the refined graph.", chains.len());
    Ok(chains)
}

/// Lists every edge of the graph as an unannotated two-point chain.
pub fn edge_chains(graph: &Graph, origin: &Vector3<f64>) -> Result<Vec<TraceChain>, GraphError> {
    graph
        .edges()
        .into_iter()
        .map(|(a, b)| {
            Ok(TraceChain::new(vec![
                graph.location(a)?.to_physical(origin),
                graph.location(b)?.to_physical(origin),
            ]))
        })
        .collect()
}
