use crate::core::models::chain::TraceChain;
use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::voxel::Voxel;
use nalgebra::Vector3;
use tracing::debug;

/// Builds a trace graph from ordered voxel chains.
///
/// Consecutive points are joined by an edge; a location shared by several
/// chains becomes one node. Chain boundaries never imply connectivity.
pub fn build<C: AsRef<[Voxel]>>(chains: &[C]) -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    for chain in chains {
        let mut previous = None;
        for &voxel in chain.as_ref() {
            let id = graph.add_node(voxel);
            if let Some(prev) = previous {
                graph.connect(prev, id)?;
            }
            previous = Some(id);
        }
    }
    debug!(
        "Built graph with {} nodes and {} edges from {} chains.",
        graph.len(),
        graph.edge_count(),
        chains.len()
    );
    Ok(graph)
}

/// Builds a trace graph from chains of physical positions.
pub fn build_from_records(
    chains: &[TraceChain],
    origin: &Vector3<f64>,
) -> Result<Graph, GraphError> {
    let voxels: Vec<Vec<Voxel>> = chains
        .iter()
        .map(|chain| {
            chain
                .points
                .iter()
                .map(|p| Voxel::from_physical(p, origin))
                .collect()
        })
        .collect();
    build(&voxels)
}
