use crate::core::models::graph::{Graph, GraphError};
use crate::core::models::volume::Volume;
use crate::core::utils::geometry::voxels_near_segment;
use crate::engine::config::MaskConfig;
use tracing::debug;

/// Restricts `backbone` to a thin cylinder around every edge of `graph`.
///
/// The result has the extent of `backbone` and is zero everywhere else.
pub fn refine_backbone_mask(
    graph: &Graph,
    backbone: &Volume,
    config: &MaskConfig,
) -> Result<Volume, GraphError> {
    let mut mask = Volume::zeros(backbone.dims());
    for (a, b) in graph.edges() {
        let start = graph.location(a)?.to_point();
        let end = graph.location(b)?.to_point();
        for voxel in voxels_near_segment(&start, &end, config.radius, config.samples) {
            if let Some(value) = backbone.get(&voxel) {
                mask.set(&voxel, value);
            }
        }
    }
    debug!(
        "Backbone mask keeps {} of {} positive voxels.",
        mask.count_positive(),
        backbone.count_positive()
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::voxel::Voxel;
    use crate::engine::tasks::graph_build::build;

    fn full_backbone() -> Volume {
        Volume::from_array(ndarray::Array3::from_elem((12, 12, 12), 0.5))
    }

    #[test]
    fn mask_covers_only_the_cylinder_around_edges() {
        let graph = build(&[vec![Voxel::new(2, 6, 6), Voxel::new(8, 6, 6)]]).unwrap();
        let mask = refine_backbone_mask(&graph, &full_backbone(), &MaskConfig::default()).unwrap();

        assert_eq!(mask.dims(), [12, 12, 12]);
        assert_eq!(mask.value(&Voxel::new(5, 6, 6)), 0.5);
        assert_eq!(mask.value(&Voxel::new(5, 8, 6)), 0.5);
        assert_eq!(mask.value(&Voxel::new(5, 9, 6)), 0.0);
        assert_eq!(mask.value(&Voxel::new(11, 6, 6)), 0.0);
    }

    #[test]
    fn empty_graph_gives_an_empty_mask() {
        let mask =
            refine_backbone_mask(&Graph::new(), &full_backbone(), &MaskConfig::default()).unwrap();
        assert_eq!(mask.count_positive(), 0);
    }

    #[test]
    fn edges_near_the_border_are_clipped() {
        let graph = build(&[vec![Voxel::new(0, 0, 0), Voxel::new(3, 0, 0)]]).unwrap();
        let mask = refine_backbone_mask(&graph, &full_backbone(), &MaskConfig::default()).unwrap();
        assert!(mask.count_positive() > 0);
        assert_eq!(mask.value(&Voxel::new(0, 2, 0)), 0.5);
    }
}
