/// File names used inside each structure directory.
#[derive(Debug, Clone)]
pub struct DefaultsConfig {
    pub ca_map: &'static str,
    pub backbone_map: &'static str,
    pub helix_map: &'static str,
    pub sheet_map: &'static str,
    pub mask_map: &'static str,
    pub traces: &'static str,
    pub first_walk: &'static str,
    pub second_walk: &'static str,
    pub final_graph: &'static str,
    pub refined_backbone: &'static str,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ca_map: "ca_confidence.mrc",
            backbone_map: "backbone_confidence.mrc",
            helix_map: "helix_confidence.mrc",
            sheet_map: "sheet_confidence.mrc",
            mask_map: "mask.mrc",
            traces: "traces.pdb",
            first_walk: "first_confidence_walk.pdb",
            second_walk: "second_confidence_walk.pdb",
            final_graph: "final_ca_prediction.pdb",
            refined_backbone: "refined_backbone.mrc",
        }
    }
}
