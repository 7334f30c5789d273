use crate::core::models::chain::TraceChain;
use crate::core::models::graph::Graph;
use crate::core::models::volume::{Volume, VolumeSet};
use crate::engine::config::TracingConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::helix::FitSummary;
use crate::engine::tasks::refine::{RefinePass, RefineReport};
use crate::engine::tasks::{extract, graph_build, helix, mask, refine, walk};
use nalgebra::Vector3;
use tracing::{info, instrument};

/// Everything a tracing run produces for one structure.
#[derive(Debug, Clone)]
pub struct TraceOutcome {
    /// Refined chains after the second pass and helix fitting.
    pub chains: Vec<TraceChain>,
    /// Backbone confidence restricted to the edges of the first-pass graph.
    pub backbone_mask: Volume,
    /// Raw traces of the first walk, in physical coordinates.
    pub first_walk: Vec<TraceChain>,
    /// Raw traces of the second walk, in physical coordinates.
    pub second_walk: Vec<TraceChain>,
    /// Every edge of the final graph as a two-point chain.
    pub final_edges: Vec<TraceChain>,
    pub first_refinement: RefineReport,
    pub second_refinement: RefineReport,
    pub helices: FitSummary,
}

#[instrument(skip_all, name = "tracing_workflow")]
pub fn run(
    volumes: &VolumeSet,
    config: &TracingConfig,
    reporter: &ProgressReporter,
) -> Result<TraceOutcome, EngineError> {
    config.validate()?;
    let origin = volumes.origin();

    // === Phase 1: Walk the Ca field ===
    let ca = if config.use_mask {
        info!("Restricting Ca confidence to the input mask.");
        volumes.masked_ca()
    } else {
        volumes.ca().clone()
    };
    let (first_walk, graph, first_refinement) = reporter.phase("First Walk", || {
        trace_pass(&ca, volumes.backbone(), origin, config, RefinePass::First)
    })?;
    info!(
        "First pass left {} nodes and {} edges.",
        graph.len(),
        graph.edge_count()
    );

    // === Phase 2: Tighten the backbone field ===
    let backbone_mask = reporter.phase("Backbone Mask", || {
        mask::refine_backbone_mask(&graph, volumes.backbone(), &config.mask)
    })?;

    // === Phase 3: Walk again through the mask ===
    let (second_walk, graph, second_refinement) = reporter.phase("Second Walk", || {
        trace_pass(&ca, &backbone_mask, origin, config, RefinePass::Second)
    })?;
    info!(
        "Second pass left {} nodes and {} edges.",
        graph.len(),
        graph.edge_count()
    );

    // === Phase 4: Extract chains and fit helices ===
    let mut chains = reporter.phase("Extraction", || {
        extract::extract(&graph, volumes.helix(), volumes.sheet(), origin)
    })?;
    let final_edges = extract::edge_chains(&graph, origin)?;
    let helices = fit_helices(&mut chains, config, reporter)?;

    info!(
        "Tracing finished with {} chains ({} helices replaced, {} kept).",
        chains.len(),
        helices.accepted,
        helices.rejected
    );

    Ok(TraceOutcome {
        chains,
        backbone_mask,
        first_walk,
        second_walk,
        final_edges,
        first_refinement,
        second_refinement,
        helices,
    })
}

/// One walk over a fresh copy of `ca`, followed by graph construction from the
/// walk's physical records and the refinement sequence of `pass`.
fn trace_pass(
    ca: &Volume,
    backbone: &Volume,
    origin: &Vector3<f64>,
    config: &TracingConfig,
    pass: RefinePass,
) -> Result<(Vec<TraceChain>, Graph, RefineReport), EngineError> {
    let mut working = ca.clone();
    let traces = walk::walk(&mut working, ca, backbone, &config.walk);
    info!("Walk produced {} traces.", traces.len());

    let records: Vec<TraceChain> = traces
        .iter()
        .map(|trace| TraceChain::new(trace.iter().map(|v| v.to_physical(origin)).collect()))
        .collect();
    let mut graph = graph_build::build_from_records(&records, origin)?;
    let report = refine::refine(&mut graph, ca, pass, &config.refine);
    Ok((records, graph, report))
}

fn fit_helices(
    chains: &mut [TraceChain],
    config: &TracingConfig,
    reporter: &ProgressReporter,
) -> Result<FitSummary, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Helix Fitting",
    });
    reporter.report(Progress::TaskStart {
        total_steps: chains.len() as u64,
    });

    let mut total = FitSummary::default();
    for chain in chains.iter_mut() {
        let summary = helix::fit_chain(chain, &config.helix)?;
        total.accepted += summary.accepted;
        total.rejected += summary.rejected;
        total.skipped += summary.skipped;
        total.splits += summary.splits;
        reporter.report(Progress::TaskIncrement);
    }

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    Ok(total)
}
