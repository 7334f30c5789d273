use crate::cli::TraceArgs;
use crate::config::{AppConfig, DefaultsConfig, StructureJob, build_config};
use crate::error::{CliError, Result};
use crate::utils::progress::{CliProgressHandler, batch_bar};
use catrace::{
    core::io::{
        mrc::{MrcFile, MrcMap},
        records::TraceRecordFile,
        traits::StructureFile,
    },
    core::models::chain::TraceChain,
    core::models::volume::{Volume, VolumeError, VolumeSet},
    engine::error::EngineError,
    engine::progress::ProgressReporter,
    workflows::{self, trace::TraceOutcome},
};
use nalgebra::Vector3;
use rayon::prelude::*;
use std::path::Path;
use tracing::{error, info, warn};

const ORIGIN_TOLERANCE: f64 = 1e-3;

pub fn run(args: TraceArgs) -> Result<()> {
    info!("Resolving configuration...");
    let app = build_config(&args)?;
    let defaults = DefaultsConfig::default();

    if let [job] = app.jobs.as_slice() {
        let progress_handler = CliProgressHandler::new();
        let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

        println!("Tracing {}...", job.input_dir.display());
        let chains = trace_structure(job, &app, &defaults, &reporter)?;
        println!(
            "✓ {} chain(s) written to: {}",
            chains,
            job.output_dir.join(defaults.traces).display()
        );
        return Ok(());
    }

    println!("Tracing {} structures...", app.jobs.len());
    let bar = batch_bar(app.jobs.len() as u64);
    let results: Vec<(&StructureJob, Result<usize>)> = app
        .jobs
        .par_iter()
        .map(|job| {
            let result = trace_structure(job, &app, &defaults, &ProgressReporter::new());
            bar.inc(1);
            (job, result)
        })
        .collect();
    bar.finish_and_clear();

    let mut failed = 0;
    for (job, result) in &results {
        match result {
            Ok(chains) => println!(
                "✓ {}: {} chain(s) written to {}",
                job.input_dir.display(),
                chains,
                job.output_dir.display()
            ),
            Err(e) => {
                failed += 1;
                error!("Tracing {} failed: {}", job.input_dir.display(), e);
                eprintln!("✗ {}: {}", job.input_dir.display(), e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Batch {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

/// Traces one structure and writes its results. Returns the number of chains.
fn trace_structure(
    job: &StructureJob,
    app: &AppConfig,
    defaults: &DefaultsConfig,
    reporter: &ProgressReporter,
) -> Result<usize> {
    let volumes = load_volumes(&job.input_dir, defaults, app.core_config.use_mask)?;

    info!("Invoking the tracing workflow for {:?}", &job.input_dir);
    let outcome = workflows::trace::run(&volumes, &app.core_config, reporter)?;

    write_outputs(
        outcome,
        *volumes.origin(),
        &job.output_dir,
        defaults,
        app.keep_intermediates,
    )
}

fn read_map(path: &Path) -> Result<MrcMap> {
    info!("Loading map from {:?}", path);
    MrcFile::read_from_path(path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn load_volumes(dir: &Path, defaults: &DefaultsConfig, with_mask: bool) -> Result<VolumeSet> {
    let ca = read_map(&dir.join(defaults.ca_map))?;
    let backbone = read_map(&dir.join(defaults.backbone_map))?;
    let helix = read_map(&dir.join(defaults.helix_map))?;
    let sheet = read_map(&dir.join(defaults.sheet_map))?;
    let others = [
        ("backbone", backbone.origin),
        ("helix", helix.origin),
        ("sheet", sheet.origin),
    ];

    let volumes = VolumeSet::new(ca.volume, backbone.volume, helix.volume, sheet.volume, ca.origin)
        .map_err(EngineError::from)?;
    for (name, origin) in others {
        check_origin(name, &origin, &ca.origin)?;
    }
    if !with_mask {
        return Ok(volumes);
    }

    let mask_path = dir.join(defaults.mask_map);
    if !mask_path.is_file() {
        return Err(CliError::Argument(format!(
            "Masking was requested but {} does not exist",
            mask_path.display()
        )));
    }
    let mask = read_map(&mask_path)?;
    check_origin("mask", &mask.origin, &ca.origin)?;
    Ok(volumes.with_mask(mask.volume).map_err(EngineError::from)?)
}

/// Every input map must share the Ca map's origin.
fn check_origin(name: &'static str, origin: &Vector3<f64>, expected: &Vector3<f64>) -> Result<()> {
    if (origin - expected).norm() > ORIGIN_TOLERANCE {
        return Err(EngineError::from(VolumeError::OriginMismatch {
            name,
            expected: [expected.x, expected.y, expected.z],
            found: [origin.x, origin.y, origin.z],
        })
        .into());
    }
    Ok(())
}

fn write_outputs(
    outcome: TraceOutcome,
    origin: Vector3<f64>,
    output_dir: &Path,
    defaults: &DefaultsConfig,
    keep_intermediates: bool,
) -> Result<usize> {
    std::fs::create_dir_all(output_dir)?;

    let traces_path = output_dir.join(defaults.traces);
    write_chains(&outcome.chains, &traces_path)?;
    if keep_intermediates {
        write_chains(&outcome.first_walk, &output_dir.join(defaults.first_walk))?;
        write_chains(&outcome.second_walk, &output_dir.join(defaults.second_walk))?;
        write_chains(&outcome.final_edges, &output_dir.join(defaults.final_graph))?;
    }

    let mask_path = output_dir.join(defaults.refined_backbone);
    info!("Writing refined backbone mask to {:?}", &mask_path);
    let map = MrcMap {
        volume: outcome.backbone_mask,
        origin,
    };
    MrcFile::write_to_path(&map, &mask_path).map_err(|e| CliError::FileParsing {
        path: mask_path.clone(),
        source: e.into(),
    })?;

    if outcome.chains.is_empty() {
        warn!("No chains survived tracing; {:?} holds no atoms.", &traces_path);
    }
    Ok(outcome.chains.len())
}

fn write_chains(chains: &[TraceChain], path: &Path) -> Result<()> {
    info!("Writing {} chain(s) to {:?}", chains.len(), path);
    TraceRecordFile::write_to_path(&chains.to_vec(), path).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}
